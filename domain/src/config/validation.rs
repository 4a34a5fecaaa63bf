//! Structured configuration issues.
//!
//! Config loaders report problems as a list of [`ConfigIssue`]s instead of
//! failing on the first one. Callers abort on any [`Severity::Error`] and log
//! warnings.

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal: the configuration cannot work at all.
    Error,
    /// Non-fatal: the configuration works but may not behave as expected.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// A model id is empty.
    EmptyModelId,
    /// The same model id appears twice in the member list.
    DuplicateModel,
    /// Fewer than two distinct members are configured.
    TooFewMembers,
    /// The quorum is zero or larger than the member count.
    QuorumOutOfRange,
    /// A timeout or interval is zero.
    ZeroDuration,
    /// The lead is not one of the members.
    LeadNotMember,
    /// The lead judgment weight is negative or not finite.
    InvalidWeight,
}

/// A detected issue in the configuration.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{level}: {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_severity() {
        let err = ConfigIssue::error(ConfigIssueCode::TooFewMembers, "need two");
        assert!(err.is_error());
        let warn = ConfigIssue::warning(ConfigIssueCode::LeadNotMember, "lead outside");
        assert!(!warn.is_error());
        assert_eq!(warn.code, ConfigIssueCode::LeadNotMember);
    }

    #[test]
    fn test_display_prefixes_level() {
        let issue = ConfigIssue::warning(ConfigIssueCode::DuplicateModel, "duplicate model a/x");
        assert_eq!(issue.to_string(), "warning: duplicate model a/x");
    }
}
