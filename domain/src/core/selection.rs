//! Model selection for a single round

use super::error::DomainError;
use super::model::{ModelIdentity, ModelRole};

/// Minimum number of members needed for peer ranking to mean anything.
pub const MIN_MEMBERS: usize = 2;

/// The members and lead chosen for one round (Value Object)
///
/// Members keep their configured order; that order is the tie-break for
/// aggregate ranking and the index order of Stage 1 results.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSelection {
    members: Vec<ModelIdentity>,
    lead: ModelIdentity,
}

impl ModelSelection {
    /// Validate a member list and lead.
    ///
    /// Duplicate member ids are dropped (first occurrence wins). Fewer than
    /// [`MIN_MEMBERS`] distinct members is rejected. The lead need not be a
    /// member; it is forced to [`ModelRole::Lead`].
    pub fn new(members: Vec<ModelIdentity>, lead: ModelIdentity) -> Result<Self, DomainError> {
        let mut unique: Vec<ModelIdentity> = Vec::with_capacity(members.len());
        for member in members {
            if member.id().trim().is_empty() {
                return Err(DomainError::InvalidModelSelection(
                    "model id cannot be empty".to_string(),
                ));
            }
            if !unique.contains(&member) {
                unique.push(member.with_role(ModelRole::Member));
            }
        }

        if unique.len() < MIN_MEMBERS {
            return Err(DomainError::InvalidModelSelection(format!(
                "at least {MIN_MEMBERS} distinct members are required, got {}",
                unique.len()
            )));
        }
        if lead.id().trim().is_empty() {
            return Err(DomainError::InvalidModelSelection(
                "lead model id cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            members: unique,
            lead: lead.with_role(ModelRole::Lead),
        })
    }

    /// Narrow a configured selection to the ids requested for one round.
    ///
    /// Every requested id must be a configured member, and `lead`, when
    /// given, must name a configured member or the configured lead.
    pub fn restrict(&self, ids: Option<&[String]>, lead: Option<&str>) -> Result<Self, DomainError> {
        let members = match ids {
            Some(ids) => ids
                .iter()
                .map(|id| {
                    self.find(id).cloned().ok_or_else(|| {
                        DomainError::InvalidModelSelection(format!("unknown model: {id}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => self.members.clone(),
        };

        let lead = match lead {
            Some(id) => self.find(id).cloned().ok_or_else(|| {
                DomainError::InvalidModelSelection(format!("unknown lead model: {id}"))
            })?,
            None => self.lead.clone(),
        };

        Self::new(members, lead)
    }

    fn find(&self, id: &str) -> Option<&ModelIdentity> {
        self.members
            .iter()
            .chain(std::iter::once(&self.lead))
            .find(|m| m.id() == id)
    }

    pub fn members(&self) -> &[ModelIdentity] {
        &self.members
    }

    pub fn lead(&self) -> &ModelIdentity {
        &self.lead
    }

    /// Default quorum: a strict majority of members, never below [`MIN_MEMBERS`].
    pub fn default_quorum(&self) -> usize {
        (self.members.len() / 2 + 1).max(MIN_MEMBERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<ModelIdentity> {
        list.iter().map(|id| ModelIdentity::member(*id)).collect()
    }

    #[test]
    fn test_duplicates_are_dropped_in_order() {
        let selection =
            ModelSelection::new(ids(&["a/x", "b/y", "a/x", "c/z"]), ModelIdentity::lead("a/x"))
                .unwrap();
        let members: Vec<&str> = selection.members().iter().map(|m| m.id()).collect();
        assert_eq!(members, vec!["a/x", "b/y", "c/z"]);
        assert!(selection.lead().is_lead());
    }

    #[test]
    fn test_single_member_rejected() {
        let err = ModelSelection::new(ids(&["a/x", "a/x"]), ModelIdentity::lead("a/x")).unwrap_err();
        assert!(matches!(err, DomainError::InvalidModelSelection(_)));
    }

    #[test]
    fn test_empty_id_rejected() {
        assert!(ModelSelection::new(ids(&["a/x", " "]), ModelIdentity::lead("a/x")).is_err());
        assert!(ModelSelection::new(ids(&["a/x", "b/y"]), ModelIdentity::lead("")).is_err());
    }

    #[test]
    fn test_default_quorum() {
        let two = ModelSelection::new(ids(&["a", "b"]), ModelIdentity::lead("a")).unwrap();
        assert_eq!(two.default_quorum(), 2);
        let four = ModelSelection::new(ids(&["a", "b", "c", "d"]), ModelIdentity::lead("a")).unwrap();
        assert_eq!(four.default_quorum(), 3);
        let five =
            ModelSelection::new(ids(&["a", "b", "c", "d", "e"]), ModelIdentity::lead("a")).unwrap();
        assert_eq!(five.default_quorum(), 3);
    }

    #[test]
    fn test_restrict_to_known_members() {
        let base = ModelSelection::new(ids(&["a", "b", "c"]), ModelIdentity::lead("l")).unwrap();
        let picked = vec!["c".to_string(), "a".to_string()];
        let narrowed = base.restrict(Some(&picked), Some("b")).unwrap();
        let members: Vec<&str> = narrowed.members().iter().map(|m| m.id()).collect();
        assert_eq!(members, vec!["c", "a"]);
        assert_eq!(narrowed.lead().id(), "b");
        assert!(narrowed.lead().is_lead());
    }

    #[test]
    fn test_restrict_rejects_unknown() {
        let base = ModelSelection::new(ids(&["a", "b"]), ModelIdentity::lead("l")).unwrap();
        let picked = vec!["a".to_string(), "zzz".to_string()];
        assert!(base.restrict(Some(&picked), None).is_err());
        assert!(base.restrict(None, Some("nope")).is_err());
        assert_eq!(base.restrict(None, Some("l")).unwrap().lead().id(), "l");
    }
}
