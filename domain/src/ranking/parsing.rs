//! Ranking judgment parsing.
//!
//! Judges are asked to end with a `FINAL RANKING:` section listing labels
//! best first. Replies are free text, so extraction is best-effort and
//! followed by a strict validation step:
//!
//! 1. Text after the last `FINAL RANKING:` header (case-insensitive) is
//!    searched for numbered lines (`1. Response C`); if there are none, for
//!    `Response X` mentions in order.
//! 2. Without a header, mentions across the whole reply are used.
//! 3. Repeated labels keep their first position.
//! 4. A label is one or two capitals standing alone, so prose such as
//!    `Response AI-generated` is not read as a label.
//! 5. The result must be a permutation of the known labels. Exactly one
//!    missing label is tolerated and appended last.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)final\s+ranking\s*:").expect("header pattern is valid"));

static NUMBERED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*\d+\s*[.)]\s*(?:\*\*)?\s*Response\s+([A-Z]{1,2})(?:[^\w-]|$)")
        .expect("numbered pattern is valid")
});

static MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bResponse\s+([A-Z]{1,2})(?:[^\w-]|$)").expect("mention pattern is valid")
});

/// A judgment that is not a usable permutation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("no response labels found in judgment")]
    NoLabels,

    #[error("judgment ranks unknown label {0}")]
    UnknownLabel(String),

    #[error("judgment omits {} labels: {}", .0.len(), .0.join(", "))]
    Incomplete(Vec<String>),
}

/// Extract labels in ranked order, without validation.
pub fn parse_ranking_from_text(text: &str) -> Vec<String> {
    let labels = match HEADER.find_iter(text).last() {
        Some(header) => {
            let section = &text[header.end()..];
            let numbered = captures(&NUMBERED, section);
            if numbered.is_empty() {
                captures(&MENTION, section)
            } else {
                numbered
            }
        }
        None => captures(&MENTION, text),
    };

    let mut ordered: Vec<String> = Vec::with_capacity(labels.len());
    for label in labels {
        if !ordered.contains(&label) {
            ordered.push(label);
        }
    }
    ordered
}

fn captures(pattern: &Regex, text: &str) -> Vec<String> {
    pattern
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| format!("Response {}", m.as_str()))
        .collect()
}

/// Parse a judgment into a full order over `known` labels.
pub fn parse_judgment(text: &str, known: &[String]) -> Result<Vec<String>, ParseError> {
    let mut order = parse_ranking_from_text(text);
    if order.is_empty() {
        return Err(ParseError::NoLabels);
    }
    if let Some(unknown) = order.iter().find(|label| !known.contains(label)) {
        return Err(ParseError::UnknownLabel(unknown.clone()));
    }

    let missing: Vec<String> = known
        .iter()
        .filter(|label| !order.contains(label))
        .cloned()
        .collect();
    match missing.len() {
        0 => Ok(order),
        1 => {
            order.extend(missing);
            Ok(order)
        }
        _ => Err(ParseError::Incomplete(missing)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(n: usize) -> Vec<String> {
        (0..n).map(crate::deliberation::anonymize::label_for).collect()
    }

    #[test]
    fn test_numbered_final_ranking() {
        let text = "Response A is thorough but Response C is wrong.\n\n\
                    FINAL RANKING:\n1. Response B\n2. Response A\n3. Response C\n";
        assert_eq!(
            parse_ranking_from_text(text),
            vec!["Response B", "Response A", "Response C"]
        );
    }

    #[test]
    fn test_markdown_decorated_ranking() {
        let text = "**Final Ranking:**\n1) **Response C** - best\n2) **Response A**\n3) Response B";
        assert_eq!(
            parse_judgment(text, &known(3)).unwrap(),
            vec!["Response C", "Response A", "Response B"]
        );
    }

    #[test]
    fn test_hyphenated_words_are_not_labels() {
        let text = "Response AI-generated content aside, Response B is the most careful.\n\n\
                    FINAL RANKING:\n1. Response B\n2. Response A\n3. Response C";
        assert_eq!(
            parse_judgment(text, &known(3)).unwrap(),
            vec!["Response B", "Response A", "Response C"]
        );

        let mentions = "Response AI-generated filler. Response C, then Response A.";
        assert_eq!(parse_ranking_from_text(mentions), vec!["Response C", "Response A"]);
        assert_eq!(
            parse_judgment(mentions, &known(3)).unwrap(),
            vec!["Response C", "Response A", "Response B"]
        );
    }

    #[test]
    fn test_last_header_wins() {
        let text = "I will end with FINAL RANKING: as asked.\n\
                    Analysis...\n\
                    FINAL RANKING:\n1. Response C\n2. Response B\n3. Response A";
        assert_eq!(
            parse_judgment(text, &known(3)).unwrap(),
            vec!["Response C", "Response B", "Response A"]
        );
    }

    #[test]
    fn test_unnumbered_section_uses_mention_order() {
        let text = "FINAL RANKING: Response B, then Response C, then Response A";
        assert_eq!(
            parse_ranking_from_text(text),
            vec!["Response B", "Response C", "Response A"]
        );
    }

    #[test]
    fn test_no_header_falls_back_to_mentions() {
        let text = "Response B > Response A > Response C, and Response B again.";
        assert_eq!(
            parse_judgment(text, &known(3)).unwrap(),
            vec!["Response B", "Response A", "Response C"]
        );
    }

    #[test]
    fn test_single_missing_label_is_inferred_last() {
        let text = "FINAL RANKING:\n1. Response C\n2. Response A";
        assert_eq!(
            parse_judgment(text, &known(3)).unwrap(),
            vec!["Response C", "Response A", "Response B"]
        );
    }

    #[test]
    fn test_two_missing_labels_rejected() {
        let text = "FINAL RANKING:\n1. Response D";
        let err = parse_judgment(text, &known(4)).unwrap_err();
        assert_eq!(
            err,
            ParseError::Incomplete(vec![
                "Response A".to_string(),
                "Response B".to_string(),
                "Response C".to_string()
            ])
        );
    }

    #[test]
    fn test_unknown_label_rejected() {
        let text = "FINAL RANKING:\n1. Response A\n2. Response E\n3. Response B";
        assert_eq!(
            parse_judgment(text, &known(3)).unwrap_err(),
            ParseError::UnknownLabel("Response E".to_string())
        );
    }

    #[test]
    fn test_no_labels() {
        assert_eq!(
            parse_judgment("They are all great answers.", &known(3)).unwrap_err(),
            ParseError::NoLabels
        );
    }

    #[test]
    fn test_lowercase_response_is_not_a_label() {
        assert!(parse_ranking_from_text("the response a user wants").is_empty());
    }

    #[test]
    fn test_messy_corpus_never_panics() {
        let corpus = [
            "",
            "FINAL RANKING:",
            "FINAL RANKING:\n\n\n",
            "final ranking: response a",
            "1. Response\n2. Response Z",
            "FINAL RANKING:\n1. Response AA\n2. Response A",
            "Response A Response A Response A",
            "FINAL RANKING:\n- Response B\n- Response A\n- Response C",
            "日本語 FINAL RANKING: 1. Response B 2. Response A",
        ];
        for text in corpus {
            let _ = parse_ranking_from_text(text);
            let _ = parse_judgment(text, &known(3));
        }
    }

    #[test]
    fn test_bulleted_section_uses_mentions() {
        let text = "FINAL RANKING:\n- Response B\n- Response A\n- Response C";
        assert_eq!(
            parse_judgment(text, &known(3)).unwrap(),
            vec!["Response B", "Response A", "Response C"]
        );
    }
}
