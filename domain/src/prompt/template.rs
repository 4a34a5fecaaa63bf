//! Prompt templates for the council flow

use crate::core::question::Question;
use crate::deliberation::anonymize::AnonymizedEntry;
use crate::deliberation::value_objects::{AggregateRanking, StageOneResult};

/// A rendered prompt: optional system message plus the user message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: Option<String>,
    pub user: String,
}

impl Prompt {
    pub fn new(system: Option<&str>, user: impl Into<String>) -> Self {
        Self {
            system: system.map(str::to_string),
            user: user.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.user.trim().is_empty()
    }
}

/// Templates for generating prompts at each stage
pub struct PromptTemplate;

impl PromptTemplate {
    /// System prompt for Stage 1
    pub fn answer_system() -> &'static str {
        r#"You are a knowledgeable expert on a council of independent advisors.
Answer the question directly and accurately. Support your points with reasoning and examples where appropriate."#
    }

    /// Stage 1: the question as posed to every member
    pub fn answer(question: &Question) -> Prompt {
        Prompt::new(Some(Self::answer_system()), question.content())
    }

    /// System prompt for Stage 2
    pub fn ranking_system() -> &'static str {
        r#"You are an impartial judge comparing anonymous answers to the same question.
You do not know who wrote each answer. Judge only accuracy, completeness, and insight."#
    }

    /// Stage 2: anonymized answers plus the required ranking format
    pub fn ranking(question: &Question, entries: &[AnonymizedEntry]) -> Prompt {
        let mut user = format!(
            r#"Question: {}

Here are the answers from different advisors (anonymized):
"#,
            question.content()
        );

        for entry in entries {
            user.push_str(&format!("\n{}:\n{}\n", entry.label, entry.response));
        }

        user.push_str(
            r#"
Evaluate each answer: explain what it does well and what it does poorly.

Then end your reply with a final ranking in exactly this format:

FINAL RANKING:
1. Response X
2. Response Y
...

List every response exactly once, best first, with nothing after the list."#,
        );

        Prompt::new(Some(Self::ranking_system()), user)
    }

    /// System prompt for Stage 3
    pub fn synthesis_system() -> &'static str {
        r#"You are the chair of a council of advisors. Combine their answers into one final answer.
Favor well-supported positions, resolve disagreements explicitly, and do not mention the ranking process."#
    }

    /// Stage 3: every answer under its real identity plus the aggregate order
    pub fn synthesis(
        question: &Question,
        results: &[StageOneResult],
        ranking: &AggregateRanking,
    ) -> Prompt {
        let mut user = format!("Original question: {}\n\nAnswers:\n", question.content());

        for result in results.iter().filter(|r| r.is_success()) {
            user.push_str(&format!(
                "\n--- {} ({}) ---\n{}\n",
                result.model.display_name(),
                result.model.id(),
                result.response
            ));
        }

        if ranking.ranking_available {
            user.push_str("\nPeer ranking (best first):\n");
            for (i, entry) in ranking.entries.iter().enumerate() {
                user.push_str(&format!(
                    "{}. {} (score {:.1})\n",
                    i + 1,
                    entry.model.display_name(),
                    entry.score
                ));
            }
        } else {
            user.push_str("\nPeer ranking is unavailable for this round.\n");
        }

        user.push_str("\nWrite the final answer to the original question.");

        Prompt::new(Some(Self::synthesis_system()), user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::ModelIdentity;
    use crate::deliberation::value_objects::{
        FailureKind, FailureReason, RankedModel, TokenUsage,
    };

    fn question() -> Question {
        Question::new("Is Rust memory safe?")
    }

    #[test]
    fn test_answer_prompt_is_the_question() {
        let prompt = PromptTemplate::answer(&question());
        assert_eq!(prompt.user, "Is Rust memory safe?");
        assert!(prompt.system.is_some());
    }

    #[test]
    fn test_ranking_prompt_hides_identities() {
        let entries = vec![
            AnonymizedEntry {
                label: "Response A".to_string(),
                response: "Yes, in safe code.".to_string(),
                source_index: 1,
            },
            AnonymizedEntry {
                label: "Response B".to_string(),
                response: "Mostly.".to_string(),
                source_index: 0,
            },
        ];
        let prompt = PromptTemplate::ranking(&question(), &entries);
        assert!(prompt.user.contains("Response A:\nYes, in safe code."));
        assert!(prompt.user.contains("Response B:\nMostly."));
        assert!(prompt.user.contains("FINAL RANKING:"));
    }

    #[test]
    fn test_synthesis_prompt_reveals_identities_and_order() {
        let a = ModelIdentity::member("openai/gpt-5.1");
        let b = ModelIdentity::member("anthropic/claude-sonnet-4.5");
        let c = ModelIdentity::member("x-ai/grok-4");
        let results = vec![
            StageOneResult::success(a.clone(), "Yes.", 1, TokenUsage::default()),
            StageOneResult::success(b.clone(), "In safe Rust, yes.", 1, TokenUsage::default()),
            StageOneResult::failure(c, FailureReason::new(FailureKind::Transient, "timeout"), 1),
        ];
        let ranking = AggregateRanking {
            entries: vec![
                RankedModel { model: b, score: 4.0, average_rank: Some(1.0), votes: 2 },
                RankedModel { model: a, score: 2.0, average_rank: Some(2.0), votes: 2 },
            ],
            ranking_available: true,
            valid_judgments: 2,
        };

        let prompt = PromptTemplate::synthesis(&question(), &results, &ranking);

        assert!(prompt.user.contains("--- gpt-5.1 (openai/gpt-5.1) ---\nYes."));
        assert!(prompt.user.contains("1. claude-sonnet-4.5 (score 4.0)"));
        assert!(prompt.user.contains("2. gpt-5.1 (score 2.0)"));
        assert!(!prompt.user.contains("grok-4"));
    }

    #[test]
    fn test_synthesis_prompt_without_ranking() {
        let ranking = AggregateRanking {
            entries: Vec::new(),
            ranking_available: false,
            valid_judgments: 0,
        };
        let prompt = PromptTemplate::synthesis(&question(), &[], &ranking);
        assert!(prompt.user.contains("unavailable"));
    }
}
