//! Positional aggregation of ranking judgments.
//!
//! A judgment ordering `n` labels gives `n` points to its first label,
//! `n - 1` to the second, down to 1 for the last, multiplied by the judge's
//! weight. Totals are sorted descending; ties keep configuration order.

use crate::core::model::ModelIdentity;
use crate::deliberation::anonymize::LabelMap;
use crate::deliberation::value_objects::{AggregateRanking, RankedModel, RankingJudgment};

/// Per-judge weighting
#[derive(Debug, Clone)]
pub struct JudgmentWeights {
    lead: Option<ModelIdentity>,
    lead_weight: f64,
}

impl JudgmentWeights {
    /// Every judgment counts the same.
    pub fn equal() -> Self {
        Self {
            lead: None,
            lead_weight: 1.0,
        }
    }

    /// Scale the lead model's own judgment by `weight`.
    pub fn with_lead(lead: ModelIdentity, weight: f64) -> Self {
        Self {
            lead: Some(lead),
            lead_weight: weight,
        }
    }

    pub fn weight_for(&self, judge: &ModelIdentity) -> f64 {
        match &self.lead {
            Some(lead) if lead == judge => self.lead_weight,
            _ => 1.0,
        }
    }
}

impl Default for JudgmentWeights {
    fn default() -> Self {
        Self::equal()
    }
}

#[derive(Default)]
struct Tally {
    score: f64,
    rank_sum: usize,
    votes: usize,
}

/// Combine judgments into an aggregate ranking over `candidates`.
///
/// `candidates` are the models with a successful Stage 1 result, in
/// configuration order; each appears exactly once in the output. Invalid
/// judgments are ignored. With no valid judgment the output keeps
/// configuration order and reports `ranking_available = false`.
pub fn aggregate_rankings(
    judgments: &[RankingJudgment],
    labels: &LabelMap,
    candidates: &[ModelIdentity],
    weights: &JudgmentWeights,
) -> AggregateRanking {
    let mut tallies: Vec<Tally> = candidates.iter().map(|_| Tally::default()).collect();
    let mut valid_judgments = 0;

    for judgment in judgments.iter().filter(|j| j.is_valid()) {
        valid_judgments += 1;
        let weight = weights.weight_for(&judgment.judge);
        let n = judgment.order.len();
        for (position, label) in judgment.order.iter().enumerate() {
            let Some(model) = labels.reveal(label) else {
                continue;
            };
            let Some(slot) = candidates.iter().position(|c| c == model) else {
                continue;
            };
            let tally = &mut tallies[slot];
            tally.score += (n - position) as f64 * weight;
            tally.rank_sum += position + 1;
            tally.votes += 1;
        }
    }

    let mut entries: Vec<RankedModel> = candidates
        .iter()
        .zip(tallies)
        .map(|(model, tally)| RankedModel {
            model: model.clone(),
            score: tally.score,
            average_rank: (tally.votes > 0).then(|| tally.rank_sum as f64 / tally.votes as f64),
            votes: tally.votes,
        })
        .collect();

    let ranking_available = valid_judgments > 0;
    if ranking_available {
        // sort_by is stable, so equal scores keep configuration order
        entries.sort_by(|a, b| b.score.total_cmp(&a.score));
    }

    AggregateRanking {
        entries,
        ranking_available,
        valid_judgments,
    }
}
