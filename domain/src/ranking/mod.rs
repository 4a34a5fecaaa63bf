//! Peer ranking: judgment parsing and positional aggregation.
//!
//! # Functions
//!
//! | Function | Use Case |
//! |----------|----------|
//! | [`parse_ranking_from_text`] | Extract label order from a judge's free text |
//! | [`parse_judgment`] | Validate the order as a permutation of known labels |
//! | [`aggregate_rankings`] | Combine valid judgments into an [`AggregateRanking`](crate::AggregateRanking) |

pub mod aggregate;
pub mod parsing;

pub use aggregate::{JudgmentWeights, aggregate_rankings};
pub use parsing::{ParseError, parse_judgment, parse_ranking_from_text};
