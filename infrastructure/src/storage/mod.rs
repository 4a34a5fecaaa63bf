//! Round persistence adapters.

mod json_round_store;

pub use json_round_store::LocalRoundStore;
