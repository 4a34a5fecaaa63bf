//! Per-round anonymization of Stage 1 responses.
//!
//! Judges see answers as `Response A`, `Response B`, ... The assignment of
//! labels to models is a fresh random permutation every round, and answers
//! are presented in label order, so neither a label nor a position tells a
//! judge which answer is its own.

use super::value_objects::StageOneResult;
use crate::core::model::ModelIdentity;
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashMap;

/// Common prefix of every opaque label.
pub const LABEL_PREFIX: &str = "Response ";

/// Label for the `index`-th slot: `Response A` .. `Response Z`, then
/// `Response AA`, `Response AB`, ...
pub fn label_for(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(char::from(b'A' + (n % 26) as u8));
        n /= 26;
    }
    letters.reverse();
    let suffix: String = letters.into_iter().collect();
    format!("{LABEL_PREFIX}{suffix}")
}

/// One anonymized answer as shown to a judge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnonymizedEntry {
    pub label: String,
    pub response: String,
    /// Index of the originating [`StageOneResult`] in configuration order.
    pub source_index: usize,
}

/// Label → identity mapping for one round
///
/// Lives only as long as the round; it is never serialized.
#[derive(Debug, Clone, Default)]
pub struct LabelMap {
    by_label: HashMap<String, ModelIdentity>,
    labels: Vec<String>,
}

impl LabelMap {
    /// The identity behind a label.
    pub fn reveal(&self, label: &str) -> Option<&ModelIdentity> {
        self.by_label.get(label)
    }

    /// The label assigned to a model this round.
    pub fn label_of(&self, model: &ModelIdentity) -> Option<&str> {
        self.by_label
            .iter()
            .find(|(_, m)| *m == model)
            .map(|(label, _)| label.as_str())
    }

    /// All labels in presentation order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Assigns and reverses opaque labels
pub struct AnonymizingMapper;

impl AnonymizingMapper {
    /// Anonymize the successful results with a thread-local RNG.
    pub fn anonymize(results: &[StageOneResult]) -> (LabelMap, Vec<AnonymizedEntry>) {
        Self::anonymize_with_rng(results, &mut rand::thread_rng())
    }

    /// Anonymize with a caller-supplied RNG.
    ///
    /// Failed results are skipped. Entries come back sorted by label.
    pub fn anonymize_with_rng<R: Rng + ?Sized>(
        results: &[StageOneResult],
        rng: &mut R,
    ) -> (LabelMap, Vec<AnonymizedEntry>) {
        let sources: Vec<usize> = results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_success())
            .map(|(i, _)| i)
            .collect();

        let mut slots: Vec<usize> = (0..sources.len()).collect();
        slots.shuffle(rng);

        let mut assigned: Vec<(usize, usize)> = sources.into_iter().zip(slots).collect();
        assigned.sort_by_key(|(_, slot)| *slot);

        let mut map = LabelMap::default();
        let mut entries = Vec::with_capacity(assigned.len());
        for (source_index, slot) in assigned {
            let label = label_for(slot);
            let result = &results[source_index];
            map.by_label.insert(label.clone(), result.model.clone());
            map.labels.push(label.clone());
            entries.push(AnonymizedEntry {
                label,
                response: result.response.clone(),
                source_index,
            });
        }

        (map, entries)
    }

    /// Reverse a label to the model that produced it.
    pub fn reveal<'a>(map: &'a LabelMap, label: &str) -> Option<&'a ModelIdentity> {
        map.reveal(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deliberation::value_objects::{FailureKind, FailureReason, TokenUsage};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn ok(id: &str) -> StageOneResult {
        StageOneResult::success(ModelIdentity::member(id), format!("answer from {id}"), 5, TokenUsage::default())
    }

    fn failed(id: &str) -> StageOneResult {
        StageOneResult::failure(
            ModelIdentity::member(id),
            FailureReason::new(FailureKind::Transient, "503"),
            5,
        )
    }

    #[test]
    fn test_label_sequence() {
        assert_eq!(label_for(0), "Response A");
        assert_eq!(label_for(2), "Response C");
        assert_eq!(label_for(25), "Response Z");
        assert_eq!(label_for(26), "Response AA");
        assert_eq!(label_for(27), "Response AB");
    }

    #[test]
    fn test_reveal_matches_entry_origin() {
        let results = vec![ok("a"), ok("b"), ok("c"), ok("d")];
        let mut rng = StdRng::seed_from_u64(7);
        let (map, entries) = AnonymizingMapper::anonymize_with_rng(&results, &mut rng);

        assert_eq!(entries.len(), 4);
        for entry in &entries {
            let model = AnonymizingMapper::reveal(&map, &entry.label).unwrap();
            assert_eq!(model, &results[entry.source_index].model);
            assert_eq!(entry.response, results[entry.source_index].response);
            assert_eq!(map.label_of(model), Some(entry.label.as_str()));
        }
        let labels: HashSet<&str> = entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels.len(), 4);
    }

    #[test]
    fn test_entries_sorted_by_label() {
        let results = vec![ok("a"), ok("b"), ok("c")];
        let (map, entries) = AnonymizingMapper::anonymize(&results);
        let labels: Vec<&str> = entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Response A", "Response B", "Response C"]);
        assert_eq!(map.labels(), &["Response A", "Response B", "Response C"]);
    }

    #[test]
    fn test_failed_results_excluded() {
        let results = vec![ok("a"), failed("b"), ok("c")];
        let (map, entries) = AnonymizingMapper::anonymize(&results);
        assert_eq!(map.len(), 2);
        assert!(entries.iter().all(|e| e.source_index != 1));
        assert!(map.label_of(&ModelIdentity::member("b")).is_none());
        assert!(map.reveal("Response C").is_none());
    }

    #[test]
    fn test_permutation_is_fresh_each_round() {
        let results = vec![ok("a"), ok("b"), ok("c"), ok("d")];
        let assignments: HashSet<Vec<usize>> = (0..50)
            .map(|_| {
                let (_, entries) = AnonymizingMapper::anonymize(&results);
                entries.iter().map(|e| e.source_index).collect()
            })
            .collect();
        assert!(assignments.len() > 1);
    }

    #[test]
    fn test_empty_input() {
        let (map, entries) = AnonymizingMapper::anonymize(&[failed("a")]);
        assert!(map.is_empty());
        assert!(entries.is_empty());
    }
}
