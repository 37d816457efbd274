//! Confidence Ranker
//!
//! Promotes the most confidently predicted unlabeled examples into the
//! labeled pool, up to a fixed count per class. The promoted example's
//! label is overwritten with the model's prediction; wrong promotions are
//! accepted noise inherent to pseudo-labeling, not an error.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::dataset::features::EncodedFeature;
use crate::training::evaluate::PredictionRecord;

/// Select up to `k` of the most confident candidates per class from the
/// unlabeled pool and migrate them into the labeled pool.
///
/// `records` must be index-aligned with `unlabeled`. Classes are processed
/// in label-vocabulary order; a class with no candidates is skipped with a
/// diagnostic. Ties in confidence deterministically favor the candidate
/// with the lower pool index (stable descending sort).
///
/// Returns the new `(labeled, unlabeled)` pools. Total pool size is
/// invariant, and at most `k * num_labels` examples move per call.
pub fn promote_confident(
    labeled: Vec<EncodedFeature>,
    unlabeled: Vec<EncodedFeature>,
    num_labels: usize,
    records: &[PredictionRecord],
    k: usize,
) -> (Vec<EncodedFeature>, Vec<EncodedFeature>) {
    debug_assert_eq!(
        records.len(),
        unlabeled.len(),
        "confidence records must align with the unlabeled pool"
    );

    let mut by_label: Vec<Vec<usize>> = vec![Vec::new(); num_labels];
    for (index, record) in records.iter().enumerate() {
        if record.predicted < num_labels {
            by_label[record.predicted].push(index);
        }
    }

    let mut labeled = labeled;
    let mut selected: BTreeSet<usize> = BTreeSet::new();

    for label in 0..num_labels {
        let mut candidates = std::mem::take(&mut by_label[label]);
        if candidates.is_empty() {
            warn!("no unlabeled candidates predicted for class {}", label);
            continue;
        }

        // Stable sort: equal confidences keep ascending pool order
        candidates.sort_by(|&a, &b| {
            records[b]
                .confidence
                .partial_cmp(&records[a].confidence)
                .unwrap_or(Ordering::Equal)
        });

        for &index in candidates.iter().take(k) {
            let mut feature = unlabeled[index].clone();
            feature.label_id = label;
            labeled.push(feature);
            selected.insert(index);
        }
    }

    debug!(
        "promoted {} of {} unlabeled examples",
        selected.len(),
        unlabeled.len()
    );

    let unlabeled = remove_indices(unlabeled, &selected);
    (labeled, unlabeled)
}

/// Return a new pool with the given indices removed.
///
/// Pure replacement for in-place deletion: no order-of-deletion index
/// shifting to get wrong.
pub fn remove_indices<T>(pool: Vec<T>, remove: &BTreeSet<usize>) -> Vec<T> {
    pool.into_iter()
        .enumerate()
        .filter(|(index, _)| !remove.contains(index))
        .map(|(_, item)| item)
        .collect()
}
