//! Exact-match pre-grouping by normalized label.

use crate::model::{Concept, ConceptGroup};
use rustc_hash::FxHashMap;

/// Buckets concepts into exact-match groups before clustering.
///
/// Every input concept must land in exactly one returned group.
pub trait PreGrouper {
  fn group(&self, concepts: &[Concept]) -> Vec<ConceptGroup>;
}

/// Groups concepts whose normalized labels are identical.
///
/// Groups come out in order of the first appearance of their label; members
/// are sorted canonically, so the first member is the representative.
#[derive(Debug, Clone, Copy, Default)]
pub struct LemmaGrouper;

impl PreGrouper for LemmaGrouper {
  fn group(&self, concepts: &[Concept]) -> Vec<ConceptGroup> {
    let mut slot_by_label: FxHashMap<&str, usize> = FxHashMap::default();
    let mut buckets: Vec<Vec<&Concept>> = Vec::new();

    for concept in concepts {
      let slot = *slot_by_label.entry(concept.label()).or_insert_with(|| {
        buckets.push(Vec::new());
        buckets.len() - 1
      });
      buckets[slot].push(concept);
    }

    buckets
      .into_iter()
      .filter_map(ConceptGroup::from_concepts)
      .collect()
  }
}
