//! Fuses clusters of representatives with their exact-match groups and
//! rewrites relations onto canonical concepts.

use crate::error::{GroupingError, Result};
use crate::model::{Concept, ConceptGroup, ConceptId, Proposition};
use rustc_hash::FxHashMap;

/// Final clusters and the concept to canonical-representative mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedClusters {
  clusters: Vec<Vec<ConceptId>>,
  canonical: FxHashMap<ConceptId, ConceptId>,
}

impl MergedClusters {
  /// Clusters in canonical order; each lists its canonical concept first.
  #[must_use]
  pub fn clusters(&self) -> &[Vec<ConceptId>] {
    &self.clusters
  }

  /// One canonical concept per cluster.
  #[must_use]
  pub fn canonical_ids(&self) -> Vec<ConceptId> {
    self.clusters.iter().map(|cluster| cluster[0]).collect()
  }

  #[must_use]
  pub fn canonical_of(&self, id: ConceptId) -> Option<ConceptId> {
    self.canonical.get(&id).copied()
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.clusters.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.clusters.is_empty()
  }

  /// Number of concepts covered by the mapping.
  #[must_use]
  pub fn concept_count(&self) -> usize {
    self.canonical.len()
  }

  pub(crate) fn into_clusters(self) -> Vec<Vec<ConceptId>> {
    self.clusters
  }
}

/// Expands clusters of group indices into clusters of concepts.
///
/// `clusters` holds indices into `groups`. Each cluster is widened to every
/// member of its groups and sorted with [`Concept::canonical_cmp`]; the first
/// concept becomes the canonical representative of all the others. The
/// clusters themselves come out ordered by their canonical concepts.
///
/// # Errors
///
/// Fails when a cluster names a group that does not exist, a group member
/// is missing from `concepts`, a concept lands in two clusters, or a concept
/// lands in none.
pub fn merge_clusters(
  clusters: &[Vec<usize>],
  groups: &[ConceptGroup],
  concepts: &[Concept],
) -> Result<MergedClusters> {
  let by_id: FxHashMap<ConceptId, &Concept> =
    concepts.iter().map(|concept| (concept.id(), concept)).collect();

  let mut expanded: Vec<Vec<&Concept>> = Vec::with_capacity(clusters.len());
  for cluster in clusters {
    let mut members: Vec<&Concept> = Vec::new();
    for &group_index in cluster {
      let group = groups.get(group_index).ok_or_else(|| {
        GroupingError::InconsistentMapping(format!(
          "cluster refers to group {group_index}, but only {} groups exist",
          groups.len()
        ))
      })?;
      for id in group.members() {
        let concept = by_id.get(id).ok_or_else(|| {
          GroupingError::InconsistentMapping(format!(
            "group {:?} lists unknown concept {id}",
            group.label()
          ))
        })?;
        members.push(concept);
      }
    }
    if members.is_empty() {
      continue;
    }
    members.sort_by(|left, right| left.canonical_cmp(right));
    expanded.push(members);
  }
  expanded.sort_by(|left, right| left[0].canonical_cmp(right[0]));

  let mut canonical: FxHashMap<ConceptId, ConceptId> = FxHashMap::default();
  for members in &expanded {
    let representative = members[0].id();
    for concept in members {
      if canonical.insert(concept.id(), representative).is_some() {
        return Err(GroupingError::DuplicateAssignment(concept.id()));
      }
    }
  }

  if let Some(missing) = concepts
    .iter()
    .find(|concept| !canonical.contains_key(&concept.id()))
  {
    return Err(GroupingError::InconsistentMapping(format!(
      "concept {} ({:?}) is not part of any cluster",
      missing.id(),
      missing.label()
    )));
  }

  let clusters = expanded
    .into_iter()
    .map(|members| members.into_iter().map(Concept::id).collect())
    .collect();
  Ok(MergedClusters {
    clusters,
    canonical,
  })
}

/// Points every proposition at canonical concepts and drops the ones that
/// collapse into a self-loop. Survivors keep their relative order.
///
/// # Errors
///
/// Fails when an endpoint has no canonical concept, which means grouping
/// lost a concept.
pub fn remap_propositions(
  propositions: Vec<Proposition>,
  merged: &MergedClusters,
) -> Result<Vec<Proposition>> {
  let resolve = |id: ConceptId| {
    merged.canonical_of(id).ok_or_else(|| {
      GroupingError::InconsistentMapping(format!(
        "relation endpoint {id} has no canonical concept"
      ))
    })
  };

  let mut kept = Vec::with_capacity(propositions.len());
  for mut proposition in propositions {
    proposition.source = resolve(proposition.source)?;
    proposition.target = resolve(proposition.target)?;
    if !proposition.is_self_loop() {
      kept.push(proposition);
    }
  }
  Ok(kept)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lemma::{normalize_concepts, SuffixLemmatizer};
  use crate::pregroup::{LemmaGrouper, PreGrouper};

  fn setup(texts: &[&str]) -> (Vec<Concept>, Vec<ConceptGroup>) {
    let concepts =
      normalize_concepts(&Concept::from_texts(texts), &SuffixLemmatizer);
    let groups = LemmaGrouper.group(&concepts);
    (concepts, groups)
  }

  #[test]
  fn clusters_expand_to_group_members_and_pick_smallest() {
    // groups: 0 "cat" {0, 2}, 1 "kitten" {1}, 2 "dog" {3}
    let (concepts, groups) = setup(&["cats", "kitten", "cat", "dog"]);
    let merged = merge_clusters(&[vec![1, 0], vec![2]], &groups, &concepts)
      .unwrap();

    assert_eq!(
      merged.clusters(),
      [
        vec![ConceptId(2), ConceptId(0), ConceptId(1)],
        vec![ConceptId(3)]
      ]
    );
    assert_eq!(merged.canonical_of(ConceptId(1)), Some(ConceptId(2)));
    assert_eq!(merged.canonical_of(ConceptId(2)), Some(ConceptId(2)));
    assert_eq!(merged.canonical_ids(), [ConceptId(2), ConceptId(3)]);
    assert_eq!(merged.concept_count(), 4);
  }

  #[test]
  fn remapping_drops_self_loops_and_keeps_order() {
    let (concepts, groups) = setup(&["cats", "kitten", "cat", "dog"]);
    let merged =
      merge_clusters(&[vec![0, 1], vec![2]], &groups, &concepts).unwrap();

    let propositions = vec![
      Proposition::new(ConceptId(0), ConceptId(3), "chases"),
      Proposition::new(ConceptId(1), ConceptId(2), "is"),
      Proposition::new(ConceptId(3), ConceptId(1), "chases"),
    ];
    let kept = remap_propositions(propositions, &merged).unwrap();

    assert_eq!(
      kept,
      [
        Proposition::new(ConceptId(2), ConceptId(3), "chases"),
        Proposition::new(ConceptId(3), ConceptId(2), "chases"),
      ]
    );
  }

  #[test]
  fn unknown_endpoint_is_fatal() {
    let (concepts, groups) = setup(&["dog"]);
    let merged = merge_clusters(&[vec![0]], &groups, &concepts).unwrap();
    let result = remap_propositions(
      vec![Proposition::new(ConceptId(0), ConceptId(9), "x")],
      &merged,
    );
    assert!(matches!(result, Err(GroupingError::InconsistentMapping(_))));
  }

  #[test]
  fn concept_in_two_clusters_is_rejected() {
    let (concepts, groups) = setup(&["dog", "cat"]);
    let result = merge_clusters(&[vec![0], vec![0, 1]], &groups, &concepts);
    assert_eq!(result, Err(GroupingError::DuplicateAssignment(ConceptId(0))));
  }

  #[test]
  fn unclustered_concept_is_rejected() {
    let (concepts, groups) = setup(&["dog", "cat"]);
    let result = merge_clusters(&[vec![0]], &groups, &concepts);
    assert!(matches!(result, Err(GroupingError::InconsistentMapping(_))));
    let result = merge_clusters(&[vec![0], vec![7]], &groups, &concepts);
    assert!(matches!(result, Err(GroupingError::InconsistentMapping(_))));
  }

  #[test]
  fn empty_input_merges_to_nothing() {
    let merged = merge_clusters(&[], &[], &[]).unwrap();
    assert!(merged.is_empty());
    assert!(remap_propositions(Vec::new(), &merged).unwrap().is_empty());
  }
}
