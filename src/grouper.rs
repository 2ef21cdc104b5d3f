//! The grouping stage end to end.
//!
//! Concepts are normalized, folded into exact-match groups, and the group
//! representatives are sketched. Representatives are then clustered either
//! by identical sketches or by approximate neighbor search followed by label
//! propagation. Clusters are finally widened back to whole groups and the
//! relations are rewritten onto canonical concepts.
//!
//! One generator, seeded from [`GroupingConfig::seed`], feeds hyperplane
//! generation, then permutation generation, then the propagation shuffles,
//! so a fixed seed gives a fixed result.

use crate::binning::bin_by_signature;
use crate::config::{GroupingConfig, Strategy};
use crate::embedding::EmbeddingLookup;
use crate::error::{GroupingError, Result};
use crate::lemma::{normalize_concepts, Lemmatizer};
use crate::merge::{merge_clusters, remap_propositions};
use crate::model::{Concept, ConceptId, Proposition};
use crate::pregroup::{LemmaGrouper, PreGrouper};
use crate::search::PermutationSearch;
use crate::sketch::RandomProjection;
use crate::utils::ratio_usize;
use crate::whispers::{ChineseWhispers, Convergence};
use rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rustc_hash::FxHashMap;
use std::borrow::Cow;

/// Counters collected during one grouping run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupingStats {
  pub input_concepts: usize,
  /// Exact-match groups after lemma normalization.
  pub unique_concepts: usize,
  /// Representatives that fell back to the unknown vector.
  pub unknown_embeddings: usize,
  /// Distinct sketches; only counted by the binning strategy.
  pub unique_signatures: usize,
  /// Similarity graph edges; only counted by the whispers strategy.
  pub candidate_pairs: usize,
  /// Propagation outcome; `None` for binning.
  pub convergence: Option<Convergence>,
  pub grouped_concepts: usize,
  pub relations: usize,
}

impl GroupingStats {
  #[must_use]
  pub fn iterations(&self) -> usize {
    self.convergence.map_or(0, Convergence::iterations)
  }
}

/// Result of [`ConceptGrouper::group`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupingOutcome {
  /// One normalized concept per cluster, in canonical order.
  pub concepts: Vec<Concept>,
  /// Relations rewritten onto canonical concepts, without self-loops.
  pub propositions: Vec<Proposition>,
  /// Concept ids per cluster; the first id is the canonical concept.
  pub clusters: Vec<Vec<ConceptId>>,
  pub stats: GroupingStats,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConceptGrouper {
  config: GroupingConfig,
}

impl ConceptGrouper {
  /// # Errors
  ///
  /// Returns an error if `config` does not validate.
  pub fn new(config: GroupingConfig) -> Result<Self> {
    config.validate()?;
    Ok(Self { config })
  }

  #[must_use]
  pub const fn config(&self) -> &GroupingConfig {
    &self.config
  }

  /// Groups `concepts` with exact-label pre-grouping.
  ///
  /// # Errors
  ///
  /// See [`ConceptGrouper::group_with`].
  pub fn group<L, E>(
    &self,
    concepts: &[Concept],
    propositions: Vec<Proposition>,
    lemmatizer: &L,
    embeddings: &E,
  ) -> Result<GroupingOutcome>
  where
    L: Lemmatizer + ?Sized,
    E: EmbeddingLookup + ?Sized,
  {
    self.group_with(
      concepts,
      propositions,
      lemmatizer,
      embeddings,
      &LemmaGrouper,
    )
  }

  /// Groups `concepts` and rewrites `propositions` onto the canonical
  /// concept of every cluster.
  ///
  /// # Errors
  ///
  /// Returns an error when an embedding has the wrong dimension, the
  /// pre-grouper drops or duplicates a concept, or a proposition refers to
  /// a concept that is not in `concepts`.
  pub fn group_with<L, E, P>(
    &self,
    concepts: &[Concept],
    propositions: Vec<Proposition>,
    lemmatizer: &L,
    embeddings: &E,
    pregrouper: &P,
  ) -> Result<GroupingOutcome>
  where
    L: Lemmatizer + ?Sized,
    E: EmbeddingLookup + ?Sized,
    P: PreGrouper + ?Sized,
  {
    log::debug!(
      "grouping with {} strategy: seed={}, num_bits={}, \
       num_permutations={}, beam_width={}, min_similarity={}",
      self.config.strategy,
      self.config.seed,
      self.config.num_bits,
      self.config.num_permutations,
      self.config.beam_width,
      self.config.min_similarity
    );

    if concepts.is_empty() {
      if let Some(proposition) = propositions.first() {
        return Err(GroupingError::InconsistentMapping(format!(
          "relation {} -> {} refers to concepts, but none were given",
          proposition.source, proposition.target
        )));
      }
      return Ok(GroupingOutcome::default());
    }

    let normalized = normalize_concepts(concepts, lemmatizer);
    let by_id: FxHashMap<ConceptId, &Concept> =
      normalized.iter().map(|concept| (concept.id(), concept)).collect();

    let groups = pregrouper.group(&normalized);
    log::info!("unique concepts: {}", groups.len());

    let representatives = groups
      .iter()
      .map(|group| {
        by_id.get(&group.representative()).copied().ok_or_else(|| {
          GroupingError::InconsistentMapping(format!(
            "group {:?} is represented by unknown concept {}",
            group.label(),
            group.representative()
          ))
        })
      })
      .collect::<Result<Vec<&Concept>>>()?;

    let mut unknown_embeddings = 0;
    let vectors: Vec<Cow<'_, [f32]>> = representatives
      .iter()
      .map(|concept| {
        embeddings.vector(concept).unwrap_or_else(|| {
          unknown_embeddings += 1;
          Cow::Borrowed(embeddings.unknown_vector())
        })
      })
      .collect();
    log::info!(
      "unknowns: {unknown_embeddings} ({:.1}%)",
      ratio_usize(unknown_embeddings, vectors.len()) * 100.0
    );

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.seed);
    let projection = RandomProjection::new(
      embeddings.dimension(),
      self.config.num_bits,
      &mut rng,
    )?;
    let sketches = projection.sketch_all(&vectors)?;

    let mut stats = GroupingStats {
      input_concepts: concepts.len(),
      unique_concepts: groups.len(),
      unknown_embeddings,
      ..GroupingStats::default()
    };

    let clusters = match self.config.strategy {
      Strategy::Binning => {
        let buckets = bin_by_signature(&sketches);
        stats.unique_signatures = buckets.len();
        buckets
      }
      Strategy::Whispers => {
        let search = PermutationSearch::from_config(&self.config)?;
        let graph = search.build_graph(&sketches, &mut rng);
        stats.candidate_pairs = graph.edge_count();
        let propagation = ChineseWhispers::new(self.config.max_iterations)
          .propagate(&graph, &mut rng);
        stats.convergence = Some(propagation.convergence());
        propagation.clusters()
      }
    };

    let merged = merge_clusters(&clusters, &groups, &normalized)?;
    let propositions = remap_propositions(propositions, &merged)?;

    let canonical = merged
      .canonical_ids()
      .into_iter()
      .filter_map(|id| by_id.get(&id).map(|&concept| concept.clone()))
      .collect::<Vec<_>>();
    stats.grouped_concepts = canonical.len();
    stats.relations = propositions.len();
    log::info!("grouped concepts: {}", stats.grouped_concepts);
    log::info!("relations: {}", stats.relations);

    Ok(GroupingOutcome {
      concepts: canonical,
      propositions,
      clusters: merged.into_clusters(),
      stats,
    })
  }
}
