//! Concept deduplication and clustering.
//!
//! Concept mentions are folded into exact-match groups by normalized label,
//! the group representatives are hashed into binary sketches by sign random
//! projection of their embeddings, and similar sketches are clustered. Two
//! strategies are available:
//!
//! - [`Strategy::Binning`]: one cluster per distinct sketch.
//! - [`Strategy::Whispers`]: permutation-sorted approximate neighbor search
//!   builds a similarity graph that Chinese Whispers label propagation
//!   splits into clusters.
//!
//! Every cluster is then reduced to one canonical concept, and relations are
//! rewritten onto canonical concepts with self-loops removed.
//!
//! ```
//! use concept_grouper::{
//!   Concept, ConceptGrouper, ConceptId, EmbeddingTable, Proposition,
//!   SuffixLemmatizer,
//! };
//!
//! let embeddings = EmbeddingTable::from_pairs(
//!   2,
//!   [("cat", vec![1.0, 0.0]), ("dog", vec![0.0, 1.0])],
//! )?;
//! let concepts = Concept::from_texts(&["cats", "dog", "cat"]);
//! let relations =
//!   vec![Proposition::new(ConceptId(0), ConceptId(1), "chases")];
//!
//! let outcome = ConceptGrouper::default().group(
//!   &concepts,
//!   relations,
//!   &SuffixLemmatizer,
//!   &embeddings,
//! )?;
//! assert_eq!(outcome.concepts.len(), 2);
//! assert_eq!(outcome.propositions[0].source, ConceptId(2));
//! # Ok::<(), concept_grouper::GroupingError>(())
//! ```

pub mod binning;
pub mod config;
pub mod embedding;
mod env;
pub mod error;
pub mod graph;
pub mod grouper;
pub mod lemma;
pub mod merge;
pub mod model;
pub mod pregroup;
#[cfg(feature = "python")]
mod py;
pub mod search;
pub mod sketch;
mod utils;
pub mod whispers;

pub use crate::config::{GroupingConfig, Strategy};
pub use crate::embedding::{EmbeddingLookup, EmbeddingTable, UNKNOWN_KEY};
pub use crate::error::{GroupingError, Result};
pub use crate::graph::SimilarityGraph;
pub use crate::grouper::{ConceptGrouper, GroupingOutcome, GroupingStats};
pub use crate::lemma::{Lemmatizer, SuffixLemmatizer};
pub use crate::merge::{merge_clusters, remap_propositions, MergedClusters};
pub use crate::model::{Concept, ConceptGroup, ConceptId, Proposition, Token};
pub use crate::pregroup::{LemmaGrouper, PreGrouper};
pub use crate::search::{hamming_similarity, PermutationSearch};
pub use crate::sketch::{RandomProjection, SketchMatrix};
pub use crate::whispers::{
  iterate_until, ChineseWhispers, Convergence, Propagation,
};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Python module exposing the grouping stage.
///
/// # Errors
///
/// Returns an error if the class cannot be registered.
#[cfg(feature = "python")]
#[pymodule]
pub fn concept_grouper(m: &Bound<'_, PyModule>) -> PyResult<()> {
  m.add_class::<py::PyConceptGrouper>()?;
  Ok(())
}
