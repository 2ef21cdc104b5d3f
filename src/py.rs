use crate::config::{
  GroupingConfig, Strategy, DEFAULT_BEAM_WIDTH, DEFAULT_MIN_SIMILARITY,
  DEFAULT_NUM_PERMUTATIONS, DEFAULT_SEED, MAX_ITERATIONS,
};
use crate::embedding::EmbeddingTable;
use crate::error::GroupingError;
use crate::grouper::{ConceptGrouper, GroupingOutcome};
use crate::lemma::SuffixLemmatizer;
use crate::model::{Concept, ConceptId, Proposition};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

type Relation = (usize, usize, String);
type GroupResult = (Vec<usize>, Vec<Relation>, Vec<Vec<usize>>);
type ReduceResult = (Py<PyType>, (String,), Py<PyBytes>);

/// Python handle on a configured grouping stage.
#[pyclass(name = "ConceptGrouper", module = "concept_grouper")]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PyConceptGrouper {
  config: GroupingConfig,
}

impl PyConceptGrouper {
  fn grouper(&self) -> PyResult<ConceptGrouper> {
    Ok(ConceptGrouper::new(self.config.clone())?)
  }
}

#[pymethods]
impl PyConceptGrouper {
  /// Creates a grouper. `num_bits` defaults to the strategy's sketch
  /// length (200 for whispers, 17 for binning).
  ///
  /// # Errors
  ///
  /// Returns an error for an unknown strategy or an invalid parameter.
  #[new]
  #[pyo3(signature = (
    strategy = "whispers",
    seed = DEFAULT_SEED,
    num_bits = None,
    num_permutations = DEFAULT_NUM_PERMUTATIONS,
    beam_width = DEFAULT_BEAM_WIDTH,
    min_similarity = DEFAULT_MIN_SIMILARITY,
    max_iterations = MAX_ITERATIONS,
  ))]
  pub fn new(
    strategy: &str,
    seed: u64,
    num_bits: Option<usize>,
    num_permutations: usize,
    beam_width: usize,
    min_similarity: f64,
    max_iterations: usize,
  ) -> PyResult<Self> {
    let strategy: Strategy = strategy.parse()?;
    let defaults = GroupingConfig::for_strategy(strategy);
    let config = defaults
      .clone()
      .with_seed(seed)
      .with_num_bits(num_bits.unwrap_or(defaults.num_bits))
      .with_num_permutations(num_permutations)
      .with_beam_width(beam_width)
      .with_min_similarity(min_similarity)
      .with_max_iterations(max_iterations);
    config.validate()?;
    Ok(Self { config })
  }

  /// Creates a grouper from `CONCEPT_GROUPER_*` environment variables.
  ///
  /// # Errors
  ///
  /// Returns an error when the configured strategy is unknown.
  #[classmethod]
  pub fn from_env(_cls: &Bound<'_, PyType>) -> PyResult<Self> {
    let config = GroupingConfig::from_env()?;
    config.validate()?;
    Ok(Self { config })
  }

  #[getter]
  #[must_use]
  pub fn strategy(&self) -> &'static str {
    self.config.strategy.name()
  }

  #[getter]
  #[must_use]
  pub const fn seed(&self) -> u64 {
    self.config.seed
  }

  #[getter]
  #[must_use]
  pub const fn num_bits(&self) -> usize {
    self.config.num_bits
  }

  #[getter]
  #[must_use]
  pub const fn num_permutations(&self) -> usize {
    self.config.num_permutations
  }

  #[getter]
  #[must_use]
  pub const fn beam_width(&self) -> usize {
    self.config.beam_width
  }

  #[getter]
  #[must_use]
  pub const fn min_similarity(&self) -> f64 {
    self.config.min_similarity
  }

  #[getter]
  #[must_use]
  pub const fn max_iterations(&self) -> usize {
    self.config.max_iterations
  }

  /// Groups concept strings and rewrites relations onto canonical concepts.
  ///
  /// # Arguments
  ///
  /// * `labels` - Concept surface strings; a concept is referred to by its
  ///   position in this list.
  /// * `relations` - `(source, target, relation)` triples over positions.
  /// * `embeddings` - Word vectors keyed by lemma. A `"<UNK>"` entry is used
  ///   for unknown concepts.
  /// * `unknown` - Explicit vector for unknown concepts.
  ///
  /// # Returns
  ///
  /// The positions of the canonical concepts, the remapped relations and
  /// the clusters as lists of positions, canonical first.
  ///
  /// # Errors
  ///
  /// Returns an error when vectors disagree on their dimension, no vector is
  /// given at all, two keys are equal once lowercased, or a relation refers
  /// to a position outside `labels`.
  #[pyo3(signature = (labels, relations, embeddings, unknown = None))]
  pub fn group(
    &self,
    py: Python<'_>,
    labels: Vec<String>,
    relations: Vec<Relation>,
    embeddings: HashMap<String, Vec<f32>>,
    unknown: Option<Vec<f32>>,
  ) -> PyResult<GroupResult> {
    let grouper = self.grouper()?;
    let mut pairs: Vec<(String, Vec<f32>)> = embeddings.into_iter().collect();
    pairs.sort_unstable_by(|left, right| left.0.cmp(&right.0));
    let dimension = unknown
      .as_ref()
      .map(Vec::len)
      .or_else(|| pairs.first().map(|(_, vector)| vector.len()))
      .ok_or_else(|| {
        GroupingError::InvalidParameter(
          "at least one embedding vector is required".to_string(),
        )
      })?;
    let mut table = EmbeddingTable::from_pairs(dimension, pairs)?;
    if let Some(vector) = unknown {
      table.set_unknown(vector)?;
    }

    let concepts = Concept::from_texts(&labels);
    let propositions = relations
      .into_iter()
      .map(|(source, target, relation)| {
        Proposition::new(ConceptId(source), ConceptId(target), relation)
      })
      .collect();

    let outcome: GroupingOutcome = py.allow_threads(|| {
      grouper.group(&concepts, propositions, &SuffixLemmatizer, &table)
    })?;

    let canonical = outcome
      .concepts
      .iter()
      .map(|concept| concept.id().index())
      .collect();
    let relations = outcome
      .propositions
      .into_iter()
      .map(|proposition| {
        (
          proposition.source.index(),
          proposition.target.index(),
          proposition.relation,
        )
      })
      .collect();
    let clusters = outcome
      .clusters
      .into_iter()
      .map(|cluster| cluster.into_iter().map(ConceptId::index).collect())
      .collect();
    Ok((canonical, relations, clusters))
  }

  fn __setstate__(&mut self, state: &Bound<'_, PyBytes>) -> PyResult<()> {
    let (decoded, _): (Self, usize) = bincode::serde::decode_from_slice(
      state.as_bytes(),
      bincode::config::standard(),
    )
    .map_err(|err| {
      PyValueError::new_err(format!(
        "failed to deserialize ConceptGrouper state: {err}"
      ))
    })?;
    decoded.config.validate()?;
    *self = decoded;
    Ok(())
  }

  fn __getstate__<'py>(
    &self,
    py: Python<'py>,
  ) -> PyResult<Bound<'py, PyBytes>> {
    let encoded =
      bincode::serde::encode_to_vec(self, bincode::config::standard())
        .map_err(|err| {
          PyValueError::new_err(format!(
            "failed to serialize ConceptGrouper state: {err}"
          ))
        })?;
    Ok(PyBytes::new(py, &encoded))
  }

  fn __getnewargs__(&self) -> (String,) {
    (self.config.strategy.name().to_string(),)
  }

  fn __reduce__(&self, py: Python<'_>) -> PyResult<ReduceResult> {
    let type_obj = py.get_type::<Self>().unbind();
    let state = self.__getstate__(py)?.unbind();
    Ok((type_obj, self.__getnewargs__(), state))
  }

  fn __repr__(&self) -> String {
    format!(
      "ConceptGrouper(strategy={:?}, seed={}, num_bits={}, \
       num_permutations={}, beam_width={}, min_similarity={})",
      self.config.strategy.name(),
      self.config.seed,
      self.config.num_bits,
      self.config.num_permutations,
      self.config.beam_width,
      self.config.min_similarity
    )
  }
}
