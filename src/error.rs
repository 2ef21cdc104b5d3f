//! Error types for the grouping stage.
//!
//! Missing embeddings and non-converged label propagation are handled inside
//! the stage and never show up here. Everything below is fatal for a run.

use crate::model::ConceptId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GroupingError {
  /// A numeric parameter is outside its accepted range.
  #[error("invalid parameter: {0}")]
  InvalidParameter(String),

  /// An embedding (or hyperplane set) has the wrong number of dimensions.
  #[error("dimension mismatch: expected {expected} dimensions, got {got}")]
  DimensionMismatch { expected: usize, got: usize },

  /// A concept or relation endpoint has no canonical representative.
  #[error("inconsistent concept mapping: {0}")]
  InconsistentMapping(String),

  /// A concept ended up in more than one final cluster.
  #[error("concept {0} was assigned to more than one cluster")]
  DuplicateAssignment(ConceptId),
}

pub type Result<T> = std::result::Result<T, GroupingError>;

#[cfg(feature = "python")]
impl From<GroupingError> for pyo3::PyErr {
  fn from(err: GroupingError) -> Self {
    pyo3::exceptions::PyValueError::new_err(err.to_string())
  }
}
