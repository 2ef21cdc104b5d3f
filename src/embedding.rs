//! Embedding lookup used to sketch representative concepts.

use crate::error::{GroupingError, Result};
use crate::model::Concept;
use rustc_hash::FxHashMap;
use std::borrow::Cow;

/// Key under which a table may carry its own out-of-vocabulary vector.
pub const UNKNOWN_KEY: &str = "<UNK>";

pub trait EmbeddingLookup {
  /// Dimension `D` shared by every vector this lookup returns.
  fn dimension(&self) -> usize;

  /// Vector for `concept`, or `None` when it is out of vocabulary.
  fn vector(&self, concept: &Concept) -> Option<Cow<'_, [f32]>>;

  /// Shared fallback for out-of-vocabulary concepts.
  ///
  /// Every unknown concept hashes to the same sketch, so they tend to fall
  /// into one cluster together.
  fn unknown_vector(&self) -> &[f32];
}

/// In-memory word vectors keyed by lowercase lemma.
///
/// A concept resolves to the vector of its whole label when present,
/// otherwise to the mean of the vectors of its known token lemmas.
#[derive(Debug, Clone)]
pub struct EmbeddingTable {
  dimension: usize,
  vectors: FxHashMap<String, Vec<f32>>,
  unknown: Vec<f32>,
}

impl EmbeddingTable {
  /// # Errors
  ///
  /// Returns an error when `dimension` is zero.
  pub fn new(dimension: usize) -> Result<Self> {
    if dimension == 0 {
      return Err(GroupingError::InvalidParameter(
        "embedding dimension must be greater than 0".to_string(),
      ));
    }
    #[allow(clippy::cast_precision_loss)]
    let fill = 1.0 / (dimension as f32).sqrt();
    Ok(Self {
      dimension,
      vectors: FxHashMap::default(),
      unknown: vec![fill; dimension],
    })
  }

  /// Builds a table from `(word, vector)` pairs.
  ///
  /// # Errors
  ///
  /// Returns an error when `dimension` is zero, any vector has another
  /// length, or two words are equal once lowercased.
  pub fn from_pairs<I, S>(dimension: usize, pairs: I) -> Result<Self>
  where
    I: IntoIterator<Item = (S, Vec<f32>)>,
    S: Into<String>,
  {
    let mut table = Self::new(dimension)?;
    for (word, vector) in pairs {
      let word = word.into();
      if table.vectors.contains_key(&word.to_lowercase()) {
        return Err(GroupingError::InvalidParameter(format!(
          "embedding key {word:?} collides with another key once lowercased"
        )));
      }
      table.insert(word, vector)?;
    }
    Ok(table)
  }

  /// Adds or replaces a vector. Inserting [`UNKNOWN_KEY`] also replaces the
  /// out-of-vocabulary fallback.
  ///
  /// # Errors
  ///
  /// Returns an error if the vector length differs from the table dimension,
  /// or if an [`UNKNOWN_KEY`] vector is all zeros.
  pub fn insert(
    &mut self,
    word: impl Into<String>,
    vector: Vec<f32>,
  ) -> Result<()> {
    self.ensure_dimension(vector.len())?;
    let word = word.into();
    if word == UNKNOWN_KEY {
      ensure_non_zero(&vector)?;
      self.unknown.clone_from(&vector);
    }
    self.vectors.insert(word.to_lowercase(), vector);
    Ok(())
  }

  /// # Errors
  ///
  /// Returns an error if the vector length differs from the table dimension
  /// or the vector is all zeros.
  pub fn set_unknown(&mut self, vector: Vec<f32>) -> Result<()> {
    self.ensure_dimension(vector.len())?;
    ensure_non_zero(&vector)?;
    self.unknown = vector;
    Ok(())
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.vectors.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.vectors.is_empty()
  }

  fn ensure_dimension(&self, len: usize) -> Result<()> {
    if len != self.dimension {
      return Err(GroupingError::DimensionMismatch {
        expected: self.dimension,
        got: len,
      });
    }
    Ok(())
  }

  fn mean_of_tokens(&self, concept: &Concept) -> Option<Vec<f32>> {
    let mut sum = vec![0.0f32; self.dimension];
    let mut found = 0usize;
    for token in concept.tokens() {
      if let Some(vector) = self.vectors.get(&token.lemma.to_lowercase()) {
        for (acc, &value) in sum.iter_mut().zip(vector) {
          *acc += value;
        }
        found += 1;
      }
    }
    if found == 0 {
      return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let scale = 1.0 / found as f32;
    sum.iter_mut().for_each(|value| *value *= scale);
    Some(sum)
  }
}

impl EmbeddingLookup for EmbeddingTable {
  fn dimension(&self) -> usize {
    self.dimension
  }

  fn vector(&self, concept: &Concept) -> Option<Cow<'_, [f32]>> {
    if let Some(vector) = self.vectors.get(concept.label()) {
      return Some(Cow::Borrowed(vector.as_slice()));
    }
    if concept.tokens().len() < 2 {
      return None;
    }
    self.mean_of_tokens(concept).map(Cow::Owned)
  }

  fn unknown_vector(&self) -> &[f32] {
    &self.unknown
  }
}

fn ensure_non_zero(vector: &[f32]) -> Result<()> {
  if vector.iter().all(|&value| value == 0.0) {
    return Err(GroupingError::InvalidParameter(
      "unknown vector must not be the zero vector".to_string(),
    ));
  }
  Ok(())
}
