//! Sign random projection: embedding vectors to binary sketches.
//!
//! A `D x d` matrix of independent standard-normal values is drawn once from
//! the run's generator. Bit `j` of a sketch is set when the dot product of
//! the embedding with hyperplane `j` is non-negative. For two vectors at
//! angle θ each bit differs with probability θ/π, so the Hamming rate of two
//! sketches estimates the angle and `cos(π · rate)` the cosine similarity.
//!
//! References:
//! - Charikar (2002). "Similarity estimation techniques from rounding
//!   algorithms."

use crate::error::{GroupingError, Result};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;

const WORD_BITS: usize = 64;

#[inline]
const fn words_for_bits(num_bits: usize) -> usize {
  num_bits.div_ceil(WORD_BITS)
}

/// Random hyperplanes shared by every sketch of a run.
#[derive(Debug, Clone)]
pub struct RandomProjection {
  dimension: usize,
  num_bits: usize,
  /// Row-major `dimension x num_bits`.
  hyperplanes: Vec<f32>,
}

impl RandomProjection {
  /// Draws `dimension * num_bits` standard-normal values from `rng`, row by
  /// row over the input dimensions.
  ///
  /// # Errors
  ///
  /// Returns an error when `dimension` or `num_bits` is zero, or the
  /// hyperplane matrix would not fit in memory.
  pub fn new<R: Rng + ?Sized>(
    dimension: usize,
    num_bits: usize,
    rng: &mut R,
  ) -> Result<Self> {
    if dimension == 0 {
      return Err(GroupingError::InvalidParameter(
        "embedding dimension must be greater than 0".to_string(),
      ));
    }
    if num_bits == 0 {
      return Err(GroupingError::InvalidParameter(
        "num_bits must be greater than 0".to_string(),
      ));
    }

    let max_len = isize::MAX.unsigned_abs() / std::mem::size_of::<f32>();
    let len = dimension
      .checked_mul(num_bits)
      .filter(|&len| len <= max_len)
      .ok_or_else(|| {
        GroupingError::InvalidParameter(format!(
          "{dimension} x {num_bits} hyperplane matrix is too large"
        ))
      })?;
    let hyperplanes = (0..len)
      .map(|_| StandardNormal.sample(&mut *rng))
      .collect();

    Ok(Self {
      dimension,
      num_bits,
      hyperplanes,
    })
  }

  #[must_use]
  pub const fn dimension(&self) -> usize {
    self.dimension
  }

  #[must_use]
  pub const fn num_bits(&self) -> usize {
    self.num_bits
  }

  /// Dot products of `vector` with every hyperplane.
  ///
  /// # Errors
  ///
  /// Returns an error if `vector` does not have `dimension` entries.
  pub fn project(&self, vector: &[f32]) -> Result<Vec<f32>> {
    self.ensure_dimension(vector.len())?;
    let mut dots = vec![0.0f32; self.num_bits];
    for (&value, plane_row) in
      vector.iter().zip(self.hyperplanes.chunks_exact(self.num_bits))
    {
      for (dot, &weight) in dots.iter_mut().zip(plane_row) {
        *dot += value * weight;
      }
    }
    Ok(dots)
  }

  /// # Errors
  ///
  /// Returns an error if `vector` does not have `dimension` entries.
  pub fn sketch(&self, vector: &[f32]) -> Result<Vec<u64>> {
    let mut words = vec![0u64; words_for_bits(self.num_bits)];
    self.sketch_into(vector, &mut words)?;
    Ok(words)
  }

  fn sketch_into(&self, vector: &[f32], words: &mut [u64]) -> Result<()> {
    let dots = self.project(vector)?;
    words.fill(0);
    for (bit, &dot) in dots.iter().enumerate() {
      if dot >= 0.0 {
        words[bit / WORD_BITS] |= 1u64 << (bit % WORD_BITS);
      }
    }
    Ok(())
  }

  /// Sketches every vector into one row-major matrix, rows in input order.
  ///
  /// # Errors
  ///
  /// Returns an error if any vector does not have `dimension` entries.
  pub fn sketch_all<V>(&self, vectors: &[V]) -> Result<SketchMatrix>
  where
    V: AsRef<[f32]> + Sync,
  {
    for vector in vectors {
      self.ensure_dimension(vector.as_ref().len())?;
    }

    let mut matrix = SketchMatrix::zeroed(self.num_bits, vectors.len());
    if vectors.is_empty() {
      return Ok(matrix);
    }
    let words_per_row = matrix.words_per_row;
    matrix
      .data
      .par_chunks_mut(words_per_row)
      .zip(vectors.par_iter())
      .try_for_each(|(words, vector)| {
        self.sketch_into(vector.as_ref(), words)
      })?;
    Ok(matrix)
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
}

/// Fixed-length binary sketches packed into 64-bit words, one row per item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SketchMatrix {
  num_bits: usize,
  words_per_row: usize,
  rows: usize,
  data: Vec<u64>,
}

impl SketchMatrix {
  fn zeroed(num_bits: usize, rows: usize) -> Self {
    let words_per_row = words_for_bits(num_bits);
    Self {
      num_bits,
      words_per_row,
      rows,
      data: vec![0u64; words_per_row * rows],
    }
  }

  /// Builds a matrix from explicit bit rows.
  ///
  /// # Errors
  ///
  /// Returns an error when `num_bits` is zero or a row has another length.
  pub fn from_bits(num_bits: usize, rows: &[Vec<bool>]) -> Result<Self> {
    if num_bits == 0 {
      return Err(GroupingError::InvalidParameter(
        "num_bits must be greater than 0".to_string(),
      ));
    }
    let mut matrix = Self::zeroed(num_bits, rows.len());
    for (row_index, bits) in rows.iter().enumerate() {
      if bits.len() != num_bits {
        return Err(GroupingError::DimensionMismatch {
          expected: num_bits,
          got: bits.len(),
        });
      }
      let start = row_index * matrix.words_per_row;
      let words = &mut matrix.data[start..start + matrix.words_per_row];
      for (bit, &set) in bits.iter().enumerate() {
        if set {
          words[bit / WORD_BITS] |= 1u64 << (bit % WORD_BITS);
        }
      }
    }
    Ok(matrix)
  }

  #[inline]
  #[must_use]
  pub const fn rows(&self) -> usize {
    self.rows
  }

  #[inline]
  #[must_use]
  pub const fn is_empty(&self) -> bool {
    self.rows == 0
  }

  #[inline]
  #[must_use]
  pub const fn num_bits(&self) -> usize {
    self.num_bits
  }

  #[inline]
  #[must_use]
  pub fn row(&self, row_index: usize) -> &[u64] {
    let start = row_index * self.words_per_row;
    &self.data[start..start + self.words_per_row]
  }

  #[inline]
  #[must_use]
  pub fn bit(&self, row_index: usize, bit: usize) -> bool {
    debug_assert!(bit < self.num_bits);
    let word = self.row(row_index)[bit / WORD_BITS];
    (word >> (bit % WORD_BITS)) & 1 == 1
  }

  /// Number of differing bit positions between two rows.
  #[inline]
  #[must_use]
  pub fn hamming(&self, left: usize, right: usize) -> usize {
    self
      .row(left)
      .iter()
      .zip(self.row(right))
      .map(|(&a, &b)| (a ^ b).count_ones() as usize)
      .sum()
  }

  /// The row as a string of `0`/`1`, bit 0 first.
  #[must_use]
  pub fn signature(&self, row_index: usize) -> String {
    (0..self.num_bits)
      .map(|bit| if self.bit(row_index, bit) { '1' } else { '0' })
      .collect()
  }
}
