//! Numeric parameters of a grouping run.
//!
//! Defaults match the settings the grouping stage has always been tuned
//! with: a 200-bit sketch scanned with 20 permutations and a 200-wide beam
//! for the Chinese Whispers strategy, and a coarse 17-bit sketch for plain
//! signature binning. Every run is seeded, 42 unless overridden.

use crate::error::{GroupingError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_WHISPERS_NUM_BITS: usize = 200;
pub const DEFAULT_BINNING_NUM_BITS: usize = 17;
pub const DEFAULT_NUM_PERMUTATIONS: usize = 20;
pub const DEFAULT_BEAM_WIDTH: usize = 200;
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.89;
pub const MAX_ITERATIONS: usize = 10_000;

pub(crate) const MIN_NUM_BITS: usize = 1;
pub(crate) const MAX_NUM_BITS: usize = 4096;
pub(crate) const MIN_NUM_PERMUTATIONS: usize = 1;
pub(crate) const MAX_NUM_PERMUTATIONS: usize = 1024;
pub(crate) const MIN_BEAM_WIDTH: usize = 1;
pub(crate) const MAX_BEAM_WIDTH: usize = 65_536;

/// Which clustering strategy runs on top of the sketches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
  /// Exact sketch equality; one bucket per distinct signature.
  Binning,
  /// Permutation-sorted neighbor search followed by Chinese Whispers.
  Whispers,
}

impl Strategy {
  #[must_use]
  pub const fn name(self) -> &'static str {
    match self {
      Self::Binning => "binning",
      Self::Whispers => "whispers",
    }
  }
}

impl fmt::Display for Strategy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for Strategy {
  type Err = GroupingError;

  fn from_str(value: &str) -> Result<Self> {
    match value.trim().to_ascii_lowercase().as_str() {
      "binning" | "lsh" => Ok(Self::Binning),
      "whispers" | "cw" | "lsh-cw" => Ok(Self::Whispers),
      other => Err(GroupingError::InvalidParameter(format!(
        "unknown strategy {other:?}, expected \"binning\" or \"whispers\""
      ))),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingConfig {
  pub strategy: Strategy,
  pub seed: u64,
  /// Sketch length `d`.
  pub num_bits: usize,
  /// Number of bit permutations `q` scanned by the neighbor search.
  pub num_permutations: usize,
  /// Window `b` compared after each anchor in a sorted order.
  pub beam_width: usize,
  /// Pairs whose estimated cosine is at least this become graph edges.
  pub min_similarity: f64,
  pub max_iterations: usize,
}

impl Default for GroupingConfig {
  fn default() -> Self {
    Self::whispers()
  }
}

impl GroupingConfig {
  #[must_use]
  pub const fn whispers() -> Self {
    Self {
      strategy: Strategy::Whispers,
      seed: DEFAULT_SEED,
      num_bits: DEFAULT_WHISPERS_NUM_BITS,
      num_permutations: DEFAULT_NUM_PERMUTATIONS,
      beam_width: DEFAULT_BEAM_WIDTH,
      min_similarity: DEFAULT_MIN_SIMILARITY,
      max_iterations: MAX_ITERATIONS,
    }
  }

  #[must_use]
  pub const fn binning() -> Self {
    Self {
      strategy: Strategy::Binning,
      num_bits: DEFAULT_BINNING_NUM_BITS,
      ..Self::whispers()
    }
  }

  #[must_use]
  pub const fn for_strategy(strategy: Strategy) -> Self {
    match strategy {
      Strategy::Binning => Self::binning(),
      Strategy::Whispers => Self::whispers(),
    }
  }

  #[must_use]
  pub const fn with_seed(mut self, seed: u64) -> Self {
    self.seed = seed;
    self
  }

  #[must_use]
  pub const fn with_num_bits(mut self, num_bits: usize) -> Self {
    self.num_bits = num_bits;
    self
  }

  #[must_use]
  pub const fn with_num_permutations(
    mut self,
    num_permutations: usize,
  ) -> Self {
    self.num_permutations = num_permutations;
    self
  }

  #[must_use]
  pub const fn with_beam_width(mut self, beam_width: usize) -> Self {
    self.beam_width = beam_width;
    self
  }

  #[must_use]
  pub const fn with_min_similarity(mut self, min_similarity: f64) -> Self {
    self.min_similarity = min_similarity;
    self
  }

  #[must_use]
  pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
    self.max_iterations = max_iterations;
    self
  }

  /// Builds a config from `CONCEPT_GROUPER_*` environment variables.
  ///
  /// The strategy is read first so the defaults of the remaining fields
  /// follow it. Out-of-range numbers are clamped, unparsable values fall
  /// back to the defaults. The iteration cap is not read from the
  /// environment.
  ///
  /// # Errors
  ///
  /// Returns an error when `CONCEPT_GROUPER_STRATEGY` names an unknown
  /// strategy.
  pub fn from_env() -> Result<Self> {
    let strategy = match crate::env::read_env_string("CONCEPT_GROUPER_STRATEGY")
    {
      Some(value) => value.parse()?,
      None => Strategy::Whispers,
    };
    let defaults = Self::for_strategy(strategy);

    Ok(Self {
      strategy,
      seed: crate::env::read_env_u64("CONCEPT_GROUPER_SEED", defaults.seed),
      num_bits: crate::env::read_env_usize_clamped(
        "CONCEPT_GROUPER_NUM_BITS",
        defaults.num_bits,
        MIN_NUM_BITS,
        MAX_NUM_BITS,
      ),
      num_permutations: crate::env::read_env_usize_clamped(
        "CONCEPT_GROUPER_NUM_PERMUTATIONS",
        defaults.num_permutations,
        MIN_NUM_PERMUTATIONS,
        MAX_NUM_PERMUTATIONS,
      ),
      beam_width: crate::env::read_env_usize_clamped(
        "CONCEPT_GROUPER_BEAM_WIDTH",
        defaults.beam_width,
        MIN_BEAM_WIDTH,
        MAX_BEAM_WIDTH,
      ),
      min_similarity: crate::env::read_env_f64_clamped(
        "CONCEPT_GROUPER_MIN_SIMILARITY",
        defaults.min_similarity,
        0.0,
        1.0,
      ),
      max_iterations: defaults.max_iterations,
    })
  }

  /// # Errors
  ///
  /// Returns an error if any parameter is outside its accepted range.
  pub fn validate(&self) -> Result<()> {
    validate_range("num_bits", self.num_bits, MIN_NUM_BITS, MAX_NUM_BITS)?;
    validate_range(
      "num_permutations",
      self.num_permutations,
      MIN_NUM_PERMUTATIONS,
      MAX_NUM_PERMUTATIONS,
    )?;
    validate_range(
      "beam_width",
      self.beam_width,
      MIN_BEAM_WIDTH,
      MAX_BEAM_WIDTH,
    )?;
    validate_similarity(self.min_similarity)?;
    if self.max_iterations == 0 {
      return Err(GroupingError::InvalidParameter(
        "max_iterations must be greater than 0".to_string(),
      ));
    }
    Ok(())
  }
}

pub(crate) fn validate_range(
  name: &str,
  value: usize,
  min: usize,
  max: usize,
) -> Result<()> {
  if !(min..=max).contains(&value) {
    return Err(GroupingError::InvalidParameter(format!(
      "{name} must be between {min} and {max}, got {value}"
    )));
  }
  Ok(())
}

pub(crate) fn validate_similarity(min_similarity: f64) -> Result<()> {
  if !min_similarity.is_finite() || !(0.0..=1.0).contains(&min_similarity) {
    return Err(GroupingError::InvalidParameter(
      "min_similarity must be a finite value between 0.0 and 1.0".to_string(),
    ));
  }
  Ok(())
}
