//! Permutation-indexed approximate neighbor search over binary sketches.
//!
//! Sorting items by their sketch bits read in a random order puts items that
//! agree on a random prefix of bits next to each other. Comparing each item
//! with the next `beam_width` items of the sorted order finds likely-close
//! pairs without an all-pairs scan, and repeating the pass with
//! `num_permutations` independent orders raises recall towards that of an
//! exhaustive Hamming search. Cost is `O(q · N · (log N + b))`.
//!
//! The search is approximate: a close pair that never lands inside one
//! window is missed.

use crate::config::{
  validate_range, validate_similarity, GroupingConfig, MAX_BEAM_WIDTH,
  MAX_NUM_PERMUTATIONS, MIN_BEAM_WIDTH, MIN_NUM_PERMUTATIONS,
};
use crate::error::Result;
use crate::graph::SimilarityGraph;
use crate::sketch::SketchMatrix;
use crate::utils::ratio_usize;
use rand::seq::SliceRandom;
use rand::Rng;
use rayon::prelude::*;

const WORD_BITS: usize = 64;

/// Estimated cosine similarity for `distance` differing bits out of
/// `num_bits`: `cos(π · distance / num_bits)`.
///
/// Monotonically decreasing in `distance`, from 1 at distance 0 to -1 when
/// every bit differs.
#[inline]
#[must_use]
pub fn hamming_similarity(distance: usize, num_bits: usize) -> f64 {
  (ratio_usize(distance, num_bits) * std::f64::consts::PI).cos()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PermutationSearch {
  num_permutations: usize,
  beam_width: usize,
  min_similarity: f64,
}

impl PermutationSearch {
  /// # Errors
  ///
  /// Returns an error when `num_permutations` or `beam_width` is zero or
  /// above its limit, or `min_similarity` is not a finite value in `[0, 1]`.
  pub fn new(
    num_permutations: usize,
    beam_width: usize,
    min_similarity: f64,
  ) -> Result<Self> {
    validate_range(
      "num_permutations",
      num_permutations,
      MIN_NUM_PERMUTATIONS,
      MAX_NUM_PERMUTATIONS,
    )?;
    validate_range(
      "beam_width",
      beam_width,
      MIN_BEAM_WIDTH,
      MAX_BEAM_WIDTH,
    )?;
    validate_similarity(min_similarity)?;
    Ok(Self {
      num_permutations,
      beam_width,
      min_similarity,
    })
  }

  /// # Errors
  ///
  /// Returns an error when the search parameters of `config` are invalid.
  pub fn from_config(config: &GroupingConfig) -> Result<Self> {
    Self::new(
      config.num_permutations,
      config.beam_width,
      config.min_similarity,
    )
  }

  #[must_use]
  pub const fn num_permutations(&self) -> usize {
    self.num_permutations
  }

  #[must_use]
  pub const fn beam_width(&self) -> usize {
    self.beam_width
  }

  #[must_use]
  pub const fn min_similarity(&self) -> f64 {
    self.min_similarity
  }

  /// Draws `num_permutations` shuffles of the bit positions `0..num_bits`,
  /// one after the other from `rng`.
  pub fn permutations<R: Rng + ?Sized>(
    &self,
    num_bits: usize,
    rng: &mut R,
  ) -> Vec<Vec<usize>> {
    (0..self.num_permutations)
      .map(|_| {
        let mut positions: Vec<usize> = (0..num_bits).collect();
        positions.shuffle(&mut *rng);
        positions
      })
      .collect()
  }

  /// Row indices sorted by their bits read in `permutation` order.
  ///
  /// The first permuted position is the primary key, a cleared bit sorts
  /// before a set bit, and fully tied rows keep ascending index order.
  #[must_use]
  pub fn sorted_order(
    sketches: &SketchMatrix,
    permutation: &[usize],
  ) -> Vec<usize> {
    let words_per_key = permutation.len().div_ceil(WORD_BITS).max(1);
    let keys = permuted_keys(sketches, permutation, words_per_key);

    let mut order: Vec<usize> = (0..sketches.rows()).collect();
    order.sort_by(|&left, &right| {
      let left_key = &keys[left * words_per_key..(left + 1) * words_per_key];
      let right_key = &keys[right * words_per_key..(right + 1) * words_per_key];
      left_key.cmp(right_key)
    });
    order
  }

  /// Pairs inside the sliding window of `order` whose estimated similarity
  /// reaches `min_similarity`, as `(smaller, larger)` row indices.
  #[must_use]
  pub fn window_pairs(
    &self,
    sketches: &SketchMatrix,
    order: &[usize],
  ) -> Vec<(usize, usize)> {
    self.scan_window(sketches, order, |_, _| true)
  }

  /// Like [`PermutationSearch::window_pairs`], but skips pairs that are
  /// already edges of `known`.
  fn new_pairs(
    &self,
    sketches: &SketchMatrix,
    order: &[usize],
    known: &SimilarityGraph,
  ) -> Vec<(usize, usize)> {
    self.scan_window(sketches, order, |left, right| {
      !known.contains_edge(left, right)
    })
  }

  fn scan_window<F>(
    &self,
    sketches: &SketchMatrix,
    order: &[usize],
    is_candidate: F,
  ) -> Vec<(usize, usize)>
  where
    F: Fn(usize, usize) -> bool,
  {
    let num_bits = sketches.num_bits();
    let mut pairs = Vec::new();

    for (position, &anchor) in order.iter().enumerate() {
      let window_end = position
        .saturating_add(self.beam_width)
        .min(order.len().saturating_sub(1));
      for &other in order.iter().take(window_end + 1).skip(position + 1) {
        let (left, right) = (anchor.min(other), anchor.max(other));
        if !is_candidate(left, right) {
          continue;
        }
        let similarity =
          hamming_similarity(sketches.hamming(anchor, other), num_bits);
        if similarity >= self.min_similarity {
          pairs.push((left, right));
        }
      }
    }
    pairs
  }

  /// Runs every permutation pass and collects the accepted pairs into a
  /// graph with one node per sketch row.
  ///
  /// All permutations are drawn from `rng` before any pass runs. Passes run
  /// in parallel batches of one pass per worker thread. Each batch only
  /// reports pairs missing from the graph built so far, and its pairs are
  /// inserted in permutation order before the next batch starts, so the
  /// result does not depend on thread scheduling and tied rows are not
  /// buffered once per pass.
  pub fn build_graph<R: Rng + ?Sized>(
    &self,
    sketches: &SketchMatrix,
    rng: &mut R,
  ) -> SimilarityGraph {
    let permutations = self.permutations(sketches.num_bits(), rng);
    let mut graph = SimilarityGraph::with_nodes(sketches.rows());
    if sketches.rows() < 2 {
      return graph;
    }

    let batch_len = rayon::current_num_threads().max(1);
    for (batch, chunk) in permutations.chunks(batch_len).enumerate() {
      let batch_pairs: Vec<Vec<(usize, usize)>> = chunk
        .par_iter()
        .map(|permutation| {
          let order = Self::sorted_order(sketches, permutation);
          self.new_pairs(sketches, &order, &graph)
        })
        .collect();

      for (offset, pairs) in batch_pairs.into_iter().enumerate() {
        let pass = batch * batch_len + offset;
        let added = pairs
          .into_iter()
          .filter(|&(left, right)| graph.add_edge(left, right))
          .count();
        log::info!("fast hamming search {pass}: added {added} new pairs");
      }
    }
    log::info!("total pairs: {}", graph.edge_count());
    graph
  }
}

/// Re-packs every row so that permuted position `k` becomes bit `63 - k % 64`
/// of word `k / 64`. Comparing two rows' words lexicographically then
/// compares their permuted bits lexicographically.
fn permuted_keys(
  sketches: &SketchMatrix,
  permutation: &[usize],
  words_per_key: usize,
) -> Vec<u64> {
  let mut keys = vec![0u64; sketches.rows() * words_per_key];
  for (row_index, key) in keys.chunks_exact_mut(words_per_key).enumerate() {
    for (position, &bit) in permutation.iter().enumerate() {
      if sketches.bit(row_index, bit) {
        key[position / WORD_BITS] |=
          1u64 << (WORD_BITS - 1 - position % WORD_BITS);
      }
    }
  }
  keys
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand_core::SeedableRng;
  use rand_xoshiro::Xoshiro256PlusPlus;

  fn matrix(rows: &[&str]) -> SketchMatrix {
    let bits: Vec<Vec<bool>> = rows
      .iter()
      .map(|row| row.chars().map(|c| c == '1').collect())
      .collect();
    SketchMatrix::from_bits(rows[0].len(), &bits).unwrap()
  }

  #[test]
  fn similarity_transform_endpoints() {
    assert!((hamming_similarity(0, 8) - 1.0).abs() < 1e-12);
    assert!(hamming_similarity(4, 8).abs() < 1e-12);
    assert!((hamming_similarity(8, 8) + 1.0).abs() < 1e-12);
  }

  #[test]
  fn permutations_are_reproducible_shuffles() {
    let search = PermutationSearch::new(3, 2, 0.5).unwrap();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
    let first = search.permutations(16, &mut rng);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
    let second = search.permutations(16, &mut rng);

    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
    for permutation in &first {
      let mut sorted = permutation.clone();
      sorted.sort_unstable();
      assert_eq!(sorted, (0..16).collect::<Vec<_>>());
    }
  }

  #[test]
  fn sorted_order_reads_bits_in_permuted_order() {
    let sketches = matrix(&["011", "100", "001", "011"]);

    assert_eq!(
      PermutationSearch::sorted_order(&sketches, &[0, 1, 2]),
      [2, 0, 3, 1]
    );
    // Row 1 is the only row with bit 2 cleared.
    assert_eq!(
      PermutationSearch::sorted_order(&sketches, &[2, 1, 0]),
      [1, 2, 0, 3]
    );
  }

  #[test]
  fn sorted_order_handles_keys_wider_than_a_word() {
    let mut first = vec![false; 130];
    let mut second = vec![false; 130];
    first[129] = true;
    second[0] = true;
    let sketches = SketchMatrix::from_bits(130, &[first, second]).unwrap();

    let identity: Vec<usize> = (0..130).collect();
    assert_eq!(PermutationSearch::sorted_order(&sketches, &identity), [0, 1]);
    let reversed: Vec<usize> = (0..130).rev().collect();
    assert_eq!(PermutationSearch::sorted_order(&sketches, &reversed), [1, 0]);
  }

  #[test]
  fn window_limits_comparisons() {
    let sketches = matrix(&["0000", "0000", "0000"]);
    let narrow = PermutationSearch::new(1, 1, 0.9).unwrap();
    assert_eq!(narrow.window_pairs(&sketches, &[0, 1, 2]), [(0, 1), (1, 2)]);

    let wide = PermutationSearch::new(1, 5, 0.9).unwrap();
    assert_eq!(
      wide.window_pairs(&sketches, &[0, 1, 2]),
      [(0, 1), (0, 2), (1, 2)]
    );
  }

  #[test]
  fn threshold_filters_distant_pairs() {
    // 1 of 8 bits differs: cos(pi / 8) ~ 0.924.
    let sketches = matrix(&["00000000", "00000001", "11110000"]);
    let search = PermutationSearch::new(1, 2, 0.92).unwrap();
    assert_eq!(search.window_pairs(&sketches, &[0, 1, 2]), [(0, 1)]);

    let strict = PermutationSearch::new(1, 2, 0.93).unwrap();
    assert!(strict.window_pairs(&sketches, &[0, 1, 2]).is_empty());
  }

  #[test]
  fn build_graph_is_deterministic_for_a_seed() {
    let sketches = matrix(&[
      "1100110011", "1100110010", "0011001100", "0011001101", "1111100000",
    ]);
    let search = PermutationSearch::new(4, 4, 0.9).unwrap();

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
    let first = search.build_graph(&sketches, &mut rng);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
    let second = search.build_graph(&sketches, &mut rng);

    assert_eq!(first.edge_count(), second.edge_count());
    for node in 0..sketches.rows() {
      for other in 0..sketches.rows() {
        assert_eq!(
          first.contains_edge(node, other),
          second.contains_edge(node, other)
        );
      }
    }
    assert_eq!(first.edge_count(), 2);
    assert!(first.contains_edge(0, 1));
    assert!(first.contains_edge(2, 3));
    assert!(!first.contains_edge(0, 2));
  }

  #[test]
  fn tied_rows_are_not_reported_again() {
    let rows = vec!["0110"; 12];
    let sketches = matrix(&rows);
    let search = PermutationSearch::new(6, 16, 0.9).unwrap();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
    let graph = search.build_graph(&sketches, &mut rng);
    assert_eq!(graph.edge_count(), 12 * 11 / 2);

    let order = PermutationSearch::sorted_order(&sketches, &[3, 2, 1, 0]);
    assert_eq!(search.window_pairs(&sketches, &order).len(), 12 * 11 / 2);
    assert!(search.new_pairs(&sketches, &order, &graph).is_empty());
  }

  #[test]
  fn rejects_invalid_parameters() {
    assert!(PermutationSearch::new(0, 1, 0.5).is_err());
    assert!(PermutationSearch::new(1, 0, 0.5).is_err());
    assert!(PermutationSearch::new(1, 1, -0.1).is_err());
    assert!(PermutationSearch::new(1, MAX_BEAM_WIDTH + 1, 0.5).is_err());
  }
}
