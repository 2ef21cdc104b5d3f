//! Signature binning: items cluster together only when every sketch bit
//! agrees.
//!
//! This is the coarse strategy. Short sketches over-merge, long sketches
//! leave almost everything as a singleton. No similarity threshold is
//! involved.

use crate::sketch::SketchMatrix;
use rustc_hash::FxHashMap;

/// Buckets row indices by identical sketch.
///
/// Buckets are returned in order of their first row; rows inside a bucket
/// stay in ascending order. An empty matrix yields no buckets.
#[must_use]
pub fn bin_by_signature(sketches: &SketchMatrix) -> Vec<Vec<usize>> {
  let mut slot_by_signature: FxHashMap<&[u64], usize> = FxHashMap::default();
  let mut buckets: Vec<Vec<usize>> = Vec::new();

  for row_index in 0..sketches.rows() {
    let slot = *slot_by_signature
      .entry(sketches.row(row_index))
      .or_insert_with(|| {
        buckets.push(Vec::new());
        buckets.len() - 1
      });
    buckets[slot].push(row_index);
  }

  log::info!("unique signatures: {}", buckets.len());
  buckets
}
