//! Chinese Whispers label propagation.
//!
//! Every node starts with its own index as label. One iteration visits all
//! nodes in a freshly shuffled order and moves each node to the label most
//! common among its neighbors, updating labels in place. Propagation stops
//! after the first iteration that changes nothing, or at the iteration cap.
//!
//! Ties between equally common labels go to the numerically lowest label.
//! The visiting order still depends on the generator, so two seeds can end
//! in different partitions of the same graph.
//!
//! References:
//! - Biemann (2006). "Chinese Whispers: an efficient graph clustering
//!   algorithm and its application to natural language processing problems."

use crate::graph::SimilarityGraph;
use rand::seq::SliceRandom;
use rand::Rng;
use rustc_hash::FxHashMap;

/// How an `iterate_until` loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
  /// The last of `iterations` steps reported no change.
  Converged { iterations: usize },
  /// The cap was reached while the last step still changed
  /// `last_changed` items.
  Exhausted {
    iterations: usize,
    last_changed: usize,
  },
}

impl Convergence {
  #[must_use]
  pub const fn iterations(self) -> usize {
    match self {
      Self::Converged { iterations } | Self::Exhausted { iterations, .. } => {
        iterations
      }
    }
  }

  #[must_use]
  pub const fn is_converged(self) -> bool {
    matches!(self, Self::Converged { .. })
  }
}

/// Calls `step` until it reports zero changes or `max_iterations` calls have
/// been made.
pub fn iterate_until<F>(max_iterations: usize, mut step: F) -> Convergence
where
  F: FnMut() -> usize,
{
  let mut last_changed = 0;
  for iteration in 1..=max_iterations {
    last_changed = step();
    if last_changed == 0 {
      return Convergence::Converged {
        iterations: iteration,
      };
    }
  }
  Convergence::Exhausted {
    iterations: max_iterations,
    last_changed,
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChineseWhispers {
  max_iterations: usize,
}

impl Default for ChineseWhispers {
  fn default() -> Self {
    Self::new(crate::config::MAX_ITERATIONS)
  }
}

impl ChineseWhispers {
  #[must_use]
  pub const fn new(max_iterations: usize) -> Self {
    Self { max_iterations }
  }

  #[must_use]
  pub const fn max_iterations(&self) -> usize {
    self.max_iterations
  }

  /// Propagates labels over `graph`, drawing one visiting order per
  /// iteration from `rng`.
  ///
  /// Hitting the iteration cap is not an error: a warning is logged and the
  /// labels of the last iteration are returned.
  pub fn propagate<R: Rng + ?Sized>(
    &self,
    graph: &SimilarityGraph,
    rng: &mut R,
  ) -> Propagation {
    let node_count = graph.node_count();
    let mut labels: Vec<usize> = (0..node_count).collect();
    if node_count == 0 {
      return Propagation {
        labels,
        convergence: Convergence::Converged { iterations: 0 },
      };
    }

    let mut order: Vec<usize> = Vec::with_capacity(node_count);
    let mut tally: FxHashMap<usize, usize> = FxHashMap::default();
    let convergence = iterate_until(self.max_iterations, || {
      order.clear();
      order.extend(0..node_count);
      order.shuffle(&mut *rng);

      let mut changed = 0;
      for &node in &order {
        if let Some(label) = majority_label(graph, node, &labels, &mut tally) {
          if label != labels[node] {
            labels[node] = label;
            changed += 1;
          }
        }
      }
      changed
    });

    log::info!("cw: iterations {}", convergence.iterations());
    if let Convergence::Exhausted { last_changed, .. } = convergence {
      log::warn!("cw: did not converge, {last_changed} labels still changing");
    }

    Propagation {
      labels,
      convergence,
    }
  }
}

/// Most common label among `node`'s neighbors, lowest label on ties.
/// `None` for isolated nodes.
fn majority_label(
  graph: &SimilarityGraph,
  node: usize,
  labels: &[usize],
  tally: &mut FxHashMap<usize, usize>,
) -> Option<usize> {
  tally.clear();
  for neighbor in graph.neighbors(node) {
    *tally.entry(labels[neighbor]).or_default() += 1;
  }
  tally
    .iter()
    .max_by(|(left_label, left_count), (right_label, right_count)| {
      left_count
        .cmp(right_count)
        .then_with(|| right_label.cmp(left_label))
    })
    .map(|(&label, _)| label)
}

/// Final labels of a propagation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Propagation {
  labels: Vec<usize>,
  convergence: Convergence,
}

impl Propagation {
  #[must_use]
  pub fn labels(&self) -> &[usize] {
    &self.labels
  }

  #[must_use]
  pub const fn convergence(&self) -> Convergence {
    self.convergence
  }

  /// Nodes grouped by final label. Clusters are ordered by their smallest
  /// node and list their nodes in ascending order.
  #[must_use]
  pub fn clusters(&self) -> Vec<Vec<usize>> {
    let mut slot_by_label: FxHashMap<usize, usize> = FxHashMap::default();
    let mut clusters: Vec<Vec<usize>> = Vec::new();
    for (node, &label) in self.labels.iter().enumerate() {
      let slot = *slot_by_label.entry(label).or_insert_with(|| {
        clusters.push(Vec::new());
        clusters.len() - 1
      });
      clusters[slot].push(node);
    }
    clusters
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand_core::SeedableRng;
  use rand_xoshiro::Xoshiro256PlusPlus;

  fn graph(node_count: usize, edges: &[(usize, usize)]) -> SimilarityGraph {
    let mut graph = SimilarityGraph::with_nodes(node_count);
    for &(left, right) in edges {
      graph.add_edge(left, right);
    }
    graph
  }

  #[test]
  fn iterate_until_reports_both_outcomes() {
    let mut remaining = vec![3usize, 1, 0];
    let converged = iterate_until(10, || remaining.remove(0));
    assert_eq!(converged, Convergence::Converged { iterations: 3 });
    assert!(converged.is_converged());

    let exhausted = iterate_until(4, || 2);
    assert_eq!(
      exhausted,
      Convergence::Exhausted {
        iterations: 4,
        last_changed: 2
      }
    );
    assert_eq!(exhausted.iterations(), 4);
  }

  #[test]
  fn path_of_three_collapses_into_one_cluster() {
    let path = graph(3, &[(0, 1), (1, 2)]);
    for seed in 0..16 {
      let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
      let propagation = ChineseWhispers::default().propagate(&path, &mut rng);
      assert!(propagation.convergence().is_converged());
      assert_eq!(propagation.clusters(), vec![vec![0, 1, 2]]);
    }
  }

  #[test]
  fn propagation_is_reproducible_for_a_seed() {
    let edges = [(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (2, 3), (6, 7)];
    let g = graph(9, &edges);

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
    let first = ChineseWhispers::default().propagate(&g, &mut rng);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
    let second = ChineseWhispers::default().propagate(&g, &mut rng);
    assert_eq!(first, second);
  }

  #[test]
  fn clusters_partition_every_node() {
    let g = graph(7, &[(0, 1), (2, 3), (3, 4), (5, 4)]);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
    let clusters =
      ChineseWhispers::default().propagate(&g, &mut rng).clusters();

    let mut seen: Vec<usize> = clusters.iter().flatten().copied().collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..7).collect::<Vec<_>>());
    assert!(clusters.iter().any(|cluster| cluster == &[6]));
    assert!(clusters.iter().any(|cluster| cluster == &[0, 1]));
  }

  #[test]
  fn isolated_nodes_keep_their_labels() {
    let g = graph(3, &[]);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
    let propagation = ChineseWhispers::default().propagate(&g, &mut rng);
    assert_eq!(propagation.labels(), [0, 1, 2]);
    assert_eq!(
      propagation.convergence(),
      Convergence::Converged { iterations: 1 }
    );
  }

  #[test]
  fn cap_stops_propagation_without_failing() {
    let g = graph(2, &[(0, 1)]);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(9);
    let propagation = ChineseWhispers::new(1).propagate(&g, &mut rng);
    assert_eq!(
      propagation.convergence(),
      Convergence::Exhausted {
        iterations: 1,
        last_changed: 1
      }
    );
    assert_eq!(propagation.clusters().len(), 1);
  }

  #[test]
  fn ties_go_to_the_lowest_label() {
    let star = graph(3, &[(2, 0), (2, 1)]);
    let mut tally = FxHashMap::default();
    assert_eq!(majority_label(&star, 2, &[5, 4, 2], &mut tally), Some(4));
    assert_eq!(majority_label(&graph(1, &[]), 0, &[0], &mut tally), None);
  }

  #[test]
  fn empty_graph_does_no_work() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
    let empty = SimilarityGraph::default();
    let propagation = ChineseWhispers::default().propagate(&empty, &mut rng);
    assert!(propagation.clusters().is_empty());
    assert_eq!(propagation.convergence().iterations(), 0);
  }
}
