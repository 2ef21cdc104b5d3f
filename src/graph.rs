use rustc_hash::FxHashSet;

/// Undirected similarity graph over item indices `0..node_count`.
///
/// Edges are stored in both endpoints' adjacency sets, so inserting the same
/// pair twice (in either direction) is a no-op.
#[derive(Debug, Clone, Default)]
pub struct SimilarityGraph {
  adjacency: Vec<FxHashSet<usize>>,
  edge_count: usize,
}

impl SimilarityGraph {
  #[must_use]
  pub fn with_nodes(node_count: usize) -> Self {
    Self {
      adjacency: vec![FxHashSet::default(); node_count],
      edge_count: 0,
    }
  }

  /// Adds the edge `left`-`right`. Returns `true` if it was new.
  ///
  /// Self edges are ignored.
  ///
  /// # Panics
  ///
  /// Panics if either endpoint is not a node of the graph.
  pub fn add_edge(&mut self, left: usize, right: usize) -> bool {
    assert!(
      left < self.adjacency.len() && right < self.adjacency.len(),
      "edge ({left}, {right}) outside graph of {} nodes",
      self.adjacency.len()
    );
    if left == right || !self.adjacency[left].insert(right) {
      return false;
    }
    self.adjacency[right].insert(left);
    self.edge_count += 1;
    true
  }

  #[must_use]
  pub fn contains_edge(&self, left: usize, right: usize) -> bool {
    self
      .adjacency
      .get(left)
      .is_some_and(|neighbors| neighbors.contains(&right))
  }

  pub fn neighbors(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
    self.adjacency[node].iter().copied()
  }

  #[must_use]
  pub fn degree(&self, node: usize) -> usize {
    self.adjacency[node].len()
  }

  #[inline]
  #[must_use]
  pub fn node_count(&self) -> usize {
    self.adjacency.len()
  }

  #[inline]
  #[must_use]
  pub const fn edge_count(&self) -> usize {
    self.edge_count
  }

  #[must_use]
  pub fn isolated_count(&self) -> usize {
    self
      .adjacency
      .iter()
      .filter(|neighbors| neighbors.is_empty())
      .count()
  }
}
