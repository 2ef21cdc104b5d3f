//! Property-based tests for the grouping stage.
//!
//! Invariants checked on random input:
//! - The Hamming similarity estimate decreases with distance
//! - Sketches ignore positive scaling of a vector
//! - Label propagation partitions the nodes of any graph
//! - Every concept ends in exactly one cluster and relations never loop

use concept_grouper::{
  hamming_similarity, ChineseWhispers, Concept, ConceptGrouper, ConceptId,
  EmbeddingTable, GroupingConfig, Proposition, RandomProjection,
  SimilarityGraph, SuffixLemmatizer,
};
use proptest::prelude::*;
use rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

const WORDS: [&str; 8] =
  ["cat", "cats", "dog", "dogs", "car", "cars", "tree", "stone"];

fn table() -> EmbeddingTable {
  EmbeddingTable::from_pairs(
    3,
    [
      ("cat", vec![1.0, 0.2, 0.0]),
      ("dog", vec![0.9, 0.3, 0.1]),
      ("car", vec![0.0, 1.0, 0.0]),
      ("tree", vec![0.0, 0.1, 1.0]),
    ],
  )
  .unwrap()
}

mod similarity_props {
  use super::*;

  proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn similarity_is_monotone(
      num_bits in 1usize..512,
      a in 0usize..512,
      b in 0usize..512,
    ) {
      let near = a.min(b).min(num_bits);
      let far = a.max(b).min(num_bits);
      prop_assert!(
        hamming_similarity(near, num_bits)
          >= hamming_similarity(far, num_bits)
      );
    }

    #[test]
    fn scaling_keeps_the_sketch(
      vector in prop::collection::vec(-10.0f32..10.0, 16),
      scale in 0.01f32..100.0,
      seed in any::<u64>(),
    ) {
      let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
      let projection = RandomProjection::new(16, 64, &mut rng).unwrap();
      let scaled: Vec<f32> = vector.iter().map(|value| value * scale).collect();

      let original = projection.project(&vector).unwrap();
      let margin = original
        .iter()
        .fold(f32::INFINITY, |min, dot| min.min(dot.abs()));
      prop_assume!(margin > 1e-2);
      prop_assert_eq!(
        projection.sketch(&vector).unwrap(),
        projection.sketch(&scaled).unwrap()
      );
    }
  }
}

mod whispers_props {
  use super::*;

  prop_compose! {
    fn arb_graph(max_nodes: usize)
      (node_count in 1..max_nodes)
      (
        edges in prop::collection::vec((0..node_count, 0..node_count), 0..40),
        node_count in Just(node_count),
      ) -> SimilarityGraph
    {
      let mut graph = SimilarityGraph::with_nodes(node_count);
      for (left, right) in edges {
        graph.add_edge(left, right);
      }
      graph
    }
  }

  proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn propagation_partitions_nodes(
      graph in arb_graph(24),
      seed in any::<u64>(),
    ) {
      let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
      let propagation = ChineseWhispers::default().propagate(&graph, &mut rng);

      let mut seen: Vec<usize> =
        propagation.clusters().into_iter().flatten().collect();
      seen.sort_unstable();
      prop_assert_eq!(seen, (0..graph.node_count()).collect::<Vec<_>>());
      prop_assert!(propagation.convergence().iterations() >= 1);
    }

    #[test]
    fn clustered_nodes_are_connected(
      graph in arb_graph(24),
      seed in any::<u64>(),
    ) {
      let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
      let propagation = ChineseWhispers::default().propagate(&graph, &mut rng);

      for cluster in propagation.clusters() {
        if cluster.len() > 1 {
          for &node in &cluster {
            prop_assert!(graph.degree(node) > 0);
          }
        }
      }
    }
  }
}

mod grouping_props {
  use super::*;

  prop_compose! {
    fn arb_input()
      (word_indices in prop::collection::vec(0..WORDS.len(), 1..20))
      (
        relations in prop::collection::vec(
          (0..word_indices.len(), 0..word_indices.len()),
          0..30,
        ),
        word_indices in Just(word_indices),
      ) -> (Vec<&'static str>, Vec<(usize, usize)>)
    {
      (word_indices.into_iter().map(|index| WORDS[index]).collect(), relations)
    }
  }

  proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn merge_is_complete_and_loop_free(
      (words, relations) in arb_input(),
      seed in any::<u64>(),
      binning in any::<bool>(),
    ) {
      let config = if binning {
        GroupingConfig::binning()
      } else {
        GroupingConfig::whispers()
      };
      let grouper = ConceptGrouper::new(config.with_seed(seed)).unwrap();
      let concepts = Concept::from_texts(&words);
      let propositions: Vec<Proposition> = relations
        .iter()
        .map(|&(source, target)| {
          Proposition::new(ConceptId(source), ConceptId(target), "rel")
        })
        .collect();

      let outcome = grouper
        .group(&concepts, propositions, &SuffixLemmatizer, &table())
        .unwrap();

      let mut seen: Vec<ConceptId> =
        outcome.clusters.iter().flatten().copied().collect();
      seen.sort_unstable();
      let expected: Vec<ConceptId> = (0..words.len()).map(ConceptId).collect();
      prop_assert_eq!(seen, expected);

      let canonical: Vec<ConceptId> =
        outcome.concepts.iter().map(Concept::id).collect();
      let firsts: Vec<ConceptId> =
        outcome.clusters.iter().map(|cluster| cluster[0]).collect();
      prop_assert_eq!(&canonical, &firsts);

      for proposition in &outcome.propositions {
        prop_assert_ne!(proposition.source, proposition.target);
        prop_assert!(canonical.contains(&proposition.source));
        prop_assert!(canonical.contains(&proposition.target));
      }
      prop_assert!(outcome.propositions.len() <= relations.len());
      let stats = &outcome.stats;
      prop_assert!(stats.grouped_concepts <= stats.unique_concepts);
    }

    #[test]
    fn grouping_is_deterministic(
      (words, _) in arb_input(),
      seed in any::<u64>(),
    ) {
      let config = GroupingConfig::whispers().with_seed(seed);
      let grouper = ConceptGrouper::new(config).unwrap();
      let concepts = Concept::from_texts(&words);
      let first = grouper
        .group(&concepts, Vec::new(), &SuffixLemmatizer, &table())
        .unwrap();
      let second = grouper
        .group(&concepts, Vec::new(), &SuffixLemmatizer, &table())
        .unwrap();
      prop_assert_eq!(first, second);
    }
  }
}
