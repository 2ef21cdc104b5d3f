//! Lemma normalization applied to every concept before pre-grouping.

use crate::model::{Concept, Token};

/// Maps a token to its normalized form. Implementations must be idempotent.
pub trait Lemmatizer {
  fn lemmatize(&self, token: &str) -> String;
}

impl<F> Lemmatizer for F
where
  F: Fn(&str) -> String,
{
  fn lemmatize(&self, token: &str) -> String {
    self(token)
  }
}

/// Lowercases and strips common English plural suffixes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuffixLemmatizer;

impl Lemmatizer for SuffixLemmatizer {
  fn lemmatize(&self, token: &str) -> String {
    let lower = token.to_lowercase();
    let len = lower.chars().count();

    if len > 4 && lower.ends_with("ies") {
      return format!("{}y", &lower[..lower.len() - 3]);
    }
    if len > 4 && lower.ends_with("sses") {
      return lower[..lower.len() - 2].to_string();
    }
    if len > 3
      && lower.ends_with('s')
      && !lower.ends_with("ss")
      && !lower.ends_with("us")
      && !lower.ends_with("is")
    {
      return lower[..lower.len() - 1].to_string();
    }
    lower
  }
}

/// Returns a copy of `concept` with every token lemma run through
/// `lemmatizer`. The input is left untouched.
#[must_use]
pub fn normalize_concept<L: Lemmatizer + ?Sized>(
  concept: &Concept,
  lemmatizer: &L,
) -> Concept {
  let tokens = concept
    .tokens()
    .iter()
    .map(|token| {
      Token::with_lemma(token.text.clone(), lemmatizer.lemmatize(&token.lemma))
    })
    .collect();
  concept.with_tokens(tokens)
}

#[must_use]
pub fn normalize_concepts<L: Lemmatizer + ?Sized>(
  concepts: &[Concept],
  lemmatizer: &L,
) -> Vec<Concept> {
  concepts
    .iter()
    .map(|concept| normalize_concept(concept, lemmatizer))
    .collect()
}
