//! Concepts, concept groups and propositions.
//!
//! A concept is identified by its [`ConceptId`], the position it had in the
//! list handed to the grouper. Canonical representatives are picked with
//! the total order implemented by [`Concept::canonical_cmp`]:
//!
//! 1. normalized label, byte-wise;
//! 2. surface text, byte-wise;
//! 3. concept id.
//!
//! Ids are unique, so two distinct concepts never compare equal.

use crate::error::GroupingError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
)]
pub struct ConceptId(pub usize);

impl ConceptId {
  #[inline]
  #[must_use]
  pub const fn index(self) -> usize {
    self.0
  }
}

impl fmt::Display for ConceptId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
  pub text: String,
  pub lemma: String,
}

impl Token {
  /// A token whose lemma is still its raw text.
  #[must_use]
  pub fn new(text: impl Into<String>) -> Self {
    let text = text.into();
    Self {
      lemma: text.clone(),
      text,
    }
  }

  #[must_use]
  pub fn with_lemma(text: impl Into<String>, lemma: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      lemma: lemma.into(),
    }
  }
}

/// A concept mention. Its label and surface text are derived from the
/// tokens once, on construction and on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawConcept", into = "RawConcept")]
pub struct Concept {
  id: ConceptId,
  tokens: Vec<Token>,
  label: String,
  text: String,
}

#[derive(Serialize, Deserialize)]
struct RawConcept {
  id: ConceptId,
  tokens: Vec<Token>,
}

impl From<RawConcept> for Concept {
  fn from(raw: RawConcept) -> Self {
    Self::new(raw.id, raw.tokens)
  }
}

impl From<Concept> for RawConcept {
  fn from(concept: Concept) -> Self {
    Self {
      id: concept.id,
      tokens: concept.tokens,
    }
  }
}

impl Concept {
  #[must_use]
  pub fn new(id: ConceptId, tokens: Vec<Token>) -> Self {
    let label = label_from_tokens(&tokens);
    let text = text_from_tokens(&tokens);
    Self {
      id,
      tokens,
      label,
      text,
    }
  }

  /// Splits `text` on whitespace into tokens.
  #[must_use]
  pub fn from_text(id: ConceptId, text: &str) -> Self {
    Self::new(id, text.split_whitespace().map(Token::new).collect())
  }

  /// Builds concepts from surface strings; ids follow input positions.
  #[must_use]
  pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Vec<Self> {
    texts
      .iter()
      .enumerate()
      .map(|(index, text)| Self::from_text(ConceptId(index), text.as_ref()))
      .collect()
  }

  #[inline]
  #[must_use]
  pub const fn id(&self) -> ConceptId {
    self.id
  }

  #[must_use]
  pub fn tokens(&self) -> &[Token] {
    &self.tokens
  }

  /// Normalized label: token lemmas, lowercased and joined by one space.
  #[must_use]
  pub fn label(&self) -> &str {
    &self.label
  }

  /// Surface text: token texts joined by one space.
  #[must_use]
  pub fn text(&self) -> &str {
    &self.text
  }

  /// Returns a copy whose tokens carry the given lemmas.
  #[must_use]
  pub fn with_tokens(&self, tokens: Vec<Token>) -> Self {
    Self::new(self.id, tokens)
  }

  #[must_use]
  pub fn canonical_cmp(&self, other: &Self) -> Ordering {
    self
      .label
      .cmp(&other.label)
      .then_with(|| self.text.cmp(&other.text))
      .then_with(|| self.id.cmp(&other.id))
  }
}

fn label_from_tokens(tokens: &[Token]) -> String {
  tokens
    .iter()
    .map(|token| token.lemma.to_lowercase())
    .collect::<Vec<_>>()
    .join(" ")
}

fn text_from_tokens(tokens: &[Token]) -> String {
  tokens
    .iter()
    .map(|token| token.text.as_str())
    .collect::<Vec<_>>()
    .join(" ")
}

/// Concepts sharing one normalized label, ordered canonically.
///
/// A group always has at least one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawConceptGroup")]
pub struct ConceptGroup {
  label: String,
  members: Vec<ConceptId>,
}

#[derive(Deserialize)]
struct RawConceptGroup {
  label: String,
  members: Vec<ConceptId>,
}

impl TryFrom<RawConceptGroup> for ConceptGroup {
  type Error = GroupingError;

  fn try_from(raw: RawConceptGroup) -> Result<Self, Self::Error> {
    if raw.members.is_empty() {
      return Err(GroupingError::InvalidParameter(format!(
        "concept group {:?} has no members",
        raw.label
      )));
    }
    Ok(Self {
      label: raw.label,
      members: raw.members,
    })
  }
}

impl ConceptGroup {
  /// Builds a group from its member concepts. Members are sorted
  /// canonically and the group takes the label of the first one.
  ///
  /// Returns `None` when `members` is empty.
  #[must_use]
  pub fn from_concepts(mut members: Vec<&Concept>) -> Option<Self> {
    members.sort_by(|left, right| left.canonical_cmp(right));
    let label = members.first()?.label().to_string();
    Some(Self {
      label,
      members: members.iter().map(|concept| concept.id()).collect(),
    })
  }

  #[must_use]
  pub fn label(&self) -> &str {
    &self.label
  }

  /// The canonically smallest member.
  #[must_use]
  pub fn representative(&self) -> ConceptId {
    self.members[0]
  }

  #[must_use]
  pub fn members(&self) -> &[ConceptId] {
    &self.members
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.members.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.members.is_empty()
  }
}

/// A relation between two concepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposition {
  pub source: ConceptId,
  pub target: ConceptId,
  pub relation: String,
}

impl Proposition {
  #[must_use]
  pub fn new(
    source: ConceptId,
    target: ConceptId,
    relation: impl Into<String>,
  ) -> Self {
    Self {
      source,
      target,
      relation: relation.into(),
    }
  }

  #[must_use]
  pub fn is_self_loop(&self) -> bool {
    self.source == self.target
  }
}
