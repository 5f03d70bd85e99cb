use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Capability tag present on every task, identifying the engine itself.
pub const ENGINE_TAG: &str = "lattice";

/// A flat, sorted set of capability tags a worker environment must provide.
///
/// The base engine tag is always a member, including after deserialization.
/// Serializes as a sorted sequence of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeSet<String>", into = "BTreeSet<String>")]
pub struct Requirements(BTreeSet<String>);

impl Requirements {
  pub fn new() -> Self {
    let mut tags = BTreeSet::new();
    tags.insert(ENGINE_TAG.to_string());
    Self(tags)
  }

  /// Base set plus the given tags.
  pub fn with<I, S>(tags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let mut reqs = Self::new();
    for tag in tags {
      reqs.insert(tag);
    }
    reqs
  }

  pub fn insert(&mut self, tag: impl Into<String>) {
    self.0.insert(tag.into());
  }

  /// Union another set into this one.
  pub fn union_with(&mut self, other: &Requirements) {
    self.0.extend(other.0.iter().cloned());
  }

  pub fn contains(&self, tag: &str) -> bool {
    self.0.contains(tag)
  }

  pub fn is_superset(&self, other: &Requirements) -> bool {
    self.0.is_superset(&other.0)
  }

  /// Tags in sorted order.
  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.0.iter().map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl Default for Requirements {
  fn default() -> Self {
    Self::new()
  }
}

impl From<BTreeSet<String>> for Requirements {
  fn from(mut tags: BTreeSet<String>) -> Self {
    tags.insert(ENGINE_TAG.to_string());
    Self(tags)
  }
}

impl From<Requirements> for BTreeSet<String> {
  fn from(reqs: Requirements) -> Self {
    reqs.0
  }
}
