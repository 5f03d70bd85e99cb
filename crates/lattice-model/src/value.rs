//! Deferred-value sum types.
//!
//! Task fields that the source system modelled as "value, or placeholder, or
//! query string" are explicit sum types here, so the serialization passes can
//! pattern-match exhaustively instead of inspecting runtime types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A string-encoded reference into workflow inputs/outputs.
///
/// Opaque to this engine; the execution layer evaluates it at run time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryExpr(pub String);

impl QueryExpr {
  pub fn new(expr: impl Into<String>) -> Self {
    Self(expr.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for QueryExpr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for QueryExpr {
  fn from(expr: &str) -> Self {
    Self(expr.to_string())
  }
}

impl From<String> for QueryExpr {
  fn from(expr: String) -> Self {
    Self(expr)
  }
}

/// A symbolic stand-in for a value not known until serialization or run time.
///
/// Carries a declared `name` (substituted where the placeholder appears in a
/// name position: `output_to` values, `upload`/`output_extraction` keys) and a
/// `query` form (substituted everywhere else).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
  pub name: String,
  pub query: QueryExpr,
}

impl Placeholder {
  pub fn new(name: impl Into<String>, query: impl Into<QueryExpr>) -> Self {
    Self {
      name: name.into(),
      query: query.into(),
    }
  }

  /// A placeholder whose query form is its own name, the common case of
  /// referencing a stored output by name.
  pub fn named(name: impl Into<String>) -> Self {
    let name = name.into();
    let query = QueryExpr::new(name.clone());
    Self { name, query }
  }
}

/// A reference to the callable a unit task invokes.
///
/// `Symbol` forms are resolved to `"namespace.ident"` during graph
/// serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FuncRef {
  /// An already globally-resolvable identifier.
  Name(String),
  /// A namespaced symbol still to be rendered as a name string.
  Symbol { namespace: String, ident: String },
}

impl FuncRef {
  pub fn name(name: impl Into<String>) -> Self {
    Self::Name(name.into())
  }

  pub fn symbol(namespace: impl Into<String>, ident: impl Into<String>) -> Self {
    Self::Symbol {
      namespace: namespace.into(),
      ident: ident.into(),
    }
  }

  /// The globally-resolvable name string.
  pub fn resolved(&self) -> String {
    match self {
      Self::Name(name) => name.clone(),
      Self::Symbol { namespace, ident } => format!("{namespace}.{ident}"),
    }
  }
}

/// A single argument or data value: literal, deferred, or a list of these.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  Literal(serde_json::Value),
  Query(QueryExpr),
  Placeholder(Placeholder),
  List(Vec<Value>),
}

impl Value {
  pub fn query(expr: impl Into<QueryExpr>) -> Self {
    Self::Query(expr.into())
  }
}

impl From<serde_json::Value> for Value {
  fn from(value: serde_json::Value) -> Self {
    Self::Literal(value)
  }
}

impl From<&str> for Value {
  fn from(value: &str) -> Self {
    Self::Literal(serde_json::Value::String(value.to_string()))
  }
}

impl From<i64> for Value {
  fn from(value: i64) -> Self {
    Self::Literal(serde_json::Value::from(value))
  }
}

impl From<Placeholder> for Value {
  fn from(placeholder: Placeholder) -> Self {
    Self::Placeholder(placeholder)
  }
}

impl From<QueryExpr> for Value {
  fn from(query: QueryExpr) -> Self {
    Self::Query(query)
  }
}

/// A file tag, possibly still deferred.
#[derive(Debug, Clone, PartialEq)]
pub enum FileRef {
  Tag(String),
  Placeholder(Placeholder),
}

impl From<&str> for FileRef {
  fn from(tag: &str) -> Self {
    Self::Tag(tag.to_string())
  }
}

impl From<String> for FileRef {
  fn from(tag: String) -> Self {
    Self::Tag(tag)
  }
}

impl From<Placeholder> for FileRef {
  fn from(placeholder: Placeholder) -> Self {
    Self::Placeholder(placeholder)
  }
}

/// Positional arguments: an explicit list, or a single deferred value that
/// evaluates to a list at run time.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgSource {
  List(Vec<Value>),
  Deferred(Value),
}

impl Default for ArgSource {
  fn default() -> Self {
    Self::List(Vec::new())
  }
}

impl<V: Into<Value>> FromIterator<V> for ArgSource {
  fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
    Self::List(iter.into_iter().map(Into::into).collect())
  }
}

/// Keyword arguments: an explicit map, or a single deferred value that
/// evaluates to a mapping at run time.
#[derive(Debug, Clone, PartialEq)]
pub enum KwargSource {
  Map(BTreeMap<String, Value>),
  Deferred(Value),
}

impl Default for KwargSource {
  fn default() -> Self {
    Self::Map(BTreeMap::new())
  }
}

/// Where a unit task's return value is stored: a plain name, or a placeholder
/// resolved to its name during serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputName {
  Name(String),
  Placeholder(Placeholder),
}

impl From<&str> for OutputName {
  fn from(name: &str) -> Self {
    Self::Name(name.to_string())
  }
}

impl From<Placeholder> for OutputName {
  fn from(placeholder: Placeholder) -> Self {
    Self::Placeholder(placeholder)
  }
}

/// A map key that may itself be deferred (`upload`, `output_extraction`).
/// Deferred keys resolve to the placeholder's declared name.
#[derive(Debug, Clone, PartialEq)]
pub enum MapKey {
  Name(String),
  Placeholder(Placeholder),
}

impl From<&str> for MapKey {
  fn from(name: &str) -> Self {
    Self::Name(name.to_string())
  }
}

impl From<Placeholder> for MapKey {
  fn from(placeholder: Placeholder) -> Self {
    Self::Placeholder(placeholder)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn named_placeholder_query_equals_name() {
    let p = Placeholder::named("energies");
    assert_eq!(p.query.as_str(), "energies");
  }

  #[test]
  fn symbol_resolves_to_dotted_name() {
    let f = FuncRef::symbol("pkg.mod", "run");
    assert_eq!(f.resolved(), "pkg.mod.run");
    assert_eq!(FuncRef::name("pkg.mod.run").resolved(), "pkg.mod.run");
  }
}
