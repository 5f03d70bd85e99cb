//! Typed wire documents: plain nested maps, sequences, and scalars, safe for
//! transport to the execution backend and for storage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A serialized task, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskDoc {
  Python(UnitDoc),
  Branch(BranchDoc),
  Dag(GraphDoc),
}

impl TaskDoc {
  pub fn name(&self) -> &str {
    match self {
      Self::Python(doc) => &doc.name,
      Self::Branch(doc) => &doc.name,
      Self::Dag(doc) => &doc.name,
    }
  }
}

/// A serialized unit task. All deferred values are resolved: `function` is a
/// globally-resolvable name, placeholders have become plain strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitDoc {
  pub name: String,
  pub requirements: Vec<String>,
  pub function: String,
  /// A sequence, or a resolved query string evaluating to one.
  pub args: serde_json::Value,
  /// A mapping, or a resolved query string evaluating to one.
  pub kwargs: serde_json::Value,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub download: Vec<String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub upload: BTreeMap<String, Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output_to: Option<String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub output_extraction: BTreeMap<String, String>,
  #[serde(default = "default_true")]
  pub use_storage_dirs: bool,
}

/// A serialized branch task wrapping its single owned task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchDoc {
  pub name: String,
  pub requirements: Vec<String>,
  pub task: Box<TaskDoc>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub branch_data: Vec<serde_json::Value>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub branch_files: Vec<String>,
}

/// A serialized graph. `links` is always emitted, possibly empty, to
/// distinguish "no edges" from "not yet computed". Index keys travel as
/// strings, since wire formats cannot carry non-string map keys;
/// reconstruction converts them back to task indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDoc {
  pub name: String,
  pub requirements: Vec<String>,
  pub tasks: Vec<TaskDoc>,
  pub links: BTreeMap<String, Vec<usize>>,
}

fn default_true() -> bool {
  true
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn type_tag_dispatches_deserialization() {
    let doc: TaskDoc = serde_json::from_value(serde_json::json!({
      "type": "python",
      "name": "fetch",
      "requirements": ["lattice"],
      "function": "pkg.fetch",
      "args": [1, 2],
      "kwargs": {},
    }))
    .unwrap();

    let TaskDoc::Python(unit) = doc else {
      panic!("expected a python doc");
    };
    assert_eq!(unit.function, "pkg.fetch");
    assert!(unit.use_storage_dirs);
  }

  #[test]
  fn dag_documents_nest_inside_dag_documents() {
    let json = serde_json::json!({
      "type": "dag",
      "name": "outer",
      "requirements": ["lattice"],
      "tasks": [{
        "type": "dag",
        "name": "inner",
        "requirements": ["lattice"],
        "tasks": [],
        "links": {},
      }],
      "links": {"0": []},
    });

    let doc: TaskDoc = serde_json::from_value(json).unwrap();
    let TaskDoc::Dag(outer) = doc else {
      panic!("expected a dag doc");
    };
    assert_eq!(outer.links["0"], Vec::<usize>::new());
    assert!(matches!(outer.tasks[0], TaskDoc::Dag(_)));
  }

  #[test]
  fn empty_links_are_still_emitted() {
    let doc = GraphDoc {
      name: "main".into(),
      requirements: vec!["lattice".into()],
      tasks: Vec::new(),
      links: BTreeMap::new(),
    };
    let json = serde_json::to_value(&doc).unwrap();
    assert_eq!(json["links"], serde_json::json!({}));
  }
}
