//! Deferred document trees and the whole-tree resolution passes.
//!
//! Serialization assembles the complete tree for a graph first, then resolves
//! deferred values over the assembled tree: placeholder resolution is
//! position-sensitive (name positions are `output_to` values and
//! `upload`/`output_extraction` keys; everywhere else the query form is
//! substituted), and callable references resolve to name strings under
//! `function` keys. Strict finalization rejects anything left deferred, so a
//! partial document can never escape.

use lattice_model::{
  ArgSource, BranchTask, FileRef, FuncRef, Graph, KwargSource, MapKey, OutputName, Placeholder,
  QueryExpr, Requirements, Task, UnitTask, Value,
};
use serde_json::json;

use crate::error::WireError;

/// A map key that may still be a deferred placeholder.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DocKey {
  Name(String),
  Placeholder(Placeholder),
}

/// A wire-shaped tree that may still contain deferred values.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DocNode {
  Scalar(serde_json::Value),
  Seq(Vec<DocNode>),
  Map(Vec<(DocKey, DocNode)>),
  Placeholder(Placeholder),
  Func(FuncRef),
  /// Marks a value in name position: a placeholder under this marker resolves
  /// to its declared name, not its query form. Emitted only where the model
  /// declares a name (`output_to`), so a user value whose key merely looks
  /// like one is unaffected.
  NamePosition(Box<DocNode>),
}

fn key(name: &str) -> DocKey {
  DocKey::Name(name.to_string())
}

pub(crate) fn task_tree(task: &Task) -> Result<DocNode, WireError> {
  match task {
    Task::Unit(task) => unit_tree(task),
    Task::Branch(task) => branch_tree(task),
    Task::Graph(graph) => graph_tree(graph),
  }
}

fn unit_tree(task: &UnitTask) -> Result<DocNode, WireError> {
  let mut entries = vec![
    (key("type"), DocNode::Scalar(json!("python"))),
    (key("name"), DocNode::Scalar(json!(task.name))),
    (key("requirements"), requirements_tree(&task.requirements)),
    (key("function"), DocNode::Func(task.function.clone())),
    (key("args"), args_tree(&task.args)),
    (key("kwargs"), kwargs_tree(&task.kwargs)),
  ];
  if !task.download.is_empty() {
    entries.push((
      key("download"),
      DocNode::Seq(task.download.iter().map(file_tree).collect()),
    ));
  }
  if !task.upload.is_empty() {
    entries.push((
      key("upload"),
      DocNode::Map(
        task
          .upload
          .iter()
          .map(|(file, queries)| {
            (
              file_key(file),
              DocNode::Seq(queries.iter().map(query_tree).collect()),
            )
          })
          .collect(),
      ),
    ));
  }
  if let Some(output) = &task.output_to {
    let node = match output {
      OutputName::Name(name) => DocNode::Scalar(json!(name)),
      OutputName::Placeholder(placeholder) => DocNode::Placeholder(placeholder.clone()),
    };
    entries.push((key("output_to"), DocNode::NamePosition(Box::new(node))));
  }
  if !task.output_extraction.is_empty() {
    entries.push((
      key("output_extraction"),
      DocNode::Map(
        task
          .output_extraction
          .iter()
          .map(|(map_key, query)| (extraction_key(map_key), query_tree(query)))
          .collect(),
      ),
    ));
  }
  entries.push((
    key("use_storage_dirs"),
    DocNode::Scalar(json!(task.use_storage_dirs)),
  ));
  Ok(DocNode::Map(entries))
}

fn branch_tree(task: &BranchTask) -> Result<DocNode, WireError> {
  let child = task
    .task()
    .ok_or_else(|| WireError::MissingBranchTask(task.name.clone()))?;
  let mut entries = vec![
    (key("type"), DocNode::Scalar(json!("branch"))),
    (key("name"), DocNode::Scalar(json!(task.name))),
    (key("requirements"), requirements_tree(&task.requirements)),
    (key("task"), task_tree(child)?),
  ];
  if !task.branch_data.is_empty() {
    entries.push((
      key("branch_data"),
      DocNode::Seq(task.branch_data.iter().map(value_tree).collect()),
    ));
  }
  if !task.branch_files.is_empty() {
    entries.push((
      key("branch_files"),
      DocNode::Seq(task.branch_files.iter().map(file_tree).collect()),
    ));
  }
  Ok(DocNode::Map(entries))
}

pub(crate) fn graph_tree(graph: &Graph) -> Result<DocNode, WireError> {
  let mut tasks = Vec::with_capacity(graph.len());
  for task in graph.tasks() {
    tasks.push(task_tree(task)?);
  }
  let links = graph
    .links()
    .iter()
    .map(|(parent, children)| {
      (
        DocKey::Name(parent.to_string()),
        DocNode::Seq(children.iter().map(|&c| DocNode::Scalar(json!(c))).collect()),
      )
    })
    .collect();
  Ok(DocNode::Map(vec![
    (key("type"), DocNode::Scalar(json!("dag"))),
    (key("name"), DocNode::Scalar(json!(graph.name))),
    (key("requirements"), requirements_tree(&graph.requirements)),
    (key("tasks"), DocNode::Seq(tasks)),
    // always present, even when empty
    (key("links"), DocNode::Map(links)),
  ]))
}

fn requirements_tree(requirements: &Requirements) -> DocNode {
  DocNode::Seq(
    requirements
      .iter()
      .map(|tag| DocNode::Scalar(json!(tag)))
      .collect(),
  )
}

fn value_tree(value: &Value) -> DocNode {
  match value {
    Value::Literal(literal) => DocNode::Scalar(literal.clone()),
    // a query expression already is its resolved wire form
    Value::Query(query) => DocNode::Scalar(json!(query.as_str())),
    Value::Placeholder(placeholder) => DocNode::Placeholder(placeholder.clone()),
    Value::List(items) => DocNode::Seq(items.iter().map(value_tree).collect()),
  }
}

fn args_tree(args: &ArgSource) -> DocNode {
  match args {
    ArgSource::List(items) => DocNode::Seq(items.iter().map(value_tree).collect()),
    ArgSource::Deferred(value) => value_tree(value),
  }
}

fn kwargs_tree(kwargs: &KwargSource) -> DocNode {
  match kwargs {
    KwargSource::Map(map) => DocNode::Map(
      map
        .iter()
        .map(|(name, value)| (DocKey::Name(name.clone()), value_tree(value)))
        .collect(),
    ),
    KwargSource::Deferred(value) => value_tree(value),
  }
}

fn file_tree(file: &FileRef) -> DocNode {
  match file {
    FileRef::Tag(tag) => DocNode::Scalar(json!(tag)),
    FileRef::Placeholder(placeholder) => DocNode::Placeholder(placeholder.clone()),
  }
}

fn file_key(file: &FileRef) -> DocKey {
  match file {
    FileRef::Tag(tag) => DocKey::Name(tag.clone()),
    FileRef::Placeholder(placeholder) => DocKey::Placeholder(placeholder.clone()),
  }
}

fn extraction_key(map_key: &MapKey) -> DocKey {
  match map_key {
    MapKey::Name(name) => DocKey::Name(name.clone()),
    MapKey::Placeholder(placeholder) => DocKey::Placeholder(placeholder.clone()),
  }
}

fn query_tree(query: &QueryExpr) -> DocNode {
  DocNode::Scalar(json!(query.as_str()))
}

/// Placeholder pass: deferred map keys and `NamePosition`-marked values
/// resolve to the placeholder's declared name; all other placeholders
/// resolve to their query form. Already-plain strings pass through
/// untouched.
pub(crate) fn resolve_placeholders(node: DocNode) -> DocNode {
  resolve_placeholder_node(node, false)
}

fn resolve_placeholder_node(node: DocNode, name_position: bool) -> DocNode {
  match node {
    DocNode::Placeholder(placeholder) => DocNode::Scalar(if name_position {
      json!(placeholder.name)
    } else {
      json!(placeholder.query.as_str())
    }),
    DocNode::NamePosition(inner) => resolve_placeholder_node(*inner, true),
    DocNode::Seq(items) => DocNode::Seq(
      items
        .into_iter()
        .map(|item| resolve_placeholder_node(item, false))
        .collect(),
    ),
    DocNode::Map(entries) => DocNode::Map(
      entries
        .into_iter()
        .map(|(entry_key, value)| {
          let name = match entry_key {
            DocKey::Name(name) => name,
            DocKey::Placeholder(placeholder) => placeholder.name,
          };
          (DocKey::Name(name), resolve_placeholder_node(value, false))
        })
        .collect(),
    ),
    other => other,
  }
}

/// Callable pass: function references under a `function` key resolve to their
/// globally-resolvable name string.
pub(crate) fn resolve_functions(node: DocNode) -> DocNode {
  match node {
    DocNode::NamePosition(inner) => DocNode::NamePosition(Box::new(resolve_functions(*inner))),
    DocNode::Seq(items) => DocNode::Seq(items.into_iter().map(resolve_functions).collect()),
    DocNode::Map(entries) => DocNode::Map(
      entries
        .into_iter()
        .map(|(entry_key, value)| {
          let value = match (&entry_key, value) {
            (DocKey::Name(name), DocNode::Func(func)) if name == "function" => {
              DocNode::Scalar(json!(func.resolved()))
            }
            (_, value) => resolve_functions(value),
          };
          (entry_key, value)
        })
        .collect(),
    ),
    other => other,
  }
}

/// Strict finalization: anything still deferred fails the whole call.
pub(crate) fn finalize(node: DocNode) -> Result<serde_json::Value, WireError> {
  match node {
    DocNode::Scalar(value) => Ok(value),
    DocNode::Seq(items) => Ok(serde_json::Value::Array(
      items.into_iter().map(finalize).collect::<Result<_, _>>()?,
    )),
    DocNode::Map(entries) => {
      let mut map = serde_json::Map::new();
      for (entry_key, value) in entries {
        let name = match entry_key {
          DocKey::Name(name) => name,
          DocKey::Placeholder(placeholder) => {
            return Err(WireError::UnresolvedPlaceholder(placeholder.name));
          }
        };
        map.insert(name, finalize(value)?);
      }
      Ok(serde_json::Value::Object(map))
    }
    DocNode::Placeholder(placeholder) => Err(WireError::UnresolvedPlaceholder(placeholder.name)),
    DocNode::Func(_) => Err(WireError::UnresolvedFunction),
    DocNode::NamePosition(inner) => finalize(*inner),
  }
}

/// Lenient finalization for isolated task rendering: deferred values appear
/// in their raw form instead of failing.
pub(crate) fn finalize_raw(node: DocNode) -> serde_json::Value {
  match node {
    DocNode::Scalar(value) => value,
    DocNode::Seq(items) => serde_json::Value::Array(items.into_iter().map(finalize_raw).collect()),
    DocNode::Map(entries) => {
      let mut map = serde_json::Map::new();
      for (entry_key, value) in entries {
        let name = match entry_key {
          DocKey::Name(name) => name,
          // JSON keys must be strings; the declared name is the raw key form
          DocKey::Placeholder(placeholder) => placeholder.name,
        };
        map.insert(name, finalize_raw(value));
      }
      serde_json::Value::Object(map)
    }
    DocNode::Placeholder(placeholder) => json!({
      "name": placeholder.name,
      "query": placeholder.query.as_str(),
    }),
    DocNode::Func(func) => match func {
      FuncRef::Name(name) => json!(name),
      FuncRef::Symbol { namespace, ident } => json!({
        "namespace": namespace,
        "ident": ident,
      }),
    },
    DocNode::NamePosition(inner) => finalize_raw(*inner),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn name_positions_take_the_declared_name() {
    let placeholder = Placeholder::new("energies", "tasks/scan/output");
    let node = DocNode::Map(vec![
      (
        key("output_to"),
        DocNode::NamePosition(Box::new(DocNode::Placeholder(placeholder.clone()))),
      ),
      (key("download"), DocNode::Seq(vec![DocNode::Placeholder(placeholder.clone())])),
      (
        key("upload"),
        DocNode::Map(vec![(
          DocKey::Placeholder(placeholder),
          DocNode::Seq(vec![DocNode::Scalar(json!("*.out"))]),
        )]),
      ),
    ]);

    let resolved = finalize(resolve_placeholders(node)).unwrap();
    assert_eq!(resolved["output_to"], json!("energies"));
    assert_eq!(resolved["download"], json!(["tasks/scan/output"]));
    assert_eq!(resolved["upload"], json!({"energies": ["*.out"]}));
  }

  #[test]
  fn unmarked_values_resolve_to_query_form_whatever_their_key() {
    let placeholder = Placeholder::new("energies", "tasks/scan/output");
    let node = DocNode::Map(vec![(
      key("output_to"),
      DocNode::Placeholder(placeholder),
    )]);

    let resolved = finalize(resolve_placeholders(node)).unwrap();
    assert_eq!(resolved["output_to"], json!("tasks/scan/output"));
  }

  #[test]
  fn function_keys_resolve_to_names() {
    let node = DocNode::Map(vec![(
      key("function"),
      DocNode::Func(FuncRef::symbol("pkg.mod", "run")),
    )]);
    let resolved = finalize(resolve_functions(node)).unwrap();
    assert_eq!(resolved["function"], json!("pkg.mod.run"));
  }

  #[test]
  fn strict_finalize_rejects_deferred_leftovers() {
    let err = finalize(DocNode::Placeholder(Placeholder::named("x"))).unwrap_err();
    assert!(matches!(err, WireError::UnresolvedPlaceholder(name) if name == "x"));

    let err = finalize(DocNode::Func(FuncRef::name("pkg.run"))).unwrap_err();
    assert!(matches!(err, WireError::UnresolvedFunction));
  }

  #[test]
  fn lenient_finalize_keeps_raw_forms() {
    let raw = finalize_raw(DocNode::Placeholder(Placeholder::named("x")));
    assert_eq!(raw, json!({"name": "x", "query": "x"}));
  }
}
