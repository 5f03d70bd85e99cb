use lattice_model::{Graph, Task};
use tracing::debug;

use crate::document::TaskDoc;
use crate::error::WireError;
use crate::render;

/// Serialize a graph into its wire document. The result is always the
/// `dag`-tagged variant, typed as `TaskDoc` so the type tag is part of the
/// serialized form.
///
/// The deferred tree for the whole graph is assembled first, then the
/// placeholder and callable passes run over the assembled tree (never
/// per-node: a placeholder may stand for a sibling task's declared output
/// name, which must be a plain string by the time the passes run), and strict
/// finalization fails the whole call if anything deferred survives.
pub fn to_document(graph: &Graph) -> Result<TaskDoc, WireError> {
  let tree = render::graph_tree(graph)?;
  let tree = render::resolve_placeholders(tree);
  let tree = render::resolve_functions(tree);
  let value = render::finalize(tree)?;
  debug!(graph = %graph.name, tasks = graph.len(), "graph serialized");
  Ok(serde_json::from_value(value)?)
}

/// Render a single task to a plain value without running the resolution
/// passes; deferred values appear in their raw form. Resolution belongs to
/// whole-graph serialization only.
pub fn task_to_value(task: &Task) -> Result<serde_json::Value, WireError> {
  Ok(render::finalize_raw(render::task_tree(task)?))
}

#[cfg(test)]
mod tests {
  use lattice_model::{BranchTask, FuncRef, Graph, Placeholder, Task, UnitTask, Value};
  use serde_json::json;

  use super::*;

  #[test]
  fn output_placeholder_resolves_everywhere_it_appears() {
    // one task declares its output through a placeholder, a sibling's args
    // reference the same placeholder
    let energies = Placeholder::named("energies");
    let mut graph = Graph::new("main");
    graph
      .register(
        UnitTask::named("scan", FuncRef::name("pkg.scan")).with_output_to(energies.clone()),
      )
      .unwrap();
    graph
      .register(
        UnitTask::named("plot", FuncRef::name("pkg.plot"))
          .with_args([Value::from(energies.clone())])
          .with_parent("scan"),
      )
      .unwrap();

    let doc = to_document(&graph).unwrap();
    let json = serde_json::to_value(&doc).unwrap();
    assert_eq!(json["tasks"][0]["output_to"], json!("energies"));
    assert_eq!(json["tasks"][1]["args"], json!(["energies"]));
  }

  #[test]
  fn branch_file_tags_pass_through_unchanged() {
    let mut branch = BranchTask::over_files("fan", ["images"]).unwrap();
    let child = UnitTask::named("resize", FuncRef::name("pkg.resize"));
    branch.register(child.clone()).unwrap();

    let mut graph = Graph::new("main");
    graph.register(branch.clone()).unwrap();

    let doc = to_document(&graph).unwrap();
    let json = serde_json::to_value(&doc).unwrap();
    assert_eq!(json["tasks"][0]["branch_files"], json!(["images"]));
    // the nested task document is the child's own rendering, untouched by
    // branch-level resolution
    assert_eq!(
      json["tasks"][0]["task"],
      task_to_value(&Task::Unit(child)).unwrap()
    );
  }

  #[test]
  fn symbol_functions_serialize_as_dotted_names() {
    let mut graph = Graph::new("main");
    graph
      .register(UnitTask::named("run", FuncRef::symbol("pkg.mod", "run")))
      .unwrap();

    let doc = to_document(&graph).unwrap();
    let json = serde_json::to_value(&doc).unwrap();
    assert_eq!(json["tasks"][0]["function"], json!("pkg.mod.run"));
  }

  #[test]
  fn empty_branch_fails_serialization() {
    let mut graph = Graph::new("main");
    graph
      .register(BranchTask::over_files("fan", ["images"]).unwrap())
      .unwrap();

    let err = to_document(&graph).unwrap_err();
    assert!(matches!(err, WireError::MissingBranchTask(name) if name == "fan"));
  }

  #[test]
  fn independent_tasks_still_get_an_explicit_links_map() {
    let mut graph = Graph::new("main");
    graph
      .register(UnitTask::named("a", FuncRef::name("pkg.a")))
      .unwrap();
    graph
      .register(UnitTask::named("b", FuncRef::name("pkg.b")))
      .unwrap();

    let doc = to_document(&graph).unwrap();
    let TaskDoc::Dag(dag) = &doc else {
      panic!("expected a dag document");
    };
    let expected: std::collections::BTreeMap<String, Vec<usize>> =
      [("0".to_string(), vec![]), ("1".to_string(), vec![])].into();
    assert_eq!(dag.links, expected);
    let json = serde_json::to_value(&doc).unwrap();
    assert_eq!(json["links"], json!({"0": [], "1": []}));
  }

  #[test]
  fn serialized_graphs_carry_their_type_tag() {
    let mut graph = Graph::new("main");
    graph
      .register(UnitTask::named("a", FuncRef::name("pkg.a")))
      .unwrap();
    graph
      .register(UnitTask::named("b", FuncRef::name("pkg.b")).with_parent("a"))
      .unwrap();

    let doc = to_document(&graph).unwrap();
    let json = serde_json::to_value(&doc).unwrap();
    assert_eq!(json["type"], json!("dag"));

    // the emitted value parses back through the generic entry point
    let task = crate::decode::from_value(json).unwrap();
    let Task::Graph(rebuilt) = task else {
      panic!("expected a graph");
    };
    assert_eq!(rebuilt.name, "main");
    assert_eq!(rebuilt.len(), 2);
  }

  #[test]
  fn kwargs_that_shadow_field_names_still_resolve_to_query_form() {
    let energies = Placeholder::new("energies", "tasks/scan/output");
    let mut graph = Graph::new("main");
    graph
      .register(
        UnitTask::named("scan", FuncRef::name("pkg.scan"))
          .with_output_to(energies.clone())
          .with_kwarg("output_to", energies),
      )
      .unwrap();

    let doc = to_document(&graph).unwrap();
    let json = serde_json::to_value(&doc).unwrap();
    assert_eq!(json["tasks"][0]["output_to"], json!("energies"));
    assert_eq!(
      json["tasks"][0]["kwargs"]["output_to"],
      json!("tasks/scan/output")
    );
  }

  #[test]
  fn isolated_rendering_keeps_placeholders_raw() {
    let task = UnitTask::named("scan", FuncRef::name("pkg.scan"))
      .with_output_to(Placeholder::named("energies"));
    let value = task_to_value(&Task::Unit(task)).unwrap();
    assert_eq!(
      value["output_to"],
      json!({"name": "energies", "query": "energies"})
    );
  }
}
