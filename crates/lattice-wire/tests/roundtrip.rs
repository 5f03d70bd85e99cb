//! Wire round-trip: a graph built through the public API survives
//! serialization, JSON transit, and reconstruction.

use lattice_model::{
  BranchTask, FuncRef, GraphBuilder, GraphError, Placeholder, Task, UnitTask, Value,
};
use lattice_wire::{from_document, to_document};

fn build_pipeline() -> Result<lattice_model::Graph, GraphError> {
  let energies = Placeholder::named("energies");

  let mut b = GraphBuilder::new("pipeline");
  b.task(
    UnitTask::named("fetch", FuncRef::symbol("pkg.io", "fetch"))
      .with_args(["s3://bucket/geometries"])
      .with_upload("geometries", ["*.xyz"]),
  )?;

  b.enter_branch(
    BranchTask::over_files("scan", ["geometries"])?
      .with_parents(["fetch"])
      .with_requirements(["gpu"]),
  );
  b.task(
    UnitTask::named("energy", FuncRef::name("pkg.chem.energy"))
      .with_kwarg("method", "dft")
      .with_download(["geometries"])
      .with_output_to(energies.clone()),
  )?;
  b.exit()?;

  b.enter_graph("report");
  b.task(
    UnitTask::named("plot", FuncRef::name("pkg.plot.curve"))
      .with_args([Value::from(energies.clone())]),
  )?;
  b.task(
    UnitTask::named("summarize", FuncRef::name("pkg.plot.table"))
      .with_deferred_args(energies)
      .with_output_extraction("minimum", "argmin(energies)")
      .without_storage_dirs(),
  )?;
  b.link("plot", "summarize")?;
  b.exit()?;
  b.link("scan", "report")?;

  b.finish()
}

#[test]
fn roundtrip_preserves_structure_and_fields() {
  let graph = build_pipeline().unwrap();
  let doc = to_document(&graph).unwrap();

  // cross the wire as JSON text, type tag included
  let text = serde_json::to_string(&doc).unwrap();
  assert!(text.contains(r#""type":"dag""#));
  let received: lattice_wire::TaskDoc = serde_json::from_str(&text).unwrap();
  assert_eq!(received, doc);

  let rebuilt = from_document(received).unwrap();
  assert_eq!(rebuilt.len(), graph.len());
  assert_eq!(rebuilt.links(), graph.links());
  for (a, b) in graph.tasks().iter().zip(rebuilt.tasks()) {
    assert_eq!(a.name(), b.name());
    assert_eq!(a.parents(), b.parents());
    assert_eq!(a.requirements(), b.requirements());
  }

  // post-resolution field fidelity: re-serializing the rebuilt graph yields
  // the identical document
  assert_eq!(to_document(&rebuilt).unwrap(), doc);
}

#[test]
fn roundtrip_preserves_nested_owners() {
  let graph = build_pipeline().unwrap();
  let rebuilt = from_document(to_document(&graph).unwrap()).unwrap();

  let Some(Task::Branch(branch)) = rebuilt.get_by_name("scan") else {
    panic!("expected branch task");
  };
  assert_eq!(branch.task().unwrap().name(), "energy");
  assert!(branch.requirements.contains("gpu"));
  // snapshot taken at registration survives the wire
  assert!(branch.task().unwrap().requirements().contains("gpu"));

  let Some(Task::Graph(report)) = rebuilt.get_by_name("report") else {
    panic!("expected nested graph");
  };
  assert_eq!(report.len(), 2);
  assert_eq!(report.links()[&0], vec![1]);
}

#[test]
fn roundtrip_requirements_stay_monotonic() {
  let graph = build_pipeline().unwrap();
  let rebuilt = from_document(to_document(&graph).unwrap()).unwrap();

  let root = Task::Graph(rebuilt);
  let all = root.all_requirements();
  assert!(all.contains(lattice_model::ENGINE_TAG));
  assert!(all.contains("gpu"));
  let Task::Graph(rebuilt) = &root else {
    unreachable!()
  };
  for task in rebuilt.tasks() {
    assert!(all.is_superset(&task.all_requirements()));
  }
}
