use std::collections::BTreeSet;

use lattice_model::{
  ArgSource, BranchTask, FileRef, FuncRef, Graph, KwargSource, MapKey, OutputName, QueryExpr,
  Requirements, Task, UnitTask, Value,
};
use tracing::debug;

use crate::document::{BranchDoc, GraphDoc, TaskDoc, UnitDoc};
use crate::error::WireError;

/// Reconstruct a graph from its wire document. Only the `dag`-tagged variant
/// names a graph; any other document kind is an error.
///
/// Tasks are rebuilt first, unaware of links; the link map then drives the
/// same refresh used during normal construction, so the adjacency and the
/// derived per-task parents come back identical even though parents are not
/// part of the wire format.
pub fn from_document(doc: TaskDoc) -> Result<Graph, WireError> {
  let doc = match doc {
    TaskDoc::Dag(doc) => doc,
    other => return Err(WireError::NotADag(other.name().to_string())),
  };
  let graph = graph_from_doc(doc)?;
  debug!(graph = %graph.name, tasks = graph.len(), "graph reconstructed");
  Ok(graph)
}

/// Parse a whole document of any task kind.
pub fn from_value(value: serde_json::Value) -> Result<Task, WireError> {
  let doc: TaskDoc = serde_json::from_value(value)?;
  task_from_doc(doc)
}

/// Single dispatch point over the type tag.
pub fn task_from_doc(doc: TaskDoc) -> Result<Task, WireError> {
  match doc {
    TaskDoc::Python(doc) => Ok(Task::Unit(unit_from_doc(doc))),
    TaskDoc::Branch(doc) => Ok(Task::Branch(branch_from_doc(doc)?)),
    TaskDoc::Dag(doc) => Ok(Task::Graph(graph_from_doc(doc)?)),
  }
}

fn unit_from_doc(doc: UnitDoc) -> UnitTask {
  let mut task = UnitTask::named(doc.name, FuncRef::Name(doc.function));
  task.requirements = requirements_from(doc.requirements);
  task.args = match doc.args {
    serde_json::Value::Array(items) => {
      ArgSource::List(items.into_iter().map(Value::Literal).collect())
    }
    other => ArgSource::Deferred(value_from_wire(other)),
  };
  task.kwargs = match doc.kwargs {
    serde_json::Value::Object(map) => KwargSource::Map(
      map
        .into_iter()
        .map(|(name, value)| (name, Value::Literal(value)))
        .collect(),
    ),
    other => KwargSource::Deferred(value_from_wire(other)),
  };
  task.download = doc.download.into_iter().map(FileRef::Tag).collect();
  task.upload = doc
    .upload
    .into_iter()
    .map(|(tag, queries)| {
      (
        FileRef::Tag(tag),
        queries.into_iter().map(QueryExpr).collect(),
      )
    })
    .collect();
  task.output_to = doc.output_to.map(OutputName::Name);
  task.output_extraction = doc
    .output_extraction
    .into_iter()
    .map(|(name, query)| (MapKey::Name(name), QueryExpr(query)))
    .collect();
  task.use_storage_dirs = doc.use_storage_dirs;
  task
}

fn branch_from_doc(doc: BranchDoc) -> Result<BranchTask, WireError> {
  let mut branch = BranchTask::new(
    doc.name,
    doc.branch_data.into_iter().map(value_from_wire).collect(),
    doc.branch_files.into_iter().map(FileRef::Tag).collect(),
  )?;
  branch.register(task_from_doc(*doc.task)?)?;
  // requirement sets on the wire are already complete snapshots; set the
  // branch's own set after registration so the child's is not re-unioned
  branch.requirements = requirements_from(doc.requirements);
  Ok(branch)
}

fn graph_from_doc(doc: GraphDoc) -> Result<Graph, WireError> {
  let mut tasks = Vec::with_capacity(doc.tasks.len());
  for task in doc.tasks {
    tasks.push(task_from_doc(task)?);
  }
  // index keys travel as strings; convert them back
  let mut links = std::collections::BTreeMap::new();
  for (key, children) in doc.links {
    let index: usize = key
      .parse()
      .map_err(|_| WireError::BadLinkKey(key.clone()))?;
    links.insert(index, children);
  }
  Ok(Graph::from_parts(
    doc.name,
    requirements_from(doc.requirements),
    tasks,
    links,
  )?)
}

fn requirements_from(tags: Vec<String>) -> Requirements {
  tags.into_iter().collect::<BTreeSet<_>>().into()
}

/// Resolved deferred values come back as query strings; anything else was a
/// literal all along.
fn value_from_wire(value: serde_json::Value) -> Value {
  match value {
    serde_json::Value::String(query) => Value::Query(QueryExpr(query)),
    other => Value::Literal(other),
  }
}
