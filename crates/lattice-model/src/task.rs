use std::collections::BTreeMap;

use crate::error::GraphError;
use crate::graph::{Graph, TaskRef};
use crate::requirements::Requirements;
use crate::value::{ArgSource, FileRef, FuncRef, KwargSource, MapKey, OutputName, QueryExpr, Value};

/// One node in a workflow graph.
///
/// Ownership is tree-shaped: a task is owned by value by whichever graph or
/// branch holds it, so a task has exactly one owner for its lifetime.
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
  Unit(UnitTask),
  Branch(BranchTask),
  Graph(Graph),
}

impl Task {
  pub fn name(&self) -> &str {
    match self {
      Self::Unit(t) => &t.name,
      Self::Branch(t) => &t.name,
      Self::Graph(g) => &g.name,
    }
  }

  /// Parent references as declared by the caller, or as last derived from the
  /// owning graph's links.
  pub fn parents(&self) -> &[TaskRef] {
    match self {
      Self::Unit(t) => &t.parents,
      Self::Branch(t) => &t.parents,
      Self::Graph(g) => &g.parents,
    }
  }

  pub(crate) fn set_parents(&mut self, parents: Vec<TaskRef>) {
    match self {
      Self::Unit(t) => t.parents = parents,
      Self::Branch(t) => t.parents = parents,
      Self::Graph(g) => g.parents = parents,
    }
  }

  pub fn requirements(&self) -> &Requirements {
    match self {
      Self::Unit(t) => &t.requirements,
      Self::Branch(t) => &t.requirements,
      Self::Graph(g) => &g.requirements,
    }
  }

  pub(crate) fn requirements_mut(&mut self) -> &mut Requirements {
    match self {
      Self::Unit(t) => &mut t.requirements,
      Self::Branch(t) => &mut t.requirements,
      Self::Graph(g) => &mut g.requirements,
    }
  }

  /// Requirements of this task and everything it transitively owns.
  ///
  /// A tree-fold: ownership is acyclic by construction, so no visited set is
  /// needed.
  pub fn all_requirements(&self) -> Requirements {
    let mut reqs = self.requirements().clone();
    match self {
      Self::Unit(_) => {}
      Self::Branch(t) => {
        if let Some(child) = t.task() {
          reqs.union_with(&child.all_requirements());
        }
      }
      Self::Graph(g) => {
        for child in g.tasks() {
          reqs.union_with(&child.all_requirements());
        }
      }
    }
    reqs
  }
}

impl From<UnitTask> for Task {
  fn from(task: UnitTask) -> Self {
    Self::Unit(task)
  }
}

impl From<BranchTask> for Task {
  fn from(task: BranchTask) -> Self {
    Self::Branch(task)
  }
}

impl From<Graph> for Task {
  fn from(graph: Graph) -> Self {
    Self::Graph(graph)
  }
}

/// A leaf task: one callable invocation plus its I/O bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitTask {
  pub name: String,
  pub parents: Vec<TaskRef>,
  pub requirements: Requirements,
  pub function: FuncRef,
  pub args: ArgSource,
  pub kwargs: KwargSource,
  /// File tags to fetch before the callable runs.
  pub download: Vec<FileRef>,
  /// File tag to one or more query/glob expressions selecting what to store.
  pub upload: Vec<(FileRef, Vec<QueryExpr>)>,
  /// Where the callable's return value is stored.
  pub output_to: Option<OutputName>,
  /// Named sub-parts of the return value, extracted by query.
  pub output_extraction: Vec<(MapKey, QueryExpr)>,
  pub use_storage_dirs: bool,
}

impl UnitTask {
  pub fn new(function: FuncRef) -> Self {
    Self::named("task", function)
  }

  pub fn named(name: impl Into<String>, function: FuncRef) -> Self {
    Self {
      name: name.into(),
      parents: Vec::new(),
      requirements: Requirements::new(),
      function,
      args: ArgSource::default(),
      kwargs: KwargSource::default(),
      download: Vec::new(),
      upload: Vec::new(),
      output_to: None,
      output_extraction: Vec::new(),
      use_storage_dirs: true,
    }
  }

  pub fn with_parents<I, R>(mut self, parents: I) -> Self
  where
    I: IntoIterator<Item = R>,
    R: Into<TaskRef>,
  {
    self.parents = parents.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_parent(mut self, parent: impl Into<TaskRef>) -> Self {
    self.parents.push(parent.into());
    self
  }

  pub fn with_requirements<I, S>(mut self, tags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    for tag in tags {
      self.requirements.insert(tag);
    }
    self
  }

  pub fn with_args<I, V>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
  {
    self.args = args.into_iter().collect();
    self
  }

  /// A single deferred value that evaluates to the whole argument list.
  pub fn with_deferred_args(mut self, args: impl Into<Value>) -> Self {
    self.args = ArgSource::Deferred(args.into());
    self
  }

  pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    if let KwargSource::Map(map) = &mut self.kwargs {
      map.insert(key.into(), value.into());
    } else {
      self.kwargs = KwargSource::Map(BTreeMap::from([(key.into(), value.into())]));
    }
    self
  }

  /// A single deferred value that evaluates to the whole keyword mapping.
  pub fn with_deferred_kwargs(mut self, kwargs: impl Into<Value>) -> Self {
    self.kwargs = KwargSource::Deferred(kwargs.into());
    self
  }

  pub fn with_download<I, F>(mut self, files: I) -> Self
  where
    I: IntoIterator<Item = F>,
    F: Into<FileRef>,
  {
    self.download = files.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_upload<F, I, Q>(mut self, file: F, queries: I) -> Self
  where
    F: Into<FileRef>,
    I: IntoIterator<Item = Q>,
    Q: Into<QueryExpr>,
  {
    self
      .upload
      .push((file.into(), queries.into_iter().map(Into::into).collect()));
    self
  }

  pub fn with_output_to(mut self, output: impl Into<OutputName>) -> Self {
    self.output_to = Some(output.into());
    self
  }

  pub fn with_output_extraction(
    mut self,
    key: impl Into<MapKey>,
    query: impl Into<QueryExpr>,
  ) -> Self {
    self.output_extraction.push((key.into(), query.into()));
    self
  }

  pub fn without_storage_dirs(mut self) -> Self {
    self.use_storage_dirs = false;
    self
  }
}

/// An owner task that replicates a single child once per element of a
/// runtime-determined data or file source.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchTask {
  pub name: String,
  pub parents: Vec<TaskRef>,
  pub requirements: Requirements,
  /// Each element must evaluate to a list, or to a mapping keyed by
  /// non-negative branch index, at run time.
  pub branch_data: Vec<Value>,
  /// Each resolved file becomes one branch instance.
  pub branch_files: Vec<FileRef>,
  task: Option<Box<Task>>,
}

impl BranchTask {
  /// At least one of `branch_data` / `branch_files` must be non-empty.
  pub fn new(
    name: impl Into<String>,
    branch_data: Vec<Value>,
    branch_files: Vec<FileRef>,
  ) -> Result<Self, GraphError> {
    let name = name.into();
    if branch_data.is_empty() && branch_files.is_empty() {
      return Err(GraphError::MissingBranchSource(name));
    }
    Ok(Self {
      name,
      parents: Vec::new(),
      requirements: Requirements::new(),
      branch_data,
      branch_files,
      task: None,
    })
  }

  pub fn over_data<I, V>(name: impl Into<String>, data: I) -> Result<Self, GraphError>
  where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
  {
    Self::new(name, data.into_iter().map(Into::into).collect(), Vec::new())
  }

  pub fn over_files<I, F>(name: impl Into<String>, files: I) -> Result<Self, GraphError>
  where
    I: IntoIterator<Item = F>,
    F: Into<FileRef>,
  {
    Self::new(name, Vec::new(), files.into_iter().map(Into::into).collect())
  }

  pub fn with_parents<I, R>(mut self, parents: I) -> Self
  where
    I: IntoIterator<Item = R>,
    R: Into<TaskRef>,
  {
    self.parents = parents.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_requirements<I, S>(mut self, tags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    for tag in tags {
      self.requirements.insert(tag);
    }
    self
  }

  /// Fill the single child slot. The owner's requirements are unioned into
  /// the child once, as a snapshot; later owner changes do not propagate.
  ///
  /// Registering a second task is a fatal structural error.
  pub fn register(&mut self, task: impl Into<Task>) -> Result<(), GraphError> {
    if self.task.is_some() {
      return Err(GraphError::BranchOccupied(self.name.clone()));
    }
    let mut task = task.into();
    task.requirements_mut().union_with(&self.requirements);
    self.task = Some(Box::new(task));
    Ok(())
  }

  pub fn task(&self) -> Option<&Task> {
    self.task.as_deref()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::requirements::ENGINE_TAG;

  #[test]
  fn branch_requires_a_fanout_source() {
    let err = BranchTask::new("fan", Vec::new(), Vec::new()).unwrap_err();
    assert!(matches!(err, GraphError::MissingBranchSource(name) if name == "fan"));

    assert!(BranchTask::over_data("fan", [Value::query("inputs/xs")]).is_ok());
    assert!(BranchTask::over_files("fan", ["images"]).is_ok());
  }

  #[test]
  fn branch_slot_fills_once() {
    let mut branch = BranchTask::over_files("fan", ["images"]).unwrap();
    branch.register(UnitTask::new(FuncRef::name("m.f"))).unwrap();

    let err = branch
      .register(UnitTask::new(FuncRef::name("m.g")))
      .unwrap_err();
    assert!(matches!(err, GraphError::BranchOccupied(_)));
  }

  #[test]
  fn register_snapshots_owner_requirements() {
    let mut branch = BranchTask::over_files("fan", ["images"])
      .unwrap()
      .with_requirements(["gpu"]);
    branch.register(UnitTask::new(FuncRef::name("m.f"))).unwrap();

    assert!(branch.task().unwrap().requirements().contains("gpu"));
  }

  #[test]
  fn all_requirements_folds_over_owned_tasks() {
    let mut branch = BranchTask::over_files("fan", ["images"]).unwrap();
    branch
      .register(UnitTask::new(FuncRef::name("m.f")).with_requirements(["mpi"]))
      .unwrap();
    let task = Task::Branch(branch);

    let all = task.all_requirements();
    assert!(all.contains("mpi"));
    assert!(all.contains(ENGINE_TAG));
    assert!(all.is_superset(task.requirements()));
    let Task::Branch(branch) = &task else {
      unreachable!()
    };
    assert!(all.is_superset(&branch.task().unwrap().all_requirements()));
  }
}
