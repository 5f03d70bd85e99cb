use crate::error::GraphError;
use crate::graph::{Graph, TaskRef};
use crate::task::{BranchTask, Task, UnitTask};

enum OwnerFrame {
  Graph(Graph),
  Branch(BranchTask),
}

/// An explicit owner-scope stack for composing nested graphs.
///
/// Replaces the source system's process-global "current owner": the stack is
/// an ordinary value passed by `&mut` reference, so nested scopes compose the
/// same way (`enter_*` pushes, `exit` pops and registers the finished owner
/// with its parent scope) while staying single-threaded by construction.
///
/// ```
/// use lattice_model::{BranchTask, FuncRef, GraphBuilder, UnitTask};
///
/// let mut b = GraphBuilder::new("main");
/// b.task(UnitTask::named("fetch", FuncRef::name("pkg.fetch")))?;
/// b.enter_branch(BranchTask::over_files("fan", ["images"])?);
/// b.task(UnitTask::named("resize", FuncRef::name("pkg.resize")))?;
/// b.exit()?;
/// b.link("fetch", "fan")?;
/// let graph = b.finish()?;
/// assert_eq!(graph.len(), 2);
/// # Ok::<(), lattice_model::GraphError>(())
/// ```
pub struct GraphBuilder {
  root: Graph,
  stack: Vec<OwnerFrame>,
}

impl GraphBuilder {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      root: Graph::new(name),
      stack: Vec::new(),
    }
  }

  /// Register a unit task with the current owner.
  pub fn task(&mut self, task: UnitTask) -> Result<(), GraphError> {
    self.attach(Task::Unit(task))
  }

  /// Open a nested sub-graph scope.
  pub fn enter_graph(&mut self, name: impl Into<String>) {
    self.stack.push(OwnerFrame::Graph(Graph::new(name)));
  }

  /// Open a branch scope; the next registered task fills its child slot.
  pub fn enter_branch(&mut self, branch: BranchTask) {
    self.stack.push(OwnerFrame::Branch(branch));
  }

  /// Close the innermost scope, registering the finished owner with the
  /// scope that encloses it.
  pub fn exit(&mut self) -> Result<(), GraphError> {
    let frame = self.stack.pop().ok_or(GraphError::NoOpenScope)?;
    let task = match frame {
      OwnerFrame::Graph(graph) => Task::Graph(graph),
      OwnerFrame::Branch(branch) => Task::Branch(branch),
    };
    self.attach(task)
  }

  /// Declare an edge on the innermost graph scope.
  pub fn link(
    &mut self,
    parent: impl Into<TaskRef>,
    child: impl Into<TaskRef>,
  ) -> Result<(), GraphError> {
    self.current_graph().add_link(parent, child)
  }

  /// Return the root graph; fails if any nested scope is still open.
  pub fn finish(self) -> Result<Graph, GraphError> {
    if !self.stack.is_empty() {
      return Err(GraphError::ScopeStillOpen(self.stack.len()));
    }
    Ok(self.root)
  }

  fn attach(&mut self, task: Task) -> Result<(), GraphError> {
    match self.stack.last_mut() {
      Some(OwnerFrame::Graph(graph)) => graph.register(task).map(|_| ()),
      Some(OwnerFrame::Branch(branch)) => branch.register(task),
      None => self.root.register(task).map(|_| ()),
    }
  }

  fn current_graph(&mut self) -> &mut Graph {
    for frame in self.stack.iter_mut().rev() {
      if let OwnerFrame::Graph(graph) = frame {
        return graph;
      }
    }
    &mut self.root
  }
}
