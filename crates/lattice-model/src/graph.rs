use std::collections::BTreeMap;

use tracing::debug;

use crate::error::GraphError;
use crate::requirements::Requirements;
use crate::task::Task;

/// A reference to another task in the same graph: a zero-based index into the
/// task list, or a task name. Both forms are accepted wherever edges are
/// declared and are normalized to indices when links are refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRef {
  Index(usize),
  Name(String),
}

impl From<usize> for TaskRef {
  fn from(index: usize) -> Self {
    Self::Index(index)
  }
}

impl From<&str> for TaskRef {
  fn from(name: &str) -> Self {
    Self::Name(name.to_string())
  }
}

impl From<String> for TaskRef {
  fn from(name: String) -> Self {
    Self::Name(name)
  }
}

/// An owner task holding an ordered list of child tasks plus their dependency
/// adjacency.
///
/// The index-keyed `links` map is the single source of truth for the
/// dependency relation. Edges may be declared either by listing children under
/// a parent (`with_links`, `add_link`) or by listing parents on a child task;
/// both forms merge. Every mutation triggers a full, non-incremental refresh
/// that rebuilds the adjacency, validates it (bounds, self-parents, cycles),
/// and rewrites every task's `parents` as the derived predecessor list, so the
/// per-task view can never diverge from the adjacency between refreshes.
///
/// Structural errors are raised immediately and never retried; a mutation
/// that fails validation is rolled back, leaving the previous consistent
/// state in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
  pub name: String,
  pub parents: Vec<TaskRef>,
  pub requirements: Requirements,
  tasks: Vec<Task>,
  declared_links: Vec<(TaskRef, Vec<TaskRef>)>,
  links: BTreeMap<usize, Vec<usize>>,
}

impl Graph {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      parents: Vec::new(),
      requirements: Requirements::new(),
      tasks: Vec::new(),
      declared_links: Vec::new(),
      links: BTreeMap::new(),
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

  /// Declare edges as a parent-to-children map and refresh.
  pub fn with_links<I, R, C>(mut self, links: I) -> Result<Self, GraphError>
  where
    I: IntoIterator<Item = (R, Vec<C>)>,
    R: Into<TaskRef>,
    C: Into<TaskRef>,
  {
    for (parent, children) in links {
      self.declared_links.push((
        parent.into(),
        children.into_iter().map(Into::into).collect(),
      ));
    }
    self.refresh_links()?;
    Ok(self)
  }

  /// Rebuild a graph from already-constructed tasks and an index-keyed link
  /// map, running the same refresh used during normal construction.
  pub fn from_parts(
    name: impl Into<String>,
    requirements: Requirements,
    tasks: Vec<Task>,
    links: BTreeMap<usize, Vec<usize>>,
  ) -> Result<Self, GraphError> {
    let mut graph = Self::new(name);
    graph.requirements = requirements;
    graph.tasks = tasks;
    graph.declared_links = links
      .into_iter()
      .map(|(p, cs)| {
        (
          TaskRef::Index(p),
          cs.into_iter().map(TaskRef::Index).collect(),
        )
      })
      .collect();
    graph.refresh_links()?;
    Ok(graph)
  }

  /// Append a task and refresh. The graph's own requirements are unioned into
  /// the task once, as a snapshot. Returns the task's index.
  ///
  /// A task whose parent references fail validation is popped back off, so a
  /// rejected registration leaves the graph in its previous consistent state.
  pub fn register(&mut self, task: impl Into<Task>) -> Result<usize, GraphError> {
    let mut task = task.into();
    task.requirements_mut().union_with(&self.requirements);
    self.tasks.push(task);
    if let Err(err) = self.refresh_links() {
      self.tasks.pop();
      return Err(err);
    }
    Ok(self.tasks.len() - 1)
  }

  /// Declare a single parent-to-child edge and refresh. A rejected edge is
  /// rolled back.
  pub fn add_link(
    &mut self,
    parent: impl Into<TaskRef>,
    child: impl Into<TaskRef>,
  ) -> Result<(), GraphError> {
    self
      .declared_links
      .push((parent.into(), vec![child.into()]));
    if let Err(err) = self.refresh_links() {
      self.declared_links.pop();
      return Err(err);
    }
    Ok(())
  }

  /// Rebuild the canonical adjacency from scratch.
  ///
  /// 1. Normalize declared links to an index-keyed, index-valued map.
  /// 2. Give every task index an entry, defaulting to no children.
  /// 3. Fold each task's declared parents into the adjacency.
  /// 4. Validate: bounds, self-parents, cycle detection.
  /// 5. Rewrite every task's `parents` as the derived predecessor list,
  ///    sorted by task-list index.
  ///
  /// Idempotent: a second call with no intervening mutation reproduces the
  /// same adjacency and the same derived parents.
  pub fn refresh_links(&mut self) -> Result<(), GraphError> {
    let mut links: BTreeMap<usize, Vec<usize>> = BTreeMap::new();

    for (parent, children) in &self.declared_links {
      let p = self.resolve_ref(parent)?;
      let mut resolved = Vec::with_capacity(children.len());
      for child in children {
        resolved.push(self.resolve_ref(child)?);
      }
      let entry = links.entry(p).or_default();
      for c in resolved {
        if c == p {
          return Err(GraphError::SelfParent(self.tasks[p].name().to_string()));
        }
        if !entry.contains(&c) {
          entry.push(c);
        }
      }
    }

    for i in 0..self.tasks.len() {
      links.entry(i).or_default();
    }

    for i in 0..self.tasks.len() {
      let parent_refs = self.tasks[i].parents().to_vec();
      for parent in &parent_refs {
        let p = self.resolve_ref(parent)?;
        if p == i {
          return Err(GraphError::SelfParent(self.tasks[i].name().to_string()));
        }
        let children = links.entry(p).or_default();
        if !children.contains(&i) {
          children.push(i);
        }
      }
    }

    if has_cycle(&links, self.tasks.len()) {
      return Err(GraphError::CycleDetected(self.name.clone()));
    }

    let mut derived: Vec<Vec<TaskRef>> = vec![Vec::new(); self.tasks.len()];
    // ascending map iteration keeps each parent list sorted by task index
    for (&p, children) in &links {
      for &c in children {
        derived[c].push(TaskRef::Index(p));
      }
    }
    for (task, parents) in self.tasks.iter_mut().zip(derived) {
      task.set_parents(parents);
    }

    let edges: usize = links.values().map(Vec::len).sum();
    debug!(graph = %self.name, tasks = self.tasks.len(), edges, "links refreshed");
    self.links = links;
    Ok(())
  }

  fn resolve_ref(&self, task_ref: &TaskRef) -> Result<usize, GraphError> {
    match task_ref {
      TaskRef::Index(index) => {
        if *index < self.tasks.len() {
          Ok(*index)
        } else {
          Err(GraphError::IndexOutOfBounds {
            index: *index,
            len: self.tasks.len(),
          })
        }
      }
      // first task with a matching name wins
      TaskRef::Name(name) => self
        .tasks
        .iter()
        .position(|t| t.name() == name)
        .ok_or_else(|| GraphError::UnknownTask(name.clone())),
    }
  }

  pub fn tasks(&self) -> &[Task] {
    &self.tasks
  }

  pub fn get(&self, index: usize) -> Option<&Task> {
    self.tasks.get(index)
  }

  pub fn get_by_name(&self, name: &str) -> Option<&Task> {
    self.tasks.iter().find(|t| t.name() == name)
  }

  pub fn len(&self) -> usize {
    self.tasks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tasks.is_empty()
  }

  /// The canonical parent-index to child-indices adjacency.
  pub fn links(&self) -> &BTreeMap<usize, Vec<usize>> {
    &self.links
  }

  /// Name-keyed rendering of the adjacency, for human-facing use.
  pub fn task_links(&self) -> BTreeMap<&str, Vec<&str>> {
    self
      .links
      .iter()
      .map(|(&p, children)| {
        (
          self.tasks[p].name(),
          children.iter().map(|&c| self.tasks[c].name()).collect(),
        )
      })
      .collect()
  }

  /// Tasks with no parents.
  pub fn roots(&self) -> Vec<&Task> {
    self
      .tasks
      .iter()
      .filter(|t| t.parents().is_empty())
      .collect()
  }

  /// Parent tasks of the task at `index`, in task-list order.
  pub fn parents_of(&self, index: usize) -> Vec<&Task> {
    self
      .links
      .iter()
      .filter(|(_, children)| children.contains(&index))
      .map(|(&p, _)| &self.tasks[p])
      .collect()
  }
}

/// Three-color DFS over the index-keyed adjacency.
fn has_cycle(links: &BTreeMap<usize, Vec<usize>>, len: usize) -> bool {
  // 0 = unvisited, 1 = in progress, 2 = done
  fn dfs(node: usize, links: &BTreeMap<usize, Vec<usize>>, color: &mut [u8]) -> bool {
    color[node] = 1;
    if let Some(children) = links.get(&node) {
      for &child in children {
        if color[child] == 1 {
          return true; // back edge
        }
        if color[child] == 0 && dfs(child, links, color) {
          return true;
        }
      }
    }
    color[node] = 2;
    false
  }

  let mut color = vec![0u8; len];
  (0..len).any(|node| color[node] == 0 && dfs(node, links, &mut color))
}
