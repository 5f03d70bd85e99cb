use thiserror::Error;

/// Structural errors raised while building or mutating a graph.
///
/// These indicate a bug in the caller, not a recoverable runtime condition;
/// they are raised immediately and must never be retried.
#[derive(Debug, Error)]
pub enum GraphError {
  #[error("unknown task reference: {0:?}")]
  UnknownTask(String),

  #[error("task index {index} out of bounds (graph has {len} tasks)")]
  IndexOutOfBounds { index: usize, len: usize },

  #[error("task {0:?} cannot be its own parent")]
  SelfParent(String),

  #[error("dependency cycle detected in graph {0:?}")]
  CycleDetected(String),

  #[error("branch task {0:?} already owns a task")]
  BranchOccupied(String),

  #[error("branch task {0:?} needs branch_data or branch_files")]
  MissingBranchSource(String),

  #[error("no owner scope is open")]
  NoOpenScope,

  #[error("{0} owner scope(s) still open")]
  ScopeStillOpen(usize),
}
