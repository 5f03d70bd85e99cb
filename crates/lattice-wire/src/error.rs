use lattice_model::GraphError;
use thiserror::Error;

/// Errors raised while serializing a graph to, or rebuilding one from, its
/// wire document.
///
/// Resolution failures abort the whole serialization; a partial document is
/// never emitted.
#[derive(Debug, Error)]
pub enum WireError {
  #[error("branch task {0:?} has no registered task")]
  MissingBranchTask(String),

  #[error("placeholder {0:?} survived resolution")]
  UnresolvedPlaceholder(String),

  #[error("function reference survived resolution")]
  UnresolvedFunction,

  #[error("link key {0:?} is not a task index")]
  BadLinkKey(String),

  #[error("document {0:?} is not a dag document")]
  NotADag(String),

  #[error("malformed wire document: {0}")]
  BadDocument(#[from] serde_json::Error),

  #[error(transparent)]
  Graph(#[from] GraphError),
}
