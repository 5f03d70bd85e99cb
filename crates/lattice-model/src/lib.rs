//! Lattice Model
//!
//! The task model and link resolver for lattice workflow graphs: unit tasks,
//! fan-out branches, and nested sub-graphs composed into a DAG whose
//! per-task parent references and graph-level adjacency are kept consistent
//! under incremental mutation.
//!
//! The model is purely in-memory and synchronous. Serialization to and from
//! the wire document format lives in `lattice-wire`.

mod builder;
mod error;
mod graph;
mod requirements;
mod task;
mod value;

pub use builder::GraphBuilder;
pub use error::GraphError;
pub use graph::{Graph, TaskRef};
pub use requirements::{ENGINE_TAG, Requirements};
pub use task::{BranchTask, Task, UnitTask};
pub use value::{
  ArgSource, FileRef, FuncRef, KwargSource, MapKey, OutputName, Placeholder, QueryExpr, Value,
};
