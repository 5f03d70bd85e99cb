//! Lattice
//!
//! A task-graph definition and serialization engine: compose unit tasks,
//! dynamically fanned-out branches, and nested sub-graphs into a DAG, and
//! serialize the result into a wire document for a remote execution backend.
//!
//! This crate re-exports the member crates:
//! - [`lattice_model`] — task model, link resolver, scoped builder;
//! - [`lattice_wire`] — wire documents and (de)serialization.
//!
//! ```
//! use lattice::{FuncRef, GraphBuilder, TaskDoc, UnitTask, to_document};
//!
//! let mut b = GraphBuilder::new("demo");
//! b.task(UnitTask::named("fetch", FuncRef::name("pkg.fetch")))?;
//! b.task(UnitTask::named("process", FuncRef::name("pkg.process")).with_parent("fetch"))?;
//! let graph = b.finish()?;
//!
//! let TaskDoc::Dag(dag) = to_document(&graph)? else {
//!   unreachable!()
//! };
//! assert_eq!(dag.links["0"], vec![1]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use lattice_model::{
  ArgSource, BranchTask, ENGINE_TAG, FileRef, FuncRef, Graph, GraphBuilder, GraphError,
  KwargSource, MapKey, OutputName, Placeholder, QueryExpr, Requirements, Task, TaskRef, UnitTask,
  Value,
};
pub use lattice_wire::{
  BranchDoc, GraphDoc, TaskDoc, UnitDoc, WireError, from_document, from_value, task_from_doc,
  task_to_value, to_document,
};
