//! Lattice Wire
//!
//! Serialization between in-memory lattice graphs and the wire document
//! format consumed by the remote execution backend: plain nested maps,
//! sequences, and scalars, with every deferred value (placeholders, callable
//! references, deferred map keys) resolved to a concrete wire value.
//!
//! Key guarantees:
//! - resolution runs over the fully assembled tree, never per-node, and a
//!   failure aborts the whole serialization (no partial documents);
//! - reconstruction rebuilds the adjacency through the model's own refresh,
//!   so `from_document(to_document(g))` preserves the dependency relation
//!   without parents ever crossing the wire.

mod decode;
mod document;
mod encode;
mod error;
mod render;

pub use decode::{from_document, from_value, task_from_doc};
pub use document::{BranchDoc, GraphDoc, TaskDoc, UnitDoc};
pub use encode::{task_to_value, to_document};
pub use error::WireError;
