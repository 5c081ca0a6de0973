//! Tensor dataflow graph for the tessel scheduler.
//!
//! The front-end hands the scheduler a fully elaborated graph of tensor
//! nodes: placeholders for external inputs and compute nodes carrying a
//! producer tag plus an attribute bag. This crate owns that graph and the
//! breadth-first crawler the stage classifier is built on.
//!
//! # Module Organization
//!
//! - [`tensor`] - Tensor node, tag vocabulary, identity-keyed wrapper
//! - [`attrs`] - Typed per-tensor attribute bag
//! - [`crawl`] - Breadth-first stage traversal
//! - [`error`] - Error types and result handling

pub mod attrs;
pub mod crawl;
pub mod error;
pub mod tensor;

#[cfg(test)]
pub mod test;

pub use attrs::{AttrValue, Attrs};
pub use crawl::crawl;
pub use error::{Error, Result};
pub use tensor::{Tensor, TensorKey, names, tags};
