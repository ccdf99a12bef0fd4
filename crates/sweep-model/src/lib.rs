//! Data types shared by the sweep crates.
//!
//! Everything here is plain data: images reported by the container runtime,
//! the outcome of one cleanup run and the record persisted for it.
mod domain;
pub use domain::*;
