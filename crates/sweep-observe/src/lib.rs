//! Process-wide `tracing` subscriber setup for the cleanup agent.
mod logger;
pub use logger::*;
