//! Container runtime inventory backed by the `crictl` CLI.
mod error;
pub use error::ExecError;

mod decode;

mod crictl;
pub use crictl::{CrictlConfig, CrictlRepository};
