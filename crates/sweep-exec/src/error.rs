use sweep_core::InventoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("`{command}` exited with {status}: {output}")]
    NonZeroExit {
        command: String,
        status: String,
        output: String,
    },
    #[error("invalid json from `{command}`: {reason}")]
    Decode { command: String, reason: String },
}

impl From<ExecError> for InventoryError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::Decode { .. } => InventoryError::Decode(e.to_string()),
            other => InventoryError::Command(other.to_string()),
        }
    }
}
