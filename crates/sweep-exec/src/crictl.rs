use std::{collections::HashSet, path::PathBuf, process::Stdio};

use async_trait::async_trait;
use sweep_core::{ImageRepository, InventoryError};
use sweep_model::{Image, ImageId};
use tokio::process::Command;
use tracing::{debug, trace};

use crate::{decode, error::ExecError};

/// Location of the `crictl` binary and the runtime socket it talks to.
#[derive(Debug, Clone)]
pub struct CrictlConfig {
    pub program: PathBuf,
    /// Passed as `--runtime-endpoint` when set.
    pub runtime_endpoint: Option<String>,
}

impl Default for CrictlConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("crictl"),
            runtime_endpoint: None,
        }
    }
}

/// [`ImageRepository`] that shells out to `crictl`.
///
/// Child processes are killed if the calling future is dropped, so an interrupted run
/// does not leave commands behind.
#[derive(Debug, Clone, Default)]
pub struct CrictlRepository {
    cfg: CrictlConfig,
}

impl CrictlRepository {
    pub fn new(cfg: CrictlConfig) -> Self {
        Self { cfg }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.cfg.program);
        if let Some(endpoint) = &self.cfg.runtime_endpoint {
            cmd.arg("--runtime-endpoint").arg(endpoint);
        }
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Run a crictl subcommand and return its stdout.
    async fn execute(&self, args: &[&str]) -> Result<Vec<u8>, ExecError> {
        let command_line = args.join(" ");
        trace!(target: "sweep.exec.crictl", command = %command_line, "spawn");

        let output = self
            .command(args)
            .output()
            .await
            .map_err(|e| ExecError::Spawn(format!("{}: {e}", self.cfg.program.display())))?;

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            let status = match output.status.code() {
                Some(code) => format!("exit code {code}"),
                None => "signal".to_string(),
            };
            debug!(target: "sweep.exec.crictl", command = %command_line, %status, "exit non-zero");
            return Err(ExecError::NonZeroExit {
                command: command_line,
                status,
                output: combined.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl ImageRepository for CrictlRepository {
    async fn list_images(&self) -> Result<Vec<Image>, InventoryError> {
        let raw = self.execute(&["images", "--output=json"]).await?;
        let images = decode::images(&raw).map_err(|e| ExecError::Decode {
            command: "images".into(),
            reason: e.to_string(),
        })?;

        debug!(count = images.len(), "retrieved all images");
        Ok(images)
    }

    async fn list_in_use(&self) -> Result<HashSet<ImageId>, InventoryError> {
        let raw = self.execute(&["ps", "-a", "--output=json"]).await?;
        let used = decode::images_in_use(&raw).map_err(|e| ExecError::Decode {
            command: "ps".into(),
            reason: e.to_string(),
        })?;

        debug!(count = used.len(), "retrieved used images");
        Ok(used)
    }

    async fn remove_image(&self, id: &str) -> Result<(), InventoryError> {
        match self.execute(&["rmi", id]).await {
            Ok(_) => {
                debug!(id, "removed image");
                Ok(())
            }
            Err(ExecError::NonZeroExit { output, .. }) if is_not_found(&output) => {
                Err(InventoryError::NotFound(id.to_string()))
            }
            Err(ExecError::NonZeroExit { output, .. }) if is_in_use(&output) => {
                Err(InventoryError::InUse(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn is_not_found(output: &str) -> bool {
    let lower = output.to_ascii_lowercase();
    lower.contains("not found") || lower.contains("no such image")
}

fn is_in_use(output: &str) -> bool {
    let lower = output.to_ascii_lowercase();
    lower.contains("in use") || lower.contains("being used")
}
