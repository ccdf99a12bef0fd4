use async_trait::async_trait;

use crate::error::NotifyError;

/// Outbound channel receiving the human-readable run summary.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send(&self, message: &str) -> Result<(), NotifyError>;
}
