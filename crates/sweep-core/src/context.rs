use std::time::Duration;

use sweep_model::AbortCause;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// Cancellation scope of one cleanup run.
///
/// Carries an external cancellation token (process shutdown) and an optional deadline.
#[derive(Debug, Clone)]
pub struct RunContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RunContext {
    /// Child of `parent` that also expires after `timeout`.
    pub fn new(parent: &CancellationToken, timeout: Duration) -> Self {
        Self {
            token: parent.child_token(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Context without deadline that is only cancelled explicitly.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why the context is done, `None` while it is still live.
    pub fn cause(&self) -> Option<AbortCause> {
        if self.token.is_cancelled() {
            return Some(AbortCause::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(AbortCause::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.cause().is_some()
    }

    /// Resolves once the token is cancelled or the deadline passes.
    pub async fn done(&self) -> AbortCause {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => AbortCause::Cancelled,
                _ = sleep_until(deadline) => AbortCause::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                AbortCause::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn deadline_expires() {
        let ctx = RunContext::new(&CancellationToken::new(), Duration::from_secs(5));
        assert!(!ctx.is_done());

        assert_eq!(ctx.done().await, AbortCause::DeadlineExceeded);
        assert_eq!(ctx.cause(), Some(AbortCause::DeadlineExceeded));
    }

    #[tokio::test]
    async fn parent_cancellation_propagates() {
        let parent = CancellationToken::new();
        let ctx = RunContext::new(&parent, Duration::from_secs(60));

        parent.cancel();
        assert_eq!(ctx.done().await, AbortCause::Cancelled);
        assert!(ctx.is_done());
    }

    #[tokio::test]
    async fn cancelling_child_leaves_parent_alive() {
        let parent = CancellationToken::new();
        let ctx = RunContext::new(&parent, Duration::from_secs(60));

        ctx.cancel();
        assert_eq!(ctx.cause(), Some(AbortCause::Cancelled));
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn background_never_expires_on_its_own() {
        let ctx = RunContext::background();
        assert!(ctx.deadline().is_none());
        assert!(!ctx.is_done());
    }
}
