use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::Cancelled;

/// Cancellation handle carried alongside a request.
///
/// A context fires either when it is cancelled explicitly or when its
/// deadline passes. Retries stop once it has fired; a send that is already
/// in flight is left to finish.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context that never fires unless [`cancel`](Self::cancel) is called.
    pub fn background() -> Self {
        Self::default()
    }

    /// Wraps an existing cancellation token.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Sets an absolute deadline, keeping any earlier one.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Sets a deadline `timeout` from now.
    ///
    /// A timeout too large to represent as an instant leaves the context
    /// without a new deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Deadline after which the context reports [`Cancelled::DeadlineExceeded`].
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancels this context and every clone of it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns why the context fired, or `None` while it is still live.
    pub fn err(&self) -> Option<Cancelled> {
        if self.token.is_cancelled() {
            return Some(Cancelled::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Cancelled::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context fires.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::RequestContext;
    use crate::error::Cancelled;

    #[test]
    fn background_context_is_live() {
        assert_eq!(RequestContext::background().err(), None);
    }

    #[test]
    fn cancel_propagates_to_clones() {
        let ctx = RequestContext::background();
        let clone = ctx.clone();
        ctx.cancel();
        assert_eq!(clone.err(), Some(Cancelled::Canceled));
    }

    #[tokio::test]
    async fn elapsed_deadline_reports_deadline_exceeded() {
        let ctx = RequestContext::background().with_timeout(Duration::from_millis(5));
        ctx.done().await;
        assert_eq!(ctx.err(), Some(Cancelled::DeadlineExceeded));
    }

    #[test]
    fn earlier_deadline_wins() {
        let ctx = RequestContext::background()
            .with_timeout(Duration::from_secs(1))
            .with_timeout(Duration::from_secs(60));
        let remaining = ctx.deadline().unwrap() - tokio::time::Instant::now();
        assert!(remaining <= Duration::from_secs(1));
    }

    #[test]
    fn unrepresentable_timeout_leaves_deadline_unset() {
        let ctx = RequestContext::background().with_timeout(Duration::MAX);
        assert_eq!(ctx.deadline(), None);
        assert_eq!(ctx.err(), None);
    }

    #[test]
    fn unrepresentable_timeout_keeps_existing_deadline() {
        let ctx = RequestContext::background()
            .with_timeout(Duration::from_secs(1))
            .with_timeout(Duration::MAX);
        assert!(ctx.deadline().is_some());
    }
}
