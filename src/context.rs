//! Cancellation and deadline context for conversions.
//!
//! A [`Context`] pairs a [`CancellationToken`] with an optional deadline. It is
//! threaded through every step of a conversion that can block, and each such
//! step is raced against [`Context::done`] with `tokio::select!`.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Done {
    Cancelled,
    DeadlineExceeded,
}

/// Caller-owned cancellation token plus optional deadline.
///
/// Cloning shares the same token and deadline.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never done unless [`cancel`](Self::cancel) is called.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Wraps an existing token, e.g. one cancelled from a signal handler.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derives a context that is cancelled with its parent and expires at the
    /// earlier of the two deadlines. Cancelling the child leaves the parent alone.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) if parent <= candidate => parent,
            _ => candidate,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Reports why the context is done, without waiting.
    pub fn err(&self) -> Option<Done> {
        if self.token.is_cancelled() {
            return Some(Done::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Done::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> Done {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => Done::Cancelled,
                _ = tokio::time::sleep_until(deadline) => Done::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                Done::Cancelled
            }
        }
    }

    /// Drives `fut` until it completes or the context is done, whichever is first.
    ///
    /// A context that is already done wins even if `fut` is immediately ready.
    /// On `Err`, `fut` has been dropped.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Done>
    where
        F: Future,
    {
        if let Some(done) = self.err() {
            return Err(done);
        }
        tokio::select! {
            biased;
            done = self.done() => Err(done),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn background_context_runs_future() {
        let ctx = Context::background();
        let out = ctx.run(async { 7 }).await;
        assert_eq!(out, Ok(7));
        assert!(!ctx.is_done());
    }

    #[tokio::test]
    async fn cancelled_context_wins_over_ready_future() {
        let ctx = Context::background();
        ctx.cancel();
        let out = ctx.run(async { 7 }).await;
        assert_eq!(out, Err(Done::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_deadline_reports_deadline_exceeded() {
        let ctx = Context::with_timeout(Duration::from_millis(1));
        tokio::time::advance(Duration::from_millis(5)).await;
        assert_eq!(ctx.err(), Some(Done::DeadlineExceeded));
        assert_eq!(ctx.run(async { 1 }).await, Err(Done::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_interrupts_pending_future() {
        let ctx = Context::with_timeout(Duration::from_secs(2));
        let out = ctx.run(futures::future::pending::<()>()).await;
        assert_eq!(out, Err(Done::DeadlineExceeded));
    }

    #[tokio::test]
    async fn cancel_from_another_task_unblocks_wait() {
        let ctx = Context::background();
        let remote = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            remote.cancel();
        });
        let out = ctx.run(futures::future::pending::<()>()).await;
        assert_eq!(out, Err(Done::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn child_keeps_earlier_parent_deadline() {
        let parent = Context::with_timeout(Duration::from_secs(1));
        let child = parent.child_with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());

        let shorter = parent.child_with_timeout(Duration::from_millis(10));
        assert!(shorter.deadline() < parent.deadline());
    }

    #[tokio::test]
    async fn child_follows_parent_cancellation_but_not_reverse() {
        let parent = Context::background();
        let child = parent.child_with_timeout(Duration::from_secs(60));
        child.cancel();
        assert!(!parent.is_done());

        let child = parent.child_with_timeout(Duration::from_secs(60));
        parent.cancel();
        assert_eq!(child.err(), Some(Done::Cancelled));
    }
}
