use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::KVError;

/// Context carries cancellation and an optional deadline into every Store
/// call.
///
/// Clones share the same [`CancellationToken`]. Derived contexts
/// (`with_timeout`, `with_deadline`, `child`) hold a child token, so they
/// observe their parent's cancellation while cancelling them leaves the
/// parent untouched.
///
/// Backends call [`Context::check`] before starting work and again right
/// before committing, so a cancelled call never leaves a partial write.
#[derive(Clone, Debug)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::from_token(CancellationToken::new())
    }

    /// Wrap a token owned elsewhere, e.g. one a server cancels on shutdown.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derive a context with its own cancellation.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derive a context that expires `timeout` from now (or earlier, if the
    /// parent's deadline comes first).
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let mut ctx = self.child();
        ctx.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        ctx
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The underlying token, for callers that want to await cancellation.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Returns `Cancelled` or `DeadlineExceeded` if the call must stop.
    pub fn check(&self) -> Result<(), KVError> {
        if self.is_cancelled() {
            return Err(KVError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(KVError::DeadlineExceeded);
            }
        }
        Ok(())
    }
}
