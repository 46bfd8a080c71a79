//! Round deadline timer
//!
//! Every opened round gets a fresh [`RoundToken`]. A timer carries the token
//! of the round it was armed for; the session ignores a firing whose token
//! no longer matches, so a round is resolved at most once no matter whether
//! the timer or a manual advance gets there first.

use std::time::Duration;
use tokio::task::AbortHandle;

/// Identifies one opened round within a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoundToken(u64);

impl RoundToken {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

#[derive(Debug)]
pub struct RoundTimer {
    handle: AbortHandle,
}

impl RoundTimer {
    /// Call `on_fire` with `token` once `duration` has passed
    pub fn arm<F>(token: RoundToken, duration: Duration, on_fire: F) -> Self
    where
        F: FnOnce(RoundToken) + Send + 'static,
    {
        let task = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            tracing::debug!("Round timer fired for {:?}", token);
            on_fire(token);
        });

        Self {
            handle: task.abort_handle(),
        }
    }

    /// Stop the timer. Returns true if it had already fired.
    pub fn cancel(self) -> bool {
        let fired = self.handle.is_finished();
        self.handle.abort();
        fired
    }
}
