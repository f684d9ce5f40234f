use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cancels a token once a timeout elapses, unless dropped first.
///
/// Dropping the guard stops the timer, so a call that finishes (or fails)
/// early never leaves a sleeping task behind.
pub(crate) struct Deadline {
    timer: JoinHandle<()>,
}

impl Deadline {
    pub(crate) fn arm(token: CancellationToken, timeout: Duration) -> Self {
        let timer = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => token.cancel(),
                _ = token.cancelled() => {}
            }
        });
        Self { timer }
    }

    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.timer.is_finished()
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.timer.abort();
    }
}
