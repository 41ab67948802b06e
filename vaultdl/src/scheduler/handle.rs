//! Cancellation handles for admitted jobs.

use tokio_util::sync::CancellationToken;

/// The scheduler's grip on an admitted job.
pub trait JobHandle: Send + Sync {
    /// Request termination. Idempotent.
    fn cancel(&self);

    fn is_cancelled(&self) -> bool;
}

/// Placeholder installed at admission, before any async work has run.
///
/// Shares its token with the job, so cancelling it also stops a process
/// spawned later.
#[derive(Debug, Clone)]
pub struct StartingHandle {
    token: CancellationToken,
}

impl StartingHandle {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }
}

impl JobHandle for StartingHandle {
    fn cancel(&self) {
        self.token.cancel();
    }

    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Handle bound to a spawned downloader process.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    token: CancellationToken,
    pid: Option<u32>,
}

impl ProcessHandle {
    pub fn new(token: CancellationToken, pid: Option<u32>) -> Self {
        Self { token, pid }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }
}

impl JobHandle for ProcessHandle {
    fn cancel(&self) {
        tracing::debug!(pid = ?self.pid, "Cancelling downloader process");
        self.token.cancel();
    }

    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
