use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Shared cancellation flag.
///
/// Cloning hands out another handle to the same flag, so the Ctrl-C handler
/// and every running subprocess observe one signal.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// How backend subprocesses are run.
///
/// `timeout` is `None` unless configured; a timeout is reported the same
/// way as a native failure.
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    pub cancel: CancelToken,
    pub timeout: Option<Duration>,
}

impl ExecContext {
    pub fn new(cancel: CancelToken, timeout: Option<Duration>) -> Self {
        Self { cancel, timeout }
    }
}
