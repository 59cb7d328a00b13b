use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::LocusError;

/// Shared flag that aborts an in-flight request between network calls.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub timeout: Option<Duration>,
    pub cancel: CancelToken,
}

/// Checked before every adapter step and every page of a paginated fetch.
#[derive(Debug, Clone)]
pub struct Deadline {
    started: Instant,
    timeout: Option<Duration>,
    cancel: CancelToken,
}

impl Deadline {
    pub fn new(options: &FetchOptions) -> Self {
        Self {
            started: Instant::now(),
            timeout: options.timeout,
            cancel: options.cancel.clone(),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(&FetchOptions::default())
    }

    pub fn check(&self) -> Result<(), LocusError> {
        if self.cancel.is_cancelled() {
            return Err(LocusError::Cancelled);
        }
        if let Some(timeout) = self.timeout {
            if self.started.elapsed() >= timeout {
                return Err(LocusError::TimedOut(timeout.as_millis()));
            }
        }
        Ok(())
    }
}
