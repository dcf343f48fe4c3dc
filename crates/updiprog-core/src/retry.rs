//! Bounded polling

use std::thread;
use std::time::Duration;

use crate::error::{ProtocolError, Result, WaitTarget};

/// Attempt budget for a polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retry {
    /// Maximum number of attempts (at least one attempt is always made)
    pub attempts: u32,
    /// Delay between attempts
    pub interval: Duration,
}

impl Retry {
    /// Create a new retry budget
    pub const fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    /// Run `f` until it yields a value or the budget runs out
    ///
    /// `f` receives the 0-based attempt index. Errors from `f` abort the
    /// loop immediately. Returns `Ok(None)` when every attempt came back
    /// empty.
    pub fn poll<T, F>(&self, mut f: F) -> Result<Option<T>>
    where
        F: FnMut(u32) -> Result<Option<T>>,
    {
        let attempts = self.attempts.max(1);
        for attempt in 0..attempts {
            if let Some(value) = f(attempt)? {
                return Ok(Some(value));
            }
            if attempt + 1 < attempts && !self.interval.is_zero() {
                thread::sleep(self.interval);
            }
        }
        Ok(None)
    }

    /// Like [`poll`](Self::poll), but running out of attempts is a timeout
    pub fn poll_until<T, F>(&self, target: WaitTarget, f: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<Option<T>>,
    {
        self.poll(f)?
            .ok_or_else(|| ProtocolError::Timeout(target).into())
    }
}
