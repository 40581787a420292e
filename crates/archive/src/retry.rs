use std::thread;
use std::time::Duration;

/// How often, and how patiently, a document is handed to its parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of parse attempts, including the first. Zero is treated as
    /// one.
    pub max_attempts: u32,
    /// Wait between a failed attempt and the next one.
    pub backoff: Duration,
}
impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(5),
        }
    }
}

/// Position in the bounded sequence of parse attempts for one document.
///
/// ```
/// use archivist_archive::{Attempt, RetryPolicy};
/// let first = Attempt::first(&RetryPolicy::default());
/// let third = first.next().and_then(Attempt::next).unwrap();
/// assert!(third.is_final());
/// assert_eq!(third.next(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    number: u32,
    of: u32,
}
impl Attempt {
    pub fn first(policy: &RetryPolicy) -> Self {
        Self {
            number: 1,
            of: policy.max_attempts.max(1),
        }
    }

    /// One-based attempt number.
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn is_final(&self) -> bool {
        self.number >= self.of
    }

    /// The attempt after this one, unless this is the last.
    pub fn next(self) -> Option<Self> {
        match self.is_final() {
            true => None,
            false => Some(Self {
                number: self.number + 1,
                of: self.of,
            }),
        }
    }
}

/// Waits out the backoff between attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Blocks the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;
impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}
