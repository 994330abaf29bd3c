//! Bounded retry with a fixed delay between attempts.
//!
//! Kept apart from progress rendering: the loop only reports each failed
//! attempt through a callback, and the caller decides what to show.

use std::time::Duration;

/// Attempt budget and inter-attempt delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Treated as at least 1.
    pub attempts: u32,
    /// Pause before each retry (not after the last attempt)
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// No pause between attempts
    pub fn immediate(attempts: u32) -> Self {
        Self::new(attempts, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.attempts.max(1)
    }
}

/// Final outcome plus the number of attempts it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T, E> {
    pub outcome: Result<T, E>,
    pub attempts: u32,
}

/// Run `attempt` until it succeeds or the budget is spent.
///
/// `attempt` receives the 1-based attempt number. `on_failure` is called with
/// the attempt number and its error after every failed attempt, including
/// the last one.
pub fn retry<T, E, A, F>(policy: &RetryPolicy, mut attempt: A, mut on_failure: F) -> Retried<T, E>
where
    A: FnMut(u32) -> Result<T, E>,
    F: FnMut(u32, &E),
{
    let max = policy.max_attempts();
    let mut n = 1;
    loop {
        match attempt(n) {
            Ok(value) => {
                return Retried {
                    outcome: Ok(value),
                    attempts: n,
                };
            }
            Err(e) => {
                on_failure(n, &e);
                if n >= max {
                    return Retried {
                        outcome: Err(e),
                        attempts: n,
                    };
                }
            }
        }
        if !policy.delay.is_zero() {
            std::thread::sleep(policy.delay);
        }
        n += 1;
    }
}
