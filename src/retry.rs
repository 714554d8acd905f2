use std::time::Duration;

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    pause: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, pause: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            pause,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn pause(&self) -> Duration {
        self.pause
    }

    /// Runs `op` until it returns `Ok` or attempts are exhausted, returning the
    /// last error. `op` receives the 1-based attempt number.
    pub fn run<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
    {
        self.run_if(op, |_| true)
    }

    /// Like [`RetryPolicy::run`], but an error for which `retryable` is false
    /// is returned immediately.
    pub fn run_if<T, E, F, P>(&self, mut op: F, retryable: P) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.max_attempts || !retryable(&e) => return Err(e),
                Err(_) => {
                    attempt += 1;
                    if !self.pause.is_zero() {
                        std::thread::sleep(self.pause);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stops_on_first_success() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let mut calls = 0;
        let result: Result<u32, ()> = policy.run(|attempt| {
            calls += 1;
            Ok(attempt)
        });
        assert_eq!(result, Ok(1));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let mut calls = 0;
        let result: Result<(), u32> = policy.run(|attempt| {
            calls += 1;
            Err(attempt)
        });
        assert_eq!(result, Err(3));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_fatal_error_is_not_retried() {
        let policy = RetryPolicy::new(5, Duration::ZERO);
        let mut calls = 0;
        let result: Result<(), &str> = policy.run_if(
            |_| {
                calls += 1;
                Err("fatal")
            },
            |e| *e != "fatal",
        );
        assert_eq!(result, Err("fatal"));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_zero_attempts_still_runs_once() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.max_attempts(), 1);
    }
}
