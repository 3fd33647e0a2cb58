/// Single-flight keyed lock (SPEC_FULL.md §4.8 step 1, C8).
///
/// One in-flight hub operation per alias. A caller that passes no wait gets
/// an immediate `Conflict` if the key is already held; a caller that passes
/// a wait duration polls until the key frees up or the wait elapses, then
/// gets the same `Conflict`.
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use crate::errors::{WarchestError, WarchestResult};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Default)]
pub struct SingleFlightLock {
    held: Mutex<HashSet<String>>,
}

/// RAII guard releasing the key's slot on drop.
pub struct LockGuard<'a> {
    lock: &'a SingleFlightLock,
    key: String,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.held.lock().expect("single-flight lock poisoned").remove(&self.key);
    }
}

impl SingleFlightLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, key: &str) -> WarchestResult<LockGuard<'_>> {
        let mut held = self.held.lock().expect("single-flight lock poisoned");
        if !held.insert(key.to_string()) {
            return Err(WarchestError::conflict(format!(
                "an operation for {key} is already in flight"
            )));
        }
        Ok(LockGuard {
            lock: self,
            key: key.to_string(),
        })
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.held.lock().expect("single-flight lock poisoned").contains(key)
    }

    /// Waits up to `wait` for `key` to free up; `None` behaves exactly like
    /// `try_acquire` (§4.8 step 1: "waits up to its timeoutMs, or is rejected
    /// with Busy if no wait is configured").
    pub async fn acquire(&self, key: &str, wait: Option<Duration>) -> WarchestResult<LockGuard<'_>> {
        let Some(wait) = wait else {
            return self.try_acquire(key);
        };

        let deadline = tokio::time::Instant::now() + wait;
        loop {
            match self.try_acquire(key) {
                Ok(guard) => return Ok(guard),
                Err(err) => {
                    let now = tokio::time::Instant::now();
                    if now >= deadline {
                        return Err(err);
                    }
                    tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn second_acquire_for_same_key_is_a_conflict() {
        let lock = SingleFlightLock::new();
        let _guard = lock.try_acquire("alpha").unwrap();
        let err = lock.try_acquire("alpha").unwrap_err();
        assert_eq!(err.code(), "ECONFLICT");
    }

    #[test]
    fn different_keys_do_not_contend() {
        let lock = SingleFlightLock::new();
        let _g1 = lock.try_acquire("alpha").unwrap();
        let _g2 = lock.try_acquire("beta").unwrap();
    }

    #[test]
    fn dropping_guard_releases_the_key() {
        let lock = SingleFlightLock::new();
        {
            let _guard = lock.try_acquire("alpha").unwrap();
            assert!(lock.is_held("alpha"));
        }
        assert!(!lock.is_held("alpha"));
        let _guard = lock.try_acquire("alpha").unwrap();
    }

    #[tokio::test]
    async fn acquire_with_no_wait_matches_try_acquire() {
        let lock = SingleFlightLock::new();
        let _guard = lock.try_acquire("alpha").unwrap();
        let err = lock.acquire("alpha", None).await.unwrap_err();
        assert_eq!(err.code(), "ECONFLICT");
    }

    #[tokio::test]
    async fn acquire_waits_for_release_within_the_deadline() {
        let lock = Arc::new(SingleFlightLock::new());
        let guard = lock.try_acquire("alpha").unwrap();

        let waiter_lock = Arc::clone(&lock);
        let waiter = tokio::spawn(async move {
            waiter_lock
                .acquire("alpha", Some(Duration::from_millis(500)))
                .await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(guard);

        let result = waiter.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn acquire_times_out_if_never_released() {
        let lock = SingleFlightLock::new();
        let _guard = lock.try_acquire("alpha").unwrap();
        let err = lock
            .acquire("alpha", Some(Duration::from_millis(60)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ECONFLICT");
    }
}
