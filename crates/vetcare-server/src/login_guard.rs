//! Per-email lockout after repeated failed logins.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone)]
struct Attempts {
    failures: u32,
    last_failure: Instant,
    locked_until: Option<Instant>,
}

/// Longest lockout a guard will apply.
pub const MAX_LOCKOUT: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Clone)]
pub struct LoginGuard {
    attempts: Arc<Mutex<HashMap<String, Attempts>>>,
    max_failures: u32,
    lockout: Duration,
}

impl LoginGuard {
    pub fn new(max_failures: u32, lockout: Duration) -> Self {
        Self {
            attempts: Arc::new(Mutex::new(HashMap::new())),
            max_failures: max_failures.max(1),
            lockout: lockout.min(MAX_LOCKOUT),
        }
    }

    /// `Err(remaining)` while `email` is locked out.
    pub async fn check(&self, email: &str) -> Result<(), Duration> {
        let mut attempts = self.attempts.lock().await;
        let now = Instant::now();

        match attempts.get(email).and_then(|a| a.locked_until) {
            Some(until) if until > now => Err(until - now),
            Some(_) => {
                // Lock expired: start counting afresh.
                attempts.remove(email);
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Count a failed attempt. Returns the lockout duration if this failure
    /// triggered one.
    pub async fn record_failure(&self, email: &str) -> Option<Duration> {
        let mut attempts = self.attempts.lock().await;
        let now = Instant::now();

        let entry = attempts.entry(email.to_string()).or_insert(Attempts {
            failures: 0,
            last_failure: now,
            locked_until: None,
        });
        entry.failures += 1;
        entry.last_failure = now;

        if entry.failures >= self.max_failures && entry.locked_until.is_none() {
            entry.locked_until = now.checked_add(self.lockout);
            warn!(failures = entry.failures, "login locked out after repeated failures");
            return Some(self.lockout);
        }
        None
    }

    pub async fn record_success(&self, email: &str) {
        self.attempts.lock().await.remove(email);
    }

    /// Drop entries that are neither locked nor recently failed.
    pub async fn purge_stale(&self) {
        let mut attempts = self.attempts.lock().await;
        let now = Instant::now();
        let lockout = self.lockout;
        attempts.retain(|_, a| match a.locked_until {
            Some(until) => until > now,
            None => now.duration_since(a.last_failure) < lockout,
        });
    }
}
