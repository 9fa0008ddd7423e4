// ============================
// ems-backend-lib/src/auth/guard.rs
// ============================
//! Credential verification and account lockout.
//!
//! One call to [`LoginGuard::attempt_login`] evaluates one login attempt:
//!
//! 1. load the account (unknown → `InvalidCredential` after checking the
//!    secret against a decoy hash, nothing written)
//! 2. treat an expired lock as already reset
//! 3. refuse a locked account without looking at the secret
//! 4. verify the secret
//! 5. count the failure, locking on the one that reaches the threshold
//! 6. or clear the counters and issue a session
//!
//! Steps 2, 5 and 6 are persisted as a single compare-and-update of the
//! counters read in step 1. If another attempt changed them in between, the
//! whole evaluation starts again from a fresh read.
use super::password::{hash_password, verify_password};
use super::session::{IssuedSession, SessionError, SessionIssuer};
use crate::clock::{checked_after, Clock};
use crate::metrics::{LOGIN_ACCEPTED, LOGIN_CAS_RETRY, LOGIN_REJECTED, LOGIN_STORAGE_ERROR};
use crate::storage::{AccountStore, LockCounters, StoreError};
use chrono::{DateTime, Utc};
use ems_common::Role;
use metrics::counter;
use secrecy::{ExposeSecret, SecretString};
use std::{
    sync::{Arc, LazyLock},
    time::Duration,
};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

/// Default number of consecutive failures that locks an account
pub const DEFAULT_LOCK_THRESHOLD: u32 = 3;

/// Default lock duration (1 minute)
pub const DEFAULT_LOCK_DURATION: Duration = Duration::from_secs(60);

/// Hash checked when the identifier is unknown, so a miss costs as much as
/// a wrong password. Built once at the default cost.
static DECOY_HASH: LazyLock<Arc<str>> = LazyLock::new(|| {
    match hash_password("decoy-secret-never-matches") {
        Ok(hash) => Arc::from(hash),
        Err(e) => {
            error!("could not build decoy hash: {e}");
            Arc::from("")
        },
    }
});

/// Checks a supplied secret against a stored hash
pub type Verifier = fn(&str, &str) -> bool;

/// How many failures lock an account, and for how long
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub threshold: u32,
    pub duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_THRESHOLD, DEFAULT_LOCK_DURATION)
    }
}

impl LockoutPolicy {
    /// A threshold of zero would lock every account forever; it is raised to 1.
    pub fn new(threshold: u32, duration: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            duration,
        }
    }

    /// Remaining lock time, if the counters describe an active lock
    pub fn remaining_lock(&self, counters: &LockCounters, now: DateTime<Utc>) -> Option<Duration> {
        match counters.lock_until {
            Some(until) if counters.failed_attempts >= self.threshold && until > now => {
                Some((until - now).to_std().unwrap_or_default())
            },
            _ => None,
        }
    }

    /// The counters describe a lock whose window has passed
    pub fn lock_expired(&self, counters: &LockCounters, now: DateTime<Utc>) -> bool {
        counters.failed_attempts >= self.threshold
            && counters.lock_until.is_some_and(|until| until <= now)
    }

    /// Counters and verdict after one more failed attempt
    fn after_failure(
        &self,
        counters: &LockCounters,
        now: DateTime<Utc>,
    ) -> Result<(LockCounters, Rejection), GuardError> {
        let failed_attempts = counters.failed_attempts.saturating_add(1).min(self.threshold);
        if failed_attempts >= self.threshold {
            let lock_until = checked_after(now, self.duration)
                .ok_or(GuardError::LockWindowOutOfRange(self.duration))?;
            let next = LockCounters {
                failed_attempts,
                lock_until: Some(lock_until),
            };
            Ok((next, Rejection::TooManyAttempts { retry_after: self.duration }))
        } else {
            let next = LockCounters {
                failed_attempts,
                lock_until: None,
            };
            Ok((next, Rejection::InvalidCredential))
        }
    }
}

/// Why an attempt was turned away. These are ordinary outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Unknown identifier or wrong secret; deliberately indistinguishable
    InvalidCredential,
    /// The account was already locked when the attempt arrived
    AccountLocked { retry_after: Duration },
    /// This attempt is the one that locked the account
    TooManyAttempts { retry_after: Duration },
}

impl Rejection {
    /// Label used in logs and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::InvalidCredential => "invalid_credential",
            Rejection::AccountLocked { .. } => "account_locked",
            Rejection::TooManyAttempts { .. } => "too_many_attempts",
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Rejection::InvalidCredential => None,
            Rejection::AccountLocked { retry_after }
            | Rejection::TooManyAttempts { retry_after } => Some(*retry_after),
        }
    }
}

/// Result of one login attempt
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Accepted { role: Role, session: IssuedSession },
    Rejected(Rejection),
}

/// Infrastructure failures while evaluating an attempt
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("account store unavailable: {0}")]
    StorageUnavailable(#[from] StoreError),

    #[error("session issuance failed: {0}")]
    Session(#[from] SessionError),

    #[error("lock duration {0:?} does not fit a timestamp")]
    LockWindowOutOfRange(Duration),

    #[error("password verification did not complete: {0}")]
    Verification(String),
}

/// Published after a successful login has been persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginEvent {
    pub identifier: String,
    pub role: Role,
    pub at: DateTime<Utc>,
}

/// Credential verification and lockout guard
pub struct LoginGuard {
    store: Arc<dyn AccountStore>,
    sessions: Arc<dyn SessionIssuer>,
    clock: Arc<dyn Clock>,
    policy: LockoutPolicy,
    events: Option<broadcast::Sender<LoginEvent>>,
    decoy_hash: Option<Arc<str>>,
    verify: Verifier,
}

impl LoginGuard {
    pub fn new(
        store: Arc<dyn AccountStore>,
        sessions: Arc<dyn SessionIssuer>,
        clock: Arc<dyn Clock>,
        policy: LockoutPolicy,
    ) -> Self {
        Self {
            store,
            sessions,
            clock,
            policy,
            events: None,
            decoy_hash: None,
            verify: verify_password,
        }
    }

    /// Publish a [`LoginEvent`] for every accepted attempt
    pub fn with_events(mut self, events: broadcast::Sender<LoginEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Hash checked for unknown identifiers. Should cost the same as the
    /// stored hashes; the default uses the recommended scrypt parameters.
    pub fn with_decoy_hash(mut self, hash: impl Into<Arc<str>>) -> Self {
        self.decoy_hash = Some(hash.into());
        self
    }

    /// Replace the secret check (defaults to [`verify_password`])
    pub fn with_verifier(mut self, verify: Verifier) -> Self {
        self.verify = verify;
        self
    }

    pub fn policy(&self) -> LockoutPolicy {
        self.policy
    }

    /// Evaluate one login attempt. The supplied secret is never logged.
    #[instrument(skip_all, fields(identifier = %identifier))]
    pub async fn attempt_login(
        &self,
        identifier: &str,
        supplied_secret: &SecretString,
    ) -> Result<LoginOutcome, GuardError> {
        let result = self.evaluate(identifier, supplied_secret).await;
        match &result {
            Ok(LoginOutcome::Accepted { .. }) => counter!(LOGIN_ACCEPTED).increment(1),
            Ok(LoginOutcome::Rejected(rejection)) => {
                counter!(LOGIN_REJECTED, "reason" => rejection.reason()).increment(1);
            },
            Err(GuardError::StorageUnavailable(e)) => {
                counter!(LOGIN_STORAGE_ERROR).increment(1);
                error!("account store failed during login: {e}");
            },
            Err(GuardError::Session(e)) => error!("could not issue session: {e}"),
            Err(e) => error!("login evaluation failed: {e}"),
        }
        result
    }

    /// Run the secret check on the blocking pool; scrypt takes long enough
    /// to stall a runtime worker.
    async fn check_secret(
        &self,
        hash: Arc<str>,
        supplied_secret: &SecretString,
    ) -> Result<bool, GuardError> {
        let verify = self.verify;
        let supplied = SecretString::from(supplied_secret.expose_secret().to_string());
        tokio::task::spawn_blocking(move || verify(&hash, supplied.expose_secret()))
            .await
            .map_err(|e| GuardError::Verification(e.to_string()))
    }

    async fn evaluate(
        &self,
        identifier: &str,
        supplied_secret: &SecretString,
    ) -> Result<LoginOutcome, GuardError> {
        // Verdict and the hash it was computed against, reused across re-reads
        let mut verdict: Option<(String, bool)> = None;

        loop {
            let Some(record) = self.store.load(identifier).await? else {
                debug!("unknown identifier");
                let decoy = match &self.decoy_hash {
                    Some(hash) => hash.clone(),
                    None => DECOY_HASH.clone(),
                };
                self.check_secret(decoy, supplied_secret).await?;
                return Ok(LoginOutcome::Rejected(Rejection::InvalidCredential));
            };

            let now = self.clock.now();
            let observed = record.counters();

            let working = if self.policy.lock_expired(&observed, now) {
                debug!("lock window has passed, counters reset");
                LockCounters::default()
            } else {
                observed.clone()
            };

            if let Some(retry_after) = self.policy.remaining_lock(&working, now) {
                debug!(retry_after_secs = retry_after.as_secs(), "account is locked");
                return Ok(LoginOutcome::Rejected(Rejection::AccountLocked { retry_after }));
            }

            let verified = match &verdict {
                Some((hash, ok)) if *hash == record.secret_hash => *ok,
                _ => {
                    let ok = self
                        .check_secret(Arc::from(record.secret_hash.as_str()), supplied_secret)
                        .await?;
                    verdict = Some((record.secret_hash.clone(), ok));
                    ok
                },
            };

            let (next, rejection) = if verified {
                (LockCounters::default(), None)
            } else {
                let (next, rejection) = self.policy.after_failure(&working, now)?;
                (next, Some(rejection))
            };

            if next != observed
                && !self
                    .store
                    .compare_and_update_counters(identifier, &observed, &next)
                    .await?
            {
                counter!(LOGIN_CAS_RETRY).increment(1);
                debug!("counters changed by a concurrent attempt, re-evaluating");
                continue;
            }

            if let Some(rejection) = rejection {
                match rejection {
                    Rejection::TooManyAttempts { retry_after } => warn!(
                        failed_attempts = next.failed_attempts,
                        lock_secs = retry_after.as_secs(),
                        "account locked after repeated failures"
                    ),
                    _ => debug!(failed_attempts = next.failed_attempts, "wrong secret"),
                }
                return Ok(LoginOutcome::Rejected(rejection));
            }

            let session = self.sessions.issue(identifier, record.role)?;
            if let Some(events) = &self.events {
                // No subscribers is fine
                let _ = events.send(LoginEvent {
                    identifier: identifier.to_string(),
                    role: record.role,
                    at: now,
                });
            }
            info!(role = %record.role, "login accepted");
            return Ok(LoginOutcome::Accepted {
                role: record.role,
                session,
            });
        }
    }
}

/// Human-readable remaining wait, e.g. "1 minute" or "1 minute 5 seconds".
/// Partial seconds round up.
pub fn describe_wait(wait: Duration) -> String {
    let secs = wait_secs(wait);
    let (minutes, seconds) = (secs / 60, secs % 60);

    let plural = |n: u64, unit: &str| {
        if n == 1 {
            format!("1 {unit}")
        } else {
            format!("{n} {unit}s")
        }
    };

    match (minutes, seconds) {
        (0, s) => plural(s, "second"),
        (m, 0) => plural(m, "minute"),
        (m, s) => format!("{} {}", plural(m, "minute"), plural(s, "second")),
    }
}

/// Whole seconds to wait, rounded up, never zero
pub fn wait_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}
