//! Retry - Generic polling helper for remote state transitions
//!
//! Providers use this to block until a remote resource reaches a target
//! status (e.g., a Route 53 change reaching INSYNC, an API Gateway domain
//! name leaving UPDATING). The caller supplies a refresh closure returning
//! the current object and its status string; the helper polls it with a
//! growing interval until a target status holds, the resource disappears,
//! or the timeout elapses.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::provider::ProviderError;

/// Outcome of one refresh: the object and its current status string,
/// or `None` when the remote resource does not exist.
pub type RefreshResult<T> = Result<Option<(T, String)>, ProviderError>;

/// Error from a wait loop
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("timeout waiting for target state (last state: {last_state})")]
    Timeout { last_state: String },

    #[error("resource not found while waiting for target state")]
    NotFound,

    #[error("unexpected state '{state}', wanted one of: {}", target.join(", "))]
    UnexpectedState { state: String, target: Vec<String> },

    #[error(transparent)]
    Refresh(#[from] ProviderError),
}

impl From<WaitError> for ProviderError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::Refresh(e) => e,
            WaitError::NotFound => ProviderError::new(err.to_string()).not_found(),
            other => ProviderError::new(other.to_string()),
        }
    }
}

/// Configuration for waiting on a remote state transition
///
/// `pending` lists the statuses the resource is allowed to pass through;
/// any other non-target status aborts the wait. An empty `target` means
/// "wait until the resource is gone".
#[derive(Debug, Clone)]
pub struct StateChange {
    pending: Vec<String>,
    target: Vec<String>,
    timeout: Duration,
    delay: Duration,
    min_timeout: Duration,
    continuous_target_occurrence: u32,
    not_found_checks: u32,
}

impl StateChange {
    pub fn new<S: Into<String>>(
        pending: impl IntoIterator<Item = S>,
        target: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            pending: pending.into_iter().map(Into::into).collect(),
            target: target.into_iter().map(Into::into).collect(),
            timeout: Duration::from_secs(300),
            delay: Duration::ZERO,
            min_timeout: Duration::from_millis(500),
            continuous_target_occurrence: 1,
            not_found_checks: 20,
        }
    }

    /// Overall deadline for the wait
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Initial pause before the first refresh
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Smallest interval between refreshes; the interval doubles from
    /// here up to the `delay` ceiling (or stays fixed when no delay is set)
    pub fn min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    /// Require the target status to be observed this many times in a row
    pub fn continuous_target_occurrence(mut self, n: u32) -> Self {
        self.continuous_target_occurrence = n.max(1);
        self
    }

    /// How many consecutive not-found refreshes to tolerate before
    /// giving up (remote APIs are often briefly inconsistent after create)
    pub fn not_found_checks(mut self, n: u32) -> Self {
        self.not_found_checks = n;
        self
    }

    /// Poll `refresh` until a target status holds
    ///
    /// Returns the refreshed object on success, or `None` when `target`
    /// is empty and the resource disappeared (delete waits). Refresh
    /// errors marked transient (throttling) are retried until the
    /// timeout; any other refresh error aborts the wait.
    pub async fn wait_for<T, F, Fut>(&self, mut refresh: F) -> Result<Option<T>, WaitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RefreshResult<T>>,
    {
        let deadline = Instant::now() + self.timeout;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let interval_ceiling = self.delay.max(self.min_timeout);
        let mut interval = self.min_timeout;
        let mut not_found_count = 0u32;
        let mut target_occurrence = 0u32;
        let mut last_state = String::new();

        loop {
            match refresh().await {
                Err(e) if e.is_transient() => {
                    // Throttling and the like; keep polling until the deadline
                    trace!(error = %e, "transient refresh error, retrying");
                }
                Err(e) => return Err(e.into()),
                Ok(None) if self.target.is_empty() => {
                    // Waiting for deletion and the resource is gone
                    return Ok(None);
                }
                Ok(None) => {
                    not_found_count += 1;
                    if not_found_count > self.not_found_checks {
                        return Err(WaitError::NotFound);
                    }
                    trace!(checks = not_found_count, "resource not found yet, retrying");
                }
                Ok(Some((object, state))) => {
                    not_found_count = 0;
                    last_state = state.clone();

                    if self.target.iter().any(|t| *t == state) {
                        target_occurrence += 1;
                        if target_occurrence >= self.continuous_target_occurrence {
                            return Ok(Some(object));
                        }
                    } else {
                        target_occurrence = 0;
                        let allowed =
                            self.pending.is_empty() || self.pending.iter().any(|p| *p == state);
                        if !allowed {
                            return Err(WaitError::UnexpectedState {
                                state,
                                target: self.target.clone(),
                            });
                        }
                        trace!(%state, "still pending");
                    }
                }
            }

            if Instant::now() + interval > deadline {
                return Err(WaitError::Timeout { last_state });
            }
            tokio::time::sleep(interval).await;
            interval = (interval * 2).min(interval_ceiling);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(pending: &[&str], target: &[&str]) -> StateChange {
        StateChange::new(pending.iter().copied(), target.iter().copied())
            .timeout(Duration::from_millis(500))
            .min_timeout(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn reaches_target_after_pending_states() {
        let calls = Arc::new(AtomicU32::new(0));
        let conf = fast(&["UPDATING"], &["AVAILABLE"]);

        let result = conf
            .wait_for(|| {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    let state = if n < 3 { "UPDATING" } else { "AVAILABLE" };
                    Ok(Some((n, state.to_string())))
                }
            })
            .await
            .unwrap();

        assert_eq!(result, Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn times_out_with_last_state() {
        let conf = fast(&["PENDING"], &["DEPLOYED"]).timeout(Duration::from_millis(20));

        let err = conf
            .wait_for(|| async { Ok(Some(((), "PENDING".to_string()))) })
            .await
            .unwrap_err();

        match err {
            WaitError::Timeout { last_state } => assert_eq!(last_state, "PENDING"),
            other => panic!("expected timeout, got {other}"),
        }
    }

    #[tokio::test]
    async fn unexpected_state_aborts() {
        let conf = fast(&["PENDING"], &["DEPLOYED"]);

        let err = conf
            .wait_for(|| async { Ok(Some(((), "FAILED".to_string()))) })
            .await
            .unwrap_err();

        assert!(matches!(err, WaitError::UnexpectedState { state, .. } if state == "FAILED"));
    }

    #[tokio::test]
    async fn empty_target_waits_for_gone() {
        let calls = Arc::new(AtomicU32::new(0));
        let conf = fast(&["PENDING_DELETION"], &[]);

        let result = conf
            .wait_for(|| {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Ok(Some(((), "PENDING_DELETION".to_string())))
                    } else {
                        Ok(None)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn tolerates_transient_not_found() {
        let calls = Arc::new(AtomicU32::new(0));
        let conf = fast(&["PENDING"], &["DEPLOYED"]).not_found_checks(5);

        let result = conf
            .wait_for(|| {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Ok(None)
                    } else {
                        Ok(Some((n, "DEPLOYED".to_string())))
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, Some(2));
    }

    #[tokio::test]
    async fn gives_up_after_too_many_not_found() {
        let conf = fast(&["PENDING"], &["DEPLOYED"]).not_found_checks(2);

        let err = conf
            .wait_for(|| async { Ok::<Option<((), String)>, ProviderError>(None) })
            .await
            .unwrap_err();

        assert!(matches!(err, WaitError::NotFound));
    }

    #[tokio::test]
    async fn continuous_target_occurrence_resets_on_pending() {
        let calls = Arc::new(AtomicU32::new(0));
        let conf = fast(&["PENDING"], &["DEPLOYED"]).continuous_target_occurrence(2);

        // DEPLOYED, PENDING, DEPLOYED, DEPLOYED -> success on call 4
        let states = ["DEPLOYED", "PENDING", "DEPLOYED", "DEPLOYED"];
        let result = conf
            .wait_for(|| {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) as usize;
                    Ok(Some((n, states[n.min(states.len() - 1)].to_string())))
                }
            })
            .await
            .unwrap();

        assert_eq!(result, Some(3));
    }

    #[tokio::test]
    async fn fatal_refresh_error_propagates() {
        let conf = fast(&["PENDING"], &["DEPLOYED"]);

        let err = conf
            .wait_for(|| async {
                Err::<Option<((), String)>, _>(ProviderError::new("access denied"))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, WaitError::Refresh(_)));
    }

    #[tokio::test]
    async fn transient_refresh_errors_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let conf = fast(&["PENDING"], &["DEPLOYED"]);

        let result = conf
            .wait_for(|| {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(ProviderError::new("rate exceeded").transient())
                    } else {
                        Ok(Some((n, "DEPLOYED".to_string())))
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, Some(2));
    }

    #[tokio::test]
    async fn persistent_transient_errors_hit_the_timeout() {
        let conf = fast(&["PENDING"], &["DEPLOYED"]).timeout(Duration::from_millis(20));

        let err = conf
            .wait_for(|| async {
                Err::<Option<((), String)>, _>(
                    ProviderError::new("rate exceeded").transient(),
                )
            })
            .await
            .unwrap_err();

        assert!(matches!(err, WaitError::Timeout { .. }));
    }
}
