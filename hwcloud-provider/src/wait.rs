//! Polling until an asynchronous operation settles
//!
//! A [`StateChangeConf`] repeatedly calls its refresh function until the reported
//! state is one of `target`, failing on unexpected states, repeated not-found
//! results or the timeout.

use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::time::{Instant, sleep};

use crate::error::{ProviderError, ProviderResult};

/// Refresh result: `None` when the object was not found, otherwise the object and its state.
pub type RefreshResult = ProviderResult<Option<(Value, String)>>;

pub type RefreshFn<'a> = Box<dyn Fn() -> BoxFuture<'a, RefreshResult> + Send + Sync + 'a>;

/// Default number of consecutive not-found refreshes tolerated.
pub const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

/// Backoff start when neither `poll_interval` nor `min_timeout` is set.
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

pub struct StateChangeConf<'a> {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub refresh: RefreshFn<'a>,
    pub timeout: Duration,
    /// Wait before the first refresh.
    pub delay: Duration,
    /// Fixed interval between refreshes; overrides backoff.
    pub poll_interval: Option<Duration>,
    /// Lower bound for the backoff interval.
    pub min_timeout: Duration,
    pub not_found_checks: u32,
}

impl<'a> StateChangeConf<'a> {
    pub fn new<F>(pending: &[&str], target: &[&str], timeout: Duration, refresh: F) -> Self
    where
        F: Fn() -> BoxFuture<'a, RefreshResult> + Send + Sync + 'a,
    {
        Self {
            pending: pending.iter().map(ToString::to_string).collect(),
            target: target.iter().map(ToString::to_string).collect(),
            refresh: Box::new(refresh),
            timeout,
            delay: Duration::ZERO,
            poll_interval: None,
            min_timeout: Duration::ZERO,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
        }
    }

    #[must_use]
    pub fn delay(mut self, d: Duration) -> Self {
        self.delay = d;
        self
    }

    #[must_use]
    pub fn poll_interval(mut self, d: Duration) -> Self {
        self.poll_interval = Some(d);
        self
    }

    #[must_use]
    pub fn min_timeout(mut self, d: Duration) -> Self {
        self.min_timeout = d;
        self
    }

    #[must_use]
    pub fn not_found_checks(mut self, n: u32) -> Self {
        self.not_found_checks = n;
        self
    }

    fn interval(&self, attempt: u32) -> Duration {
        if let Some(fixed) = self.poll_interval {
            return fixed;
        }
        let backoff = INITIAL_BACKOFF
            .saturating_mul(2_u32.saturating_pow(attempt))
            .min(MAX_BACKOFF);
        backoff.max(self.min_timeout)
    }

    /// Poll until a target state is reached and return the refreshed object.
    ///
    /// A target of `DELETED` (or any target) is also reached when `refresh` maps a
    /// not-found response to `Some((Value::Null, "DELETED"))`.
    pub async fn wait_for_state(&self) -> ProviderResult<Value> {
        let deadline = Instant::now() + self.timeout;
        let mut last_state = String::new();
        let mut not_found = 0_u32;
        let mut attempt = 0_u32;

        sleep(self.delay).await;

        loop {
            match (self.refresh)().await? {
                None => {
                    not_found += 1;
                    if not_found > self.not_found_checks {
                        return Err(ProviderError::NotFoundChecks {
                            checks: self.not_found_checks,
                        });
                    }
                }
                Some((object, state)) => {
                    not_found = 0;
                    if self.target.contains(&state) {
                        return Ok(object);
                    }
                    if !self.pending.contains(&state) {
                        return Err(ProviderError::UnexpectedState {
                            state,
                            target: self.target.clone(),
                        });
                    }
                    log::debug!("waiting for state {:?}, current: {state}", self.target);
                    last_state = state;
                }
            }

            let wait = self.interval(attempt);
            attempt = attempt.saturating_add(1);
            if Instant::now() + wait > deadline {
                return Err(ProviderError::WaitTimeout {
                    last_state,
                    target: self.target.clone(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
            sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::FutureExt;
    use serde_json::json;

    use super::*;

    /// Refresh that replays `states` (`"-"` = not found), repeating the last one.
    fn scripted(states: &'static [&'static str], calls: Arc<AtomicUsize>) -> impl Fn() -> BoxFuture<'static, RefreshResult> + Send + Sync {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            let state = states[n.min(states.len() - 1)];
            async move {
                if state == "-" {
                    Ok(None)
                } else {
                    Ok(Some((json!({"status": state}), state.to_string())))
                }
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reaches_target_after_pending() {
        let calls = Arc::new(AtomicUsize::new(0));
        let conf = StateChangeConf::new(
            &["PENDING_CREATE"],
            &["ACTIVE"],
            Duration::from_secs(60),
            scripted(&["PENDING_CREATE", "PENDING_CREATE", "ACTIVE"], calls.clone()),
        )
        .delay(Duration::from_secs(5))
        .poll_interval(Duration::from_secs(5));

        let start = Instant::now();
        let obj = conf.wait_for_state().await.unwrap();
        assert_eq!(obj["status"], "ACTIVE");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_state_fails() {
        let calls = Arc::new(AtomicUsize::new(0));
        let conf = StateChangeConf::new(
            &["PENDING"],
            &["ACTIVE"],
            Duration::from_secs(60),
            scripted(&["PENDING", "ERROR"], calls),
        );
        assert!(matches!(
            conf.wait_for_state().await,
            Err(ProviderError::UnexpectedState { state, .. }) if state == "ERROR"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out() {
        let calls = Arc::new(AtomicUsize::new(0));
        let conf = StateChangeConf::new(
            &["creating"],
            &["normal"],
            Duration::from_secs(30),
            scripted(&["creating"], calls),
        )
        .min_timeout(Duration::from_secs(20));
        assert!(matches!(
            conf.wait_for_state().await,
            Err(ProviderError::WaitTimeout { last_state, timeout_secs: 30, .. }) if last_state == "creating"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn too_many_not_found() {
        let calls = Arc::new(AtomicUsize::new(0));
        let conf = StateChangeConf::new(
            &["PENDING"],
            &["ACTIVE"],
            Duration::from_secs(3600),
            scripted(&["-"], calls.clone()),
        )
        .poll_interval(Duration::from_secs(1))
        .not_found_checks(3);
        assert!(matches!(
            conf.wait_for_state().await,
            Err(ProviderError::NotFoundChecks { checks: 3 })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_counter_resets() {
        let calls = Arc::new(AtomicUsize::new(0));
        let conf = StateChangeConf::new(
            &["PENDING"],
            &["ACTIVE"],
            Duration::from_secs(3600),
            scripted(&["-", "PENDING", "-", "ACTIVE"], calls),
        )
        .not_found_checks(1);
        assert!(conf.wait_for_state().await.is_ok());
    }

    #[test]
    fn backoff_respects_min_timeout_and_cap() {
        let conf = StateChangeConf::new(&[], &["x"], Duration::ZERO, || async { Ok(None) }.boxed());
        assert_eq!(conf.interval(0), Duration::from_millis(100));
        assert_eq!(conf.interval(3), Duration::from_millis(800));
        assert_eq!(conf.interval(20), Duration::from_secs(10));
        let conf = conf.min_timeout(Duration::from_secs(3));
        assert_eq!(conf.interval(0), Duration::from_secs(3));
    }
}
