//! Rate-limit-aware multi-credential request cycling.
//!
//! A pool of pooled ("history") credentials plus an optional priority
//! credential preferred for registered priority channels. Calls cycle
//! through credentials on rate limits and errors, wait out remembered
//! per-channel backoff windows before history/replies fetches, and share
//! one in-flight result between concurrent identical fetches.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::api::{MessageSnapshot, SlackApiError, WebApiClient};

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_rounds: u32,
    pub round_cooldown: Duration,
    pub default_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            round_cooldown: Duration::from_secs(60),
            default_retry_after: Duration::from_secs(1),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum HistoryCallKind {
    History,
    Replies,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct InflightKey {
    kind: HistoryCallKind,
    channel: String,
    ts: String,
}

type SharedHistoryResult = Arc<OnceCell<Result<Vec<MessageSnapshot>, SlackApiError>>>;

pub struct CredentialPool {
    normal: Vec<Arc<WebApiClient>>,
    priority: Option<Arc<WebApiClient>>,
    /// Round-robin start position; races only shift the rotation.
    cursor: AtomicUsize,
    priority_channels: RwLock<HashSet<String>>,
    /// channel id -> do-not-call-before instant. Windows only ever extend.
    channel_backoff: Mutex<HashMap<String, Instant>>,
    inflight: Mutex<HashMap<InflightKey, SharedHistoryResult>>,
    policy: RetryPolicy,
}

impl CredentialPool {
    pub fn new(
        normal: Vec<WebApiClient>,
        priority: Option<WebApiClient>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            normal: normal.into_iter().map(Arc::new).collect(),
            priority: priority.map(Arc::new),
            cursor: AtomicUsize::new(0),
            priority_channels: RwLock::new(HashSet::new()),
            channel_backoff: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
            policy,
        }
    }

    pub fn register_priority_channel(&self, channel_id: &str) {
        let mut channels =
            self.priority_channels.write().unwrap_or_else(PoisonError::into_inner);
        if channels.insert(channel_id.to_string()) {
            debug!(channel = channel_id, "registered priority channel");
        }
    }

    pub fn is_priority_channel(&self, channel_id: &str) -> bool {
        self.priority_channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(channel_id)
    }

    pub fn priority_channel_count(&self) -> usize {
        self.priority_channels.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Credential try-order for one round: the priority credential first when
    /// the hinted channel is registered as priority, then the pooled
    /// credentials starting at the rotating cursor, with wraparound.
    fn select_order(&self, channel_hint: Option<&str>) -> Vec<Arc<WebApiClient>> {
        let mut order = Vec::with_capacity(self.normal.len() + 1);

        if let (Some(priority), Some(channel)) = (&self.priority, channel_hint) {
            if self.is_priority_channel(channel) {
                order.push(priority.clone());
            }
        }

        if !self.normal.is_empty() {
            let start = self.cursor.fetch_add(1, Ordering::Relaxed) % self.normal.len();
            for offset in 0..self.normal.len() {
                order.push(self.normal[(start + offset) % self.normal.len()].clone());
            }
        }

        if order.is_empty() {
            if let Some(priority) = &self.priority {
                order.push(priority.clone());
            }
        }

        order
    }

    /// Run a call against the pool, retrying across credentials. Rate limits
    /// sleep out the hinted duration and extend the hinted channel's backoff
    /// window; other errors advance immediately. A full pool miss waits the
    /// round cooldown; exhausting every round is terminal.
    pub async fn execute<T, F, Fut>(
        &self,
        channel_hint: Option<&str>,
        call: F,
    ) -> Result<T, SlackApiError>
    where
        F: Fn(Arc<WebApiClient>) -> Fut,
        Fut: Future<Output = Result<T, SlackApiError>>,
    {
        if self.normal.is_empty() && self.priority.is_none() {
            return Err(SlackApiError::NoCredentials);
        }

        for round in 1..=self.policy.max_rounds {
            for client in self.select_order(channel_hint) {
                match call(client.clone()).await {
                    Ok(value) => return Ok(value),
                    Err(SlackApiError::RateLimited { retry_after }) => {
                        let wait = retry_after.unwrap_or(self.policy.default_retry_after);
                        if let Some(channel) = channel_hint {
                            self.extend_channel_window(channel, wait);
                        }
                        warn!(
                            credential = client.label(),
                            wait_ms = wait.as_millis() as u64,
                            "rate limited; sleeping before next credential"
                        );
                        tokio::time::sleep(wait).await;
                    }
                    Err(error) => {
                        warn!(
                            credential = client.label(),
                            %error,
                            "credential call failed; trying next credential"
                        );
                    }
                }
            }

            if round < self.policy.max_rounds {
                info!(
                    round,
                    cooldown_secs = self.policy.round_cooldown.as_secs(),
                    "credential pool exhausted; waiting before next round"
                );
                tokio::time::sleep(self.policy.round_cooldown).await;
            }
        }

        Err(SlackApiError::Exhausted { rounds: self.policy.max_rounds })
    }

    /// History anchored at a timestamp (inclusive, limit 1), waiting out the
    /// channel's backoff window and de-duplicating concurrent identical
    /// fetches.
    pub async fn fetch_history(
        &self,
        channel: &str,
        latest: &str,
    ) -> Result<Vec<MessageSnapshot>, SlackApiError> {
        self.wait_for_channel_window(channel).await;
        let key = InflightKey {
            kind: HistoryCallKind::History,
            channel: channel.to_string(),
            ts: latest.to_string(),
        };
        self.single_flight(key, || async {
            self.execute(Some(channel), |client| {
                let channel = channel.to_owned();
                let latest = latest.to_owned();
                async move { client.conversations_history(&channel, &latest).await }
            })
            .await
        })
        .await
    }

    /// A thread's replies, with the same backoff + de-duplication handling as
    /// history fetches.
    pub async fn fetch_replies(
        &self,
        channel: &str,
        thread_ts: &str,
    ) -> Result<Vec<MessageSnapshot>, SlackApiError> {
        self.wait_for_channel_window(channel).await;
        let key = InflightKey {
            kind: HistoryCallKind::Replies,
            channel: channel.to_string(),
            ts: thread_ts.to_string(),
        };
        self.single_flight(key, || async {
            self.execute(Some(channel), |client| {
                let channel = channel.to_owned();
                let thread_ts = thread_ts.to_owned();
                async move { client.conversations_replies(&channel, &thread_ts).await }
            })
            .await
        })
        .await
    }

    pub async fn wait_for_channel_window(&self, channel: &str) {
        let wait = {
            let windows = self.channel_backoff.lock().unwrap_or_else(PoisonError::into_inner);
            windows.get(channel).and_then(|until| until.checked_duration_since(Instant::now()))
        };
        if let Some(wait) = wait {
            debug!(
                channel,
                wait_ms = wait.as_millis() as u64,
                "waiting out channel backoff window"
            );
            tokio::time::sleep(wait).await;
        }
    }

    pub fn channel_window_remaining(&self, channel: &str) -> Option<Duration> {
        let windows = self.channel_backoff.lock().unwrap_or_else(PoisonError::into_inner);
        windows.get(channel).and_then(|until| until.checked_duration_since(Instant::now()))
    }

    pub(crate) fn extend_channel_window(&self, channel: &str, delay: Duration) {
        let mut windows = self.channel_backoff.lock().unwrap_or_else(PoisonError::into_inner);
        let candidate = Instant::now() + delay;
        let entry = windows.entry(channel.to_string()).or_insert(candidate);
        if candidate > *entry {
            *entry = candidate;
        }
    }

    /// Share one in-flight history/replies request between every caller that
    /// asks for the same (kind, channel, ts) while it is outstanding.
    async fn single_flight<F, Fut>(
        &self,
        key: InflightKey,
        fetch: F,
    ) -> Result<Vec<MessageSnapshot>, SlackApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<MessageSnapshot>, SlackApiError>>,
    {
        let cell = {
            let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            inflight.entry(key.clone()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };

        let result = cell.get_or_init(fetch).await.clone();

        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = inflight.get(&key) {
            if Arc::ptr_eq(current, &cell) {
                inflight.remove(&key);
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::{CredentialPool, HistoryCallKind, InflightKey, RetryPolicy};
    use crate::api::{MessageSnapshot, SlackApiError, WebApiClient};

    fn fast_policy(max_rounds: u32) -> RetryPolicy {
        RetryPolicy {
            max_rounds,
            round_cooldown: Duration::from_millis(5),
            default_retry_after: Duration::from_millis(5),
        }
    }

    fn client(label: &str) -> WebApiClient {
        WebApiClient::new(label, format!("xoxb-{label}").into())
    }

    fn pool_of(labels: &[&str], priority: Option<&str>, policy: RetryPolicy) -> CredentialPool {
        CredentialPool::new(
            labels.iter().map(|label| client(label)).collect(),
            priority.map(client),
            policy,
        )
    }

    #[tokio::test]
    async fn rate_limit_falls_through_to_next_credential() {
        let pool = pool_of(&["history-1", "history-2"], None, fast_policy(1));
        let attempts = Arc::new(AtomicUsize::new(0));

        let attempts_in = attempts.clone();
        let result = pool
            .execute(None, move |client| {
                let attempts = attempts_in.clone();
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(SlackApiError::RateLimited { retry_after: None })
                    } else {
                        Ok(client.label().to_string())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_rate_limit_errors_advance_without_hint_sleep() {
        let pool = pool_of(&["history-1", "history-2"], None, fast_policy(1));
        let attempts = Arc::new(AtomicUsize::new(0));

        let attempts_in = attempts.clone();
        let result = pool
            .execute(None, move |_client| {
                let attempts = attempts_in.clone();
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(SlackApiError::Api { code: "internal_error".to_string() })
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausting_every_round_is_terminal() {
        let pool = pool_of(&["history-1", "history-2"], None, fast_policy(2));
        let attempts = Arc::new(AtomicUsize::new(0));

        let attempts_in = attempts.clone();
        let result: Result<(), _> = pool
            .execute(None, move |_client| {
                let attempts = attempts_in.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(SlackApiError::RateLimited { retry_after: None })
                }
            })
            .await;

        assert_eq!(result, Err(SlackApiError::Exhausted { rounds: 2 }));
        assert_eq!(attempts.load(Ordering::SeqCst), 4, "2 credentials x 2 rounds");
    }

    #[tokio::test]
    async fn empty_pool_reports_no_credentials() {
        let pool = pool_of(&[], None, fast_policy(1));
        let result: Result<(), _> = pool.execute(None, |_client| async { Ok(()) }).await;
        assert_eq!(result, Err(SlackApiError::NoCredentials));
    }

    #[tokio::test]
    async fn priority_credential_is_tried_first_for_priority_channels() {
        let pool = pool_of(&["history-1"], Some("priority"), fast_policy(1));
        pool.register_priority_channel("C-prio");

        let used = Arc::new(Mutex::new(Vec::new()));
        let used_in = used.clone();
        pool.execute(Some("C-prio"), move |client| {
            let used = used_in.clone();
            async move {
                used.lock().expect("lock").push(client.label().to_string());
                Ok(())
            }
        })
        .await
        .expect("execute");

        assert_eq!(used.lock().expect("lock").as_slice(), ["priority"]);
    }

    #[tokio::test]
    async fn priority_credential_is_skipped_for_other_channels() {
        let pool = pool_of(&["history-1"], Some("priority"), fast_policy(1));
        pool.register_priority_channel("C-prio");

        let used = Arc::new(Mutex::new(Vec::new()));
        let used_in = used.clone();
        pool.execute(Some("C-other"), move |client| {
            let used = used_in.clone();
            async move {
                used.lock().expect("lock").push(client.label().to_string());
                Ok(())
            }
        })
        .await
        .expect("execute");

        assert_eq!(used.lock().expect("lock").as_slice(), ["history-1"]);
    }

    #[tokio::test]
    async fn rate_limits_extend_the_channel_backoff_window() {
        // The execute call sleeps out the full hint before returning, so the
        // live window is observed from a second task mid-flight.
        let pool = Arc::new(pool_of(&["history-1"], None, fast_policy(1)));

        let task = {
            let pool = pool.clone();
            tokio::spawn(async move {
                let _result: Result<(), SlackApiError> = pool
                    .execute(Some("C1"), |_client| async {
                        Err(SlackApiError::RateLimited {
                            retry_after: Some(Duration::from_millis(200)),
                        })
                    })
                    .await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        let remaining = pool.channel_window_remaining("C1").expect("window live mid-flight");
        assert!(remaining <= Duration::from_millis(200));

        task.await.expect("join");
    }

    #[tokio::test]
    async fn backoff_windows_only_ever_extend() {
        let pool = pool_of(&["history-1"], None, fast_policy(1));

        pool.extend_channel_window("C1", Duration::from_millis(500));
        let before = pool.channel_window_remaining("C1").expect("set");

        // A racy shorter write must not shorten the wait.
        pool.extend_channel_window("C1", Duration::from_millis(10));
        let after = pool.channel_window_remaining("C1").expect("still set");
        assert!(after >= before - Duration::from_millis(50));
        assert!(after > Duration::from_millis(100));
    }

    #[tokio::test]
    async fn concurrent_identical_fetches_share_one_flight() {
        let pool = Arc::new(pool_of(&["history-1"], None, fast_policy(1)));
        let fetches = Arc::new(AtomicUsize::new(0));

        let key = || InflightKey {
            kind: HistoryCallKind::History,
            channel: "C1".to_string(),
            ts: "100.1".to_string(),
        };
        let fetch = |counter: Arc<AtomicUsize>| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, SlackApiError>(vec![MessageSnapshot {
                ts: "100.1".to_string(),
                ..Default::default()
            }])
        };

        let (first, second) = tokio::join!(
            pool.single_flight(key(), || fetch(fetches.clone())),
            pool.single_flight(key(), || fetch(fetches.clone())),
        );

        assert_eq!(fetches.load(Ordering::SeqCst), 1, "one upstream request for both callers");
        assert_eq!(first.expect("first"), second.expect("second"));

        // After the flight lands, a fresh call fetches again.
        pool.single_flight(key(), || fetch(fetches.clone())).await.expect("third");
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }
}
