//! Per-client request admission limiting.
//!
//! Each client key owns a fixed window that opens on its first request and
//! closes `window` later. The window start is stored next to the count, so an
//! expired window is detected and reopened under the same lock that checks
//! and increments the count. There are no per-client timers; a single janitor
//! task drops expired entries so idle clients do not accumulate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_REQUESTS: u32 = 100;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests accepted per client per window.
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window: DEFAULT_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitError {
    #[error("Rate limit exceeded. Please try again later.")]
    Exceeded,
}

#[derive(Debug, Clone, Copy)]
struct ClientWindow {
    started_at: Instant,
    count: u32,
}

impl ClientWindow {
    fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.started_at) >= window
    }
}

#[derive(Debug)]
pub struct AdmissionLimiter {
    config: RateLimitConfig,
    clients: Mutex<HashMap<String, ClientWindow>>,
}

/// Shared limiter handle held by the HTTP layer.
pub type SharedAdmissionLimiter = Arc<AdmissionLimiter>;

impl AdmissionLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    // The map holds plain counters, so a panic elsewhere cannot leave it
    // half-updated; recover the guard instead of propagating the poison.
    fn clients(&self) -> MutexGuard<'_, HashMap<String, ClientWindow>> {
        self.clients.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Count one request from `client_key` and decide whether to admit it.
    pub fn check(&self, client_key: &str) -> Result<(), RateLimitError> {
        self.check_at(client_key, Instant::now())
    }

    fn check_at(&self, client_key: &str, now: Instant) -> Result<(), RateLimitError> {
        let mut clients = self.clients();
        let entry = clients
            .entry(client_key.to_string())
            .or_insert(ClientWindow {
                started_at: now,
                count: 0,
            });

        if entry.is_expired(now, self.config.window) {
            *entry = ClientWindow {
                started_at: now,
                count: 0,
            };
        }

        if entry.count >= self.config.max_requests {
            tracing::debug!(
                client = client_key,
                count = entry.count,
                "Rejecting request: rate limit exceeded"
            );
            return Err(RateLimitError::Exceeded);
        }

        entry.count += 1;
        Ok(())
    }

    /// Requests admitted for `client_key` in its current window.
    pub fn current_count(&self, client_key: &str) -> u32 {
        let now = Instant::now();
        self.clients()
            .get(client_key)
            .filter(|w| !w.is_expired(now, self.config.window))
            .map(|w| w.count)
            .unwrap_or(0)
    }

    /// Number of clients currently tracked, expired or not.
    pub fn tracked_clients(&self) -> usize {
        self.clients().len()
    }

    /// Drop every client whose window has closed. Returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let window = self.config.window;
        let mut clients = self.clients();
        let before = clients.len();
        clients.retain(|_, w| !w.is_expired(now, window));
        before - clients.len()
    }

    /// Spawn the janitor that prunes expired windows every `window` until
    /// `cancel` fires.
    pub fn spawn_janitor(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        let period = self.config.window;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = limiter.prune_expired();
                        if removed > 0 {
                            tracing::debug!("Pruned {} expired rate-limit windows", removed);
                        }
                    }
                }
            }
            tracing::debug!("Rate-limit janitor stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window_secs: u64) -> AdmissionLimiter {
        AdmissionLimiter::new(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(window_secs),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_accepts_up_to_max_requests() {
        let limiter = limiter(100, 60);
        for _ in 0..100 {
            assert!(limiter.check("10.0.0.1").is_ok());
        }
        assert_eq!(limiter.current_count("10.0.0.1"), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_window_expiry() {
        let limiter = limiter(100, 60);

        // 101 requests inside 10 seconds.
        for i in 0..100 {
            assert!(limiter.check("1.2.3.4").is_ok(), "request {} rejected", i + 1);
            if i % 10 == 0 {
                tokio::time::advance(Duration::from_secs(1)).await;
            }
        }
        assert_eq!(limiter.check("1.2.3.4"), Err(RateLimitError::Exceeded));

        // Still inside the window that opened with request 1.
        tokio::time::advance(Duration::from_secs(40)).await;
        assert_eq!(limiter.check("1.2.3.4"), Err(RateLimitError::Exceeded));

        // 60s after request 1.
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(limiter.check("1.2.3.4").is_ok());
        assert_eq!(limiter.current_count("1.2.3.4"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_is_anchored_at_first_request() {
        let limiter = limiter(2, 60);
        limiter.check("a").unwrap();
        tokio::time::advance(Duration::from_secs(59)).await;
        limiter.check("a").unwrap();
        assert!(limiter.check("a").is_err());

        // Traffic at t=59 did not push the window out.
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.check("a").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clients_are_isolated() {
        let limiter = limiter(3, 60);
        for _ in 0..3 {
            limiter.check("a").unwrap();
        }
        assert!(limiter.check("a").is_err());
        assert!(limiter.check("b").is_ok());
        assert_eq!(limiter.current_count("b"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_expired() {
        let limiter = limiter(5, 60);
        limiter.check("old").unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.check("fresh").unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(limiter.prune_expired(), 1);
        assert_eq!(limiter.tracked_clients(), 1);
        assert_eq!(limiter.current_count("fresh"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_janitor_prunes_and_stops_on_cancel() {
        let limiter = Arc::new(limiter(5, 60));
        let cancel = CancellationToken::new();
        let handle = limiter.spawn_janitor(cancel.clone());

        limiter.check("idle").unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(limiter.tracked_clients(), 0);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_never_over_admit() {
        let limiter = Arc::new(limiter(100, 60));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                let mut accepted = 0;
                for _ in 0..50 {
                    if limiter.check("shared").is_ok() {
                        accepted += 1;
                    }
                    tokio::task::yield_now().await;
                }
                accepted
            }));
        }

        let mut total = 0;
        for handle in handles {
            total += handle.await.unwrap();
        }
        assert_eq!(total, 100);
        assert_eq!(limiter.current_count("shared"), 100);
    }
}
