//! Fixed-window request counters for registration throttling.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

pub const REGISTRATIONS_PER_IP: u32 = 5;
pub const REGISTRATIONS_PER_USER: u32 = 10;
pub const THROTTLE_PERIOD: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    /// Seconds until the current window resets.
    Limited { retry_after: u64 },
}

/// Counts hits per key within aligned periods. Keys are namespaced by the caller
/// (`ip:...`, `user:...`).
#[derive(Debug)]
pub struct Throttle {
    period: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(THROTTLE_PERIOD)
    }
}

impl Throttle {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub async fn hit(&self, key: &str, limit: u32) -> Decision {
        self.hit_at(key, limit, Instant::now()).await
    }

    pub async fn hit_at(&self, key: &str, limit: u32, now: Instant) -> Decision {
        let mut windows = self.windows.lock().await;
        windows.retain(|_, w| now.duration_since(w.started) < self.period);

        let window = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        window.count += 1;

        if window.count > limit {
            let elapsed = now.duration_since(window.started);
            let remaining = self.period.saturating_sub(elapsed);
            Decision::Limited {
                retry_after: remaining.as_secs().max(1),
            }
        } else {
            Decision::Allowed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_limit_is_per_key() {
        let throttle = Throttle::default();
        let now = Instant::now();
        for _ in 0..REGISTRATIONS_PER_IP {
            assert_eq!(
                throttle.hit_at("ip:1.2.3.4", REGISTRATIONS_PER_IP, now).await,
                Decision::Allowed
            );
        }
        assert!(matches!(
            throttle.hit_at("ip:1.2.3.4", REGISTRATIONS_PER_IP, now).await,
            Decision::Limited { retry_after: 60 }
        ));
        assert_eq!(
            throttle.hit_at("ip:5.6.7.8", REGISTRATIONS_PER_IP, now).await,
            Decision::Allowed
        );
    }

    #[tokio::test]
    async fn test_window_resets_after_period() {
        let throttle = Throttle::new(Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..2 {
            throttle.hit_at("user:a", 1, start).await;
        }
        let later = start + Duration::from_secs(61);
        assert_eq!(throttle.hit_at("user:a", 1, later).await, Decision::Allowed);
    }

    #[tokio::test]
    async fn test_retry_after_counts_down() {
        let throttle = Throttle::default();
        let start = Instant::now();
        throttle.hit_at("ip:x", 1, start).await;
        let decision = throttle
            .hit_at("ip:x", 1, start + Duration::from_secs(45))
            .await;
        assert_eq!(decision, Decision::Limited { retry_after: 15 });
    }
}
