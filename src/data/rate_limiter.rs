use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

/// Tracks request weight against the exchange's per-minute budget, shared by
/// every walker. Binance resets the counter at the top of each wall-clock
/// minute, so we track the minute index rather than a rolling window.
#[derive(Clone)]
pub struct GlobalRateLimiter {
    inner: Arc<Mutex<WeightWindow>>,
}

struct WeightWindow {
    used_weight: u32,
    current_minute_idx: u64,
    limit: u32,
}

impl GlobalRateLimiter {
    pub fn new(limit: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(WeightWindow {
                used_weight: 0,
                current_minute_idx: Self::current_minute_idx(),
                limit,
            })),
        }
    }

    /// Acquires permission to spend `cost` weight, sleeping until the next
    /// minute boundary whenever the budget is saturated.
    pub async fn acquire(&self, cost: u32, context: &str) {
        loop {
            let (wait, used, limit) = {
                let mut guard = self.inner.lock().await;
                let now_idx = Self::current_minute_idx();

                if now_idx > guard.current_minute_idx {
                    guard.used_weight = 0;
                    guard.current_minute_idx = now_idx;
                }

                if guard.used_weight + cost <= guard.limit {
                    guard.used_weight += cost;
                    return;
                }

                let now_secs = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or(Duration::ZERO)
                    .as_secs();
                let seconds_into_minute = now_secs % 60;
                // 100ms buffer so we land inside the next minute, not on the edge.
                let wait =
                    Duration::from_secs(60 - seconds_into_minute) + Duration::from_millis(100);
                (wait, guard.used_weight, guard.limit)
            };

            log::warn!(
                "weight budget saturated for [{}]: {}/{}, waiting {:.1}s until next minute",
                context,
                used,
                limit,
                wait.as_secs_f64()
            );
            tokio::time::sleep(wait).await;
        }
    }

    fn current_minute_idx() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs()
            / 60
    }
}
