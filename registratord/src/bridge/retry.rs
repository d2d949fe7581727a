use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Exponential backoff schedule
#[derive(Debug, Clone)]
struct Backoff {
    initial_interval: Duration,
    multiplier: f64,
    max_interval: Duration,
    max_elapsed: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            max_interval: Duration::from_secs(60),
            max_elapsed: Duration::from_secs(15 * 60),
        }
    }
}

impl Backoff {
    fn next_interval(&self, current: Duration) -> Duration {
        current.mul_f64(self.multiplier).min(self.max_interval)
    }
}

/// Run `op` until it succeeds, sleeping with exponential backoff between
/// attempts. Gives up with the last error once the elapsed time budget is spent.
pub async fn retry<F, Fut, T, E>(mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let backoff = Backoff::default();
    let started = Instant::now();
    let mut interval = backoff.initial_interval;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if started.elapsed() + interval > backoff.max_elapsed {
                    return Err(e);
                }
                tracing::warn!("attempt failed, retrying in {:?}: {}", interval, e);
                tokio::time::sleep(interval).await;
                interval = backoff.next_interval(interval);
            }
        }
    }
}
