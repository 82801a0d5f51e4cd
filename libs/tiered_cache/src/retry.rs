use std::{future::Future, time::Duration};

use rand::Rng;

/// Bounded retry with exponential backoff and jitter. Total work is always
/// finite: at most `max_attempts` tries with delays capped at
/// `max_delay_ms`. There is no cancellation; callers await the outcome.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

fn default_max_attempts() -> u32 { 3 }
fn default_base_delay_ms() -> u64 { 200 }
fn default_max_delay_ms() -> u64 { 2_000 }
fn default_jitter_ms() -> u64 { 100 }

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, completed_attempts: u32) -> Duration {
        let exp = completed_attempts.saturating_sub(1).min(16);
        let base = self
            .base_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_ms);
        let jitter = if self.jitter_ms == 0 {
            0
        }
        else {
            rand::thread_rng().gen_range(0..self.jitter_ms)
        };
        Duration::from_millis(base + jitter)
    }

    /// Drive `op` to success or exhaustion, returning the last error.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_attempts.max(1) {
                        return Err(e);
                    }
                    tokio::time::sleep(self.backoff(attempt)).await;
                }
            }
        }
    }
}
