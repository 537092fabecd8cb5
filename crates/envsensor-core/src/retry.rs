//! Bounded retry for transient BLE and sink failures.
//!
//! # Example
//!
//! ```
//! use envsensor_core::{RetryConfig, with_retry, Error};
//!
//! # async fn example() -> Result<(), Error> {
//! let config = RetryConfig::for_page();
//! let rows = with_retry(&config, "page 12", || async {
//!     Ok::<_, Error>(13)
//! }).await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 means no retries).
    pub max_retries: u32,
    /// Delay before the first retry.
    #[serde(with = "duration_ms")]
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    #[serde(with = "duration_ms")]
    pub max_delay: Duration,
    /// 1.0 keeps the delay constant, 2.0 doubles it each attempt.
    pub backoff_multiplier: f64,
    /// Add up to 25% random jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// No retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Connecting to a sensor: 5 attempts spaced 5 seconds apart.
    ///
    /// The sensor advertises slowly while logging, so connects often need
    /// a few tries.
    pub fn for_connect() -> Self {
        Self {
            max_retries: 4,
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// One page handshake: 3 attempts, 1 second apart.
    pub fn for_page() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// One batch write to the time-series sink.
    pub fn for_sink() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }

    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    #[must_use]
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    #[must_use]
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay.as_secs_f64());

        let final_delay = if self.jitter {
            let jitter_factor = 1.0 + (rand::rng().random::<f64>() * 0.25);
            capped_delay * jitter_factor
        } else {
            capped_delay
        };

        Duration::from_secs_f64(final_delay)
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// Execute an async operation, retrying while it fails with a transient error.
///
/// Returns the first success, the first non-retryable error, or the last
/// error once `max_retries` retries have been spent.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("{} succeeded after {} retries", operation_name, attempt);
                }
                return Ok(result);
            }
            Err(e) if !is_retryable(&e) || attempt >= config.max_retries => return Err(e),
            Err(e) => {
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    operation_name,
                    attempt + 1,
                    config.max_retries + 1,
                    e,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Whether an error is worth retrying.
///
/// Radio-level failures and a flag that never became ready are transient.
/// Anything the device actually said (a failure flag, a malformed payload)
/// is final for this run.
pub fn is_retryable(error: &Error) -> bool {
    match error {
        Error::Timeout { .. } => true,
        Error::Bluetooth(_) => true,
        Error::NotConnected => true,
        Error::WriteFailed { .. } => true,
        Error::PollExhausted { .. } => true,
        Error::Io(_) => true,
        Error::Sink { retryable, .. } => *retryable,
        Error::DeviceNotFound(_) => false,
        Error::CharacteristicNotFound { .. } => false,
        Error::Decode(_) => false,
        Error::DeviceError { .. } => false,
        Error::Protocol { .. } => false,
        Error::UnsupportedDevice(_) => false,
        Error::Store(_) => false,
        Error::InvalidConfig(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envsensor_types::ParseError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryConfig {
        RetryConfig::new(max_retries)
            .initial_delay(Duration::from_millis(1))
            .jitter(false)
    }

    #[test]
    fn test_presets() {
        assert_eq!(RetryConfig::for_connect().max_retries + 1, 5);
        assert_eq!(RetryConfig::for_page().max_retries + 1, 3);
        assert_eq!(RetryConfig::none().max_retries, 0);
    }

    #[test]
    fn test_delay_calculation() {
        let config = RetryConfig {
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_millis(300),
            jitter: false,
            max_retries: 5,
        };

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(300));
        assert_eq!(
            RetryConfig::for_connect().delay_for_attempt(3),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&Error::timeout("x", Duration::from_secs(1))));
        assert!(is_retryable(&Error::PollExhausted {
            page: 1,
            attempts: 3
        }));
        assert!(is_retryable(&Error::sink("503", true)));
        assert!(!is_retryable(&Error::sink("400", false)));
        assert!(!is_retryable(&Error::Decode(ParseError::RowOutOfRange(14))));
        assert!(!is_retryable(&Error::protocol(1, "rows out of order")));
        assert!(!is_retryable(&Error::invalid_config("bad")));
    }

    #[test]
    fn test_config_deserializes_millis() {
        let config: RetryConfig =
            from_json(r#"{"max_retries": 1, "initial_delay": 250, "jitter": false}"#);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.initial_delay, Duration::from_millis(250));
        assert_eq!(config.max_delay, Duration::from_secs(5));
    }

    fn from_json(json: &str) -> RetryConfig {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn test_with_retry_eventual_success() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let result: Result<i32> = with_retry(&fast(3), "test", || {
            let attempts = Arc::clone(&counter);
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::NotConnected)
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_all_fail() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let result: Result<i32> = with_retry(&fast(2), "test", || {
            let attempts = Arc::clone(&counter);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(Error::timeout("read", Duration::from_millis(1)))
            }
        })
        .await;

        assert!(matches!(result, Err(Error::Timeout { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_non_retryable_error() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let result: Result<i32> = with_retry(&fast(3), "test", || {
            let attempts = Arc::clone(&counter);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(Error::protocol(4, "row 5 after row 3"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
