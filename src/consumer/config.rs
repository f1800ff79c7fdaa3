use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConsumerError, Result};

/// Configuration for a [`PollingConsumer`](super::PollingConsumer).
///
/// # Example
///
/// ```
/// use pull_consumer::ConsumerConfig;
///
/// let config = ConsumerConfig::new()
///     .with_interval_ms(250)
///     .with_max_per_tick(20)
///     .with_prefetch_limit(100);
///
/// let parsed = ConsumerConfig::from_json(
///     r#"{ "interval_ms": 250, "max_per_tick": 20, "prefetch_limit": 100 }"#,
/// )
/// .unwrap();
/// assert_eq!(config, parsed);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// Tick period in milliseconds.
    pub interval_ms: u64,

    /// Maximum messages dispatched per tick (`None` or 0 = unbounded).
    pub max_per_tick: Option<usize>,

    /// Maximum outstanding messages (0 = unbounded). Validated when applied.
    pub prefetch_limit: i64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            max_per_tick: None,
            prefetch_limit: 0,
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    interval_ms: Option<u64>,
    #[serde(default)]
    max_per_tick: Option<usize>,
    #[serde(default)]
    prefetch_limit: Option<serde_json::Number>,
}

impl ConsumerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tick interval in milliseconds (builder pattern)
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    /// Set the per-tick batch cap (builder pattern)
    pub fn with_max_per_tick(mut self, max: usize) -> Self {
        self.max_per_tick = Some(max);
        self
    }

    /// Set the prefetch limit (builder pattern)
    pub fn with_prefetch_limit(mut self, limit: i64) -> Self {
        self.prefetch_limit = limit;
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Parse and validate a JSON configuration document.
    ///
    /// Missing fields take their defaults. A zero interval, or a negative or
    /// non-integral prefetch limit, fails with `InvalidArgument`.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(json)
            .map_err(|e| ConsumerError::InvalidArgument(format!("consumer config: {}", e)))?;

        let defaults = Self::default();
        let prefetch_limit = match raw.prefetch_limit {
            Some(number) => integral(&number)?,
            None => defaults.prefetch_limit,
        };

        let config = Self {
            interval_ms: raw.interval_ms.unwrap_or(defaults.interval_ms),
            max_per_tick: raw.max_per_tick,
            prefetch_limit,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(ConsumerError::InvalidArgument(
                "interval_ms must be positive".into(),
            ));
        }
        validate_prefetch_limit(self.prefetch_limit)?;
        Ok(())
    }
}

pub(crate) fn validate_prefetch_limit(count: i64) -> Result<usize> {
    usize::try_from(count).map_err(|_| {
        ConsumerError::InvalidArgument(format!(
            "prefetch limit must be a non-negative integer, got {}",
            count
        ))
    })
}

fn integral(number: &serde_json::Number) -> Result<i64> {
    if let Some(n) = number.as_i64() {
        return Ok(n);
    }
    let out_of_range = || {
        ConsumerError::InvalidArgument(format!("prefetch limit {} is out of range", number))
    };
    if number.is_u64() {
        return Err(out_of_range());
    }
    match number.as_f64() {
        Some(f) if f.fract() == 0.0 => {
            // i64::MAX as f64 rounds up to 2^63, which is already out of range.
            if f >= i64::MIN as f64 && f < i64::MAX as f64 {
                Ok(f as i64)
            } else {
                Err(out_of_range())
            }
        }
        _ => Err(ConsumerError::InvalidArgument(format!(
            "prefetch limit must be an integer, got {}",
            number
        ))),
    }
}
