use crate::core::ConfigError;
use crate::model::VOCABULARY_LATEST;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pipeline settings.
///
/// Field names mirror the JSON form accepted by [`PipelineConfig::from_json_str`];
/// every field is optional there and falls back to its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// How long a request id is remembered after first acceptance.
    pub idempotency_ttl_ms: u64,

    /// Upper bound on one commit-and-publish call, seen from the gateway.
    /// `None` waits indefinitely.
    pub commit_timeout_ms: Option<u64>,

    /// Buffer of the broadcast notification channel.
    pub publish_channel_capacity: usize,

    /// Event vocabulary version the store accepts.
    pub vocabulary_version: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            idempotency_ttl_ms: 10_000,
            commit_timeout_ms: None,
            publish_channel_capacity: 1_024,
            vocabulary_version: crate::model::VOCABULARY_V1,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn idempotency_ttl(mut self, ttl: Duration) -> Self {
        self.idempotency_ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn commit_timeout(mut self, timeout: Duration) -> Self {
        self.commit_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn publish_channel_capacity(mut self, capacity: usize) -> Self {
        self.publish_channel_capacity = capacity;
        self
    }

    pub fn vocabulary_version(mut self, version: u32) -> Self {
        self.vocabulary_version = version;
        self
    }

    pub fn idempotency_ttl_duration(&self) -> Duration {
        Duration::from_millis(self.idempotency_ttl_ms)
    }

    pub fn commit_timeout_duration(&self) -> Option<Duration> {
        self.commit_timeout_ms.map(Duration::from_millis)
    }

    /// Parse and validate a JSON document.
    ///
    /// # Examples
    ///
    /// ```
    /// # use tablecommit::PipelineConfig;
    /// let config = PipelineConfig::from_json_str(r#"{ "idempotency_ttl_ms": 100 }"#).unwrap();
    /// assert_eq!(config.idempotency_ttl_ms, 100);
    /// assert_eq!(config.publish_channel_capacity, 1024);
    /// ```
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idempotency_ttl_ms == 0 {
            return Err(ConfigError::Invalid(
                "idempotency_ttl_ms must be greater than zero".to_string(),
            ));
        }
        if self.publish_channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "publish_channel_capacity must be greater than zero".to_string(),
            ));
        }
        if self.commit_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "commit_timeout_ms must be greater than zero when set".to_string(),
            ));
        }
        if self.vocabulary_version == 0 || self.vocabulary_version > VOCABULARY_LATEST {
            return Err(ConfigError::Invalid(format!(
                "vocabulary_version must be between 1 and {VOCABULARY_LATEST}, got {}",
                self.vocabulary_version
            )));
        }
        Ok(())
    }
}
