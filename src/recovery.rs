use crate::config::DetectorConfig;
use crate::error::SourceError;
use std::time::Duration;
use tracing::{error, info, warn};

/// Recovery action to take after a failed read
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// Retry after a delay
    RetryAfterDelay(Duration),
    /// Stop using the source
    GiveUp,
}

/// Recovery strategy configuration
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of consecutive failures, `None` retries forever
    pub max_retries: Option<u32>,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Whether to use exponential backoff
    pub exponential_backoff: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: None,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            exponential_backoff: false,
        }
    }
}

impl From<&DetectorConfig> for RecoveryConfig {
    fn from(config: &DetectorConfig) -> Self {
        Self {
            max_retries: config.max_read_failures,
            base_delay: config.read_backoff(),
            max_delay: config.read_backoff(),
            exponential_backoff: false,
        }
    }
}

/// Tracks consecutive read failures for one source
#[derive(Debug)]
pub struct ReadRecovery {
    config: RecoveryConfig,
    consecutive_failures: u32,
    label: String,
}

impl ReadRecovery {
    pub fn new<S: Into<String>>(label: S, config: RecoveryConfig) -> Self {
        Self {
            config,
            consecutive_failures: 0,
            label: label.into(),
        }
    }

    /// Determine what to do about a failed read
    pub fn on_failure(&mut self, error: &SourceError) -> RecoveryAction {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        if let Some(max) = self.config.max_retries {
            if self.consecutive_failures > max {
                error!(
                    "Maximum consecutive read failures ({}) exceeded for {}: {}",
                    max, self.label, error
                );
                return RecoveryAction::GiveUp;
            }
        }

        let delay = self.calculate_delay(self.consecutive_failures - 1);
        warn!(
            "Read failed for {} (attempt {}): {}, retrying in {:?}",
            self.label, self.consecutive_failures, error, delay
        );
        RecoveryAction::RetryAfterDelay(delay)
    }

    /// Reset the failure count after a successful read
    pub fn on_success(&mut self) {
        if self.consecutive_failures > 0 {
            info!(
                "{} recovered after {} failed reads",
                self.label, self.consecutive_failures
            );
            self.consecutive_failures = 0;
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    fn calculate_delay(&self, retry_count: u32) -> Duration {
        if !self.config.exponential_backoff {
            return self.config.base_delay;
        }

        let factor = 2u32.saturating_pow(retry_count.min(16));
        self.config
            .base_delay
            .saturating_mul(factor)
            .min(self.config.max_delay)
    }
}
