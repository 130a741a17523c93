//! Executor configuration.

use std::time::Duration;

use crate::error::Error;
use crate::retry::RetryPolicy;

/// Configuration for a command executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Timeout for acquiring a physical connection.
    pub connect_timeout: Duration,

    /// Default per-command timeout, overridable per command.
    pub command_timeout: Duration,

    /// Retry policy for single-shot commands. `None` falls back to
    /// [`RetryPolicy::default`] (fixed one-second delay).
    pub retry: Option<RetryPolicy>,

    /// Application name, for log correlation.
    pub application_name: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(30),
            retry: None,
            application_name: "steadydb".to_string(),
        }
    }
}

impl ExecutorConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection acquisition timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the default per-command timeout.
    #[must_use]
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Attach a retry policy.
    #[must_use]
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Set the application name.
    #[must_use]
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), Error> {
        if self.connect_timeout.is_zero() {
            return Err(Error::Config("connect_timeout must be non-zero".into()));
        }
        if self.command_timeout.is_zero() {
            return Err(Error::Config("command_timeout must be non-zero".into()));
        }
        if let Some(policy) = &self.retry {
            if policy.base_delay.is_zero() {
                return Err(Error::Config("retry base_delay must be non-zero".into()));
            }
            if policy.max_delay < policy.base_delay {
                return Err(Error::Config(
                    "retry max_delay must be >= base_delay".into(),
                ));
            }
        }
        Ok(())
    }

    /// The effective retry policy (configured or default).
    #[must_use]
    pub fn effective_retry(&self) -> RetryPolicy {
        self.retry.clone().unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExecutorConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.command_timeout, Duration::from_secs(30));
        assert!(config.retry.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_fluent() {
        let config = ExecutorConfig::new()
            .connect_timeout(Duration::from_secs(5))
            .command_timeout(Duration::from_secs(10))
            .retry(RetryPolicy::new(5))
            .application_name("orders-service");

        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.retry.as_ref().unwrap().max_retries, 5);
        assert_eq!(config.application_name, "orders-service");
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let config = ExecutorConfig::new().connect_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = ExecutorConfig::new().command_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_delays() {
        let policy = RetryPolicy::new(1)
            .base_delay(Duration::from_secs(10))
            .max_delay(Duration::from_secs(1));
        let config = ExecutorConfig::new().retry(policy);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
