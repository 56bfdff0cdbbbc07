use std::time::Duration;

use pagelock_core::protocol::{
    validate_lock_ttl, DEFAULT_LOCK_TTL_SECS, PRESENCE_STALE_TIMEOUT_SECS, PRESENCE_THROTTLE_MS,
};
use pagelock_core::CoreError;

/// Default capacity of the command queue feeding the coordinator task.
const DEFAULT_COMMAND_BUFFER: usize = 256;

/// Default capacity of the UI notification channel.
const DEFAULT_EVENT_BUFFER: usize = 256;

/// Tunables for one lock coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Lifetime of an unrenewed lock.
    pub lock_ttl: Duration,
    /// Minimum spacing between applied presence touches.
    pub presence_throttle: Duration,
    /// Peers not heard from for this long drop out of the presence view.
    pub presence_stale_timeout: Duration,
    /// When set, an applied activity touch renews every self-held lock that
    /// is past half of its TTL. Off by default: locks then live exactly one
    /// TTL unless re-acquired.
    pub renew_on_activity: bool,
    pub command_buffer: usize,
    pub event_buffer: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            lock_ttl: Duration::from_secs(DEFAULT_LOCK_TTL_SECS),
            presence_throttle: Duration::from_millis(PRESENCE_THROTTLE_MS),
            presence_stale_timeout: Duration::from_secs(PRESENCE_STALE_TIMEOUT_SECS),
            renew_on_activity: false,
            command_buffer: DEFAULT_COMMAND_BUFFER,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default |
    /// |-------------------------------|---------|
    /// | `LOCK_TTL_SECS`               | `30`    |
    /// | `PRESENCE_THROTTLE_MS`        | `1000`  |
    /// | `PRESENCE_STALE_TIMEOUT_SECS` | `120`   |
    /// | `LOCK_RENEW_ON_ACTIVITY`      | `false` |
    pub fn from_env() -> Result<Self, CoreError> {
        let defaults = Self::default();

        let lock_ttl = match std::env::var("LOCK_TTL_SECS") {
            Ok(raw) => Duration::from_secs(parse_env("LOCK_TTL_SECS", &raw)?),
            Err(_) => defaults.lock_ttl,
        };

        let presence_throttle = match std::env::var("PRESENCE_THROTTLE_MS") {
            Ok(raw) => Duration::from_millis(parse_env("PRESENCE_THROTTLE_MS", &raw)?),
            Err(_) => defaults.presence_throttle,
        };

        let presence_stale_timeout = match std::env::var("PRESENCE_STALE_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(parse_env("PRESENCE_STALE_TIMEOUT_SECS", &raw)?),
            Err(_) => defaults.presence_stale_timeout,
        };

        let renew_on_activity = match std::env::var("LOCK_RENEW_ON_ACTIVITY") {
            Ok(raw) => parse_env("LOCK_RENEW_ON_ACTIVITY", &raw)?,
            Err(_) => defaults.renew_on_activity,
        };

        let config = Self {
            lock_ttl,
            presence_throttle,
            presence_stale_timeout,
            renew_on_activity,
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        validate_lock_ttl(self.lock_ttl.as_secs())?;
        if self.command_buffer == 0 || self.event_buffer == 0 {
            return Err(CoreError::Validation(
                "command_buffer and event_buffer must be non-zero".into(),
            ));
        }
        if self.presence_stale_timeout.is_zero() {
            return Err(CoreError::Validation(
                "presence_stale_timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, CoreError> {
    raw.trim()
        .parse()
        .map_err(|_| CoreError::Validation(format!("{name} has an invalid value '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CoordinatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lock_ttl, Duration::from_secs(30));
        assert!(!config.renew_on_activity);
    }

    #[test]
    fn sub_second_ttl_is_rejected() {
        let config = CoordinatorConfig {
            lock_ttl: Duration::from_millis(500),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_buffers_are_rejected() {
        let config = CoordinatorConfig {
            command_buffer: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_stale_timeout_is_rejected() {
        let config = CoordinatorConfig {
            presence_stale_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_env_reports_the_variable() {
        let err = parse_env::<u64>("LOCK_TTL_SECS", "soon").unwrap_err();
        assert!(err.to_string().contains("LOCK_TTL_SECS"));
        assert_eq!(parse_env::<u64>("LOCK_TTL_SECS", " 45 ").unwrap(), 45);
    }
}
