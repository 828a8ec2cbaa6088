//! Demo configuration loaded from environment variables.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoConfig {
    /// Concurrent producers sharing the device.
    pub producers: usize,
    pub commands_per_producer: usize,
    /// Every n-th command fails on the device. 0 disables failures.
    pub fail_every: usize,
    /// How long the device takes per command.
    pub command_delay: Duration,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            producers: 4,
            commands_per_producer: 5,
            fail_every: 3,
            command_delay: Duration::from_millis(10),
        }
    }
}

impl DemoConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `TANDEM_PRODUCERS`: concurrent producers (default: 4, must be > 0)
    /// - `TANDEM_COMMANDS_PER_PRODUCER`: commands each producer sends (default: 5)
    /// - `TANDEM_FAIL_EVERY`: every n-th command fails, 0 = never (default: 3)
    /// - `TANDEM_COMMAND_DELAY_MS`: simulated device latency (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let producers = parse_or(&lookup, "TANDEM_PRODUCERS", defaults.producers)?;
        if producers == 0 {
            return Err(ConfigError::Invalid("TANDEM_PRODUCERS", "must be at least 1"));
        }

        let commands_per_producer = parse_or(
            &lookup,
            "TANDEM_COMMANDS_PER_PRODUCER",
            defaults.commands_per_producer,
        )?;
        let fail_every = parse_or(&lookup, "TANDEM_FAIL_EVERY", defaults.fail_every)?;
        let delay_ms = parse_or(
            &lookup,
            "TANDEM_COMMAND_DELAY_MS",
            defaults.command_delay.as_millis() as u64,
        )?;

        Ok(Self {
            producers,
            commands_per_producer,
            fail_every,
            command_delay: Duration::from_millis(delay_ms),
        })
    }

    pub fn total_commands(&self) -> usize {
        self.producers * self.commands_per_producer
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(key, "must be a non-negative integer")),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = DemoConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, DemoConfig::default());
        assert_eq!(config.total_commands(), 20);
    }

    #[test]
    fn reads_every_variable() {
        let config = DemoConfig::from_lookup(lookup(&[
            ("TANDEM_PRODUCERS", "2"),
            ("TANDEM_COMMANDS_PER_PRODUCER", " 7 "),
            ("TANDEM_FAIL_EVERY", "0"),
            ("TANDEM_COMMAND_DELAY_MS", "1"),
        ]))
        .unwrap();

        assert_eq!(config.producers, 2);
        assert_eq!(config.commands_per_producer, 7);
        assert_eq!(config.fail_every, 0);
        assert_eq!(config.command_delay, Duration::from_millis(1));
    }

    #[test]
    fn rejects_garbage_and_zero_producers() {
        let err = DemoConfig::from_lookup(lookup(&[("TANDEM_FAIL_EVERY", "often")])).unwrap_err();
        assert!(err.to_string().contains("TANDEM_FAIL_EVERY"));

        let err = DemoConfig::from_lookup(lookup(&[("TANDEM_PRODUCERS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("TANDEM_PRODUCERS", _)));
    }
}
