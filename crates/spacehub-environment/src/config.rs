// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for spacehub-environment.

use std::time::Duration;

/// Environment configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Core settings (lease arithmetic, Space defaults).
    pub core: spacehub_core::Config,
    /// Capacity of the outbound event channel.
    pub event_channel_capacity: usize,
    /// NPU units each user gets in standalone mode.
    pub standalone_npu_quota: u32,
    /// Survival time the standalone compute manager grants.
    pub standalone_survival_time: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core: spacehub_core::Config::default(),
            event_channel_capacity: 1024,
            standalone_npu_quota: 1,
            standalone_survival_time: Duration::from_secs(3600),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Reads the `SPACEHUB_*` core variables plus:
    /// - `SPACEHUB_EVENT_CHANNEL_CAPACITY` (default: 1024)
    /// - `SPACEHUB_STANDALONE_NPU_QUOTA` (default: 1)
    /// - `SPACEHUB_STANDALONE_SURVIVAL_SECS` (default: 3600)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let core = spacehub_core::Config::from_env()?;

        let event_channel_capacity: usize = parse_var(
            "SPACEHUB_EVENT_CHANNEL_CAPACITY",
            defaults.event_channel_capacity,
        )?;
        if event_channel_capacity == 0 {
            return Err(ConfigError::InvalidNumber("SPACEHUB_EVENT_CHANNEL_CAPACITY"));
        }

        let standalone_npu_quota =
            parse_var("SPACEHUB_STANDALONE_NPU_QUOTA", defaults.standalone_npu_quota)?;

        let standalone_survival_time = parse_var(
            "SPACEHUB_STANDALONE_SURVIVAL_SECS",
            defaults.standalone_survival_time.as_secs(),
        )
        .map(Duration::from_secs)?;

        Ok(Self {
            core,
            event_channel_capacity,
            standalone_npu_quota,
            standalone_survival_time,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidNumber(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A core setting is invalid.
    #[error(transparent)]
    Core(#[from] spacehub_core::config::ConfigError),
    /// A numeric variable could not be parsed.
    #[error("Invalid number in {0}")]
    InvalidNumber(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            Self { vars: Vec::new() }
        }

        fn set(&mut self, key: &str, value: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::set_var(key, value) };
        }

        fn remove(&mut self, key: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::remove_var(key) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.vars.drain(..).rev() {
                // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
                unsafe {
                    match value {
                        Some(v) => env::set_var(&key, v),
                        None => env::remove_var(&key),
                    }
                }
            }
        }
    }

    fn clear(guard: &mut EnvGuard) {
        for var in [
            "SPACEHUB_EVENT_CHANNEL_CAPACITY",
            "SPACEHUB_STANDALONE_NPU_QUOTA",
            "SPACEHUB_STANDALONE_SURVIVAL_SECS",
            "SPACEHUB_MIN_SURVIVAL_SECS",
            "SPACEHUB_DEFAULT_VISIBILITY",
            "SPACEHUB_BOOT_FILE",
        ] {
            guard.remove(var);
        }
    }

    #[test]
    fn test_config_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        clear(&mut guard);

        let config = Config::from_env().unwrap();

        assert_eq!(config.event_channel_capacity, 1024);
        assert_eq!(config.standalone_npu_quota, 1);
        assert_eq!(config.standalone_survival_time, Duration::from_secs(3600));
        assert_eq!(
            config.core.lease.min_survival_time,
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_config_custom() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        clear(&mut guard);
        guard.set("SPACEHUB_EVENT_CHANNEL_CAPACITY", "16");
        guard.set("SPACEHUB_STANDALONE_NPU_QUOTA", "4");
        guard.set("SPACEHUB_MIN_SURVIVAL_SECS", "30");

        let config = Config::from_env().unwrap();

        assert_eq!(config.event_channel_capacity, 16);
        assert_eq!(config.standalone_npu_quota, 4);
        assert_eq!(config.core.lease.min_survival_time, Duration::from_secs(30));
    }

    #[test]
    fn test_config_rejects_zero_capacity() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        clear(&mut guard);
        guard.set("SPACEHUB_EVENT_CHANNEL_CAPACITY", "0");

        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::InvalidNumber("SPACEHUB_EVENT_CHANNEL_CAPACITY"))
        ));
    }

    #[test]
    fn test_config_propagates_core_errors() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        clear(&mut guard);
        guard.set("SPACEHUB_DEFAULT_VISIBILITY", "internal");

        assert!(matches!(Config::from_env(), Err(ConfigError::Core(_))));
    }
}
