// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for the orchestrator and the inference lease manager.
//!
//! Values are injected at construction time; [`Config::from_env`] is a
//! convenience for binaries.

use std::time::Duration;

use crate::space::Visibility;

/// Lease arithmetic for inference instances.
#[derive(Debug, Clone)]
pub struct LeaseConfig {
    /// Minimum remaining lifetime for an instance to be reused.
    pub min_survival_time: Duration,
    /// Extensions gaining less than this are skipped.
    pub extension_threshold: Duration,
    /// How long an instance without an expiry counts as being provisioned.
    pub provisioning_timeout: Duration,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            min_survival_time: Duration::from_secs(300),
            extension_threshold: Duration::from_secs(10),
            provisioning_timeout: Duration::from_secs(600),
        }
    }
}

/// Space creation settings.
#[derive(Debug, Clone)]
pub struct SpaceConfig {
    /// Repository visibility when the request does not set one.
    pub default_visibility: Visibility,
    /// Directory of the boot file inside the repository.
    pub boot_file_dir: String,
    /// Name of the boot file.
    pub boot_file_name: String,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            default_visibility: Visibility::Public,
            boot_file_dir: String::new(),
            boot_file_name: "app.py".to_string(),
        }
    }
}

/// spacehub-core configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Lease settings.
    pub lease: LeaseConfig,
    /// Space settings.
    pub space: SpaceConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `SPACEHUB_MIN_SURVIVAL_SECS` (default: 300)
    /// - `SPACEHUB_EXTENSION_THRESHOLD_SECS` (default: 10)
    /// - `SPACEHUB_PROVISIONING_TIMEOUT_SECS` (default: 600)
    /// - `SPACEHUB_DEFAULT_VISIBILITY`: `public` or `private` (default: public)
    /// - `SPACEHUB_BOOT_FILE_DIR` (default: empty)
    /// - `SPACEHUB_BOOT_FILE` (default: `app.py`)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let lease = LeaseConfig {
            min_survival_time: secs_var(
                "SPACEHUB_MIN_SURVIVAL_SECS",
                defaults.lease.min_survival_time,
            )?,
            extension_threshold: secs_var(
                "SPACEHUB_EXTENSION_THRESHOLD_SECS",
                defaults.lease.extension_threshold,
            )?,
            provisioning_timeout: secs_var(
                "SPACEHUB_PROVISIONING_TIMEOUT_SECS",
                defaults.lease.provisioning_timeout,
            )?,
        };

        let default_visibility = match std::env::var("SPACEHUB_DEFAULT_VISIBILITY") {
            Ok(v) if v == "public" => Visibility::Public,
            Ok(v) if v == "private" => Visibility::Private,
            Ok(_) => {
                return Err(ConfigError::Invalid(
                    "SPACEHUB_DEFAULT_VISIBILITY",
                    "must be 'public' or 'private'",
                ));
            }
            Err(_) => defaults.space.default_visibility,
        };

        let boot_file_dir = std::env::var("SPACEHUB_BOOT_FILE_DIR")
            .unwrap_or_else(|_| defaults.space.boot_file_dir.clone());
        let boot_file_name = std::env::var("SPACEHUB_BOOT_FILE")
            .unwrap_or_else(|_| defaults.space.boot_file_name.clone());
        if boot_file_name.is_empty() {
            return Err(ConfigError::Invalid(
                "SPACEHUB_BOOT_FILE",
                "must not be empty",
            ));
        }

        Ok(Self {
            lease,
            space: SpaceConfig {
                default_visibility,
                boot_file_dir,
                boot_file_name,
            },
        })
    }
}

fn secs_var(name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::Invalid(name, "must be a non-negative integer")),
        Err(_) => Ok(default),
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

    const ALL_VARS: [&str; 6] = [
        "SPACEHUB_MIN_SURVIVAL_SECS",
        "SPACEHUB_EXTENSION_THRESHOLD_SECS",
        "SPACEHUB_PROVISIONING_TIMEOUT_SECS",
        "SPACEHUB_DEFAULT_VISIBILITY",
        "SPACEHUB_BOOT_FILE_DIR",
        "SPACEHUB_BOOT_FILE",
    ];

    #[test]
    fn test_config_from_env_with_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        for var in ALL_VARS {
            guard.remove(var);
        }

        let config = Config::from_env().unwrap();

        assert_eq!(config.lease.min_survival_time, Duration::from_secs(300));
        assert_eq!(config.lease.extension_threshold, Duration::from_secs(10));
        assert_eq!(config.lease.provisioning_timeout, Duration::from_secs(600));
        assert_eq!(config.space.default_visibility, Visibility::Public);
        assert_eq!(config.space.boot_file_name, "app.py");
        assert!(config.space.boot_file_dir.is_empty());
    }

    #[test]
    fn test_config_from_env_custom() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        for var in ALL_VARS {
            guard.remove(var);
        }
        guard.set("SPACEHUB_MIN_SURVIVAL_SECS", "60");
        guard.set("SPACEHUB_EXTENSION_THRESHOLD_SECS", "5");
        guard.set("SPACEHUB_DEFAULT_VISIBILITY", "private");
        guard.set("SPACEHUB_BOOT_FILE_DIR", "inference");
        guard.set("SPACEHUB_BOOT_FILE", "serve.py");

        let config = Config::from_env().unwrap();

        assert_eq!(config.lease.min_survival_time, Duration::from_secs(60));
        assert_eq!(config.lease.extension_threshold, Duration::from_secs(5));
        assert_eq!(config.space.default_visibility, Visibility::Private);
        assert_eq!(config.space.boot_file_dir, "inference");
        assert_eq!(config.space.boot_file_name, "serve.py");
    }

    #[test]
    fn test_config_invalid_survival_time() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        for var in ALL_VARS {
            guard.remove(var);
        }
        guard.set("SPACEHUB_MIN_SURVIVAL_SECS", "soon");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid("SPACEHUB_MIN_SURVIVAL_SECS", _)
        ));
    }

    #[test]
    fn test_config_invalid_visibility() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        for var in ALL_VARS {
            guard.remove(var);
        }
        guard.set("SPACEHUB_DEFAULT_VISIBILITY", "internal");

        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("SPACEHUB_DEFAULT_VISIBILITY"));
    }
}
