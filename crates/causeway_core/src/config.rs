//! # Spawner Configuration
//!
//! Loaded once at startup, either built in code or parsed from TOML:
//!
//! ```toml
//! name_prefix = "ingest"
//! stack_size = 262144
//! record_failures = true
//! max_recorded_failures = 64
//! ```
//!
//! Keys that are left out keep their default value.

use serde::Deserialize;

use crate::error::{CoreError, CoreResult};

/// Configuration for a [`Spawner`](crate::task::Spawner).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpawnConfig {
    /// Prefix for OS thread names. The task id is appended.
    pub name_prefix: String,
    /// Stack size for spawned threads in bytes. `None` keeps the OS default.
    pub stack_size: Option<usize>,
    /// Whether panicking task bodies are kept for [`Spawner::take_failures`].
    ///
    /// [`Spawner::take_failures`]: crate::task::Spawner::take_failures
    pub record_failures: bool,
    /// Upper bound on retained failure records. The oldest are dropped first.
    pub max_recorded_failures: usize,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            name_prefix: "causeway-task".to_string(),
            stack_size: None,
            record_failures: true,
            max_recorded_failures: 1024,
        }
    }
}

impl SpawnConfig {
    /// Small-stack config for spawning many short-lived tasks.
    ///
    /// 256 KiB is enough for bodies that do not recurse deeply.
    #[must_use]
    pub fn lightweight() -> Self {
        Self {
            stack_size: Some(256 * 1024),
            ..Self::default()
        }
    }

    /// Parses a config from TOML text and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] on malformed TOML, unknown keys,
    /// or values rejected by [`SpawnConfig::validate`].
    pub fn from_toml_str(text: &str) -> CoreResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| CoreError::InvalidConfig(format!("spawn config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that TOML cannot express as invalid on its own.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] for a zero stack size or an empty
    /// thread name prefix.
    pub fn validate(&self) -> CoreResult<()> {
        if self.stack_size == Some(0) {
            return Err(CoreError::InvalidConfig(
                "stack_size must be greater than zero".to_string(),
            ));
        }
        if self.name_prefix.is_empty() {
            return Err(CoreError::InvalidConfig(
                "name_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
