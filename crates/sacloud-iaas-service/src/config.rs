//! Environment driven configuration

use crate::error::{Result, ServiceError};
use crate::setup::SetupOptions;
use std::time::Duration;

pub const DEFAULT_ZONE: &str = "is1a";

/// Default zone and setup options for the services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub zone: String,
    pub setup: SetupOptions,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            zone: DEFAULT_ZONE.to_string(),
            setup: SetupOptions::default(),
        }
    }
}

impl ServiceConfig {
    /// Read the configuration from `SAKURACLOUD_*` environment variables
    ///
    /// Unset variables keep their defaults; set but unparsable ones are errors.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(zone) = std::env::var("SAKURACLOUD_ZONE") {
            if !zone.trim().is_empty() {
                config.zone = zone.trim().to_string();
            }
        }
        if let Some(ms) = env_u64("SAKURACLOUD_POLLING_INTERVAL_MS")? {
            config.setup.polling_interval = Duration::from_millis(ms);
        }
        if let Some(sec) = env_u64("SAKURACLOUD_TIMEOUT_SEC")? {
            config.setup.timeout = Duration::from_secs(sec);
        }
        if let Some(retry) = env_u64("SAKURACLOUD_RETRY_MAX")? {
            config.setup.retry_count = u32::try_from(retry).map_err(|_| {
                ServiceError::validation(format!("SAKURACLOUD_RETRY_MAX is too large: {}", retry))
            })?;
        }
        if let Some(ms) = env_u64("SAKURACLOUD_NIC_UPDATE_WAIT_MS")? {
            config.setup.nic_update_wait = Duration::from_millis(ms);
        }

        config.setup.init();
        Ok(config)
    }

    /// `zone` unless empty, otherwise the configured default
    pub fn zone_or_default<'a>(&'a self, zone: &'a str) -> &'a str {
        if zone.is_empty() { &self.zone } else { zone }
    }
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ServiceError::validation(format!("{} must be a number: {}", name, value))),
        Err(_) => Ok(None),
    }
}
