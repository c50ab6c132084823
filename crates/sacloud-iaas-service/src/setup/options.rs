//! Options shared by the retryable setup and the appliance builders

use crate::wait::{DEFAULT_POLLING_INTERVAL, DEFAULT_TIMEOUT, PollingWaiter};
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_NIC_UPDATE_WAIT: Duration = Duration::from_secs(5);
pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_DELETE_RETRY_COUNT: u32 = 10;
pub const DEFAULT_DELETE_RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Retry, polling and boot settings
///
/// Durations are read as milliseconds when deserialized. Zero values are
/// replaced with the defaults by [`SetupOptions::init`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SetupOptions {
    /// Boot the resource once it has been built
    pub boot_after_build: bool,

    /// Settle time after connecting or disconnecting a NIC
    #[serde(rename = "nic_update_wait_ms", deserialize_with = "duration_ms")]
    pub nic_update_wait: Duration,

    /// Creation attempts before giving up
    pub retry_count: u32,

    pub delete_retry_count: u32,

    #[serde(rename = "delete_retry_interval_ms", deserialize_with = "duration_ms")]
    pub delete_retry_interval: Duration,

    #[serde(rename = "polling_interval_ms", deserialize_with = "duration_ms")]
    pub polling_interval: Duration,

    /// Upper bound of every single wait
    #[serde(rename = "timeout_ms", deserialize_with = "duration_ms")]
    pub timeout: Duration,
}

impl Default for SetupOptions {
    fn default() -> Self {
        Self {
            boot_after_build: false,
            nic_update_wait: DEFAULT_NIC_UPDATE_WAIT,
            retry_count: DEFAULT_RETRY_COUNT,
            delete_retry_count: DEFAULT_DELETE_RETRY_COUNT,
            delete_retry_interval: DEFAULT_DELETE_RETRY_INTERVAL,
            polling_interval: DEFAULT_POLLING_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl SetupOptions {
    pub fn with_boot_after_build(boot_after_build: bool) -> Self {
        Self {
            boot_after_build,
            ..Default::default()
        }
    }

    /// Replace unset (zero) values with the defaults
    pub fn init(&mut self) {
        if self.nic_update_wait.is_zero() {
            self.nic_update_wait = DEFAULT_NIC_UPDATE_WAIT;
        }
        if self.retry_count == 0 {
            self.retry_count = DEFAULT_RETRY_COUNT;
        }
        if self.delete_retry_count == 0 {
            self.delete_retry_count = DEFAULT_DELETE_RETRY_COUNT;
        }
        if self.delete_retry_interval.is_zero() {
            self.delete_retry_interval = DEFAULT_DELETE_RETRY_INTERVAL;
        }
        if self.polling_interval.is_zero() {
            self.polling_interval = DEFAULT_POLLING_INTERVAL;
        }
        if self.timeout.is_zero() {
            self.timeout = DEFAULT_TIMEOUT;
        }
        debug!("Setup options: {:?}", self);
    }

    pub fn waiter(&self) -> PollingWaiter {
        PollingWaiter::new(self.polling_interval, self.timeout)
    }
}

fn duration_ms<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}
