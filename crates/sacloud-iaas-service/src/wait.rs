//! State polling
//!
//! Observes a resource through a read callback until a predicate holds, the
//! read fails with a non-transient error, the timeout elapses or the caller
//! cancels. Every failure carries the last successfully read state.

use crate::error::{PartialFailure, ServiceError};
use sacloud_iaas::{Availability, InstanceStatus, Provisioned};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Result of a wait. On failure `partial` holds the last observed state.
pub type WaitResult<T> = std::result::Result<T, PartialFailure<Option<T>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingWaiter {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollingWaiter {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLLING_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

enum Step<T> {
    Tick,
    Read(sacloud_iaas::Result<T>),
    TimedOut,
    Cancelled,
}

impl PollingWaiter {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Poll until `predicate` returns true
    pub async fn wait_for_state<T, R, Fut, P>(&self, read: R, predicate: P) -> WaitResult<T>
    where
        R: FnMut() -> Fut,
        Fut: Future<Output = sacloud_iaas::Result<T>>,
        P: FnMut(&T) -> crate::error::Result<bool>,
    {
        self.wait_for_state_until(read, predicate, std::future::pending::<()>())
            .await
    }

    /// Like [`wait_for_state`](Self::wait_for_state), stopping with
    /// `ServiceError::Cancelled` as soon as `cancel` completes
    pub async fn wait_for_state_until<T, R, Fut, P, C>(
        &self,
        mut read: R,
        mut predicate: P,
        cancel: C,
    ) -> WaitResult<T>
    where
        R: FnMut() -> Fut,
        Fut: Future<Output = sacloud_iaas::Result<T>>,
        P: FnMut(&T) -> crate::error::Result<bool>,
        C: Future<Output = ()>,
    {
        let deadline = tokio::time::sleep_until(Instant::now() + self.timeout);
        tokio::pin!(deadline);
        tokio::pin!(cancel);

        // A zero interval would make tokio::time::interval panic
        let period = self.interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last: Option<T> = None;
        let mut step = Step::Tick;
        let mut attempt = 0u32;

        loop {
            step = match step {
                Step::Tick => tokio::select! {
                    biased;
                    _ = &mut cancel => Step::Cancelled,
                    _ = &mut deadline => Step::TimedOut,
                    _ = ticker.tick() => {
                        attempt += 1;
                        tokio::select! {
                            biased;
                            _ = &mut cancel => Step::Cancelled,
                            _ = &mut deadline => Step::TimedOut,
                            res = read() => Step::Read(res),
                        }
                    }
                },
                Step::Read(Ok(state)) => match predicate(&state) {
                    Ok(true) => return Ok(state),
                    Ok(false) => {
                        debug!("Waiting for state (attempt {})", attempt);
                        last = Some(state);
                        Step::Tick
                    }
                    Err(e) => return Err(PartialFailure::new(Some(state), e)),
                },
                Step::Read(Err(e)) if e.is_transient() => {
                    debug!("Transient read error while waiting: {}", e);
                    Step::Tick
                }
                Step::Read(Err(e)) => return Err(PartialFailure::new(last, e)),
                Step::TimedOut => {
                    return Err(PartialFailure::new(last, ServiceError::Timeout(self.timeout)));
                }
                Step::Cancelled => return Err(PartialFailure::new(last, ServiceError::Cancelled)),
            };
        }
    }
}

/// Wait until the resource is available. A failed resource ends the wait.
pub async fn until_ready<T, R, Fut>(waiter: &PollingWaiter, read: R) -> WaitResult<T>
where
    T: Provisioned,
    R: FnMut() -> Fut,
    Fut: Future<Output = sacloud_iaas::Result<T>>,
{
    waiter
        .wait_for_state(read, |state: &T| match state.availability() {
            Availability::Available => Ok(true),
            Availability::Failed => Err(ServiceError::ResourceFailed {
                id: state.id().to_string(),
            }),
            _ => Ok(false),
        })
        .await
}

/// Wait until the instance is up
pub async fn until_up<T, R, Fut>(waiter: &PollingWaiter, read: R) -> WaitResult<T>
where
    T: Provisioned,
    R: FnMut() -> Fut,
    Fut: Future<Output = sacloud_iaas::Result<T>>,
{
    waiter
        .wait_for_state(read, |state: &T| {
            Ok(state.instance_status() == InstanceStatus::Up)
        })
        .await
}

/// Wait until the instance is down
pub async fn until_down<T, R, Fut>(waiter: &PollingWaiter, read: R) -> WaitResult<T>
where
    T: Provisioned,
    R: FnMut() -> Fut,
    Fut: Future<Output = sacloud_iaas::Result<T>>,
{
    waiter
        .wait_for_state(read, |state: &T| {
            Ok(state.instance_status() == InstanceStatus::Down)
        })
        .await
}
