//! Create-with-rollback orchestration
//!
//! ```text
//! Create ─▶ WaitForCopy? ─▶ ProvisionBeforeUp ─▶ WaitForUp? ─▶ Read
//!   ▲            │ failed
//!   └─ Delete ◀──┘ (up to retry_count attempts)
//! ```
//!
//! Only a copy that ends in the failed state is deleted and recreated.
//! Errors from `provision_before_up` leave the resource in place and are
//! returned together with it.

pub mod options;

pub use options::SetupOptions;

use crate::error::{PartialFailure, Result, ServiceError};
use crate::wait;
use async_trait::async_trait;
use sacloud_iaas::{Id, Provisioned};
use tracing::{debug, info, warn};

/// Resource specific steps driven by [`RetryableSetup`]
#[async_trait]
pub trait SetupHandler: Send + Sync {
    type Resource: Provisioned + Send + Sync;

    async fn create(&self, zone: &str) -> sacloud_iaas::Result<Self::Resource>;

    /// Side effects between the copy and the boot (NICs, settings, ...).
    /// Not retried.
    async fn provision_before_up(&self, _zone: &str, _resource: &Self::Resource) -> Result<()> {
        Ok(())
    }

    async fn read(&self, zone: &str, id: Id) -> sacloud_iaas::Result<Self::Resource>;

    async fn delete(&self, zone: &str, id: Id) -> sacloud_iaas::Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct RetryableSetup {
    pub options: SetupOptions,
    pub wait_for_copy: bool,
    pub wait_for_up: bool,
}

impl RetryableSetup {
    pub fn new(mut options: SetupOptions, wait_for_copy: bool, wait_for_up: bool) -> Self {
        options.init();
        Self {
            options,
            wait_for_copy,
            wait_for_up,
        }
    }

    pub async fn setup<H: SetupHandler>(
        &self,
        handler: &H,
        zone: &str,
    ) -> std::result::Result<H::Resource, PartialFailure<Option<H::Resource>>> {
        let waiter = self.options.waiter();
        let mut retried = 0u32;
        let mut last_error: Option<ServiceError> = None;

        while retried < self.options.retry_count {
            let mut resource = match handler.create(zone).await {
                Ok(created) => created,
                Err(e) => return Err(PartialFailure::empty(e)),
            };
            let id = resource.id();
            info!("Created resource: {} (attempt {})", id, retried + 1);

            if self.wait_for_copy {
                match wait::until_ready(&waiter, move || handler.read(zone, id)).await {
                    Ok(state) => resource = state,
                    Err(failure) => {
                        let copy_failed = failure
                            .partial
                            .as_ref()
                            .is_some_and(|state| state.availability().is_failed());
                        if !copy_failed {
                            return Err(failure);
                        }
                        warn!(
                            "Resource {} failed while copying, deleting and retrying ({}/{})",
                            id,
                            retried + 1,
                            self.options.retry_count
                        );
                        if let Err(e) = self.delete_with_retry(handler, zone, id).await {
                            return Err(PartialFailure::new(failure.partial, e));
                        }
                        last_error = Some(failure.error);
                        retried += 1;
                        continue;
                    }
                }
            }

            if let Err(e) = handler.provision_before_up(zone, &resource).await {
                return Err(PartialFailure::new(Some(resource), e));
            }

            if self.wait_for_up {
                resource = wait::until_up(&waiter, move || handler.read(zone, id)).await?;
            }

            return match handler.read(zone, id).await {
                Ok(refreshed) => Ok(refreshed),
                Err(e) => Err(PartialFailure::new(Some(resource), e)),
            };
        }

        Err(PartialFailure::empty(ServiceError::RetryExceeded {
            retries: retried,
            last: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempt was made".to_string()),
        }))
    }

    async fn delete_with_retry<H: SetupHandler>(
        &self,
        handler: &H,
        zone: &str,
        id: Id,
    ) -> Result<()> {
        let mut last = None;
        for attempt in 0..self.options.delete_retry_count {
            match handler.delete(zone, id).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_not_found() => return Ok(()),
                Err(e) => {
                    debug!("Delete of {} failed (attempt {}): {}", id, attempt + 1, e);
                    last = Some(e);
                    tokio::time::sleep(self.options.delete_retry_interval).await;
                }
            }
        }
        Err(match last {
            Some(e) => e.into(),
            None => ServiceError::invalid_state(format!("resource {} could not be deleted", id)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sacloud_iaas::{Availability, Disk, IaasError, InstanceStatus, Server};
    use std::sync::Mutex;
    use std::time::Duration;

    fn fast_options() -> SetupOptions {
        SetupOptions {
            polling_interval: Duration::from_millis(1),
            delete_retry_interval: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    /// Each created disk reports the availability popped from `outcomes`
    struct CopyingDisks {
        outcomes: Mutex<Vec<Availability>>,
        created: Mutex<Vec<Id>>,
        deleted: Mutex<Vec<Id>>,
        states: Mutex<Vec<(Id, Availability)>>,
        provision_error: Option<ServiceError>,
    }

    impl CopyingDisks {
        fn new(mut outcomes: Vec<Availability>) -> Self {
            outcomes.reverse();
            Self {
                outcomes: Mutex::new(outcomes),
                created: Mutex::new(vec![]),
                deleted: Mutex::new(vec![]),
                states: Mutex::new(vec![]),
                provision_error: None,
            }
        }
    }

    #[async_trait]
    impl SetupHandler for CopyingDisks {
        type Resource = Disk;

        async fn create(&self, _zone: &str) -> sacloud_iaas::Result<Disk> {
            let mut created = self.created.lock().unwrap();
            let id = Id(100 + created.len() as u64);
            created.push(id);
            let outcome = self.outcomes.lock().unwrap().pop().unwrap_or(Availability::Available);
            self.states.lock().unwrap().push((id, outcome));
            Ok(Disk {
                id,
                availability: Availability::Migrating,
                ..Default::default()
            })
        }

        async fn provision_before_up(&self, _zone: &str, _resource: &Disk) -> Result<()> {
            match &self.provision_error {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }

        async fn read(&self, _zone: &str, id: Id) -> sacloud_iaas::Result<Disk> {
            let states = self.states.lock().unwrap();
            let availability = states
                .iter()
                .find(|(sid, _)| *sid == id)
                .map(|(_, a)| *a)
                .ok_or_else(|| IaasError::NotFound(id.to_string()))?;
            Ok(Disk {
                id,
                availability,
                ..Default::default()
            })
        }

        async fn delete(&self, _zone: &str, id: Id) -> sacloud_iaas::Result<()> {
            self.deleted.lock().unwrap().push(id);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_setup_succeeds_first_time() {
        let handler = CopyingDisks::new(vec![Availability::Available]);
        let setup = RetryableSetup::new(fast_options(), true, false);
        let disk = setup.setup(&handler, "is1a").await.unwrap();
        assert_eq!(disk.id, Id(100));
        assert!(handler.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_copy_is_deleted_and_retried() {
        let handler = CopyingDisks::new(vec![Availability::Failed, Availability::Available]);
        let setup = RetryableSetup::new(fast_options(), true, false);
        let disk = setup.setup(&handler, "is1a").await.unwrap();
        assert_eq!(disk.id, Id(101));
        assert_eq!(*handler.deleted.lock().unwrap(), vec![Id(100)]);
    }

    #[tokio::test]
    async fn test_retry_exceeded() {
        let handler = CopyingDisks::new(vec![Availability::Failed; 3]);
        let setup = RetryableSetup::new(fast_options(), true, false);
        let failure = setup.setup(&handler, "is1a").await.unwrap_err();
        assert!(failure.partial.is_none());
        assert!(matches!(
            failure.error,
            ServiceError::RetryExceeded { retries: 3, .. }
        ));
        assert_eq!(handler.deleted.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_provision_error_is_not_retried() {
        let mut handler = CopyingDisks::new(vec![Availability::Available]);
        handler.provision_error = Some(ServiceError::validation("switch not ready"));
        let setup = RetryableSetup::new(fast_options(), true, false);
        let failure = setup.setup(&handler, "is1a").await.unwrap_err();
        assert_eq!(failure.partial.map(|d| d.id), Some(Id(100)));
        assert_eq!(handler.created.lock().unwrap().len(), 1);
        assert!(handler.deleted.lock().unwrap().is_empty());
    }

    struct BootingServer;

    #[async_trait]
    impl SetupHandler for BootingServer {
        type Resource = Server;

        async fn create(&self, _zone: &str) -> sacloud_iaas::Result<Server> {
            Ok(Server {
                id: Id(1),
                ..Default::default()
            })
        }

        async fn read(&self, _zone: &str, id: Id) -> sacloud_iaas::Result<Server> {
            Ok(Server {
                id,
                availability: Availability::Available,
                instance_status: InstanceStatus::Up,
                ..Default::default()
            })
        }

        async fn delete(&self, _zone: &str, _id: Id) -> sacloud_iaas::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_wait_for_up() {
        let setup = RetryableSetup::new(fast_options(), true, true);
        let server = setup.setup(&BootingServer, "is1a").await.unwrap();
        assert!(server.instance_status.is_up());
    }
}
