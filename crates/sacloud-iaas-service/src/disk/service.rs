//! Request layer for standalone disks

use super::builder::{DEFAULT_DISK_SIZE_GB, DISK_PLAN_SSD, DiskBuilder, DiskSettings};
use super::client::DiskClient;
use super::director::Director;
use super::edit::UnixEditRequest;
use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};
use crate::merge::patch;
use sacloud_iaas::{ApiCaller, Disk, DiskConnection, EncryptionAlgorithm, Id, OsType};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Desired state of a disk. An empty `id` creates a new one.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApplyRequest {
    pub zone: String,
    pub id: Id,

    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub icon_id: Id,

    pub disk_plan_id: Id,
    pub connection: DiskConnection,
    pub encryption_algorithm: EncryptionAlgorithm,
    pub kms_key_id: Id,
    pub source_disk_id: Id,
    pub source_archive_id: Id,
    pub server_id: Id,
    pub size_gb: u64,
    pub distant_from: Vec<Id>,
    pub os_type: OsType,

    pub edit_parameter: Option<UnixEditRequest>,
    pub no_wait: bool,
}

impl ApplyRequest {
    /// Desired state equal to the disk as it is
    pub fn from_disk(zone: &str, disk: &Disk) -> Self {
        Self {
            zone: zone.to_string(),
            id: disk.id,
            name: disk.name.clone(),
            description: disk.description.clone(),
            tags: disk.tags.clone(),
            icon_id: disk.icon_id,
            disk_plan_id: disk.disk_plan_id,
            connection: disk.connection,
            encryption_algorithm: disk.encryption_algorithm,
            source_disk_id: disk.source_disk_id,
            source_archive_id: disk.source_archive_id,
            server_id: disk.server_id,
            size_gb: disk.size_gb(),
            ..Default::default()
        }
    }

    fn director(&self, client: DiskClient) -> Director {
        Director {
            os_type: self.os_type,
            settings: DiskSettings {
                name: self.name.clone(),
                size_gb: if self.size_gb == 0 {
                    DEFAULT_DISK_SIZE_GB
                } else {
                    self.size_gb
                },
                distant_from: self.distant_from.clone(),
                plan_id: if self.disk_plan_id.is_empty() {
                    DISK_PLAN_SSD
                } else {
                    self.disk_plan_id
                },
                connection: self.connection,
                encryption_algorithm: self.encryption_algorithm,
                kms_key_id: self.kms_key_id,
                description: self.description.clone(),
                tags: self.tags.clone(),
                icon_id: self.icon_id,
            },
            source_disk_id: self.source_disk_id,
            source_archive_id: self.source_archive_id,
            edit_parameter: self.edit_parameter.clone(),
            no_wait: self.no_wait,
            ..Director::new(client)
        }
    }

    /// Builder for this request; an existing `id` is carried into it
    pub fn builder(&self, client: DiskClient) -> DiskBuilder {
        let mut builder = self.director(client).builder();
        if !self.id.is_empty() {
            builder.set_disk_id(self.id);
        }
        builder
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CreateRequest {
    pub zone: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub icon_id: Id,
    pub disk_plan_id: Id,
    pub connection: DiskConnection,
    pub encryption_algorithm: EncryptionAlgorithm,
    pub kms_key_id: Id,
    pub source_disk_id: Id,
    pub source_archive_id: Id,
    pub server_id: Id,
    pub size_gb: u64,
    pub distant_from: Vec<Id>,
    pub os_type: OsType,
    pub edit_parameter: Option<UnixEditRequest>,
    pub no_wait: bool,
}

impl CreateRequest {
    pub fn apply_request(&self) -> ApplyRequest {
        ApplyRequest {
            zone: self.zone.clone(),
            id: Id::default(),
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            icon_id: self.icon_id,
            disk_plan_id: self.disk_plan_id,
            connection: self.connection,
            encryption_algorithm: self.encryption_algorithm,
            kms_key_id: self.kms_key_id,
            source_disk_id: self.source_disk_id,
            source_archive_id: self.source_archive_id,
            server_id: self.server_id,
            size_gb: self.size_gb,
            distant_from: self.distant_from.clone(),
            os_type: self.os_type,
            edit_parameter: self.edit_parameter.clone(),
            no_wait: self.no_wait,
        }
    }
}

/// Fields left as `None` keep their current value
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UpdateRequest {
    pub zone: String,
    pub id: Id,
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub icon_id: Option<Id>,
    pub connection: Option<DiskConnection>,
    pub edit_parameter: Option<UnixEditRequest>,
    pub no_wait: bool,
}

impl UpdateRequest {
    pub fn merge_into(&self, base: &mut ApplyRequest) {
        patch(&mut base.name, self.name.clone());
        patch(&mut base.description, self.description.clone());
        patch(&mut base.tags, self.tags.clone());
        patch(&mut base.icon_id, self.icon_id);
        patch(&mut base.connection, self.connection);
        if self.edit_parameter.is_some() {
            base.edit_parameter = self.edit_parameter.clone();
        }
        base.no_wait = self.no_wait;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReadRequest {
    pub zone: String,
    pub id: Id,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeleteRequest {
    pub zone: String,
    pub id: Id,
}

/// Disk operations over a provider
pub struct Service {
    caller: Arc<dyn ApiCaller>,
    config: ServiceConfig,
}

impl Service {
    pub fn new(caller: Arc<dyn ApiCaller>) -> Self {
        Self::with_config(caller, ServiceConfig::default())
    }

    pub fn with_config(caller: Arc<dyn ApiCaller>, config: ServiceConfig) -> Self {
        Self { caller, config }
    }

    fn client(&self) -> DiskClient {
        DiskClient::new(self.caller.as_ref())
    }

    pub async fn apply(&self, req: &ApplyRequest) -> Result<Disk> {
        let zone = self.config.zone_or_default(&req.zone);
        let mut builder = req.builder(self.client());
        builder.set_waiter(self.config.setup.waiter());
        builder.validate(zone).await?;

        let id = if req.id.is_empty() {
            builder.build(zone, req.server_id).await?.disk_id
        } else {
            builder.update(zone).await?.disk.id
        };
        Ok(self.caller.disk().read(zone, id).await?)
    }

    pub async fn create(&self, req: &CreateRequest) -> Result<Disk> {
        self.apply(&req.apply_request()).await
    }

    pub async fn read(&self, req: &ReadRequest) -> Result<Disk> {
        if req.id.is_empty() {
            return Err(ServiceError::validation("id is required"));
        }
        let zone = self.config.zone_or_default(&req.zone);
        Ok(self.caller.disk().read(zone, req.id).await?)
    }

    pub async fn update(&self, req: &UpdateRequest) -> Result<Disk> {
        if req.id.is_empty() {
            return Err(ServiceError::validation("id is required"));
        }
        let zone = self.config.zone_or_default(&req.zone);
        let current = self.caller.disk().read(zone, req.id).await?;

        let mut apply = ApplyRequest::from_disk(zone, &current);
        req.merge_into(&mut apply);
        self.apply(&apply).await
    }

    pub async fn delete(&self, req: &DeleteRequest) -> Result<()> {
        if req.id.is_empty() {
            return Err(ServiceError::validation("id is required"));
        }
        let zone = self.config.zone_or_default(&req.zone);
        info!("Deleting disk: {}", req.id);
        Ok(self.caller.disk().delete(zone, req.id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_update_request_merges_only_set_fields() {
        let disk = Disk {
            id: Id(10),
            name: "disk".into(),
            description: "keep".into(),
            tags: vec!["a".into()],
            size_mb: 40 * 1024,
            disk_plan_id: Id(4),
            ..Default::default()
        };
        let mut apply = ApplyRequest::from_disk("is1a", &disk);
        UpdateRequest {
            name: Some("renamed".into()),
            tags: Some(vec![]),
            ..Default::default()
        }
        .merge_into(&mut apply);

        assert_eq!(apply.name, "renamed");
        assert_eq!(apply.description, "keep");
        assert_eq!(apply.tags, Vec::<String>::new());
        assert_eq!(apply.size_gb, 40);
        assert_eq!(apply.id, Id(10));
    }

    #[test]
    fn test_apply_request_from_json() {
        let req: ApplyRequest = serde_json::from_str(
            r#"{"zone":"tk1a","name":"data","size_gb":100,"os_type":"custom"}"#,
        )
        .unwrap();
        assert_eq!(req.zone, "tk1a");
        assert_eq!(req.size_gb, 100);
        assert!(req.id.is_empty());
        assert!(req.edit_parameter.is_none());
    }
}
