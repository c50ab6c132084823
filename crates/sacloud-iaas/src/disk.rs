//! Disks, disk plans, archives and the resources referenced by disk edits

use crate::types::{Availability, DiskConnection, EncryptionAlgorithm, Id, Provisioned, Scope};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MIB_PER_GIB: u64 = 1024;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Disk {
    pub id: Id,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub icon_id: Id,
    pub availability: Availability,
    pub connection: DiskConnection,
    pub connection_order: u32,
    pub encryption_algorithm: EncryptionAlgorithm,
    pub size_mb: u64,
    pub disk_plan_id: Id,
    pub server_id: Id,
    pub source_disk_id: Id,
    pub source_archive_id: Id,
}

impl Disk {
    pub fn size_gb(&self) -> u64 {
        self.size_mb / MIB_PER_GIB
    }
}

impl Provisioned for Disk {
    fn id(&self) -> Id {
        self.id
    }

    fn availability(&self) -> Availability {
        self.availability
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskCreateRequest {
    pub disk_plan_id: Id,
    pub size_mb: u64,
    pub connection: DiskConnection,
    pub encryption_algorithm: EncryptionAlgorithm,
    pub kms_key_id: Id,
    pub source_disk_id: Id,
    pub source_archive_id: Id,
    pub server_id: Id,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub icon_id: Id,
    /// Disks this one must not share storage with
    pub distant_from: Vec<Id>,
}

/// Fields of a disk that can be changed in place
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskUpdateRequest {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub icon_id: Id,
    pub connection: DiskConnection,
}

impl From<&Disk> for DiskUpdateRequest {
    fn from(disk: &Disk) -> Self {
        Self {
            name: disk.name.clone(),
            description: disk.description.clone(),
            tags: disk.tags.clone(),
            icon_id: disk.icon_id,
            connection: disk.connection,
        }
    }
}

/// Parameters of the provider-side disk edit ("modify disk") feature
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskEditRequest {
    pub background: bool,
    pub password: String,
    pub ssh_keys: Vec<DiskEditSshKey>,
    pub disable_pw_auth: bool,
    pub enable_dhcp: bool,
    pub change_partition_uuid: bool,
    pub host_name: String,
    pub notes: Vec<DiskEditNote>,
    pub user_ip_address: Option<String>,
    pub user_subnet: Option<DiskEditUserSubnet>,
}

/// Either a registered key (`id`) or an inline public key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskEditSshKey {
    pub id: Id,
    pub public_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskEditNote {
    pub id: Id,
    pub api_key_id: Id,
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskEditUserSubnet {
    pub network_mask_len: u8,
    pub default_route: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskPlan {
    pub id: Id,
    pub name: String,
    pub sizes: Vec<DiskPlanSize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskPlanSize {
    pub availability: Availability,
    pub size_mb: u64,
}

impl DiskPlanSize {
    pub fn size_gb(&self) -> u64 {
        self.size_mb / MIB_PER_GIB
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Archive {
    pub id: Id,
    pub name: String,
    pub scope: Scope,
    pub tags: Vec<String>,
    pub availability: Availability,
    pub size_mb: u64,
}

impl Archive {
    pub fn has_tags(&self, tags: &[&str]) -> bool {
        tags.iter().all(|t| self.tags.iter().any(|own| own == t))
    }
}

/// Archive search criteria. Every listed tag must be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveFindRequest {
    pub scope: Option<Scope>,
    pub tags: Vec<String>,
}

/// Startup script
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: Id,
    pub name: String,
    pub class: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteCreateRequest {
    pub name: String,
    pub class: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKey {
    pub id: Id,
    pub name: String,
    pub public_key: String,
}
