//! Servers, server plans and network interfaces

use crate::disk::MIB_PER_GIB;
use crate::types::{
    Availability, Commitment, DiskConnection, Id, InstanceStatus, InterfaceDriver,
    PlanGeneration, Provisioned, Scope,
};
use serde::{Deserialize, Serialize};

/// Tag prefix recording the ID a server had before a plan change
pub const PREVIOUS_ID_TAG_PREFIX: &str = "@previous-id=";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub id: Id,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub icon_id: Id,
    pub availability: Availability,
    pub instance_status: InstanceStatus,
    pub cpu: u32,
    pub memory_mb: u64,
    pub gpu: u32,
    pub server_plan_cpu_model: String,
    pub server_plan_commitment: Commitment,
    pub server_plan_generation: PlanGeneration,
    pub interface_driver: InterfaceDriver,
    pub private_host_id: Id,
    pub cdrom_id: Id,
    pub interfaces: Vec<InterfaceView>,
    pub disks: Vec<ServerConnectedDisk>,
}

impl Server {
    pub fn memory_gb(&self) -> u64 {
        self.memory_mb / MIB_PER_GIB
    }
}

impl Provisioned for Server {
    fn id(&self) -> Id {
        self.id
    }

    fn availability(&self) -> Availability {
        self.availability
    }

    fn instance_status(&self) -> InstanceStatus {
        self.instance_status
    }
}

/// A NIC as seen from its server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceView {
    pub id: Id,
    pub mac_address: String,
    pub ip_address: String,
    /// Display IP address set by the user
    pub user_ip_address: String,
    pub switch_id: Id,
    pub switch_scope: Scope,
    pub packet_filter_id: Id,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConnectedDisk {
    pub id: Id,
    pub name: String,
    pub availability: Availability,
    pub connection: DiskConnection,
    pub connection_order: u32,
    pub size_mb: u64,
    pub disk_plan_id: Id,
}

/// Upstream of a NIC slot at server creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedSwitch {
    pub id: Id,
    pub scope: Scope,
}

impl ConnectedSwitch {
    pub fn shared() -> Self {
        Self {
            id: Id::default(),
            scope: Scope::Shared,
        }
    }

    pub fn switch(id: Id) -> Self {
        Self {
            id,
            scope: Scope::User,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerCreateRequest {
    pub cpu: u32,
    pub memory_mb: u64,
    pub gpu: u32,
    pub server_plan_cpu_model: String,
    pub server_plan_commitment: Commitment,
    pub server_plan_generation: PlanGeneration,
    pub interface_driver: InterfaceDriver,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub icon_id: Id,
    pub private_host_id: Id,
    /// One slot per NIC. `None` creates the NIC without an upstream.
    pub connected_switches: Vec<Option<ConnectedSwitch>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerUpdateRequest {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub icon_id: Id,
    pub private_host_id: Id,
    pub interface_driver: InterfaceDriver,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerChangePlanRequest {
    pub cpu: u32,
    pub memory_mb: u64,
    pub gpu: u32,
    pub server_plan_cpu_model: String,
    pub server_plan_generation: PlanGeneration,
    pub server_plan_commitment: Commitment,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerBootRequest {
    /// cloud-init user data
    pub user_data: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerPlan {
    pub id: Id,
    pub name: String,
    pub cpu: u32,
    pub memory_mb: u64,
    pub gpu: u32,
    pub cpu_model: String,
    pub commitment: Commitment,
    pub generation: PlanGeneration,
    pub availability: Availability,
}

impl ServerPlan {
    pub fn memory_gb(&self) -> u64 {
        self.memory_mb / MIB_PER_GIB
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceCreateRequest {
    pub server_id: Id,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceUpdateRequest {
    pub user_ip_address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Switch {
    pub id: Id,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketFilter {
    pub id: Id,
    pub name: String,
}

/// Appends the previous-ID tag unless one is already present
pub fn append_previous_id_tag_if_absent(tags: &[String], previous: Id) -> Vec<String> {
    let mut tags = tags.to_vec();
    if !tags.iter().any(|t| t.starts_with(PREVIOUS_ID_TAG_PREFIX)) {
        tags.push(format!("{}{}", PREVIOUS_ID_TAG_PREFIX, previous));
        tags.sort();
    }
    tags
}
