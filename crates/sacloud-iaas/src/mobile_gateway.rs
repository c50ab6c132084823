//! Mobile gateways, SIMs and zone information

use crate::types::{Availability, Id, InstanceStatus, Provisioned, Scope};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MobileGateway {
    pub id: Id,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub icon_id: Id,
    pub availability: Availability,
    pub instance_status: InstanceStatus,
    pub zone_id: Id,
    /// Index 0 is the public side, index 1 the private side when connected
    pub interfaces: Vec<ApplianceInterface>,
    pub interface_settings: Vec<MobileGatewayInterfaceSetting>,
    pub static_routes: Vec<MobileGatewayStaticRoute>,
    pub internet_connection_enabled: bool,
    pub inter_device_communication_enabled: bool,
    pub settings_hash: String,
}

impl Provisioned for MobileGateway {
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

/// NIC of an appliance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplianceInterface {
    pub index: usize,
    pub switch_id: Id,
    pub switch_scope: Scope,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobileGatewayInterfaceSetting {
    pub index: usize,
    pub ip_address: Vec<String>,
    pub network_mask_len: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobileGatewayStaticRoute {
    pub prefix: String,
    pub next_hop: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobileGatewayCreateRequest {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub icon_id: Id,
    pub internet_connection_enabled: bool,
    pub inter_device_communication_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobileGatewayUpdateRequest {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub icon_id: Id,
    pub settings_hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobileGatewayUpdateSettingsRequest {
    pub interface_settings: Vec<MobileGatewayInterfaceSetting>,
    pub static_routes: Vec<MobileGatewayStaticRoute>,
    pub internet_connection_enabled: bool,
    pub inter_device_communication_enabled: bool,
    pub settings_hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobileGatewayDnsSetting {
    pub dns1: String,
    pub dns2: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobileGatewaySimRoute {
    pub resource_id: Id,
    pub prefix: String,
}

/// A SIM attached to a mobile gateway
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobileGatewaySim {
    pub resource_id: Id,
    pub iccid: String,
    pub ip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobileGatewayTrafficControl {
    pub traffic_quota_in_mb: u64,
    pub band_width_limit_in_kbps: u64,
    pub email_notify_enabled: bool,
    pub slack_notify_enabled: bool,
    pub slack_notify_webhooks_url: String,
    pub auto_traffic_shaping: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneInfo {
    pub id: Id,
    pub name: String,
    pub region: Region,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: Id,
    pub name: String,
    pub name_servers: Vec<String>,
}
