//! Provider operation traits
//!
//! One narrow trait per resource kind. The transport behind them (HTTP
//! client, authentication, rate limiting) is out of scope for this crate;
//! implementations are supplied by the caller, and tests substitute fakes.

use crate::disk::{
    Archive, ArchiveFindRequest, Disk, DiskCreateRequest, DiskEditRequest, DiskPlan,
    DiskUpdateRequest, Note, NoteCreateRequest, SshKey,
};
use crate::error::Result;
use crate::mobile_gateway::{
    MobileGateway, MobileGatewayCreateRequest, MobileGatewayDnsSetting, MobileGatewaySim,
    MobileGatewaySimRoute, MobileGatewayTrafficControl, MobileGatewayUpdateRequest,
    MobileGatewayUpdateSettingsRequest, ZoneInfo,
};
use crate::server::{
    InterfaceCreateRequest, InterfaceUpdateRequest, InterfaceView, PacketFilter, Server,
    ServerBootRequest, ServerChangePlanRequest, ServerCreateRequest, ServerPlan,
    ServerUpdateRequest, Switch,
};
use crate::types::Id;
use crate::vpc_router::{
    VpcRouter, VpcRouterCreateRequest, VpcRouterUpdateRequest, VpcRouterUpdateSettingsRequest,
};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait ArchiveApi: Send + Sync {
    async fn find(&self, zone: &str, req: &ArchiveFindRequest) -> Result<Vec<Archive>>;

    async fn read(&self, zone: &str, id: Id) -> Result<Archive>;
}

#[async_trait]
pub trait DiskApi: Send + Sync {
    async fn create(&self, zone: &str, req: &DiskCreateRequest) -> Result<Disk>;

    /// Create a disk and apply the edit parameters once its copy completes
    async fn create_with_config(
        &self,
        zone: &str,
        req: &DiskCreateRequest,
        edit: &DiskEditRequest,
        boot_at_available: bool,
    ) -> Result<Disk>;

    async fn read(&self, zone: &str, id: Id) -> Result<Disk>;

    async fn update(&self, zone: &str, id: Id, req: &DiskUpdateRequest) -> Result<Disk>;

    async fn delete(&self, zone: &str, id: Id) -> Result<()>;

    /// Apply edit parameters to an existing disk
    async fn config(&self, zone: &str, id: Id, edit: &DiskEditRequest) -> Result<()>;

    async fn connect_to_server(&self, zone: &str, id: Id, server_id: Id) -> Result<()>;

    async fn disconnect_from_server(&self, zone: &str, id: Id) -> Result<()>;
}

#[async_trait]
pub trait DiskPlanApi: Send + Sync {
    async fn read(&self, zone: &str, id: Id) -> Result<DiskPlan>;
}

/// Notes are global resources and carry no zone
#[async_trait]
pub trait NoteApi: Send + Sync {
    async fn create(&self, req: &NoteCreateRequest) -> Result<Note>;

    async fn read(&self, id: Id) -> Result<Note>;

    async fn delete(&self, id: Id) -> Result<()>;
}

#[async_trait]
pub trait SshKeyApi: Send + Sync {
    async fn read(&self, id: Id) -> Result<SshKey>;
}

#[async_trait]
pub trait ServerApi: Send + Sync {
    async fn create(&self, zone: &str, req: &ServerCreateRequest) -> Result<Server>;

    async fn read(&self, zone: &str, id: Id) -> Result<Server>;

    async fn update(&self, zone: &str, id: Id, req: &ServerUpdateRequest) -> Result<Server>;

    async fn delete(&self, zone: &str, id: Id) -> Result<()>;

    /// Change the plan. The provider assigns a new ID to the server.
    async fn change_plan(
        &self,
        zone: &str,
        id: Id,
        req: &ServerChangePlanRequest,
    ) -> Result<Server>;

    async fn boot(&self, zone: &str, id: Id, req: &ServerBootRequest) -> Result<()>;

    async fn shutdown(&self, zone: &str, id: Id, force: bool) -> Result<()>;

    async fn insert_cdrom(&self, zone: &str, id: Id, cdrom_id: Id) -> Result<()>;

    async fn eject_cdrom(&self, zone: &str, id: Id, cdrom_id: Id) -> Result<()>;
}

#[async_trait]
pub trait ServerPlanApi: Send + Sync {
    async fn find(&self, zone: &str) -> Result<Vec<ServerPlan>>;
}

#[async_trait]
pub trait SwitchApi: Send + Sync {
    async fn read(&self, zone: &str, id: Id) -> Result<Switch>;
}

#[async_trait]
pub trait PacketFilterApi: Send + Sync {
    async fn read(&self, zone: &str, id: Id) -> Result<PacketFilter>;
}

#[async_trait]
pub trait InterfaceApi: Send + Sync {
    async fn create(&self, zone: &str, req: &InterfaceCreateRequest) -> Result<InterfaceView>;

    async fn update(
        &self,
        zone: &str,
        id: Id,
        req: &InterfaceUpdateRequest,
    ) -> Result<InterfaceView>;

    async fn delete(&self, zone: &str, id: Id) -> Result<()>;

    async fn connect_to_shared_segment(&self, zone: &str, id: Id) -> Result<()>;

    async fn connect_to_switch(&self, zone: &str, id: Id, switch_id: Id) -> Result<()>;

    async fn disconnect_from_switch(&self, zone: &str, id: Id) -> Result<()>;

    async fn connect_to_packet_filter(&self, zone: &str, id: Id, packet_filter_id: Id)
    -> Result<()>;

    async fn disconnect_from_packet_filter(&self, zone: &str, id: Id) -> Result<()>;
}

#[async_trait]
pub trait MobileGatewayApi: Send + Sync {
    async fn create(&self, zone: &str, req: &MobileGatewayCreateRequest) -> Result<MobileGateway>;

    async fn read(&self, zone: &str, id: Id) -> Result<MobileGateway>;

    async fn update(
        &self,
        zone: &str,
        id: Id,
        req: &MobileGatewayUpdateRequest,
    ) -> Result<MobileGateway>;

    async fn update_settings(
        &self,
        zone: &str,
        id: Id,
        req: &MobileGatewayUpdateSettingsRequest,
    ) -> Result<MobileGateway>;

    async fn delete(&self, zone: &str, id: Id) -> Result<()>;

    /// Reload the settings on the running appliance
    async fn config(&self, zone: &str, id: Id) -> Result<()>;

    async fn boot(&self, zone: &str, id: Id) -> Result<()>;

    async fn shutdown(&self, zone: &str, id: Id, force: bool) -> Result<()>;

    async fn connect_to_switch(&self, zone: &str, id: Id, switch_id: Id) -> Result<()>;

    async fn disconnect_from_switch(&self, zone: &str, id: Id) -> Result<()>;

    async fn get_dns(&self, zone: &str, id: Id) -> Result<MobileGatewayDnsSetting>;

    async fn set_dns(&self, zone: &str, id: Id, dns: &MobileGatewayDnsSetting) -> Result<()>;

    async fn get_sim_routes(&self, zone: &str, id: Id) -> Result<Vec<MobileGatewaySimRoute>>;

    async fn set_sim_routes(
        &self,
        zone: &str,
        id: Id,
        routes: &[MobileGatewaySimRoute],
    ) -> Result<()>;

    async fn list_sims(&self, zone: &str, id: Id) -> Result<Vec<MobileGatewaySim>>;

    async fn add_sim(&self, zone: &str, id: Id, sim_id: Id) -> Result<()>;

    async fn delete_sim(&self, zone: &str, id: Id, sim_id: Id) -> Result<()>;

    /// Returns a not-found error when no traffic config has been set
    async fn get_traffic_config(&self, zone: &str, id: Id) -> Result<MobileGatewayTrafficControl>;

    async fn set_traffic_config(
        &self,
        zone: &str,
        id: Id,
        config: &MobileGatewayTrafficControl,
    ) -> Result<()>;

    async fn delete_traffic_config(&self, zone: &str, id: Id) -> Result<()>;
}

/// SIMs are global resources and carry no zone
#[async_trait]
pub trait SimApi: Send + Sync {
    async fn assign_ip(&self, id: Id, ip: &str) -> Result<()>;

    async fn clear_ip(&self, id: Id) -> Result<()>;
}

#[async_trait]
pub trait ZoneApi: Send + Sync {
    async fn read(&self, id: Id) -> Result<ZoneInfo>;
}

#[async_trait]
pub trait VpcRouterApi: Send + Sync {
    async fn create(&self, zone: &str, req: &VpcRouterCreateRequest) -> Result<VpcRouter>;

    async fn read(&self, zone: &str, id: Id) -> Result<VpcRouter>;

    async fn update(&self, zone: &str, id: Id, req: &VpcRouterUpdateRequest) -> Result<VpcRouter>;

    async fn update_settings(
        &self,
        zone: &str,
        id: Id,
        req: &VpcRouterUpdateSettingsRequest,
    ) -> Result<VpcRouter>;

    async fn delete(&self, zone: &str, id: Id) -> Result<()>;

    /// Reload the settings on the running appliance
    async fn config(&self, zone: &str, id: Id) -> Result<()>;

    async fn boot(&self, zone: &str, id: Id) -> Result<()>;

    async fn shutdown(&self, zone: &str, id: Id, force: bool) -> Result<()>;

    async fn connect_to_switch(&self, zone: &str, id: Id, nic_index: usize, switch_id: Id)
    -> Result<()>;

    async fn disconnect_from_switch(&self, zone: &str, id: Id, nic_index: usize) -> Result<()>;
}

/// Hands out the per-resource operation sets
///
/// Builders take what they need from this once, at construction time.
pub trait ApiCaller: Send + Sync {
    fn archive(&self) -> Arc<dyn ArchiveApi>;

    fn disk(&self) -> Arc<dyn DiskApi>;

    fn disk_plan(&self) -> Arc<dyn DiskPlanApi>;

    fn note(&self) -> Arc<dyn NoteApi>;

    fn ssh_key(&self) -> Arc<dyn SshKeyApi>;

    fn server(&self) -> Arc<dyn ServerApi>;

    fn server_plan(&self) -> Arc<dyn ServerPlanApi>;

    fn switch(&self) -> Arc<dyn SwitchApi>;

    fn packet_filter(&self) -> Arc<dyn PacketFilterApi>;

    fn interface(&self) -> Arc<dyn InterfaceApi>;

    fn mobile_gateway(&self) -> Arc<dyn MobileGatewayApi>;

    fn sim(&self) -> Arc<dyn SimApi>;

    fn zone(&self) -> Arc<dyn ZoneApi>;

    fn vpc_router(&self) -> Arc<dyn VpcRouterApi>;
}
