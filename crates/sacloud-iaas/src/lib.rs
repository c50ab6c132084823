//! Sakura Cloud IaaS resource model
//!
//! Typed resources, request parameters and the narrow provider operation
//! traits consumed by `sacloud-iaas-service`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              sacloud-iaas-service                │
//! │   (builders, retryable setup, polling waiter)    │
//! └─────────────────┬───────────────────────────────┘
//!                   │  Arc<dyn DiskApi>, Arc<dyn ServerApi>, ...
//! ┌─────────────────▼───────────────────────────────┐
//! │                 sacloud-iaas                     │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │   trait ApiCaller { fn disk(&self) ... }  │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │  Resources   │  │   Requests   │            │
//! │  └──────────────┘  └──────────────┘            │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │     transport (HTTP client, auth): external      │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod disk;
pub mod error;
pub mod mobile_gateway;
pub mod provider;
pub mod server;
pub mod types;
pub mod vpc_router;

// Re-exports
pub use disk::{
    Archive, ArchiveFindRequest, Disk, DiskCreateRequest, DiskEditNote, DiskEditRequest,
    DiskEditSshKey, DiskEditUserSubnet, DiskPlan, DiskPlanSize, DiskUpdateRequest, MIB_PER_GIB,
    Note, NoteCreateRequest, SshKey,
};
pub use error::{IaasError, Result};
pub use mobile_gateway::{
    ApplianceInterface, MobileGateway, MobileGatewayCreateRequest, MobileGatewayDnsSetting,
    MobileGatewayInterfaceSetting, MobileGatewaySim, MobileGatewaySimRoute,
    MobileGatewayStaticRoute, MobileGatewayTrafficControl, MobileGatewayUpdateRequest,
    MobileGatewayUpdateSettingsRequest, Region, ZoneInfo,
};
pub use provider::{
    ApiCaller, ArchiveApi, DiskApi, DiskPlanApi, InterfaceApi, MobileGatewayApi, NoteApi,
    PacketFilterApi, ServerApi, ServerPlanApi, SimApi, SshKeyApi, SwitchApi, VpcRouterApi,
    ZoneApi,
};
pub use server::{
    ConnectedSwitch, InterfaceCreateRequest, InterfaceUpdateRequest, InterfaceView,
    PREVIOUS_ID_TAG_PREFIX, PacketFilter, Server, ServerBootRequest, ServerChangePlanRequest,
    ServerConnectedDisk, ServerCreateRequest, ServerPlan, ServerUpdateRequest, Switch,
    append_previous_id_tag_if_absent,
};
pub use types::{
    Availability, Commitment, DiskConnection, EncryptionAlgorithm, Id, InstanceStatus,
    InterfaceDriver, OsType, PlanGeneration, Provisioned, Scope, UpstreamNetworkType,
    VpcRouterPlan,
};
pub use vpc_router::{
    FirewallAction, PortForwardingProtocol, VpcRouter, VpcRouterCreateRequest,
    VpcRouterDhcpServer, VpcRouterDhcpStaticMapping, VpcRouterDnsForwarding, VpcRouterFirewall,
    VpcRouterFirewallRule, VpcRouterInterfaceSetting, VpcRouterL2tpIpsecServer,
    VpcRouterPortForwarding, VpcRouterPptpServer, VpcRouterRemoteAccessUser, VpcRouterSettings,
    VpcRouterSiteToSiteIpsecVpn, VpcRouterStaticNat, VpcRouterStaticRoute, VpcRouterUpdateRequest,
    VpcRouterUpdateSettingsRequest, VpcRouterWireGuard, VpcRouterWireGuardPeer,
};
