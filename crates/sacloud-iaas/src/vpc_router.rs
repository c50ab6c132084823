//! VPC routers and their router settings

use crate::mobile_gateway::ApplianceInterface;
use crate::server::ConnectedSwitch;
use crate::types::{Availability, Id, InstanceStatus, Provisioned, VpcRouterPlan};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VpcRouter {
    pub id: Id,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub icon_id: Id,
    pub plan: VpcRouterPlan,
    pub version: u32,
    pub availability: Availability,
    pub instance_status: InstanceStatus,
    pub interfaces: Vec<ApplianceInterface>,
    pub settings: VpcRouterSettings,
    pub settings_hash: String,
}

impl VpcRouter {
    pub fn interface(&self, index: usize) -> Option<&ApplianceInterface> {
        self.interfaces.iter().find(|nic| nic.index == index)
    }
}

impl Provisioned for VpcRouter {
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

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcRouterSettings {
    pub vrid: u32,
    pub internet_connection_enabled: bool,
    pub interfaces: Vec<VpcRouterInterfaceSetting>,
    pub static_nat: Vec<VpcRouterStaticNat>,
    pub port_forwarding: Vec<VpcRouterPortForwarding>,
    pub firewall: Vec<VpcRouterFirewall>,
    pub dhcp_server: Vec<VpcRouterDhcpServer>,
    pub dhcp_static_mapping: Vec<VpcRouterDhcpStaticMapping>,
    pub dns_forwarding: Option<VpcRouterDnsForwarding>,
    pub pptp_server: Option<VpcRouterPptpServer>,
    pub l2tp_ipsec_server: Option<VpcRouterL2tpIpsecServer>,
    pub wire_guard: Option<VpcRouterWireGuard>,
    pub remote_access_users: Vec<VpcRouterRemoteAccessUser>,
    pub site_to_site_ipsec_vpn: Vec<VpcRouterSiteToSiteIpsecVpn>,
    pub static_route: Vec<VpcRouterStaticRoute>,
    pub syslog_host: String,
}

impl VpcRouterSettings {
    pub fn interface(&self, index: usize) -> Option<&VpcRouterInterfaceSetting> {
        self.interfaces.iter().find(|s| s.index == index)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcRouterInterfaceSetting {
    pub index: usize,
    pub ip_address: Vec<String>,
    pub virtual_ip_address: String,
    pub ip_aliases: Vec<String>,
    pub network_mask_len: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcRouterStaticNat {
    pub global_address: String,
    pub private_address: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortForwardingProtocol {
    #[default]
    Tcp,
    Udp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcRouterPortForwarding {
    pub protocol: PortForwardingProtocol,
    pub global_port: u16,
    pub private_address: String,
    pub private_port: u16,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcRouterFirewall {
    /// Interface index the rules apply to
    pub index: usize,
    pub send: Vec<VpcRouterFirewallRule>,
    pub receive: Vec<VpcRouterFirewallRule>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirewallAction {
    #[default]
    Allow,
    Deny,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcRouterFirewallRule {
    pub protocol: String,
    pub source_network: String,
    pub source_port: String,
    pub destination_network: String,
    pub destination_port: String,
    pub action: FirewallAction,
    pub logging: bool,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcRouterDhcpServer {
    /// Interface name such as `eth1`
    pub interface: String,
    pub range_start: String,
    pub range_stop: String,
    pub dns_servers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcRouterDhcpStaticMapping {
    pub mac_address: String,
    pub ip_address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcRouterDnsForwarding {
    pub interface: String,
    pub dns_servers: Vec<String>,
}

/// Address pool handed out to PPTP clients
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcRouterPptpServer {
    pub range_start: String,
    pub range_stop: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcRouterL2tpIpsecServer {
    pub range_start: String,
    pub range_stop: String,
    pub pre_shared_secret: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcRouterWireGuard {
    /// Server address in CIDR notation
    pub ip_address: String,
    pub peers: Vec<VpcRouterWireGuardPeer>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcRouterWireGuardPeer {
    pub name: String,
    pub ip_address: String,
    pub public_key: String,
}

/// Account shared by the PPTP and L2TP/IPsec servers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcRouterRemoteAccessUser {
    pub user_name: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcRouterSiteToSiteIpsecVpn {
    pub peer: String,
    pub remote_id: String,
    pub pre_shared_secret: String,
    /// Prefixes reachable through the peer
    pub routes: Vec<String>,
    pub local_prefix: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcRouterStaticRoute {
    pub prefix: String,
    pub next_hop: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VpcRouterCreateRequest {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub icon_id: Id,
    pub plan: VpcRouterPlan,
    pub version: u32,
    /// Upstream of eth0
    pub switch: ConnectedSwitch,
    /// Real IP addresses of eth0 (premium and higher plans)
    pub ip_addresses: Vec<String>,
    pub settings: VpcRouterSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcRouterUpdateRequest {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub icon_id: Id,
    pub settings_hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcRouterUpdateSettingsRequest {
    pub settings: VpcRouterSettings,
    pub settings_hash: String,
}
