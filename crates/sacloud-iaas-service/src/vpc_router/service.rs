//! Request layer for VPC routers

use super::builder::{DEFAULT_VERSION, RouterSetting, VpcRouterBuilder};
use super::client::VpcRouterClient;
use super::nic::{AdditionalNicSetting, NicSetting};
use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};
use crate::merge::patch;
use sacloud_iaas::{
    ApiCaller, Id, VpcRouter, VpcRouterDhcpServer, VpcRouterDhcpStaticMapping,
    VpcRouterDnsForwarding, VpcRouterFirewall, VpcRouterL2tpIpsecServer, VpcRouterPlan,
    VpcRouterPortForwarding, VpcRouterPptpServer, VpcRouterRemoteAccessUser,
    VpcRouterSiteToSiteIpsecVpn, VpcRouterStaticNat, VpcRouterStaticRoute, VpcRouterWireGuard,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Desired state of a VPC router. An empty `id` creates a new one.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApplyRequest {
    pub zone: String,
    pub id: Id,

    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub icon_id: Id,
    pub plan: VpcRouterPlan,
    pub version: u32,
    pub nic_setting: NicSetting,
    pub additional_nic_settings: Vec<AdditionalNicSetting>,
    pub router_setting: RouterSetting,

    pub settings_hash: String,
    pub boot_after_create: bool,
    pub no_wait: bool,
    pub force_shutdown: bool,
}

impl Default for ApplyRequest {
    fn default() -> Self {
        Self {
            zone: String::new(),
            id: Id::default(),
            name: String::new(),
            description: String::new(),
            tags: vec![],
            icon_id: Id::default(),
            plan: VpcRouterPlan::Standard,
            version: DEFAULT_VERSION,
            nic_setting: NicSetting::Standard,
            additional_nic_settings: vec![],
            router_setting: RouterSetting::default(),
            settings_hash: String::new(),
            boot_after_create: false,
            no_wait: false,
            force_shutdown: false,
        }
    }
}

impl ApplyRequest {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ServiceError::validation("name is required"));
        }
        if self.description.chars().count() > 512 {
            return Err(ServiceError::validation(
                "description must be at most 512 characters",
            ));
        }
        Ok(())
    }

    pub fn builder(&self, caller: &dyn ApiCaller, config: &ServiceConfig) -> VpcRouterBuilder {
        let mut setup_options = config.setup.clone();
        setup_options.boot_after_build = self.boot_after_create;

        VpcRouterBuilder {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            icon_id: self.icon_id,
            plan: self.plan,
            version: self.version,
            nic_setting: self.nic_setting.clone(),
            additional_nic_settings: self.additional_nic_settings.clone(),
            router_setting: self.router_setting.clone(),
            settings_hash: self.settings_hash.clone(),
            no_wait: self.no_wait,
            force_shutdown: self.force_shutdown,
            setup_options,
            ..VpcRouterBuilder::new(VpcRouterClient::new(caller))
        }
    }

    /// Desired state equal to `router` as it is
    pub fn from_router(zone: &str, router: &VpcRouter) -> Self {
        Self {
            zone: zone.to_string(),
            id: router.id,
            name: router.name.clone(),
            description: router.description.clone(),
            tags: router.tags.clone(),
            icon_id: router.icon_id,
            plan: router.plan,
            version: router.version,
            nic_setting: NicSetting::from_router(router),
            additional_nic_settings: AdditionalNicSetting::from_router(router),
            router_setting: RouterSetting::from_settings(&router.settings),
            settings_hash: router.settings_hash.clone(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CreateRequest {
    pub zone: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub icon_id: Id,
    pub plan: VpcRouterPlan,
    pub version: u32,
    pub nic_setting: NicSetting,
    pub additional_nic_settings: Vec<AdditionalNicSetting>,
    pub router_setting: RouterSetting,
    pub boot_after_create: bool,
    pub no_wait: bool,
}

impl Default for CreateRequest {
    fn default() -> Self {
        let apply = ApplyRequest::default();
        Self {
            zone: apply.zone,
            name: apply.name,
            description: apply.description,
            tags: apply.tags,
            icon_id: apply.icon_id,
            plan: apply.plan,
            version: apply.version,
            nic_setting: apply.nic_setting,
            additional_nic_settings: apply.additional_nic_settings,
            router_setting: apply.router_setting,
            boot_after_create: apply.boot_after_create,
            no_wait: apply.no_wait,
        }
    }
}

impl CreateRequest {
    pub fn apply_request(&self) -> ApplyRequest {
        ApplyRequest {
            zone: self.zone.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            icon_id: self.icon_id,
            plan: self.plan,
            version: self.version,
            nic_setting: self.nic_setting.clone(),
            additional_nic_settings: self.additional_nic_settings.clone(),
            router_setting: self.router_setting.clone(),
            boot_after_create: self.boot_after_create,
            no_wait: self.no_wait,
            ..Default::default()
        }
    }
}

/// Changes to eth0 of a premium router. The switch cannot be changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PremiumNicUpdate {
    pub ip_addresses: Option<Vec<String>>,
    pub virtual_ip_address: Option<String>,
    pub ip_aliases: Option<Vec<String>>,
}

impl PremiumNicUpdate {
    fn merge_into(&self, base: &mut NicSetting) {
        if let NicSetting::Premium {
            ip_addresses,
            virtual_ip_address,
            ip_aliases,
            ..
        } = base
        {
            patch(ip_addresses, self.ip_addresses.clone());
            patch(virtual_ip_address, self.virtual_ip_address.clone());
            patch(ip_aliases, self.ip_aliases.clone());
        }
    }
}

/// Changes to the NIC at `index`
///
/// On a standard router the first of `ip_addresses` is its address and
/// `virtual_ip_address` is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AdditionalNicUpdate {
    pub index: usize,
    pub switch_id: Option<Id>,
    pub ip_addresses: Option<Vec<String>>,
    pub virtual_ip_address: Option<String>,
    pub network_mask_len: Option<u8>,
}

impl AdditionalNicUpdate {
    /// Apply onto the existing NIC, or onto an empty one of the plan's kind
    fn merge_into(
        &self,
        existing: Option<&AdditionalNicSetting>,
        plan: VpcRouterPlan,
    ) -> AdditionalNicSetting {
        let mut nic = match existing {
            Some(nic) => nic.clone(),
            None if plan.is_standard() => AdditionalNicSetting::Standard {
                index: self.index,
                switch_id: Id::default(),
                ip_address: String::new(),
                network_mask_len: 0,
            },
            None => AdditionalNicSetting::Premium {
                index: self.index,
                switch_id: Id::default(),
                ip_addresses: vec![],
                virtual_ip_address: String::new(),
                network_mask_len: 0,
            },
        };
        match &mut nic {
            AdditionalNicSetting::Standard {
                switch_id,
                ip_address,
                network_mask_len,
                ..
            } => {
                patch(switch_id, self.switch_id);
                patch(
                    ip_address,
                    self.ip_addresses.as_ref().and_then(|ips| ips.first().cloned()),
                );
                patch(network_mask_len, self.network_mask_len);
            }
            AdditionalNicSetting::Premium {
                switch_id,
                ip_addresses,
                virtual_ip_address,
                network_mask_len,
                ..
            } => {
                patch(switch_id, self.switch_id);
                patch(ip_addresses, self.ip_addresses.clone());
                patch(virtual_ip_address, self.virtual_ip_address.clone());
                patch(network_mask_len, self.network_mask_len);
            }
        }
        nic
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RouterSettingUpdate {
    pub internet_connection_enabled: Option<bool>,
    pub static_nat: Option<Vec<VpcRouterStaticNat>>,
    pub port_forwarding: Option<Vec<VpcRouterPortForwarding>>,
    pub firewall: Option<Vec<VpcRouterFirewall>>,
    pub dhcp_server: Option<Vec<VpcRouterDhcpServer>>,
    pub dhcp_static_mapping: Option<Vec<VpcRouterDhcpStaticMapping>>,
    pub dns_forwarding: Option<Option<VpcRouterDnsForwarding>>,
    pub pptp_server: Option<Option<VpcRouterPptpServer>>,
    pub l2tp_ipsec_server: Option<Option<VpcRouterL2tpIpsecServer>>,
    pub wire_guard: Option<Option<VpcRouterWireGuard>>,
    pub remote_access_users: Option<Vec<VpcRouterRemoteAccessUser>>,
    pub site_to_site_ipsec_vpn: Option<Vec<VpcRouterSiteToSiteIpsecVpn>>,
    pub static_route: Option<Vec<VpcRouterStaticRoute>>,
    pub syslog_host: Option<String>,
}

impl RouterSettingUpdate {
    fn merge_into(&self, base: &mut RouterSetting) {
        patch(
            &mut base.internet_connection_enabled,
            self.internet_connection_enabled,
        );
        patch(&mut base.static_nat, self.static_nat.clone());
        patch(&mut base.port_forwarding, self.port_forwarding.clone());
        patch(&mut base.firewall, self.firewall.clone());
        patch(&mut base.dhcp_server, self.dhcp_server.clone());
        patch(&mut base.dhcp_static_mapping, self.dhcp_static_mapping.clone());
        patch(&mut base.dns_forwarding, self.dns_forwarding.clone());
        patch(&mut base.pptp_server, self.pptp_server.clone());
        patch(&mut base.l2tp_ipsec_server, self.l2tp_ipsec_server.clone());
        patch(&mut base.wire_guard, self.wire_guard.clone());
        patch(&mut base.remote_access_users, self.remote_access_users.clone());
        patch(&mut base.site_to_site_ipsec_vpn, self.site_to_site_ipsec_vpn.clone());
        patch(&mut base.static_route, self.static_route.clone());
        patch(&mut base.syslog_host, self.syslog_host.clone());
    }
}

/// Fields left as `None` keep their current value.
///
/// When `additional_nic_settings` is given it is the complete set of NICs:
/// entries are merged onto the current NIC with the same `index` and NICs
/// not listed are disconnected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UpdateRequest {
    pub zone: String,
    pub id: Id,

    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub icon_id: Option<Id>,

    pub nic_setting: Option<PremiumNicUpdate>,
    pub additional_nic_settings: Option<Vec<AdditionalNicUpdate>>,
    pub router_setting: Option<RouterSettingUpdate>,

    pub settings_hash: String,
    pub no_wait: bool,
    pub force_shutdown: bool,
}

impl UpdateRequest {
    pub fn merge_into(&self, base: &mut ApplyRequest) {
        patch(&mut base.name, self.name.clone());
        patch(&mut base.description, self.description.clone());
        patch(&mut base.tags, self.tags.clone());
        patch(&mut base.icon_id, self.icon_id);

        if let Some(nic) = &self.nic_setting {
            nic.merge_into(&mut base.nic_setting);
        }
        if let Some(updates) = &self.additional_nic_settings {
            base.additional_nic_settings = updates
                .iter()
                .map(|u| {
                    let existing = base
                        .additional_nic_settings
                        .iter()
                        .find(|n| n.index() == u.index);
                    u.merge_into(existing, base.plan)
                })
                .collect();
        }
        if let Some(router) = &self.router_setting {
            router.merge_into(&mut base.router_setting);
        }

        if !self.settings_hash.is_empty() {
            base.settings_hash = self.settings_hash.clone();
        }
        base.no_wait = self.no_wait;
        base.force_shutdown = self.force_shutdown;
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
    /// Shut the router down first when it is running
    pub force_shutdown: bool,
}

/// VPC router operations over a provider
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

    pub async fn apply(&self, req: &ApplyRequest) -> Result<VpcRouter> {
        req.validate()?;
        let zone = self.config.zone_or_default(&req.zone);
        let mut builder = req.builder(self.caller.as_ref(), &self.config);
        Ok(builder.build(zone).await?)
    }

    pub async fn create(&self, req: &CreateRequest) -> Result<VpcRouter> {
        self.apply(&req.apply_request()).await
    }

    pub async fn read(&self, req: &ReadRequest) -> Result<VpcRouter> {
        if req.id.is_empty() {
            return Err(ServiceError::validation("id is required"));
        }
        let zone = self.config.zone_or_default(&req.zone);
        Ok(self.caller.vpc_router().read(zone, req.id).await?)
    }

    pub async fn update(&self, req: &UpdateRequest) -> Result<VpcRouter> {
        if req.id.is_empty() {
            return Err(ServiceError::validation("id is required"));
        }
        let zone = self.config.zone_or_default(&req.zone);
        let current = self.caller.vpc_router().read(zone, req.id).await?;
        if !current.availability.is_available() {
            return Err(ServiceError::invalid_state(format!(
                "target has invalid availability: zone={} id={} availability={}",
                zone, req.id, current.availability
            )));
        }
        let mut apply = ApplyRequest::from_router(zone, &current);
        req.merge_into(&mut apply);
        self.apply(&apply).await
    }

    pub async fn delete(&self, req: &DeleteRequest) -> Result<()> {
        if req.id.is_empty() {
            return Err(ServiceError::validation("id is required"));
        }
        let zone = self.config.zone_or_default(&req.zone);
        let api = self.caller.vpc_router();
        let current = api.read(zone, req.id).await?;
        if current.instance_status.is_up() {
            if !req.force_shutdown {
                return Err(ServiceError::invalid_state(format!(
                    "VPC router[{}] is still running",
                    req.id
                )));
            }
            crate::power::shutdown_vpc_router(
                api.as_ref(),
                &self.config.setup.waiter(),
                zone,
                req.id,
                true,
            )
            .await?;
        }
        info!("Deleting VPC router: {}", req.id);
        api.delete(zone, req.id).await?;
        Ok(())
    }
}
