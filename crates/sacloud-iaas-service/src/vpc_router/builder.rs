//! VPC router builder

use super::client::VpcRouterClient;
use super::nic::{AdditionalNicSetting, MAX_NIC_INDEX, NicSetting};
use crate::error::{PartialFailure, Result, ServiceError};
use crate::power;
use crate::setup::{RetryableSetup, SetupHandler, SetupOptions};
use async_trait::async_trait;
use sacloud_iaas::{
    Id, VpcRouter, VpcRouterCreateRequest, VpcRouterDhcpServer, VpcRouterDhcpStaticMapping,
    VpcRouterDnsForwarding, VpcRouterFirewall, VpcRouterL2tpIpsecServer, VpcRouterPlan,
    VpcRouterPortForwarding, VpcRouterPptpServer, VpcRouterRemoteAccessUser, VpcRouterSettings,
    VpcRouterSiteToSiteIpsecVpn, VpcRouterStaticNat, VpcRouterStaticRoute,
    VpcRouterUpdateRequest, VpcRouterUpdateSettingsRequest, VpcRouterWireGuard,
};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

pub const DEFAULT_VERSION: u32 = 2;

/// Router functions, everything in the settings except the interfaces
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RouterSetting {
    pub vrid: u32,
    pub internet_connection_enabled: bool,
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

impl RouterSetting {
    pub fn from_settings(settings: &VpcRouterSettings) -> Self {
        Self {
            vrid: settings.vrid,
            internet_connection_enabled: settings.internet_connection_enabled,
            static_nat: settings.static_nat.clone(),
            port_forwarding: settings.port_forwarding.clone(),
            firewall: settings.firewall.clone(),
            dhcp_server: settings.dhcp_server.clone(),
            dhcp_static_mapping: settings.dhcp_static_mapping.clone(),
            dns_forwarding: settings.dns_forwarding.clone(),
            pptp_server: settings.pptp_server.clone(),
            l2tp_ipsec_server: settings.l2tp_ipsec_server.clone(),
            wire_guard: settings.wire_guard.clone(),
            remote_access_users: settings.remote_access_users.clone(),
            site_to_site_ipsec_vpn: settings.site_to_site_ipsec_vpn.clone(),
            static_route: settings.static_route.clone(),
            syslog_host: settings.syslog_host.clone(),
        }
    }
}

pub type VpcRouterOutcome = std::result::Result<VpcRouter, PartialFailure<Option<VpcRouter>>>;

#[derive(Debug, Clone)]
pub struct VpcRouterBuilder {
    /// Existing router to update; empty creates a new one
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
    pub no_wait: bool,
    pub force_shutdown: bool,

    pub setup_options: SetupOptions,
    pub client: VpcRouterClient,
}

impl VpcRouterBuilder {
    pub fn new(client: VpcRouterClient) -> Self {
        Self {
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
            no_wait: false,
            force_shutdown: false,
            setup_options: SetupOptions::default(),
            client,
        }
    }

    /// Builder whose desired state is `router` as it is
    pub fn from_router(router: &VpcRouter, client: VpcRouterClient) -> Self {
        Self {
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
            ..Self::new(client)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.additional_nic_settings.len() > MAX_NIC_INDEX {
            return Err(ServiceError::validation(format!(
                "at most {} additional NICs are supported",
                MAX_NIC_INDEX
            )));
        }
        self.nic_setting.validate(self.plan)?;

        let mut indexes = BTreeSet::new();
        for nic in &self.additional_nic_settings {
            nic.validate(self.plan)?;
            if !indexes.insert(nic.index()) {
                return Err(ServiceError::validation(format!(
                    "NIC index {} is specified more than once",
                    nic.index()
                )));
            }
        }

        if self.no_wait
            && (!self.additional_nic_settings.is_empty()
                || self.router_setting != RouterSetting::default())
        {
            return Err(ServiceError::validation(
                "NoWait is not supported with additional NICs or router settings",
            ));
        }
        Ok(())
    }

    /// Create the router, or update it when `id` is set
    pub async fn build(&mut self, zone: &str) -> VpcRouterOutcome {
        self.setup_options.init();
        if let Err(e) = self.validate() {
            return Err(PartialFailure::empty(e));
        }

        if self.id.is_empty() {
            let setup = RetryableSetup::new(
                self.setup_options.clone(),
                !self.no_wait,
                !self.no_wait && self.setup_options.boot_after_build,
            );
            let created = setup.setup(&*self, zone).await?;
            self.id = created.id;
            Ok(created)
        } else {
            let id = self.id;
            self.update(zone, id).await.map_err(PartialFailure::empty)
        }
    }

    /// Full settings with the interfaces ordered by index
    fn settings(&self) -> VpcRouterSettings {
        let r = &self.router_setting;
        let mut interfaces: Vec<_> = self
            .nic_setting
            .interface_setting()
            .into_iter()
            .chain(
                self.additional_nic_settings
                    .iter()
                    .map(AdditionalNicSetting::interface_setting),
            )
            .collect();
        interfaces.sort_by_key(|s| s.index);

        VpcRouterSettings {
            vrid: r.vrid,
            internet_connection_enabled: r.internet_connection_enabled,
            interfaces,
            static_nat: r.static_nat.clone(),
            port_forwarding: r.port_forwarding.clone(),
            firewall: r.firewall.clone(),
            dhcp_server: r.dhcp_server.clone(),
            dhcp_static_mapping: r.dhcp_static_mapping.clone(),
            dns_forwarding: r.dns_forwarding.clone(),
            pptp_server: r.pptp_server.clone(),
            l2tp_ipsec_server: r.l2tp_ipsec_server.clone(),
            wire_guard: r.wire_guard.clone(),
            remote_access_users: r.remote_access_users.clone(),
            site_to_site_ipsec_vpn: r.site_to_site_ipsec_vpn.clone(),
            static_route: r.static_route.clone(),
            syslog_host: r.syslog_host.clone(),
        }
    }

    /// Switch connected at each index of eth1 to eth7
    fn desired_switches(&self) -> BTreeMap<usize, Id> {
        self.additional_nic_settings
            .iter()
            .map(|nic| (nic.index(), nic.switch_id()))
            .collect()
    }

    async fn update(&mut self, zone: &str, id: Id) -> Result<VpcRouter> {
        let client = self.client.clone();
        let api = client.vpc_router.as_ref();
        let waiter = self.setup_options.waiter();

        let mut current = api.read(zone, id).await?;
        if current.plan != self.plan {
            return Err(ServiceError::validation(format!(
                "plan of VPC router {} cannot be changed: {:?} -> {:?}",
                id, current.plan, self.plan
            )));
        }
        if NicSetting::from_router(&current).connected_switch().id
            != self.nic_setting.connected_switch().id
        {
            return Err(ServiceError::validation(format!(
                "upstream of eth0 of VPC router {} cannot be changed",
                id
            )));
        }

        let current_switches = current_switches(&current);
        let desired_switches = self.desired_switches();
        let mut restart = false;
        if current_switches != desired_switches && current.instance_status.is_up() {
            if self.no_wait {
                return Err(ServiceError::invalid_state(
                    "NoWait is not available because the VPC router has to be shut down",
                ));
            }
            power::shutdown_vpc_router(api, &waiter, zone, id, self.force_shutdown).await?;
            restart = true;
        }

        let mut nic_changed = false;
        for (&index, switch_id) in &current_switches {
            if desired_switches.get(&index) != Some(switch_id) {
                info!("Disconnecting eth{} of VPC router {}", index, id);
                api.disconnect_from_switch(zone, id, index).await?;
                nic_changed = true;
            }
        }
        for (&index, &switch_id) in &desired_switches {
            if current_switches.get(&index) != Some(&switch_id) {
                info!("Connecting eth{} of VPC router {} to switch {}", index, id, switch_id);
                api.connect_to_switch(zone, id, index, switch_id).await?;
                nic_changed = true;
            }
        }
        if nic_changed {
            tokio::time::sleep(self.setup_options.nic_update_wait).await;
        }

        let mut settings_hash = if self.settings_hash.is_empty() {
            current.settings_hash.clone()
        } else {
            self.settings_hash.clone()
        };
        if current.name != self.name
            || current.description != self.description
            || current.tags != self.tags
            || current.icon_id != self.icon_id
        {
            info!("Updating VPC router: {}", id);
            current = api
                .update(
                    zone,
                    id,
                    &VpcRouterUpdateRequest {
                        name: self.name.clone(),
                        description: self.description.clone(),
                        tags: self.tags.clone(),
                        icon_id: self.icon_id,
                        settings_hash: settings_hash.clone(),
                    },
                )
                .await?;
            settings_hash = current.settings_hash.clone();
        }

        let desired = self.settings();
        let mut current_settings = current.settings.clone();
        current_settings.interfaces.sort_by_key(|s| s.index);
        if current_settings != desired {
            info!("Updating settings of VPC router: {}", id);
            api.update_settings(
                zone,
                id,
                &VpcRouterUpdateSettingsRequest {
                    settings: desired,
                    settings_hash,
                },
            )
            .await?;
            api.config(zone, id).await?;
        } else {
            debug!("Settings of VPC router {} are up to date", id);
        }

        if restart {
            power::boot_vpc_router(api, &waiter, zone, id).await?;
        }
        Ok(api.read(zone, id).await?)
    }
}

fn current_switches(router: &VpcRouter) -> BTreeMap<usize, Id> {
    router
        .interfaces
        .iter()
        .filter(|nic| nic.index != 0 && !nic.switch_id.is_empty())
        .map(|nic| (nic.index, nic.switch_id))
        .collect()
}

#[async_trait]
impl SetupHandler for VpcRouterBuilder {
    type Resource = VpcRouter;

    async fn create(&self, zone: &str) -> sacloud_iaas::Result<VpcRouter> {
        info!("Creating VPC router: {} ({:?})", self.name, self.plan);
        // eth1 and later are connected after the copy
        let mut settings = self.settings();
        settings.interfaces.retain(|s| s.index == 0);
        self.client
            .vpc_router
            .create(
                zone,
                &VpcRouterCreateRequest {
                    name: self.name.clone(),
                    description: self.description.clone(),
                    tags: self.tags.clone(),
                    icon_id: self.icon_id,
                    plan: self.plan,
                    version: self.version,
                    switch: self.nic_setting.connected_switch(),
                    ip_addresses: self.nic_setting.ip_addresses(),
                    settings,
                },
            )
            .await
    }

    async fn provision_before_up(&self, zone: &str, router: &VpcRouter) -> Result<()> {
        if self.no_wait {
            return Ok(());
        }
        let api = self.client.vpc_router.as_ref();
        let id = router.id;

        for nic in &self.additional_nic_settings {
            info!(
                "Connecting eth{} of VPC router {} to switch {}",
                nic.index(),
                id,
                nic.switch_id()
            );
            api.connect_to_switch(zone, id, nic.index(), nic.switch_id())
                .await?;
        }
        if !self.additional_nic_settings.is_empty() {
            tokio::time::sleep(self.setup_options.nic_update_wait).await;
        }

        api.update_settings(
            zone,
            id,
            &VpcRouterUpdateSettingsRequest {
                settings: self.settings(),
                settings_hash: router.settings_hash.clone(),
            },
        )
        .await?;
        api.config(zone, id).await?;

        if self.setup_options.boot_after_build {
            power::boot_vpc_router(api, &self.setup_options.waiter(), zone, id).await?;
        }
        Ok(())
    }

    async fn read(&self, zone: &str, id: Id) -> sacloud_iaas::Result<VpcRouter> {
        self.client.vpc_router.read(zone, id).await
    }

    async fn delete(&self, zone: &str, id: Id) -> sacloud_iaas::Result<()> {
        self.client.vpc_router.delete(zone, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sacloud_iaas::{ApplianceInterface, VpcRouterApi};
    use std::sync::Arc;

    struct Unreachable;

    #[async_trait]
    impl VpcRouterApi for Unreachable {
        async fn create(
            &self,
            _: &str,
            _: &VpcRouterCreateRequest,
        ) -> sacloud_iaas::Result<VpcRouter> {
            unreachable!()
        }
        async fn read(&self, _: &str, _: Id) -> sacloud_iaas::Result<VpcRouter> {
            unreachable!()
        }
        async fn update(
            &self,
            _: &str,
            _: Id,
            _: &VpcRouterUpdateRequest,
        ) -> sacloud_iaas::Result<VpcRouter> {
            unreachable!()
        }
        async fn update_settings(
            &self,
            _: &str,
            _: Id,
            _: &VpcRouterUpdateSettingsRequest,
        ) -> sacloud_iaas::Result<VpcRouter> {
            unreachable!()
        }
        async fn delete(&self, _: &str, _: Id) -> sacloud_iaas::Result<()> {
            unreachable!()
        }
        async fn config(&self, _: &str, _: Id) -> sacloud_iaas::Result<()> {
            unreachable!()
        }
        async fn boot(&self, _: &str, _: Id) -> sacloud_iaas::Result<()> {
            unreachable!()
        }
        async fn shutdown(&self, _: &str, _: Id, _: bool) -> sacloud_iaas::Result<()> {
            unreachable!()
        }
        async fn connect_to_switch(
            &self,
            _: &str,
            _: Id,
            _: usize,
            _: Id,
        ) -> sacloud_iaas::Result<()> {
            unreachable!()
        }
        async fn disconnect_from_switch(
            &self,
            _: &str,
            _: Id,
            _: usize,
        ) -> sacloud_iaas::Result<()> {
            unreachable!()
        }
    }

    fn builder() -> VpcRouterBuilder {
        VpcRouterBuilder {
            name: "router".into(),
            ..VpcRouterBuilder::new(VpcRouterClient {
                vpc_router: Arc::new(Unreachable),
            })
        }
    }

    fn eth(index: usize, switch_id: u64) -> AdditionalNicSetting {
        AdditionalNicSetting::Standard {
            index,
            switch_id: Id(switch_id),
            ip_address: format!("192.168.{}.1", index),
            network_mask_len: 24,
        }
    }

    #[test]
    fn test_duplicate_index() {
        let mut b = builder();
        b.additional_nic_settings = vec![eth(1, 10), eth(1, 11)];
        assert!(matches!(b.validate(), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_no_wait_with_additional_nics() {
        let mut b = builder();
        b.no_wait = true;
        assert!(b.validate().is_ok());
        b.additional_nic_settings = vec![eth(1, 10)];
        assert!(b.validate().is_err());
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_before_any_call() {
        let mut b = builder();
        b.plan = VpcRouterPlan::Premium;
        let failure = b.build("is1a").await.unwrap_err();
        assert!(failure.partial.is_none());
        assert!(matches!(failure.error, ServiceError::Validation(_)));
    }

    #[test]
    fn test_settings_are_ordered_by_index() {
        let mut b = builder();
        b.additional_nic_settings = vec![eth(3, 30), eth(1, 10)];
        let indexes: Vec<_> = b.settings().interfaces.iter().map(|s| s.index).collect();
        assert_eq!(indexes, vec![1, 3]);
    }

    #[test]
    fn test_current_switches_skip_eth0_and_disconnected() {
        let router = VpcRouter {
            interfaces: vec![
                ApplianceInterface {
                    index: 0,
                    switch_id: Id(1),
                    ..Default::default()
                },
                ApplianceInterface {
                    index: 2,
                    ..Default::default()
                },
                ApplianceInterface {
                    index: 4,
                    switch_id: Id(40),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(current_switches(&router), BTreeMap::from([(4, Id(40))]));
    }
}
