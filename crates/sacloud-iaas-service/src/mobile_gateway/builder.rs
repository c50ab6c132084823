//! Mobile gateway builder
//!
//! Creation goes through [`RetryableSetup`]; everything after the copy is
//! done in `provision_before_up`. Updates diff every sub-resource against
//! the gateway and push only what differs.
//!
//! SIM changes are applied in a fixed order:
//!
//! ```text
//! clear SIM routes ─▶ deleted: clear IP, detach ─▶ updated: clear IP, assign
//!                  ─▶ added: attach, assign IP  ─▶ set desired SIM routes
//! ```

use super::client::MobileGatewayClient;
use crate::error::{PartialFailure, Result, ServiceError};
use crate::power;
use crate::setup::{RetryableSetup, SetupHandler, SetupOptions};
use async_trait::async_trait;
use sacloud_iaas::{
    ApiCaller, Id, MobileGateway, MobileGatewayCreateRequest, MobileGatewayDnsSetting,
    MobileGatewayInterfaceSetting, MobileGatewaySimRoute, MobileGatewayStaticRoute,
    MobileGatewayTrafficControl, MobileGatewayUpdateRequest, MobileGatewayUpdateSettingsRequest,
};
use serde::Deserialize;
use tracing::{debug, info};

/// Index of the private NIC
const PRIVATE_INTERFACE_INDEX: usize = 1;

/// Connection of the private NIC (eth1)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PrivateInterfaceSetting {
    pub switch_id: Id,
    pub ip_address: String,
    pub network_mask_len: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SimSetting {
    pub sim_id: Id,
    pub ip_address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SimRouteSetting {
    pub sim_id: Id,
    pub prefix: String,
}

/// Difference between the attached SIMs and the desired ones
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SimChanges {
    pub added: Vec<SimSetting>,
    /// Attached SIMs whose IP address changes
    pub updated: Vec<SimSetting>,
    pub deleted: Vec<SimSetting>,
}

impl SimChanges {
    pub fn between(current: &[SimSetting], desired: &[SimSetting]) -> Self {
        let mut changes = SimChanges::default();
        for c in current {
            match desired.iter().find(|d| d.sim_id == c.sim_id) {
                Some(d) if d.ip_address != c.ip_address => changes.updated.push(d.clone()),
                Some(_) => {}
                None => changes.deleted.push(c.clone()),
            }
        }
        for d in desired {
            if !current.iter().any(|c| c.sim_id == d.sim_id) {
                changes.added.push(d.clone());
            }
        }
        changes
    }
}

#[derive(Debug, Clone)]
pub struct MobileGatewayBuilder {
    /// Existing gateway to update; empty creates a new one
    pub id: Id,

    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub icon_id: Id,
    pub private_interface: Option<PrivateInterfaceSetting>,
    pub static_routes: Vec<MobileGatewayStaticRoute>,
    pub sim_routes: Vec<SimRouteSetting>,
    pub internet_connection_enabled: bool,
    pub inter_device_communication_enabled: bool,
    /// `None` means the name servers of the zone's region
    pub dns: Option<MobileGatewayDnsSetting>,
    pub sims: Vec<SimSetting>,
    pub traffic_config: Option<MobileGatewayTrafficControl>,

    pub settings_hash: String,
    pub no_wait: bool,
    pub force_shutdown: bool,

    pub setup_options: SetupOptions,
    pub client: MobileGatewayClient,
}

/// A failure may carry the gateway as last seen
pub type MobileGatewayOutcome =
    std::result::Result<MobileGateway, PartialFailure<Option<MobileGateway>>>;

impl MobileGatewayBuilder {
    pub fn new(client: MobileGatewayClient) -> Self {
        Self {
            id: Id::default(),
            name: String::new(),
            description: String::new(),
            tags: vec![],
            icon_id: Id::default(),
            private_interface: None,
            static_routes: vec![],
            sim_routes: vec![],
            internet_connection_enabled: false,
            inter_device_communication_enabled: false,
            dns: None,
            sims: vec![],
            traffic_config: None,
            settings_hash: String::new(),
            no_wait: false,
            force_shutdown: false,
            setup_options: SetupOptions::default(),
            client,
        }
    }

    /// Builder whose desired state is the gateway as it is now
    pub async fn from_resource(caller: &dyn ApiCaller, zone: &str, id: Id) -> Result<Self> {
        let client = MobileGatewayClient::new(caller);
        let api = &client.mobile_gateway;
        let current = api.read(zone, id).await?;

        let sim_routes = api
            .get_sim_routes(zone, id)
            .await?
            .into_iter()
            .map(|r| SimRouteSetting {
                sim_id: r.resource_id,
                prefix: r.prefix,
            })
            .collect();
        let dns = not_found_as_none(api.get_dns(zone, id).await)?;
        let sims = current_sims(&client, zone, id).await?;
        let traffic_config = not_found_as_none(api.get_traffic_config(zone, id).await)?;

        Ok(Self {
            id,
            name: current.name.clone(),
            description: current.description.clone(),
            tags: current.tags.clone(),
            icon_id: current.icon_id,
            private_interface: current_private_interface(&current),
            static_routes: current.static_routes.clone(),
            sim_routes,
            internet_connection_enabled: current.internet_connection_enabled,
            inter_device_communication_enabled: current.inter_device_communication_enabled,
            dns,
            sims,
            traffic_config,
            settings_hash: current.settings_hash.clone(),
            ..Self::new(client)
        })
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(private) = &self.private_interface {
            if private.switch_id.is_empty() {
                return Err(ServiceError::validation(
                    "switch id is required when a private interface is specified",
                ));
            }
            if private.ip_address.is_empty() {
                return Err(ServiceError::validation(
                    "ip address is required when a private interface is specified",
                ));
            }
            if private.network_mask_len == 0 {
                return Err(ServiceError::validation(
                    "network mask length is required when a private interface is specified",
                ));
            }
        }
        if !self.sim_routes.is_empty() && self.sims.is_empty() {
            return Err(ServiceError::validation(
                "SIM settings are required when SIM routes are specified",
            ));
        }

        if self.no_wait
            && (self.private_interface.is_some()
                || !self.static_routes.is_empty()
                || !self.sim_routes.is_empty()
                || self.dns.is_some()
                || !self.sims.is_empty()
                || self.traffic_config.is_some())
        {
            return Err(ServiceError::validation(
                "NoWait is not supported with a private interface, static routes, SIM routes, \
                 DNS, SIMs or traffic config",
            ));
        }
        Ok(())
    }

    /// Create the gateway, or update it when `id` is set
    pub async fn build(&mut self, zone: &str) -> MobileGatewayOutcome {
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

    fn interface_settings(&self) -> Vec<MobileGatewayInterfaceSetting> {
        self.private_interface
            .iter()
            .map(|private| MobileGatewayInterfaceSetting {
                index: PRIVATE_INTERFACE_INDEX,
                ip_address: vec![private.ip_address.clone()],
                network_mask_len: private.network_mask_len,
            })
            .collect()
    }

    /// Settings push. Static routes are always included so that an
    /// interface push does not drop them.
    fn settings_request(
        &self,
        interface_settings: Vec<MobileGatewayInterfaceSetting>,
        settings_hash: &str,
    ) -> MobileGatewayUpdateSettingsRequest {
        MobileGatewayUpdateSettingsRequest {
            interface_settings,
            static_routes: self.static_routes.clone(),
            internet_connection_enabled: self.internet_connection_enabled,
            inter_device_communication_enabled: self.inter_device_communication_enabled,
            settings_hash: settings_hash.to_string(),
        }
    }

    fn sim_route_params(&self) -> Vec<MobileGatewaySimRoute> {
        self.sim_routes
            .iter()
            .map(|r| MobileGatewaySimRoute {
                resource_id: r.sim_id,
                prefix: r.prefix.clone(),
            })
            .collect()
    }

    fn is_private_interface_changed(&self, current: &MobileGateway) -> bool {
        current_private_interface(current) != self.private_interface
    }

    async fn update(&mut self, zone: &str, id: Id) -> Result<MobileGateway> {
        let client = self.client.clone();
        let api = client.mobile_gateway.as_ref();
        let waiter = self.setup_options.waiter();

        let mut current = api.read(zone, id).await?;
        // several pushes below share one hash
        let mut settings_hash = if self.settings_hash.is_empty() {
            current.settings_hash.clone()
        } else {
            self.settings_hash.clone()
        };
        let mut changed = false;

        let interface_changed = self.is_private_interface_changed(&current);
        let mut restart = false;
        if interface_changed && current.instance_status.is_up() {
            if self.no_wait {
                return Err(ServiceError::invalid_state(
                    "NoWait is not available because the mobile gateway has to be shut down",
                ));
            }
            power::shutdown_mobile_gateway(api, &waiter, zone, id, self.force_shutdown).await?;
            restart = true;
        }

        if interface_changed {
            let connected_switch = current
                .interfaces
                .iter()
                .find(|iface| iface.index == PRIVATE_INTERFACE_INDEX)
                .map(|iface| iface.switch_id)
                .filter(|switch_id| !switch_id.is_empty());
            let desired_switch = self.private_interface.as_ref().map(|p| p.switch_id);

            let mut connected_to_desired =
                connected_switch.is_some() && connected_switch == desired_switch;
            if connected_switch.is_some() && !connected_to_desired {
                info!("Disconnecting mobile gateway {} from switch", id);
                api.disconnect_from_switch(zone, id).await?;
                tokio::time::sleep(self.setup_options.nic_update_wait).await;

                current = api
                    .update_settings(zone, id, &self.settings_request(vec![], &settings_hash))
                    .await?;
                settings_hash = current.settings_hash.clone();
                api.config(zone, id).await?;
                connected_to_desired = false;
            }

            if let Some(private) = &self.private_interface {
                if !connected_to_desired {
                    info!("Connecting mobile gateway {} to switch {}", id, private.switch_id);
                    api.connect_to_switch(zone, id, private.switch_id).await?;
                    tokio::time::sleep(self.setup_options.nic_update_wait).await;
                }
                current = api
                    .update_settings(
                        zone,
                        id,
                        &self.settings_request(self.interface_settings(), &settings_hash),
                    )
                    .await?;
                settings_hash = current.settings_hash.clone();
                api.config(zone, id).await?;
            }
            changed = true;
        }

        let desired = MobileGatewayUpdateRequest {
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            icon_id: self.icon_id,
            settings_hash: settings_hash.clone(),
        };
        if current.name != desired.name
            || current.description != desired.description
            || current.tags != desired.tags
            || current.icon_id != desired.icon_id
        {
            info!("Updating mobile gateway: {}", id);
            current = api.update(zone, id, &desired).await?;
            settings_hash = current.settings_hash.clone();
        }

        changed |= self.reconcile_traffic_config(zone, id).await?;
        changed |= self.reconcile_dns(zone, &current).await?;

        if current.static_routes != self.static_routes
            || current.internet_connection_enabled != self.internet_connection_enabled
            || current.inter_device_communication_enabled
                != self.inter_device_communication_enabled
        {
            info!("Updating settings of mobile gateway: {}", id);
            api.update_settings(
                zone,
                id,
                &self.settings_request(self.interface_settings(), &settings_hash),
            )
            .await?;
            changed = true;
        }

        changed |= self.reconcile_sims(zone, id).await?;

        if changed {
            api.config(zone, id).await?;
        } else {
            debug!("Mobile gateway {} is up to date", id);
        }

        if restart {
            power::boot_mobile_gateway(api, &waiter, zone, id).await?;
        }

        Ok(api.read(zone, id).await?)
    }

    async fn reconcile_traffic_config(&self, zone: &str, id: Id) -> Result<bool> {
        let api = &self.client.mobile_gateway;
        let current = not_found_as_none(api.get_traffic_config(zone, id).await)?;
        if current == self.traffic_config {
            return Ok(false);
        }
        match &self.traffic_config {
            Some(config) => {
                info!("Setting traffic config of mobile gateway: {}", id);
                api.set_traffic_config(zone, id, config).await?;
            }
            None => {
                info!("Deleting traffic config of mobile gateway: {}", id);
                api.delete_traffic_config(zone, id).await?;
            }
        }
        Ok(true)
    }

    async fn reconcile_dns(&self, zone: &str, current: &MobileGateway) -> Result<bool> {
        let api = &self.client.mobile_gateway;
        let desired = match &self.dns {
            Some(dns) => dns.clone(),
            None => self.region_dns(current.zone_id).await?,
        };
        let current_dns = not_found_as_none(api.get_dns(zone, current.id).await)?;
        if current_dns.as_ref() == Some(&desired) {
            return Ok(false);
        }
        info!("Setting DNS of mobile gateway: {}", current.id);
        api.set_dns(zone, current.id, &desired).await?;
        Ok(true)
    }

    async fn region_dns(&self, zone_id: Id) -> Result<MobileGatewayDnsSetting> {
        let zone = self.client.zone.read(zone_id).await?;
        match zone.region.name_servers.as_slice() {
            [dns1, dns2, ..] => Ok(MobileGatewayDnsSetting {
                dns1: dns1.clone(),
                dns2: dns2.clone(),
            }),
            _ => Err(ServiceError::invalid_state(format!(
                "region of zone {} has fewer than two name servers",
                zone.name
            ))),
        }
    }

    async fn reconcile_sims(&self, zone: &str, id: Id) -> Result<bool> {
        let api = &self.client.mobile_gateway;
        let sim_api = &self.client.sim;

        let current_sims = current_sims(&self.client, zone, id).await?;
        let current_routes = api.get_sim_routes(zone, id).await?;
        let desired_routes = self.sim_route_params();

        let changes = SimChanges::between(&current_sims, &self.sims);
        let sims_changed = !changes.added.is_empty()
            || !changes.updated.is_empty()
            || !changes.deleted.is_empty();
        if !sims_changed && same_sim_routes(&current_routes, &desired_routes) {
            return Ok(false);
        }

        if !current_routes.is_empty() {
            info!("Clearing SIM routes of mobile gateway: {}", id);
            api.set_sim_routes(zone, id, &[]).await?;
        }
        for sim in &changes.deleted {
            info!("Detaching SIM {} from mobile gateway {}", sim.sim_id, id);
            sim_api.clear_ip(sim.sim_id).await?;
            api.delete_sim(zone, id, sim.sim_id).await?;
        }
        for sim in &changes.updated {
            info!("Reassigning IP address of SIM {}", sim.sim_id);
            sim_api.clear_ip(sim.sim_id).await?;
            sim_api.assign_ip(sim.sim_id, &sim.ip_address).await?;
        }
        for sim in &changes.added {
            info!("Attaching SIM {} to mobile gateway {}", sim.sim_id, id);
            api.add_sim(zone, id, sim.sim_id).await?;
            sim_api.assign_ip(sim.sim_id, &sim.ip_address).await?;
        }
        if !desired_routes.is_empty() {
            info!("Setting SIM routes of mobile gateway: {}", id);
            api.set_sim_routes(zone, id, &desired_routes).await?;
        }
        Ok(true)
    }
}

#[async_trait]
impl SetupHandler for MobileGatewayBuilder {
    type Resource = MobileGateway;

    async fn create(&self, zone: &str) -> sacloud_iaas::Result<MobileGateway> {
        info!("Creating mobile gateway: {}", self.name);
        self.client
            .mobile_gateway
            .create(
                zone,
                &MobileGatewayCreateRequest {
                    name: self.name.clone(),
                    description: self.description.clone(),
                    tags: self.tags.clone(),
                    icon_id: self.icon_id,
                    internet_connection_enabled: self.internet_connection_enabled,
                    inter_device_communication_enabled: self.inter_device_communication_enabled,
                },
            )
            .await
    }

    async fn provision_before_up(&self, zone: &str, mgw: &MobileGateway) -> Result<()> {
        if self.no_wait {
            return Ok(());
        }
        let api = self.client.mobile_gateway.as_ref();
        let id = mgw.id;

        if let Some(private) = &self.private_interface {
            info!("Connecting mobile gateway {} to switch {}", id, private.switch_id);
            api.connect_to_switch(zone, id, private.switch_id).await?;
            tokio::time::sleep(self.setup_options.nic_update_wait).await;
        }

        api.update_settings(
            zone,
            id,
            &self.settings_request(self.interface_settings(), &mgw.settings_hash),
        )
        .await?;
        // interface settings only take effect after a config reload
        api.config(zone, id).await?;

        if let Some(config) = &self.traffic_config {
            api.set_traffic_config(zone, id, config).await?;
        }
        if let Some(dns) = &self.dns {
            api.set_dns(zone, id, dns).await?;
        }

        for sim in &self.sims {
            info!("Attaching SIM {} to mobile gateway {}", sim.sim_id, id);
            api.add_sim(zone, id, sim.sim_id).await?;
            self.client.sim.assign_ip(sim.sim_id, &sim.ip_address).await?;
        }
        if !self.sim_routes.is_empty() {
            api.set_sim_routes(zone, id, &self.sim_route_params()).await?;
        }

        api.config(zone, id).await?;

        if self.setup_options.boot_after_build {
            power::boot_mobile_gateway(api, &self.setup_options.waiter(), zone, id).await?;
        }
        Ok(())
    }

    async fn read(&self, zone: &str, id: Id) -> sacloud_iaas::Result<MobileGateway> {
        self.client.mobile_gateway.read(zone, id).await
    }

    async fn delete(&self, zone: &str, id: Id) -> sacloud_iaas::Result<()> {
        self.client.mobile_gateway.delete(zone, id).await
    }
}

fn current_private_interface(mgw: &MobileGateway) -> Option<PrivateInterfaceSetting> {
    let iface = mgw
        .interfaces
        .iter()
        .find(|iface| iface.index == PRIVATE_INTERFACE_INDEX)?;
    let setting = mgw
        .interface_settings
        .iter()
        .find(|s| s.index == PRIVATE_INTERFACE_INDEX)?;
    Some(PrivateInterfaceSetting {
        switch_id: iface.switch_id,
        ip_address: setting.ip_address.first().cloned().unwrap_or_default(),
        network_mask_len: setting.network_mask_len,
    })
}

async fn current_sims(client: &MobileGatewayClient, zone: &str, id: Id) -> Result<Vec<SimSetting>> {
    let sims = not_found_as_none(client.mobile_gateway.list_sims(zone, id).await)?;
    Ok(sims
        .unwrap_or_default()
        .into_iter()
        .map(|sim| SimSetting {
            sim_id: sim.resource_id,
            ip_address: sim.ip,
        })
        .collect())
}

/// Routes are equal regardless of the order the provider lists them in
fn same_sim_routes(a: &[MobileGatewaySimRoute], b: &[MobileGatewaySimRoute]) -> bool {
    fn keys(routes: &[MobileGatewaySimRoute]) -> Vec<(Id, &str)> {
        let mut keys: Vec<_> = routes
            .iter()
            .map(|r| (r.resource_id, r.prefix.as_str()))
            .collect();
        keys.sort();
        keys
    }
    keys(a) == keys(b)
}

fn not_found_as_none<T>(result: sacloud_iaas::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sacloud_iaas::ApplianceInterface;

    fn sim(id: u64, ip: &str) -> SimSetting {
        SimSetting {
            sim_id: Id(id),
            ip_address: ip.into(),
        }
    }

    #[test]
    fn test_sim_changes() {
        let current = vec![sim(1, "192.168.100.1"), sim(2, "192.168.100.2")];
        let desired = vec![sim(2, "192.168.100.3"), sim(3, "192.168.100.4")];
        let changes = SimChanges::between(&current, &desired);
        assert_eq!(
            changes,
            SimChanges {
                added: vec![sim(3, "192.168.100.4")],
                updated: vec![sim(2, "192.168.100.3")],
                deleted: vec![sim(1, "192.168.100.1")],
            }
        );
    }

    #[test]
    fn test_sim_changes_none() {
        let sims = vec![sim(1, "192.168.100.1")];
        assert_eq!(SimChanges::between(&sims, &sims), SimChanges::default());
    }

    #[test]
    fn test_sim_routes_compare_as_sets() {
        let route = |id: u64, prefix: &str| MobileGatewaySimRoute {
            resource_id: Id(id),
            prefix: prefix.into(),
        };
        let listed = vec![route(2, "10.2.0.0/24"), route(1, "10.1.0.0/24")];
        let desired = vec![route(1, "10.1.0.0/24"), route(2, "10.2.0.0/24")];
        assert!(same_sim_routes(&listed, &desired));
        assert!(!same_sim_routes(&listed[..1], &desired));
        assert!(!same_sim_routes(
            &[route(1, "10.2.0.0/24")],
            &[route(1, "10.1.0.0/24")]
        ));
    }

    #[test]
    fn test_current_private_interface() {
        let mut mgw = MobileGateway {
            interfaces: vec![ApplianceInterface {
                index: 0,
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(current_private_interface(&mgw), None);

        mgw.interfaces.push(ApplianceInterface {
            index: 1,
            switch_id: Id(50),
            ..Default::default()
        });
        mgw.interface_settings.push(MobileGatewayInterfaceSetting {
            index: 1,
            ip_address: vec!["192.168.0.1".into()],
            network_mask_len: 24,
        });
        assert_eq!(
            current_private_interface(&mgw),
            Some(PrivateInterfaceSetting {
                switch_id: Id(50),
                ip_address: "192.168.0.1".into(),
                network_mask_len: 24,
            })
        );
    }

    #[test]
    fn test_not_found_as_none() {
        let missing: sacloud_iaas::Result<u32> =
            Err(sacloud_iaas::IaasError::NotFound("traffic config".into()));
        assert_eq!(not_found_as_none(missing).unwrap(), None);
        assert_eq!(not_found_as_none(Ok(3)).unwrap(), Some(3));
    }
}
