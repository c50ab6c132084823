//! Request layer for mobile gateways

use super::builder::{
    MobileGatewayBuilder, PrivateInterfaceSetting, SimRouteSetting, SimSetting,
};
use super::client::MobileGatewayClient;
use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};
use crate::merge::patch;
use sacloud_iaas::{
    ApiCaller, Id, MobileGateway, MobileGatewayDnsSetting, MobileGatewaySimRoute,
    MobileGatewayStaticRoute, MobileGatewayTrafficControl,
};
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::info;

/// Desired state of a mobile gateway. An empty `id` creates a new one.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApplyRequest {
    pub zone: String,
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
    pub dns: Option<MobileGatewayDnsSetting>,
    pub sims: Vec<SimSetting>,
    pub traffic_config: Option<MobileGatewayTrafficControl>,

    pub settings_hash: String,
    pub boot_after_create: bool,
    pub no_wait: bool,
    pub force_shutdown: bool,
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
        if let Some(private) = &self.private_interface {
            parse_ipv4("private_interface.ip_address", &private.ip_address)?;
            if !(8..=29).contains(&private.network_mask_len) {
                return Err(ServiceError::validation(format!(
                    "network mask length must be between 8 and 29: {}",
                    private.network_mask_len
                )));
            }
        }
        if let Some(dns) = &self.dns {
            parse_ipv4("dns1", &dns.dns1)?;
            parse_ipv4("dns2", &dns.dns2)?;
        }
        for route in &self.static_routes {
            parse_ipv4("static_routes.next_hop", &route.next_hop)?;
        }
        for sim in &self.sims {
            if sim.sim_id.is_empty() {
                return Err(ServiceError::validation("sims.sim_id is required"));
            }
            parse_ipv4("sims.ip_address", &sim.ip_address)?;
        }
        for route in &self.sim_routes {
            if !self.sims.iter().any(|s| s.sim_id == route.sim_id) {
                return Err(ServiceError::validation(format!(
                    "SIM route refers to SIM {} which is not in sims",
                    route.sim_id
                )));
            }
        }
        Ok(())
    }

    pub fn builder(&self, caller: &dyn ApiCaller, config: &ServiceConfig) -> MobileGatewayBuilder {
        let mut setup_options = config.setup.clone();
        setup_options.boot_after_build = self.boot_after_create;

        MobileGatewayBuilder {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            icon_id: self.icon_id,
            private_interface: self.private_interface.clone(),
            static_routes: self.static_routes.clone(),
            sim_routes: self.sim_routes.clone(),
            internet_connection_enabled: self.internet_connection_enabled,
            inter_device_communication_enabled: self.inter_device_communication_enabled,
            dns: self.dns.clone(),
            sims: self.sims.clone(),
            traffic_config: self.traffic_config.clone(),
            settings_hash: self.settings_hash.clone(),
            no_wait: self.no_wait,
            force_shutdown: self.force_shutdown,
            setup_options,
            ..MobileGatewayBuilder::new(MobileGatewayClient::new(caller))
        }
    }

    /// Desired state equal to what `builder` currently describes
    pub fn from_builder(zone: &str, builder: &MobileGatewayBuilder) -> Self {
        Self {
            zone: zone.to_string(),
            id: builder.id,
            name: builder.name.clone(),
            description: builder.description.clone(),
            tags: builder.tags.clone(),
            icon_id: builder.icon_id,
            private_interface: builder.private_interface.clone(),
            static_routes: builder.static_routes.clone(),
            sim_routes: builder.sim_routes.clone(),
            internet_connection_enabled: builder.internet_connection_enabled,
            inter_device_communication_enabled: builder.inter_device_communication_enabled,
            dns: builder.dns.clone(),
            sims: builder.sims.clone(),
            traffic_config: builder.traffic_config.clone(),
            settings_hash: builder.settings_hash.clone(),
            ..Default::default()
        }
    }
}

fn parse_ipv4(field: &str, value: &str) -> Result<Ipv4Addr> {
    value.parse::<Ipv4Addr>().map_err(|_| {
        ServiceError::validation(format!("{} must be an IPv4 address: {:?}", field, value))
    })
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CreateRequest {
    pub zone: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub icon_id: Id,
    pub private_interface: Option<PrivateInterfaceSetting>,
    pub static_routes: Vec<MobileGatewayStaticRoute>,
    pub sim_routes: Vec<SimRouteSetting>,
    pub internet_connection_enabled: bool,
    pub inter_device_communication_enabled: bool,
    pub dns: Option<MobileGatewayDnsSetting>,
    pub sims: Vec<SimSetting>,
    pub traffic_config: Option<MobileGatewayTrafficControl>,
    pub boot_after_create: bool,
    pub no_wait: bool,
}

impl CreateRequest {
    pub fn apply_request(&self) -> ApplyRequest {
        ApplyRequest {
            zone: self.zone.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            icon_id: self.icon_id,
            private_interface: self.private_interface.clone(),
            static_routes: self.static_routes.clone(),
            sim_routes: self.sim_routes.clone(),
            internet_connection_enabled: self.internet_connection_enabled,
            inter_device_communication_enabled: self.inter_device_communication_enabled,
            dns: self.dns.clone(),
            sims: self.sims.clone(),
            traffic_config: self.traffic_config.clone(),
            boot_after_create: self.boot_after_create,
            no_wait: self.no_wait,
            ..Default::default()
        }
    }
}

/// Fields left as `None` keep their current value.
///
/// `private_interface`, `dns` and `traffic_config` are doubly optional:
/// `Some(None)` removes the setting.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UpdateRequest {
    pub zone: String,
    pub id: Id,

    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub icon_id: Option<Id>,
    pub private_interface: Option<Option<PrivateInterfaceSetting>>,
    pub static_routes: Option<Vec<MobileGatewayStaticRoute>>,
    pub sim_routes: Option<Vec<SimRouteSetting>>,
    pub internet_connection_enabled: Option<bool>,
    pub inter_device_communication_enabled: Option<bool>,
    pub dns: Option<Option<MobileGatewayDnsSetting>>,
    pub sims: Option<Vec<SimSetting>>,
    pub traffic_config: Option<Option<MobileGatewayTrafficControl>>,

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
        patch(&mut base.private_interface, self.private_interface.clone());
        patch(&mut base.static_routes, self.static_routes.clone());
        patch(&mut base.sim_routes, self.sim_routes.clone());
        patch(
            &mut base.internet_connection_enabled,
            self.internet_connection_enabled,
        );
        patch(
            &mut base.inter_device_communication_enabled,
            self.inter_device_communication_enabled,
        );
        patch(&mut base.dns, self.dns.clone());
        patch(&mut base.sims, self.sims.clone());
        patch(&mut base.traffic_config, self.traffic_config.clone());
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
    /// Shut the gateway down first when it is running
    pub force_shutdown: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AddSimRouteRequest {
    pub zone: String,
    pub id: Id,
    pub sim_id: Id,
    pub prefix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UpdateSimRequest {
    pub zone: String,
    pub id: Id,
    pub sim_id: Id,
    /// New IP address; empty clears the current one
    pub ip_address: String,
}

/// Mobile gateway operations over a provider
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

    pub async fn apply(&self, req: &ApplyRequest) -> Result<MobileGateway> {
        req.validate()?;
        let zone = self.config.zone_or_default(&req.zone);
        let mut builder = req.builder(self.caller.as_ref(), &self.config);
        Ok(builder.build(zone).await?)
    }

    pub async fn create(&self, req: &CreateRequest) -> Result<MobileGateway> {
        self.apply(&req.apply_request()).await
    }

    pub async fn read(&self, req: &ReadRequest) -> Result<MobileGateway> {
        if req.id.is_empty() {
            return Err(ServiceError::validation("id is required"));
        }
        let zone = self.config.zone_or_default(&req.zone);
        Ok(self.caller.mobile_gateway().read(zone, req.id).await?)
    }

    pub async fn update(&self, req: &UpdateRequest) -> Result<MobileGateway> {
        if req.id.is_empty() {
            return Err(ServiceError::validation("id is required"));
        }
        let zone = self.config.zone_or_default(&req.zone);
        let current =
            MobileGatewayBuilder::from_resource(self.caller.as_ref(), zone, req.id).await?;
        let mut apply = ApplyRequest::from_builder(zone, &current);
        req.merge_into(&mut apply);
        self.apply(&apply).await
    }

    /// Detach every SIM, then delete the gateway
    pub async fn delete(&self, req: &DeleteRequest) -> Result<()> {
        if req.id.is_empty() {
            return Err(ServiceError::validation("id is required"));
        }
        let zone = self.config.zone_or_default(&req.zone);
        let api = self.caller.mobile_gateway();
        let current = api.read(zone, req.id).await?;
        if current.instance_status.is_up() {
            if !req.force_shutdown {
                return Err(ServiceError::invalid_state(format!(
                    "mobile gateway[{}] is still running",
                    req.id
                )));
            }
            crate::power::shutdown_mobile_gateway(
                api.as_ref(),
                &self.config.setup.waiter(),
                zone,
                req.id,
                true,
            )
            .await?;
        }

        if !api.get_sim_routes(zone, req.id).await?.is_empty() {
            api.set_sim_routes(zone, req.id, &[]).await?;
        }
        let sim_api = self.caller.sim();
        for sim in api.list_sims(zone, req.id).await? {
            info!("Detaching SIM {} from mobile gateway {}", sim.resource_id, req.id);
            sim_api.clear_ip(sim.resource_id).await?;
            api.delete_sim(zone, req.id, sim.resource_id).await?;
        }

        info!("Deleting mobile gateway: {}", req.id);
        api.delete(zone, req.id).await?;
        Ok(())
    }

    pub async fn add_sim_route(
        &self,
        req: &AddSimRouteRequest,
    ) -> Result<Vec<MobileGatewaySimRoute>> {
        if req.id.is_empty() || req.sim_id.is_empty() {
            return Err(ServiceError::validation("id and sim_id are required"));
        }
        if req.prefix.is_empty() {
            return Err(ServiceError::validation("prefix is required"));
        }
        let zone = self.config.zone_or_default(&req.zone);
        let api = self.caller.mobile_gateway();

        let mut routes = api.get_sim_routes(zone, req.id).await?;
        if routes.iter().any(|r| r.prefix == req.prefix) {
            return Err(ServiceError::validation(format!(
                "SIM route for {} already exists",
                req.prefix
            )));
        }
        let attached = api.list_sims(zone, req.id).await?;
        if !attached.iter().any(|s| s.resource_id == req.sim_id) {
            return Err(ServiceError::invalid_state(format!(
                "SIM {} is not attached to mobile gateway {}",
                req.sim_id, req.id
            )));
        }

        routes.push(MobileGatewaySimRoute {
            resource_id: req.sim_id,
            prefix: req.prefix.clone(),
        });
        info!("Adding SIM route {} to mobile gateway {}", req.prefix, req.id);
        api.set_sim_routes(zone, req.id, &routes).await?;
        api.config(zone, req.id).await?;
        Ok(routes)
    }

    pub async fn update_sim(&self, req: &UpdateSimRequest) -> Result<()> {
        if req.id.is_empty() || req.sim_id.is_empty() {
            return Err(ServiceError::validation("id and sim_id are required"));
        }
        if !req.ip_address.is_empty() {
            parse_ipv4("ip_address", &req.ip_address)?;
        }
        let zone = self.config.zone_or_default(&req.zone);
        let api = self.caller.mobile_gateway();

        let attached = api.list_sims(zone, req.id).await?;
        let Some(sim) = attached.iter().find(|s| s.resource_id == req.sim_id) else {
            return Err(ServiceError::invalid_state(format!(
                "SIM {} is not attached to mobile gateway {}",
                req.sim_id, req.id
            )));
        };
        if sim.ip == req.ip_address {
            return Ok(());
        }

        let sim_api = self.caller.sim();
        if !sim.ip.is_empty() {
            sim_api.clear_ip(req.sim_id).await?;
        }
        if !req.ip_address.is_empty() {
            info!("Assigning {} to SIM {}", req.ip_address, req.sim_id);
            sim_api.assign_ip(req.sim_id, &req.ip_address).await?;
        }
        Ok(())
    }
}
