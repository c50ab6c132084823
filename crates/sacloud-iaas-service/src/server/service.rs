//! Request layer for servers

use super::builder::{BuildResult, ServerBuilder, ServerOutcome};
use super::client::ServerClient;
use super::nic::{AdditionalNicSetting, NicSetting};
use crate::config::ServiceConfig;
use crate::disk::{self, DiskClient};
use crate::error::{PartialFailure, Result, ServiceError};
use crate::merge::patch;
use sacloud_iaas::{
    ApiCaller, Commitment, Id, InterfaceDriver, InterfaceView, PlanGeneration, Scope, Server,
    ServerChangePlanRequest, ServerUpdateRequest, append_previous_id_tag_if_absent,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

const UPSTREAM_SHARED: &str = "shared";
const UPSTREAM_DISCONNECTED: &str = "disconnected";

/// A NIC in request form
///
/// `upstream` is `shared`, `disconnected` or the ID of a switch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NetworkInterface {
    pub upstream: String,
    pub packet_filter_id: Id,
    pub user_ip_address: String,
}

impl NetworkInterface {
    pub fn validate(&self) -> Result<()> {
        match self.upstream.as_str() {
            "" => Err(ServiceError::validation("upstream is required")),
            UPSTREAM_SHARED | UPSTREAM_DISCONNECTED => Ok(()),
            _ => self.switch_id().map(|_| ()),
        }
    }

    fn switch_id(&self) -> Result<Id> {
        self.upstream.parse::<Id>().map_err(|_| {
            ServiceError::validation(format!(
                "upstream must be shared, disconnected or a switch id: {}",
                self.upstream
            ))
        })
    }

    fn nic_setting(&self) -> Result<NicSetting> {
        Ok(match self.upstream.as_str() {
            UPSTREAM_SHARED => NicSetting::Shared {
                packet_filter_id: self.packet_filter_id,
            },
            UPSTREAM_DISCONNECTED => NicSetting::Disconnected,
            _ => NicSetting::Connected {
                switch_id: self.switch_id()?,
                display_ip_address: self.user_ip_address.clone(),
                packet_filter_id: self.packet_filter_id,
            },
        })
    }

    fn additional_nic_setting(&self) -> Result<AdditionalNicSetting> {
        Ok(match self.upstream.as_str() {
            UPSTREAM_DISCONNECTED => AdditionalNicSetting::Disconnected,
            UPSTREAM_SHARED => {
                return Err(ServiceError::validation(
                    "upstream=shared is not supported for additional NICs",
                ));
            }
            _ => AdditionalNicSetting::Connected {
                switch_id: self.switch_id()?,
                display_ip_address: self.user_ip_address.clone(),
                packet_filter_id: self.packet_filter_id,
            },
        })
    }

    fn from_interface(iface: &InterfaceView) -> Self {
        let upstream = if iface.switch_id.is_empty() {
            UPSTREAM_DISCONNECTED.to_string()
        } else if iface.switch_scope == Scope::Shared {
            UPSTREAM_SHARED.to_string()
        } else {
            iface.switch_id.to_string()
        };
        Self {
            upstream,
            packet_filter_id: iface.packet_filter_id,
            user_ip_address: iface.user_ip_address.clone(),
        }
    }
}

/// Desired state of a server. An empty `id` creates a new one.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApplyRequest {
    pub zone: String,
    pub id: Id,

    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub icon_id: Id,
    pub cpu: u32,
    pub memory_gb: u64,
    pub gpu: u32,
    pub cpu_model: String,
    pub commitment: Commitment,
    pub generation: PlanGeneration,
    pub interface_driver: InterfaceDriver,

    pub boot_after_create: bool,
    pub cdrom_id: Id,
    pub private_host_id: Id,
    pub user_data: Option<String>,

    pub network_interfaces: Vec<NetworkInterface>,
    pub disks: Vec<disk::ApplyRequest>,
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
        for (i, nic) in self.network_interfaces.iter().enumerate() {
            nic.validate()?;
            if i != 0 && nic.upstream == UPSTREAM_SHARED {
                return Err(ServiceError::validation(
                    "upstream=shared is not supported for additional NICs",
                ));
            }
        }
        Ok(())
    }

    pub fn builder(&self, caller: &dyn ApiCaller) -> Result<ServerBuilder> {
        let nic = self
            .network_interfaces
            .first()
            .map(NetworkInterface::nic_setting)
            .transpose()?;
        let additional_nics = self
            .network_interfaces
            .iter()
            .skip(1)
            .map(NetworkInterface::additional_nic_setting)
            .collect::<Result<Vec<_>>>()?;

        let disk_client = DiskClient::new(caller);
        let disk_builders = self
            .disks
            .iter()
            .map(|d| d.builder(disk_client.clone()))
            .collect();

        Ok(ServerBuilder {
            name: self.name.clone(),
            cpu: self.cpu,
            memory_gb: self.memory_gb,
            gpu: self.gpu,
            cpu_model: self.cpu_model.clone(),
            commitment: self.commitment,
            generation: self.generation,
            interface_driver: self.interface_driver,
            description: self.description.clone(),
            icon_id: self.icon_id,
            tags: self.tags.clone(),
            boot_after_create: self.boot_after_create,
            cdrom_id: self.cdrom_id,
            private_host_id: self.private_host_id,
            nic,
            additional_nics,
            disk_builders,
            user_data: self.user_data.clone(),
            no_wait: self.no_wait,
            force_shutdown: self.force_shutdown,
            server_id: self.id,
            ..ServerBuilder::new(ServerClient::new(caller))
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CreateRequest {
    pub zone: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub icon_id: Id,
    pub cpu: u32,
    pub memory_gb: u64,
    pub gpu: u32,
    pub cpu_model: String,
    pub commitment: Commitment,
    pub generation: PlanGeneration,
    pub interface_driver: InterfaceDriver,
    pub boot_after_create: bool,
    pub cdrom_id: Id,
    pub private_host_id: Id,
    pub user_data: Option<String>,
    pub network_interfaces: Vec<NetworkInterface>,
    pub disks: Vec<disk::ApplyRequest>,
    pub no_wait: bool,
}

impl CreateRequest {
    pub fn apply_request(&self) -> ApplyRequest {
        ApplyRequest {
            zone: self.zone.clone(),
            id: Id::default(),
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            icon_id: self.icon_id,
            cpu: self.cpu,
            memory_gb: self.memory_gb,
            gpu: self.gpu,
            cpu_model: self.cpu_model.clone(),
            commitment: self.commitment,
            generation: self.generation,
            interface_driver: self.interface_driver,
            boot_after_create: self.boot_after_create,
            cdrom_id: self.cdrom_id,
            private_host_id: self.private_host_id,
            user_data: self.user_data.clone(),
            network_interfaces: self.network_interfaces.clone(),
            disks: self.disks.clone(),
            no_wait: self.no_wait,
            force_shutdown: false,
        }
    }
}

/// Fields left as `None` keep their current value
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UpdateRequest {
    pub zone: String,
    pub id: Id,

    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub icon_id: Option<Id>,
    pub cpu: Option<u32>,
    pub memory_gb: Option<u64>,
    pub gpu: Option<u32>,
    pub cpu_model: Option<String>,
    pub commitment: Option<Commitment>,
    pub generation: Option<PlanGeneration>,
    pub interface_driver: Option<InterfaceDriver>,
    pub cdrom_id: Option<Id>,
    pub private_host_id: Option<Id>,
    pub user_data: Option<String>,

    pub network_interfaces: Option<Vec<NetworkInterface>>,
    pub disks: Option<Vec<disk::ApplyRequest>>,
    pub no_wait: bool,
    pub force_shutdown: bool,
}

impl UpdateRequest {
    pub fn merge_into(&self, base: &mut ApplyRequest) {
        patch(&mut base.name, self.name.clone());
        patch(&mut base.description, self.description.clone());
        patch(&mut base.tags, self.tags.clone());
        patch(&mut base.icon_id, self.icon_id);
        patch(&mut base.cpu, self.cpu);
        patch(&mut base.memory_gb, self.memory_gb);
        patch(&mut base.gpu, self.gpu);
        patch(&mut base.cpu_model, self.cpu_model.clone());
        patch(&mut base.commitment, self.commitment);
        patch(&mut base.generation, self.generation);
        patch(&mut base.interface_driver, self.interface_driver);
        patch(&mut base.cdrom_id, self.cdrom_id);
        patch(&mut base.private_host_id, self.private_host_id);
        if self.user_data.is_some() {
            base.user_data = self.user_data.clone();
        }
        patch(&mut base.network_interfaces, self.network_interfaces.clone());
        patch(&mut base.disks, self.disks.clone());
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
    /// Also delete the disks connected to the server
    pub with_disks: bool,
}

/// Unset fields keep the current plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChangePlanRequest {
    pub zone: String,
    pub id: Id,
    pub cpu: Option<u32>,
    pub memory_gb: Option<u64>,
    pub gpu: Option<u32>,
    pub cpu_model: Option<String>,
    pub commitment: Option<Commitment>,
    pub generation: Option<PlanGeneration>,
}

/// Server operations over a provider
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

    pub async fn apply(&self, req: &ApplyRequest) -> Result<Server> {
        let zone = self.config.zone_or_default(&req.zone);
        let result = self.reconcile(req).await.map_err(|failure| {
            warn!(
                "Server {} left partially applied with disks {:?}: {}",
                failure.partial.server_id, failure.partial.disk_ids, failure.error
            );
            failure.error
        })?;
        Ok(self.caller.server().read(zone, result.server_id).await?)
    }

    /// Create or update like [`Service::apply`], keeping the server and
    /// disk IDs that exist when a step fails
    pub async fn reconcile(&self, req: &ApplyRequest) -> ServerOutcome {
        let unchanged = || BuildResult {
            server_id: req.id,
            disk_ids: vec![],
        };
        if let Err(e) = req.validate() {
            return Err(PartialFailure::new(unchanged(), e));
        }
        let zone = self.config.zone_or_default(&req.zone);
        let mut builder = match req.builder(self.caller.as_ref()) {
            Ok(builder) => builder,
            Err(e) => return Err(PartialFailure::new(unchanged(), e)),
        };
        builder.set_waiter(self.config.setup.waiter());

        if req.id.is_empty() {
            builder.build(zone).await
        } else {
            builder.update(zone).await
        }
    }

    pub async fn create(&self, req: &CreateRequest) -> Result<Server> {
        self.apply(&req.apply_request()).await
    }

    pub async fn read(&self, req: &ReadRequest) -> Result<Server> {
        if req.id.is_empty() {
            return Err(ServiceError::validation("id is required"));
        }
        let zone = self.config.zone_or_default(&req.zone);
        Ok(self.caller.server().read(zone, req.id).await?)
    }

    pub async fn update(&self, req: &UpdateRequest) -> Result<Server> {
        if req.id.is_empty() {
            return Err(ServiceError::validation("id is required"));
        }
        let zone = self.config.zone_or_default(&req.zone);
        let mut apply = self.apply_request_from_resource(zone, req.id, req.no_wait).await?;
        req.merge_into(&mut apply);
        self.apply(&apply).await
    }

    /// Desired state equal to the server as it is
    async fn apply_request_from_resource(
        &self,
        zone: &str,
        id: Id,
        no_wait: bool,
    ) -> Result<ApplyRequest> {
        let current = self.caller.server().read(zone, id).await?;
        if !current.availability.is_available() {
            return Err(ServiceError::invalid_state(format!(
                "target has invalid availability: zone={} id={} availability={}",
                zone, id, current.availability
            )));
        }

        let disk_api = self.caller.disk();
        let mut disks = Vec::with_capacity(current.disks.len());
        for connected in &current.disks {
            let d = disk_api.read(zone, connected.id).await?;
            disks.push(disk::ApplyRequest {
                server_id: current.id,
                no_wait,
                ..disk::ApplyRequest::from_disk(zone, &d)
            });
        }

        Ok(ApplyRequest {
            zone: zone.to_string(),
            id: current.id,
            name: current.name.clone(),
            description: current.description.clone(),
            tags: current.tags.clone(),
            icon_id: current.icon_id,
            cpu: current.cpu,
            memory_gb: current.memory_gb(),
            gpu: current.gpu,
            cpu_model: current.server_plan_cpu_model.clone(),
            commitment: current.server_plan_commitment,
            generation: current.server_plan_generation,
            interface_driver: current.interface_driver,
            cdrom_id: current.cdrom_id,
            private_host_id: current.private_host_id,
            network_interfaces: current
                .interfaces
                .iter()
                .map(NetworkInterface::from_interface)
                .collect(),
            disks,
            ..Default::default()
        })
    }

    pub async fn delete(&self, req: &DeleteRequest) -> Result<()> {
        if req.id.is_empty() {
            return Err(ServiceError::validation("id is required"));
        }
        let zone = self.config.zone_or_default(&req.zone);
        let api = self.caller.server();
        let current = api.read(zone, req.id).await?;
        if current.instance_status.is_up() {
            return Err(ServiceError::invalid_state(format!(
                "server[{}] is still running",
                req.id
            )));
        }

        info!("Deleting server: {}", req.id);
        api.delete(zone, req.id).await?;
        if req.with_disks {
            let disk_api = self.caller.disk();
            for connected in &current.disks {
                info!("Deleting disk: {}", connected.id);
                disk_api.delete(zone, connected.id).await?;
            }
        }
        Ok(())
    }

    /// Change the plan of a stopped server. The server gets a new ID.
    pub async fn change_plan(&self, req: &ChangePlanRequest) -> Result<Server> {
        if req.id.is_empty() {
            return Err(ServiceError::validation("id is required"));
        }
        let zone = self.config.zone_or_default(&req.zone);
        let api = self.caller.server();
        let current = api.read(zone, req.id).await?;
        if !current.instance_status.is_down() {
            return Err(ServiceError::invalid_state(format!(
                "server[{}] is still running",
                req.id
            )));
        }

        let mut change = ServerChangePlanRequest {
            cpu: current.cpu,
            memory_mb: current.memory_mb,
            gpu: current.gpu,
            server_plan_cpu_model: current.server_plan_cpu_model.clone(),
            server_plan_generation: current.server_plan_generation,
            server_plan_commitment: current.server_plan_commitment,
        };
        patch(&mut change.cpu, req.cpu);
        patch(
            &mut change.memory_mb,
            req.memory_gb.map(|gb| gb * sacloud_iaas::MIB_PER_GIB),
        );
        patch(&mut change.gpu, req.gpu);
        patch(&mut change.server_plan_cpu_model, req.cpu_model.clone());
        patch(&mut change.server_plan_commitment, req.commitment);
        patch(&mut change.server_plan_generation, req.generation);

        info!("Changing plan of server: {}", req.id);
        let changed = api.change_plan(zone, req.id, &change).await?;

        let tags = append_previous_id_tag_if_absent(&changed.tags, current.id);
        if tags == changed.tags {
            return Ok(changed);
        }
        let update = ServerUpdateRequest {
            name: changed.name.clone(),
            description: changed.description.clone(),
            tags,
            icon_id: changed.icon_id,
            private_host_id: changed.private_host_id,
            interface_driver: changed.interface_driver,
        };
        Ok(api.update(zone, changed.id, &update).await?)
    }
}
