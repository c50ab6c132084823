//! Server builder
//!
//! Composes the disk builders, NIC reconciliation, plan changes and power
//! sequencing into one create or update run.

use super::client::ServerClient;
use super::nic::{AdditionalNicSetting, NicSetting, NicState};
use super::plan::{FindServerPlanRequest, find_server_plan};
use crate::disk::{ConnectedDiskBuilder, DiskBuilder, DiskClient};
use crate::error::{PartialFailure, Result, ServiceError};
use crate::power;
use crate::update_level::UpdateLevel;
use crate::wait::PollingWaiter;
use sacloud_iaas::{
    ApiCaller, Commitment, ConnectedSwitch, Id, InterfaceCreateRequest, InterfaceDriver,
    InterfaceUpdateRequest, InterfaceView, MIB_PER_GIB, PlanGeneration, Scope, Server,
    ServerChangePlanRequest, ServerCreateRequest, ServerUpdateRequest, UpstreamNetworkType,
    append_previous_id_tag_if_absent,
};
use tracing::{debug, info};

pub const DEFAULT_CPU: u32 = 1;
pub const DEFAULT_MEMORY_GB: u64 = 1;
pub const MAX_ADDITIONAL_NICS: usize = 9;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildResult {
    pub server_id: Id,
    /// Disks in connection order
    pub disk_ids: Vec<Id>,
}

/// A failure carries what was built so far
pub type ServerOutcome = std::result::Result<BuildResult, PartialFailure<BuildResult>>;

#[derive(Debug, Clone)]
pub struct ServerBuilder {
    pub name: String,
    pub cpu: u32,
    pub memory_gb: u64,
    pub gpu: u32,
    pub cpu_model: String,
    pub commitment: Commitment,
    pub generation: PlanGeneration,
    pub interface_driver: InterfaceDriver,
    pub description: String,
    pub icon_id: Id,
    pub tags: Vec<String>,
    pub boot_after_create: bool,
    pub cdrom_id: Id,
    pub private_host_id: Id,
    pub nic: Option<NicSetting>,
    pub additional_nics: Vec<AdditionalNicSetting>,
    pub disk_builders: Vec<DiskBuilder>,
    /// cloud-init user data passed on boot
    pub user_data: Option<String>,

    pub no_wait: bool,
    pub force_shutdown: bool,
    /// Target of `update`; set by a successful `build`
    pub server_id: Id,

    pub client: ServerClient,
    pub waiter: PollingWaiter,
}

/// Fields whose change needs the server to be down
#[derive(Debug, PartialEq, Eq)]
struct ServerState {
    private_host_id: Id,
    interface_driver: InterfaceDriver,
    memory_gb: u64,
    cpu: u32,
    gpu: u32,
    cpu_model: String,
    commitment: Commitment,
    nic: Option<NicState>,
    additional_nics: Vec<NicState>,
    disk_count: usize,
}

impl ServerBuilder {
    pub fn new(client: ServerClient) -> Self {
        Self {
            name: String::new(),
            cpu: DEFAULT_CPU,
            memory_gb: DEFAULT_MEMORY_GB,
            gpu: 0,
            cpu_model: String::new(),
            commitment: Commitment::default(),
            generation: PlanGeneration::default(),
            interface_driver: InterfaceDriver::default(),
            description: String::new(),
            icon_id: Id::default(),
            tags: vec![],
            boot_after_create: false,
            cdrom_id: Id::default(),
            private_host_id: Id::default(),
            nic: None,
            additional_nics: vec![],
            disk_builders: vec![],
            user_data: None,
            no_wait: false,
            force_shutdown: false,
            server_id: Id::default(),
            client,
            waiter: PollingWaiter::default(),
        }
    }

    /// Builder whose desired state is the server as it is now
    pub async fn from_resource(caller: &dyn ApiCaller, zone: &str, id: Id) -> Result<Self> {
        let client = ServerClient::new(caller);
        let current = client.server.read(zone, id).await?;

        let nic = current.interfaces.first().map(NicSetting::from_interface);
        let additional_nics = current
            .interfaces
            .iter()
            .skip(1)
            .map(AdditionalNicSetting::from_interface)
            .collect();

        let disk_client = DiskClient::new(caller);
        let mut disk_builders = Vec::with_capacity(current.disks.len());
        for connected in &current.disks {
            let disk = client.disk.read(zone, connected.id).await?;
            disk_builders.push(DiskBuilder::Connected(ConnectedDiskBuilder::from_disk(
                &disk,
                disk_client.clone(),
            )));
        }

        Ok(Self {
            name: current.name.clone(),
            cpu: current.cpu,
            memory_gb: current.memory_gb(),
            gpu: current.gpu,
            cpu_model: current.server_plan_cpu_model.clone(),
            commitment: current.server_plan_commitment,
            generation: current.server_plan_generation,
            interface_driver: current.interface_driver,
            description: current.description.clone(),
            icon_id: current.icon_id,
            tags: current.tags.clone(),
            cdrom_id: current.cdrom_id,
            private_host_id: current.private_host_id,
            nic,
            additional_nics,
            disk_builders,
            server_id: current.id,
            ..Self::new(client)
        })
    }

    /// Use `waiter` here and in every disk builder
    pub fn set_waiter(&mut self, waiter: PollingWaiter) {
        self.waiter = waiter;
        for disk in &mut self.disk_builders {
            disk.set_waiter(waiter);
        }
    }

    fn set_defaults(&mut self) {
        if self.cpu == 0 {
            self.cpu = DEFAULT_CPU;
        }
        if self.memory_gb == 0 {
            self.memory_gb = DEFAULT_MEMORY_GB;
        }
    }

    /// Check the input. Referenced switches, packet filters, the plan and
    /// the disks are looked up.
    pub async fn validate(&mut self, zone: &str) -> Result<()> {
        self.set_defaults();

        if self.nic.is_none() && !self.additional_nics.is_empty() {
            return Err(ServiceError::validation(
                "NIC is required when additional NICs are specified",
            ));
        }
        if self.additional_nics.len() > MAX_ADDITIONAL_NICS {
            return Err(ServiceError::validation(format!(
                "additional NICs must be at most {}",
                MAX_ADDITIONAL_NICS
            )));
        }

        if let Some(nic) = &self.nic {
            nic.validate(&self.client, zone)
                .await
                .map_err(|e| ServiceError::validation(format!("invalid NIC: {}", e)))?;
        }
        for (i, nic) in self.additional_nics.iter().enumerate() {
            nic.validate(&self.client, zone).await.map_err(|e| {
                ServiceError::validation(format!("invalid additional NIC[{}]: {}", i, e))
            })?;
        }

        find_server_plan(self.client.server_plan.as_ref(), zone, &self.plan_request()).await?;

        for disk in &self.disk_builders {
            disk.validate(zone).await?;
            if self.no_wait && !disk.no_wait() {
                return Err(ServiceError::validation(
                    "NoWait is not supported when a disk waits",
                ));
            }
        }

        if self.no_wait && self.boot_after_create {
            return Err(ServiceError::validation(
                "NoWait is not supported with BootAfterCreate",
            ));
        }
        Ok(())
    }

    /// Create the server, its disks and NIC settings, then boot if asked
    pub async fn build(&mut self, zone: &str) -> ServerOutcome {
        if let Err(e) = self.validate(zone).await {
            return Err(PartialFailure::new(BuildResult::default(), e));
        }

        let mut result = BuildResult::default();
        match self.build_steps(zone, &mut result).await {
            Ok(()) => {
                self.server_id = result.server_id;
                Ok(result)
            }
            Err(e) => Err(PartialFailure::new(result, e)),
        }
    }

    async fn build_steps(&mut self, zone: &str, result: &mut BuildResult) -> Result<()> {
        info!("Creating server: {}", self.name);
        let server = self
            .client
            .server
            .create(zone, &self.create_request())
            .await?;
        result.server_id = server.id;

        for disk in &mut self.disk_builders {
            match disk.build(zone, server.id).await {
                Ok(built) => result.disk_ids.push(built.disk_id),
                Err(failure) => {
                    if let Some(built) = failure.partial {
                        result.disk_ids.push(built.disk_id);
                    }
                    return Err(failure.error);
                }
            }
        }

        self.apply_interface_settings(zone, &server).await?;

        if !self.cdrom_id.is_empty() {
            info!("Inserting CD-ROM {} into server {}", self.cdrom_id, server.id);
            self.client
                .server
                .insert_cdrom(zone, server.id, self.cdrom_id)
                .await?;
        }

        if !self.no_wait && self.boot_after_create {
            power::boot_server(
                self.client.server.as_ref(),
                &self.waiter,
                zone,
                server.id,
                self.user_data.as_deref(),
            )
            .await?;
        }
        Ok(())
    }

    fn plan_request(&self) -> FindServerPlanRequest {
        FindServerPlanRequest {
            cpu: self.cpu,
            memory_gb: self.memory_gb,
            gpu: self.gpu,
            cpu_model: self.cpu_model.clone(),
            commitment: self.commitment,
            generation: self.generation,
        }
    }

    fn create_request(&self) -> ServerCreateRequest {
        let mut connected_switches = Vec::with_capacity(1 + self.additional_nics.len());
        if let Some(nic) = &self.nic {
            connected_switches.push(nic.connected_switch());
        }
        for nic in &self.additional_nics {
            let switch_id = nic.switch_id();
            connected_switches.push(
                (!switch_id.is_empty()).then(|| ConnectedSwitch::switch(switch_id)),
            );
        }

        ServerCreateRequest {
            cpu: self.cpu,
            memory_mb: self.memory_gb * MIB_PER_GIB,
            gpu: self.gpu,
            server_plan_cpu_model: self.cpu_model.clone(),
            server_plan_commitment: self.commitment,
            server_plan_generation: self.generation,
            interface_driver: self.interface_driver,
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            icon_id: self.icon_id,
            private_host_id: self.private_host_id,
            connected_switches,
        }
    }

    /// Packet filters and display IPs of a freshly created server
    async fn apply_interface_settings(&self, zone: &str, server: &Server) -> Result<()> {
        let mut settings: Vec<(Id, &str)> = vec![];
        if let Some(nic) = &self.nic {
            settings.push((nic.packet_filter_id(), nic.display_ip_address()));
        }
        for nic in &self.additional_nics {
            settings.push((nic.packet_filter_id(), nic.display_ip_address()));
        }

        for ((packet_filter_id, display_ip), iface) in settings.into_iter().zip(&server.interfaces)
        {
            if !packet_filter_id.is_empty() {
                info!(
                    "Connecting interface {} to packet filter {}",
                    iface.id, packet_filter_id
                );
                self.client
                    .interface
                    .connect_to_packet_filter(zone, iface.id, packet_filter_id)
                    .await?;
            }
            if !display_ip.is_empty() {
                self.client
                    .interface
                    .update(
                        zone,
                        iface.id,
                        &InterfaceUpdateRequest {
                            user_ip_address: display_ip.to_string(),
                        },
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// Whether `update` has to shut the server down
    pub async fn is_need_shutdown(&self, zone: &str) -> Result<bool> {
        if self.server_id.is_empty() {
            return Err(ServiceError::validation("server id required"));
        }
        let server = self.client.server.read(zone, self.server_id).await?;
        self.need_shutdown(zone, &server).await
    }

    async fn need_shutdown(&self, zone: &str, server: &Server) -> Result<bool> {
        if self.user_data.as_deref().is_some_and(|d| !d.is_empty()) {
            return Ok(true);
        }

        let current = self.current_state(server);
        let desired = self.desired_state(server);
        if current != desired {
            debug!("Server {} needs shutdown: {:?} -> {:?}", server.id, current, desired);
            return Ok(true);
        }

        // disk counts are equal here
        for (connected, builder) in server.disks.iter().zip(&self.disk_builders) {
            let disk = self.client.disk.read(zone, connected.id).await?;
            if builder.update_level(&disk) == UpdateLevel::NeedShutdown {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn current_state(&self, server: &Server) -> ServerState {
        let mut states = server
            .interfaces
            .iter()
            .map(|iface| NicState::from_interface(iface).topology());
        ServerState {
            private_host_id: server.private_host_id,
            interface_driver: server.interface_driver,
            memory_gb: server.memory_gb(),
            cpu: server.cpu,
            gpu: server.gpu,
            cpu_model: server.server_plan_cpu_model.clone(),
            commitment: server.server_plan_commitment,
            nic: states.next(),
            additional_nics: states.collect(),
            disk_count: server.disks.len(),
        }
    }

    fn desired_state(&self, server: &Server) -> ServerState {
        ServerState {
            private_host_id: self.private_host_id,
            interface_driver: self.interface_driver,
            memory_gb: self.memory_gb,
            cpu: self.cpu,
            gpu: self.gpu,
            // an unset model keeps whatever the server has
            cpu_model: if self.cpu_model.is_empty() {
                server.server_plan_cpu_model.clone()
            } else {
                self.cpu_model.clone()
            },
            commitment: self.commitment,
            nic: self.nic.as_ref().map(|nic| nic.state().topology()),
            additional_nics: self
                .additional_nics
                .iter()
                .map(|nic| nic.state().topology())
                .collect(),
            disk_count: self.disk_builders.len(),
        }
    }

    /// Reconcile the server identified by `server_id` with this builder
    pub async fn update(&mut self, zone: &str) -> ServerOutcome {
        if let Err(e) = self.validate(zone).await {
            return Err(PartialFailure::new(BuildResult::default(), e));
        }
        if self.server_id.is_empty() {
            return Err(PartialFailure::new(
                BuildResult::default(),
                ServiceError::validation("server id required"),
            ));
        }

        let mut result = BuildResult {
            server_id: self.server_id,
            disk_ids: vec![],
        };
        match self.update_steps(zone, &mut result).await {
            Ok(()) => {
                self.server_id = result.server_id;
                Ok(result)
            }
            Err(e) => Err(PartialFailure::new(result, e)),
        }
    }

    async fn update_steps(&mut self, zone: &str, result: &mut BuildResult) -> Result<()> {
        let mut server = self.client.server.read(zone, self.server_id).await?;
        let need_shutdown = self.need_shutdown(zone, &server).await?;
        let running = server.instance_status.is_up();

        let mut shut_down = false;
        if need_shutdown && running {
            if self.no_wait {
                return Err(ServiceError::invalid_state(
                    "NoWait is not available because the server has to be shut down",
                ));
            }
            power::shutdown_server(
                self.client.server.as_ref(),
                &self.waiter,
                zone,
                server.id,
                self.force_shutdown,
            )
            .await?;
            shut_down = true;
        }

        self.reconcile_disks(zone, &server, result).await?;
        self.reconcile_interfaces(zone, &server).await?;

        if self.is_plan_changed(&server) {
            self.tags = append_previous_id_tag_if_absent(&self.tags, server.id);
            info!("Changing plan of server: {}", server.id);
            server = self
                .client
                .server
                .change_plan(
                    zone,
                    server.id,
                    &ServerChangePlanRequest {
                        cpu: self.cpu,
                        memory_mb: self.memory_gb * MIB_PER_GIB,
                        gpu: self.gpu,
                        server_plan_cpu_model: self.cpu_model.clone(),
                        server_plan_generation: self.generation,
                        server_plan_commitment: self.commitment,
                    },
                )
                .await?;
            result.server_id = server.id;
            self.server_id = server.id;
        }

        let desired = self.update_request();
        if current_update_request(&server) != desired {
            info!("Updating server: {}", server.id);
            server = self.client.server.update(zone, server.id, &desired).await?;
        } else {
            debug!("Server {} is up to date", server.id);
        }
        result.server_id = server.id;

        if !self.cdrom_id.is_empty() && self.cdrom_id != server.cdrom_id {
            if !server.cdrom_id.is_empty() {
                info!("Ejecting CD-ROM {} from server {}", server.cdrom_id, server.id);
                self.client
                    .server
                    .eject_cdrom(zone, server.id, server.cdrom_id)
                    .await?;
            }
            info!("Inserting CD-ROM {} into server {}", self.cdrom_id, server.id);
            self.client
                .server
                .insert_cdrom(zone, server.id, self.cdrom_id)
                .await?;
        }

        if shut_down {
            power::boot_server(
                self.client.server.as_ref(),
                &self.waiter,
                zone,
                server.id,
                self.user_data.as_deref(),
            )
            .await?;
        }
        Ok(())
    }

    fn update_request(&self) -> ServerUpdateRequest {
        ServerUpdateRequest {
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            icon_id: self.icon_id,
            private_host_id: self.private_host_id,
            interface_driver: self.interface_driver,
        }
    }

    /// Build missing disks, update changed ones and fix the connection order
    async fn reconcile_disks(
        &mut self,
        zone: &str,
        server: &Server,
        result: &mut BuildResult,
    ) -> Result<()> {
        let mut reconnect = server.disks.len() != self.disk_builders.len();
        result.disk_ids = server.disks.iter().map(|d| d.id).collect();

        for (i, builder) in self.disk_builders.iter_mut().enumerate() {
            if builder.disk_id().is_empty() {
                match builder.build(zone, server.id).await {
                    Ok(built) => result.disk_ids.push(built.disk_id),
                    Err(failure) => {
                        if let Some(built) = failure.partial {
                            if !result.disk_ids.contains(&built.disk_id) {
                                result.disk_ids.push(built.disk_id);
                            }
                        }
                        return Err(failure.error);
                    }
                }
                reconnect = true;
                continue;
            }
            let Some(connected) = server.disks.get(i) else {
                continue;
            };

            let disk = self.client.disk.read(zone, connected.id).await?;
            if builder.update_level(&disk) != UpdateLevel::None {
                builder.update(zone).await?;
            }
            if connected.id != builder.disk_id() {
                reconnect = true;
            }
        }

        result.disk_ids = self.disk_builders.iter().map(|d| d.disk_id()).collect();
        if !reconnect {
            return Ok(());
        }

        let refreshed = self.client.server.read(zone, server.id).await?;
        for connected in &refreshed.disks {
            info!("Disconnecting disk {} from server {}", connected.id, server.id);
            self.client
                .disk
                .disconnect_from_server(zone, connected.id)
                .await?;
        }
        for builder in &self.disk_builders {
            info!("Connecting disk {} to server {}", builder.disk_id(), server.id);
            self.client
                .disk
                .connect_to_server(zone, builder.disk_id(), server.id)
                .await?;
        }
        Ok(())
    }

    /// Bring NIC slots, upstreams, packet filters and display IPs in line
    async fn reconcile_interfaces(&self, zone: &str, server: &Server) -> Result<()> {
        let mut desired: Vec<Option<NicState>> = vec![self.nic.as_ref().map(NicSetting::state)];
        desired.extend(self.additional_nics.iter().map(|nic| Some(nic.state())));
        let api = &self.client.interface;

        for (i, iface) in server.interfaces.iter().enumerate() {
            let current = NicState::from_interface(iface);
            match desired.get(i).and_then(Option::as_ref) {
                None => {
                    if !iface.switch_id.is_empty() {
                        api.disconnect_from_switch(zone, iface.id).await?;
                    }
                    info!("Deleting interface {} of server {}", iface.id, server.id);
                    api.delete(zone, iface.id).await?;
                }
                Some(want) => {
                    let moved = current.upstream != want.upstream
                        || current.switch_id != want.switch_id;
                    if moved && !iface.switch_id.is_empty() {
                        info!("Disconnecting interface {} from switch", iface.id);
                        api.disconnect_from_switch(zone, iface.id).await?;
                    }
                }
            }
        }

        for (i, want) in desired.iter().enumerate() {
            let Some(want) = want else {
                continue;
            };
            let iface: InterfaceView = match server.interfaces.get(i) {
                Some(iface) => iface.clone(),
                None => {
                    info!("Creating interface for server {}", server.id);
                    api.create(
                        zone,
                        &InterfaceCreateRequest {
                            server_id: server.id,
                        },
                    )
                    .await?
                }
            };

            match want.upstream {
                UpstreamNetworkType::None => {}
                UpstreamNetworkType::Shared => {
                    if iface.switch_scope != Scope::Shared {
                        info!("Connecting interface {} to the shared segment", iface.id);
                        api.connect_to_shared_segment(zone, iface.id).await?;
                    }
                }
                UpstreamNetworkType::Switch => {
                    if iface.switch_id != want.switch_id {
                        info!("Connecting interface {} to switch {}", iface.id, want.switch_id);
                        api.connect_to_switch(zone, iface.id, want.switch_id).await?;
                    }
                }
            }

            if want.packet_filter_id != iface.packet_filter_id {
                if !iface.packet_filter_id.is_empty() {
                    api.disconnect_from_packet_filter(zone, iface.id).await?;
                }
                if !want.packet_filter_id.is_empty() {
                    api.connect_to_packet_filter(zone, iface.id, want.packet_filter_id)
                        .await?;
                }
            }

            if want.display_ip != iface.user_ip_address {
                api.update(
                    zone,
                    iface.id,
                    &InterfaceUpdateRequest {
                        user_ip_address: want.display_ip.clone(),
                    },
                )
                .await?;
            }
        }
        Ok(())
    }

    pub fn is_plan_changed(&self, server: &Server) -> bool {
        plan_changed(&self.plan_request(), server)
    }
}

/// An unset CPU model and the default generation never count as a change
fn plan_changed(desired: &FindServerPlanRequest, server: &Server) -> bool {
    desired.cpu != server.cpu
        || desired.memory_gb != server.memory_gb()
        || desired.gpu != server.gpu
        || (!desired.cpu_model.is_empty() && desired.cpu_model != server.server_plan_cpu_model)
        || desired.commitment != server.server_plan_commitment
        || (desired.generation != PlanGeneration::Default
            && desired.generation != server.server_plan_generation)
}

fn current_update_request(server: &Server) -> ServerUpdateRequest {
    ServerUpdateRequest {
        name: server.name.clone(),
        description: server.description.clone(),
        tags: server.tags.clone(),
        icon_id: server.icon_id,
        private_host_id: server.private_host_id,
        interface_driver: server.interface_driver,
    }
}
