//! In-memory provider shared by the integration tests
//!
//! `FakeCloud` keeps every resource in one state map and records each call
//! as `"<resource>.<operation>"` in order. Some provider rules are enforced
//! so that wrong call orders fail the same way they would against the real
//! API (assigning an IP to a detached SIM, routing to an unknown SIM, ...).

#![allow(dead_code)]

use async_trait::async_trait;
use sacloud_iaas::*;
use sacloud_iaas_service::{ServiceConfig, SetupOptions};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ZONE: &str = "is1a";
pub const ZONE_ID: Id = Id::new(31002);
pub const SHARED_SEGMENT_ID: Id = Id::new(100000000001);
pub const NAME_SERVERS: [&str; 2] = ["133.242.0.3", "133.242.0.4"];

/// Route service logs to the test output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Options that keep every wait in the low milliseconds
pub fn fast_options() -> SetupOptions {
    SetupOptions {
        polling_interval: Duration::from_millis(1),
        timeout: Duration::from_secs(5),
        nic_update_wait: Duration::from_millis(1),
        delete_retry_interval: Duration::from_millis(1),
        ..Default::default()
    }
}

pub fn fast_config() -> ServiceConfig {
    ServiceConfig {
        zone: ZONE.to_string(),
        setup: fast_options(),
    }
}

#[derive(Debug, Default)]
struct MobileGatewayExtra {
    dns: Option<MobileGatewayDnsSetting>,
    traffic: Option<MobileGatewayTrafficControl>,
    sims: Vec<MobileGatewaySim>,
    sim_routes: Vec<MobileGatewaySimRoute>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    next_hash: u64,

    disks: BTreeMap<Id, Disk>,
    disk_plans: BTreeMap<Id, DiskPlan>,
    archives: Vec<Archive>,
    notes: BTreeMap<Id, Note>,
    ssh_keys: BTreeMap<Id, SshKey>,

    servers: BTreeMap<Id, Server>,
    server_plans: Vec<ServerPlan>,
    switches: BTreeMap<Id, Switch>,
    packet_filters: BTreeMap<Id, PacketFilter>,

    mobile_gateways: BTreeMap<Id, MobileGateway>,
    mobile_gateway_extras: BTreeMap<Id, MobileGatewayExtra>,
    /// Number of upcoming gateway creations whose copy fails
    mobile_gateway_copy_failures: u32,

    vpc_routers: BTreeMap<Id, VpcRouter>,

    /// Call name -> 1-based invocation numbers that fail
    failures: HashMap<String, Vec<usize>>,
    invocations: HashMap<String, usize>,
}

impl State {
    fn new_id(&mut self) -> Id {
        self.next_id += 1;
        Id(self.next_id)
    }

    fn new_hash(&mut self) -> String {
        self.next_hash += 1;
        format!("hash-{}", self.next_hash)
    }

    fn server_mut(&mut self, id: Id) -> Result<&mut Server> {
        self.servers
            .get_mut(&id)
            .ok_or_else(|| not_found("server", id))
    }

    fn interface_mut(&mut self, id: Id) -> Result<&mut InterfaceView> {
        self.servers
            .values_mut()
            .flat_map(|s| s.interfaces.iter_mut())
            .find(|iface| iface.id == id)
            .ok_or_else(|| not_found("interface", id))
    }

    fn disk_mut(&mut self, id: Id) -> Result<&mut Disk> {
        self.disks.get_mut(&id).ok_or_else(|| not_found("disk", id))
    }

    fn mobile_gateway_mut(&mut self, id: Id) -> Result<&mut MobileGateway> {
        self.mobile_gateways
            .get_mut(&id)
            .ok_or_else(|| not_found("mobile gateway", id))
    }

    fn extra_mut(&mut self, id: Id) -> Result<&mut MobileGatewayExtra> {
        self.mobile_gateway_extras
            .get_mut(&id)
            .ok_or_else(|| not_found("mobile gateway", id))
    }

    fn vpc_router_mut(&mut self, id: Id) -> Result<&mut VpcRouter> {
        self.vpc_routers
            .get_mut(&id)
            .ok_or_else(|| not_found("VPC router", id))
    }

    fn connect_disk(&mut self, disk_id: Id, server_id: Id) -> Result<()> {
        let disk = self.disk_mut(disk_id)?;
        disk.server_id = server_id;
        let connected = ServerConnectedDisk {
            id: disk.id,
            name: disk.name.clone(),
            availability: Availability::Available,
            connection: disk.connection,
            connection_order: 0,
            size_mb: disk.size_mb,
            disk_plan_id: disk.disk_plan_id,
        };
        let server = self.server_mut(server_id)?;
        server.disks.push(ServerConnectedDisk {
            connection_order: server.disks.len() as u32 + 1,
            ..connected
        });
        Ok(())
    }

    fn attached_sim(&mut self, sim_id: Id) -> Result<&mut MobileGatewaySim> {
        self.mobile_gateway_extras
            .values_mut()
            .flat_map(|e| e.sims.iter_mut())
            .find(|s| s.resource_id == sim_id)
            .ok_or_else(|| IaasError::api(400, format!("SIM {} is not attached", sim_id)))
    }
}

fn not_found(kind: &str, id: Id) -> IaasError {
    IaasError::NotFound(format!("{} {}", kind, id))
}

#[derive(Clone, Default)]
pub struct FakeCloud {
    state: Arc<Mutex<State>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeCloud {
    /// A cloud with the SSD/HDD disk plans, an Ubuntu archive and a small
    /// set of server plans
    pub fn new() -> Self {
        init_tracing();
        let cloud = Self::default();
        {
            let mut s = cloud.state.lock().unwrap();
            s.next_id = 1000;
            for (id, name) in [(4, "SSD"), (2, "HDD")] {
                s.disk_plans.insert(
                    Id(id),
                    DiskPlan {
                        id: Id(id),
                        name: name.to_string(),
                        sizes: [20, 40, 100]
                            .iter()
                            .map(|gb| DiskPlanSize {
                                availability: Availability::Available,
                                size_mb: gb * MIB_PER_GIB,
                            })
                            .collect(),
                    },
                );
            }
            s.archives.push(Archive {
                id: Id(113),
                name: "Ubuntu Server 24.04".into(),
                scope: Scope::Shared,
                tags: vec!["current-stable".into(), "distro-ubuntu".into()],
                availability: Availability::Available,
                size_mb: 20 * MIB_PER_GIB,
            });
            for (cpu, memory_gb) in [(1, 1), (2, 4), (4, 8)] {
                let id = s.new_id();
                s.server_plans.push(ServerPlan {
                    id,
                    name: format!("{}core-{}GB", cpu, memory_gb),
                    cpu,
                    memory_mb: memory_gb * MIB_PER_GIB,
                    cpu_model: "uncategorized".into(),
                    availability: Availability::Available,
                    ..Default::default()
                });
            }
        }
        cloud
    }

    pub fn caller(&self) -> Arc<dyn ApiCaller> {
        Arc::new(self.clone())
    }

    pub fn add_switch(&self, id: u64) -> Id {
        let mut s = self.state.lock().unwrap();
        s.switches.insert(
            Id(id),
            Switch {
                id: Id(id),
                name: format!("switch-{}", id),
            },
        );
        Id(id)
    }

    pub fn add_packet_filter(&self, id: u64) -> Id {
        let mut s = self.state.lock().unwrap();
        s.packet_filters.insert(
            Id(id),
            PacketFilter {
                id: Id(id),
                name: format!("filter-{}", id),
            },
        );
        Id(id)
    }

    pub fn set_disk_plan(&self, plan: DiskPlan) {
        self.state.lock().unwrap().disk_plans.insert(plan.id, plan);
    }

    pub fn insert_disk(&self, disk: Disk) -> Id {
        let id = disk.id;
        self.state.lock().unwrap().disks.insert(id, disk);
        id
    }

    pub fn insert_mobile_gateway_sims(
        &self,
        id: Id,
        sims: Vec<MobileGatewaySim>,
        routes: Vec<MobileGatewaySimRoute>,
    ) {
        let mut s = self.state.lock().unwrap();
        if let Ok(extra) = s.extra_mut(id) {
            extra.sims = sims;
            extra.sim_routes = routes;
        }
    }

    pub fn fail_mobile_gateway_copies(&self, count: u32) {
        self.state.lock().unwrap().mobile_gateway_copy_failures = count;
    }

    /// Make the `nth` (1-based) invocation of `call` fail with a 500
    pub fn fail_call(&self, call: &str, nth: usize) {
        self.state
            .lock()
            .unwrap()
            .failures
            .entry(call.to_string())
            .or_default()
            .push(nth);
    }

    pub fn stored_disk(&self, id: Id) -> Option<Disk> {
        self.state.lock().unwrap().disks.get(&id).cloned()
    }

    pub fn stored_server(&self, id: Id) -> Option<Server> {
        self.state.lock().unwrap().servers.get(&id).cloned()
    }

    pub fn stored_servers(&self) -> Vec<Server> {
        self.state.lock().unwrap().servers.values().cloned().collect()
    }

    pub fn mobile_gateway_sims(&self, id: Id) -> Vec<MobileGatewaySim> {
        let s = self.state.lock().unwrap();
        s.mobile_gateway_extras
            .get(&id)
            .map(|e| e.sims.clone())
            .unwrap_or_default()
    }

    pub fn mobile_gateway_sim_routes(&self, id: Id) -> Vec<MobileGatewaySimRoute> {
        let s = self.state.lock().unwrap();
        s.mobile_gateway_extras
            .get(&id)
            .map(|e| e.sim_routes.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that change provider state
    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| {
                let op = call.split('.').nth(1).unwrap_or_default();
                !(op == "read" || op == "find" || op.starts_with("get_") || op.starts_with("list_"))
            })
            .collect()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: &str) -> Result<()> {
        self.calls.lock().unwrap().push(call.to_string());
        let mut s = self.state.lock().unwrap();
        let n = {
            let counter = s.invocations.entry(call.to_string()).or_default();
            *counter += 1;
            *counter
        };
        if s.failures.get(call).is_some_and(|nths| nths.contains(&n)) {
            return Err(IaasError::api(500, format!("injected failure of {}", call)));
        }
        Ok(())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

impl ApiCaller for FakeCloud {
    fn archive(&self) -> Arc<dyn ArchiveApi> {
        Arc::new(self.clone())
    }

    fn disk(&self) -> Arc<dyn DiskApi> {
        Arc::new(self.clone())
    }

    fn disk_plan(&self) -> Arc<dyn DiskPlanApi> {
        Arc::new(self.clone())
    }

    fn note(&self) -> Arc<dyn NoteApi> {
        Arc::new(self.clone())
    }

    fn ssh_key(&self) -> Arc<dyn SshKeyApi> {
        Arc::new(self.clone())
    }

    fn server(&self) -> Arc<dyn ServerApi> {
        Arc::new(self.clone())
    }

    fn server_plan(&self) -> Arc<dyn ServerPlanApi> {
        Arc::new(self.clone())
    }

    fn switch(&self) -> Arc<dyn SwitchApi> {
        Arc::new(self.clone())
    }

    fn packet_filter(&self) -> Arc<dyn PacketFilterApi> {
        Arc::new(self.clone())
    }

    fn interface(&self) -> Arc<dyn InterfaceApi> {
        Arc::new(self.clone())
    }

    fn mobile_gateway(&self) -> Arc<dyn MobileGatewayApi> {
        Arc::new(self.clone())
    }

    fn sim(&self) -> Arc<dyn SimApi> {
        Arc::new(self.clone())
    }

    fn zone(&self) -> Arc<dyn ZoneApi> {
        Arc::new(self.clone())
    }

    fn vpc_router(&self) -> Arc<dyn VpcRouterApi> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl ArchiveApi for FakeCloud {
    async fn find(&self, _zone: &str, req: &ArchiveFindRequest) -> Result<Vec<Archive>> {
        self.record("archive.find")?;
        let tags: Vec<&str> = req.tags.iter().map(String::as_str).collect();
        Ok(self
            .state()
            .archives
            .iter()
            .filter(|a| a.has_tags(&tags))
            .cloned()
            .collect())
    }

    async fn read(&self, _zone: &str, id: Id) -> Result<Archive> {
        self.record("archive.read")?;
        self.state()
            .archives
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| not_found("archive", id))
    }
}

impl FakeCloud {
    fn new_disk(&self, req: &DiskCreateRequest) -> Result<Disk> {
        let mut s = self.state();
        let id = s.new_id();
        let disk = Disk {
            id,
            name: req.name.clone(),
            description: req.description.clone(),
            tags: req.tags.clone(),
            icon_id: req.icon_id,
            availability: Availability::Available,
            connection: req.connection,
            encryption_algorithm: req.encryption_algorithm,
            size_mb: req.size_mb,
            disk_plan_id: req.disk_plan_id,
            source_disk_id: req.source_disk_id,
            source_archive_id: req.source_archive_id,
            ..Default::default()
        };
        s.disks.insert(id, disk.clone());
        if !req.server_id.is_empty() {
            s.connect_disk(id, req.server_id)?;
        }
        Ok(Disk {
            availability: Availability::Migrating,
            server_id: req.server_id,
            ..disk
        })
    }
}

#[async_trait]
impl DiskApi for FakeCloud {
    async fn create(&self, _zone: &str, req: &DiskCreateRequest) -> Result<Disk> {
        self.record("disk.create")?;
        self.new_disk(req)
    }

    async fn create_with_config(
        &self,
        _zone: &str,
        req: &DiskCreateRequest,
        _edit: &DiskEditRequest,
        _boot_at_available: bool,
    ) -> Result<Disk> {
        self.record("disk.create_with_config")?;
        self.new_disk(req)
    }

    async fn read(&self, _zone: &str, id: Id) -> Result<Disk> {
        self.record("disk.read")?;
        self.state()
            .disks
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("disk", id))
    }

    async fn update(&self, _zone: &str, id: Id, req: &DiskUpdateRequest) -> Result<Disk> {
        self.record("disk.update")?;
        let mut s = self.state();
        let disk = s.disk_mut(id)?;
        disk.name = req.name.clone();
        disk.description = req.description.clone();
        disk.tags = req.tags.clone();
        disk.icon_id = req.icon_id;
        disk.connection = req.connection;
        Ok(disk.clone())
    }

    async fn delete(&self, _zone: &str, id: Id) -> Result<()> {
        self.record("disk.delete")?;
        self.state()
            .disks
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("disk", id))
    }

    async fn config(&self, _zone: &str, id: Id, _edit: &DiskEditRequest) -> Result<()> {
        self.record("disk.config")?;
        self.state().disk_mut(id).map(|_| ())
    }

    async fn connect_to_server(&self, _zone: &str, id: Id, server_id: Id) -> Result<()> {
        self.record("disk.connect_to_server")?;
        self.state().connect_disk(id, server_id)
    }

    async fn disconnect_from_server(&self, _zone: &str, id: Id) -> Result<()> {
        self.record("disk.disconnect_from_server")?;
        let mut s = self.state();
        let disk = s.disk_mut(id)?;
        let server_id = std::mem::take(&mut disk.server_id);
        if let Ok(server) = s.server_mut(server_id) {
            server.disks.retain(|d| d.id != id);
            for (i, d) in server.disks.iter_mut().enumerate() {
                d.connection_order = i as u32 + 1;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DiskPlanApi for FakeCloud {
    async fn read(&self, _zone: &str, id: Id) -> Result<DiskPlan> {
        self.record("disk_plan.read")?;
        self.state()
            .disk_plans
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("disk plan", id))
    }
}

#[async_trait]
impl NoteApi for FakeCloud {
    async fn create(&self, req: &NoteCreateRequest) -> Result<Note> {
        self.record("note.create")?;
        let mut s = self.state();
        let id = s.new_id();
        let note = Note {
            id,
            name: req.name.clone(),
            class: req.class.clone(),
            content: req.content.clone(),
        };
        s.notes.insert(id, note.clone());
        Ok(note)
    }

    async fn read(&self, id: Id) -> Result<Note> {
        self.record("note.read")?;
        self.state()
            .notes
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("note", id))
    }

    async fn delete(&self, id: Id) -> Result<()> {
        self.record("note.delete")?;
        self.state()
            .notes
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("note", id))
    }
}

#[async_trait]
impl SshKeyApi for FakeCloud {
    async fn read(&self, id: Id) -> Result<SshKey> {
        self.record("ssh_key.read")?;
        self.state()
            .ssh_keys
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("ssh key", id))
    }
}

#[async_trait]
impl ServerApi for FakeCloud {
    async fn create(&self, _zone: &str, req: &ServerCreateRequest) -> Result<Server> {
        self.record("server.create")?;
        let mut s = self.state();
        let id = s.new_id();
        let mut interfaces = Vec::with_capacity(req.connected_switches.len());
        for switch in &req.connected_switches {
            let iface_id = s.new_id();
            interfaces.push(match switch {
                Some(sw) if sw.scope == Scope::Shared => InterfaceView {
                    id: iface_id,
                    switch_id: SHARED_SEGMENT_ID,
                    switch_scope: Scope::Shared,
                    ..Default::default()
                },
                Some(sw) => InterfaceView {
                    id: iface_id,
                    switch_id: sw.id,
                    ..Default::default()
                },
                None => InterfaceView {
                    id: iface_id,
                    ..Default::default()
                },
            });
        }
        let server = Server {
            id,
            name: req.name.clone(),
            description: req.description.clone(),
            tags: req.tags.clone(),
            icon_id: req.icon_id,
            availability: Availability::Available,
            instance_status: InstanceStatus::Down,
            cpu: req.cpu,
            memory_mb: req.memory_mb,
            gpu: req.gpu,
            server_plan_cpu_model: if req.server_plan_cpu_model.is_empty() {
                "uncategorized".into()
            } else {
                req.server_plan_cpu_model.clone()
            },
            server_plan_commitment: req.server_plan_commitment,
            server_plan_generation: req.server_plan_generation,
            interface_driver: req.interface_driver,
            private_host_id: req.private_host_id,
            interfaces,
            ..Default::default()
        };
        s.servers.insert(id, server.clone());
        Ok(server)
    }

    async fn read(&self, _zone: &str, id: Id) -> Result<Server> {
        self.record("server.read")?;
        self.state()
            .servers
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("server", id))
    }

    async fn update(&self, _zone: &str, id: Id, req: &ServerUpdateRequest) -> Result<Server> {
        self.record("server.update")?;
        let mut s = self.state();
        let server = s.server_mut(id)?;
        server.name = req.name.clone();
        server.description = req.description.clone();
        server.tags = req.tags.clone();
        server.icon_id = req.icon_id;
        server.private_host_id = req.private_host_id;
        server.interface_driver = req.interface_driver;
        Ok(server.clone())
    }

    async fn delete(&self, _zone: &str, id: Id) -> Result<()> {
        self.record("server.delete")?;
        let mut s = self.state();
        let server = s.servers.remove(&id).ok_or_else(|| not_found("server", id))?;
        for connected in server.disks {
            if let Ok(disk) = s.disk_mut(connected.id) {
                disk.server_id = Id::default();
            }
        }
        Ok(())
    }

    async fn change_plan(
        &self,
        _zone: &str,
        id: Id,
        req: &ServerChangePlanRequest,
    ) -> Result<Server> {
        self.record("server.change_plan")?;
        let mut s = self.state();
        let mut server = s.servers.remove(&id).ok_or_else(|| not_found("server", id))?;
        let new_id = s.new_id();
        server.id = new_id;
        server.cpu = req.cpu;
        server.memory_mb = req.memory_mb;
        server.gpu = req.gpu;
        if !req.server_plan_cpu_model.is_empty() {
            server.server_plan_cpu_model = req.server_plan_cpu_model.clone();
        }
        server.server_plan_commitment = req.server_plan_commitment;
        server.server_plan_generation = req.server_plan_generation;
        for connected in &server.disks {
            if let Ok(disk) = s.disk_mut(connected.id) {
                disk.server_id = new_id;
            }
        }
        s.servers.insert(new_id, server.clone());
        Ok(server)
    }

    async fn boot(&self, _zone: &str, id: Id, _req: &ServerBootRequest) -> Result<()> {
        self.record("server.boot")?;
        self.state().server_mut(id)?.instance_status = InstanceStatus::Up;
        Ok(())
    }

    async fn shutdown(&self, _zone: &str, id: Id, _force: bool) -> Result<()> {
        self.record("server.shutdown")?;
        self.state().server_mut(id)?.instance_status = InstanceStatus::Down;
        Ok(())
    }

    async fn insert_cdrom(&self, _zone: &str, id: Id, cdrom_id: Id) -> Result<()> {
        self.record("server.insert_cdrom")?;
        self.state().server_mut(id)?.cdrom_id = cdrom_id;
        Ok(())
    }

    async fn eject_cdrom(&self, _zone: &str, id: Id, _cdrom_id: Id) -> Result<()> {
        self.record("server.eject_cdrom")?;
        self.state().server_mut(id)?.cdrom_id = Id::default();
        Ok(())
    }
}

#[async_trait]
impl ServerPlanApi for FakeCloud {
    async fn find(&self, _zone: &str) -> Result<Vec<ServerPlan>> {
        self.record("server_plan.find")?;
        Ok(self.state().server_plans.clone())
    }
}

#[async_trait]
impl SwitchApi for FakeCloud {
    async fn read(&self, _zone: &str, id: Id) -> Result<Switch> {
        self.record("switch.read")?;
        self.state()
            .switches
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("switch", id))
    }
}

#[async_trait]
impl PacketFilterApi for FakeCloud {
    async fn read(&self, _zone: &str, id: Id) -> Result<PacketFilter> {
        self.record("packet_filter.read")?;
        self.state()
            .packet_filters
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("packet filter", id))
    }
}

#[async_trait]
impl InterfaceApi for FakeCloud {
    async fn create(&self, _zone: &str, req: &InterfaceCreateRequest) -> Result<InterfaceView> {
        self.record("interface.create")?;
        let mut s = self.state();
        let iface = InterfaceView {
            id: s.new_id(),
            ..Default::default()
        };
        s.server_mut(req.server_id)?.interfaces.push(iface.clone());
        Ok(iface)
    }

    async fn update(
        &self,
        _zone: &str,
        id: Id,
        req: &InterfaceUpdateRequest,
    ) -> Result<InterfaceView> {
        self.record("interface.update")?;
        let mut s = self.state();
        let iface = s.interface_mut(id)?;
        iface.user_ip_address = req.user_ip_address.clone();
        Ok(iface.clone())
    }

    async fn delete(&self, _zone: &str, id: Id) -> Result<()> {
        self.record("interface.delete")?;
        let mut s = self.state();
        for server in s.servers.values_mut() {
            server.interfaces.retain(|iface| iface.id != id);
        }
        Ok(())
    }

    async fn connect_to_shared_segment(&self, _zone: &str, id: Id) -> Result<()> {
        self.record("interface.connect_to_shared_segment")?;
        let mut s = self.state();
        let iface = s.interface_mut(id)?;
        iface.switch_id = SHARED_SEGMENT_ID;
        iface.switch_scope = Scope::Shared;
        Ok(())
    }

    async fn connect_to_switch(&self, _zone: &str, id: Id, switch_id: Id) -> Result<()> {
        self.record("interface.connect_to_switch")?;
        let mut s = self.state();
        let iface = s.interface_mut(id)?;
        iface.switch_id = switch_id;
        iface.switch_scope = Scope::User;
        Ok(())
    }

    async fn disconnect_from_switch(&self, _zone: &str, id: Id) -> Result<()> {
        self.record("interface.disconnect_from_switch")?;
        let mut s = self.state();
        let iface = s.interface_mut(id)?;
        iface.switch_id = Id::default();
        iface.switch_scope = Scope::User;
        Ok(())
    }

    async fn connect_to_packet_filter(
        &self,
        _zone: &str,
        id: Id,
        packet_filter_id: Id,
    ) -> Result<()> {
        self.record("interface.connect_to_packet_filter")?;
        self.state().interface_mut(id)?.packet_filter_id = packet_filter_id;
        Ok(())
    }

    async fn disconnect_from_packet_filter(&self, _zone: &str, id: Id) -> Result<()> {
        self.record("interface.disconnect_from_packet_filter")?;
        self.state().interface_mut(id)?.packet_filter_id = Id::default();
        Ok(())
    }
}

#[async_trait]
impl MobileGatewayApi for FakeCloud {
    async fn create(&self, _zone: &str, req: &MobileGatewayCreateRequest) -> Result<MobileGateway> {
        self.record("mobile_gateway.create")?;
        let mut s = self.state();
        let id = s.new_id();
        let availability = if s.mobile_gateway_copy_failures > 0 {
            s.mobile_gateway_copy_failures -= 1;
            Availability::Failed
        } else {
            Availability::Available
        };
        let settings_hash = s.new_hash();
        let mgw = MobileGateway {
            id,
            name: req.name.clone(),
            description: req.description.clone(),
            tags: req.tags.clone(),
            icon_id: req.icon_id,
            availability,
            instance_status: InstanceStatus::Down,
            zone_id: ZONE_ID,
            interfaces: vec![ApplianceInterface {
                index: 0,
                switch_id: SHARED_SEGMENT_ID,
                switch_scope: Scope::Shared,
            }],
            internet_connection_enabled: req.internet_connection_enabled,
            inter_device_communication_enabled: req.inter_device_communication_enabled,
            settings_hash,
            ..Default::default()
        };
        s.mobile_gateways.insert(id, mgw.clone());
        s.mobile_gateway_extras.insert(
            id,
            MobileGatewayExtra {
                dns: Some(MobileGatewayDnsSetting {
                    dns1: NAME_SERVERS[0].into(),
                    dns2: NAME_SERVERS[1].into(),
                }),
                ..Default::default()
            },
        );
        Ok(MobileGateway {
            availability: Availability::Migrating,
            ..mgw
        })
    }

    async fn read(&self, _zone: &str, id: Id) -> Result<MobileGateway> {
        self.record("mobile_gateway.read")?;
        self.state()
            .mobile_gateways
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("mobile gateway", id))
    }

    async fn update(
        &self,
        _zone: &str,
        id: Id,
        req: &MobileGatewayUpdateRequest,
    ) -> Result<MobileGateway> {
        self.record("mobile_gateway.update")?;
        let mut s = self.state();
        let hash = s.new_hash();
        let mgw = s.mobile_gateway_mut(id)?;
        mgw.name = req.name.clone();
        mgw.description = req.description.clone();
        mgw.tags = req.tags.clone();
        mgw.icon_id = req.icon_id;
        mgw.settings_hash = hash;
        Ok(mgw.clone())
    }

    async fn update_settings(
        &self,
        _zone: &str,
        id: Id,
        req: &MobileGatewayUpdateSettingsRequest,
    ) -> Result<MobileGateway> {
        self.record("mobile_gateway.update_settings")?;
        let mut s = self.state();
        let hash = s.new_hash();
        let mgw = s.mobile_gateway_mut(id)?;
        if !req.settings_hash.is_empty() && req.settings_hash != mgw.settings_hash {
            return Err(IaasError::api(409, "settings hash mismatch"));
        }
        mgw.interface_settings = req.interface_settings.clone();
        mgw.static_routes = req.static_routes.clone();
        mgw.internet_connection_enabled = req.internet_connection_enabled;
        mgw.inter_device_communication_enabled = req.inter_device_communication_enabled;
        mgw.settings_hash = hash;
        Ok(mgw.clone())
    }

    async fn delete(&self, _zone: &str, id: Id) -> Result<()> {
        self.record("mobile_gateway.delete")?;
        let mut s = self.state();
        s.mobile_gateway_extras.remove(&id);
        s.mobile_gateways
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("mobile gateway", id))
    }

    async fn config(&self, _zone: &str, id: Id) -> Result<()> {
        self.record("mobile_gateway.config")?;
        self.state().mobile_gateway_mut(id).map(|_| ())
    }

    async fn boot(&self, _zone: &str, id: Id) -> Result<()> {
        self.record("mobile_gateway.boot")?;
        self.state().mobile_gateway_mut(id)?.instance_status = InstanceStatus::Up;
        Ok(())
    }

    async fn shutdown(&self, _zone: &str, id: Id, _force: bool) -> Result<()> {
        self.record("mobile_gateway.shutdown")?;
        self.state().mobile_gateway_mut(id)?.instance_status = InstanceStatus::Down;
        Ok(())
    }

    async fn connect_to_switch(&self, _zone: &str, id: Id, switch_id: Id) -> Result<()> {
        self.record("mobile_gateway.connect_to_switch")?;
        let mut s = self.state();
        let mgw = s.mobile_gateway_mut(id)?;
        if mgw.interfaces.iter().any(|i| i.index == 1) {
            return Err(IaasError::api(409, "private interface is already connected"));
        }
        mgw.interfaces.push(ApplianceInterface {
            index: 1,
            switch_id,
            switch_scope: Scope::User,
        });
        Ok(())
    }

    async fn disconnect_from_switch(&self, _zone: &str, id: Id) -> Result<()> {
        self.record("mobile_gateway.disconnect_from_switch")?;
        self.state()
            .mobile_gateway_mut(id)?
            .interfaces
            .retain(|i| i.index != 1);
        Ok(())
    }

    async fn get_dns(&self, _zone: &str, id: Id) -> Result<MobileGatewayDnsSetting> {
        self.record("mobile_gateway.get_dns")?;
        self.state()
            .extra_mut(id)?
            .dns
            .clone()
            .ok_or_else(|| not_found("DNS setting", id))
    }

    async fn set_dns(&self, _zone: &str, id: Id, dns: &MobileGatewayDnsSetting) -> Result<()> {
        self.record("mobile_gateway.set_dns")?;
        self.state().extra_mut(id)?.dns = Some(dns.clone());
        Ok(())
    }

    async fn get_sim_routes(&self, _zone: &str, id: Id) -> Result<Vec<MobileGatewaySimRoute>> {
        self.record("mobile_gateway.get_sim_routes")?;
        Ok(self.state().extra_mut(id)?.sim_routes.clone())
    }

    async fn set_sim_routes(
        &self,
        _zone: &str,
        id: Id,
        routes: &[MobileGatewaySimRoute],
    ) -> Result<()> {
        self.record("mobile_gateway.set_sim_routes")?;
        let mut s = self.state();
        let extra = s.extra_mut(id)?;
        if let Some(route) = routes
            .iter()
            .find(|r| !extra.sims.iter().any(|sim| sim.resource_id == r.resource_id))
        {
            return Err(IaasError::api(
                400,
                format!("SIM route {} refers to a SIM that is not attached", route.prefix),
            ));
        }
        extra.sim_routes = routes.to_vec();
        Ok(())
    }

    async fn list_sims(&self, _zone: &str, id: Id) -> Result<Vec<MobileGatewaySim>> {
        self.record("mobile_gateway.list_sims")?;
        Ok(self.state().extra_mut(id)?.sims.clone())
    }

    async fn add_sim(&self, _zone: &str, id: Id, sim_id: Id) -> Result<()> {
        self.record("mobile_gateway.add_sim")?;
        let mut s = self.state();
        let extra = s.extra_mut(id)?;
        if extra.sims.iter().any(|sim| sim.resource_id == sim_id) {
            return Err(IaasError::api(409, format!("SIM {} is already attached", sim_id)));
        }
        extra.sims.push(MobileGatewaySim {
            resource_id: sim_id,
            iccid: format!("8981{:015}", sim_id.0),
            ip: String::new(),
        });
        Ok(())
    }

    async fn delete_sim(&self, _zone: &str, id: Id, sim_id: Id) -> Result<()> {
        self.record("mobile_gateway.delete_sim")?;
        let mut s = self.state();
        let extra = s.extra_mut(id)?;
        if extra.sim_routes.iter().any(|r| r.resource_id == sim_id) {
            return Err(IaasError::api(409, format!("SIM {} is still routed", sim_id)));
        }
        extra.sims.retain(|sim| sim.resource_id != sim_id);
        Ok(())
    }

    async fn get_traffic_config(&self, _zone: &str, id: Id) -> Result<MobileGatewayTrafficControl> {
        self.record("mobile_gateway.get_traffic_config")?;
        self.state()
            .extra_mut(id)?
            .traffic
            .clone()
            .ok_or_else(|| not_found("traffic config", id))
    }

    async fn set_traffic_config(
        &self,
        _zone: &str,
        id: Id,
        config: &MobileGatewayTrafficControl,
    ) -> Result<()> {
        self.record("mobile_gateway.set_traffic_config")?;
        self.state().extra_mut(id)?.traffic = Some(config.clone());
        Ok(())
    }

    async fn delete_traffic_config(&self, _zone: &str, id: Id) -> Result<()> {
        self.record("mobile_gateway.delete_traffic_config")?;
        self.state().extra_mut(id)?.traffic = None;
        Ok(())
    }
}

#[async_trait]
impl SimApi for FakeCloud {
    async fn assign_ip(&self, id: Id, ip: &str) -> Result<()> {
        self.record("sim.assign_ip")?;
        let mut s = self.state();
        let sim = s.attached_sim(id)?;
        if !sim.ip.is_empty() {
            return Err(IaasError::api(409, format!("SIM {} already has an IP address", id)));
        }
        sim.ip = ip.to_string();
        Ok(())
    }

    async fn clear_ip(&self, id: Id) -> Result<()> {
        self.record("sim.clear_ip")?;
        self.state().attached_sim(id)?.ip.clear();
        Ok(())
    }
}

#[async_trait]
impl ZoneApi for FakeCloud {
    async fn read(&self, id: Id) -> Result<ZoneInfo> {
        self.record("zone.read")?;
        if id != ZONE_ID {
            return Err(not_found("zone", id));
        }
        Ok(ZoneInfo {
            id,
            name: ZONE.into(),
            region: Region {
                id: Id(310),
                name: "石狩".into(),
                name_servers: NAME_SERVERS.iter().map(|s| s.to_string()).collect(),
            },
        })
    }
}

#[async_trait]
impl VpcRouterApi for FakeCloud {
    async fn create(&self, _zone: &str, req: &VpcRouterCreateRequest) -> Result<VpcRouter> {
        self.record("vpc_router.create")?;
        let mut s = self.state();
        let id = s.new_id();
        let eth0 = if req.switch.scope == Scope::Shared {
            ApplianceInterface {
                index: 0,
                switch_id: SHARED_SEGMENT_ID,
                switch_scope: Scope::Shared,
            }
        } else {
            ApplianceInterface {
                index: 0,
                switch_id: req.switch.id,
                switch_scope: Scope::User,
            }
        };
        let settings_hash = s.new_hash();
        let router = VpcRouter {
            id,
            name: req.name.clone(),
            description: req.description.clone(),
            tags: req.tags.clone(),
            icon_id: req.icon_id,
            plan: req.plan,
            version: req.version,
            availability: Availability::Available,
            instance_status: InstanceStatus::Down,
            interfaces: vec![eth0],
            settings: req.settings.clone(),
            settings_hash,
        };
        s.vpc_routers.insert(id, router.clone());
        Ok(VpcRouter {
            availability: Availability::Migrating,
            ..router
        })
    }

    async fn read(&self, _zone: &str, id: Id) -> Result<VpcRouter> {
        self.record("vpc_router.read")?;
        self.state()
            .vpc_routers
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("VPC router", id))
    }

    async fn update(&self, _zone: &str, id: Id, req: &VpcRouterUpdateRequest) -> Result<VpcRouter> {
        self.record("vpc_router.update")?;
        let mut s = self.state();
        let hash = s.new_hash();
        let router = s.vpc_router_mut(id)?;
        router.name = req.name.clone();
        router.description = req.description.clone();
        router.tags = req.tags.clone();
        router.icon_id = req.icon_id;
        router.settings_hash = hash;
        Ok(router.clone())
    }

    async fn update_settings(
        &self,
        _zone: &str,
        id: Id,
        req: &VpcRouterUpdateSettingsRequest,
    ) -> Result<VpcRouter> {
        self.record("vpc_router.update_settings")?;
        let mut s = self.state();
        let hash = s.new_hash();
        let router = s.vpc_router_mut(id)?;
        if !req.settings_hash.is_empty() && req.settings_hash != router.settings_hash {
            return Err(IaasError::api(409, "settings hash mismatch"));
        }
        router.settings = req.settings.clone();
        router.settings_hash = hash;
        Ok(router.clone())
    }

    async fn delete(&self, _zone: &str, id: Id) -> Result<()> {
        self.record("vpc_router.delete")?;
        self.state()
            .vpc_routers
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("VPC router", id))
    }

    async fn config(&self, _zone: &str, id: Id) -> Result<()> {
        self.record("vpc_router.config")?;
        self.state().vpc_router_mut(id).map(|_| ())
    }

    async fn boot(&self, _zone: &str, id: Id) -> Result<()> {
        self.record("vpc_router.boot")?;
        self.state().vpc_router_mut(id)?.instance_status = InstanceStatus::Up;
        Ok(())
    }

    async fn shutdown(&self, _zone: &str, id: Id, _force: bool) -> Result<()> {
        self.record("vpc_router.shutdown")?;
        self.state().vpc_router_mut(id)?.instance_status = InstanceStatus::Down;
        Ok(())
    }

    async fn connect_to_switch(
        &self,
        _zone: &str,
        id: Id,
        nic_index: usize,
        switch_id: Id,
    ) -> Result<()> {
        self.record("vpc_router.connect_to_switch")?;
        let mut s = self.state();
        let router = s.vpc_router_mut(id)?;
        if router.interface(nic_index).is_some() {
            return Err(IaasError::api(409, format!("eth{} is already connected", nic_index)));
        }
        router.interfaces.push(ApplianceInterface {
            index: nic_index,
            switch_id,
            switch_scope: Scope::User,
        });
        Ok(())
    }

    async fn disconnect_from_switch(&self, _zone: &str, id: Id, nic_index: usize) -> Result<()> {
        self.record("vpc_router.disconnect_from_switch")?;
        self.state()
            .vpc_router_mut(id)?
            .interfaces
            .retain(|i| i.index != nic_index);
        Ok(())
    }
}
