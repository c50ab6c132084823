//! Disk builder variants
//!
//! Each variant knows how to validate, build (create or connect), update and
//! classify an update of one disk. [`DiskBuilder`] is the closed set of
//! variants; the [`Director`](super::Director) picks one from input shape.

use super::client::DiskClient;
use super::edit::{UnixEditRequest, delete_notes};
use crate::error::{PartialFailure, Result, ServiceError};
use crate::update_level::UpdateLevel;
use crate::wait::{self, PollingWaiter};
use sacloud_iaas::{
    Archive, ArchiveFindRequest, Disk, DiskConnection, DiskCreateRequest, DiskEditRequest,
    DiskUpdateRequest, EncryptionAlgorithm, Id, MIB_PER_GIB, OsType, Scope,
};
use tracing::{debug, info};

pub const DISK_PLAN_SSD: Id = Id::new(4);
pub const DISK_PLAN_HDD: Id = Id::new(2);
pub const DEFAULT_DISK_SIZE_GB: u64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildResult {
    pub disk_id: Id,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateResult {
    pub disk: Disk,
}

/// Result of a disk build. A failure may still carry the created disk's ID.
pub type BuildOutcome = std::result::Result<BuildResult, PartialFailure<Option<BuildResult>>>;

fn fail(error: impl Into<ServiceError>) -> PartialFailure<Option<BuildResult>> {
    PartialFailure::empty(error)
}

/// Settings shared by the variants that create a new disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskSettings {
    pub name: String,
    pub size_gb: u64,
    /// Disks the new one must not share storage with
    pub distant_from: Vec<Id>,
    pub plan_id: Id,
    pub connection: DiskConnection,
    pub encryption_algorithm: EncryptionAlgorithm,
    pub kms_key_id: Id,
    pub description: String,
    pub tags: Vec<String>,
    pub icon_id: Id,
}

impl Default for DiskSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            size_gb: DEFAULT_DISK_SIZE_GB,
            distant_from: vec![],
            plan_id: DISK_PLAN_SSD,
            connection: DiskConnection::default(),
            encryption_algorithm: EncryptionAlgorithm::default(),
            kms_key_id: Id::default(),
            description: String::new(),
            tags: vec![],
            icon_id: Id::default(),
        }
    }
}

impl DiskSettings {
    fn create_request(&self, server_id: Id) -> DiskCreateRequest {
        DiskCreateRequest {
            disk_plan_id: self.plan_id,
            size_mb: self.size_gb * MIB_PER_GIB,
            connection: self.connection,
            encryption_algorithm: self.encryption_algorithm,
            kms_key_id: self.kms_key_id,
            server_id,
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            icon_id: self.icon_id,
            distant_from: self.distant_from.clone(),
            ..Default::default()
        }
    }

    fn update_request(&self) -> DiskUpdateRequest {
        DiskUpdateRequest {
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            icon_id: self.icon_id,
            connection: self.connection,
        }
    }
}

/// Empty disk of a given plan and size
#[derive(Debug, Clone)]
pub struct BlankBuilder {
    pub settings: DiskSettings,
    pub no_wait: bool,
    pub id: Id,
    pub client: DiskClient,
    pub waiter: PollingWaiter,
}

impl BlankBuilder {
    pub fn new(settings: DiskSettings, client: DiskClient) -> Self {
        Self {
            settings,
            no_wait: false,
            id: Id::default(),
            client,
            waiter: PollingWaiter::default(),
        }
    }

    pub async fn validate(&self, zone: &str) -> Result<()> {
        validate_disk_plan(&self.client, zone, self.settings.plan_id, self.settings.size_gb).await
    }

    pub async fn build(&mut self, zone: &str, server_id: Id) -> BuildOutcome {
        let req = self.settings.create_request(server_id);
        let result = build_disk(&self.client, &self.waiter, zone, req, None, self.no_wait).await;
        self.id = built_id(&result);
        result
    }

    pub async fn update(&mut self, zone: &str) -> Result<UpdateResult> {
        let req = self.settings.update_request();
        update_disk(&self.client, &self.waiter, zone, self.id, &req, None, self.no_wait).await
    }

    pub fn update_level(&self, current: &Disk) -> UpdateLevel {
        update_level(current, self.id, false, &self.settings.update_request())
    }
}

/// Disk copied from the current public archive of an editable OS
#[derive(Debug, Clone)]
pub struct FromUnixBuilder {
    pub os_type: OsType,
    pub settings: DiskSettings,
    pub edit_parameter: Option<UnixEditRequest>,
    pub no_wait: bool,
    pub id: Id,
    pub client: DiskClient,
    pub waiter: PollingWaiter,
}

impl FromUnixBuilder {
    pub fn new(os_type: OsType, settings: DiskSettings, client: DiskClient) -> Self {
        Self {
            os_type,
            settings,
            edit_parameter: None,
            no_wait: false,
            id: Id::default(),
            client,
            waiter: PollingWaiter::default(),
        }
    }

    pub async fn validate(&self, zone: &str) -> Result<()> {
        if !self.os_type.is_support_disk_edit() {
            return Err(ServiceError::validation(format!(
                "invalid OSType: {}",
                self.os_type
            )));
        }
        validate_disk_plan(&self.client, zone, self.settings.plan_id, self.settings.size_gb)
            .await?;
        if let Some(edit) = &self.edit_parameter {
            edit.validate(&self.client).await?;
        }
        Ok(())
    }

    pub async fn build(&mut self, zone: &str, server_id: Id) -> BuildOutcome {
        let archive = find_archive_by_os_type(&self.client, zone, self.os_type)
            .await
            .map_err(fail)?;
        let mut req = self.settings.create_request(server_id);
        req.source_archive_id = archive.id;

        let result = build_disk(
            &self.client,
            &self.waiter,
            zone,
            req,
            self.edit_parameter.as_ref(),
            self.no_wait,
        )
        .await;
        self.id = built_id(&result);
        result
    }

    pub async fn update(&mut self, zone: &str) -> Result<UpdateResult> {
        let req = self.settings.update_request();
        update_disk(
            &self.client,
            &self.waiter,
            zone,
            self.id,
            &req,
            self.edit_parameter.as_ref(),
            self.no_wait,
        )
        .await
    }

    pub fn update_level(&self, current: &Disk) -> UpdateLevel {
        update_level(
            current,
            self.id,
            self.edit_parameter.is_some(),
            &self.settings.update_request(),
        )
    }
}

/// Disk copied from a public archive that does not accept edit parameters
#[derive(Debug, Clone)]
pub struct FromFixedArchiveBuilder {
    pub os_type: OsType,
    pub settings: DiskSettings,
    /// Always rejected by `validate`; kept so the mistake is reported
    pub edit_parameter: Option<UnixEditRequest>,
    pub no_wait: bool,
    pub id: Id,
    pub client: DiskClient,
    pub waiter: PollingWaiter,
}

impl FromFixedArchiveBuilder {
    pub fn new(os_type: OsType, settings: DiskSettings, client: DiskClient) -> Self {
        Self {
            os_type,
            settings,
            edit_parameter: None,
            no_wait: false,
            id: Id::default(),
            client,
            waiter: PollingWaiter::default(),
        }
    }

    pub async fn validate(&self, zone: &str) -> Result<()> {
        if self.os_type.is_support_disk_edit() || self.os_type == OsType::Custom {
            return Err(ServiceError::validation(format!(
                "invalid OSType: {}",
                self.os_type
            )));
        }
        if self.edit_parameter.is_some() {
            return Err(ServiceError::validation(format!(
                "OSType {} does not support disk edit parameters",
                self.os_type
            )));
        }
        validate_disk_plan(&self.client, zone, self.settings.plan_id, self.settings.size_gb).await
    }

    pub async fn build(&mut self, zone: &str, server_id: Id) -> BuildOutcome {
        let archive = find_archive_by_os_type(&self.client, zone, self.os_type)
            .await
            .map_err(fail)?;
        let mut req = self.settings.create_request(server_id);
        req.source_archive_id = archive.id;

        let result = build_disk(&self.client, &self.waiter, zone, req, None, self.no_wait).await;
        self.id = built_id(&result);
        result
    }

    pub async fn update(&mut self, zone: &str) -> Result<UpdateResult> {
        let req = self.settings.update_request();
        update_disk(&self.client, &self.waiter, zone, self.id, &req, None, self.no_wait).await
    }

    pub fn update_level(&self, current: &Disk) -> UpdateLevel {
        update_level(current, self.id, false, &self.settings.update_request())
    }
}

/// Disk copied from an existing disk or archive
///
/// Whether the source accepts edit parameters is decided by the provider.
#[derive(Debug, Clone)]
pub struct FromDiskOrArchiveBuilder {
    pub source_disk_id: Id,
    pub source_archive_id: Id,
    pub settings: DiskSettings,
    pub edit_parameter: Option<UnixEditRequest>,
    pub no_wait: bool,
    pub id: Id,
    pub client: DiskClient,
    pub waiter: PollingWaiter,
}

impl FromDiskOrArchiveBuilder {
    pub fn new(
        source_disk_id: Id,
        source_archive_id: Id,
        settings: DiskSettings,
        client: DiskClient,
    ) -> Self {
        Self {
            source_disk_id,
            source_archive_id,
            settings,
            edit_parameter: None,
            no_wait: false,
            id: Id::default(),
            client,
            waiter: PollingWaiter::default(),
        }
    }

    pub async fn validate(&self, zone: &str) -> Result<()> {
        if self.source_archive_id.is_empty() && self.source_disk_id.is_empty() {
            return Err(ServiceError::validation(
                "source archive id or source disk id is required",
            ));
        }
        validate_disk_plan(&self.client, zone, self.settings.plan_id, self.settings.size_gb)
            .await?;
        if !self.source_archive_id.is_empty() {
            self.client.archive.read(zone, self.source_archive_id).await?;
        }
        if !self.source_disk_id.is_empty() {
            self.client.disk.read(zone, self.source_disk_id).await?;
        }
        if let Some(edit) = &self.edit_parameter {
            edit.validate(&self.client).await?;
        }
        Ok(())
    }

    pub async fn build(&mut self, zone: &str, server_id: Id) -> BuildOutcome {
        let mut req = self.settings.create_request(server_id);
        req.source_archive_id = self.source_archive_id;
        req.source_disk_id = self.source_disk_id;

        let result = build_disk(
            &self.client,
            &self.waiter,
            zone,
            req,
            self.edit_parameter.as_ref(),
            self.no_wait,
        )
        .await;
        self.id = built_id(&result);
        result
    }

    pub async fn update(&mut self, zone: &str) -> Result<UpdateResult> {
        let req = self.settings.update_request();
        update_disk(
            &self.client,
            &self.waiter,
            zone,
            self.id,
            &req,
            self.edit_parameter.as_ref(),
            self.no_wait,
        )
        .await
    }

    pub fn update_level(&self, current: &Disk) -> UpdateLevel {
        update_level(
            current,
            self.id,
            self.edit_parameter.is_some(),
            &self.settings.update_request(),
        )
    }
}

/// An existing disk that only needs to be (re)connected
#[derive(Debug, Clone)]
pub struct ConnectedDiskBuilder {
    pub id: Id,
    pub edit_parameter: Option<UnixEditRequest>,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub icon_id: Id,
    pub connection: DiskConnection,
    pub no_wait: bool,
    pub client: DiskClient,
    pub waiter: PollingWaiter,
}

impl ConnectedDiskBuilder {
    pub fn new(id: Id, client: DiskClient) -> Self {
        Self {
            id,
            edit_parameter: None,
            name: String::new(),
            description: String::new(),
            tags: vec![],
            icon_id: Id::default(),
            connection: DiskConnection::default(),
            no_wait: false,
            client,
            waiter: PollingWaiter::default(),
        }
    }

    /// Desired state equal to the disk as it is
    pub fn from_disk(disk: &Disk, client: DiskClient) -> Self {
        Self {
            name: disk.name.clone(),
            description: disk.description.clone(),
            tags: disk.tags.clone(),
            icon_id: disk.icon_id,
            connection: disk.connection,
            ..Self::new(disk.id, client)
        }
    }

    fn update_request(&self) -> DiskUpdateRequest {
        DiskUpdateRequest {
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            icon_id: self.icon_id,
            connection: self.connection,
        }
    }

    pub async fn validate(&self, zone: &str) -> Result<()> {
        if self.id.is_empty() {
            return Err(ServiceError::validation("disk id is required"));
        }
        self.client.disk.read(zone, self.id).await?;
        Ok(())
    }

    pub async fn build(&mut self, zone: &str, server_id: Id) -> BuildOutcome {
        let result = BuildResult { disk_id: self.id };
        if !server_id.is_empty() {
            info!("Connecting disk {} to server {}", self.id, server_id);
            self.client
                .disk
                .connect_to_server(zone, self.id, server_id)
                .await
                .map_err(fail)?;
        }

        if let Some(edit) = &self.edit_parameter {
            apply_edit(&self.client, &self.waiter, zone, self.id, edit, false)
                .await
                .map_err(|e| PartialFailure::new(Some(result), e))?;
        }
        Ok(result)
    }

    pub async fn update(&mut self, zone: &str) -> Result<UpdateResult> {
        info!("Updating disk: {}", self.id);
        let mut disk = self
            .client
            .disk
            .update(zone, self.id, &self.update_request())
            .await?;

        if let Some(edit) = &self.edit_parameter {
            disk = apply_edit(&self.client, &self.waiter, zone, self.id, edit, false).await?;
        }
        Ok(UpdateResult { disk })
    }

    pub fn update_level(&self, current: &Disk) -> UpdateLevel {
        update_level(
            current,
            self.id,
            self.edit_parameter.is_some(),
            &self.update_request(),
        )
    }
}

/// One of the disk builder variants
#[derive(Debug, Clone)]
pub enum DiskBuilder {
    Blank(BlankBuilder),
    FromUnix(FromUnixBuilder),
    FromFixedArchive(FromFixedArchiveBuilder),
    FromDiskOrArchive(FromDiskOrArchiveBuilder),
    Connected(ConnectedDiskBuilder),
}

impl DiskBuilder {
    pub async fn validate(&self, zone: &str) -> Result<()> {
        match self {
            DiskBuilder::Blank(b) => b.validate(zone).await,
            DiskBuilder::FromUnix(b) => b.validate(zone).await,
            DiskBuilder::FromFixedArchive(b) => b.validate(zone).await,
            DiskBuilder::FromDiskOrArchive(b) => b.validate(zone).await,
            DiskBuilder::Connected(b) => b.validate(zone).await,
        }
    }

    /// Create (or connect) the disk, attaching it to `server_id` unless empty
    pub async fn build(&mut self, zone: &str, server_id: Id) -> BuildOutcome {
        match self {
            DiskBuilder::Blank(b) => b.build(zone, server_id).await,
            DiskBuilder::FromUnix(b) => b.build(zone, server_id).await,
            DiskBuilder::FromFixedArchive(b) => b.build(zone, server_id).await,
            DiskBuilder::FromDiskOrArchive(b) => b.build(zone, server_id).await,
            DiskBuilder::Connected(b) => b.build(zone, server_id).await,
        }
    }

    pub async fn update(&mut self, zone: &str) -> Result<UpdateResult> {
        match self {
            DiskBuilder::Blank(b) => b.update(zone).await,
            DiskBuilder::FromUnix(b) => b.update(zone).await,
            DiskBuilder::FromFixedArchive(b) => b.update(zone).await,
            DiskBuilder::FromDiskOrArchive(b) => b.update(zone).await,
            DiskBuilder::Connected(b) => b.update(zone).await,
        }
    }

    /// ID of the disk, empty until built (except for connected disks)
    pub fn disk_id(&self) -> Id {
        match self {
            DiskBuilder::Blank(b) => b.id,
            DiskBuilder::FromUnix(b) => b.id,
            DiskBuilder::FromFixedArchive(b) => b.id,
            DiskBuilder::FromDiskOrArchive(b) => b.id,
            DiskBuilder::Connected(b) => b.id,
        }
    }

    pub fn update_level(&self, current: &Disk) -> UpdateLevel {
        match self {
            DiskBuilder::Blank(b) => b.update_level(current),
            DiskBuilder::FromUnix(b) => b.update_level(current),
            DiskBuilder::FromFixedArchive(b) => b.update_level(current),
            DiskBuilder::FromDiskOrArchive(b) => b.update_level(current),
            DiskBuilder::Connected(b) => b.update_level(current),
        }
    }

    pub fn no_wait(&self) -> bool {
        match self {
            DiskBuilder::Blank(b) => b.no_wait,
            DiskBuilder::FromUnix(b) => b.no_wait,
            DiskBuilder::FromFixedArchive(b) => b.no_wait,
            DiskBuilder::FromDiskOrArchive(b) => b.no_wait,
            DiskBuilder::Connected(b) => b.no_wait,
        }
    }

    /// Point the builder at an existing disk before `update`
    pub fn set_disk_id(&mut self, id: Id) {
        match self {
            DiskBuilder::Blank(b) => b.id = id,
            DiskBuilder::FromUnix(b) => b.id = id,
            DiskBuilder::FromFixedArchive(b) => b.id = id,
            DiskBuilder::FromDiskOrArchive(b) => b.id = id,
            DiskBuilder::Connected(b) => b.id = id,
        }
    }

    /// Use `waiter` for every wait of this builder
    pub fn set_waiter(&mut self, waiter: PollingWaiter) {
        match self {
            DiskBuilder::Blank(b) => b.waiter = waiter,
            DiskBuilder::FromUnix(b) => b.waiter = waiter,
            DiskBuilder::FromFixedArchive(b) => b.waiter = waiter,
            DiskBuilder::FromDiskOrArchive(b) => b.waiter = waiter,
            DiskBuilder::Connected(b) => b.waiter = waiter,
        }
    }
}

fn built_id(result: &BuildOutcome) -> Id {
    match result {
        Ok(built) => built.disk_id,
        Err(failure) => failure.partial.map(|b| b.disk_id).unwrap_or_default(),
    }
}

async fn build_disk(
    client: &DiskClient,
    waiter: &PollingWaiter,
    zone: &str,
    req: DiskCreateRequest,
    edit: Option<&UnixEditRequest>,
    no_wait: bool,
) -> BuildOutcome {
    let (edit_req, generated) = match edit {
        Some(edit) => {
            let (edit_req, generated) = edit.prepare(client).await.map_err(fail)?;
            (Some(edit_req), generated)
        }
        None => (None, vec![]),
    };

    let result = create_disk(client, waiter, zone, &req, edit_req.as_ref(), no_wait).await?;

    if edit.is_some_and(|e| e.is_notes_ephemeral) {
        delete_notes(client, &generated)
            .await
            .map_err(|e| PartialFailure::new(Some(result), e))?;
    }
    Ok(result)
}

async fn create_disk(
    client: &DiskClient,
    waiter: &PollingWaiter,
    zone: &str,
    req: &DiskCreateRequest,
    edit: Option<&DiskEditRequest>,
    no_wait: bool,
) -> BuildOutcome {
    info!("Creating disk: {} (server: {})", req.name, req.server_id);
    let created = match edit {
        Some(edit) => client.disk.create_with_config(zone, req, edit, false).await,
        None => client.disk.create(zone, req).await,
    }
    .map_err(fail)?;

    let result = BuildResult {
        disk_id: created.id,
    };
    if no_wait {
        return Ok(result);
    }

    let id = created.id;
    let disk_api = &client.disk;
    match wait::until_ready(waiter, move || disk_api.read(zone, id)).await {
        Ok(ready) => Ok(BuildResult { disk_id: ready.id }),
        Err(failure) => Err(PartialFailure::new(Some(result), failure.error)),
    }
}

async fn update_disk(
    client: &DiskClient,
    waiter: &PollingWaiter,
    zone: &str,
    id: Id,
    req: &DiskUpdateRequest,
    edit: Option<&UnixEditRequest>,
    no_wait: bool,
) -> Result<UpdateResult> {
    if id.is_empty() {
        return Err(ServiceError::validation("disk id required"));
    }

    info!("Updating disk: {}", id);
    let mut disk = client.disk.update(zone, id, req).await?;

    if let Some(edit) = edit {
        disk = apply_edit(client, waiter, zone, id, edit, no_wait).await?;
    } else if !no_wait {
        let disk_api = &client.disk;
        disk = wait::until_ready(waiter, move || disk_api.read(zone, id)).await?;
    }
    Ok(UpdateResult { disk })
}

/// Apply edit parameters to an existing disk and wait until it is ready again
async fn apply_edit(
    client: &DiskClient,
    waiter: &PollingWaiter,
    zone: &str,
    id: Id,
    edit: &UnixEditRequest,
    no_wait: bool,
) -> Result<Disk> {
    let (edit_req, generated) = edit.prepare(client).await?;
    info!("Editing disk: {}", id);
    client.disk.config(zone, id, &edit_req).await?;

    let disk_api = &client.disk;
    let disk = if no_wait {
        disk_api.read(zone, id).await?
    } else {
        wait::until_ready(waiter, move || disk_api.read(zone, id)).await?
    };

    if edit.is_notes_ephemeral {
        delete_notes(client, &generated).await?;
    }
    Ok(disk)
}

/// The plan must offer exactly the requested size
pub async fn validate_disk_plan(
    client: &DiskClient,
    zone: &str,
    plan_id: Id,
    size_gb: u64,
) -> Result<()> {
    let plan = client.plan.read(zone, plan_id).await?;
    let found = plan
        .sizes
        .iter()
        .any(|size| size.availability.is_available() && size.size_gb() == size_gb);
    if !found {
        return Err(ServiceError::DiskPlanNotFound {
            plan: plan.name,
            size_gb,
        });
    }
    Ok(())
}

/// Current public archive of an OS family
pub async fn find_archive_by_os_type(
    client: &DiskClient,
    zone: &str,
    os_type: OsType,
) -> Result<Archive> {
    let tags = os_type.archive_tags();
    if tags.is_empty() {
        return Err(ServiceError::ArchiveNotFound(os_type.to_string()));
    }
    let archives = client
        .archive
        .find(
            zone,
            &ArchiveFindRequest {
                scope: Some(Scope::Shared),
                tags: tags.iter().map(|t| t.to_string()).collect(),
            },
        )
        .await?;
    debug!("Found {} archive(s) for {}", archives.len(), os_type);

    archives
        .into_iter()
        .find(|a| a.has_tags(&tags) && a.availability.is_available())
        .ok_or_else(|| ServiceError::ArchiveNotFound(os_type.to_string()))
}

/// Classify the change from `current` to `desired`
///
/// A different disk or pending edit parameters always need a shutdown, as
/// does a connection change. Other field changes are applied live.
pub fn update_level(
    current: &Disk,
    disk_id: Id,
    has_edit_parameter: bool,
    desired: &DiskUpdateRequest,
) -> UpdateLevel {
    if current.id != disk_id || has_edit_parameter {
        return UpdateLevel::NeedShutdown;
    }

    let current = DiskUpdateRequest::from(current);
    if current == *desired {
        UpdateLevel::None
    } else if current.connection != desired.connection {
        UpdateLevel::NeedShutdown
    } else {
        UpdateLevel::Simple
    }
}
