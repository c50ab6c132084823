//! Picks the disk builder variant from the shape of the input

use super::builder::{
    BlankBuilder, ConnectedDiskBuilder, DiskBuilder, DiskSettings, FromDiskOrArchiveBuilder,
    FromFixedArchiveBuilder, FromUnixBuilder,
};
use super::client::DiskClient;
use super::edit::UnixEditRequest;
use crate::wait::PollingWaiter;
use sacloud_iaas::{Id, OsType};

/// Desired disk described independently of how it will be produced
#[derive(Debug, Clone)]
pub struct Director {
    pub os_type: OsType,
    pub settings: DiskSettings,
    /// Existing disk to connect (only with `OsType::Custom`)
    pub disk_id: Id,
    pub source_disk_id: Id,
    pub source_archive_id: Id,
    pub edit_parameter: Option<UnixEditRequest>,
    pub no_wait: bool,
    pub waiter: PollingWaiter,
    pub client: DiskClient,
}

impl Director {
    pub fn new(client: DiskClient) -> Self {
        Self {
            os_type: OsType::Custom,
            settings: DiskSettings::default(),
            disk_id: Id::default(),
            source_disk_id: Id::default(),
            source_archive_id: Id::default(),
            edit_parameter: None,
            no_wait: false,
            waiter: PollingWaiter::default(),
            client,
        }
    }

    /// The precedence order of the checks below is significant
    pub fn builder(&self) -> DiskBuilder {
        let client = self.client.clone();
        let settings = self.settings.clone();
        let edit_parameter = self.edit_parameter.clone();

        if self.os_type == OsType::Custom {
            if !self.disk_id.is_empty() {
                return DiskBuilder::Connected(ConnectedDiskBuilder {
                    id: self.disk_id,
                    edit_parameter,
                    name: settings.name,
                    description: settings.description,
                    tags: settings.tags,
                    icon_id: settings.icon_id,
                    connection: settings.connection,
                    no_wait: self.no_wait,
                    client,
                    waiter: self.waiter,
                });
            }
            if !self.source_disk_id.is_empty() || !self.source_archive_id.is_empty() {
                return DiskBuilder::FromDiskOrArchive(FromDiskOrArchiveBuilder {
                    source_disk_id: self.source_disk_id,
                    source_archive_id: self.source_archive_id,
                    settings,
                    edit_parameter,
                    no_wait: self.no_wait,
                    id: Id::default(),
                    client,
                    waiter: self.waiter,
                });
            }
            return DiskBuilder::Blank(BlankBuilder {
                settings,
                no_wait: self.no_wait,
                id: Id::default(),
                client,
                waiter: self.waiter,
            });
        }

        if self.os_type.is_support_disk_edit() {
            return DiskBuilder::FromUnix(FromUnixBuilder {
                os_type: self.os_type,
                settings,
                edit_parameter,
                no_wait: self.no_wait,
                id: Id::default(),
                client,
                waiter: self.waiter,
            });
        }

        DiskBuilder::FromFixedArchive(FromFixedArchiveBuilder {
            os_type: self.os_type,
            settings,
            edit_parameter,
            no_wait: self.no_wait,
            id: Id::default(),
            client,
            waiter: self.waiter,
        })
    }
}
