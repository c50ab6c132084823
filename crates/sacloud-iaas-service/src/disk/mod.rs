//! Disk builders, the director that selects them and the disk service

pub mod builder;
pub mod client;
pub mod director;
pub mod edit;
pub mod service;

pub use builder::{
    BlankBuilder, BuildOutcome, BuildResult, ConnectedDiskBuilder, DEFAULT_DISK_SIZE_GB,
    DISK_PLAN_HDD, DISK_PLAN_SSD, DiskBuilder, DiskSettings, FromDiskOrArchiveBuilder,
    FromFixedArchiveBuilder, FromUnixBuilder, UpdateResult, find_archive_by_os_type,
    update_level, validate_disk_plan,
};
pub use client::DiskClient;
pub use director::Director;
pub use edit::UnixEditRequest;
pub use service::{ApplyRequest, CreateRequest, DeleteRequest, ReadRequest, Service, UpdateRequest};
