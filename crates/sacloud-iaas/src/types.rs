//! Identifiers and enumerated values shared by every resource

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Resource identifier. The zero value means "not set".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id(pub u64);

impl Id {
    pub const fn new(value: u64) -> Self {
        Id(value)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for Id {
    fn from(value: u64) -> Self {
        Id(value)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Id {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Id::default());
        }
        s.parse::<u64>().map(Id)
    }
}

/// Resource lifecycle state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Uploading,
    Migrating,
    Transferring,
    Discontinued,
    Failed,
    #[default]
    Unknown,
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Availability::Failed)
    }

    /// Still moving towards `Available`
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            Availability::Uploading | Availability::Migrating | Availability::Transferring
        )
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Availability::Available => "available",
            Availability::Uploading => "uploading",
            Availability::Migrating => "migrating",
            Availability::Transferring => "transferring",
            Availability::Discontinued => "discontinued",
            Availability::Failed => "failed",
            Availability::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Power state of servers and appliances
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Up,
    Cleaning,
    Down,
    #[default]
    Unknown,
}

impl InstanceStatus {
    pub fn is_up(&self) -> bool {
        matches!(self, InstanceStatus::Up)
    }

    pub fn is_down(&self) -> bool {
        matches!(self, InstanceStatus::Down)
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstanceStatus::Up => "up",
            InstanceStatus::Cleaning => "cleaning",
            InstanceStatus::Down => "down",
            InstanceStatus::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Ownership scope of a switch or archive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Shared,
    #[default]
    User,
}

/// Upstream network of a server NIC
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamNetworkType {
    #[default]
    None,
    Shared,
    Switch,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceDriver {
    #[default]
    #[serde(rename = "virtio")]
    VirtIO,
    E1000,
}

impl fmt::Display for InterfaceDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterfaceDriver::VirtIO => write!(f, "virtio"),
            InterfaceDriver::E1000 => write!(f, "e1000"),
        }
    }
}

/// CPU commitment of a server plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    #[default]
    Standard,
    #[serde(rename = "dedicatedcpu")]
    DedicatedCpu,
}

/// Server plan generation. `Default` lets the provider pick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanGeneration {
    #[default]
    Default,
    G100,
    G200,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskConnection {
    #[default]
    #[serde(rename = "virtio")]
    VirtIO,
    Ide,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionAlgorithm {
    #[default]
    None,
    Aes256Xts,
}

/// Well-known public archive families
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsType {
    /// Not an OS type: the caller supplies the source or leaves the disk blank
    #[default]
    Custom,
    Ubuntu,
    Debian,
    RockyLinux,
    AlmaLinux,
    MiracleLinux,
    FreeBsd,
    Windows2022,
}

impl OsType {
    /// Whether disks built from this family accept the edit parameters
    /// (host name, password, SSH keys, startup scripts)
    pub fn is_support_disk_edit(&self) -> bool {
        matches!(
            self,
            OsType::Ubuntu
                | OsType::Debian
                | OsType::RockyLinux
                | OsType::AlmaLinux
                | OsType::MiracleLinux
        )
    }

    /// Tags that select the current public archive of this family
    pub fn archive_tags(&self) -> Vec<&'static str> {
        match self {
            OsType::Custom => vec![],
            OsType::Ubuntu => vec!["current-stable", "distro-ubuntu"],
            OsType::Debian => vec!["current-stable", "distro-debian"],
            OsType::RockyLinux => vec!["current-stable", "distro-rocky"],
            OsType::AlmaLinux => vec!["current-stable", "distro-alma"],
            OsType::MiracleLinux => vec!["current-stable", "distro-miracle"],
            OsType::FreeBsd => vec!["current-stable", "distro-freebsd"],
            OsType::Windows2022 => vec!["os-windows", "distro-ver-2022"],
        }
    }
}

impl fmt::Display for OsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OsType::Custom => "custom",
            OsType::Ubuntu => "ubuntu",
            OsType::Debian => "debian",
            OsType::RockyLinux => "rockylinux",
            OsType::AlmaLinux => "almalinux",
            OsType::MiracleLinux => "miraclelinux",
            OsType::FreeBsd => "freebsd",
            OsType::Windows2022 => "windows2022",
        };
        write!(f, "{}", s)
    }
}

/// Plans offered for VPC routers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VpcRouterPlan {
    #[default]
    Standard,
    Premium,
    HighSpec,
    HighSpec4000,
}

impl VpcRouterPlan {
    /// Standard routers take the shared segment and have no addressing of their own
    pub fn is_standard(&self) -> bool {
        matches!(self, VpcRouterPlan::Standard)
    }
}

/// Lifecycle accessors shared by every resource that is provisioned asynchronously
pub trait Provisioned {
    fn id(&self) -> Id;

    fn availability(&self) -> Availability;

    /// Power state. Resources without one report `Unknown`.
    fn instance_status(&self) -> InstanceStatus {
        InstanceStatus::Unknown
    }
}
