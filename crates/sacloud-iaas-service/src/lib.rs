//! Builders and reconciliation services for Sakura Cloud IaaS resources
//!
//! This crate turns a desired state into a sequence of provider calls and
//! drives them to completion: it creates resources, waits for them to
//! settle, retries failed copies and reconciles existing resources with as
//! few mutating calls as possible.
//!
//! # Features
//!
//! - Polling waiter with timeout and cancellation
//! - Create-with-rollback setup for resources that copy asynchronously
//! - Disk builders (blank, Unix with edit, fixed archive, disk or archive copy,
//!   connected) selected by [`disk::Director`]
//! - Server builder with disk, NIC, plan and CD-ROM reconciliation
//! - Mobile gateway builder with SIM, DNS and traffic reconciliation
//! - VPC router builder with NIC and router setting reconciliation
//! - Request/service layer with explicit partial-update merging
//!
//! # Example
//!
//! ```ignore
//! use sacloud_iaas_service::{ServiceConfig, server};
//!
//! let config = ServiceConfig::from_env()?;
//! let service = server::Service::with_config(caller, config);
//!
//! let created = service
//!     .create(&server::CreateRequest {
//!         name: "web".into(),
//!         cpu: 2,
//!         memory_gb: 4,
//!         ..Default::default()
//!     })
//!     .await?;
//! ```

pub mod config;
pub mod disk;
pub mod error;
pub mod merge;
pub mod mobile_gateway;
pub mod power;
pub mod server;
pub mod setup;
pub mod update_level;
pub mod vpc_router;
pub mod wait;

pub use config::ServiceConfig;
pub use error::{PartialFailure, Result, ServiceError};
pub use setup::{RetryableSetup, SetupHandler, SetupOptions};
pub use update_level::UpdateLevel;
pub use wait::{PollingWaiter, WaitResult};
