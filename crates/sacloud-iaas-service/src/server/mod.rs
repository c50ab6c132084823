//! Server builder, NIC settings and the server service

pub mod builder;
pub mod client;
pub mod nic;
pub mod plan;
pub mod service;

pub use builder::{BuildResult, DEFAULT_CPU, DEFAULT_MEMORY_GB, ServerBuilder, ServerOutcome};
pub use client::ServerClient;
pub use nic::{AdditionalNicSetting, NicSetting};
pub use plan::{FindServerPlanRequest, find_server_plan};
pub use service::{
    ApplyRequest, ChangePlanRequest, CreateRequest, DeleteRequest, NetworkInterface, ReadRequest,
    Service, UpdateRequest,
};
