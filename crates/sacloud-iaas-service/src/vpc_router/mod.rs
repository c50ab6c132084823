//! VPC router builder and service

pub mod builder;
pub mod client;
pub mod nic;
pub mod service;

pub use builder::{DEFAULT_VERSION, RouterSetting, VpcRouterBuilder, VpcRouterOutcome};
pub use client::VpcRouterClient;
pub use nic::{AdditionalNicSetting, MAX_NIC_INDEX, NicSetting};
pub use service::{
    AdditionalNicUpdate, ApplyRequest, CreateRequest, DeleteRequest, PremiumNicUpdate,
    ReadRequest, RouterSettingUpdate, Service, UpdateRequest,
};
