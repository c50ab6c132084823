//! Mobile gateway builder and service

pub mod builder;
pub mod client;
pub mod service;

pub use builder::{
    MobileGatewayBuilder, MobileGatewayOutcome, PrivateInterfaceSetting, SimChanges,
    SimRouteSetting, SimSetting,
};
pub use client::MobileGatewayClient;
pub use service::{
    AddSimRouteRequest, ApplyRequest, CreateRequest, DeleteRequest, ReadRequest, Service,
    UpdateRequest, UpdateSimRequest,
};
