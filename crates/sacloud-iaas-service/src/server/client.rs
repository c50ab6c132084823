use sacloud_iaas::{
    ApiCaller, DiskApi, InterfaceApi, PacketFilterApi, ServerApi, ServerPlanApi, SwitchApi,
};
use std::fmt;
use std::sync::Arc;

/// Provider operations used by the server builder
#[derive(Clone)]
pub struct ServerClient {
    pub disk: Arc<dyn DiskApi>,
    pub interface: Arc<dyn InterfaceApi>,
    pub packet_filter: Arc<dyn PacketFilterApi>,
    pub server: Arc<dyn ServerApi>,
    pub server_plan: Arc<dyn ServerPlanApi>,
    pub switch: Arc<dyn SwitchApi>,
}

impl ServerClient {
    pub fn new(caller: &dyn ApiCaller) -> Self {
        Self {
            disk: caller.disk(),
            interface: caller.interface(),
            packet_filter: caller.packet_filter(),
            server: caller.server(),
            server_plan: caller.server_plan(),
            switch: caller.switch(),
        }
    }
}

impl fmt::Debug for ServerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerClient").finish_non_exhaustive()
    }
}
