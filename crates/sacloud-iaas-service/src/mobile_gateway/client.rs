use sacloud_iaas::{ApiCaller, MobileGatewayApi, SimApi, ZoneApi};
use std::fmt;
use std::sync::Arc;

/// Provider operations used by the mobile gateway builder
#[derive(Clone)]
pub struct MobileGatewayClient {
    pub mobile_gateway: Arc<dyn MobileGatewayApi>,
    pub sim: Arc<dyn SimApi>,
    pub zone: Arc<dyn ZoneApi>,
}

impl MobileGatewayClient {
    pub fn new(caller: &dyn ApiCaller) -> Self {
        Self {
            mobile_gateway: caller.mobile_gateway(),
            sim: caller.sim(),
            zone: caller.zone(),
        }
    }
}

impl fmt::Debug for MobileGatewayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MobileGatewayClient").finish_non_exhaustive()
    }
}
