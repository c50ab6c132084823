use sacloud_iaas::{ApiCaller, VpcRouterApi};
use std::fmt;
use std::sync::Arc;

/// Provider operations used by the VPC router builder
#[derive(Clone)]
pub struct VpcRouterClient {
    pub vpc_router: Arc<dyn VpcRouterApi>,
}

impl VpcRouterClient {
    pub fn new(caller: &dyn ApiCaller) -> Self {
        Self {
            vpc_router: caller.vpc_router(),
        }
    }
}

impl fmt::Debug for VpcRouterClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VpcRouterClient").finish_non_exhaustive()
    }
}
