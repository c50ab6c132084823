//! Power operations that wait for the resulting instance state

use crate::error::Result;
use crate::wait::{self, PollingWaiter};
use sacloud_iaas::{Id, MobileGatewayApi, ServerApi, ServerBootRequest, VpcRouterApi};
use tracing::info;

/// Boot a server and wait until it is up
pub async fn boot_server(
    api: &dyn ServerApi,
    waiter: &PollingWaiter,
    zone: &str,
    id: Id,
    user_data: Option<&str>,
) -> Result<()> {
    info!("Booting server: {}", id);
    let req = ServerBootRequest {
        user_data: user_data.map(str::to_string),
    };
    api.boot(zone, id, &req).await?;
    wait::until_up(waiter, move || api.read(zone, id)).await?;
    Ok(())
}

/// Shut a server down and wait until it is down
pub async fn shutdown_server(
    api: &dyn ServerApi,
    waiter: &PollingWaiter,
    zone: &str,
    id: Id,
    force: bool,
) -> Result<()> {
    info!("Shutting down server: {} (force: {})", id, force);
    api.shutdown(zone, id, force).await?;
    wait::until_down(waiter, move || api.read(zone, id)).await?;
    Ok(())
}

pub async fn boot_mobile_gateway(
    api: &dyn MobileGatewayApi,
    waiter: &PollingWaiter,
    zone: &str,
    id: Id,
) -> Result<()> {
    info!("Booting mobile gateway: {}", id);
    api.boot(zone, id).await?;
    wait::until_up(waiter, move || api.read(zone, id)).await?;
    Ok(())
}

pub async fn shutdown_mobile_gateway(
    api: &dyn MobileGatewayApi,
    waiter: &PollingWaiter,
    zone: &str,
    id: Id,
    force: bool,
) -> Result<()> {
    info!("Shutting down mobile gateway: {} (force: {})", id, force);
    api.shutdown(zone, id, force).await?;
    wait::until_down(waiter, move || api.read(zone, id)).await?;
    Ok(())
}

pub async fn boot_vpc_router(
    api: &dyn VpcRouterApi,
    waiter: &PollingWaiter,
    zone: &str,
    id: Id,
) -> Result<()> {
    info!("Booting VPC router: {}", id);
    api.boot(zone, id).await?;
    wait::until_up(waiter, move || api.read(zone, id)).await?;
    Ok(())
}

pub async fn shutdown_vpc_router(
    api: &dyn VpcRouterApi,
    waiter: &PollingWaiter,
    zone: &str,
    id: Id,
    force: bool,
) -> Result<()> {
    info!("Shutting down VPC router: {} (force: {})", id, force);
    api.shutdown(zone, id, force).await?;
    wait::until_down(waiter, move || api.read(zone, id)).await?;
    Ok(())
}
