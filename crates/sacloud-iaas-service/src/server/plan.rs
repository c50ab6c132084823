//! Server plan lookup

use crate::error::{Result, ServiceError};
use sacloud_iaas::{Commitment, MIB_PER_GIB, PlanGeneration, ServerPlan, ServerPlanApi};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindServerPlanRequest {
    pub cpu: u32,
    pub memory_gb: u64,
    pub gpu: u32,
    /// Empty matches any model
    pub cpu_model: String,
    pub commitment: Commitment,
    /// `Default` matches any generation
    pub generation: PlanGeneration,
}

impl FindServerPlanRequest {
    fn matches(&self, plan: &ServerPlan) -> bool {
        plan.availability.is_available()
            && plan.cpu == self.cpu
            && plan.memory_mb == self.memory_gb * MIB_PER_GIB
            && plan.gpu == self.gpu
            && plan.commitment == self.commitment
            && (self.cpu_model.is_empty() || plan.cpu_model == self.cpu_model)
            && (self.generation == PlanGeneration::Default || plan.generation == self.generation)
    }
}

pub async fn find_server_plan(
    api: &dyn ServerPlanApi,
    zone: &str,
    req: &FindServerPlanRequest,
) -> Result<ServerPlan> {
    api.find(zone)
        .await?
        .into_iter()
        .find(|plan| req.matches(plan))
        .ok_or_else(|| {
            ServiceError::ServerPlanNotFound(format!(
                "cpu: {}, memory: {}GB, gpu: {}, commitment: {:?}, generation: {:?}",
                req.cpu, req.memory_gb, req.gpu, req.commitment, req.generation
            ))
        })
}
