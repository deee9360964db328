use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Overall state of the store host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// A room store is installed and answering.
    Ok,
    /// No usable room store; room routes answer 503.
    Degraded,
}

/// Body of `GET /healthcheck`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    /// Outcome of the probe made while answering this request.
    pub store_reachable: bool,
}

impl HealthResponse {
    /// Combine the degraded flag with a fresh store probe.
    pub fn new(degraded: bool, store_reachable: bool) -> Self {
        let status = if degraded || !store_reachable {
            HealthStatus::Degraded
        } else {
            HealthStatus::Ok
        };
        Self {
            status,
            store_reachable,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == HealthStatus::Ok
    }
}
