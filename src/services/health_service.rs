use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the installed room store and report the host's health.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let reachable = match state.room_store().await {
        Some(store) => match store.health_check().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "room store health check failed");
                false
            }
        },
        None => {
            warn!("no room store installed (degraded mode)");
            false
        }
    };

    HealthResponse::new(state.is_degraded().await, reachable)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::room_store::memory::MemoryRoomStore, dto::health::HealthStatus,
        state::AppState,
    };

    #[tokio::test]
    async fn reports_degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default());
        let health = health_status(&state).await;
        assert_eq!(health.status, HealthStatus::Degraded);
        assert!(!health.store_reachable);

        state.set_room_store(Arc::new(MemoryRoomStore::new())).await;
        assert!(health_status(&state).await.is_ok());
    }
}
