use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for the KanaClash store host.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::create_room,
        crate::routes::rooms::get_room,
        crate::routes::rooms::update_room,
        crate::routes::rooms::delete_room,
        crate::routes::rooms::list_players,
        crate::routes::rooms::add_player,
        crate::routes::rooms::update_player,
        crate::routes::rooms::delete_player,
        crate::routes::sse::room_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::room::UpdateRoomRequest,
            crate::dto::room::ErrorBody,
            crate::dto::room::DeletedResponse,
            crate::dto::sse::Handshake,
            crate::dao::models::RoomEntity,
            crate::dao::models::PlayerEntity,
            crate::dao::room_store::StoreChange,
            crate::dao::room_store::ChangeTable,
            crate::dao::room_store::ChangeKind,
            crate::state::state_machine::GamePhase,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room and player rows"),
        (name = "sse", description = "Server-sent change streams"),
    )
)]
pub struct ApiDoc;

/// The generated document stamped with the crate version.
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info.title = "kana-clash store host".into();
    doc.info.version = env!("CARGO_PKG_VERSION").into();
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_room_routes() {
        let doc = openapi();
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));
        for path in [
            "/rooms",
            "/rooms/{id}",
            "/rooms/{id}/players/{player_id}",
            "/rooms/{id}/events",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
