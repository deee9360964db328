use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dao::models::RoomEntity;

/// Body of `PUT /rooms/{id}`: the new room row guarded by the version the writer read.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdateRoomRequest {
    /// Version the caller based its change on; a mismatch is answered with 409.
    pub expected_version: u64,
    /// Replacement row; its `version` field is ignored.
    #[validate(nested)]
    pub room: RoomEntity,
}

/// JSON error body returned by every failing route.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
}

/// Outcome of a player deletion.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeletedResponse {
    /// Whether a row was actually removed.
    pub deleted: bool,
}
