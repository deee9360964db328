//! [`RoomStore`](crate::dao::room_store::RoomStore) client for the `kana-clash` store host.

mod error;
mod events;
mod store;

pub use error::{HttpStoreError, HttpStoreResult};
pub use store::HttpRoomStore;
