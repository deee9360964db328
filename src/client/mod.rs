//! Player-side session: room lifecycle, optimistic actions and reconciliation with the
//! shared store.

pub mod identity;
pub mod reconcile;
mod session;
pub mod sync;

pub use session::RoomClient;
