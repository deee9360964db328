/// Database model definitions.
pub mod models;
/// Shared room store abstraction and its backends.
pub mod room_store;
/// Storage abstraction layer for database operations.
pub mod storage;
