/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Room and player relay to the configured store.
pub mod room_service;
/// Server-Sent Events forwarding of store changes.
pub mod sse_service;
/// Room store connection supervisor with backoff.
pub mod storage_supervisor;
