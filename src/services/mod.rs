/// Typed event emission helpers.
pub mod broadcast_events;
/// Challenge lifecycle orchestration.
pub mod challenge_service;
/// TTL-cached upstream game status lookups.
pub mod game_status;
/// Health check service.
pub mod health_service;
/// Storage reconnection supervisor.
pub mod storage_supervisor;
/// Background status reconciliation scheduler.
pub mod status_sync;
/// WebSocket connection and message handling service.
pub mod websocket_service;
