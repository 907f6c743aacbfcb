//! Client-facing HTTP/WebSocket surface.

pub mod messages;
pub mod routes;
pub mod websocket;

pub use routes::create_router;
