//! Read-only HTTP API
//!
//! Exposes the latest coordinator snapshot and streams tracker events.

pub mod health;
pub mod sse;
pub mod state;

pub use health::health_routes;
pub use sse::event_stream;
pub use state::state_routes;
