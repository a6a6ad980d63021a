//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, graceful shutdown)
//!     → request.rs (request ID, query parameters)
//!     → FallbackOrchestrator::resolve / health snapshot
//!     → response.rs (outcome → status + JSON body)
//!
//! WebSocket upgrade
//!     → websocket.rs (subscribe, forward events, close on shutdown)
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::{ResolveParams, X_REQUEST_ID};
pub use response::HealthReport;
pub use server::{echo_router, AppState, HttpServer, ServerError};
