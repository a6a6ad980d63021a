//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request for a query:
//!     → fallback.rs (walk provider chain in order)
//!     → circuit_breaker.rs (permit? record success/failure per provider)
//!     → events (report every step to subscribers)
//!
//! Monitor reconnects:
//!     → backoff.rs (doubling delay, capped, reset on success)
//! ```
//!
//! # Design Decisions
//! - Every outbound provider call has a deadline; no per-call retries
//! - Breaker state is per provider and process-local
//! - Fallback recovers every per-provider failure locally

pub mod backoff;
pub mod circuit_breaker;
pub mod fallback;

pub use backoff::BackoffState;
pub use circuit_breaker::{BreakerRegistry, BreakerStatus, CircuitBreaker, CircuitState};
pub use fallback::{DegradedResponse, FallbackOrchestrator, OrchestrationOutcome, ProviderHealth};
