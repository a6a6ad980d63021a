//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → every ShutdownSignal resolves
//!         → HTTP server stops accepting and drains
//!         → streaming connections send close
//!         → monitor loops leave their waits
//! ```
//!
//! # Design Decisions
//! - One trigger, many listeners; late subscribers see an already-fired signal
//! - The monitor bounds its exit by a grace period

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::{spawn_signal_handler, wait_for_signal};
