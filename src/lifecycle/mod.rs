//! Process lifecycle.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate env → Logging → TLS material → Store + cache → Listener
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Stop accepting → Drain in-flight requests → Stop background tasks
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and happens before binding
//! - Listeners start last (traffic only when ready)

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{run, StartupError};
