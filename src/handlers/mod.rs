//! HTTP endpoint handlers for the agent.
//!
//! - `/processes`: display-ready process table
//! - `/processes/{pid}`: best-effort per-process details
//! - `/processes/{pid}/terminate`: SIGTERM request
//! - `/system`: system-wide CPU percent from the background sampler
//! - `/health`: plain-text collection statistics

pub mod actions;
pub mod health;
pub mod processes;
pub mod system;

// Re-export handlers
pub use actions::{details_handler, terminate_handler};
pub use health::health_handler;
pub use processes::processes_handler;
pub use system::system_handler;
