//! Process snapshot agent: enumerates OS processes on a staleness-bounded
//! cadence and serves consistent snapshots to polling consumers, with
//! non-blocking semantics while a collection pass is in flight.

pub mod actions;
pub mod cache;
pub mod cli;
pub mod collector;
pub mod commands;
pub mod config;
pub mod error;
pub mod handlers;
pub mod health_stats;
pub mod lookup;
pub mod procfs;
pub mod snapshot;
pub mod state;
pub mod system;
pub mod view;

pub use cache::SnapshotCache;
pub use collector::{Collector, CollectorOptions};
pub use error::ProcError;
pub use snapshot::{ProcessDetails, ProcessRecord, Snapshot};
