//! CLI command implementations for procsnap-agent.
//!
//! - `check`: system validation
//! - `config`: configuration file generation
//! - `test`: collection pass testing

pub mod check;
pub mod config;
pub mod test;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use test::command_test;
