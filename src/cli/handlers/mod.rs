//! Command handlers for CLI operations
//!
//! This module contains handlers for different CLI commands,
//! separating command execution logic from parsing and validation.

pub mod enqueue;
pub mod migrate;
pub mod work;

pub use enqueue::EnqueueCommandHandler;
pub use migrate::MigrateCommandHandler;
pub use work::WorkCommandHandler;
