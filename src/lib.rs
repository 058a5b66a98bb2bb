pub mod cli;
pub mod client;
pub mod config;
pub mod core;

// Re-export for convenience
pub use crate::client::engine::ClientEngine;
pub use crate::config::ClientConfig;
