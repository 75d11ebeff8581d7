//! Sidekick Common - Shared utilities and types
//!
//! This crate provides the error type, configuration structs, wire
//! constants and message types used across all Sidekick components.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use config::{ClientConfig, ProxyConfig, SentinelPolicy};
pub use constants::*;
pub use error::{Result, SidekickError};
pub use types::{Message, Persona, Role};
pub use utils::*;
