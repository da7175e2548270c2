//! Burrow Core Components
//!
//! This crate provides the core functionality for the burrow daemon,
//! including configuration and the client-facing query and control surface.

mod config;
mod error;
mod interface;

pub use config::DaemonConfig;
pub use error::CoreError;
pub use interface::Interface;
