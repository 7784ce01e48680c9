//! Crashline Core - Shared configuration
//!
//! This crate holds the typed configuration that every other Crashline
//! crate reads:
//! - **Diagnostics** - whether panic reports are sent, and where
//! - **Logging** - tracing level and output format
//! - **Server** - listener address and store layout of the server process

pub mod config;

pub use config::{AnonymizeConfig, Config, ConfigBuilder, DiagnosticsConfig, ValidationError};
