//! Core value types: server configuration and the `KeepError` -> HTTP
//! mapping.

pub mod config;
pub mod error;

pub use config::ServerConfig;
pub use error::ApiError;
