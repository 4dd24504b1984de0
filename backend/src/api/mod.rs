//! HTTP API module.
//!
//! This module provides the HTTP server, response types and the log
//! broadcaster for the tabclean backend.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::start_server;
pub use types::*;
