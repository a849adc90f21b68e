//! Core of the MCP gateway: launches stdio MCP servers behind a bridging tool,
//! confirms they are reachable, and publishes a client configuration that is
//! personalized to the address each client used to reach the gateway.

pub mod error;
pub mod models;
pub mod services;

pub use error::{GatewayError, Result};
