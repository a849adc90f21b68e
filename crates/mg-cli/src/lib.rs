//! Command-line front end for the MCP gateway.

pub mod cli;
pub mod logging;
