pub mod bridge;
pub mod config_loader;
pub mod gateway;
pub mod host;
pub mod output;
pub mod ports;
pub mod process_control;
pub mod publisher;
pub mod readiness;
pub mod registry;
pub mod report;
pub mod signals;
pub mod state;
pub mod supervisor;
