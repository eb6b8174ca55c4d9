//! SSH client configuration: host-pattern matching and config-file parsing.

pub mod config;
pub mod pattern;

pub use config::{HostConfig, SshConfig};
