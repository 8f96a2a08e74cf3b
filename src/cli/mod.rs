//! CLI module
//!
//! Command-line interface for calling the API.
//!
//! # Commands
//!
//! - `auth` - Resolve authentication and report the method used
//! - `get` - GET an API path
//! - `request` - Send a request with any method and body

mod commands;
mod runner;

pub use commands::{Cli, Commands, ConnectionArgs, OutputFormat};
pub use runner::Runner;
