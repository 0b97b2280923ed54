//! Local input channels.

pub mod cli;

pub use cli::{CliChannel, CliCommand};
