//! CLI subcommand implementations.

pub mod connect;
