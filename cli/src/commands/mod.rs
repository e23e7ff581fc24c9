//! CLI subcommands

pub mod config;
pub mod info;
pub mod session;
pub mod link;
