//! Quorlock CLI - configuration, logging and demo commands for the quorum
//! lock manager

pub mod cli;
pub mod commands;
pub mod config;
pub mod metrics;
pub mod startup;

pub use cli::{Cli, Command, ContendArgs, LockArgs};
pub use config::Configuration;
