//! Subcommand implementations

pub mod batch;
pub mod classify;
pub mod config;
pub mod doctor;
