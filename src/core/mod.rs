//! Shared foundations: error taxonomy and configuration.

pub mod config;
pub mod errors;
