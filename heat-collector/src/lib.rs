//! Discovers EC2-style instances declared in Heat stacks and turns their
//! CloudWatch CPU utilization into telemetry samples.

pub mod agent;
pub mod collector_core;
pub mod collectors;
pub mod common;
pub mod config;
pub mod error;
pub mod heat;
pub mod identity;
pub mod inspector;
pub mod mock;
pub mod out;
#[cfg(test)]
mod testing;
pub mod types;
pub mod utils;

pub use error::{Error, Result};
