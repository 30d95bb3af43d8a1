//! Professional licence approval workflow for the Pune Municipal Corporation.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
