//! Data Transfer Objects
//!
//! Request and response bodies exchanged with the inbound HTTP API and with
//! the source-control and environment APIs.

pub mod environment;
pub mod repository;
pub mod workload;
