//! Core domain types
//!
//! These types mirror the resources owned by the external systems. None of them
//! are persisted locally: the infra-stack registry is the source of truth and
//! tags on a stack are the only metadata channel the platform controls.

pub mod deployment;
pub mod stack;
pub mod tag;
pub mod team;
pub mod workload;
