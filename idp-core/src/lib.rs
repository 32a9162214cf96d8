//! IDP Core
//!
//! Core types and abstractions for the internal developer platform backend.
//!
//! This crate contains:
//! - Domain types: remote entities the platform coordinates (Stack, Deployment, Tag, etc.)
//! - DTOs: request/response shapes exchanged with callers and external APIs
//! - Slug normalization used to derive stack names from display names

pub mod domain;
pub mod dto;
pub mod slug;
