//! services/api/src/lib.rs
//!
//! The HTTP service: Postgres and filesystem adapters, configuration and the axum router.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
