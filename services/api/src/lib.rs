//! services/api/src/lib.rs
//!
//! Library root for the API service: configuration, the service-wide error
//! type, the adapters implementing the core ports, and the web layer.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
