//! Shared service plumbing for Lorehaven services.
//!
//! Configuration loading, the common HTTP error, health probes, request ids
//! and tracing setup. Nothing in here knows about verification or forms.

pub mod config;
pub mod error;
pub mod health;
pub mod middleware;
pub mod serde;
pub mod tracing;
