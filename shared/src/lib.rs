//! Shared types and rules for the tailoring shop backend
//!
//! This crate holds the domain models and the pure stock and measurement
//! rules; it performs no I/O so every rule can be tested in isolation.

pub mod models;
pub mod validation;

pub use models::*;
pub use validation::*;
