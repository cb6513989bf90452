//! HTTP handlers

pub mod customer;
pub mod health;
pub mod material;
pub mod order;
pub mod path;

pub use customer::*;
pub use health::*;
pub use material::*;
pub use order::*;
pub use path::Path;

use serde::Serialize;

/// Plain acknowledgement body
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
