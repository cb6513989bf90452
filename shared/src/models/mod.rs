//! Domain models for the tailoring shop backend

mod customer;
mod deletable;
mod material;
mod order;
mod style;
mod user;

pub use customer::*;
pub use deletable::*;
pub use material::*;
pub use order::*;
pub use style::*;
pub use user::*;

/// Stored text that names no variant of an enum
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
