//! Style and item type templates

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A garment style offered by the shop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub id: Uuid,
    pub name: String,
    /// Matches an [`ItemType`] name
    pub category: String,
    pub image_url: Option<String>,
}

/// Measurement template for a garment category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemType {
    pub name: String,
    /// Measurement field names a snapshot may use
    pub fields: Vec<String>,
}
