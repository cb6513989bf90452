//! Validation utilities for orders, materials and measurement snapshots

use rust_decimal::Decimal;

use crate::models::{MaterialUsage, MeasurementSnapshot};

/// Snapshot key that is always accepted, whatever the item type template says
pub const NOTES_KEY: &str = "Notes";

/// Length of a public order tracking code
pub const TRACKING_CODE_LEN: usize = 24;

// ============================================================================
// Measurement Validations
// ============================================================================

/// Check every snapshot key against the permitted field names.
///
/// Missing fields are fine; unknown ones are not. Returns the first unknown key.
pub fn find_unknown_measurement_field<'a>(
    snapshot: &'a MeasurementSnapshot,
    allowed: &[String],
) -> Option<&'a str> {
    snapshot
        .keys()
        .map(String::as_str)
        .find(|key| *key != NOTES_KEY && !allowed.iter().any(|field| field == key))
}

/// Split the free-text notes out of a snapshot
pub fn snapshot_notes(snapshot: &MeasurementSnapshot) -> Option<String> {
    snapshot
        .get(NOTES_KEY)
        .map(|notes| notes.trim().to_string())
        .filter(|notes| !notes.is_empty())
}

// ============================================================================
// Order Validations
// ============================================================================

/// Validate every material line of an order; returns the offending index
pub fn validate_materials_used(materials: &[MaterialUsage]) -> Result<(), (usize, &'static str)> {
    for (index, usage) in materials.iter().enumerate() {
        if usage.quantity <= Decimal::ZERO {
            return Err((index, "Material quantity must be positive"));
        }
    }
    Ok(())
}

/// Validate a monetary amount (price or discount)
pub fn validate_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount < Decimal::ZERO {
        return Err("Amount cannot be negative");
    }
    Ok(())
}

/// Check whether a string is a well-formed tracking code (24 hex characters)
pub fn is_valid_tracking_code(code: &str) -> bool {
    code.len() == TRACKING_CODE_LEN && code.chars().all(|c| c.is_ascii_hexdigit())
}

// ============================================================================
// Material Validations
// ============================================================================

/// Validate SKU format (alphanumeric with dashes, 2-32 characters)
pub fn validate_sku(sku: &str) -> Result<(), &'static str> {
    if sku.len() < 2 || sku.len() > 32 {
        return Err("SKU must be 2-32 characters");
    }
    if !sku.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err("SKU may only contain letters, digits, dashes and underscores");
    }
    Ok(())
}

/// Validate an on-hand quantity or threshold
pub fn validate_stock_level(quantity: Decimal) -> Result<(), &'static str> {
    if quantity < Decimal::ZERO {
        return Err("Quantity cannot be negative");
    }
    Ok(())
}
