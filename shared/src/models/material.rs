//! Material stock models and quantity arithmetic

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{Deletable, UnknownVariant};

/// Kind of stocked material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialType {
    Fabric,
    Thread,
    Button,
    Zipper,
    Lining,
    Accessory,
    Other,
}

impl MaterialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialType::Fabric => "Fabric",
            MaterialType::Thread => "Thread",
            MaterialType::Button => "Button",
            MaterialType::Zipper => "Zipper",
            MaterialType::Lining => "Lining",
            MaterialType::Accessory => "Accessory",
            MaterialType::Other => "Other",
        }
    }
}

impl FromStr for MaterialType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Fabric" => Ok(MaterialType::Fabric),
            "Thread" => Ok(MaterialType::Thread),
            "Button" => Ok(MaterialType::Button),
            "Zipper" => Ok(MaterialType::Zipper),
            "Lining" => Ok(MaterialType::Lining),
            "Accessory" => Ok(MaterialType::Accessory),
            "Other" => Ok(MaterialType::Other),
            _ => Err(UnknownVariant::new("material type", s)),
        }
    }
}

/// Unit a material is counted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialUnit {
    Meter,
    Yard,
    Piece,
    Roll,
    Spool,
    Kg,
}

impl MaterialUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialUnit::Meter => "Meter",
            MaterialUnit::Yard => "Yard",
            MaterialUnit::Piece => "Piece",
            MaterialUnit::Roll => "Roll",
            MaterialUnit::Spool => "Spool",
            MaterialUnit::Kg => "Kg",
        }
    }
}

impl FromStr for MaterialUnit {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Meter" => Ok(MaterialUnit::Meter),
            "Yard" => Ok(MaterialUnit::Yard),
            "Piece" => Ok(MaterialUnit::Piece),
            "Roll" => Ok(MaterialUnit::Roll),
            "Spool" => Ok(MaterialUnit::Spool),
            "Kg" => Ok(MaterialUnit::Kg),
            _ => Err(UnknownVariant::new("material unit", s)),
        }
    }
}

/// A stocked material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: Uuid,
    pub name: String,
    pub material_type: MaterialType,
    pub unit: MaterialUnit,
    /// Never negative
    pub quantity: Decimal,
    pub cost_per_unit: Decimal,
    pub low_stock_threshold: Decimal,
    pub sku: String,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Material {
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.low_stock_threshold
    }
}

impl Deletable for Material {
    fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    fn mark_deleted(&mut self, at: DateTime<Utc>) {
        self.is_deleted = true;
        self.deleted_at = Some(at);
        self.updated_at = at;
    }

    fn restore(&mut self, at: DateTime<Utc>) {
        self.is_deleted = false;
        self.deleted_at = None;
        self.updated_at = at;
    }
}

/// Direction of a logged stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementType {
    In,
    Out,
    Adjustment,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "IN",
            MovementType::Out => "OUT",
            MovementType::Adjustment => "ADJUSTMENT",
        }
    }
}

impl FromStr for MovementType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN" => Ok(MovementType::In),
            "OUT" => Ok(MovementType::Out),
            "ADJUSTMENT" => Ok(MovementType::Adjustment),
            _ => Err(UnknownVariant::new("movement type", s)),
        }
    }
}

/// Immutable record of one change to a material's quantity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: Uuid,
    pub material_id: Uuid,
    pub movement_type: MovementType,
    /// Magnitude of the change, never negative
    pub quantity: Decimal,
    pub reason: String,
    /// Free-text link to the order or purchase order behind the change
    pub reference: Option<String>,
    pub performed_by: Option<Uuid>,
    pub date: DateTime<Utc>,
}

/// How a manual stock adjustment interprets its value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdjustmentMode {
    /// Add the value to the current quantity
    In,
    /// Subtract the value from the current quantity
    Out,
    /// Set the quantity to the value
    Adjustment,
}

/// Realized effect of a stock operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockChange {
    pub new_quantity: Decimal,
    pub movement_type: MovementType,
    pub magnitude: Decimal,
}

/// Stock arithmetic violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    #[error("insufficient stock: {available} available, {requested} requested")]
    Insufficient { available: Decimal, requested: Decimal },

    #[error("stock cannot go negative: {current} on hand, {requested} requested")]
    Negative { current: Decimal, requested: Decimal },

    #[error("{0}")]
    InvalidValue(&'static str),

    #[error("stock would exceed the supported range: {current} on hand, {requested} added")]
    Overflow { current: Decimal, requested: Decimal },
}

/// Quantity left after reserving `requested` units for an order
pub fn deduct_quantity(current: Decimal, requested: Decimal) -> Result<Decimal, StockError> {
    if requested <= Decimal::ZERO {
        return Err(StockError::InvalidValue("Quantity must be positive"));
    }
    if current < requested {
        return Err(StockError::Insufficient {
            available: current,
            requested,
        });
    }
    Ok(current - requested)
}

/// Quantity after `released` units come back from an order
pub fn restore_quantity(current: Decimal, released: Decimal) -> Result<Decimal, StockError> {
    current.checked_add(released).ok_or(StockError::Overflow {
        current,
        requested: released,
    })
}

/// Compute the result of a manual adjustment.
///
/// `In`/`Out` take a positive amount. `Adjustment` takes the new absolute
/// quantity; the logged direction and magnitude come from the signed
/// difference, and an unchanged quantity is logged as a zero `Adjustment`.
pub fn apply_adjustment(
    current: Decimal,
    mode: AdjustmentMode,
    value: Decimal,
) -> Result<StockChange, StockError> {
    match mode {
        AdjustmentMode::In => {
            if value <= Decimal::ZERO {
                return Err(StockError::InvalidValue("Quantity must be positive"));
            }
            Ok(StockChange {
                new_quantity: restore_quantity(current, value)?,
                movement_type: MovementType::In,
                magnitude: value,
            })
        }
        AdjustmentMode::Out => {
            if value <= Decimal::ZERO {
                return Err(StockError::InvalidValue("Quantity must be positive"));
            }
            let new_quantity = current - value;
            if new_quantity < Decimal::ZERO {
                return Err(StockError::Negative {
                    current,
                    requested: value,
                });
            }
            Ok(StockChange {
                new_quantity,
                movement_type: MovementType::Out,
                magnitude: value,
            })
        }
        AdjustmentMode::Adjustment => {
            if value < Decimal::ZERO {
                return Err(StockError::Negative {
                    current,
                    requested: value,
                });
            }
            let delta = value - current;
            let movement_type = if delta > Decimal::ZERO {
                MovementType::In
            } else if delta < Decimal::ZERO {
                MovementType::Out
            } else {
                MovementType::Adjustment
            };
            Ok(StockChange {
                new_quantity: value,
                movement_type,
                magnitude: delta.abs(),
            })
        }
    }
}
