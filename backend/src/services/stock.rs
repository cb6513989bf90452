//! Stock ledger: every quantity change is paired with one movement record
//!
//! These functions run inside a caller-owned transaction and never commit.
//! A failure part way through a list leaves earlier writes in the transaction,
//! so the caller's rollback is what keeps deductions all-or-nothing.

use std::collections::BTreeSet;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use shared::models::{
    apply_adjustment, deduct_quantity, restore_quantity, AdjustmentMode, Material,
    MaterialUsage, MovementType, StockError, StockMovement,
};

use crate::error::{AppError, AppResult};
use crate::store::StoreTx;

/// Reason logged when an order reserves stock
pub const ORDER_CREATION_REASON: &str = "Order Creation";

/// Reason logged when a reservation is released
pub const ORDER_REVERSAL_REASON: &str = "Order Cancellation/Draft";

fn movement(
    material_id: Uuid,
    movement_type: MovementType,
    quantity: Decimal,
    reason: &str,
    reference: Option<String>,
    performed_by: Option<Uuid>,
) -> StockMovement {
    StockMovement {
        id: Uuid::new_v4(),
        material_id,
        movement_type,
        quantity,
        reason: reason.to_string(),
        reference,
        performed_by,
        date: Utc::now(),
    }
}

fn stock_error(material: &Material, err: StockError) -> AppError {
    match err {
        StockError::Insufficient { available, requested } => AppError::InsufficientStock {
            material: material.name.clone(),
            available,
            requested,
        },
        StockError::Negative { current, requested } => AppError::NegativeStock {
            material: material.name.clone(),
            current,
            requested,
        },
        StockError::InvalidValue(message) => AppError::validation("quantity", message),
        StockError::Overflow { .. } => AppError::validation("quantity", err.to_string()),
    }
}

/// Distinct materials of an order in ascending id order
fn lock_sequence(materials: &[MaterialUsage]) -> Vec<Uuid> {
    let ids: BTreeSet<Uuid> = materials.iter().map(|usage| usage.material_id).collect();
    ids.into_iter().collect()
}

/// Lock every row an order touches before reading any quantity.
///
/// Locks are always taken in id order so two orders sharing materials queue
/// on the same first row instead of deadlocking.
async fn lock_all<T: StoreTx>(tx: &mut T, materials: &[MaterialUsage]) -> AppResult<()> {
    for id in lock_sequence(materials) {
        tx.lock_material(id).await?;
    }
    Ok(())
}

/// Reserve stock for an order, one OUT movement per entry.
///
/// Fails on the first missing material or short entry.
pub async fn deduct<T: StoreTx>(
    tx: &mut T,
    materials: &[MaterialUsage],
    order_id: Uuid,
    user_id: Option<Uuid>,
) -> AppResult<()> {
    lock_all(tx, materials).await?;

    for usage in materials {
        let material = tx
            .lock_material(usage.material_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Material {}", usage.material_id)))?;

        let remaining = deduct_quantity(material.quantity, usage.quantity)
            .map_err(|err| stock_error(&material, err))?;

        tx.set_material_quantity(material.id, remaining).await?;
        tx.insert_movement(&movement(
            material.id,
            MovementType::Out,
            usage.quantity,
            ORDER_CREATION_REASON,
            Some(order_id.to_string()),
            user_id,
        ))
        .await?;

        tracing::debug!(
            "Reserved {} of material {} for order {} ({} left)",
            usage.quantity,
            material.id,
            order_id,
            remaining
        );
    }

    Ok(())
}

/// Release an order's reservation, one IN movement per entry.
///
/// Materials that no longer exist are skipped.
pub async fn revert<T: StoreTx>(
    tx: &mut T,
    materials: &[MaterialUsage],
    order_id: Uuid,
    user_id: Option<Uuid>,
) -> AppResult<()> {
    lock_all(tx, materials).await?;

    for usage in materials {
        let Some(material) = tx.lock_material(usage.material_id).await? else {
            tracing::warn!(
                "Skipping stock reversal of {} for order {}: material {} no longer exists",
                usage.quantity,
                order_id,
                usage.material_id
            );
            continue;
        };

        let restored = restore_quantity(material.quantity, usage.quantity)
            .map_err(|err| stock_error(&material, err))?;
        tx.set_material_quantity(material.id, restored).await?;
        tx.insert_movement(&movement(
            material.id,
            MovementType::In,
            usage.quantity,
            ORDER_REVERSAL_REASON,
            Some(order_id.to_string()),
            user_id,
        ))
        .await?;
    }

    Ok(())
}

/// Manual stock adjustment; logs exactly one movement for the realized change
pub async fn adjust<T: StoreTx>(
    tx: &mut T,
    material_id: Uuid,
    value: Decimal,
    mode: AdjustmentMode,
    reason: &str,
    user_id: Option<Uuid>,
) -> AppResult<(Material, StockMovement)> {
    let mut material = tx
        .lock_material(material_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Material {}", material_id)))?;

    let change =
        apply_adjustment(material.quantity, mode, value).map_err(|err| stock_error(&material, err))?;

    tx.set_material_quantity(material.id, change.new_quantity).await?;

    let logged = movement(
        material.id,
        change.movement_type,
        change.magnitude,
        reason,
        None,
        user_id,
    );
    tx.insert_movement(&logged).await?;

    material.quantity = change.new_quantity;
    material.updated_at = logged.date;

    Ok((material, logged))
}
