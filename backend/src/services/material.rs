//! Material catalogue and manual stock control

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use shared::models::{AdjustmentMode, Deletable, Material, MaterialType, MaterialUnit, StockMovement};
use shared::validation::{validate_sku, validate_stock_level};

use super::audit::{AuditEntry, AuditSink};
use super::follow_up::{self, FollowUp};
use super::notification::Notifier;
use super::stock;
use crate::error::{AppError, AppResult};
use crate::store::{Store, StoreTx};

/// Reason logged for the opening balance of a new material
pub const INITIAL_STOCK_REASON: &str = "Initial stock";

/// Reason logged when a quantity is edited directly
pub const MANUAL_EDIT_REASON: &str = "Manual edit";

/// Material service
#[derive(Clone)]
pub struct MaterialService<S: Store> {
    store: S,
    notifier: Arc<dyn Notifier>,
    audit: Arc<dyn AuditSink>,
}

/// Input for creating a material
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateMaterialInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub material_type: MaterialType,
    pub unit: MaterialUnit,
    #[serde(default)]
    pub quantity: Decimal,
    #[serde(default)]
    pub cost_per_unit: Decimal,
    #[serde(default)]
    pub low_stock_threshold: Decimal,
    pub sku: String,
}

/// Direct edit of a material
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateMaterialInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub material_type: Option<MaterialType>,
    pub unit: Option<MaterialUnit>,
    pub quantity: Option<Decimal>,
    pub cost_per_unit: Option<Decimal>,
    pub low_stock_threshold: Option<Decimal>,
    pub sku: Option<String>,
}

/// Manual stock adjustment request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdjustStockInput {
    #[serde(rename = "type")]
    pub mode: AdjustmentMode,
    pub quantity: Decimal,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

fn check_level(field: &str, value: Decimal) -> AppResult<()> {
    validate_stock_level(value).map_err(|message| AppError::validation(field, message))
}

fn check_sku(sku: &str) -> AppResult<()> {
    validate_sku(sku).map_err(|message| AppError::validation("sku", message))
}

fn sku_conflict(sku: &str) -> AppError {
    AppError::Conflict {
        resource: "sku".to_string(),
        message: format!("SKU {} is already in use", sku),
    }
}

impl<S: Store> MaterialService<S> {
    pub fn new(store: S, notifier: Arc<dyn Notifier>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            store,
            notifier,
            audit,
        }
    }

    fn schedule(&self, job: FollowUp) {
        follow_up::spawn(
            self.store.clone(),
            self.notifier.clone(),
            self.audit.clone(),
            job,
        );
    }

    /// Create a material; a non-zero opening quantity is logged as stock in
    pub async fn create_material(
        &self,
        input: CreateMaterialInput,
        user_id: Option<Uuid>,
    ) -> AppResult<Material> {
        input.validate()?;
        check_sku(&input.sku)?;
        check_level("quantity", input.quantity)?;
        check_level("cost_per_unit", input.cost_per_unit)?;
        check_level("low_stock_threshold", input.low_stock_threshold)?;

        let mut tx = self.store.begin().await?;

        if tx.sku_taken(&input.sku, None).await? {
            return Err(sku_conflict(&input.sku));
        }

        let now = Utc::now();
        let mut material = Material {
            id: Uuid::new_v4(),
            name: input.name,
            material_type: input.material_type,
            unit: input.unit,
            quantity: Decimal::ZERO,
            cost_per_unit: input.cost_per_unit,
            low_stock_threshold: input.low_stock_threshold,
            sku: input.sku,
            is_deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        tx.insert_material(&material).await?;

        if input.quantity > Decimal::ZERO {
            let (stocked, _) = stock::adjust(
                &mut tx,
                material.id,
                input.quantity,
                AdjustmentMode::In,
                INITIAL_STOCK_REASON,
                user_id,
            )
            .await?;
            material = stocked;
        }

        tx.commit().await?;

        tracing::info!("Created material {} ({})", material.name, material.sku);
        self.schedule(FollowUp {
            notice: None,
            low_stock: vec![material.id],
            audit: Some(AuditEntry::material(user_id, "CREATE", material.id)),
        });

        Ok(material)
    }

    /// Edit a material directly. A quantity change is logged as one movement.
    pub async fn update_material(
        &self,
        id: Uuid,
        patch: UpdateMaterialInput,
        user_id: Option<Uuid>,
    ) -> AppResult<Material> {
        patch.validate()?;
        if let Some(sku) = &patch.sku {
            check_sku(sku)?;
        }
        if let Some(quantity) = patch.quantity {
            check_level("quantity", quantity)?;
        }
        if let Some(cost) = patch.cost_per_unit {
            check_level("cost_per_unit", cost)?;
        }
        if let Some(threshold) = patch.low_stock_threshold {
            check_level("low_stock_threshold", threshold)?;
        }

        let mut tx = self.store.begin().await?;

        let mut material = tx
            .lock_material(id)
            .await?
            .filter(|material| !material.is_deleted())
            .ok_or_else(|| AppError::NotFound("Material".to_string()))?;

        if let Some(sku) = patch.sku {
            if sku != material.sku && tx.sku_taken(&sku, Some(material.id)).await? {
                return Err(sku_conflict(&sku));
            }
            material.sku = sku;
        }
        if let Some(name) = patch.name {
            material.name = name;
        }
        if let Some(material_type) = patch.material_type {
            material.material_type = material_type;
        }
        if let Some(unit) = patch.unit {
            material.unit = unit;
        }
        if let Some(cost) = patch.cost_per_unit {
            material.cost_per_unit = cost;
        }
        if let Some(threshold) = patch.low_stock_threshold {
            material.low_stock_threshold = threshold;
        }
        material.updated_at = Utc::now();
        tx.update_material(&material).await?;

        let new_quantity = patch
            .quantity
            .filter(|quantity| *quantity != material.quantity);
        let quantity_changed = new_quantity.is_some();
        if let Some(quantity) = new_quantity {
            let (adjusted, _) = stock::adjust(
                &mut tx,
                material.id,
                quantity,
                AdjustmentMode::Adjustment,
                MANUAL_EDIT_REASON,
                user_id,
            )
            .await?;
            material.quantity = adjusted.quantity;
            material.updated_at = adjusted.updated_at;
        }

        tx.commit().await?;

        tracing::info!("Updated material {} (quantity changed: {})", material.id, quantity_changed);
        self.schedule(FollowUp {
            notice: None,
            low_stock: vec![material.id],
            audit: Some(AuditEntry::material(user_id, "UPDATE", material.id)),
        });

        Ok(material)
    }

    /// Manual stock adjustment through the ledger
    pub async fn adjust_stock(
        &self,
        id: Uuid,
        input: AdjustStockInput,
        user_id: Option<Uuid>,
    ) -> AppResult<(Material, StockMovement)> {
        input.validate()?;

        let mut tx = self.store.begin().await?;

        if tx
            .lock_material(id)
            .await?
            .filter(|material| !material.is_deleted())
            .is_none()
        {
            return Err(AppError::NotFound("Material".to_string()));
        }

        let (material, movement) =
            stock::adjust(&mut tx, id, input.quantity, input.mode, &input.reason, user_id).await?;
        tx.commit().await?;

        tracing::info!(
            "Adjusted material {}: {} {} ({})",
            material.id,
            movement.movement_type.as_str(),
            movement.quantity,
            movement.reason
        );
        self.schedule(FollowUp {
            notice: None,
            low_stock: vec![material.id],
            audit: Some(AuditEntry::material(user_id, "ADJUST", material.id).with_details(
                serde_json::json!({
                    "type": movement.movement_type,
                    "quantity": movement.quantity,
                    "reason": movement.reason,
                }),
            )),
        });

        Ok((material, movement))
    }

    /// Move a material to the trash. Stock, history and reservations are kept.
    pub async fn soft_delete_material(&self, id: Uuid, user_id: Option<Uuid>) -> AppResult<Material> {
        let mut tx = self.store.begin().await?;

        let mut material = tx
            .lock_material(id)
            .await?
            .filter(|material| !material.is_deleted())
            .ok_or_else(|| AppError::NotFound("Material".to_string()))?;

        material.mark_deleted(Utc::now());
        tx.set_material_deleted(material.id, material.deleted_at).await?;
        tx.commit().await?;

        tracing::info!("Moved material {} ({}) to trash", material.name, material.sku);
        self.schedule(FollowUp::audit_only(AuditEntry::material(
            user_id,
            "SOFT_DELETE",
            material.id,
        )));

        Ok(material)
    }

    pub async fn restore_material(&self, id: Uuid, user_id: Option<Uuid>) -> AppResult<Material> {
        let mut tx = self.store.begin().await?;

        let mut material = tx
            .lock_material(id)
            .await?
            .filter(|material| material.is_deleted())
            .ok_or_else(|| AppError::NotFound("Material".to_string()))?;

        material.restore(Utc::now());
        tx.set_material_deleted(material.id, None).await?;
        tx.commit().await?;

        tracing::info!("Restored material {} ({})", material.name, material.sku);
        self.schedule(FollowUp {
            notice: None,
            low_stock: vec![material.id],
            audit: Some(AuditEntry::material(user_id, "RESTORE", material.id)),
        });

        Ok(material)
    }

    pub async fn list_materials(&self) -> AppResult<Vec<Material>> {
        self.store.list_materials().await
    }

    pub async fn get_material(&self, id: Uuid) -> AppResult<Material> {
        self.store
            .find_material(id)
            .await?
            .filter(|material| !material.is_deleted())
            .ok_or_else(|| AppError::NotFound("Material".to_string()))
    }

    /// Movements of a material, newest first
    pub async fn list_movements(&self, id: Uuid) -> AppResult<Vec<StockMovement>> {
        if self.store.find_material(id).await?.is_none() {
            return Err(AppError::NotFound("Material".to_string()));
        }
        self.store.list_movements(id).await
    }

    /// Materials at or below their low-stock threshold
    pub async fn low_stock(&self) -> AppResult<Vec<Material>> {
        Ok(self
            .store
            .list_materials()
            .await?
            .into_iter()
            .filter(Material::is_low_stock)
            .collect())
    }
}
