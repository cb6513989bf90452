//! Order lifecycle: create, update, trash, restore and purge orders while
//! keeping material reservations consistent
//!
//! Every mutating operation runs in one store transaction. Stock, the order
//! row and the customer's measurement history commit together or not at all.
//! Notifications, low-stock alerts and audit entries are scheduled only after
//! the commit.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use shared::models::{
    new_tracking_code, plan_reconciliation, status_notice, Deletable, MaterialUsage,
    MeasurementSnapshot, Order, OrderNotice, OrderStatus, OrderTracking, PaymentStatus,
    StockMovement,
};
use shared::validation::{is_valid_tracking_code, validate_amount, validate_materials_used};

use super::audit::{AuditEntry, AuditSink};
use super::follow_up::{self, FollowUp};
use super::measurement;
use super::notification::Notifier;
use super::stock;
use crate::error::{AppError, AppResult};
use crate::store::{Store, StoreTx};

/// Order lifecycle service
#[derive(Clone)]
pub struct OrderService<S: Store> {
    store: S,
    notifier: Arc<dyn Notifier>,
    audit: Arc<dyn AuditSink>,
}

/// Input for creating an order
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOrderInput {
    pub customer_id: Uuid,
    pub style_id: Uuid,
    pub delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub measurement_snapshot: MeasurementSnapshot,
    #[serde(default)]
    pub materials_used: Vec<MaterialUsage>,
}

/// Partial update of an order; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateOrderInput {
    pub customer_id: Option<Uuid>,
    pub style_id: Option<Uuid>,
    pub delivery_date: Option<NaiveDate>,
    pub price: Option<Decimal>,
    pub discount: Option<Decimal>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub measurement_snapshot: Option<MeasurementSnapshot>,
    /// A present list replaces the order's materials, even when equal
    pub materials_used: Option<Vec<MaterialUsage>>,
}

fn check_amount(field: &str, amount: Decimal) -> AppResult<()> {
    validate_amount(amount).map_err(|message| AppError::validation(field, message))
}

fn check_materials(materials: &[MaterialUsage]) -> AppResult<()> {
    validate_materials_used(materials).map_err(|(index, message)| {
        AppError::validation(format!("materials_used[{}].quantity", index), message)
    })
}

fn material_ids(materials: &[MaterialUsage]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = materials.iter().map(|usage| usage.material_id).collect();
    ids.sort();
    ids.dedup();
    ids
}

impl<S: Store> OrderService<S> {
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

    /// Create an order, reserving its materials when the status calls for it
    pub async fn create_order(
        &self,
        input: CreateOrderInput,
        user_id: Option<Uuid>,
    ) -> AppResult<Order> {
        input.validate()?;
        check_amount("price", input.price)?;
        check_amount("discount", input.discount)?;
        check_materials(&input.materials_used)?;

        let mut tx = self.store.begin().await?;

        if tx.find_customer(input.customer_id).await?.is_none() {
            return Err(AppError::NotFound("Customer".to_string()));
        }
        if tx.find_style(input.style_id).await?.is_none() {
            return Err(AppError::NotFound("Style".to_string()));
        }

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            tracking_code: new_tracking_code(),
            customer_id: input.customer_id,
            style_id: input.style_id,
            delivery_date: input.delivery_date,
            price: input.price,
            discount: input.discount,
            description: input.description,
            status: input.status,
            payment_status: input.payment_status,
            measurement_snapshot: input.measurement_snapshot,
            materials_used: input.materials_used,
            is_deleted: false,
            deleted_at: None,
            created_by: user_id,
            created_at: now,
            updated_at: now,
        };

        if order.status.is_reserved() {
            stock::deduct(&mut tx, &order.materials_used, order.id, user_id).await?;
        }

        let has_snapshot = !order.measurement_snapshot.is_empty();
        if has_snapshot {
            measurement::validate_snapshot(&mut tx, order.style_id, &order.measurement_snapshot)
                .await?;
        }

        tx.insert_order(&order).await?;

        if has_snapshot {
            measurement::record_measurements(
                &mut tx,
                order.customer_id,
                order.id,
                &order.measurement_snapshot,
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            "Created order {} ({}) for customer {}",
            order.id,
            order.status,
            order.customer_id
        );

        let reserved = order.status.is_reserved();
        self.schedule(FollowUp {
            notice: (order.status != OrderStatus::Draft).then(|| (OrderNotice::Created, order.clone())),
            low_stock: if reserved {
                material_ids(&order.materials_used)
            } else {
                Vec::new()
            },
            audit: Some(AuditEntry::order(user_id, "CREATE", order.id).with_details(
                serde_json::json!({ "status": order.status, "reserved": reserved }),
            )),
        });

        Ok(order)
    }

    /// Apply a partial update, reconciling stock with the new status and materials
    pub async fn update_order(
        &self,
        id: Uuid,
        patch: UpdateOrderInput,
        user_id: Option<Uuid>,
    ) -> AppResult<Order> {
        patch.validate()?;
        if let Some(price) = patch.price {
            check_amount("price", price)?;
        }
        if let Some(discount) = patch.discount {
            check_amount("discount", discount)?;
        }
        if let Some(materials) = &patch.materials_used {
            check_materials(materials)?;
        }

        let mut tx = self.store.begin().await?;

        let mut order = tx
            .lock_order(id)
            .await?
            .filter(|order| !order.is_deleted())
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        let old_status = order.status;
        let new_status = patch.status.unwrap_or(old_status);
        let materials_replaced = patch.materials_used.is_some();
        let plan = plan_reconciliation(old_status, new_status, materials_replaced);

        let old_materials = std::mem::take(&mut order.materials_used);
        let new_materials = patch
            .materials_used
            .unwrap_or_else(|| old_materials.clone());

        // Release before reserving so replaced lines net out
        if plan.revert_old {
            stock::revert(&mut tx, &old_materials, order.id, user_id).await?;
        }
        if plan.deduct_new {
            stock::deduct(&mut tx, &new_materials, order.id, user_id).await?;
        }

        if let Some(customer_id) = patch.customer_id {
            if tx.find_customer(customer_id).await?.is_none() {
                return Err(AppError::NotFound("Customer".to_string()));
            }
            order.customer_id = customer_id;
        }
        if let Some(style_id) = patch.style_id {
            if tx.find_style(style_id).await?.is_none() {
                return Err(AppError::NotFound("Style".to_string()));
            }
            order.style_id = style_id;
        }
        if let Some(delivery_date) = patch.delivery_date {
            order.delivery_date = Some(delivery_date);
        }
        if let Some(price) = patch.price {
            order.price = price;
        }
        if let Some(discount) = patch.discount {
            order.discount = discount;
        }
        if let Some(description) = patch.description {
            order.description = Some(description);
        }
        if let Some(payment_status) = patch.payment_status {
            order.payment_status = payment_status;
        }
        order.status = new_status;
        order.materials_used = new_materials;

        if let Some(snapshot) = patch.measurement_snapshot {
            measurement::validate_snapshot(&mut tx, order.style_id, &snapshot).await?;
            if !snapshot.is_empty() {
                measurement::record_measurements(&mut tx, order.customer_id, order.id, &snapshot)
                    .await?;
            }
            order.measurement_snapshot = snapshot;
        }

        order.updated_at = Utc::now();
        tx.update_order(&order).await?;
        tx.commit().await?;

        tracing::info!(
            "Updated order {} ({} -> {}, revert: {}, deduct: {})",
            order.id,
            old_status,
            new_status,
            plan.revert_old,
            plan.deduct_new
        );

        self.schedule(FollowUp {
            notice: status_notice(old_status, new_status).map(|notice| (notice, order.clone())),
            low_stock: if plan.deduct_new {
                material_ids(&order.materials_used)
            } else {
                Vec::new()
            },
            audit: Some(AuditEntry::order(user_id, "UPDATE", order.id).with_details(
                serde_json::json!({
                    "from": old_status,
                    "to": new_status,
                    "materials_replaced": materials_replaced,
                }),
            )),
        });

        Ok(order)
    }

    /// Move an order to the trash. Its reservation stays in place.
    pub async fn soft_delete(&self, id: Uuid, user_id: Option<Uuid>) -> AppResult<Order> {
        let mut tx = self.store.begin().await?;

        let mut order = tx
            .lock_order(id)
            .await?
            .filter(|order| !order.is_deleted())
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        order.mark_deleted(Utc::now());
        tx.set_order_deleted(order.id, order.deleted_at).await?;
        tx.commit().await?;

        tracing::info!("Moved order {} to trash", order.id);
        self.schedule(FollowUp::audit_only(AuditEntry::order(user_id, "SOFT_DELETE", order.id)));

        Ok(order)
    }

    /// Take an order out of the trash; stock is untouched
    pub async fn restore(&self, id: Uuid, user_id: Option<Uuid>) -> AppResult<Order> {
        let mut tx = self.store.begin().await?;

        let mut order = tx
            .lock_order(id)
            .await?
            .filter(|order| order.is_deleted())
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        order.restore(Utc::now());
        tx.set_order_deleted(order.id, None).await?;
        tx.commit().await?;

        tracing::info!("Restored order {}", order.id);
        self.schedule(FollowUp::audit_only(AuditEntry::order(user_id, "RESTORE", order.id)));

        Ok(order)
    }

    /// Permanently remove an order, releasing any reservation it still holds
    pub async fn force_delete(&self, id: Uuid, user_id: Option<Uuid>) -> AppResult<()> {
        let mut tx = self.store.begin().await?;

        let order = tx
            .lock_order(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        let released = order.status.is_reserved();
        if released {
            stock::revert(&mut tx, &order.materials_used, order.id, user_id).await?;
        }

        if !tx.delete_order(order.id).await? {
            return Err(AppError::NotFound("Order".to_string()));
        }
        tx.commit().await?;

        tracing::info!("Permanently deleted order {} (stock released: {})", order.id, released);
        self.schedule(FollowUp::audit_only(
            AuditEntry::order(user_id, "FORCE_DELETE", order.id)
                .with_details(serde_json::json!({ "status": order.status, "released": released })),
        ));

        Ok(())
    }

    /// Get an order that is not in the trash
    pub async fn get_order(&self, id: Uuid) -> AppResult<Order> {
        self.store
            .find_order(id)
            .await?
            .filter(|order| !order.is_deleted())
            .ok_or_else(|| AppError::NotFound("Order".to_string()))
    }

    pub async fn list_orders(&self) -> AppResult<Vec<Order>> {
        self.store.list_orders(false).await
    }

    /// Orders in the trash, most recently deleted first
    pub async fn list_trash(&self) -> AppResult<Vec<Order>> {
        self.store.list_orders(true).await
    }

    /// Public tracking projection. Malformed codes read as unknown orders.
    pub async fn track_order(&self, code: &str) -> AppResult<OrderTracking> {
        if !is_valid_tracking_code(code) {
            return Err(AppError::NotFound("Order".to_string()));
        }

        let order = self
            .store
            .find_order_by_tracking_code(&code.to_ascii_lowercase())
            .await?
            .filter(|order| !order.is_deleted())
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        let style = self.store.find_style(order.style_id).await?;
        let customer = self.store.find_customer(order.customer_id).await?;

        Ok(OrderTracking {
            status: order.status,
            delivery_date: order.delivery_date,
            price: order.price,
            description: order.description,
            style_name: style.as_ref().map(|s| s.name.clone()),
            style_image: style.and_then(|s| s.image_url),
            customer_first_name: customer.map(|c| c.first_name),
        })
    }

    /// Stock movements logged against an order, oldest first
    pub async fn movements_for_order(&self, id: Uuid) -> AppResult<Vec<StockMovement>> {
        let order = self
            .store
            .find_order(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        self.store
            .list_movements_by_reference(&order.id.to_string())
            .await
    }
}
