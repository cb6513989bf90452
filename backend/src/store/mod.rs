//! Persistence boundary for the order and stock workflow
//!
//! Services open a [`StoreTx`] for every mutating operation and only commit once
//! every step succeeded. Dropping a transaction without committing discards all
//! of its writes.

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use shared::models::{
    Customer, ItemType, Material, MeasurementEntry, Order, StockMovement, Style,
};

use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::{MemoryState, MemoryStore};
pub use postgres::PgStore;

/// A datastore with multi-record transactions
#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    type Tx: StoreTx;

    /// Open a transaction
    async fn begin(&self) -> AppResult<Self::Tx>;

    /// Get an order, including trashed ones
    async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>>;

    /// List orders by trash state, newest first
    async fn list_orders(&self, deleted: bool) -> AppResult<Vec<Order>>;

    /// Get an order by its public tracking code (lowercase hex)
    async fn find_order_by_tracking_code(&self, code: &str) -> AppResult<Option<Order>>;

    async fn find_material(&self, id: Uuid) -> AppResult<Option<Material>>;

    /// List materials that are not trashed, by name
    async fn list_materials(&self) -> AppResult<Vec<Material>>;

    /// Movements for one material, newest first
    async fn list_movements(&self, material_id: Uuid) -> AppResult<Vec<StockMovement>>;

    /// Movements carrying a given reference (an order id), oldest first
    async fn list_movements_by_reference(&self, reference: &str) -> AppResult<Vec<StockMovement>>;

    async fn find_customer(&self, id: Uuid) -> AppResult<Option<Customer>>;

    async fn find_style(&self, id: Uuid) -> AppResult<Option<Style>>;

    /// Measurement history of a customer, newest first
    async fn measurement_history(&self, customer_id: Uuid) -> AppResult<Vec<MeasurementEntry>>;
}

/// One open unit of work
#[async_trait]
pub trait StoreTx: Send {
    /// Load a material and hold it against concurrent writers until commit
    async fn lock_material(&mut self, id: Uuid) -> AppResult<Option<Material>>;

    async fn set_material_quantity(&mut self, id: Uuid, quantity: Decimal) -> AppResult<()>;

    async fn insert_material(&mut self, material: &Material) -> AppResult<()>;

    /// Persist every editable column of a material, quantity included
    async fn update_material(&mut self, material: &Material) -> AppResult<()>;

    /// Set or clear the trash marker of a material; NotFound when it does not exist
    async fn set_material_deleted(
        &mut self,
        id: Uuid,
        deleted_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> AppResult<()>;

    /// Whether another material already uses this SKU
    async fn sku_taken(&mut self, sku: &str, except: Option<Uuid>) -> AppResult<bool>;

    async fn insert_movement(&mut self, movement: &StockMovement) -> AppResult<()>;

    /// Load an order and hold it against concurrent writers until commit.
    ///
    /// Every read-modify-write of an order starts here, before any of its
    /// materials are locked.
    async fn lock_order(&mut self, id: Uuid) -> AppResult<Option<Order>>;

    async fn insert_order(&mut self, order: &Order) -> AppResult<()>;

    /// Persist an order and replace its material lines; NotFound when it is gone
    async fn update_order(&mut self, order: &Order) -> AppResult<()>;

    /// Set or clear the trash marker of an order; NotFound when it is gone
    async fn set_order_deleted(
        &mut self,
        id: Uuid,
        deleted_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> AppResult<()>;

    /// Permanently remove an order; returns false when it did not exist
    async fn delete_order(&mut self, id: Uuid) -> AppResult<bool>;

    async fn find_customer(&mut self, id: Uuid) -> AppResult<Option<Customer>>;

    async fn find_style(&mut self, id: Uuid) -> AppResult<Option<Style>>;

    async fn find_item_type(&mut self, name: &str) -> AppResult<Option<ItemType>>;

    /// Insert the history entry for (customer, order) or replace the existing one
    async fn upsert_measurement(&mut self, entry: &MeasurementEntry) -> AppResult<()>;

    async fn commit(self) -> AppResult<()>;
}
