//! In-process store used by tests and local tooling
//!
//! A transaction takes the state lock for its whole lifetime and works on a
//! copy of the state, so uncommitted writes are invisible and dropping the
//! transaction discards them.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use shared::models::{
    upsert_measurement_entry, Customer, ItemType, Material, MeasurementEntry, Order,
    StockMovement, Style,
};

use super::{Store, StoreTx};
use crate::error::{AppError, AppResult};

/// Everything the in-memory store holds
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub customers: HashMap<Uuid, Customer>,
    pub styles: HashMap<Uuid, Style>,
    /// Item types by name (a style's category)
    pub item_types: HashMap<String, ItemType>,
    pub materials: HashMap<Uuid, Material>,
    pub movements: Vec<StockMovement>,
    pub orders: HashMap<Uuid, Order>,
    pub measurements: Vec<MeasurementEntry>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutate the state directly, bypassing transactions
    pub async fn seed<F>(&self, f: F)
    where
        F: FnOnce(&mut MemoryState),
    {
        let mut state = self.state.lock().await;
        f(&mut state);
    }

    /// Copy of the committed state
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

fn newest_orders_first(orders: &mut [Order], deleted: bool) {
    if deleted {
        orders.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at).then(a.id.cmp(&b.id)));
    } else {
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> AppResult<MemoryTx> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTx { guard, working })
    }

    async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self, deleted: bool) -> AppResult<Vec<Order>> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|order| order.is_deleted == deleted)
            .cloned()
            .collect();
        newest_orders_first(&mut orders, deleted);
        Ok(orders)
    }

    async fn find_order_by_tracking_code(&self, code: &str) -> AppResult<Option<Order>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .find(|order| order.tracking_code == code)
            .cloned())
    }

    async fn find_material(&self, id: Uuid) -> AppResult<Option<Material>> {
        Ok(self.state.lock().await.materials.get(&id).cloned())
    }

    async fn list_materials(&self) -> AppResult<Vec<Material>> {
        let state = self.state.lock().await;
        let mut materials: Vec<Material> = state
            .materials
            .values()
            .filter(|material| !material.is_deleted)
            .cloned()
            .collect();
        materials.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(materials)
    }

    async fn list_movements(&self, material_id: Uuid) -> AppResult<Vec<StockMovement>> {
        let state = self.state.lock().await;
        // Insertion order breaks ties between movements logged in the same instant
        let mut movements: Vec<StockMovement> = state
            .movements
            .iter()
            .filter(|movement| movement.material_id == material_id)
            .cloned()
            .collect();
        movements.reverse();
        movements.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(movements)
    }

    async fn list_movements_by_reference(&self, reference: &str) -> AppResult<Vec<StockMovement>> {
        let state = self.state.lock().await;
        let mut movements: Vec<StockMovement> = state
            .movements
            .iter()
            .filter(|movement| movement.reference.as_deref() == Some(reference))
            .cloned()
            .collect();
        movements.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(movements)
    }

    async fn find_customer(&self, id: Uuid) -> AppResult<Option<Customer>> {
        Ok(self.state.lock().await.customers.get(&id).cloned())
    }

    async fn find_style(&self, id: Uuid) -> AppResult<Option<Style>> {
        Ok(self.state.lock().await.styles.get(&id).cloned())
    }

    async fn measurement_history(&self, customer_id: Uuid) -> AppResult<Vec<MeasurementEntry>> {
        let state = self.state.lock().await;
        let mut history: Vec<MeasurementEntry> = state
            .measurements
            .iter()
            .filter(|entry| entry.customer_id == customer_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(history)
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_material(&mut self, id: Uuid) -> AppResult<Option<Material>> {
        Ok(self.working.materials.get(&id).cloned())
    }

    async fn set_material_quantity(&mut self, id: Uuid, quantity: Decimal) -> AppResult<()> {
        if quantity < Decimal::ZERO {
            // Mirrors the CHECK constraint on materials.quantity
            return Err(AppError::Internal(format!(
                "Material {} quantity would become negative",
                id
            )));
        }
        if let Some(material) = self.working.materials.get_mut(&id) {
            material.quantity = quantity;
            material.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn insert_material(&mut self, material: &Material) -> AppResult<()> {
        self.working.materials.insert(material.id, material.clone());
        Ok(())
    }

    async fn update_material(&mut self, material: &Material) -> AppResult<()> {
        self.working.materials.insert(material.id, material.clone());
        Ok(())
    }

    async fn set_material_deleted(
        &mut self,
        id: Uuid,
        deleted_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        let material = self
            .working
            .materials
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Material".to_string()))?;
        material.is_deleted = deleted_at.is_some();
        material.deleted_at = deleted_at;
        material.updated_at = Utc::now();
        Ok(())
    }

    async fn sku_taken(&mut self, sku: &str, except: Option<Uuid>) -> AppResult<bool> {
        Ok(self
            .working
            .materials
            .values()
            .any(|material| material.sku == sku && Some(material.id) != except))
    }

    async fn insert_movement(&mut self, movement: &StockMovement) -> AppResult<()> {
        self.working.movements.push(movement.clone());
        Ok(())
    }

    async fn lock_order(&mut self, id: Uuid) -> AppResult<Option<Order>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn insert_order(&mut self, order: &Order) -> AppResult<()> {
        self.working.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> AppResult<()> {
        let stored = self
            .working
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
        *stored = order.clone();
        Ok(())
    }

    async fn set_order_deleted(
        &mut self,
        id: Uuid,
        deleted_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        let order = self
            .working
            .orders
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
        order.is_deleted = deleted_at.is_some();
        order.deleted_at = deleted_at;
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_order(&mut self, id: Uuid) -> AppResult<bool> {
        Ok(self.working.orders.remove(&id).is_some())
    }

    async fn find_customer(&mut self, id: Uuid) -> AppResult<Option<Customer>> {
        Ok(self.working.customers.get(&id).cloned())
    }

    async fn find_style(&mut self, id: Uuid) -> AppResult<Option<Style>> {
        Ok(self.working.styles.get(&id).cloned())
    }

    async fn find_item_type(&mut self, name: &str) -> AppResult<Option<ItemType>> {
        Ok(self.working.item_types.get(name).cloned())
    }

    async fn upsert_measurement(&mut self, entry: &MeasurementEntry) -> AppResult<()> {
        upsert_measurement_entry(&mut self.working.measurements, entry.clone());
        Ok(())
    }

    async fn commit(self) -> AppResult<()> {
        let MemoryTx { mut guard, working } = self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer() -> Customer {
        Customer {
            id: Uuid::new_v4(),
            first_name: "Amara".to_string(),
            last_name: None,
            email: None,
            phone: None,
        }
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let store = MemoryStore::new();
        let c = customer();
        store.seed(|state| {
            state.customers.insert(c.id, c.clone());
        }).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.upsert_measurement(&MeasurementEntry {
                customer_id: c.id,
                order_id: Uuid::new_v4(),
                date: Utc::now(),
                measurements: Default::default(),
                notes: None,
            })
            .await
            .unwrap();
        }

        assert!(store.measurement_history(c.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_committed_transaction_is_visible() {
        let store = MemoryStore::new();
        let c = customer();

        let mut tx = store.begin().await.unwrap();
        tx.upsert_measurement(&MeasurementEntry {
            customer_id: c.id,
            order_id: Uuid::new_v4(),
            date: Utc::now(),
            measurements: Default::default(),
            notes: Some("first fitting".to_string()),
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let history = store.measurement_history(c.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].notes.as_deref(), Some("first fitting"));
    }

    #[tokio::test]
    async fn test_writes_to_missing_rows_fail() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let id = Uuid::new_v4();

        assert!(matches!(
            tx.set_order_deleted(id, Some(Utc::now())).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            tx.set_material_deleted(id, None).await,
            Err(AppError::NotFound(_))
        ));
        assert!(tx.lock_order(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_of_purged_order_fails() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            tracking_code: shared::models::new_tracking_code(),
            customer_id: Uuid::new_v4(),
            style_id: Uuid::new_v4(),
            delivery_date: None,
            price: Decimal::from(100),
            discount: Decimal::ZERO,
            description: None,
            status: Default::default(),
            payment_status: Default::default(),
            measurement_snapshot: Default::default(),
            materials_used: Vec::new(),
            is_deleted: false,
            deleted_at: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        };

        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&order).await.unwrap();
        assert_eq!(tx.lock_order(order.id).await.unwrap(), Some(order.clone()));
        assert!(tx.delete_order(order.id).await.unwrap());
        assert!(matches!(tx.update_order(&order).await, Err(AppError::NotFound(_))));
    }
}
