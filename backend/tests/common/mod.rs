//! Shared fixtures for service-level tests running against the in-memory store

#![allow(dead_code)]

pub mod races;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use atelier_backend::error::{AppError, AppResult};
use atelier_backend::services::order::CreateOrderInput;
use atelier_backend::services::{AuditEntry, AuditSink, MaterialService, Notifier, OrderService};
use atelier_backend::store::{MemoryStore, Store};
use shared::models::{
    Customer, ItemType, Material, MaterialType, MaterialUnit, MaterialUsage, MovementType,
    Order, OrderStatus, Style,
};

pub fn dec(n: i64) -> Decimal {
    Decimal::from(n)
}

pub fn usage(material_id: Uuid, quantity: i64) -> MaterialUsage {
    MaterialUsage {
        material_id,
        quantity: dec(quantity),
    }
}

/// Notifier that records every event, optionally failing each call
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<String>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn push(&self, event: String) -> AppResult<()> {
        self.events.lock().unwrap().push(event);
        if self.fail {
            Err(AppError::ExternalService("gateway down".to_string()))
        } else {
            Ok(())
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Wait for the follow-up tasks to deliver at least `count` events
    pub async fn wait_for(&self, count: usize) -> Vec<String> {
        for _ in 0..200 {
            if self.events.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.events()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_order_created(&self, _customer: &Customer, order: &Order) -> AppResult<()> {
        self.push(format!("created:{}", order.id))
    }

    async fn notify_order_status_change(&self, _customer: &Customer, order: &Order) -> AppResult<()> {
        self.push(format!("status:{}:{}", order.id, order.status))
    }

    async fn notify_order_ready(&self, _customer: &Customer, order: &Order) -> AppResult<()> {
        self.push(format!("ready:{}", order.id))
    }

    async fn notify_low_stock(&self, material: &Material) -> AppResult<()> {
        self.push(format!("low:{}", material.id))
    }
}

/// Audit sink that records actions, optionally failing each call
#[derive(Default)]
pub struct RecordingAudit {
    pub actions: Mutex<Vec<String>>,
    pub fail: bool,
}

#[async_trait]
impl AuditSink for RecordingAudit {
    async fn log(&self, entry: AuditEntry) -> AppResult<()> {
        self.actions
            .lock()
            .unwrap()
            .push(format!("{}:{}", entry.action, entry.entity_id));
        if self.fail {
            Err(AppError::Internal("audit store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

pub struct Fixture {
    pub store: MemoryStore,
    pub orders: OrderService<MemoryStore>,
    pub materials: MaterialService<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub audit: Arc<RecordingAudit>,
    pub customer: Customer,
    /// A shirt style whose template allows Neck and Chest
    pub style: Style,
    pub user: Uuid,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_collaborators(RecordingNotifier::default(), RecordingAudit::default()).await
    }

    pub async fn with_collaborators(notifier: RecordingNotifier, audit: RecordingAudit) -> Self {
        let store = MemoryStore::new();
        let notifier = Arc::new(notifier);
        let audit = Arc::new(audit);

        let customer = Customer {
            id: Uuid::new_v4(),
            first_name: "Adaeze".to_string(),
            last_name: Some("Okafor".to_string()),
            email: Some("adaeze@example.com".to_string()),
            phone: None,
        };
        let style = Style {
            id: Uuid::new_v4(),
            name: "Oxford shirt".to_string(),
            category: "Shirt".to_string(),
            image_url: Some("https://img.example.com/oxford.png".to_string()),
        };

        let (c, s) = (customer.clone(), style.clone());
        store
            .seed(move |state| {
                state.customers.insert(c.id, c);
                state.styles.insert(s.id, s);
                state.item_types.insert(
                    "Shirt".to_string(),
                    ItemType {
                        name: "Shirt".to_string(),
                        fields: vec!["Neck".to_string(), "Chest".to_string()],
                    },
                );
            })
            .await;

        Self {
            orders: OrderService::new(store.clone(), notifier.clone(), audit.clone()),
            materials: MaterialService::new(store.clone(), notifier.clone(), audit.clone()),
            store,
            notifier,
            audit,
            customer,
            style,
            user: Uuid::new_v4(),
        }
    }

    /// Add a material directly to the store
    pub async fn add_material(&self, name: &str, quantity: i64, threshold: i64) -> Uuid {
        let now = Utc::now();
        let material = Material {
            id: Uuid::new_v4(),
            name: name.to_string(),
            material_type: MaterialType::Fabric,
            unit: MaterialUnit::Meter,
            quantity: dec(quantity),
            cost_per_unit: dec(10),
            low_stock_threshold: dec(threshold),
            sku: format!("SKU-{}", &Uuid::new_v4().simple().to_string()[..8]),
            is_deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        let id = material.id;
        self.store
            .seed(move |state| {
                state.materials.insert(material.id, material);
            })
            .await;
        id
    }

    pub async fn quantity(&self, material_id: Uuid) -> Decimal {
        self.store
            .find_material(material_id)
            .await
            .unwrap()
            .map(|m| m.quantity)
            .unwrap_or_default()
    }

    pub fn order_input(&self, status: OrderStatus, materials: Vec<MaterialUsage>) -> CreateOrderInput {
        CreateOrderInput {
            customer_id: self.customer.id,
            style_id: self.style.id,
            delivery_date: None,
            price: dec(120),
            discount: Decimal::ZERO,
            description: Some("Two-piece suit".to_string()),
            status,
            payment_status: Default::default(),
            measurement_snapshot: Default::default(),
            materials_used: materials,
        }
    }

    /// Net quantity reserved per material by the movements referencing an order
    pub async fn net_reserved(&self, order_id: Uuid, material_id: Uuid) -> Decimal {
        self.store
            .list_movements_by_reference(&order_id.to_string())
            .await
            .unwrap()
            .into_iter()
            .filter(|m| m.material_id == material_id)
            .map(|m| match m.movement_type {
                MovementType::Out => m.quantity,
                MovementType::In => -m.quantity,
                MovementType::Adjustment => Decimal::ZERO,
            })
            .sum()
    }

    pub async fn movement_count(&self) -> usize {
        self.store.snapshot().await.movements.len()
    }
}
