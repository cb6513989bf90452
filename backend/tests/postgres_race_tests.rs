//! Order races against PostgreSQL
//!
//! These tests need a disposable database in `ATELIER_TEST_DATABASE_URL` and
//! return early when it is unset. They run the same interleavings as the
//! in-memory lifecycle tests, with real row locks underneath.

mod common;

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use atelier_backend::services::order::CreateOrderInput;
use atelier_backend::services::{LogAuditSink, LogNotifier, OrderService};
use atelier_backend::store::PgStore;
use common::{dec, races, usage};
use shared::models::{MaterialUsage, OrderStatus};

struct PgFixture {
    pool: PgPool,
    store: PgStore,
    orders: OrderService<PgStore>,
    customer_id: Uuid,
    style_id: Uuid,
}

impl PgFixture {
    async fn connect() -> Option<Self> {
        let url = std::env::var("ATELIER_TEST_DATABASE_URL").ok()?;
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(&url)
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        let customer_id = Uuid::new_v4();
        sqlx::query("INSERT INTO customers (id, first_name) VALUES ($1, 'Ngozi')")
            .bind(customer_id)
            .execute(&pool)
            .await
            .unwrap();

        let style_id = Uuid::new_v4();
        sqlx::query("INSERT INTO styles (id, name, category) VALUES ($1, 'Agbada', 'Robe')")
            .bind(style_id)
            .execute(&pool)
            .await
            .unwrap();

        let store = PgStore::new(pool.clone());
        let orders = OrderService::new(store.clone(), Arc::new(LogNotifier), Arc::new(LogAuditSink));

        Some(Self {
            pool,
            store,
            orders,
            customer_id,
            style_id,
        })
    }

    async fn add_material(&self, name: &str, quantity: i64) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO materials (id, name, material_type, unit, quantity, sku, created_at, updated_at)
            VALUES ($1, $2, 'Fabric', 'Meter', $3, $4, $5, $5)
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(dec(quantity))
        .bind(format!("PG-{}", id.simple()))
        .bind(now)
        .execute(&self.pool)
        .await
        .unwrap();
        id
    }

    fn order_input(&self, status: OrderStatus, materials: Vec<MaterialUsage>) -> CreateOrderInput {
        CreateOrderInput {
            customer_id: self.customer_id,
            style_id: self.style_id,
            delivery_date: None,
            price: dec(300),
            discount: Decimal::ZERO,
            description: None,
            status,
            payment_status: Default::default(),
            measurement_snapshot: Default::default(),
            materials_used: materials,
        }
    }
}

#[tokio::test]
async fn test_pg_racing_cancellations_release_once() {
    let Some(fx) = PgFixture::connect().await else {
        return;
    };

    for _ in 0..5 {
        let m = fx.add_material("Wool", 100).await;
        let order = fx
            .orders
            .create_order(fx.order_input(OrderStatus::Pending, vec![usage(m, 10)]), None)
            .await
            .unwrap();

        races::double_cancel_releases_once(&fx.orders, &fx.store, &order, m, dec(100)).await;
    }
}

#[tokio::test]
async fn test_pg_cancel_racing_force_delete_releases_once() {
    let Some(fx) = PgFixture::connect().await else {
        return;
    };

    for _ in 0..5 {
        let m = fx.add_material("Wool", 100).await;
        let order = fx
            .orders
            .create_order(fx.order_input(OrderStatus::Cutting, vec![usage(m, 10)]), None)
            .await
            .unwrap();

        races::cancel_and_purge_release_once(&fx.orders, &fx.store, &order, m, dec(100)).await;
    }
}

#[tokio::test]
async fn test_pg_crossed_material_orders_both_reserve() {
    let Some(fx) = PgFixture::connect().await else {
        return;
    };

    for _ in 0..5 {
        let a = fx.add_material("Wool", 50).await;
        let b = fx.add_material("Lining", 50).await;

        races::crossed_orders_both_reserve(
            &fx.orders,
            &fx.store,
            fx.order_input(OrderStatus::Pending, vec![usage(a, 5), usage(b, 5)]),
            fx.order_input(OrderStatus::Pending, vec![usage(b, 7), usage(a, 7)]),
        )
        .await;
    }
}
