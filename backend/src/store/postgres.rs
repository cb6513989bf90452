//! PostgreSQL store backed by sqlx transactions
//!
//! Material rows are read with `FOR UPDATE` inside a transaction, so two
//! operations touching the same material serialize their read-modify-write.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{types::Json, FromRow, PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::models::{
    Customer, ItemType, Material, MaterialUsage, MeasurementEntry, MeasurementSnapshot, Order,
    StockMovement, Style, UnknownVariant,
};

use super::{Store, StoreTx};
use crate::error::{AppError, AppResult};

/// Store over a PostgreSQL connection pool
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

/// Open PostgreSQL transaction; rolled back on drop unless committed
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const MATERIAL_COLUMNS: &str = "id, name, material_type, unit, quantity, cost_per_unit, \
     low_stock_threshold, sku, is_deleted, deleted_at, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, tracking_code, customer_id, style_id, delivery_date, price, \
     discount, description, status, payment_status, measurement_snapshot, is_deleted, \
     deleted_at, created_by, created_at, updated_at";

const MOVEMENT_COLUMNS: &str =
    "id, material_id, movement_type, quantity, reason, reference, performed_by, date";

fn unknown_variant(err: UnknownVariant) -> AppError {
    AppError::Internal(err.to_string())
}

#[derive(Debug, FromRow)]
struct MaterialRow {
    id: Uuid,
    name: String,
    material_type: String,
    unit: String,
    quantity: Decimal,
    cost_per_unit: Decimal,
    low_stock_threshold: Decimal,
    sku: String,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MaterialRow> for Material {
    type Error = AppError;

    fn try_from(row: MaterialRow) -> Result<Self, Self::Error> {
        Ok(Material {
            id: row.id,
            name: row.name,
            material_type: row.material_type.parse().map_err(unknown_variant)?,
            unit: row.unit.parse().map_err(unknown_variant)?,
            quantity: row.quantity,
            cost_per_unit: row.cost_per_unit,
            low_stock_threshold: row.low_stock_threshold,
            sku: row.sku,
            is_deleted: row.is_deleted,
            deleted_at: row.deleted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    tracking_code: String,
    customer_id: Uuid,
    style_id: Uuid,
    delivery_date: Option<NaiveDate>,
    price: Decimal,
    discount: Decimal,
    description: Option<String>,
    status: String,
    payment_status: String,
    measurement_snapshot: Json<MeasurementSnapshot>,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, materials_used: Vec<MaterialUsage>) -> AppResult<Order> {
        Ok(Order {
            id: self.id,
            tracking_code: self.tracking_code,
            customer_id: self.customer_id,
            style_id: self.style_id,
            delivery_date: self.delivery_date,
            price: self.price,
            discount: self.discount,
            description: self.description,
            status: self.status.parse().map_err(unknown_variant)?,
            payment_status: self.payment_status.parse().map_err(unknown_variant)?,
            measurement_snapshot: self.measurement_snapshot.0,
            materials_used,
            is_deleted: self.is_deleted,
            deleted_at: self.deleted_at,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderMaterialRow {
    order_id: Uuid,
    material_id: Uuid,
    quantity: Decimal,
}

#[derive(Debug, FromRow)]
struct MovementRow {
    id: Uuid,
    material_id: Uuid,
    movement_type: String,
    quantity: Decimal,
    reason: String,
    reference: Option<String>,
    performed_by: Option<Uuid>,
    date: DateTime<Utc>,
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        Ok(StockMovement {
            id: row.id,
            material_id: row.material_id,
            movement_type: row.movement_type.parse().map_err(unknown_variant)?,
            quantity: row.quantity,
            reason: row.reason,
            reference: row.reference,
            performed_by: row.performed_by,
            date: row.date,
        })
    }
}

#[derive(Debug, FromRow)]
struct CustomerRow {
    id: Uuid,
    first_name: String,
    last_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
        }
    }
}

#[derive(Debug, FromRow)]
struct StyleRow {
    id: Uuid,
    name: String,
    category: String,
    image_url: Option<String>,
}

impl From<StyleRow> for Style {
    fn from(row: StyleRow) -> Self {
        Style {
            id: row.id,
            name: row.name,
            category: row.category,
            image_url: row.image_url,
        }
    }
}

#[derive(Debug, FromRow)]
struct MeasurementRow {
    customer_id: Uuid,
    order_id: Uuid,
    date: DateTime<Utc>,
    measurements: Json<MeasurementSnapshot>,
    notes: Option<String>,
}

impl From<MeasurementRow> for MeasurementEntry {
    fn from(row: MeasurementRow) -> Self {
        MeasurementEntry {
            customer_id: row.customer_id,
            order_id: row.order_id,
            date: row.date,
            measurements: row.measurements.0,
            notes: row.notes,
        }
    }
}

// ============================================================================
// Query helpers shared by pooled reads and transactions
// ============================================================================

async fn fetch_material(
    conn: &mut PgConnection,
    id: Uuid,
    for_update: bool,
) -> AppResult<Option<Material>> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let sql = format!("SELECT {} FROM materials WHERE id = $1{}", MATERIAL_COLUMNS, lock);

    sqlx::query_as::<_, MaterialRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .map(Material::try_from)
        .transpose()
}

/// Attach material lines to a batch of order rows
async fn hydrate_orders(conn: &mut PgConnection, rows: Vec<OrderRow>) -> AppResult<Vec<Order>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let lines = sqlx::query_as::<_, OrderMaterialRow>(
        r#"
        SELECT order_id, material_id, quantity
        FROM order_materials
        WHERE order_id = ANY($1)
        ORDER BY order_id, position
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_order: HashMap<Uuid, Vec<MaterialUsage>> = HashMap::new();
    for line in lines {
        by_order.entry(line.order_id).or_default().push(MaterialUsage {
            material_id: line.material_id,
            quantity: line.quantity,
        });
    }

    rows.into_iter()
        .map(|row| {
            let materials = by_order.remove(&row.id).unwrap_or_default();
            row.into_order(materials)
        })
        .collect()
}

async fn fetch_order(
    conn: &mut PgConnection,
    id: Uuid,
    for_update: bool,
) -> AppResult<Option<Order>> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let sql = format!("SELECT {} FROM orders WHERE id = $1{}", ORDER_COLUMNS, lock);
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(hydrate_orders(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

async fn fetch_customer(conn: &mut PgConnection, id: Uuid) -> AppResult<Option<Customer>> {
    let row = sqlx::query_as::<_, CustomerRow>(
        "SELECT id, first_name, last_name, email, phone FROM customers WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Customer::from))
}

async fn fetch_style(conn: &mut PgConnection, id: Uuid) -> AppResult<Option<Style>> {
    let row = sqlx::query_as::<_, StyleRow>(
        "SELECT id, name, category, image_url FROM styles WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Style::from))
}

async fn insert_order_lines(conn: &mut PgConnection, order: &Order) -> AppResult<()> {
    for (position, usage) in order.materials_used.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_materials (order_id, position, material_id, quantity)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order.id)
        .bind(position as i32)
        .bind(usage.material_id)
        .bind(usage.quantity)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

// ============================================================================
// Store
// ============================================================================

#[async_trait]
impl Store for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> AppResult<PgTx> {
        Ok(PgTx {
            tx: self.db.begin().await?,
        })
    }

    async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        let mut conn = self.db.acquire().await?;
        fetch_order(&mut conn, id, false).await
    }

    async fn list_orders(&self, deleted: bool) -> AppResult<Vec<Order>> {
        let order_by = if deleted { "deleted_at DESC" } else { "created_at DESC" };
        let sql = format!(
            "SELECT {} FROM orders WHERE is_deleted = $1 ORDER BY {}, id",
            ORDER_COLUMNS, order_by
        );

        let mut conn = self.db.acquire().await?;
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(deleted)
            .fetch_all(&mut *conn)
            .await?;

        hydrate_orders(&mut conn, rows).await
    }

    async fn find_order_by_tracking_code(&self, code: &str) -> AppResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE tracking_code = $1", ORDER_COLUMNS);

        let mut conn = self.db.acquire().await?;
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(code)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => Ok(hydrate_orders(&mut conn, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_material(&self, id: Uuid) -> AppResult<Option<Material>> {
        let mut conn = self.db.acquire().await?;
        fetch_material(&mut conn, id, false).await
    }

    async fn list_materials(&self) -> AppResult<Vec<Material>> {
        let sql = format!(
            "SELECT {} FROM materials WHERE is_deleted = false ORDER BY name, id",
            MATERIAL_COLUMNS
        );

        sqlx::query_as::<_, MaterialRow>(&sql)
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(Material::try_from)
            .collect()
    }

    async fn list_movements(&self, material_id: Uuid) -> AppResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {} FROM stock_movements WHERE material_id = $1 ORDER BY date DESC, id",
            MOVEMENT_COLUMNS
        );

        sqlx::query_as::<_, MovementRow>(&sql)
            .bind(material_id)
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(StockMovement::try_from)
            .collect()
    }

    async fn list_movements_by_reference(&self, reference: &str) -> AppResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {} FROM stock_movements WHERE reference = $1 ORDER BY date, id",
            MOVEMENT_COLUMNS
        );

        sqlx::query_as::<_, MovementRow>(&sql)
            .bind(reference)
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(StockMovement::try_from)
            .collect()
    }

    async fn find_customer(&self, id: Uuid) -> AppResult<Option<Customer>> {
        let mut conn = self.db.acquire().await?;
        fetch_customer(&mut conn, id).await
    }

    async fn find_style(&self, id: Uuid) -> AppResult<Option<Style>> {
        let mut conn = self.db.acquire().await?;
        fetch_style(&mut conn, id).await
    }

    async fn measurement_history(&self, customer_id: Uuid) -> AppResult<Vec<MeasurementEntry>> {
        let rows = sqlx::query_as::<_, MeasurementRow>(
            r#"
            SELECT customer_id, order_id, date, measurements, notes
            FROM customer_measurements
            WHERE customer_id = $1
            ORDER BY date DESC
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(MeasurementEntry::from).collect())
    }
}

// ============================================================================
// Transaction
// ============================================================================

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_material(&mut self, id: Uuid) -> AppResult<Option<Material>> {
        fetch_material(&mut self.tx, id, true).await
    }

    async fn set_material_quantity(&mut self, id: Uuid, quantity: Decimal) -> AppResult<()> {
        sqlx::query("UPDATE materials SET quantity = $1, updated_at = NOW() WHERE id = $2")
            .bind(quantity)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_material(&mut self, material: &Material) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO materials (
                id, name, material_type, unit, quantity, cost_per_unit,
                low_stock_threshold, sku, is_deleted, deleted_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(material.id)
        .bind(&material.name)
        .bind(material.material_type.as_str())
        .bind(material.unit.as_str())
        .bind(material.quantity)
        .bind(material.cost_per_unit)
        .bind(material.low_stock_threshold)
        .bind(&material.sku)
        .bind(material.is_deleted)
        .bind(material.deleted_at)
        .bind(material.created_at)
        .bind(material.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_material(&mut self, material: &Material) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE materials
            SET name = $1, material_type = $2, unit = $3, quantity = $4, cost_per_unit = $5,
                low_stock_threshold = $6, sku = $7, updated_at = $8
            WHERE id = $9
            "#,
        )
        .bind(&material.name)
        .bind(material.material_type.as_str())
        .bind(material.unit.as_str())
        .bind(material.quantity)
        .bind(material.cost_per_unit)
        .bind(material.low_stock_threshold)
        .bind(&material.sku)
        .bind(material.updated_at)
        .bind(material.id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn set_material_deleted(
        &mut self,
        id: Uuid,
        deleted_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE materials
            SET is_deleted = $1, deleted_at = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(deleted_at.is_some())
        .bind(deleted_at)
        .bind(id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Material".to_string()));
        }
        Ok(())
    }

    async fn sku_taken(&mut self, sku: &str, except: Option<Uuid>) -> AppResult<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM materials WHERE sku = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(sku)
        .bind(except)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(taken)
    }

    async fn insert_movement(&mut self, movement: &StockMovement) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, material_id, movement_type, quantity, reason, reference, performed_by, date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(movement.id)
        .bind(movement.material_id)
        .bind(movement.movement_type.as_str())
        .bind(movement.quantity)
        .bind(&movement.reason)
        .bind(&movement.reference)
        .bind(movement.performed_by)
        .bind(movement.date)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn lock_order(&mut self, id: Uuid) -> AppResult<Option<Order>> {
        fetch_order(&mut self.tx, id, true).await
    }

    async fn insert_order(&mut self, order: &Order) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, tracking_code, customer_id, style_id, delivery_date, price, discount,
                description, status, payment_status, measurement_snapshot, is_deleted,
                deleted_at, created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(order.id)
        .bind(&order.tracking_code)
        .bind(order.customer_id)
        .bind(order.style_id)
        .bind(order.delivery_date)
        .bind(order.price)
        .bind(order.discount)
        .bind(&order.description)
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(Json(&order.measurement_snapshot))
        .bind(order.is_deleted)
        .bind(order.deleted_at)
        .bind(order.created_by)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;

        insert_order_lines(&mut self.tx, order).await
    }

    async fn update_order(&mut self, order: &Order) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET customer_id = $1, style_id = $2, delivery_date = $3, price = $4, discount = $5,
                description = $6, status = $7, payment_status = $8, measurement_snapshot = $9,
                updated_at = $10
            WHERE id = $11
            "#,
        )
        .bind(order.customer_id)
        .bind(order.style_id)
        .bind(order.delivery_date)
        .bind(order.price)
        .bind(order.discount)
        .bind(&order.description)
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(Json(&order.measurement_snapshot))
        .bind(order.updated_at)
        .bind(order.id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Order".to_string()));
        }

        sqlx::query("DELETE FROM order_materials WHERE order_id = $1")
            .bind(order.id)
            .execute(&mut *self.tx)
            .await?;

        insert_order_lines(&mut self.tx, order).await
    }

    async fn set_order_deleted(
        &mut self,
        id: Uuid,
        deleted_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET is_deleted = $1, deleted_at = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(deleted_at.is_some())
        .bind(deleted_at)
        .bind(id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Order".to_string()));
        }
        Ok(())
    }

    async fn delete_order(&mut self, id: Uuid) -> AppResult<bool> {
        // order_materials rows go with the order (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_customer(&mut self, id: Uuid) -> AppResult<Option<Customer>> {
        fetch_customer(&mut self.tx, id).await
    }

    async fn find_style(&mut self, id: Uuid) -> AppResult<Option<Style>> {
        fetch_style(&mut self.tx, id).await
    }

    async fn find_item_type(&mut self, name: &str) -> AppResult<Option<ItemType>> {
        let row = sqlx::query_as::<_, (String, Vec<String>)>(
            "SELECT name, fields FROM item_types WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|(name, fields)| ItemType { name, fields }))
    }

    async fn upsert_measurement(&mut self, entry: &MeasurementEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO customer_measurements (customer_id, order_id, date, measurements, notes)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (customer_id, order_id)
            DO UPDATE SET date = EXCLUDED.date, measurements = EXCLUDED.measurements,
                          notes = EXCLUDED.notes
            "#,
        )
        .bind(entry.customer_id)
        .bind(entry.order_id)
        .bind(entry.date)
        .bind(Json(&entry.measurements))
        .bind(&entry.notes)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
