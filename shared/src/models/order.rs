//! Order models and the stock reservation rules

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Deletable, UnknownVariant};

/// Free-form measurement values keyed by field name (e.g. "Chest" -> "40")
pub type MeasurementSnapshot = BTreeMap<String, String>;

/// Production status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrderStatus {
    Draft,
    #[default]
    Pending,
    Measured,
    Cutting,
    Stitching,
    Trial,
    Ready,
    Delivered,
    #[serde(rename = "In Progress")]
    InProgress,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 10] = [
        OrderStatus::Draft,
        OrderStatus::Pending,
        OrderStatus::Measured,
        OrderStatus::Cutting,
        OrderStatus::Stitching,
        OrderStatus::Trial,
        OrderStatus::Ready,
        OrderStatus::Delivered,
        OrderStatus::InProgress,
        OrderStatus::Cancelled,
    ];

    /// Whether an order in this status holds a stock reservation.
    ///
    /// Every status except `Draft` and `Cancelled` reserves the order's
    /// materials; this is the only place that rule is encoded.
    pub fn is_reserved(self) -> bool {
        !matches!(self, OrderStatus::Draft | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "Draft",
            OrderStatus::Pending => "Pending",
            OrderStatus::Measured => "Measured",
            OrderStatus::Cutting => "Cutting",
            OrderStatus::Stitching => "Stitching",
            OrderStatus::Trial => "Trial",
            OrderStatus::Ready => "Ready",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::InProgress => "In Progress",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("order status", s))
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment state tracked alongside the order (settled by the payment service)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Partial,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Partial => "Partial",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Refunded => "Refunded",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(PaymentStatus::Pending),
            "Partial" => Ok(PaymentStatus::Partial),
            "Paid" => Ok(PaymentStatus::Paid),
            "Refunded" => Ok(PaymentStatus::Refunded),
            _ => Err(UnknownVariant::new("payment status", s)),
        }
    }
}

/// A quantity of one material consumed by an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialUsage {
    pub material_id: Uuid,
    pub quantity: Decimal,
}

/// A tailoring order, the aggregate root of the stock reservation rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    /// Public 24 hex character code used by the tracking page
    pub tracking_code: String,
    pub customer_id: Uuid,
    pub style_id: Uuid,
    pub delivery_date: Option<NaiveDate>,
    pub price: Decimal,
    pub discount: Decimal,
    pub description: Option<String>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub measurement_snapshot: MeasurementSnapshot,
    pub materials_used: Vec<MaterialUsage>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Materials this order currently holds in reserve, totalled per material
    pub fn reserved_totals(&self) -> BTreeMap<Uuid, Decimal> {
        if self.status.is_reserved() {
            usage_totals(&self.materials_used)
        } else {
            BTreeMap::new()
        }
    }
}

impl Deletable for Order {
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

/// Sum usage entries per material (duplicates are added together)
pub fn usage_totals(materials: &[MaterialUsage]) -> BTreeMap<Uuid, Decimal> {
    let mut totals = BTreeMap::new();
    for usage in materials {
        *totals.entry(usage.material_id).or_insert(Decimal::ZERO) += usage.quantity;
    }
    totals
}

/// Stock work required when an order moves between statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// Credit back the materials the order held before the change
    pub revert_old: bool,
    /// Deduct the materials the order holds after the change
    pub deduct_new: bool,
}

impl ReconciliationPlan {
    pub fn is_noop(&self) -> bool {
        !self.revert_old && !self.deduct_new
    }
}

/// Decide which stock operations an order update needs.
///
/// Reverting always runs before deducting, so replacing materials on a
/// reserved order nets out instead of counting twice.
pub fn plan_reconciliation(
    old_status: OrderStatus,
    new_status: OrderStatus,
    materials_replaced: bool,
) -> ReconciliationPlan {
    let was_reserved = old_status.is_reserved();
    let will_be_reserved = new_status.is_reserved();

    ReconciliationPlan {
        revert_old: was_reserved && (materials_replaced || !will_be_reserved),
        deduct_new: will_be_reserved && (materials_replaced || !was_reserved),
    }
}

/// Customer-facing notice triggered by a status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderNotice {
    Created,
    StatusChanged,
    Ready,
}

/// Pick the notice for a status change, if any
pub fn status_notice(old_status: OrderStatus, new_status: OrderStatus) -> Option<OrderNotice> {
    if old_status == new_status {
        return None;
    }
    match (old_status, new_status) {
        (_, OrderStatus::Ready) => Some(OrderNotice::Ready),
        (OrderStatus::Draft, OrderStatus::Pending) => Some(OrderNotice::Created),
        (_, OrderStatus::Draft) => None,
        _ => Some(OrderNotice::StatusChanged),
    }
}

/// Generate a fresh public tracking code
pub fn new_tracking_code() -> String {
    let mut code = Uuid::new_v4().simple().to_string();
    code.truncate(24);
    code
}

/// Public read-only projection served by the tracking page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderTracking {
    pub status: OrderStatus,
    pub delivery_date: Option<NaiveDate>,
    pub price: Decimal,
    pub description: Option<String>,
    pub style_name: Option<String>,
    pub style_image: Option<String>,
    pub customer_first_name: Option<String>,
}
