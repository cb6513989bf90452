//! Work that runs after a transaction committed
//!
//! Follow-ups are detached tasks. Nothing they do can fail or roll back the
//! operation that scheduled them; errors only reach the log.

use std::sync::Arc;

use uuid::Uuid;

use shared::models::{Order, OrderNotice};

use super::audit::{self, AuditEntry, AuditSink};
use super::notification::{alert_if_low, Notifier};
use crate::store::Store;

/// Side effects scheduled by one committed operation
#[derive(Debug)]
pub struct FollowUp {
    /// Customer notice to send for an order
    pub notice: Option<(OrderNotice, Order)>,
    /// Materials to re-check against their low-stock threshold
    pub low_stock: Vec<Uuid>,
    pub audit: Option<AuditEntry>,
}

impl FollowUp {
    pub fn audit_only(entry: AuditEntry) -> Self {
        Self {
            notice: None,
            low_stock: Vec::new(),
            audit: Some(entry),
        }
    }
}

/// Run a follow-up on its own task
pub fn spawn<S: Store>(
    store: S,
    notifier: Arc<dyn Notifier>,
    audit: Arc<dyn AuditSink>,
    job: FollowUp,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move { run(store, notifier, audit, job).await })
}

async fn run<S: Store>(
    store: S,
    notifier: Arc<dyn Notifier>,
    audit_sink: Arc<dyn AuditSink>,
    job: FollowUp,
) {
    if let Some((notice, order)) = job.notice {
        send_notice(&store, notifier.as_ref(), notice, &order).await;
    }

    for material_id in job.low_stock {
        match store.find_material(material_id).await {
            Ok(Some(material)) => {
                alert_if_low(notifier.as_ref(), &material).await;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Low stock check for {} failed: {}", material_id, e),
        }
    }

    if let Some(entry) = job.audit {
        audit::record(audit_sink.as_ref(), entry).await;
    }
}

async fn send_notice<S: Store>(store: &S, notifier: &dyn Notifier, notice: OrderNotice, order: &Order) {
    let customer = match store.find_customer(order.customer_id).await {
        Ok(Some(customer)) => customer,
        Ok(None) => {
            tracing::warn!(
                "Not notifying about order {}: customer {} not found",
                order.id,
                order.customer_id
            );
            return;
        }
        Err(e) => {
            tracing::warn!("Not notifying about order {}: {}", order.id, e);
            return;
        }
    };

    let result = match notice {
        OrderNotice::Created => notifier.notify_order_created(&customer, order).await,
        OrderNotice::StatusChanged => notifier.notify_order_status_change(&customer, order).await,
        OrderNotice::Ready => notifier.notify_order_ready(&customer, order).await,
    };

    if let Err(e) = result {
        tracing::warn!("Failed to send {:?} notice for order {}: {}", notice, order.id, e);
    }
}
