//! Customer and staff notifications
//!
//! Notifications are sent after the order transaction committed. Delivery is
//! best-effort: callers log failures and move on.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use shared::models::{Customer, Material, Order, OrderStatus};

use crate::config::NotificationConfig;
use crate::error::{AppError, AppResult};

/// Outbound notification channel
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_order_created(&self, customer: &Customer, order: &Order) -> AppResult<()>;

    async fn notify_order_status_change(&self, customer: &Customer, order: &Order) -> AppResult<()>;

    async fn notify_order_ready(&self, customer: &Customer, order: &Order) -> AppResult<()>;

    async fn notify_low_stock(&self, material: &Material) -> AppResult<()>;
}

/// Writes notifications to the log only
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_order_created(&self, customer: &Customer, order: &Order) -> AppResult<()> {
        tracing::info!(
            "Order {} created for {} ({})",
            order.id,
            customer.first_name,
            order.status
        );
        Ok(())
    }

    async fn notify_order_status_change(&self, customer: &Customer, order: &Order) -> AppResult<()> {
        tracing::info!(
            "Order {} for {} is now {}",
            order.id,
            customer.first_name,
            order.status
        );
        Ok(())
    }

    async fn notify_order_ready(&self, customer: &Customer, order: &Order) -> AppResult<()> {
        tracing::info!("Order {} for {} is ready for pickup", order.id, customer.first_name);
        Ok(())
    }

    async fn notify_low_stock(&self, material: &Material) -> AppResult<()> {
        tracing::warn!(
            "Low stock: {} ({}) at {} (threshold {})",
            material.name,
            material.sku,
            material.quantity,
            material.low_stock_threshold
        );
        Ok(())
    }
}

/// Order details carried in a webhook event
#[derive(Debug, Serialize)]
struct OrderPayload<'a> {
    order_id: Uuid,
    tracking_code: &'a str,
    status: OrderStatus,
    delivery_date: Option<NaiveDate>,
    customer_name: &'a str,
    customer_email: Option<&'a str>,
    customer_phone: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct LowStockPayload<'a> {
    material_id: Uuid,
    name: &'a str,
    sku: &'a str,
    quantity: Decimal,
    low_stock_threshold: Decimal,
}

/// Webhook event envelope
#[derive(Debug, Serialize)]
struct WebhookEvent<T: Serialize> {
    event: &'static str,
    sent_at: DateTime<Utc>,
    data: T,
}

/// Posts notification events as JSON to a webhook (email/SMS gateway)
#[derive(Clone)]
pub struct WebhookNotifier {
    url: String,
    http_client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: String, timeout: Duration) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { url, http_client })
    }

    async fn send<T: Serialize + Send + Sync>(&self, event: &'static str, data: T) -> AppResult<()> {
        let body = WebhookEvent {
            event,
            sent_at: Utc::now(),
            data,
        };

        let response = self
            .http_client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Webhook request failed: {}", e)))?;

        response
            .error_for_status()
            .map_err(|e| AppError::ExternalService(format!("Webhook rejected {}: {}", event, e)))?;

        tracing::debug!("Delivered {} notification", event);
        Ok(())
    }

    fn order_payload<'a>(customer: &'a Customer, order: &'a Order) -> OrderPayload<'a> {
        OrderPayload {
            order_id: order.id,
            tracking_code: &order.tracking_code,
            status: order.status,
            delivery_date: order.delivery_date,
            customer_name: &customer.first_name,
            customer_email: customer.email.as_deref(),
            customer_phone: customer.phone.as_deref(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_order_created(&self, customer: &Customer, order: &Order) -> AppResult<()> {
        self.send("order.created", Self::order_payload(customer, order))
            .await
    }

    async fn notify_order_status_change(&self, customer: &Customer, order: &Order) -> AppResult<()> {
        self.send("order.status_changed", Self::order_payload(customer, order))
            .await
    }

    async fn notify_order_ready(&self, customer: &Customer, order: &Order) -> AppResult<()> {
        self.send("order.ready", Self::order_payload(customer, order))
            .await
    }

    async fn notify_low_stock(&self, material: &Material) -> AppResult<()> {
        self.send(
            "material.low_stock",
            LowStockPayload {
                material_id: material.id,
                name: &material.name,
                sku: &material.sku,
                quantity: material.quantity,
                low_stock_threshold: material.low_stock_threshold,
            },
        )
        .await
    }
}

/// Pick the notifier for the configured delivery channel
pub fn notifier_from_config(config: &NotificationConfig) -> AppResult<Arc<dyn Notifier>> {
    match &config.webhook_url {
        Some(url) if !url.is_empty() => {
            tracing::info!("Sending notifications to webhook {}", url);
            let notifier =
                WebhookNotifier::new(url.clone(), Duration::from_secs(config.timeout_secs))?;
            Ok(Arc::new(notifier))
        }
        _ => {
            tracing::info!("No notification webhook configured, notifications are logged only");
            Ok(Arc::new(LogNotifier))
        }
    }
}

/// Raise a low-stock alert for a material if it is at or below its threshold.
///
/// Returns whether an alert was raised.
pub async fn alert_if_low(notifier: &dyn Notifier, material: &Material) -> bool {
    if material.is_deleted || !material.is_low_stock() {
        return false;
    }
    if let Err(e) = notifier.notify_low_stock(material).await {
        tracing::warn!("Failed to send low stock alert for {}: {}", material.id, e);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_without_webhook_builds_log_notifier() {
        let config = NotificationConfig {
            webhook_url: None,
            timeout_secs: 5,
        };
        assert!(notifier_from_config(&config).is_ok());
    }

    #[test]
    fn test_config_with_webhook_builds() {
        let config = NotificationConfig {
            webhook_url: Some("http://localhost:9/hooks".to_string()),
            timeout_secs: 1,
        };
        assert!(notifier_from_config(&config).is_ok());
    }
}
