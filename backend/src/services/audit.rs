//! Audit trail for order and stock changes

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;

/// One audited action
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub actor: Option<Uuid>,
    pub action: &'static str,
    pub entity: &'static str,
    pub entity_id: Uuid,
    pub details: serde_json::Value,
}

impl AuditEntry {
    pub fn order(actor: Option<Uuid>, action: &'static str, order_id: Uuid) -> Self {
        Self {
            actor,
            action,
            entity: "Order",
            entity_id: order_id,
            details: serde_json::Value::Null,
        }
    }

    pub fn material(actor: Option<Uuid>, action: &'static str, material_id: Uuid) -> Self {
        Self {
            actor,
            action,
            entity: "Material",
            entity_id: material_id,
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn log(&self, entry: AuditEntry) -> AppResult<()>;
}

/// Persists entries to the `audit_logs` table
#[derive(Clone)]
pub struct PgAuditSink {
    db: PgPool,
}

impl PgAuditSink {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn log(&self, entry: AuditEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, actor_id, action, entity, entity_id, details, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.actor)
        .bind(entry.action)
        .bind(entry.entity)
        .bind(entry.entity_id)
        .bind(sqlx::types::Json(&entry.details))
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

/// Emits entries as tracing events
#[derive(Debug, Clone, Default)]
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn log(&self, entry: AuditEntry) -> AppResult<()> {
        tracing::info!(
            target: "audit",
            actor = ?entry.actor,
            action = entry.action,
            entity = entry.entity,
            entity_id = %entry.entity_id,
            details = %entry.details,
            "audit"
        );
        Ok(())
    }
}

/// Record an entry; failures are logged and dropped
pub async fn record(sink: &dyn AuditSink, entry: AuditEntry) {
    let action = entry.action;
    let entity_id = entry.entity_id;
    if let Err(e) = sink.log(entry).await {
        tracing::warn!("Failed to write audit entry {} for {}: {}", action, entity_id, e);
    }
}
