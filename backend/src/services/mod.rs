//! Business logic services for the tailoring shop backend

pub mod audit;
pub mod follow_up;
pub mod material;
pub mod measurement;
pub mod notification;
pub mod order;
pub mod stock;

pub use audit::{AuditEntry, AuditSink, LogAuditSink, PgAuditSink};
pub use material::MaterialService;
pub use notification::{LogNotifier, Notifier, WebhookNotifier};
pub use order::OrderService;
