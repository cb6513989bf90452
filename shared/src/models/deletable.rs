//! Soft-delete lifecycle shared by trashable records

use chrono::{DateTime, Utc};

/// A record that can be moved to the trash and restored.
///
/// Soft delete only hides the record; it never touches related stock.
pub trait Deletable {
    fn is_deleted(&self) -> bool;

    fn mark_deleted(&mut self, at: DateTime<Utc>);

    fn restore(&mut self, at: DateTime<Utc>);

    fn is_active(&self) -> bool {
        !self.is_deleted()
    }
}
