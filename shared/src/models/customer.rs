//! Customer and measurement history models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::MeasurementSnapshot;

/// A customer as seen by the order workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// One entry in a customer's measurement history, keyed by order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementEntry {
    pub customer_id: Uuid,
    pub order_id: Uuid,
    pub date: DateTime<Utc>,
    pub measurements: MeasurementSnapshot,
    pub notes: Option<String>,
}

/// Replace the entry for the same customer and order, or append a new one
pub fn upsert_measurement_entry(history: &mut Vec<MeasurementEntry>, entry: MeasurementEntry) {
    match history
        .iter_mut()
        .find(|e| e.customer_id == entry.customer_id && e.order_id == entry.order_id)
    {
        Some(existing) => *existing = entry,
        None => history.push(entry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(customer_id: Uuid, order_id: Uuid, chest: &str) -> MeasurementEntry {
        MeasurementEntry {
            customer_id,
            order_id,
            date: Utc::now(),
            measurements: [("Chest".to_string(), chest.to_string())].into_iter().collect(),
            notes: None,
        }
    }

    #[test]
    fn test_upsert_appends_new_order() {
        let customer = Uuid::new_v4();
        let mut history = vec![entry(customer, Uuid::new_v4(), "40")];
        upsert_measurement_entry(&mut history, entry(customer, Uuid::new_v4(), "41"));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_upsert_replaces_same_order() {
        let customer = Uuid::new_v4();
        let order = Uuid::new_v4();
        let mut history = vec![entry(customer, order, "40")];
        upsert_measurement_entry(&mut history, entry(customer, order, "42"));
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].measurements["Chest"], "42");
    }
}
