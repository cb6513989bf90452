//! Measurement snapshot validation and customer measurement history

use chrono::Utc;
use uuid::Uuid;

use shared::models::{MeasurementEntry, MeasurementSnapshot};
use shared::validation::{find_unknown_measurement_field, snapshot_notes};

use crate::error::{AppError, AppResult};
use crate::store::{Store, StoreTx};

/// Check a snapshot against the item type template of a style.
///
/// Unknown styles and categories without a template accept any keys.
pub async fn validate_snapshot<T: StoreTx>(
    tx: &mut T,
    style_id: Uuid,
    snapshot: &MeasurementSnapshot,
) -> AppResult<()> {
    let Some(style) = tx.find_style(style_id).await? else {
        return Ok(());
    };
    let Some(item_type) = tx.find_item_type(&style.category).await? else {
        tracing::debug!("No measurement template for category '{}'", style.category);
        return Ok(());
    };

    if let Some(field) = find_unknown_measurement_field(snapshot, &item_type.fields) {
        return Err(AppError::InvalidMeasurementField {
            field: field.to_string(),
            allowed: item_type.fields.clone(),
        });
    }

    Ok(())
}

/// Upsert the history entry this order contributes to its customer
pub async fn record_measurements<T: StoreTx>(
    tx: &mut T,
    customer_id: Uuid,
    order_id: Uuid,
    snapshot: &MeasurementSnapshot,
) -> AppResult<()> {
    let entry = MeasurementEntry {
        customer_id,
        order_id,
        date: Utc::now(),
        measurements: snapshot.clone(),
        notes: snapshot_notes(snapshot),
    };
    tx.upsert_measurement(&entry).await
}

/// Measurement history of a customer, newest first
pub async fn history<S: Store>(store: &S, customer_id: Uuid) -> AppResult<Vec<MeasurementEntry>> {
    if store.find_customer(customer_id).await?.is_none() {
        return Err(AppError::NotFound("Customer".to_string()));
    }
    store.measurement_history(customer_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use shared::models::{ItemType, Style};

    async fn shirt_store() -> (MemoryStore, Uuid) {
        let store = MemoryStore::new();
        let style = Style {
            id: Uuid::new_v4(),
            name: "Oxford shirt".to_string(),
            category: "Shirt".to_string(),
            image_url: None,
        };
        let style_id = style.id;
        store
            .seed(move |state| {
                state.item_types.insert(
                    "Shirt".to_string(),
                    ItemType {
                        name: "Shirt".to_string(),
                        fields: vec!["Neck".to_string(), "Chest".to_string()],
                    },
                );
                state.styles.insert(style.id, style);
            })
            .await;
        (store, style_id)
    }

    fn snapshot(pairs: &[(&str, &str)]) -> MeasurementSnapshot {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[tokio::test]
    async fn test_unknown_field_rejected_with_allowed_set() {
        let (store, style_id) = shirt_store().await;
        let mut tx = store.begin().await.unwrap();

        let err = validate_snapshot(&mut tx, style_id, &snapshot(&[("Unknown", "1")]))
            .await
            .unwrap_err();

        match err {
            AppError::InvalidMeasurementField { field, allowed } => {
                assert_eq!(field, "Unknown");
                assert_eq!(allowed, vec!["Neck".to_string(), "Chest".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_partial_snapshot_with_notes_passes() {
        let (store, style_id) = shirt_store().await;
        let mut tx = store.begin().await.unwrap();

        validate_snapshot(&mut tx, style_id, &snapshot(&[("Neck", "15"), ("Notes", "slim")]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_style_is_permissive() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        validate_snapshot(&mut tx, Uuid::new_v4(), &snapshot(&[("Anything", "1")]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_record_measurements_copies_notes() {
        let store = MemoryStore::new();
        let customer_id = Uuid::new_v4();
        let order_id = Uuid::new_v4();

        let mut tx = store.begin().await.unwrap();
        record_measurements(
            &mut tx,
            customer_id,
            order_id,
            &snapshot(&[("Chest", "40"), ("Notes", "room in shoulders")]),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let history = store.measurement_history(customer_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].order_id, order_id);
        assert_eq!(history[0].notes.as_deref(), Some("room in shoulders"));
    }
}
