//! Concurrent mutations of a single order, written against the store traits
//! so every backend runs the same interleavings

use rust_decimal::Decimal;
use uuid::Uuid;

use atelier_backend::error::AppError;
use atelier_backend::services::order::{CreateOrderInput, UpdateOrderInput};
use atelier_backend::services::OrderService;
use atelier_backend::store::Store;
use shared::models::{MovementType, Order, OrderStatus};

fn cancel() -> UpdateOrderInput {
    UpdateOrderInput {
        status: Some(OrderStatus::Cancelled),
        ..Default::default()
    }
}

async fn quantity<S: Store>(store: &S, material_id: Uuid) -> Decimal {
    store
        .find_material(material_id)
        .await
        .unwrap()
        .map(|m| m.quantity)
        .unwrap_or_default()
}

/// IN movements logged against an order
pub async fn releases<S: Store>(store: &S, order_id: Uuid) -> usize {
    store
        .list_movements_by_reference(&order_id.to_string())
        .await
        .unwrap()
        .into_iter()
        .filter(|m| m.movement_type == MovementType::In)
        .count()
}

/// Two cancellations of one reserved order release its stock exactly once.
///
/// `order` must be reserved and hold `material_id`, with `before` being the
/// material's quantity before the order was created.
pub async fn double_cancel_releases_once<S: Store>(
    orders: &OrderService<S>,
    store: &S,
    order: &Order,
    material_id: Uuid,
    before: Decimal,
) {
    let (first, second) = tokio::join!(
        orders.update_order(order.id, cancel(), None),
        orders.update_order(order.id, cancel(), None),
    );

    assert_eq!(first.unwrap().status, OrderStatus::Cancelled);
    assert_eq!(second.unwrap().status, OrderStatus::Cancelled);
    assert_eq!(releases(store, order.id).await, 1);
    assert_eq!(quantity(store, material_id).await, before);
}

/// A cancellation racing a purge releases the reservation exactly once,
/// whichever of the two gets the order first.
pub async fn cancel_and_purge_release_once<S: Store>(
    orders: &OrderService<S>,
    store: &S,
    order: &Order,
    material_id: Uuid,
    before: Decimal,
) {
    let (updated, purged) = tokio::join!(
        orders.update_order(order.id, cancel(), None),
        orders.force_delete(order.id, None),
    );

    purged.unwrap();
    match updated {
        Ok(order) => assert_eq!(order.status, OrderStatus::Cancelled),
        Err(AppError::NotFound(_)) => {}
        Err(other) => panic!("unexpected error: {:?}", other),
    }
    assert!(store.find_order(order.id).await.unwrap().is_none());
    assert_eq!(releases(store, order.id).await, 1);
    assert_eq!(quantity(store, material_id).await, before);
}

/// Two orders reserving the same pair of materials in opposite line order
/// both commit.
pub async fn crossed_orders_both_reserve<S: Store>(
    orders: &OrderService<S>,
    store: &S,
    first: CreateOrderInput,
    second: CreateOrderInput,
) {
    let (a, b) = tokio::join!(
        orders.create_order(first.clone(), None),
        orders.create_order(second.clone(), None),
    );
    a.unwrap();
    b.unwrap();

    for usage in first.materials_used.iter().chain(&second.materials_used) {
        assert!(quantity(store, usage.material_id).await >= Decimal::ZERO);
    }
}
