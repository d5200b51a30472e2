//! Integration tests for intake, the outbox relay, and the bus.

use std::time::Duration;

use bus::{InMemoryBus, MessageBus};
use domain::{
    CustomerId, InMemoryOrderStore, Money, NewOrderLine, NewOrderRequest, OrderCreated,
    OrderIntake, OrderStatus, OrderStore, Outbox, OutboxRelay, TOPIC_ORDER_CREATED,
};
use futures_util::StreamExt;

fn request(lines: Vec<(u32, i64)>) -> NewOrderRequest {
    NewOrderRequest {
        customer_id: CustomerId::new(),
        lines: lines
            .into_iter()
            .enumerate()
            .map(|(i, (quantity, cents))| NewOrderLine {
                product_id: format!("P{i}"),
                product_name: format!("Product {i}"),
                quantity,
                unit_price: Money::from_cents(cents),
            })
            .collect(),
    }
}

#[tokio::test]
async fn accepted_order_reaches_the_bus_exactly_once() {
    let store = InMemoryOrderStore::new();
    let outbox = Outbox::new();
    let bus = InMemoryBus::new();
    let intake = OrderIntake::new(store.clone(), outbox.clone());
    let relay = OutboxRelay::new(outbox.clone(), bus.clone(), Duration::from_millis(5));

    let mut stream = bus.subscribe(TOPIC_ORDER_CREATED, "orchestrator").await.unwrap();

    let order = intake.create_order(request(vec![(2, 500)])).await.unwrap();
    assert_eq!(relay.drain_once().await.unwrap(), 1);
    // Nothing left to publish on a second pass.
    assert_eq!(relay.drain_once().await.unwrap(), 0);

    let msg = stream.next().await.unwrap();
    assert_eq!(msg.key, order.id().to_string());
    let fact: OrderCreated = msg.decode().unwrap();
    assert_eq!(fact.order_id, order.id());
    assert_eq!(fact.total_amount.cents(), 1000);

    let stored = store.get(order.id()).await.unwrap().unwrap();
    assert_eq!(stored.status(), OrderStatus::Pending);
    // Total is recomputed at read time and matches the intake figure.
    assert_eq!(stored.total_amount(), fact.total_amount);
}

#[tokio::test]
async fn publication_survives_a_bus_outage() {
    let store = InMemoryOrderStore::new();
    let outbox = Outbox::new();
    let bus = InMemoryBus::new();
    let intake = OrderIntake::new(store, outbox.clone());
    let relay = OutboxRelay::new(outbox.clone(), bus.clone(), Duration::from_millis(5));

    // Order accepted while no consumer is attached: the fact stays staged.
    intake.create_order(request(vec![(1, 100)])).await.unwrap();
    assert!(relay.drain_once().await.is_err());
    assert_eq!(outbox.len().await, 1);

    // Consumer comes up; the retry delivers the staged fact.
    let mut stream = bus.subscribe(TOPIC_ORDER_CREATED, "orchestrator").await.unwrap();
    assert_eq!(relay.drain_once().await.unwrap(), 1);
    assert!(stream.next().await.is_some());
    assert!(outbox.is_empty().await);
}

#[tokio::test]
async fn facts_for_multiple_orders_keep_per_order_keys() {
    let store = InMemoryOrderStore::new();
    let outbox = Outbox::new();
    let bus = InMemoryBus::new();
    let intake = OrderIntake::new(store, outbox.clone());
    let relay = OutboxRelay::new(outbox, bus.clone(), Duration::from_millis(5));

    let mut stream = bus.subscribe(TOPIC_ORDER_CREATED, "orchestrator").await.unwrap();

    let a = intake.create_order(request(vec![(1, 100)])).await.unwrap();
    let b = intake.create_order(request(vec![(3, 200)])).await.unwrap();
    assert_eq!(relay.drain_once().await.unwrap(), 2);

    let first = stream.next().await.unwrap();
    let second = stream.next().await.unwrap();
    assert_eq!(first.key, a.id().to_string());
    assert_eq!(second.key, b.id().to_string());
}
