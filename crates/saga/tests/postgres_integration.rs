//! PostgreSQL saga store integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p saga --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use common::OrderId;
use saga::{PostgresSagaStore, SagaStep, SagaStore, SagaStoreError};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_saga_instances.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and a cleared table
async fn get_test_store() -> PostgresSagaStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE saga_instances")
        .execute(&pool)
        .await
        .unwrap();

    PostgresSagaStore::new(pool)
}

#[tokio::test]
async fn create_once_then_load() {
    let store = get_test_store().await;
    let order_id = OrderId::new();

    let (first, created) = store.load_or_create(order_id).await.unwrap();
    assert!(created);
    assert_eq!(first.step(), SagaStep::NotStarted);

    let (second, created) = store.load_or_create(order_id).await.unwrap();
    assert!(!created);
    assert_eq!(second.step(), SagaStep::NotStarted);
    assert_eq!(second.order_id(), order_id);
}

#[tokio::test]
async fn cas_round_trips_all_fields() {
    let store = get_test_store().await;
    let order_id = OrderId::new();

    let (mut saga, _) = store.load_or_create(order_id).await.unwrap();
    saga.advance(SagaStep::ReservingInventory).unwrap();
    saga.record_reserve_attempt();
    store
        .compare_and_swap(SagaStep::NotStarted, &saga)
        .await
        .unwrap();

    saga.advance(SagaStep::Reserved).unwrap();
    saga.set_reservation_id("RES-0007".to_string());
    saga.set_last_error("transient blip");
    store
        .compare_and_swap(SagaStep::ReservingInventory, &saga)
        .await
        .unwrap();

    let stored = store.get(order_id).await.unwrap().unwrap();
    assert_eq!(stored.step(), SagaStep::Reserved);
    assert_eq!(stored.reservation_id(), Some("RES-0007"));
    assert_eq!(stored.reserve_attempts(), 1);
    assert_eq!(stored.last_error(), Some("transient blip"));
    assert!(stored.payment_ref().is_none());
}

#[tokio::test]
async fn cas_rejects_a_stale_writer() {
    let store = get_test_store().await;
    let order_id = OrderId::new();

    let (base, _) = store.load_or_create(order_id).await.unwrap();

    // Two workers start from the same snapshot; only one write lands.
    let mut winner = base.clone();
    let mut loser = base;
    winner.advance(SagaStep::ReservingInventory).unwrap();
    store
        .compare_and_swap(SagaStep::NotStarted, &winner)
        .await
        .unwrap();

    loser.advance(SagaStep::ReservingInventory).unwrap();
    let err = store
        .compare_and_swap(SagaStep::NotStarted, &loser)
        .await
        .unwrap_err();
    match err {
        SagaStoreError::Conflict {
            expected, actual, ..
        } => {
            assert_eq!(expected, SagaStep::NotStarted);
            assert_eq!(actual, SagaStep::ReservingInventory);
        }
        other => panic!("expected conflict, got {other}"),
    }

    let stored = store.get(order_id).await.unwrap().unwrap();
    assert_eq!(stored.step(), SagaStep::ReservingInventory);
}

#[tokio::test]
async fn cas_on_missing_saga_reports_not_found() {
    let store = get_test_store().await;
    let saga = saga::SagaInstance::new(OrderId::new());

    let err = store
        .compare_and_swap(SagaStep::NotStarted, &saga)
        .await
        .unwrap_err();
    assert!(matches!(err, SagaStoreError::NotFound(_)));
}

#[tokio::test]
async fn get_missing_returns_none() {
    let store = get_test_store().await;
    assert!(store.get(OrderId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_cas_has_exactly_one_winner() {
    let store = Arc::new(get_test_store().await);
    let order_id = OrderId::new();
    let (base, _) = store.load_or_create(order_id).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        let mut saga = base.clone();
        handles.push(tokio::spawn(async move {
            saga.advance(SagaStep::ReservingInventory).unwrap();
            store.compare_and_swap(SagaStep::NotStarted, &saga).await
        }));
    }

    let mut wins = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            wins += 1;
        }
    }
    assert_eq!(wins, 1);
}
