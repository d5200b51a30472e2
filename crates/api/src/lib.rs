//! HTTP API server with observability for the fulfillment system.
//!
//! Provides REST endpoints for order intake and fulfillment status,
//! with structured logging (tracing) and Prometheus metrics. Intake,
//! the outbox relay, and the saga worker all run inside this process,
//! wired together over the in-memory bus.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use bus::InMemoryBus;
use domain::{InMemoryOrderStore, OrderIntake, OrderStore, Outbox, OutboxRelay};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{
    InMemoryInventoryClient, InMemoryPaymentClient, InMemorySagaStore, SagaConfig,
    SagaOrchestrator, SagaStore, SagaWorker,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<Os, Ss>(state: Arc<AppState<Os, Ss>>, metrics_handle: PrometheusHandle) -> Router
where
    Os: OrderStore + 'static,
    Ss: SagaStore + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<Os, Ss>))
        .route("/orders/{id}", get(routes::orders::get::<Os, Ss>))
        .route("/orders/{id}/saga", get(routes::orders::saga_status::<Os, Ss>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Handles onto the in-memory services, kept for scripting in tests.
pub struct ServiceHandles {
    pub bus: InMemoryBus,
    pub orders: InMemoryOrderStore,
    pub sagas: InMemorySagaStore,
    pub inventory: InMemoryInventoryClient,
    pub payment: InMemoryPaymentClient,
}

/// Creates the default application state backed by in-memory stores and
/// clients, and spawns the outbox relay and the saga worker.
///
/// Must be called from within a tokio runtime.
pub fn create_default_state(
    saga_config: SagaConfig,
) -> (
    Arc<AppState<InMemoryOrderStore, InMemorySagaStore>>,
    ServiceHandles,
) {
    let bus = InMemoryBus::new();
    let orders = InMemoryOrderStore::new();
    let sagas = InMemorySagaStore::new();
    let inventory = InMemoryInventoryClient::new();
    let payment = InMemoryPaymentClient::new();

    let outbox = Outbox::new();
    let intake = OrderIntake::new(orders.clone(), outbox.clone());

    let orchestrator = Arc::new(SagaOrchestrator::new(
        sagas.clone(),
        orders.clone(),
        inventory.clone(),
        payment.clone(),
        bus.clone(),
        saga_config,
    ));
    let worker = SagaWorker::new(orchestrator, bus.clone());
    tokio::spawn(worker.run());

    let relay = OutboxRelay::new(outbox, bus.clone(), Duration::from_millis(50));
    tokio::spawn(relay.run());

    let state = Arc::new(AppState {
        intake,
        orders: orders.clone(),
        sagas: sagas.clone(),
    });
    let handles = ServiceHandles {
        bus,
        orders,
        sagas,
        inventory,
        payment,
    };
    (state, handles)
}
