//! Order intake and read endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::OrderId;
use domain::{CustomerId, NewOrderLine, NewOrderRequest, Order, OrderIntake, OrderStore};
use saga::{SagaInstance, SagaStore};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<Os: OrderStore, Ss: SagaStore> {
    pub intake: OrderIntake<Os>,
    pub orders: Os,
    pub sagas: Ss,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: Option<String>,
    pub lines: Vec<OrderLineRequest>,
}

#[derive(Deserialize)]
pub struct OrderLineRequest {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderAcceptedResponse {
    pub order_id: String,
    pub status: String,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer_id: String,
    pub status: String,
    pub lines: Vec<OrderLineResponse>,
    pub total_cents: i64,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Serialize)]
pub struct SagaStatusResponse {
    pub order_id: String,
    pub step: String,
    pub reservation_id: Option<String>,
    pub payment_ref: Option<String>,
    pub reserve_attempts: u32,
    pub confirm_polls: u32,
    pub last_error: Option<String>,
    pub updated_at: String,
}

// -- Handlers --

/// POST /orders — accept a new order for fulfillment.
///
/// Returns 202: acceptance means the order is persisted and its
/// creation fact staged; fulfillment itself is asynchronous.
#[tracing::instrument(skip(state, req))]
pub async fn create<Os: OrderStore, Ss: SagaStore>(
    State(state): State<Arc<AppState<Os, Ss>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(axum::http::StatusCode, Json<OrderAcceptedResponse>), ApiError> {
    let customer_id = if let Some(ref id_str) = req.customer_id {
        let uuid = uuid::Uuid::parse_str(id_str)
            .map_err(|e| ApiError::BadRequest(format!("Invalid customer_id: {e}")))?;
        CustomerId::from_uuid(uuid)
    } else {
        CustomerId::new()
    };

    let request = NewOrderRequest {
        customer_id,
        lines: req
            .lines
            .iter()
            .map(|line| NewOrderLine {
                product_id: line.product_id.clone(),
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price: domain::Money::from_cents(line.unit_price_cents),
            })
            .collect(),
    };

    let order = state.intake.create_order(request).await?;

    let response = OrderAcceptedResponse {
        order_id: order.id().to_string(),
        status: order.status().to_string(),
    };
    Ok((axum::http::StatusCode::ACCEPTED, Json(response)))
}

/// GET /orders/:id — load an order by ID.
#[tracing::instrument(skip(state))]
pub async fn get<Os: OrderStore, Ss: SagaStore>(
    State(state): State<Arc<AppState<Os, Ss>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .orders
        .get(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;
    Ok(Json(order_to_response(&order)))
}

/// GET /orders/:id/saga — report where fulfillment stands for an order.
#[tracing::instrument(skip(state))]
pub async fn saga_status<Os: OrderStore, Ss: SagaStore>(
    State(state): State<Arc<AppState<Os, Ss>>>,
    Path(id): Path<String>,
) -> Result<Json<SagaStatusResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let saga = state
        .sagas
        .get(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No saga for order {id}")))?;
    Ok(Json(saga_to_response(&saga)))
}

fn order_to_response(order: &Order) -> OrderResponse {
    let lines = order
        .lines()
        .iter()
        .map(|line| OrderLineResponse {
            product_id: line.product_id.to_string(),
            product_name: line.product_name.clone(),
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
        })
        .collect();
    OrderResponse {
        id: order.id().to_string(),
        customer_id: order.customer_id().to_string(),
        status: order.status().to_string(),
        lines,
        total_cents: order.total_amount().cents(),
        created_at: order.created_at().to_rfc3339(),
    }
}

fn saga_to_response(saga: &SagaInstance) -> SagaStatusResponse {
    SagaStatusResponse {
        order_id: saga.order_id().to_string(),
        step: saga.step().to_string(),
        reservation_id: saga.reservation_id().map(str::to_string),
        payment_ref: saga.payment_ref().map(str::to_string),
        reserve_attempts: saga.reserve_attempts(),
        confirm_polls: saga.confirm_polls(),
        last_error: saga.last_error().map(str::to_string),
        updated_at: saga.updated_at().to_rfc3339(),
    }
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    uuid::Uuid::parse_str(id)
        .map(OrderId::from_uuid)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order id: {e}")))
}
