//! Message-driven worker wrapping the orchestrator.

use std::sync::Arc;

use bus::{Message, MessageBus};
use domain::{OrderCreated, OrderStore, TOPIC_ORDER_CREATED};
use futures_util::StreamExt;

use crate::clients::{InventoryClient, PaymentClient};
use crate::error::SagaError;
use crate::orchestrator::{PaymentCheck, SagaOrchestrator, TOPIC_PAYMENT_CHECK};
use crate::store::SagaStore;

/// Consumer group under which orchestrator workers subscribe. All
/// workers share it, so each trigger lands on exactly one of them.
pub const GROUP_ORCHESTRATOR: &str = "orchestrator";

/// Subscribes to `order.created` and the orchestrator's own delayed
/// payment checks, dispatching each message to the orchestrator.
/// Handler errors are logged and counted, never fatal to the loop:
/// the message source redelivers and the orchestrator absorbs
/// duplicates.
pub struct SagaWorker<St, Os, I, P, B>
where
    St: SagaStore,
    Os: OrderStore,
    I: InventoryClient,
    P: PaymentClient,
    B: MessageBus,
{
    orchestrator: Arc<SagaOrchestrator<St, Os, I, P, B>>,
    bus: B,
}

impl<St, Os, I, P, B> SagaWorker<St, Os, I, P, B>
where
    St: SagaStore,
    Os: OrderStore,
    I: InventoryClient,
    P: PaymentClient,
    B: MessageBus,
{
    pub fn new(orchestrator: Arc<SagaOrchestrator<St, Os, I, P, B>>, bus: B) -> Self {
        Self { orchestrator, bus }
    }

    /// Runs until both subscriptions close.
    pub async fn run(self) -> Result<(), SagaError> {
        let created = self
            .bus
            .subscribe(TOPIC_ORDER_CREATED, GROUP_ORCHESTRATOR)
            .await?;
        let checks = self
            .bus
            .subscribe(TOPIC_PAYMENT_CHECK, GROUP_ORCHESTRATOR)
            .await?;
        tracing::info!(group = GROUP_ORCHESTRATOR, "saga worker subscribed");

        let mut stream = futures_util::stream::select(created, checks);
        while let Some(message) = stream.next().await {
            self.dispatch(message).await;
        }
        tracing::info!("saga worker stream closed, shutting down");
        Ok(())
    }

    async fn dispatch(&self, message: Message) {
        let result = match message.topic.as_str() {
            TOPIC_ORDER_CREATED => match message.decode::<OrderCreated>() {
                Ok(fact) => self.orchestrator.handle_order_created(&fact).await,
                Err(e) => Err(e.into()),
            },
            TOPIC_PAYMENT_CHECK => match message.decode::<PaymentCheck>() {
                Ok(check) => self.orchestrator.handle_payment_check(&check).await,
                Err(e) => Err(e.into()),
            },
            other => {
                tracing::warn!(topic = other, "message on unexpected topic, dropping");
                Ok(())
            }
        };
        if let Err(e) = result {
            tracing::error!(
                topic = %message.topic,
                key = %message.key,
                error = %e,
                "saga handler failed"
            );
            metrics::counter!("saga_handler_errors_total").increment(1);
        }
    }
}
