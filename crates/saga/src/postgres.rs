//! PostgreSQL-backed saga store.

use async_trait::async_trait;
use common::OrderId;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::error::SagaStoreError;
use crate::instance::SagaInstance;
use crate::step::SagaStep;

/// Saga store on PostgreSQL.
///
/// The compare-and-swap is a conditional `UPDATE ... WHERE order_id = $1
/// AND current_step = $2`; zero rows affected means another writer moved
/// the saga first and the call reports a conflict with the step it found.
#[derive(Clone)]
pub struct PostgresSagaStore {
    pool: PgPool,
}

impl PostgresSagaStore {
    /// Creates a new PostgreSQL saga store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_instance(row: PgRow) -> Result<SagaInstance, SagaStoreError> {
        let step_text: String = row.try_get("current_step")?;
        let step: SagaStep = step_text
            .parse()
            .map_err(SagaStoreError::InvalidStep)?;
        Ok(SagaInstance::from_parts(
            OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            step,
            row.try_get("reservation_id")?,
            row.try_get("payment_ref")?,
            row.try_get::<i32, _>("reserve_attempts")? as u32,
            row.try_get::<i32, _>("confirm_polls")? as u32,
            row.try_get::<i32, _>("release_attempts")? as u32,
            row.try_get::<i32, _>("void_attempts")? as u32,
            row.try_get("last_error")?,
            row.try_get("updated_at")?,
        ))
    }

    async fn fetch(&self, order_id: OrderId) -> Result<Option<SagaInstance>, SagaStoreError> {
        let row = sqlx::query(
            r#"
            SELECT order_id, current_step, reservation_id, payment_ref,
                   reserve_attempts, confirm_polls, release_attempts, void_attempts,
                   last_error, updated_at
            FROM saga_instances
            WHERE order_id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_instance).transpose()
    }
}

#[async_trait]
impl crate::store::SagaStore for PostgresSagaStore {
    async fn load_or_create(
        &self,
        order_id: OrderId,
    ) -> Result<(SagaInstance, bool), SagaStoreError> {
        let fresh = SagaInstance::new(order_id);
        let result = sqlx::query(
            r#"
            INSERT INTO saga_instances (order_id, current_step, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (order_id) DO NOTHING
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(fresh.step().as_str())
        .bind(fresh.updated_at())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok((fresh, true));
        }
        let existing = self
            .fetch(order_id)
            .await?
            .ok_or(SagaStoreError::NotFound(order_id))?;
        Ok((existing, false))
    }

    async fn compare_and_swap(
        &self,
        expected: SagaStep,
        instance: &SagaInstance,
    ) -> Result<(), SagaStoreError> {
        let order_id = instance.order_id();
        let result = sqlx::query(
            r#"
            UPDATE saga_instances
            SET current_step = $3,
                reservation_id = $4,
                payment_ref = $5,
                reserve_attempts = $6,
                confirm_polls = $7,
                release_attempts = $8,
                void_attempts = $9,
                last_error = $10,
                updated_at = $11
            WHERE order_id = $1 AND current_step = $2
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(expected.as_str())
        .bind(instance.step().as_str())
        .bind(instance.reservation_id())
        .bind(instance.payment_ref())
        .bind(instance.reserve_attempts() as i32)
        .bind(instance.confirm_polls() as i32)
        .bind(instance.release_attempts() as i32)
        .bind(instance.void_attempts() as i32)
        .bind(instance.last_error())
        .bind(instance.updated_at())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }
        match self.fetch(order_id).await? {
            Some(actual) => Err(SagaStoreError::Conflict {
                order_id,
                expected,
                actual: actual.step(),
            }),
            None => Err(SagaStoreError::NotFound(order_id)),
        }
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<SagaInstance>, SagaStoreError> {
        self.fetch(order_id).await
    }
}
