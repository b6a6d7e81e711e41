use crate::database::error::DatabaseError;
use crate::database::repository::OrderStore;
use crate::models::{NewOrder, Order, OrderStatus, PaymentUpdate, TerminalStatusPolicy};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

const ORDER_COLUMNS: &str = "id, brand, brand_order_id, order_number, product, amount, currency, \
     customer_email, customer_name, status, payment_method, stripe_payment_intent_id, \
     stripe_charge_id, paid_at, metadata, created_at, updated_at";

/// Postgres-backed admin ledger (`admin.orders`)
#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl OrderStore for PgOrderRepository {
    async fn insert_pending(&self, order: &NewOrder) -> Result<Order, DatabaseError> {
        let sql = format!(
            "INSERT INTO admin.orders \
             (brand, brand_order_id, order_number, product, amount, currency, customer_email, customer_name, status, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {}",
            ORDER_COLUMNS
        );

        sqlx::query_as::<_, Order>(&sql)
            .bind(&order.brand)
            .bind(&order.brand_order_id)
            .bind(&order.order_number)
            .bind(&order.product)
            .bind(order.amount)
            .bind(&order.currency)
            .bind(&order.customer_email)
            .bind(&order.customer_name)
            .bind(OrderStatus::PendingPayment.as_str())
            .bind(order.metadata())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx(e).with_context("insert pending order"))
    }

    async fn attach_payment_intent(
        &self,
        order_id: Uuid,
        payment_intent_id: &str,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE admin.orders SET stripe_payment_intent_id = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(payment_intent_id)
        .bind(order_id)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx(e).with_context("attach payment intent"))?;

        Ok(result.rows_affected())
    }

    async fn apply_payment_update(
        &self,
        payment_intent_id: &str,
        update: &PaymentUpdate,
        policy: TerminalStatusPolicy,
    ) -> Result<u64, DatabaseError> {
        debug!(
            payment_intent_id,
            status = %update.status,
            paid_at = update.paid_at.tag(),
            "Applying payment update"
        );

        let result = sqlx::query(
            "UPDATE admin.orders SET \
                 status = $1, \
                 stripe_charge_id = COALESCE($2, stripe_charge_id), \
                 payment_method = COALESCE($3, payment_method), \
                 paid_at = CASE $4::text \
                     WHEN 'keep' THEN paid_at \
                     WHEN 'clear' THEN NULL \
                     WHEN 'set_if_unset' THEN COALESCE(paid_at, $5::timestamptz) \
                     ELSE $5::timestamptz \
                 END, \
                 updated_at = NOW() \
             WHERE stripe_payment_intent_id = $6 \
               AND ($7::bool = FALSE OR status = 'pending_payment')",
        )
        .bind(update.status.as_str())
        .bind(&update.charge_id)
        .bind(&update.payment_method)
        .bind(update.paid_at.tag())
        .bind(update.paid_at.timestamp())
        .bind(payment_intent_id)
        .bind(policy == TerminalStatusPolicy::Reject)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx(e).with_context("apply payment update"))?;

        Ok(result.rows_affected())
    }

    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<Order>, DatabaseError> {
        let sql = format!("SELECT {} FROM admin.orders WHERE id = $1", ORDER_COLUMNS);
        sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM admin.orders WHERE stripe_payment_intent_id = $1",
            ORDER_COLUMNS
        );
        sqlx::query_as::<_, Order>(&sql)
            .bind(payment_intent_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        crate::database::health_check(&self.pool).await
    }
}
