use crate::database::error::DatabaseError;
use crate::models::{NewOrder, Order, PaymentUpdate, TerminalStatusPolicy};
use async_trait::async_trait;
use uuid::Uuid;

/// Access to the admin order ledger.
///
/// Every write is a single-row statement; the store's own per-row atomicity is
/// the only concurrency control. Concurrent writers to one order race at
/// last-write-wins granularity.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert an order in `pending_payment` and return the stored row.
    async fn insert_pending(&self, order: &NewOrder) -> Result<Order, DatabaseError>;

    /// Record the processor intent id on an order. Returns the number of rows touched.
    async fn attach_payment_intent(
        &self,
        order_id: Uuid,
        payment_intent_id: &str,
    ) -> Result<u64, DatabaseError>;

    /// Apply a status write to the order linked to `payment_intent_id`.
    /// Returns the number of rows touched; zero when nothing matched or the policy refused.
    async fn apply_payment_update(
        &self,
        payment_intent_id: &str,
        update: &PaymentUpdate,
        policy: TerminalStatusPolicy,
    ) -> Result<u64, DatabaseError>;

    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<Order>, DatabaseError>;

    async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, DatabaseError>;

    /// Cheap connectivity probe used by the health endpoint.
    async fn ping(&self) -> Result<(), DatabaseError>;
}
