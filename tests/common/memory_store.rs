use async_trait::async_trait;
use brandpay_backend::database::error::{DatabaseError, DatabaseErrorKind};
use brandpay_backend::database::repository::OrderStore;
use brandpay_backend::models::{NewOrder, Order, OrderStatus, PaymentUpdate, TerminalStatusPolicy};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory admin ledger with the same semantics as the Postgres repository,
/// including the unique payment intent index and the status check.
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<Uuid, Order>>,
    fail_writes: AtomicBool,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a connection error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn all(&self) -> Vec<Order> {
        self.orders.read().await.values().cloned().collect()
    }

    fn check_writable(&self) -> Result<(), DatabaseError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DatabaseError::new(DatabaseErrorKind::ConnectionError {
                message: "store unavailable".to_string(),
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert_pending(&self, order: &NewOrder) -> Result<Order, DatabaseError> {
        self.check_writable()?;

        let now = Utc::now();
        let stored = Order {
            id: Uuid::new_v4(),
            brand: order.brand.clone(),
            brand_order_id: order.brand_order_id.clone(),
            order_number: order.order_number.clone(),
            product: order.product.clone(),
            amount: order.amount,
            currency: order.currency.clone(),
            customer_email: order.customer_email.clone(),
            customer_name: order.customer_name.clone(),
            status: OrderStatus::PendingPayment,
            payment_method: None,
            stripe_payment_intent_id: None,
            stripe_charge_id: None,
            paid_at: None,
            metadata: order.metadata(),
            created_at: now,
            updated_at: now,
        };

        self.orders.write().await.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn attach_payment_intent(
        &self,
        order_id: Uuid,
        payment_intent_id: &str,
    ) -> Result<u64, DatabaseError> {
        self.check_writable()?;

        let mut orders = self.orders.write().await;
        let taken = orders.values().any(|o| {
            o.id != order_id && o.stripe_payment_intent_id.as_deref() == Some(payment_intent_id)
        });
        if taken {
            return Err(DatabaseError::new(
                DatabaseErrorKind::UniqueConstraintViolation {
                    constraint: "orders_stripe_payment_intent_id_key".to_string(),
                },
            ));
        }

        match orders.get_mut(&order_id) {
            Some(order) => {
                order.stripe_payment_intent_id = Some(payment_intent_id.to_string());
                order.updated_at = Utc::now();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn apply_payment_update(
        &self,
        payment_intent_id: &str,
        update: &PaymentUpdate,
        policy: TerminalStatusPolicy,
    ) -> Result<u64, DatabaseError> {
        self.check_writable()?;

        let now = Utc::now();
        let mut orders = self.orders.write().await;
        let mut touched = 0;
        for order in orders
            .values_mut()
            .filter(|o| o.stripe_payment_intent_id.as_deref() == Some(payment_intent_id))
        {
            let applied = order.apply(update, policy, now).map_err(|_| {
                DatabaseError::new(DatabaseErrorKind::CheckViolation {
                    constraint: "orders_status_check".to_string(),
                })
            })?;
            if applied {
                touched += 1;
            }
        }

        Ok(touched)
    }

    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<Order>, DatabaseError> {
        Ok(self.orders.read().await.get(&order_id).cloned())
    }

    async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, DatabaseError> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .find(|o| o.stripe_payment_intent_id.as_deref() == Some(payment_intent_id))
            .cloned())
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}
