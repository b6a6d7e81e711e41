use anyhow::Context;
use std::sync::Arc;

use crate::api::cors::OriginAllowList;
use crate::config::Config;
use crate::database::brand_store::{BrandHostPolicy, BrandStoreConnector, RestBrandStoreConnector};
use crate::database::order_repository::PgOrderRepository;
use crate::database::repository::OrderStore;
use crate::database::{init_pool, PoolConfig};
use crate::models::TerminalStatusPolicy;
use crate::payments::providers::StripeProvider;
use crate::payments::traits::PaymentProcessor;
use crate::payments::webhook::WebhookVerifier;

/// Collaborators shared by every handler, built once at startup.
#[derive(Clone)]
pub struct AppState {
    /// Privileged admin store connection (order creation, manual updates).
    pub orders: Arc<dyn OrderStore>,
    /// Restricted admin store connection used by the webhook.
    pub webhook_orders: Arc<dyn OrderStore>,
    pub processor: Arc<dyn PaymentProcessor>,
    pub brand_stores: Arc<dyn BrandStoreConnector>,
    pub verifier: Arc<WebhookVerifier>,
    pub allowed_origins: Arc<OriginAllowList>,
    pub terminal_status_policy: TerminalStatusPolicy,
    pub environment: String,
}

impl AppState {
    /// Connect to the admin store and build the production collaborators.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let pool_config = PoolConfig::with_max_connections(config.database.max_connections);

        let admin_pool = init_pool(&config.database.admin_url, Some(pool_config.clone()))
            .await
            .context("Failed to connect to the admin database")?;
        let webhook_pool = if config.database.webhook_url == config.database.admin_url {
            admin_pool.clone()
        } else {
            init_pool(&config.database.webhook_url, Some(pool_config))
                .await
                .context("Failed to connect to the admin database (webhook role)")?
        };

        let processor = StripeProvider::new((&config.stripe).into())?;
        let brand_stores = RestBrandStoreConnector::new(
            BrandHostPolicy::new(config.brand_stores.allowed_hosts.clone()),
            config.brand_stores.timeout_secs,
        )?;
        let tolerance = i64::try_from(config.stripe.webhook_tolerance_secs)
            .context("STRIPE_WEBHOOK_TOLERANCE_SECS is too large")?;
        let allowed_origins = OriginAllowList::new(config.cors.allowed_origins.clone())
            .context("CORS_ALLOWED_ORIGINS must contain at least one origin")?;

        Ok(Self {
            orders: Arc::new(PgOrderRepository::new(admin_pool)),
            webhook_orders: Arc::new(PgOrderRepository::new(webhook_pool)),
            processor: Arc::new(processor),
            brand_stores: Arc::new(brand_stores),
            verifier: Arc::new(
                WebhookVerifier::new(config.stripe.webhook_secret.clone()).with_tolerance(tolerance),
            ),
            allowed_origins: Arc::new(allowed_origins),
            terminal_status_policy: config.terminal_status_policy,
            environment: config.server.environment.clone(),
        })
    }
}
