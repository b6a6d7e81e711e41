use anyhow::{anyhow, Context, Result};
use std::env;
use std::str::FromStr;

use crate::models::TerminalStatusPolicy;

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:8080,https://your-production-frontend.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub stripe: StripeConfig,
    pub cors: CorsConfig,
    pub brand_stores: BrandStoreConfig,
    pub terminal_status_policy: TerminalStatusPolicy,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Privileged connection used for order creation and manual status updates.
    pub admin_url: String,
    /// Restricted connection used by the webhook handler.
    pub webhook_url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub api_base: String,
    pub timeout_secs: u64,
    pub webhook_tolerance_secs: u64,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BrandStoreConfig {
    /// `None` accepts any host supplied by the caller.
    pub allowed_hosts: Option<Vec<String>>,
    pub timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let server = ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .parse()?,
        };

        let admin_url = env::var("ADMIN_DATABASE_URL").context("ADMIN_DATABASE_URL not set")?;
        let database = DatabaseConfig {
            webhook_url: env::var("ADMIN_WEBHOOK_DATABASE_URL")
                .unwrap_or_else(|_| admin_url.clone()),
            admin_url,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a valid number")?,
        };

        let stripe = StripeConfig {
            secret_key: env::var("STRIPE_SECRET_KEY").context("STRIPE_SECRET_KEY not set")?,
            webhook_secret: env::var("STRIPE_WEBHOOK_SECRET")
                .context("STRIPE_WEBHOOK_SECRET not set")?,
            api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            timeout_secs: env::var("STRIPE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("STRIPE_TIMEOUT_SECS must be a valid number")?,
            webhook_tolerance_secs: env::var("STRIPE_WEBHOOK_TOLERANCE_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("STRIPE_WEBHOOK_TOLERANCE_SECS must be a valid number")?,
        };

        let cors = CorsConfig {
            allowed_origins: split_list(
                &env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGINS.to_string()),
            ),
        };

        let brand_stores = BrandStoreConfig {
            allowed_hosts: env::var("BRAND_STORE_ALLOWED_HOSTS")
                .ok()
                .map(|hosts| split_list(&hosts)),
            timeout_secs: stripe.timeout_secs,
        };

        let terminal_status_policy = env::var("TERMINAL_STATUS_POLICY")
            .unwrap_or_else(|_| "overwrite".to_string())
            .parse()?;

        let config = Config {
            server,
            database,
            stripe,
            cors,
            brand_stores,
            terminal_status_policy,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port < 1024 {
            return Err(anyhow!(
                "Port must be at least 1024, got {}",
                self.server.port
            ));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.server.environment.as_str()) {
            return Err(anyhow!(
                "Environment must be one of: {:?}, got {}",
                valid_environments,
                self.server.environment
            ));
        }

        if self.database.admin_url.trim().is_empty() {
            return Err(anyhow!("ADMIN_DATABASE_URL cannot be empty"));
        }

        if self.database.webhook_url.trim().is_empty() {
            return Err(anyhow!("ADMIN_WEBHOOK_DATABASE_URL cannot be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow!("DATABASE_MAX_CONNECTIONS must be greater than 0"));
        }

        if self.stripe.secret_key.trim().is_empty() {
            return Err(anyhow!("STRIPE_SECRET_KEY cannot be empty"));
        }

        if self.stripe.webhook_secret.trim().is_empty() {
            return Err(anyhow!("STRIPE_WEBHOOK_SECRET cannot be empty"));
        }

        if self.stripe.timeout_secs == 0 {
            return Err(anyhow!("STRIPE_TIMEOUT_SECS must be greater than 0"));
        }

        if self.cors.allowed_origins.is_empty() {
            return Err(anyhow!(
                "CORS_ALLOWED_ORIGINS must contain at least one origin"
            ));
        }

        if let Some(hosts) = &self.brand_stores.allowed_hosts {
            if hosts.is_empty() {
                return Err(anyhow!(
                    "BRAND_STORE_ALLOWED_HOSTS is set but contains no hosts"
                ));
            }
        }

        Ok(())
    }
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(anyhow!("LOG_FORMAT must be 'pretty' or 'json', got {}", other)),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
