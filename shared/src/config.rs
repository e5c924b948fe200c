use anyhow::{Context, Result};
use std::env;

pub struct AppConfig {
    pub database: DatabaseConfig,
    pub payment: PaymentConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn new() -> Result<Self> {
        let database = DatabaseConfig {
            host: env::var("DATABASE_HOST").unwrap_or_else(|_| "localhost".into()),
            port: env::var("DATABASE_PORT")
                .unwrap_or_else(|_| "5432".into())
                .parse()
                .context("DATABASE_PORT の値が不正です")?,
            username: env::var("DATABASE_USERNAME").unwrap_or_else(|_| "app".into()),
            password: env::var("DATABASE_PASSWORD").unwrap_or_else(|_| "passwd".into()),
            database: env::var("DATABASE_NAME").unwrap_or_else(|_| "app".into()),
        };
        let payment = PaymentConfig {
            secret_key: env::var("PAYMENT_SECRET_KEY").context("PAYMENT_SECRET_KEY が未設定です")?,
            api_base: env::var("PAYMENT_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".into()),
            currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "usd".into()),
            timeout_secs: env::var("PAYMENT_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".into())
                .parse()
                .context("PAYMENT_TIMEOUT_SECS の値が不正です")?,
        };
        let server = ServerConfig {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()
                .context("PORT の値が不正です")?,
        };
        Ok(Self {
            database,
            payment,
            server,
        })
    }
}

pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
}

#[derive(Clone)]
pub struct PaymentConfig {
    pub secret_key: String,
    pub api_base: String,
    pub currency: String,
    pub timeout_secs: u64,
}

pub struct ServerConfig {
    pub port: u16,
}
