use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub api_rps: u32,
    pub tenant_cache_ttl: Duration,
    pub uploads_dir: String,
    pub email_relay_url: Option<String>,
    pub notification_concurrency: usize,
    pub notification_timeout: Duration,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            jwt_secret: get_env("JWT_SECRET")?,
            api_rps: get_env_parse_or("API_RPS", 100)?,
            tenant_cache_ttl: Duration::from_secs(get_env_parse_or(
                "TENANT_CACHE_TTL_SECS",
                3600,
            )?),
            uploads_dir: env::var("UPLOADS_DIR").unwrap_or_else(|_| "./uploads".to_string()),
            email_relay_url: env::var("EMAIL_RELAY_URL").ok().filter(|v| !v.is_empty()),
            notification_concurrency: get_env_parse_or("NOTIFICATION_CONCURRENCY", 8)?,
            notification_timeout: Duration::from_secs(get_env_parse_or(
                "NOTIFICATION_TIMEOUT_SECS",
                10,
            )?),
        })
    }

    /// A config for tests and local tooling; nothing is read from the environment.
    pub fn local(jwt_secret: &str, uploads_dir: &str) -> Self {
        Self {
            server_address: "127.0.0.1:0".to_string(),
            database_url: String::new(),
            jwt_secret: jwt_secret.to_string(),
            api_rps: 10_000,
            tenant_cache_ttl: Duration::from_secs(3600),
            uploads_dir: uploads_dir.to_string(),
            email_relay_url: None,
            notification_concurrency: 8,
            notification_timeout: Duration::from_secs(10),
        }
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> Result<&'static Config> {
    CONFIG
        .get()
        .ok_or_else(|| Error::Config("Configuration has not been initialized".to_string()))
}
