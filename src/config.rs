//! Configuration management

use std::path::PathBuf;

use anyhow::{self, Context, Result};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// Optional NATS credentials (`NATS_USER` / `NATS_PASSWORD`)
    pub nats_credentials: Option<(String, String)>,

    /// PostgreSQL connection string
    pub database_url: String,

    pub db_max_connections: u32,

    /// JWT secret key for token validation
    pub jwt_secret: String,

    /// Root under which per-owner import directories are created
    pub import_root: PathBuf,

    /// Where uploaded file contents are written before staging
    pub upload_tmp_dir: PathBuf,

    /// Accept mappings with zero columns
    pub allow_empty_mapping: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let nats_url = var("NATS_URL").unwrap_or_else(|| "nats://localhost:4222".to_string());
        let nats_credentials = var("NATS_USER").zip(var("NATS_PASSWORD"));

        let database_url = var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let db_max_connections = match var("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("DB_MAX_CONNECTIONS is not a number: {}", raw))?,
            None => 10,
        };

        let jwt_secret = var("JWT_SECRET")
            .context("JWT_SECRET must be set, generate one with: openssl rand -base64 48")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!(
                "JWT_SECRET must be at least 32 bytes (current: {} bytes). Generate one with: openssl rand -base64 48",
                jwt_secret.len()
            );
        }

        let import_root = var("IMPORT_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./var/imports"));
        let upload_tmp_dir = var("UPLOAD_TMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("contact-import-uploads"));

        let allow_empty_mapping = match var("ALLOW_EMPTY_MAPPING") {
            Some(raw) => parse_flag(&raw)
                .with_context(|| format!("ALLOW_EMPTY_MAPPING must be true or false, got {}", raw))?,
            None => false,
        };

        Ok(Self {
            nats_url,
            nats_credentials,
            database_url,
            db_max_connections,
            jwt_secret,
            import_root,
            upload_tmp_dir,
            allow_empty_mapping,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
