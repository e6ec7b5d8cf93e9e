use anyhow::Result;

// ============================================================================
// Configuration Constants
// ============================================================================

// Default port value
const DEFAULT_PORT: u16 = 3000;

// Default TTL for issued tokens (in days)
const DEFAULT_TOKEN_TTL_DAYS: i64 = 30;

// Default upstream registry settings
const DEFAULT_PNCP_BASE_URL: &str = "https://pncp.gov.br/api/consulta/v1";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

// Default search pagination (the registry's own defaults)
pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

// ============================================================================
// Configuration Structures
// ============================================================================

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub hash_salt: String,
}

/// Database connection pool configuration
#[derive(Clone, Debug)]
pub struct DbConfig {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Timeout for acquiring a connection from the pool (seconds)
    pub acquire_timeout_secs: u64,
    /// Timeout for idle connections before they are closed (seconds)
    pub idle_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    /// TTL for issued bearer tokens (days)
    pub token_ttl_days: i64,
    pub port: u16,
    /// Base URL of the PNCP consultation API
    pub pncp_base_url: String,
    /// Timeout for requests to the registry (seconds)
    pub upstream_timeout_secs: u64,
    /// Directory served for unmatched paths (bundled frontend, if present)
    pub static_dir: String,
    pub rust_log: String,
    pub db: DbConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")?,
            jwt_secret: {
                let secret = std::env::var("JWT_SECRET")?;
                if secret.len() < 32 {
                    anyhow::bail!("JWT_SECRET must be at least 32 characters long");
                }
                if let Err(e) = crate::utils::validate_secret_strength(&secret, 32) {
                    anyhow::bail!(
                        "JWT_SECRET is too weak: {}. Generate one with: openssl rand -base64 32",
                        e
                    );
                }
                secret
            },
            jwt_issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "pncp-tracker".to_string()),
            token_ttl_days: std::env::var("TOKEN_TTL_DAYS")
                .ok()
                .and_then(|d| d.parse().ok())
                .unwrap_or(DEFAULT_TOKEN_TTL_DAYS),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            pncp_base_url: std::env::var("PNCP_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_PNCP_BASE_URL.to_string()),
            upstream_timeout_secs: std::env::var("UPSTREAM_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            static_dir: std::env::var("STATIC_DIR").unwrap_or_else(|_| "public".to_string()),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            db: DbConfig {
                max_connections: std::env::var("DB_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
                acquire_timeout_secs: std::env::var("DB_ACQUIRE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
                idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(600),
            },
            logging: LoggingConfig {
                hash_salt: {
                    let salt = std::env::var("LOG_HASH_SALT")
                        .unwrap_or_else(|_| "default-salt-please-change".to_string());
                    if salt.is_empty() || salt == "default-salt-please-change" {
                        anyhow::bail!("LOG_HASH_SALT must be set to a unique, secret value");
                    }
                    salt
                },
            },
        })
    }
}
