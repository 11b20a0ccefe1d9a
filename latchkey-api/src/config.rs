/// Configuration management for the API server
///
/// Loads configuration from environment variables (and a `.env` file in
/// development) into a type-safe struct.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `DATABASE_STATEMENT_TIMEOUT_SECONDS`: Per-statement limit (default: 5)
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `API_CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: *)
/// - `API_ENABLE_HSTS`: Send Strict-Transport-Security (default: false)
/// - `JWT_SECRET`: Access token signing secret, at least 32 characters (required)
/// - `RUST_LOG`: Log filter
/// - `LOG_FORMAT`: `json` for JSON logs, anything else for human-readable
///
/// # Example
///
/// ```no_run
/// use latchkey_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;
use std::str::FromStr;

use latchkey_shared::db::pool::DatabaseConfig as PoolConfig;

/// Minimum accepted length of `JWT_SECRET`
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT configuration
    pub jwt: JwtConfig,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Whether to send HSTS (only behind HTTPS)
    pub enable_hsts: bool,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,

    /// Server-side limit on any single statement
    pub statement_timeout_seconds: u64,
}

impl DatabaseConfig {
    /// Pool settings for this configuration
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            statement_timeout_seconds: self.statement_timeout_seconds,
            ..Default::default()
        }
    }
}

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for access token signing
    ///
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Reads an optional variable, parsing it when present
fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value: {}", name, e)),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `DATABASE_URL` or `JWT_SECRET` is missing
    /// - `JWT_SECRET` is shorter than 32 characters
    /// - A numeric or boolean variable cannot be parsed
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = parse_var("API_PORT", 8080u16)?;
        let cors_origins = env::var("API_CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();
        let enable_hsts = parse_var("API_ENABLE_HSTS", false)?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;
        let max_connections = parse_var("DATABASE_MAX_CONNECTIONS", 10u32)?;
        let statement_timeout_seconds = parse_var("DATABASE_STATEMENT_TIMEOUT_SECONDS", 5u64)?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;
        validate_jwt_secret(&jwt_secret)?;

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins,
                enable_hsts,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
                statement_timeout_seconds,
            },
            jwt: JwtConfig { secret: jwt_secret },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

/// Rejects signing secrets that are too short
pub fn validate_jwt_secret(secret: &str) -> anyhow::Result<()> {
    if secret.len() < MIN_JWT_SECRET_LEN {
        anyhow::bail!(
            "JWT_SECRET must be at least {} characters long",
            MIN_JWT_SECRET_LEN
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                cors_origins: vec!["*".to_string()],
                enable_hsts: false,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/test".to_string(),
                max_connections: 10,
                statement_timeout_seconds: 5,
            },
            jwt: JwtConfig {
                secret: "test-secret-key-at-least-32-bytes-long".to_string(),
            },
        }
    }

    #[test]
    fn test_bind_address() {
        assert_eq!(config().bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_pool_config() {
        let pool = config().database.pool_config();

        assert_eq!(pool.url, "postgresql://localhost/test");
        assert_eq!(pool.max_connections, 10);
        assert_eq!(pool.statement_timeout_seconds, 5);
    }

    #[test]
    fn test_validate_jwt_secret() {
        assert!(validate_jwt_secret("short").is_err());
        assert!(validate_jwt_secret(&"x".repeat(31)).is_err());
        assert!(validate_jwt_secret(&"x".repeat(32)).is_ok());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", config());
        assert!(!debug.contains("test-secret-key"));
    }
}
