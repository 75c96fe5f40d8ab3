//! Application configuration loaded from environment variables.

use service::DEFAULT_ADMIN_ADDRESS;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL URL; the in-memory store is used when unset
/// - `REDIS_URL`: Redis URL; the in-memory broker is used when unset
/// - `ADMIN_EMAIL`: destination of administrator notices
/// - `SEED_DEFAULTS`: create the default roles at startup (default: `true`)
/// - `CONSUME_EVENTS`: send notices from the broker consumer instead of the
///   command bus; needs `REDIS_URL` (default: `false`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub admin_email: String,
    pub seed_defaults: bool,
    pub consume_events: bool,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: var("DATABASE_URL").filter(|url| !url.is_empty()),
            redis_url: var("REDIS_URL").filter(|url| !url.is_empty()),
            admin_email: var("ADMIN_EMAIL").unwrap_or(defaults.admin_email),
            seed_defaults: var("SEED_DEFAULTS")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.seed_defaults),
            consume_events: var("CONSUME_EVENTS")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.consume_events),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            redis_url: None,
            admin_email: DEFAULT_ADMIN_ADDRESS.to_string(),
            seed_defaults: true,
            consume_events: false,
        }
    }
}
