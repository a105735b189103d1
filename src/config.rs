use std::str::FromStr;

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub request_timeout_secs: u64,
    pub session_expiry_hours: i64,
    /// Process-wide secret the reset-token signing key is derived from.
    pub secret_key: String,
    pub posts_per_page: i64,
    pub reset_token_ttl_secs: i64,
    /// Empty disables search, `memory://` selects the in-process index.
    pub search_url: String,
    pub search_timeout_secs: u64,
    pub reindex_on_startup: bool,
    pub mail_sender: String,
    pub mail_queue_size: usize,
    pub mail_max_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
            database_url: "sqlite://chirp.db?mode=rwc".to_string(),
            db_max_connections: 20,
            db_min_connections: 5,
            request_timeout_secs: 30,
            session_expiry_hours: 24,
            secret_key: "change-me".to_string(),
            posts_per_page: 3,
            reset_token_ttl_secs: 600,
            search_url: String::new(),
            search_timeout_secs: 5,
            reindex_on_startup: false,
            mail_sender: "no-reply@localhost".to_string(),
            mail_queue_size: 100,
            mail_max_attempts: 3,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let defaults = Config::default();

        Ok(Config {
            server_host: env_or("SERVER_HOST", defaults.server_host),
            server_port: parse_env("SERVER_PORT", defaults.server_port)?,
            database_url: env_or("DATABASE_URL", defaults.database_url),
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            db_min_connections: parse_env("DB_MIN_CONNECTIONS", defaults.db_min_connections)?,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?,
            session_expiry_hours: parse_env("SESSION_EXPIRY_HOURS", defaults.session_expiry_hours)?,
            secret_key: env_or("SECRET_KEY", defaults.secret_key),
            posts_per_page: parse_env("POSTS_PER_PAGE", defaults.posts_per_page)?,
            reset_token_ttl_secs: parse_env("RESET_TOKEN_TTL_SECS", defaults.reset_token_ttl_secs)?,
            search_url: env_or("SEARCH_URL", defaults.search_url),
            search_timeout_secs: parse_env("SEARCH_TIMEOUT_SECS", defaults.search_timeout_secs)?,
            reindex_on_startup: parse_env("REINDEX_ON_STARTUP", defaults.reindex_on_startup)?,
            mail_sender: env_or("MAIL_SENDER", defaults.mail_sender),
            mail_queue_size: parse_env("MAIL_QUEUE_SIZE", defaults.mail_queue_size)?,
            mail_max_attempts: parse_env("MAIL_MAX_ATTEMPTS", defaults.mail_max_attempts)?,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn search_enabled(&self) -> bool {
        !self.search_url.trim().is_empty()
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn parse_env<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}
