use crate::app_config::{AppConfig, Environment, LlmConfig};
use crate::orders::StockPolicy;
use crate::ConfigError;

const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = require("DATABASE_URL")?;
    let session_salt = require("DISPENSARY_SESSION_SALT")?;
    if session_salt.trim().is_empty() {
        return Err(invalid(
            "DISPENSARY_SESSION_SALT",
            "must not be empty".to_string(),
        ));
    }

    let env = parse_environment(&or_default("DISPENSARY_ENV", "development"))?;

    let bind_addr = or_default("DISPENSARY_BIND_ADDR", "0.0.0.0:3000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("DISPENSARY_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("DISPENSARY_LOG_LEVEL", "info");
    let session_cookie_name = or_default("DISPENSARY_SESSION_COOKIE", "app_session_id");

    let db_max_connections = parse_u32("DISPENSARY_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("DISPENSARY_DB_MIN_CONNECTIONS", "1")?;
    if db_min_connections > db_max_connections {
        return Err(invalid(
            "DISPENSARY_DB_MIN_CONNECTIONS",
            format!("{db_min_connections} exceeds max connections {db_max_connections}"),
        ));
    }
    let db_acquire_timeout_secs = parse_u64("DISPENSARY_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let rate_limit_per_minute = or_default("DISPENSARY_RATE_LIMIT_PER_MINUTE", "120")
        .parse::<usize>()
        .map_err(|e| invalid("DISPENSARY_RATE_LIMIT_PER_MINUTE", e.to_string()))?;

    let stock_policy = or_default("DISPENSARY_STOCK_POLICY", "check_only")
        .parse::<StockPolicy>()
        .map_err(|e| invalid("DISPENSARY_STOCK_POLICY", e.to_string()))?;

    let llm = match lookup("DISPENSARY_LLM_API_URL") {
        Ok(api_url) if !api_url.trim().is_empty() => Some(LlmConfig {
            api_url,
            api_key: lookup("DISPENSARY_LLM_API_KEY").ok(),
            model: or_default("DISPENSARY_LLM_MODEL", DEFAULT_LLM_MODEL),
            timeout_secs: parse_u64("DISPENSARY_LLM_TIMEOUT_SECS", "15")?,
        }),
        _ => None,
    };

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        session_salt,
        session_cookie_name,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        rate_limit_per_minute,
        stock_policy,
        llm,
    })
}

fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "DISPENSARY_ENV".to_string(),
            reason: format!("expected development, test, or production; got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
