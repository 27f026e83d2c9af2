use std::net::SocketAddr;

use anyhow::{bail, Context};
use jsonwebtoken::Algorithm;

/// One year, in minutes.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;
/// One year, in hours.
pub const MAX_FOOD_WINDOW_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    /// How far back `GET /food/` looks, in hours.
    pub food_window_hours: i64,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL is not set")?;
        let secret = lookup("SECRET_KEY").context("SECRET_KEY is not set")?;
        if secret.is_empty() {
            bail!("SECRET_KEY must not be empty");
        }

        let algorithm = match lookup("ALGORITHM") {
            Some(raw) => parse_algorithm(&raw)?,
            None => Algorithm::HS256,
        };

        let ttl_minutes = parse_or("ACCESS_TOKEN_EXPIRE_MINUTES", &lookup, 30)?;
        let food_window_hours = parse_or("FOOD_WINDOW_HOURS", &lookup, 20)?;
        if !(0..=MAX_TTL_MINUTES).contains(&ttl_minutes) {
            bail!("ACCESS_TOKEN_EXPIRE_MINUTES must be between 0 and {MAX_TTL_MINUTES}");
        }
        if !(0..=MAX_FOOD_WINDOW_HOURS).contains(&food_window_hours) {
            bail!("FOOD_WINDOW_HOURS must be between 0 and {MAX_FOOD_WINDOW_HOURS}");
        }

        let host = lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = match lookup("APP_PORT") {
            Some(v) => v
                .trim()
                .parse::<u16>()
                .with_context(|| format!("APP_PORT must be a port number, got {v:?}"))?,
            None => 8080,
        };

        Ok(Self {
            database_url,
            jwt: JwtConfig {
                secret,
                algorithm,
                ttl_minutes,
            },
            food_window_hours,
            host,
            port,
        })
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

/// Tokens are signed with the shared secret, so only the HMAC family applies.
fn parse_algorithm(raw: &str) -> anyhow::Result<Algorithm> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => bail!("unsupported ALGORITHM {other:?}, expected HS256, HS384 or HS512"),
    }
}

fn parse_or<F>(key: &str, lookup: &F, default: i64) -> anyhow::Result<i64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) => v
            .trim()
            .parse::<i64>()
            .with_context(|| format!("{key} must be an integer, got {v:?}")),
        None => Ok(default),
    }
}
