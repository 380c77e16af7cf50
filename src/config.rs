use crate::services::cache::{DEFAULT_LOOKUP_TIMEOUT, DEFAULT_TTL};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_REST_COUNTRIES_API: &str =
    "https://restcountries.com/v3.1/all?fields=name,population,area,region,subregion,languages,borders";

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_path: String,
    pub redis_url: Option<String>,
    pub rest_countries_api: String,
    pub cache_ttl_secs: u64,
    pub cache_timeout_ms: u64,
    pub upstream_timeout_secs: u64,
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            server_port: parse_or(lookup("SERVER_PORT").or_else(|| lookup("PORT")), 3000),
            database_path: lookup("DATABASE_PATH")
                .unwrap_or_else(|| "./assets/countries.db".to_string()),
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            rest_countries_api: lookup("REST_COUNTRIES_API")
                .unwrap_or_else(|| DEFAULT_REST_COUNTRIES_API.to_string()),
            cache_ttl_secs: parse_or(lookup("CACHE_TTL_SECS"), DEFAULT_TTL.as_secs()),
            cache_timeout_ms: parse_or(
                lookup("CACHE_TIMEOUT_MS"),
                DEFAULT_LOOKUP_TIMEOUT.as_millis() as u64,
            ),
            upstream_timeout_secs: parse_or(lookup("UPSTREAM_TIMEOUT_SECS"), 30),
        }
    }

    pub fn database_dir(&self) -> Option<PathBuf> {
        if self.database_path == ":memory:" {
            return None;
        }
        PathBuf::from(&self.database_path)
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(PathBuf::from)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}
