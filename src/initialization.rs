use crate::cli::Args;
use crate::config::Config;
use crate::services::cache::{CacheBackend, MemoryCache, RedisCache, ResponseCache};
use crate::services::database::SqliteCountryStore;
use crate::services::refresh::DatasetRefresher;
use crate::services::store::CountryStore;
use crate::services::upstream::RestCountriesClient;
use std::sync::Arc;
use tracing::{error, info, warn};

pub async fn open_store(config: &Config) -> anyhow::Result<Arc<SqliteCountryStore>> {
    if let Some(dir) = config.database_dir() {
        if !dir.exists() {
            info!("Creating database directory {}", dir.display());
            std::fs::create_dir_all(&dir)?;
        }
    }

    let store = SqliteCountryStore::new(&config.database_path).await?;
    Ok(Arc::new(store))
}

pub fn build_cache(config: &Config) -> anyhow::Result<ResponseCache> {
    let backend: Arc<dyn CacheBackend> = match &config.redis_url {
        Some(url) => {
            info!("Using Redis response cache");
            Arc::new(RedisCache::new(url)?)
        }
        None => {
            warn!("REDIS_URL is not set, using an in-process response cache");
            Arc::new(MemoryCache::new())
        }
    };

    Ok(ResponseCache::new(
        backend,
        config.cache_ttl(),
        config.cache_timeout(),
    ))
}

/// Runs the one-shot dataset refresh before the listener is bound. A failed
/// refresh keeps the previous generation in service.
pub async fn refresh_dataset(
    config: &Config,
    args: &Args,
    store: Arc<dyn CountryStore>,
    cache: ResponseCache,
) -> anyhow::Result<()> {
    if !args.should_refresh() {
        info!("Dataset refresh skipped.");
        return Ok(());
    }

    let source = RestCountriesClient::new(&config.rest_countries_api, config.upstream_timeout())?;
    let refresher = DatasetRefresher::new(Arc::new(source), store.clone(), cache);

    let envelope = refresher.refresh().await;
    if !envelope.status {
        let remaining = store.count(&Default::default()).await?;
        error!(
            "Dataset refresh failed ({}), serving {} previously stored countries",
            envelope.message, remaining
        );
    }

    Ok(())
}
