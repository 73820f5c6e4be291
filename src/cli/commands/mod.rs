//! Command implementations.

pub mod queue_cmd;
pub mod scrape;
pub mod status;
pub mod worker;

use std::sync::Arc;

use crate::config::Settings;
use crate::ingest::{Normalizer, NormalizerConfig, StaticRates};
use crate::queue::JobQueue;
use crate::repository::{CatalogStore, SqliteCatalogStore};
use crate::session::{HttpSessionFactory, SessionFactory};

pub(crate) fn open_queue(settings: &Settings) -> anyhow::Result<JobQueue> {
    Ok(JobQueue::open(
        settings.queue_db_path(),
        settings.queue.max_attempts,
        settings.backoff_base(),
    )?)
}

pub(crate) fn open_catalog(settings: &Settings) -> anyhow::Result<Arc<SqliteCatalogStore>> {
    Ok(Arc::new(SqliteCatalogStore::new(settings.catalog_db_path())?))
}

pub(crate) fn build_normalizer(store: Arc<dyn CatalogStore>, settings: &Settings) -> Normalizer {
    // Snapshot rates convert into USD; other reference currencies would need
    // their own table.
    let rates = if settings.reference_currency.eq_ignore_ascii_case("usd") {
        StaticRates::usd_snapshot()
    } else {
        tracing::warn!(
            currency = %settings.reference_currency,
            "No rate table for reference currency, falling back to USD"
        );
        StaticRates::usd_snapshot()
    };
    Normalizer::new(store, Arc::new(rates), NormalizerConfig::default())
}

/// Session factory for the configured backend. A known source applies its
/// per-source navigation timeout; the shared worker pool passes `None`.
pub(crate) fn session_factory(
    settings: &Settings,
    source: Option<crate::models::SourceType>,
    no_browser: bool,
) -> Arc<dyn SessionFactory> {
    let use_browser = settings.scrape.use_browser && !no_browser;
    let config = match source {
        Some(source) => settings.session_config_for(source),
        None => settings.session_config(),
    };

    #[cfg(feature = "browser")]
    if use_browser {
        return Arc::new(crate::session::BrowserSessionFactory::new(config));
    }

    #[cfg(not(feature = "browser"))]
    if use_browser {
        tracing::warn!("Built without browser support, using plain HTTP");
    }

    Arc::new(HttpSessionFactory::new(config))
}
