//! Wiring of stores, repositories and services.

use std::sync::Arc;

use anyhow::Result;
use sqlx::PgPool;
use tokio::sync::{Semaphore, mpsc};

use crate::application::services::{
    AdmissionControl, AnalyticsService, ClickAggregator, ClickRecorder, CodeLookup, LinkService,
    LockedCacheResolver, click_channel,
};
use crate::config::Config;
use crate::domain::click_event::ClickEvent;
use crate::infrastructure::coordination::CoordinationStore;
use crate::infrastructure::persistence::{
    PgAliasRepository, PgClickCountRepository, PgUrlRepository,
};
use crate::utils::clock::{Clock, SystemClock};

pub type PgCodeLookup = CodeLookup<PgUrlRepository, PgAliasRepository>;
pub type PgResolver = LockedCacheResolver<PgUrlRepository, PgAliasRepository>;
pub type PgClickAggregator =
    ClickAggregator<PgUrlRepository, PgAliasRepository, PgClickCountRepository>;
pub type PgLinkService = LinkService<PgUrlRepository, PgAliasRepository>;
pub type PgAnalyticsService =
    AnalyticsService<PgUrlRepository, PgAliasRepository, PgClickCountRepository>;

/// Everything a request path or operator command needs, built once.
///
/// Cheap to clone. The click queue stays open while any clone is alive.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<PgPool>,
    pub store: Arc<dyn CoordinationStore>,
    pub resolver: Arc<PgResolver>,
    pub admission: Arc<AdmissionControl>,
    pub aggregator: Arc<PgClickAggregator>,
    pub clicks: ClickRecorder,
    pub links: Arc<PgLinkService>,
    pub analytics: Arc<PgAnalyticsService>,
}

impl AppState {
    /// Builds the service graph.
    ///
    /// Returns the receiving end of the click queue, to be handed to
    /// [`crate::domain::click_worker::run_click_worker`].
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket format in `config` is invalid.
    pub fn build(
        config: &Config,
        pool: PgPool,
        store: Arc<dyn CoordinationStore>,
    ) -> Result<(Self, mpsc::Receiver<ClickEvent>)> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let pool = Arc::new(pool);
        let origin = Arc::new(Semaphore::new(config.origin_concurrency));

        let url_repository = Arc::new(PgUrlRepository::new(pool.clone()));
        let alias_repository = Arc::new(PgAliasRepository::new(pool.clone()));
        let click_repository = Arc::new(PgClickCountRepository::new(pool.clone()));
        let lookup: PgCodeLookup = CodeLookup::new(url_repository.clone(), alias_repository.clone());

        let resolver = LockedCacheResolver::new(
            store.clone(),
            lookup.clone(),
            origin.clone(),
            clock.clone(),
            config.resolver_settings(),
        );

        let admission = AdmissionControl::new(
            store.clone(),
            config.redirect_policy(),
            config.creation_policy(),
        );

        let aggregator = ClickAggregator::new(
            store.clone(),
            lookup.clone(),
            click_repository.clone(),
            config.bucket_format()?,
            origin,
            clock.clone(),
        );

        let (clicks, click_rx) = click_channel(config.click_queue_capacity, clock.clone());

        let links = LinkService::new(
            url_repository,
            alias_repository,
            clock,
            config.base_url.clone(),
        );
        let analytics = AnalyticsService::new(lookup, click_repository);

        let state = Self {
            pool,
            store,
            resolver: Arc::new(resolver),
            admission: Arc::new(admission),
            aggregator: Arc::new(aggregator),
            clicks,
            links: Arc::new(links),
            analytics: Arc::new(analytics),
        };

        Ok((state, click_rx))
    }

    /// Redirect path: rate limit by code, resolve, then count the click.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AppError::RateLimited`] when the code's window is
    /// exhausted and [`crate::AppError::NotFound`] when it cannot be resolved.
    pub async fn redirect(&self, code: &str) -> Result<String, crate::AppError> {
        self.admission.redirect.check(code).await?;
        let long_url = self.resolver.resolve(code).await?;
        self.clicks.record_click(code);
        Ok(long_url)
    }
}
