use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use sqlx::postgres::PgPoolOptions;

use crate::{
    api,
    clients::{LlmClient, OpenAiClient},
    config::Config,
    observability::Telemetry,
    pipeline::{CoordinatorSettings, RunCoordinator},
    store::{ClassificationDao, PgClassificationDao},
};

#[derive(Clone)]
pub(crate) struct AppState {
    registry: Arc<ComponentRegistry>,
}

/// Long-lived components shared by the HTTP handlers.
pub struct ComponentRegistry {
    telemetry: Telemetry,
    dao: Arc<dyn ClassificationDao>,
    llm: Arc<dyn LlmClient>,
    coordinator: Arc<RunCoordinator>,
    stale_after: Duration,
    postgres: Option<PgClassificationDao>,
}

impl AppState {
    pub(crate) fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub(crate) fn telemetry(&self) -> &Telemetry {
        &self.registry.telemetry
    }

    pub(crate) fn dao(&self) -> Arc<dyn ClassificationDao> {
        Arc::clone(&self.registry.dao)
    }

    pub(crate) fn llm(&self) -> Arc<dyn LlmClient> {
        Arc::clone(&self.registry.llm)
    }

    pub(crate) fn coordinator(&self) -> Arc<RunCoordinator> {
        Arc::clone(&self.registry.coordinator)
    }

    pub(crate) fn stale_after(&self) -> Duration {
        self.registry.stale_after
    }
}

impl ComponentRegistry {
    /// Wires the Postgres store, the OpenAI-compatible client and telemetry.
    ///
    /// The pool connects lazily; call [`ComponentRegistry::prepare_storage`]
    /// before serving.
    ///
    /// # Errors
    /// Fails when telemetry, the HTTP client or the pool cannot be configured.
    pub fn build(config: &Config) -> Result<Self> {
        let telemetry = Telemetry::new(&config.tracing_settings())?;
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections())
            .min_connections(config.db_min_connections())
            .acquire_timeout(config.db_acquire_timeout())
            .test_before_acquire(true)
            .connect_lazy(config.db_dsn())
            .context("failed to configure classification database pool")?;
        let postgres = PgClassificationDao::new(pool);
        let llm = OpenAiClient::new(
            config.llm_base_url(),
            config.llm_api_key(),
            config.llm_model(),
            config.llm_timeout(),
        )?;

        let mut registry = Self::from_parts(
            telemetry,
            Arc::new(postgres.clone()),
            Arc::new(llm),
            config.coordinator_settings(),
            config.stale_after(),
        );
        registry.postgres = Some(postgres);
        Ok(registry)
    }

    /// Assembles a registry from already-built components.
    #[must_use]
    pub fn from_parts(
        telemetry: Telemetry,
        dao: Arc<dyn ClassificationDao>,
        llm: Arc<dyn LlmClient>,
        settings: CoordinatorSettings,
        stale_after: Duration,
    ) -> Self {
        let coordinator = Arc::new(RunCoordinator::new(
            Arc::clone(&dao),
            Arc::clone(&llm),
            settings,
            telemetry.metrics(),
        ));
        Self {
            telemetry,
            dao,
            llm,
            coordinator,
            stale_after,
            postgres: None,
        }
    }

    /// Creates the tables when backed by Postgres; a no-op otherwise.
    ///
    /// # Errors
    /// Fails when the schema cannot be created.
    pub async fn prepare_storage(&self) -> Result<()> {
        if let Some(postgres) = &self.postgres {
            postgres.ensure_schema().await?;
        }
        Ok(())
    }

    #[must_use]
    pub fn coordinator(&self) -> Arc<RunCoordinator> {
        Arc::clone(&self.coordinator)
    }
}

pub fn build_router(registry: ComponentRegistry) -> Router {
    let state = AppState::new(registry);
    api::router(state)
}
