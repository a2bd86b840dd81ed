//! Database module - AppState and template record storage
//!
//! - `template` - Postgres-backed `TemplateStore`
//! - `memory` - in-process `TemplateStore`, used without `DATABASE_URL`

mod memory;
mod template;

pub use memory::MemoryTemplateStore;
pub use template::PgTemplateStore;

use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::pipeline::artifacts::start_sweep_worker;
use crate::pipeline::resolver::default_candidates;
use crate::pipeline::{ArtifactStore, ConversionPipeline, ConverterInvoker};
use crate::template::models::Template;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("corrupt template record {id}: {reason}")]
    Corrupt { id: Uuid, reason: String },
}

/// Keyed record store for template metadata.
#[async_trait]
pub trait TemplateStore {
    async fn insert(&self, template: &Template) -> Result<(), StoreError>;
    async fn find_all(&self) -> Result<Vec<Template>, StoreError>;
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Template>, StoreError>;
    /// Returns `false` when no record had this id.
    async fn delete(&self, id: &Uuid) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub templates: Arc<dyn TemplateStore + Send + Sync>,
    pub template_cache: Cache<Uuid, Template>,
    pub pipeline: Arc<ConversionPipeline>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let templates: Arc<dyn TemplateStore + Send + Sync> = match &config.database_url {
            Some(url) => Arc::new(PgTemplateStore::connect(url).await?),
            None => {
                log::warn!("DATABASE_URL not set, template records are kept in memory only");
                Arc::new(MemoryTemplateStore::new())
            }
        };

        tokio::fs::create_dir_all(config.templates_dir()).await?;

        let state = Self::with_store(config, templates);

        let sweeper_store = state.pipeline.artifacts().clone();
        let every = state.config.sweep_interval;
        let max_age = state.config.sweep_max_age;
        tokio::spawn(async move {
            start_sweep_worker(sweeper_store, every, max_age).await;
        });

        Ok(state)
    }

    /// Build state around an existing store. No background workers are started.
    pub fn with_store(config: AppConfig, templates: Arc<dyn TemplateStore + Send + Sync>) -> Self {
        let converter = ConverterInvoker::new(
            default_candidates(config.converter_path.as_deref()),
            config.converter_timeout,
        );
        let pipeline = ConversionPipeline::new(ArtifactStore::new(config.generated_dir()), converter);

        let template_cache = Cache::builder()
            .time_to_live(Duration::from_secs(10 * 60))
            .max_capacity(1000)
            .build();

        Self {
            config: Arc::new(config),
            templates,
            template_cache,
            pipeline: Arc::new(pipeline),
        }
    }

    /// Look a template up, going through the cache first.
    pub async fn get_template(&self, id: &Uuid) -> Result<Option<Template>, StoreError> {
        if let Some(template) = self.template_cache.get(id).await {
            log::debug!("Template {} served from cache", id);
            return Ok(Some(template));
        }

        let found = self.templates.find_by_id(id).await?;
        if let Some(template) = &found {
            self.template_cache.insert(*id, template.clone()).await;
        }
        Ok(found)
    }

    pub async fn insert_template(&self, template: &Template) -> Result<(), StoreError> {
        self.templates.insert(template).await?;
        self.template_cache.insert(template.id, template.clone()).await;
        Ok(())
    }

    pub async fn remove_template(&self, id: &Uuid) -> Result<bool, StoreError> {
        let removed = self.templates.delete(id).await?;
        self.template_cache.invalidate(id).await;
        Ok(removed)
    }
}
