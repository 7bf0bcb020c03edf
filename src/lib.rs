pub mod api;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod pipeline;

use std::sync::Arc;
use config::Config;
use error::ScrapeError;
use pipeline::{ContentPipeline, HttpPipeline};

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Arc<dyn ContentPipeline>,
}

impl AppState {
    /// State backed by the real fetch-and-extract pipeline.
    pub fn new(config: Config) -> Result<Self, ScrapeError> {
        let pipeline = HttpPipeline::new(&config.fetch)?;
        Ok(Self::with_pipeline(config, Arc::new(pipeline)))
    }

    pub fn with_pipeline(config: Config, pipeline: Arc<dyn ContentPipeline>) -> Self {
        AppState {
            config: Arc::new(config),
            pipeline,
        }
    }
}
