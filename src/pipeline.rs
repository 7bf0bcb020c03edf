use async_trait::async_trait;
use tracing::debug;

use crate::api::models::{ExtractedContent, Metadata, ScrapeTarget};
use crate::config::FetchConfig;
use crate::error::ScrapeError;
use crate::extract::{self, ExtractOptions};
use crate::fetcher::Fetcher;

/// Fetch-then-extract for a single page.
#[async_trait]
pub trait ContentPipeline: Send + Sync {
    async fn scrape(&self, target: &ScrapeTarget) -> Result<ExtractedContent, ScrapeError>;
}

pub struct HttpPipeline {
    fetcher: Fetcher,
    options: ExtractOptions,
}

impl HttpPipeline {
    pub fn new(config: &FetchConfig) -> Result<Self, ScrapeError> {
        Ok(HttpPipeline {
            fetcher: Fetcher::new(config)?,
            options: ExtractOptions::default(),
        })
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }
}

#[async_trait]
impl ContentPipeline for HttpPipeline {
    async fn scrape(&self, target: &ScrapeTarget) -> Result<ExtractedContent, ScrapeError> {
        let page = self.fetcher.fetch(&target.url).await?;
        let status_code = page.status;
        debug!(
            url = %target.url,
            content_type = page.content_type.as_deref().unwrap_or("-"),
            bytes = page.body.len(),
            "Fetched document"
        );

        let options = self.options.clone();
        let source_url = target.source_url.clone();
        let format = target.format;

        // HTML parsing is CPU-bound; keep it off the async workers.
        let extraction = tokio::task::spawn_blocking(move || {
            extract::extract(&page.body, &page.final_url, &source_url, format, &options)
        })
        .await??;

        let page_meta = extraction.metadata;
        Ok(ExtractedContent {
            format,
            content: extraction.content,
            metadata: Metadata {
                title: page_meta.title,
                language: page_meta.language,
                description: page_meta.description,
                author: page_meta.author,
                site_name: page_meta.site_name,
                og_locale_alternate: page_meta.og_locale_alternate,
                source_url: target.source_url.clone(),
                status_code,
            },
        })
    }
}
