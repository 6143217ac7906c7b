//! # Delivery Module
//!
//! Finalizers run once per completed conversation: optional enrichment,
//! HTML rendering, writing the page to a temporary file, sending it and
//! removing the file again.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::dialogue::Record;
use crate::flows::FIELD_LINKS;
use crate::metadata::MetadataProvider;
use crate::render::{
    document_file_name, render_movie, render_recipe, MovieDocument, RecipeDocument, RenderError,
};

#[derive(Debug, thiserror::Error)]
pub enum FinalizeError {
    /// The record cannot produce a meaningful page
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
    #[error("file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// What was sent to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub file_name: String,
    pub bytes: usize,
}

/// Where finished documents go
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Send the file at `path`. It is deleted once this returns.
    async fn send_document(&self, path: &Path) -> anyhow::Result<()>;
}

/// Turns a completed record into a delivered artifact
#[async_trait]
pub trait Finalizer: Send + Sync {
    async fn finalize(
        &self,
        record: &Record,
        sink: &dyn DocumentSink,
    ) -> Result<Delivered, FinalizeError>;
}

/// Write `html` to a temporary file named `file_name`, send it, then remove it
pub async fn deliver_html(
    file_name: &str,
    html: &str,
    sink: &dyn DocumentSink,
) -> Result<Delivered, FinalizeError> {
    let dir = tempfile::Builder::new().prefix("recipe-pages-").tempdir()?;
    let path = dir.path().join(file_name);
    tokio::fs::write(&path, html).await?;
    debug!(temp_path = %path.display(), bytes = html.len(), "Document written");

    let sent = sink.send_document(&path).await;

    // Always clean up the temporary file
    if let Err(cleanup_err) = tokio::fs::remove_file(&path).await {
        error!(temp_path = %path.display(), error = %cleanup_err, "Failed to clean up temporary file");
    } else {
        debug!(temp_path = %path.display(), "Temporary file cleaned up successfully");
    }
    if let Err(cleanup_err) = dir.close() {
        error!(error = %cleanup_err, "Failed to remove temporary directory");
    }

    sent.map_err(|e| FinalizeError::Delivery(e.to_string()))?;
    Ok(Delivered {
        file_name: file_name.to_string(),
        bytes: html.len(),
    })
}

/// Recipe page: title, description, image
#[derive(Debug, Default)]
pub struct RecipeFinalizer;

#[async_trait]
impl Finalizer for RecipeFinalizer {
    async fn finalize(
        &self,
        record: &Record,
        sink: &dyn DocumentSink,
    ) -> Result<Delivered, FinalizeError> {
        let document = RecipeDocument::from_record(record)?;
        let html = render_recipe(&document);
        let delivered = deliver_html(&document_file_name(&document.title), &html, sink).await?;
        info!(file_name = %delivered.file_name, "Recipe page delivered");
        Ok(delivered)
    }
}

/// Movie page: title, links and whatever metadata the provider knows
#[derive(Default)]
pub struct MovieFinalizer {
    metadata: Option<Arc<dyn MetadataProvider>>,
}

impl MovieFinalizer {
    pub fn new(metadata: Option<Arc<dyn MetadataProvider>>) -> Self {
        Self { metadata }
    }
}

#[async_trait]
impl Finalizer for MovieFinalizer {
    async fn finalize(
        &self,
        record: &Record,
        sink: &dyn DocumentSink,
    ) -> Result<Delivered, FinalizeError> {
        let mut document = MovieDocument::from_record(record)?;
        if document.links.is_empty() {
            return Err(FinalizeError::Validation(format!(
                "'{FIELD_LINKS}' needs at least one item"
            )));
        }

        if let Some(provider) = &self.metadata {
            match provider.lookup(&document.title).await {
                Ok(Some(metadata)) => document.metadata = Some(metadata),
                Ok(None) => info!(title = %document.title, "No metadata found, rendering without it"),
                Err(e) => {
                    warn!(title = %document.title, error = %e, "Metadata lookup failed, rendering without it")
                }
            }
        }

        let html = render_movie(&document);
        let delivered = deliver_html(&document_file_name(&document.title), &html, sink).await?;
        info!(file_name = %delivered.file_name, links = document.links.len(), "Movie page delivered");
        Ok(delivered)
    }
}
