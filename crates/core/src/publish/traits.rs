//! Trait definitions for the publish module.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use super::error::{EffectError, PublishError};
use super::types::{EffectContext, PublishMetadata};
use crate::config::StreamerConfig;

/// A destination channel clips are published to.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Remote id of an existing upload with this exact title, if any.
    async fn check_duplicate(&self, title: &str) -> Result<Option<String>, PublishError>;

    /// Upload `path`. `Ok(None)` is a soft failure: nothing was published.
    async fn publish(
        &self,
        path: &Path,
        metadata: &PublishMetadata,
    ) -> Result<Option<String>, PublishError>;
}

/// A best-effort action run after a successful upload.
#[async_trait]
pub trait PostUploadEffect: Send + Sync {
    fn name(&self) -> &str;

    async fn apply(&self, ctx: &EffectContext) -> Result<(), EffectError>;
}

/// A connected publisher plus the effects that follow its uploads.
#[derive(Clone)]
pub struct PublishTarget {
    pub publisher: Arc<dyn Publisher>,
    pub effects: Vec<Arc<dyn PostUploadEffect>>,
}

impl PublishTarget {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self {
            publisher,
            effects: Vec::new(),
        }
    }

    pub fn with_effect(mut self, effect: Arc<dyn PostUploadEffect>) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Opens a streamer's destination channel with its own credentials.
#[async_trait]
pub trait PublisherProvider: Send + Sync {
    async fn connect(&self, streamer: &StreamerConfig) -> Result<PublishTarget, PublishError>;
}
