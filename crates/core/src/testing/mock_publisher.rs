//! Mock publisher, provider and post-upload effect for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::StreamerConfig;
use crate::publish::{
    EffectContext, EffectError, PostUploadEffect, PublishError, PublishMetadata, PublishTarget,
    Publisher, PublisherProvider,
};

use super::mock_media::base_name;

/// Mock implementation of the Publisher trait.
///
/// Publish results are scripted with [`MockPublisher::push_result`]; once the
/// script runs out every upload succeeds with id `yt-<file base name>`.
/// Successful uploads become visible to later duplicate checks.
///
/// ```rust,ignore
/// let publisher = Arc::new(MockPublisher::new());
/// for _ in 0..3 {
///     publisher.push_result(Err(PublishError::Forbidden("x".into()))).await;
/// }
/// ```
#[derive(Debug, Default)]
pub struct MockPublisher {
    /// Lowercased title to remote id.
    existing: Arc<RwLock<HashMap<String, String>>>,
    results: Arc<RwLock<VecDeque<Result<Option<String>, PublishError>>>>,
    duplicate_error: Arc<RwLock<Option<PublishError>>>,
    duplicate_checks: Arc<RwLock<Vec<String>>>,
    publish_calls: Arc<RwLock<Vec<PublishMetadata>>>,
    published: Arc<RwLock<Vec<PublishMetadata>>>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an upload that already exists on the destination.
    pub async fn add_existing(&self, title: &str, remote_id: &str) {
        self.existing
            .write()
            .await
            .insert(title.to_lowercase(), remote_id.to_string());
    }

    /// Queue the result of the next unscripted publish call.
    pub async fn push_result(&self, result: Result<Option<String>, PublishError>) {
        self.results.write().await.push_back(result);
    }

    /// Fail every duplicate check with this error.
    pub async fn fail_duplicate_checks(&self, error: PublishError) {
        *self.duplicate_error.write().await = Some(error);
    }

    pub async fn duplicate_checks(&self) -> Vec<String> {
        self.duplicate_checks.read().await.clone()
    }

    /// Every publish call, successful or not.
    pub async fn publish_calls(&self) -> Vec<PublishMetadata> {
        self.publish_calls.read().await.clone()
    }

    /// Metadata of uploads that returned an id.
    pub async fn published(&self) -> Vec<PublishMetadata> {
        self.published.read().await.clone()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn check_duplicate(&self, title: &str) -> Result<Option<String>, PublishError> {
        self.duplicate_checks.write().await.push(title.to_string());
        if let Some(error) = self.duplicate_error.read().await.clone() {
            return Err(error);
        }
        Ok(self
            .existing
            .read()
            .await
            .get(&title.to_lowercase())
            .cloned())
    }

    async fn publish(
        &self,
        path: &Path,
        metadata: &PublishMetadata,
    ) -> Result<Option<String>, PublishError> {
        self.publish_calls.write().await.push(metadata.clone());
        let scripted = self.results.write().await.pop_front();
        let result = scripted.unwrap_or_else(|| Ok(Some(format!("yt-{}", base_name(path)))));

        if let Ok(Some(remote_id)) = &result {
            self.published.write().await.push(metadata.clone());
            self.add_existing(&metadata.title, remote_id).await;
        }
        result
    }
}

/// Mock implementation of the PublisherProvider trait.
///
/// Hands every streamer the same [`MockPublisher`] plus any configured effects.
pub struct MockPublisherProvider {
    publisher: Arc<MockPublisher>,
    effects: Vec<Arc<dyn PostUploadEffect>>,
    connect_error: Arc<RwLock<Option<PublishError>>>,
    connected: Arc<RwLock<Vec<String>>>,
}

impl MockPublisherProvider {
    pub fn new(publisher: Arc<MockPublisher>) -> Self {
        Self {
            publisher,
            effects: Vec::new(),
            connect_error: Arc::new(RwLock::new(None)),
            connected: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn with_effect(mut self, effect: Arc<dyn PostUploadEffect>) -> Self {
        self.effects.push(effect);
        self
    }

    pub async fn fail_connect(&self, error: PublishError) {
        *self.connect_error.write().await = Some(error);
    }

    /// Streamer names connected, in call order.
    pub async fn connected(&self) -> Vec<String> {
        self.connected.read().await.clone()
    }
}

#[async_trait]
impl PublisherProvider for MockPublisherProvider {
    async fn connect(&self, streamer: &StreamerConfig) -> Result<PublishTarget, PublishError> {
        self.connected.write().await.push(streamer.name.clone());
        if let Some(error) = self.connect_error.read().await.clone() {
            return Err(error);
        }
        let target = self
            .effects
            .iter()
            .cloned()
            .fold(PublishTarget::new(self.publisher.clone()), |t, e| {
                t.with_effect(e)
            });
        Ok(target)
    }
}

/// Mock implementation of the PostUploadEffect trait.
///
/// Stands in for comment, thumbnail and cross-post effects.
#[derive(Debug)]
pub struct MockEffect {
    name: String,
    fail: bool,
    applied: Arc<RwLock<Vec<String>>>,
}

impl MockEffect {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail: false,
            applied: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// An effect that records the call and then fails.
    pub fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }

    /// Remote ids the effect ran for.
    pub async fn applied(&self) -> Vec<String> {
        self.applied.read().await.clone()
    }
}

#[async_trait]
impl PostUploadEffect for MockEffect {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, ctx: &EffectContext) -> Result<(), EffectError> {
        self.applied.write().await.push(ctx.remote_id.clone());
        if self.fail {
            return Err(EffectError::Other(format!("{} failed", self.name)));
        }
        Ok(())
    }
}
