//! Mock clip source for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::clip::Clip;
use crate::config::StreamerConfig;
use crate::source::{ClipSource, SourceError};

/// Mock implementation of the ClipSource trait.
///
/// Returns canned clips per streamer name and records every call:
///
/// ```rust,ignore
/// let source = MockClipSource::new();
/// source.set_clips("alpha", vec![fixtures::clip("c1", "alpha", 100)]).await;
///
/// // run the pipeline...
///
/// assert!(source.resolve_calls().await.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct MockClipSource {
    clips: Arc<RwLock<HashMap<String, Vec<Clip>>>>,
    game_names: Arc<RwLock<HashMap<String, String>>>,
    fetch_calls: Arc<RwLock<Vec<String>>>,
    resolve_calls: Arc<RwLock<Vec<Vec<String>>>>,
    /// Streamer whose fetch fails with an API error.
    failing: Arc<RwLock<Option<String>>>,
    /// Streamer whose fetch panics.
    panicking: Arc<RwLock<Option<String>>>,
}

impl MockClipSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_clips(&self, streamer: &str, clips: Vec<Clip>) {
        self.clips.write().await.insert(streamer.to_string(), clips);
    }

    pub async fn set_game_name(&self, game_id: &str, name: &str) {
        self.game_names
            .write()
            .await
            .insert(game_id.to_string(), name.to_string());
    }

    pub async fn fail_fetch_for(&self, streamer: &str) {
        *self.failing.write().await = Some(streamer.to_string());
    }

    pub async fn panic_on_fetch_for(&self, streamer: &str) {
        *self.panicking.write().await = Some(streamer.to_string());
    }

    /// Streamer names fetched, in call order.
    pub async fn fetch_calls(&self) -> Vec<String> {
        self.fetch_calls.read().await.clone()
    }

    /// Game id batches passed to `resolve_game_names`.
    pub async fn resolve_calls(&self) -> Vec<Vec<String>> {
        self.resolve_calls.read().await.clone()
    }
}

#[async_trait]
impl ClipSource for MockClipSource {
    async fn fetch_candidates(
        &self,
        streamer: &StreamerConfig,
        _lookback: chrono::Duration,
    ) -> Result<Vec<Clip>, SourceError> {
        self.fetch_calls.write().await.push(streamer.name.clone());

        if self.panicking.read().await.as_deref() == Some(streamer.name.as_str()) {
            panic!("mock source panic for {}", streamer.name);
        }
        if self.failing.read().await.as_deref() == Some(streamer.name.as_str()) {
            return Err(SourceError::ApiError {
                status: 503,
                message: "mock source unavailable".to_string(),
            });
        }

        Ok(self
            .clips
            .read()
            .await
            .get(&streamer.name)
            .cloned()
            .unwrap_or_default())
    }

    async fn resolve_game_names(
        &self,
        game_ids: &[String],
    ) -> Result<HashMap<String, String>, SourceError> {
        self.resolve_calls.write().await.push(game_ids.to_vec());
        let names = self.game_names.read().await;
        Ok(game_ids
            .iter()
            .filter_map(|id| names.get(id).map(|n| (id.clone(), n.clone())))
            .collect())
    }
}
