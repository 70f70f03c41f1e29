//! Publisher used for dry runs without destination credentials.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use super::error::PublishError;
use super::traits::{Publisher, PublisherProvider, PublishTarget};
use super::types::PublishMetadata;
use crate::config::StreamerConfig;

/// Reports no duplicates and never publishes.
pub struct OfflinePublisher;

#[async_trait]
impl Publisher for OfflinePublisher {
    async fn check_duplicate(&self, _title: &str) -> Result<Option<String>, PublishError> {
        Ok(None)
    }

    async fn publish(
        &self,
        _path: &Path,
        _metadata: &PublishMetadata,
    ) -> Result<Option<String>, PublishError> {
        Err(PublishError::Other("offline publisher cannot upload".to_string()))
    }
}

/// Connects every streamer to an [`OfflinePublisher`].
pub struct OfflineProvider;

#[async_trait]
impl PublisherProvider for OfflineProvider {
    async fn connect(&self, _streamer: &StreamerConfig) -> Result<PublishTarget, PublishError> {
        Ok(PublishTarget::new(Arc::new(OfflinePublisher)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_never_publishes() {
        let target = OfflineProvider
            .connect(&StreamerConfig::new("alpha", "1"))
            .await
            .unwrap();
        assert!(target.effects.is_empty());
        assert_eq!(target.publisher.check_duplicate("t").await.unwrap(), None);
        let metadata = PublishMetadata {
            title: "t".to_string(),
            description: String::new(),
            tags: vec![],
        };
        assert!(target
            .publisher
            .publish(Path::new("/x.mp4"), &metadata)
            .await
            .is_err());
    }
}
