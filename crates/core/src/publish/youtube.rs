//! YouTube Data API v3 publisher.
//!
//! Each streamer publishes to its own channel. Its credentials file holds an
//! OAuth refresh token that is exchanged for an access token when the channel
//! is connected at the start of the streamer's run.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::effects::{YouTubeCommentEffect, YouTubeThumbnailEffect};
use super::error::{EffectError, PublishError};
use super::traits::{Publisher, PublisherProvider, PublishTarget};
use super::types::PublishMetadata;
use crate::config::StreamerConfig;

/// Error reasons YouTube reports when the daily quota is spent.
const QUOTA_REASONS: &[&str] = &["quotaExceeded", "dailyLimitExceeded", "uploadLimitExceeded"];

/// YouTube API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YouTubeConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_upload_base")]
    pub upload_base: String,
    /// public, unlisted or private.
    #[serde(default = "default_privacy")]
    pub privacy_status: String,
    /// Video category (20 = Gaming).
    #[serde(default = "default_category")]
    pub category_id: String,
    /// Credentials used by streamers without their own.
    #[serde(default)]
    pub default_credentials: Option<PathBuf>,
    /// Comment posted under each upload. Supports `{title}`, `{streamer}`
    /// and `{url}`. No comment when absent.
    #[serde(default)]
    pub comment_template: Option<String>,
    /// Set the source clip thumbnail as the video thumbnail.
    #[serde(default)]
    pub thumbnails: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_api_base() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}

fn default_upload_base() -> String {
    "https://www.googleapis.com/upload/youtube/v3".to_string()
}

fn default_privacy() -> String {
    "public".to_string()
}

fn default_category() -> String {
    "20".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

/// Contents of a per-channel credentials file.
#[derive(Debug, Clone, Deserialize)]
struct ChannelCredentials {
    refresh_token: String,
    /// Overrides the configured OAuth client for this channel.
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
}

/// Connects streamers to their YouTube channels.
pub struct YouTubeProvider {
    client: Client,
    config: YouTubeConfig,
}

impl YouTubeProvider {
    pub fn new(config: YouTubeConfig) -> Result<Self, PublishError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    async fn read_credentials(path: &Path) -> Result<ChannelCredentials, PublishError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            PublishError::AuthError(format!("cannot read credentials {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            PublishError::AuthError(format!("invalid credentials {}: {}", path.display(), e))
        })
    }

    async fn exchange_refresh_token(
        &self,
        creds: &ChannelCredentials,
    ) -> Result<String, PublishError> {
        let client_id = creds.client_id.as_ref().unwrap_or(&self.config.client_id);
        let client_secret = creds
            .client_secret
            .as_ref()
            .unwrap_or(&self.config.client_secret);

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("refresh_token", creds.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::AuthError(format!(
                "token exchange failed: {} - {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| PublishError::AuthError(format!("invalid token response: {}", e)))?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl PublisherProvider for YouTubeProvider {
    async fn connect(&self, streamer: &StreamerConfig) -> Result<PublishTarget, PublishError> {
        let path = streamer
            .credentials
            .as_ref()
            .or(self.config.default_credentials.as_ref())
            .ok_or_else(|| {
                PublishError::AuthError(format!(
                    "no YouTube credentials configured for {}",
                    streamer.name
                ))
            })?;

        let creds = Self::read_credentials(path).await?;
        let access_token = self.exchange_refresh_token(&creds).await?;
        debug!(streamer = %streamer.name, "Connected to YouTube channel");

        let channel = Arc::new(YouTubeChannel {
            client: self.client.clone(),
            config: self.config.clone(),
            access_token,
        });

        let mut target = PublishTarget::new(channel.clone());
        if let Some(template) = &self.config.comment_template {
            target = target.with_effect(Arc::new(YouTubeCommentEffect::new(
                channel.clone(),
                template.clone(),
            )));
        }
        if self.config.thumbnails {
            target = target.with_effect(Arc::new(YouTubeThumbnailEffect::new(channel)));
        }
        Ok(target)
    }
}

/// One authenticated channel.
pub struct YouTubeChannel {
    client: Client,
    config: YouTubeConfig,
    access_token: String,
}

impl YouTubeChannel {
    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    pub(crate) async fn post_comment(&self, video_id: &str, text: &str) -> Result<(), EffectError> {
        let body = serde_json::json!({
            "snippet": {
                "videoId": video_id,
                "topLevelComment": { "snippet": { "textOriginal": text } }
            }
        });
        let response = self
            .client
            .post(format!("{}/commentThreads", self.config.api_base))
            .query(&[("part", "snippet")])
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        Self::effect_status(response).await
    }

    pub(crate) async fn set_thumbnail(
        &self,
        video_id: &str,
        image: Vec<u8>,
        content_type: &str,
    ) -> Result<(), EffectError> {
        let response = self
            .client
            .post(format!("{}/thumbnails/set", self.config.upload_base))
            .query(&[("videoId", video_id)])
            .bearer_auth(&self.access_token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(image)
            .send()
            .await?;
        Self::effect_status(response).await
    }

    async fn effect_status(response: reqwest::Response) -> Result<(), EffectError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(EffectError::Api {
            status: status.as_u16(),
            message,
        })
    }

    fn upload_metadata(&self, metadata: &PublishMetadata) -> serde_json::Value {
        serde_json::json!({
            "snippet": {
                "title": metadata.title,
                "description": metadata.description,
                "tags": metadata.tags,
                "categoryId": self.config.category_id,
            },
            "status": {
                "privacyStatus": self.config.privacy_status,
                "selfDeclaredMadeForKids": false,
            }
        })
    }
}

/// Map an API error response onto the typed publish failures.
pub fn classify_error(status: StatusCode, body: &str) -> PublishError {
    let parsed: Option<ApiErrorBody> = serde_json::from_str(body).ok();
    let reasons: Vec<String> = parsed
        .as_ref()
        .map(|b| b.error.errors.iter().map(|e| e.reason.clone()).collect())
        .unwrap_or_default();
    let message = parsed
        .map(|b| b.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    if status == StatusCode::UNAUTHORIZED {
        return PublishError::AuthError(message);
    }
    if status == StatusCode::FORBIDDEN {
        if reasons.iter().any(|r| QUOTA_REASONS.contains(&r.as_str())) {
            return PublishError::QuotaExhausted(message);
        }
        return PublishError::Forbidden(message);
    }
    PublishError::Other(message)
}

/// `multipart/related` body: JSON metadata part followed by the media part.
fn multipart_related(boundary: &str, metadata: &str, media: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(media.len() + metadata.len() + 256);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n\
             --{boundary}\r\nContent-Type: video/mp4\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(media);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[async_trait]
impl Publisher for YouTubeChannel {
    async fn check_duplicate(&self, title: &str) -> Result<Option<String>, PublishError> {
        let response = self
            .client
            .get(format!("{}/search", self.config.api_base))
            .query(&[
                ("part", "snippet"),
                ("forMine", "true"),
                ("type", "video"),
                ("maxResults", "50"),
                ("q", title),
            ])
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }

        let result: SearchResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Other(format!("invalid search response: {}", e)))?;

        let wanted = title.trim();
        Ok(result
            .items
            .into_iter()
            .find(|item| item.snippet.title.trim().eq_ignore_ascii_case(wanted))
            .and_then(|item| item.id.video_id))
    }

    async fn publish(
        &self,
        path: &Path,
        metadata: &PublishMetadata,
    ) -> Result<Option<String>, PublishError> {
        let media = tokio::fs::read(path)
            .await
            .map_err(|e| PublishError::Other(format!("cannot read {}: {}", path.display(), e)))?;
        let boundary = format!("clipline-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_related(
            &boundary,
            &self.upload_metadata(metadata).to_string(),
            &media,
        );

        let response = self
            .client
            .post(format!("{}/videos", self.config.upload_base))
            .query(&[("uploadType", "multipart"), ("part", "snippet,status")])
            .bearer_auth(&self.access_token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                warn!(title = %metadata.title, error = %e, "Upload request failed");
                return Ok(None);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return match classify_error(status, &body) {
                PublishError::Other(message) => {
                    warn!(title = %metadata.title, %status, %message, "Upload rejected");
                    Ok(None)
                }
                typed => Err(typed),
            };
        }

        match response.json::<VideoResponse>().await {
            Ok(video) => {
                info!(title = %metadata.title, video_id = %video.id, "Uploaded video");
                Ok(Some(video.id))
            }
            Err(e) => {
                warn!(title = %metadata.title, error = %e, "Upload response had no video id");
                Ok(None)
            }
        }
    }
}

// YouTube API response types

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorItem {
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: SearchSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchSnippet {
    title: String,
}

#[derive(Debug, Deserialize)]
struct VideoResponse {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_body(reason: &str) -> String {
        format!(
            r#"{{"error": {{"code": 403, "message": "denied", "errors": [{{"reason": "{}"}}]}}}}"#,
            reason
        )
    }

    #[test]
    fn test_classify_quota() {
        for reason in ["quotaExceeded", "dailyLimitExceeded"] {
            let err = classify_error(StatusCode::FORBIDDEN, &error_body(reason));
            assert_eq!(err, PublishError::QuotaExhausted("denied".to_string()));
        }
    }

    #[test]
    fn test_classify_forbidden_and_auth() {
        let err = classify_error(StatusCode::FORBIDDEN, &error_body("forbidden"));
        assert!(matches!(err, PublishError::Forbidden(_)));

        let err = classify_error(StatusCode::UNAUTHORIZED, "");
        assert_eq!(err, PublishError::AuthError("HTTP 401".to_string()));

        let err = classify_error(StatusCode::INTERNAL_SERVER_ERROR, "oops");
        assert!(matches!(err, PublishError::Other(_)));
    }

    #[test]
    fn test_multipart_related_layout() {
        let body = multipart_related("b", r#"{"k":1}"#, b"VIDEO");
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("--b\r\nContent-Type: application/json"));
        assert!(text.contains("{\"k\":1}\r\n--b\r\nContent-Type: video/mp4\r\n\r\nVIDEO"));
        assert!(text.ends_with("\r\n--b--\r\n"));
    }

    #[test]
    fn test_search_response_parsing() {
        let json = r#"{"items": [
            {"id": {"kind": "youtube#video", "videoId": "abc"}, "snippet": {"title": "Clip | alpha"}}
        ]}"#;
        let parsed: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.items[0].id.video_id.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_connect_without_credentials() {
        let provider = YouTubeProvider::new(YouTubeConfig {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            token_url: default_token_url(),
            api_base: default_api_base(),
            upload_base: default_upload_base(),
            privacy_status: default_privacy(),
            category_id: default_category(),
            default_credentials: None,
            comment_template: None,
            thumbnails: false,
            timeout_secs: 5,
        })
        .unwrap();
        let result = provider
            .connect(&StreamerConfig::new("alpha", "1001"))
            .await;
        assert!(matches!(result, Err(PublishError::AuthError(_))));
    }
}
