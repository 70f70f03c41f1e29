//! Twitch Helix clip source.
//!
//! Uses an app access token from the client-credentials flow. The token is
//! cached until shortly before expiry and refreshed once on a 401.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{ClipSource, SourceError};
use crate::clip::{format_timestamp, Clip};
use crate::config::StreamerConfig;

const PAGE_SIZE: usize = 100;
const GAMES_BATCH: usize = 100;
const MAX_ATTEMPTS: u32 = 3;
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Twitch API client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitchConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Helix base URL (default: https://api.twitch.tv/helix).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// OAuth token endpoint (default: https://id.twitch.tv/oauth2/token).
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Upper bound on clip pages fetched per streamer.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_base_url() -> String {
    "https://api.twitch.tv/helix".to_string()
}

fn default_auth_url() -> String {
    "https://id.twitch.tv/oauth2/token".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_pages() -> u32 {
    5
}

struct AppToken {
    value: String,
    expires_at: Instant,
}

/// Twitch Helix clip source.
pub struct TwitchSource {
    client: Client,
    config: TwitchConfig,
    token: RwLock<Option<AppToken>>,
}

impl TwitchSource {
    pub fn new(config: TwitchConfig) -> Result<Self, SourceError> {
        if config.client_id.is_empty() || config.client_secret.is_empty() {
            return Err(SourceError::AuthFailed(
                "Twitch client id and secret are required".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config,
            token: RwLock::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, SourceError> {
        {
            let token = self.token.read().await;
            if let Some(t) = token.as_ref() {
                if t.expires_at > Instant::now() {
                    return Ok(t.value.clone());
                }
            }
        }
        self.refresh_token().await
    }

    async fn refresh_token(&self) -> Result<String, SourceError> {
        debug!("Requesting Twitch app access token");
        let response = self
            .client
            .post(&self.config.auth_url)
            .query(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::AuthFailed(format!("{} - {}", status, body)));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            SourceError::ParseError(format!("Failed to parse token response: {}", e))
        })?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *self.token.write().await = Some(AppToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    /// Send an authenticated GET, refreshing the token once on 401 and
    /// retrying server errors with a short backoff.
    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Response, SourceError> {
        let mut refreshed = false;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let token = self.access_token().await?;
            let response = self.authorized(self.client.get(url).query(query), &token).send().await;

            let response = match response {
                Ok(r) => r,
                Err(e) if attempt < MAX_ATTEMPTS && (e.is_timeout() || e.is_connect()) => {
                    warn!(url, attempt, error = %e, "Twitch request failed, retrying");
                    tokio::time::sleep(backoff(attempt)).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED && !refreshed {
                debug!("Twitch token rejected, refreshing");
                refreshed = true;
                self.refresh_token().await?;
                continue;
            }
            if status.is_server_error() && attempt < MAX_ATTEMPTS {
                warn!(url, attempt, %status, "Twitch server error, retrying");
                tokio::time::sleep(backoff(attempt)).await;
                continue;
            }
            if status == StatusCode::UNAUTHORIZED {
                return Err(SourceError::AuthFailed("Twitch rejected the app token".to_string()));
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(SourceError::ApiError {
                    status: status.as_u16(),
                    message: body,
                });
            }
            return Ok(response);
        }
    }

    fn authorized(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
        request
            .header("Client-Id", &self.config.client_id)
            .bearer_auth(token)
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(500 * u64::from(attempt))
}

#[async_trait]
impl ClipSource for TwitchSource {
    async fn fetch_candidates(
        &self,
        streamer: &StreamerConfig,
        lookback: chrono::Duration,
    ) -> Result<Vec<Clip>, SourceError> {
        let url = format!("{}/clips", self.config.base_url);
        let started_at = format_timestamp(Utc::now() - lookback);
        let mut clips = Vec::new();
        let mut cursor: Option<String> = None;

        for page in 0..self.config.max_pages {
            let mut query = vec![
                ("broadcaster_id", streamer.twitch_id.clone()),
                ("started_at", started_at.clone()),
                ("first", PAGE_SIZE.to_string()),
            ];
            if let Some(c) = &cursor {
                query.push(("after", c.clone()));
            }

            let response = self.get(&url, &query).await?;
            let body: ClipsResponse = response.json().await.map_err(|e| {
                SourceError::ParseError(format!("Failed to parse clips response: {}", e))
            })?;

            debug!(
                streamer = %streamer.name,
                page,
                count = body.data.len(),
                "Fetched Twitch clips page"
            );
            clips.extend(body.data.into_iter().map(|c| c.into_clip(&streamer.name)));

            cursor = body.pagination.and_then(|p| p.cursor).filter(|c| !c.is_empty());
            if cursor.is_none() {
                break;
            }
        }

        Ok(clips)
    }

    async fn resolve_game_names(
        &self,
        game_ids: &[String],
    ) -> Result<HashMap<String, String>, SourceError> {
        let url = format!("{}/games", self.config.base_url);
        let mut names = HashMap::new();

        let mut ids: Vec<&String> = game_ids.iter().filter(|id| !id.is_empty()).collect();
        ids.sort();
        ids.dedup();

        for batch in ids.chunks(GAMES_BATCH) {
            let query: Vec<(&str, String)> = batch.iter().map(|id| ("id", (*id).clone())).collect();
            let response = self.get(&url, &query).await?;
            let body: GamesResponse = response.json().await.map_err(|e| {
                SourceError::ParseError(format!("Failed to parse games response: {}", e))
            })?;
            names.extend(body.data.into_iter().map(|g| (g.id, g.name)));
        }

        Ok(names)
    }
}

// Twitch API response types

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct ClipsResponse {
    data: Vec<TwitchClip>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwitchClip {
    id: String,
    url: String,
    title: String,
    view_count: u64,
    created_at: DateTime<Utc>,
    duration: f64,
    #[serde(default)]
    game_id: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(default)]
    vod_id: Option<String>,
    #[serde(default)]
    vod_offset: Option<u32>,
}

impl TwitchClip {
    fn into_clip(self, streamer: &str) -> Clip {
        Clip {
            id: self.id,
            streamer: streamer.to_string(),
            title: self.title,
            url: self.url,
            view_count: self.view_count,
            created_at: self.created_at,
            duration_secs: self.duration,
            game_id: self.game_id.filter(|g| !g.is_empty()),
            game_name: None,
            thumbnail_url: self.thumbnail_url,
            vod_id: self.vod_id.filter(|v| !v.is_empty()),
            vod_offset: self.vod_offset,
            score: 0.0,
            remote_id: None,
            fail_count: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GamesResponse {
    data: Vec<TwitchGame>,
}

#[derive(Debug, Deserialize)]
struct TwitchGame {
    id: String,
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_response_mapping() {
        let json = r#"{
            "data": [{
                "id": "AwkwardHelplessSalamanderSwiftRage",
                "url": "https://clips.twitch.tv/AwkwardHelplessSalamanderSwiftRage",
                "broadcaster_name": "alpha",
                "title": "what a play",
                "view_count": 1234,
                "created_at": "2024-06-01T10:00:00Z",
                "duration": 27.5,
                "game_id": "509658",
                "thumbnail_url": "https://example.com/t.jpg",
                "vod_id": "",
                "vod_offset": null
            }],
            "pagination": {}
        }"#;
        let body: ClipsResponse = serde_json::from_str(json).unwrap();
        assert!(body.pagination.unwrap().cursor.is_none());

        let clip = body.data.into_iter().next().unwrap().into_clip("alpha");
        assert_eq!(clip.streamer, "alpha");
        assert_eq!(clip.view_count, 1234);
        assert_eq!(clip.duration_secs, 27.5);
        assert_eq!(clip.game_id.as_deref(), Some("509658"));
        assert!(clip.vod_id.is_none());
        assert!(clip.vod_range().is_none());
    }

    #[test]
    fn test_new_requires_credentials() {
        let result = TwitchSource::new(TwitchConfig {
            client_id: "id".to_string(),
            client_secret: String::new(),
            base_url: default_base_url(),
            auth_url: default_auth_url(),
            timeout_secs: 5,
            max_pages: 1,
        });
        assert!(matches!(result, Err(SourceError::AuthFailed(_))));
    }

    #[test]
    fn test_backoff_grows() {
        assert!(backoff(2) > backoff(1));
    }
}
