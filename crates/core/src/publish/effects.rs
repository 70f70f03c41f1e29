//! Post-upload effects for YouTube channels.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::error::EffectError;
use super::traits::PostUploadEffect;
use super::types::{render_template, EffectContext};
use super::youtube::YouTubeChannel;

/// Render a comment template. `{url}` is the source clip page.
pub fn render_comment(template: &str, ctx: &EffectContext) -> String {
    render_template(
        template,
        &[
            ("title", ctx.clip.title.as_str()),
            ("streamer", ctx.clip.streamer.as_str()),
            ("url", ctx.clip.url.as_str()),
        ],
    )
}

/// Posts an engagement comment under the uploaded video.
pub struct YouTubeCommentEffect {
    channel: Arc<YouTubeChannel>,
    template: String,
}

impl YouTubeCommentEffect {
    pub fn new(channel: Arc<YouTubeChannel>, template: String) -> Self {
        Self { channel, template }
    }
}

#[async_trait]
impl PostUploadEffect for YouTubeCommentEffect {
    fn name(&self) -> &str {
        "comment"
    }

    async fn apply(&self, ctx: &EffectContext) -> Result<(), EffectError> {
        let text = render_comment(&self.template, ctx);
        if text.trim().is_empty() {
            return Ok(());
        }
        self.channel.post_comment(&ctx.remote_id, &text).await
    }
}

/// Uses the source clip's thumbnail as the video thumbnail.
pub struct YouTubeThumbnailEffect {
    channel: Arc<YouTubeChannel>,
}

impl YouTubeThumbnailEffect {
    pub fn new(channel: Arc<YouTubeChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl PostUploadEffect for YouTubeThumbnailEffect {
    fn name(&self) -> &str {
        "thumbnail"
    }

    async fn apply(&self, ctx: &EffectContext) -> Result<(), EffectError> {
        let Some(url) = ctx.clip.thumbnail_url.as_deref() else {
            debug!(clip_id = %ctx.clip.id, "No source thumbnail");
            return Ok(());
        };

        let response = self.channel.http().get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EffectError::Api {
                status: status.as_u16(),
                message: format!("thumbnail download from {}", url),
            });
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let image = response.bytes().await?.to_vec();

        self.channel
            .set_thumbnail(&ctx.remote_id, image, &content_type)
            .await
    }
}
