//! Planned titles, descriptions and tags for uploads.

use crate::clip::Clip;
use crate::config::{StreamerConfig, TitleConfig};
use crate::publish::{render_template, PublishMetadata};

/// Renders publish metadata from the `[title]` templates.
#[derive(Debug, Clone)]
pub struct TitleBuilder {
    config: TitleConfig,
}

impl TitleBuilder {
    pub fn new(config: TitleConfig) -> Self {
        Self { config }
    }

    /// The title used for both the duplicate check and the upload.
    pub fn planned_title(&self, clip: &Clip) -> String {
        let rendered = clean(&render(&self.config.template, clip));
        let title = if rendered.is_empty() {
            clean(&clip.title)
        } else {
            rendered
        };
        truncate_chars(&title, self.config.max_len)
    }

    pub fn description(&self, clip: &Clip) -> String {
        render(&self.config.description_template, clip)
            .replace(['<', '>'], "")
            .trim()
            .to_string()
    }

    /// Global tags, then streamer tags, then the game name. Case-insensitive
    /// duplicates and blanks are dropped.
    pub fn tags(&self, clip: &Clip, streamer: &StreamerConfig) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        let candidates = self
            .config
            .tags
            .iter()
            .chain(streamer.tags.iter())
            .map(String::as_str)
            .chain(clip.game_name.as_deref());

        for tag in candidates {
            let tag = clean(tag);
            if tag.is_empty() || tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
                continue;
            }
            tags.push(tag);
        }
        tags
    }

    pub fn metadata(&self, clip: &Clip, streamer: &StreamerConfig) -> PublishMetadata {
        PublishMetadata {
            title: self.planned_title(clip),
            description: self.description(clip),
            tags: self.tags(clip, streamer),
        }
    }
}

fn render(template: &str, clip: &Clip) -> String {
    render_template(
        template,
        &[
            ("title", clip.title.as_str()),
            ("streamer", clip.streamer.as_str()),
            ("game", clip.game_name.as_deref().unwrap_or("")),
        ],
    )
}

/// Strip angle brackets and collapse whitespace runs.
fn clean(s: &str) -> String {
    s.replace(['<', '>'], "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate_chars(s: &str, max_len: usize) -> String {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => s[..idx].trim_end().to_string(),
        None => s.to_string(),
    }
}
