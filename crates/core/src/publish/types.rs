use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::clip::Clip;

/// Metadata sent with an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

/// What a post-upload effect gets to work with.
#[derive(Debug, Clone)]
pub struct EffectContext {
    pub clip: Clip,
    /// Destination id of the published video.
    pub remote_id: String,
    pub metadata: PublishMetadata,
    /// The uploaded file. Still present while effects run.
    pub media_path: PathBuf,
}

/// Substitute `{name}` placeholders in a single left-to-right pass.
///
/// Substituted values are emitted as-is, so placeholder text inside a value
/// (a clip titled "{streamer}", say) stays literal. Unknown placeholders and
/// stray braces are kept.
pub fn render_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];

        let matched = values.iter().find_map(|(name, value)| {
            rest.strip_prefix('{')
                .and_then(|r| r.strip_prefix(name))
                .and_then(|r| r.strip_prefix('}'))
                .map(|after| (*value, after))
        });
        match matched {
            Some((value, after)) => {
                out.push_str(value);
                rest = after;
            }
            None => {
                out.push('{');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_template() {
        let values = [("title", "gg"), ("streamer", "alpha")];
        assert_eq!(render_template("{title} | {streamer}", &values), "gg | alpha");
        assert_eq!(render_template("{unknown} {title", &values), "{unknown} {title");
        assert_eq!(render_template("{{title}}", &values), "{gg}");
    }

    #[test]
    fn test_render_template_keeps_placeholders_in_values() {
        let values = [("title", "who is {streamer}?"), ("streamer", "alpha")];
        assert_eq!(render_template("{title} {streamer}", &values), "who is {streamer}? alpha");
    }
}
