//! Publishing processed clips to a destination platform.
//!
//! The pipeline connects a [`PublisherProvider`] once per streamer and works
//! against the resulting [`PublishTarget`]: a [`Publisher`] for duplicate
//! checks and uploads, plus any [`PostUploadEffect`]s to run after a
//! successful upload.

mod effects;
mod error;
mod offline;
mod traits;
mod types;
mod youtube;

pub use effects::{render_comment, YouTubeCommentEffect, YouTubeThumbnailEffect};
pub use error::{EffectError, PublishError};
pub use offline::{OfflineProvider, OfflinePublisher};
pub use traits::{PostUploadEffect, PublishTarget, Publisher, PublisherProvider};
pub use types::{render_template, EffectContext, PublishMetadata};
pub use youtube::{classify_error, YouTubeChannel, YouTubeConfig, YouTubeProvider};
