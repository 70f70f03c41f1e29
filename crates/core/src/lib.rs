pub mod clip;
pub mod config;
pub mod dedup;
pub mod lock;
pub mod media;
pub mod metrics;
pub mod pipeline;
pub mod publish;
pub mod report;
pub mod scheduler;
pub mod scoring;
pub mod source;
pub mod store;
pub mod testing;

pub use clip::{Clip, ClipRecord};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
    StreamerConfig,
};
pub use dedup::DedupFilter;
pub use lock::{LockError, ProcessLock};
pub use media::{
    ClipWorkspace, FfmpegTransformer, LayoutHints, MediaConfig, MediaDownloader, MediaError,
    MediaTransformer, YtDlpDownloader,
};
pub use pipeline::{
    ClipAttempt, ClipOutcome, Collaborators, LowQualityBreaker, PipelineConfig, PipelineError,
    PipelineRun, PipelineRunner, RunContext, RunTotals, SkipReason, StopReason,
    StreamerRunResult, StreamerRunner,
};
pub use publish::{
    EffectContext, EffectError, OfflineProvider, PostUploadEffect, PublishError, PublishMetadata,
    PublishTarget, Publisher, PublisherProvider, YouTubeConfig, YouTubeProvider,
};
pub use report::{daily_summary, DailySummary};
pub use scheduler::{PostingWindow, TimeRange, UploadScheduler};
pub use scoring::{ScoringConfig, ScoringEngine};
pub use source::{ClipSource, SourceError, TwitchConfig, TwitchSource};
pub use store::{ClipStore, PerformanceHistory, SqliteClipStore, StoreError};
