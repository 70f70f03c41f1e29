//! Pipeline run orchestration.
//!
//! A run walks every configured streamer in order. For each one the
//! [`StreamerRunner`] fetches and ranks candidates, filters duplicates, checks
//! the upload spacing and posting window, then drives each admitted clip
//! through the [`ClipStateMachine`] until the streamer's upload budget is
//! spent or a breaker trips.
//!
//! ```text
//! lock → sweep → [streamer → rank → dedup → gate → clip*] → cleanup
//! ```

mod clip_machine;
mod config;
mod runner;
mod streamer;
mod title;
mod types;

pub use clip_machine::{ClipSettings, ClipStateMachine};
pub use config::{LowQualityBreaker, PipelineConfig};
pub use runner::PipelineRunner;
pub use streamer::{BreakerState, Collaborators, StreamerRunner};
pub use title::TitleBuilder;
pub use types::{
    ClipAttempt, ClipOutcome, PipelineError, PipelineRun, RunContext, RunTotals, SkipReason,
    StopReason, StreamerRunResult,
};
