//! Exclusion of already-seen and overlapping clips.

mod filter;

pub use filter::{ranges_overlap, DedupFilter};
