//! Clip domain types shared by every pipeline stage.

mod types;

pub use types::{format_timestamp, parse_timestamp, Clip, ClipRecord};
