//! Upload spacing and posting-time windows.

mod posting_window;
mod spacing;

pub use posting_window::{PostingWindow, TimeRange};
pub use spacing::UploadScheduler;
