//! Domain types shared by the scheduler, supervisor and pipeline.

pub mod job;
pub mod media;

pub use job::{DownloadType, Job, Quality, VideoInfo};
pub use media::{Artist, HistoryEntry, HistoryStatus, MediaRecord};
