//! Post-processing of finished downloads.

pub mod artists;
pub mod files;
pub mod metadata;
pub mod postprocess;

pub use artists::{UNKNOWN_ARTIST, normalize_artists, split_artists};
pub use metadata::MediaInfo;
pub use postprocess::PostProcessor;
