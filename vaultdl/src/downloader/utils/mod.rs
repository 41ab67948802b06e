//! Building blocks for supervising the downloader process.

mod activity;
mod process_runner;
mod progress_parser;
mod record_reader;

pub use activity::ActivityReader;
pub use process_runner::{
    OutputLine, OutputStream, ProcessOutcome, ProcessReport, ProcessRunner, RunningProcess,
};
pub use progress_parser::parse_progress;
pub use record_reader::RecordReader;
