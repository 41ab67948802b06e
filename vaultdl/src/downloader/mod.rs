//! Downloader process supervision.
//!
//! Builds the downloader command line, runs it under a stall watchdog,
//! classifies failures, and hands successful output to the pipeline.

pub mod args;
pub mod classify;
pub mod resolver;
pub mod supervisor;
pub mod utils;

pub use args::{ArgsContext, build_args};
pub use classify::{Classified, ErrorKind, classify};
pub use resolver::{
    BrowserNameResolver, CookieResolver, PathTranscoderResolver, StaticTranscoder,
    TranscoderResolver,
};
pub use supervisor::{Supervisor, SupervisorDeps};
