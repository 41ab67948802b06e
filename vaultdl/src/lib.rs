//! vaultdl library crate.
//!
//! A concurrency-bounded download scheduler that supervises an external
//! downloader process per job and registers finished downloads in a media
//! library.

pub mod cli;
pub mod config;
pub mod domain;
pub mod downloader;
pub mod error;
pub mod events;
pub mod library;
pub mod logging;
pub mod pipeline;
pub mod scheduler;
pub mod utils;

pub use error::{Error, Result};
