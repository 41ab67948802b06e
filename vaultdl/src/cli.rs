//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "vaultdl", version, about = "Download media into a local library")]
pub struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a batch of jobs to completion, printing events as JSON lines
    Run {
        /// JSON file holding an array of jobs
        #[arg(short, long)]
        jobs: PathBuf,

        /// JSON settings file
        #[arg(short, long, env = "VAULTDL_SETTINGS")]
        settings: Option<PathBuf>,

        /// Override the number of concurrent downloads
        #[arg(short = 'c', long)]
        concurrency: Option<usize>,

        /// Keep the library in memory instead of the SQLite database
        #[arg(long)]
        memory_store: bool,

        /// Suppress progress events on stdout
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show which external tools would be used
    Tools,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let args = Args::try_parse_from([
            "vaultdl",
            "-v",
            "run",
            "--jobs",
            "jobs.json",
            "-c",
            "4",
            "--memory-store",
        ])
        .unwrap();

        assert!(args.verbose);
        match args.command {
            Commands::Run {
                jobs,
                concurrency,
                memory_store,
                quiet,
                ..
            } => {
                assert_eq!(jobs, PathBuf::from("jobs.json"));
                assert_eq!(concurrency, Some(4));
                assert!(memory_store);
                assert!(!quiet);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
