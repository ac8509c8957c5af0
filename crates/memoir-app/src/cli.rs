//! CLI argument definitions for the memoir binary.
//!
//! Uses `clap` with derive macros. Priority resolution for shared knobs:
//! CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Memoir — build and query a memory graph extracted from long-form video.
#[derive(Parser, Debug)]
#[command(name = "memoir", version, about)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ingest a directory of pre-cut clip files into a graph snapshot.
    ///
    /// An existing snapshot is extended (resumable ingestion); a missing
    /// one is created.
    Ingest {
        /// Directory holding the clip files, in name order.
        #[arg(long = "clips")]
        clips: PathBuf,
        /// Graph snapshot to create or extend.
        #[arg(long = "graph")]
        graph: PathBuf,
        /// Nominal clip duration in seconds.
        #[arg(long = "clip-duration", default_value_t = 30.0)]
        clip_duration: f64,
    },

    /// Answer a question against a graph snapshot.
    Ask {
        /// Graph snapshot to query.
        #[arg(long = "graph")]
        graph: PathBuf,
        /// The question.
        question: String,
        /// Candidate query reformulations (>= 1).
        #[arg(long = "query-num")]
        query_num: Option<usize>,
        /// Evidence set size bound.
        #[arg(long = "topk")]
        topk: Option<usize>,
        /// Aggregation mode: argmax, union, or vote.
        #[arg(long = "mode")]
        mode: Option<String>,
        /// Print the full session trace as JSON.
        #[arg(long = "trace")]
        trace: bool,
    },

    /// Re-cluster all identities from accumulated evidence and merge what
    /// the online pass kept apart.
    Refresh {
        /// Graph snapshot to refresh and save back.
        #[arg(long = "graph")]
        graph: PathBuf,
    },

    /// Print node, alias, and statement counts for a snapshot.
    Stats {
        /// Graph snapshot to inspect.
        #[arg(long = "graph")]
        graph: PathBuf,
    },
}

impl Cli {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > MEMOIR_CONFIG env var > ~/.memoir/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("MEMOIR_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level. Priority: --log-level flag > config value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

fn default_config_path() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".memoir").join("config.toml");
    }
    PathBuf::from("config.toml")
}
