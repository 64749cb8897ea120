use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "searchlite",
    about = "Compact inverted-index builder and query tool",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build an index from newline-delimited JSON documents.
    ///
    /// Each input line is a JSON object `{"id": ..., "text": "..."}`. DocIds
    /// are assigned in input order, starting at 0.
    Build {
        /// Input file, or "-" to read from stdin.
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Directory to write `inverted_index` and `doc_list` into.
        #[arg(short, long)]
        output: PathBuf,

        /// Split the corpus into shard files (`inverted_index_0`, ...) of
        /// at most this many documents each, instead of one plain
        /// `inverted_index`. Omit for a single unsharded index.
        #[arg(long, value_name = "DOCS_PER_SHARD")]
        shards: Option<u32>,
    },

    /// Run queries read from stdin, one per line.
    ///
    /// Each line is `COMMAND\tterm1 term2 ...` where COMMAND is one of
    /// `COUNT`, `TOP_10`, or `TOP_10_COUNT`.
    Query {
        /// Directory containing a previously built index.
        #[arg(short, long)]
        index: PathBuf,

        /// Shard count to open (shards 0..N). Omit to auto-detect existing
        /// `inverted_index_<N>` files, falling back to a plain unsharded
        /// `inverted_index` if none are found.
        #[arg(long)]
        shards: Option<u32>,
    },
}
