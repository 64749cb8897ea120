// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! `searchlite` CLI: build and query compact inverted-index files.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use searchlite::builder::Builder;
use searchlite::cli::{Cli, Commands};
use searchlite::doclist::{DocList, DocListBuilder};
use searchlite::error::Result;
use searchlite::reader::Reader;
use searchlite::shard::{self, Engine};
use searchlite::tokenize::tokenize;

/// `id` is the document's external name, not a numeric identifier: DocIds
/// are assigned sequentially in input order, matching the original
/// `index(name, text)` behavior this format was distilled from.
#[derive(Deserialize)]
struct InputDoc {
    id: String,
    text: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Build { input, output, shards } => run_build(&input, &output, shards),
        Commands::Query { index, shards } => run_query(&index, shards),
    };

    if let Err(err) = result {
        tracing::error!(error = %err, "command failed");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn open_input(input: &str) -> Result<Box<dyn BufRead>> {
    if input == "-" {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        Ok(Box::new(BufReader::new(File::open(input)?)))
    }
}

/// With `--shards` omitted, builds one plain `inverted_index` exactly as
/// before. With `--shards <cap>`, every `cap` documents the builder rolls
/// over to a new `inverted_index_<N>` file, each one's DocIds compacted
/// back to 0 with its first global DocId stored as that shard's header
/// offset (see [`Builder::for_shard`]).
fn run_build(input: &str, output: &Path, shards: Option<u32>) -> Result<()> {
    let reader = open_input(input)?;
    let mut doc_list = DocListBuilder::new();
    let mut doc_id = 0u32;

    match shards {
        None => {
            let mut builder = Builder::with_defaults(output)?;
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let doc: InputDoc = serde_json::from_str(&line).map_err(|e| {
                    searchlite::Error::IndexCorrupt(format!("invalid input line: {e}"))
                })?;
                let tokens = tokenize(&doc.text);
                builder.add(doc_id, &tokens)?;
                doc_list.add(doc_id, &doc.id);
                doc_id += 1;
            }
            builder.save()?;
        }
        Some(cap) => {
            let cap = cap.max(1);
            if cap > searchlite::config::MAX_DOC_IDS_PER_SHARD {
                return Err(searchlite::Error::ShardCapTooLarge {
                    cap,
                    max: searchlite::config::MAX_DOC_IDS_PER_SHARD,
                });
            }
            let mut shard_id = 0u32;
            let mut local_id = 0u32;
            let mut builder = Builder::with_defaults(output)?.for_shard(shard_id, 0);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let doc: InputDoc = serde_json::from_str(&line).map_err(|e| {
                    searchlite::Error::IndexCorrupt(format!("invalid input line: {e}"))
                })?;
                let tokens = tokenize(&doc.text);

                if local_id >= cap {
                    builder.save()?;
                    shard_id += 1;
                    local_id = 0;
                    builder = Builder::with_defaults(output)?.for_shard(shard_id, doc_id);
                }
                builder.add(local_id, &tokens)?;
                doc_list.add(doc_id, &doc.id);
                local_id += 1;
                doc_id += 1;
            }
            builder.save()?;
        }
    }

    let count = doc_id as usize;
    doc_list.save(output)?;
    tracing::info!(documents = count, output = %output.display(), "build complete");
    Ok(())
}

/// Either a single unsharded index or a fanned-out multi-shard [`Engine`],
/// behind one interface so `run_query` doesn't need to care which it has.
enum Backend {
    Single(Reader, Option<DocList>),
    Sharded(Engine),
}

impl Backend {
    fn open(index: &Path, shards: Option<u32>) -> Result<Self> {
        let shard_ids = match shards {
            Some(n) => (0..n).collect(),
            None => shard::discover_shards(index)?,
        };
        if shard_ids.is_empty() {
            let reader = Reader::restore(index)?;
            let doc_list = DocList::restore(index).ok();
            Ok(Backend::Single(reader, doc_list))
        } else {
            Ok(Backend::Sharded(Engine::open(index, &shard_ids)?))
        }
    }

    fn count_and(&self, terms: &[String]) -> Result<usize> {
        match self {
            Backend::Single(reader, _) => reader.count_and(terms),
            Backend::Sharded(engine) => engine.count_and(terms),
        }
    }

    fn search_and(&self, terms: &[String]) -> Result<Vec<u32>> {
        match self {
            Backend::Single(reader, _) => reader.search_and(terms),
            Backend::Sharded(engine) => engine.search_and(terms),
        }
    }

    fn doc_name(&self, doc_id: u32) -> Option<&str> {
        match self {
            Backend::Single(_, doc_list) => doc_list.as_ref().and_then(|dl| dl.get(doc_id)),
            Backend::Sharded(engine) => engine.doc_name(doc_id),
        }
    }
}

fn run_query(index: &Path, shards: Option<u32>) -> Result<()> {
    let backend = Backend::open(index, shards)?;
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for line in stdin.lock().lines() {
        let line = line?;
        let Some((command, query_text)) = line.split_once('\t') else {
            continue;
        };
        let terms = tokenize(query_text);

        let answer = match command {
            "COUNT" => backend.count_and(&terms)?,
            "TOP_10" => {
                let hits = backend.search_and(&terms)?;
                for &doc_id in hits.iter().take(10) {
                    if let Some(name) = backend.doc_name(doc_id) {
                        tracing::debug!(doc_id, name, "hit");
                    }
                }
                hits.len().min(10)
            }
            "TOP_10_COUNT" => backend.count_and(&terms)?,
            other => {
                tracing::warn!(command = other, "unknown query command, skipping");
                continue;
            }
        };

        writeln!(out, "{answer}")?;
    }
    Ok(())
}
