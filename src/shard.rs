// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Multi-shard fan-out.
//!
//! A corpus larger than [`crate::config::MAX_DOC_IDS_PER_SHARD`] DocIds is
//! split across several index files — `inverted_index_0`,
//! `inverted_index_1`, ... — in one index directory. Each shard's postings
//! hold DocIds compacted back to 0, with the shard's first global DocId
//! stored in its own file header ([`crate::reader::Reader::doc_id_offset`]);
//! this keeps every shard's varints small regardless of corpus size. There
//! is a single, shared `doc_list` for the whole corpus, indexed by the true
//! global DocId.
//!
//! [`Engine`] holds one [`Reader`] per shard, fans a query out to all of
//! them, and translates each shard's local hits back to global DocIds by
//! adding that shard's offset before merging: concatenation (for search) or
//! summation (for count), since the shards' DocId ranges are disjoint.

use std::path::Path;

use tracing::debug;

use crate::doclist::DocList;
use crate::error::Result;
use crate::reader::Reader;

/// A query sent to one shard.
#[derive(Clone, Debug)]
pub enum ShardRequest {
    Search(Vec<String>),
    Count(Vec<String>),
}

/// One shard's answer to a [`ShardRequest`], in that shard's own local
/// DocId space — the caller translates to global ids.
#[derive(Clone, Debug)]
pub enum ShardReply {
    Hits(Vec<u32>),
    Count(usize),
}

impl Reader {
    fn handle(&self, req: &ShardRequest) -> Result<ShardReply> {
        match req {
            ShardRequest::Search(terms) => Ok(ShardReply::Hits(self.search_and(terms)?)),
            ShardRequest::Count(terms) => Ok(ShardReply::Count(self.count_and(terms)?)),
        }
    }
}

/// The on-disk file name for shard `shard_id`'s index.
pub fn shard_file_name(shard_id: u32) -> String {
    format!("inverted_index_{shard_id}")
}

/// Scans `idx_dir` for `inverted_index_<N>` files and returns their shard
/// ids in ascending order. An index directory with none of these (just a
/// plain `inverted_index`) is unsharded and has no entries here.
pub fn discover_shards(idx_dir: impl AsRef<Path>) -> Result<Vec<u32>> {
    let mut ids = Vec::new();
    for entry in std::fs::read_dir(idx_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(rest) = name.strip_prefix("inverted_index_") {
            if let Ok(id) = rest.parse::<u32>() {
                ids.push(id);
            }
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

/// A multi-shard index, opened read-only. Owns every shard's memory map and
/// the corpus-wide doc list for the lifetime of the engine.
pub struct Engine {
    readers: Vec<Reader>,
    doc_list: DocList,
}

impl Engine {
    /// Opens one reader per id in `shard_ids` (each `inverted_index_<id>`
    /// under `idx_dir`) plus the shared `doc_list`.
    pub fn open(idx_dir: impl AsRef<Path>, shard_ids: &[u32]) -> Result<Self> {
        let idx_dir = idx_dir.as_ref();
        let mut readers = Vec::with_capacity(shard_ids.len());
        for &id in shard_ids {
            let reader = Reader::restore_shard(idx_dir, id)?;
            debug!(
                shard = id,
                terms = reader.term_count(),
                doc_id_offset = reader.doc_id_offset(),
                "shard opened"
            );
            readers.push(reader);
        }
        let doc_list = DocList::restore(idx_dir)?;
        Ok(Engine { readers, doc_list })
    }

    pub fn shard_count(&self) -> usize {
        self.readers.len()
    }

    /// Runs `terms` as a conjunctive query across every shard and returns
    /// the union of matching global DocIds, ascending.
    pub fn search_and(&self, terms: &[String]) -> Result<Vec<u32>> {
        let replies = self.fan_out(&ShardRequest::Search(terms.to_vec()))?;
        let mut hits = Vec::new();
        for (reader, reply) in self.readers.iter().zip(replies) {
            if let ShardReply::Hits(ids) = reply {
                let offset = reader.doc_id_offset();
                hits.extend(ids.into_iter().map(|id| id + offset));
            }
        }
        hits.sort_unstable();
        Ok(hits)
    }

    /// Total number of matching DocIds across every shard. Counts need no
    /// offset translation: a shard's hit count is the same whether its
    /// DocIds are local or global.
    pub fn count_and(&self, terms: &[String]) -> Result<usize> {
        let replies = self.fan_out(&ShardRequest::Count(terms.to_vec()))?;
        Ok(replies
            .into_iter()
            .map(|r| match r {
                ShardReply::Count(n) => n,
                ShardReply::Hits(h) => h.len(),
            })
            .sum())
    }

    /// Resolves a global DocId to its document name.
    pub fn doc_name(&self, doc_id: u32) -> Option<&str> {
        self.doc_list.get(doc_id)
    }

    #[cfg(feature = "parallel")]
    fn fan_out(&self, req: &ShardRequest) -> Result<Vec<ShardReply>> {
        use rayon::prelude::*;
        self.readers
            .par_iter()
            .map(|reader| reader.handle(req))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn fan_out(&self, req: &ShardRequest) -> Result<Vec<ShardReply>> {
        self.readers.iter().map(|reader| reader.handle(req)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::doclist::DocListBuilder;

    /// Builds a two-shard corpus in one index directory: shard 0 holds
    /// global DocIds 0-1 (local 0-1, offset 0), shard 1 holds global DocIds
    /// 2-3 (local 0-1, offset 2). One doc list spans both, indexed globally.
    fn make_sharded_corpus(dir: &Path) {
        let mut dl = DocListBuilder::new();

        let mut shard0 = Builder::with_defaults(dir).unwrap().for_shard(0, 0);
        shard0.add(0, &["rust".into(), "search".into()]).unwrap();
        shard0.add(1, &["rust".into()]).unwrap();
        shard0.save().unwrap();
        dl.add(0, "a0");
        dl.add(1, "a1");

        let mut shard1 = Builder::with_defaults(dir).unwrap().for_shard(1, 2);
        shard1.add(0, &["rust".into(), "search".into()]).unwrap();
        shard1.add(1, &["other".into()]).unwrap();
        shard1.save().unwrap();
        dl.add(2, "b0");
        dl.add(3, "b1");

        dl.save(dir).unwrap();
    }

    #[test]
    fn merges_hits_across_shards() {
        let dir = tempfile::tempdir().unwrap();
        make_sharded_corpus(dir.path());

        let shard_ids = discover_shards(dir.path()).unwrap();
        assert_eq!(shard_ids, vec![0, 1]);

        let engine = Engine::open(dir.path(), &shard_ids).unwrap();
        assert_eq!(engine.shard_count(), 2);
        let hits = engine.search_and(&["rust".into(), "search".into()]).unwrap();
        assert_eq!(hits, vec![0, 2]);
        assert_eq!(engine.count_and(&["rust".into()]).unwrap(), 3);
        assert_eq!(engine.doc_name(2), Some("b0"));
        assert_eq!(engine.doc_name(99), None);
    }

    #[test]
    fn discover_shards_ignores_unsharded_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = Builder::with_defaults(dir.path()).unwrap();
        b.add(0, &["a".into()]).unwrap();
        b.save().unwrap();
        assert!(discover_shards(dir.path()).unwrap().is_empty());
    }
}
