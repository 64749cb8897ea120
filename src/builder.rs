// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Single-pass-in-memory builder with external balanced pairwise merge.
//!
//! Postings accumulate in a `BTreeMap` (kept sorted by term, for free) until
//! a memory budget is exceeded, at which point the bucket spills to a
//! lexicographically-sorted run file. Runs are merged pairwise until one
//! remains, then converted term-by-term into the final tagged posting
//! representation (see [`crate::posting`]).

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info};

use crate::config::DEFAULT_MEM_BUDGET;
use crate::error::{Error, Result};
use crate::posting::{self, SkipListLayout};

const POS_SIZE: usize = 10;
const TOKEN_SIZE: usize = 20;
const TOKEN_LEN_BYTES: usize = 2;
const RUN_DOCID_BYTES: usize = 4;

/// Accumulates postings for one index shard and writes the final index
/// file (`inverted_index`, or `inverted_index_<shard_id>` when building one
/// shard of a larger corpus — see [`Builder::for_shard`]).
///
/// Every output file opens with a 4-byte little-endian `doc_id_offset`
/// header (0 for an unsharded builder). DocIds passed to [`Builder::add`]
/// are always shard-local, starting back at 0 for each shard: this is what
/// keeps a shard's postings small enough to stay within the 3-byte varint
/// range regardless of how large the global corpus grows. Translating a
/// shard-local DocId back to its true, global one is the caller's job at
/// query time — add the shard's `doc_id_offset` back (see
/// [`crate::shard::Engine`]).
pub struct Builder {
    idx_dir: PathBuf,
    file_name: String,
    doc_id_offset: u32,
    scratch: TempDir,
    raw: BTreeMap<String, Vec<u32>>,
    mem_estimate: usize,
    mem_budget: usize,
    run_count: usize,
    last_doc_id: Option<u32>,
    layout: SkipListLayout,
}

fn write_token(w: &mut impl Write, term: &str) -> std::io::Result<()> {
    let bytes = term.as_bytes();
    debug_assert!(bytes.len() <= u16::MAX as usize, "term too long to encode");
    w.write_all(&(bytes.len() as u16).to_be_bytes())?;
    w.write_all(bytes)
}

/// Reads one term from a run/merge stream. `Ok(None)` means end of file.
fn read_token(r: &mut impl Read) -> std::io::Result<Option<String>> {
    let mut len_buf = [0u8; TOKEN_LEN_BYTES];
    match r.read(&mut len_buf)? {
        0 => return Ok(None),
        TOKEN_LEN_BYTES => {}
        n => {
            // Partial read of the length field itself: fill the rest or fail.
            r.read_exact(&mut len_buf[n..])?;
        }
    }
    let len = u16::from_be_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(Some(String::from_utf8(buf).map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, e)
    })?))
}

fn write_run_record(w: &mut impl Write, term: &str, doc_ids: &[u32]) -> std::io::Result<()> {
    write_token(w, term)?;
    w.write_all(&(doc_ids.len() as u32).to_be_bytes())?;
    for &id in doc_ids {
        w.write_all(&id.to_be_bytes())?;
    }
    Ok(())
}

fn read_run_ids(r: &mut impl Read) -> std::io::Result<Vec<u32>> {
    let mut len_buf = [0u8; RUN_DOCID_BYTES];
    r.read_exact(&mut len_buf)?;
    let count = u32::from_be_bytes(len_buf) as usize;
    let mut ids = Vec::with_capacity(count);
    let mut id_buf = [0u8; RUN_DOCID_BYTES];
    for _ in 0..count {
        r.read_exact(&mut id_buf)?;
        ids.push(u32::from_be_bytes(id_buf));
    }
    Ok(ids)
}

/// Copies one term's doc-id run verbatim from `src` to `dst` (the term
/// itself has already been read off `src`).
fn copy_run_ids(w: &mut impl Write, r: &mut impl Read) -> std::io::Result<()> {
    let mut len_buf = [0u8; RUN_DOCID_BYTES];
    r.read_exact(&mut len_buf)?;
    w.write_all(&len_buf)?;
    let count = u32::from_be_bytes(len_buf) as usize;
    let mut buf = vec![0u8; count * RUN_DOCID_BYTES];
    r.read_exact(&mut buf)?;
    w.write_all(&buf)
}

/// Merges two runs' doc-id lists for the same term. Concatenation suffices:
/// the second run's DocIds are all strictly greater than the first's,
/// because the first run only holds DocIds added before the spill.
fn merge_run_ids(w: &mut impl Write, r1: &mut impl Read, r2: &mut impl Read) -> std::io::Result<()> {
    let mut len1_buf = [0u8; RUN_DOCID_BYTES];
    let mut len2_buf = [0u8; RUN_DOCID_BYTES];
    r1.read_exact(&mut len1_buf)?;
    r2.read_exact(&mut len2_buf)?;
    let count1 = u32::from_be_bytes(len1_buf);
    let count2 = u32::from_be_bytes(len2_buf);
    w.write_all(&(count1 + count2).to_be_bytes())?;
    let mut buf1 = vec![0u8; count1 as usize * RUN_DOCID_BYTES];
    r1.read_exact(&mut buf1)?;
    w.write_all(&buf1)?;
    let mut buf2 = vec![0u8; count2 as usize * RUN_DOCID_BYTES];
    r2.read_exact(&mut buf2)?;
    w.write_all(&buf2)
}

impl Builder {
    /// Creates a builder rooted at `idx_dir` with the given memory budget,
    /// using the skip-list block size and max level from `layout`.
    pub fn new(idx_dir: impl Into<PathBuf>, mem_budget: usize, layout: SkipListLayout) -> Result<Self> {
        let idx_dir = idx_dir.into();
        std::fs::create_dir_all(&idx_dir)?;
        let scratch = TempDir::new()?;
        Ok(Builder {
            idx_dir,
            file_name: "inverted_index".to_string(),
            doc_id_offset: 0,
            scratch,
            raw: BTreeMap::new(),
            mem_estimate: 0,
            mem_budget,
            run_count: 0,
            last_doc_id: None,
            layout,
        })
    }

    /// Builder using the default memory budget and the skip-list layout
    /// read from the environment (`PYSEARCHLITE_SKIPLIST_BLOCK_SIZE`,
    /// `PYSEARCHLITE_SKIPLIST_MAX_LEVEL`), falling back to their defaults.
    pub fn with_defaults(idx_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::new(
            idx_dir,
            DEFAULT_MEM_BUDGET,
            crate::config::skip_list_layout_from_env(),
        )
    }

    /// Redirects this builder's output to `inverted_index_<shard_id>`
    /// instead of the unsharded `inverted_index` file, for building one
    /// shard of a corpus split across several index files in the same
    /// directory. `doc_id_offset` is this shard's first global DocId; it is
    /// written into the shard's file header so a reader can translate the
    /// shard-local DocIds in [`Builder::add`] calls back to their true,
    /// global values.
    pub fn for_shard(mut self, shard_id: u32, doc_id_offset: u32) -> Self {
        self.file_name = crate::shard::shard_file_name(shard_id);
        self.doc_id_offset = doc_id_offset;
        self
    }

    fn run_path(&self, i: usize) -> PathBuf {
        self.scratch.path().join(format!("run_{i}"))
    }

    /// Appends `doc_id` to every distinct token's posting list. DocIds must
    /// be strictly increasing across calls to this builder.
    ///
    /// Ordering is checked here, synchronously. Range is not: a `doc_id`
    /// beyond `varint::MAX_ENCODABLE` is only caught later, when [`Builder::save`]
    /// converts this term's postings and `varint::encode` returns
    /// `Error::EncodingOverflow`. This mirrors the original implementation's
    /// equally deferred behavior; callers that need the overflow attributed
    /// to the offending `add` should range-check `doc_id` themselves before
    /// calling this.
    pub fn add(&mut self, doc_id: u32, tokens: &[String]) -> Result<()> {
        if let Some(last) = self.last_doc_id {
            if doc_id <= last {
                return Err(Error::DocIdOutOfOrder {
                    last,
                    got: doc_id,
                });
            }
        }
        self.last_doc_id = Some(doc_id);

        let mut seen = HashSet::new();
        for token in tokens {
            if !seen.insert(token.as_str()) {
                continue;
            }
            match self.raw.get_mut(token) {
                Some(ids) => {
                    ids.push(doc_id);
                    self.mem_estimate += POS_SIZE;
                }
                None => {
                    self.raw.insert(token.clone(), vec![doc_id]);
                    self.mem_estimate += TOKEN_SIZE;
                }
            }
        }

        if self.mem_estimate > self.mem_budget {
            self.spill()?;
        }
        Ok(())
    }

    /// Writes the in-memory bucket to a new sorted run file and clears it.
    pub fn spill(&mut self) -> Result<()> {
        if self.raw.is_empty() {
            return Ok(());
        }
        let path = self.run_path(self.run_count);
        let mut w = BufWriter::new(File::create(&path)?);
        for (term, ids) in &self.raw {
            write_run_record(&mut w, term, ids)?;
        }
        w.flush()?;
        debug!(run = self.run_count, terms = self.raw.len(), "spilled run");
        self.raw.clear();
        self.mem_estimate = 0;
        self.run_count += 1;
        Ok(())
    }

    /// Balanced pairwise merge of two runs, term by term.
    fn merge_pair(&mut self, a: &Path, b: &Path, out_idx: usize) -> Result<PathBuf> {
        let mut r1 = BufReader::new(File::open(a)?);
        let mut r2 = BufReader::new(File::open(b)?);
        let out_path = self.run_path(out_idx);
        let mut out = BufWriter::new(File::create(&out_path)?);

        let mut token1 = read_token(&mut r1)?;
        let mut token2 = read_token(&mut r2)?;
        loop {
            match (&token1, &token2) {
                (None, None) => break,
                (Some(_), None) => {
                    while let Some(t) = token1.take() {
                        write_token(&mut out, &t)?;
                        copy_run_ids(&mut out, &mut r1)?;
                        token1 = read_token(&mut r1)?;
                    }
                }
                (None, Some(_)) => {
                    while let Some(t) = token2.take() {
                        write_token(&mut out, &t)?;
                        copy_run_ids(&mut out, &mut r2)?;
                        token2 = read_token(&mut r2)?;
                    }
                }
                (Some(t1), Some(t2)) => {
                    if t1 < t2 {
                        write_token(&mut out, t1)?;
                        copy_run_ids(&mut out, &mut r1)?;
                        token1 = read_token(&mut r1)?;
                    } else if t1 > t2 {
                        write_token(&mut out, t2)?;
                        copy_run_ids(&mut out, &mut r2)?;
                        token2 = read_token(&mut r2)?;
                    } else {
                        write_token(&mut out, t1)?;
                        merge_run_ids(&mut out, &mut r1, &mut r2)?;
                        token1 = read_token(&mut r1)?;
                        token2 = read_token(&mut r2)?;
                    }
                }
            }
        }
        out.flush()?;
        std::fs::remove_file(a)?;
        std::fs::remove_file(b)?;
        Ok(out_path)
    }

    /// Runs balanced pairwise merge passes until a single run remains.
    fn merge(&mut self) -> Result<PathBuf> {
        let mut runs: Vec<PathBuf> = (0..self.run_count).map(|i| self.run_path(i)).collect();
        let mut next_idx = self.run_count;
        while runs.len() > 1 {
            let mut merged = Vec::with_capacity(runs.len().div_ceil(2));
            let mut it = runs.into_iter();
            loop {
                match (it.next(), it.next()) {
                    (Some(a), Some(b)) => {
                        merged.push(self.merge_pair(&a, &b, next_idx)?);
                        next_idx += 1;
                    }
                    (Some(a), None) => {
                        merged.push(a);
                        break;
                    }
                    _ => break,
                }
            }
            info!(runs_remaining = merged.len(), "merge pass complete");
            runs = merged;
        }
        Ok(runs.into_iter().next().unwrap_or_else(|| self.run_path(0)))
    }

    /// Streams the final merged run into `out`, choosing a representation
    /// per term and writing the final tagged-record stream.
    fn convert(&self, merged: &Path, out: &mut impl Write) -> Result<()> {
        let mut r = BufReader::new(File::open(merged)?);
        while let Some(term) = read_token(&mut r)? {
            let ids = read_run_ids(&mut r)?;
            write_token(out, &term)?;
            let (tag, body) = posting::encode_posting(&ids, self.layout)?;
            out.write_all(&[tag])?;
            out.write_all(&body)?;
        }
        out.write_all(&0u16.to_be_bytes())?; // terminator: term_len == 0
        Ok(())
    }

    /// Flushes any residual in-memory postings, merges every run, converts
    /// the result, and installs it as `<idx_dir>/<file_name>`.
    pub fn save(self) -> Result<()> {
        self.save_inner().map_err(|e| match e {
            Error::Io(io_err) => Error::IndexBuildFailed(io_err),
            other => other,
        })
    }

    fn save_inner(mut self) -> Result<()> {
        if !self.raw.is_empty() {
            self.spill()?;
        }

        let final_path = self.idx_dir.join(&self.file_name);
        let tmp_final = self.scratch.path().join("final");

        {
            let mut out = BufWriter::new(File::create(&tmp_final)?);
            out.write_all(&self.doc_id_offset.to_le_bytes())?;
            if self.run_count == 0 {
                out.write_all(&0u16.to_be_bytes())?;
            } else {
                let merged = self.merge()?;
                self.convert(&merged, &mut out)?;
                std::fs::remove_file(&merged).ok();
            }
            out.flush()?;
        }

        if let Err(e) = std::fs::rename(&tmp_final, &final_path) {
            // Cross-device rename falls back to copy + remove.
            std::fs::copy(&tmp_final, &final_path).map_err(|_| e)?;
            std::fs::remove_file(&tmp_final).ok();
        }
        info!(path = %final_path.display(), "index saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::Reader;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn builds_and_restores_small_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = Builder::with_defaults(dir.path()).unwrap();
        b.add(1, &tokens(&["hello", "world"])).unwrap();
        b.add(2, &tokens(&["this", "is", "a", "test"])).unwrap();
        b.add(3, &tokens(&["this", "is", "another", "test"])).unwrap();
        b.save().unwrap();

        let reader = Reader::restore(dir.path()).unwrap();
        assert_eq!(reader.search_and(&["hello".into()]).unwrap(), vec![1]);
        assert_eq!(reader.count_and(&["this".into(), "test".into()]).unwrap(), 2);
        assert_eq!(reader.search_and(&["that".into()]).unwrap(), Vec::<u32>::new());
    }

    #[test]
    fn rejects_out_of_order_doc_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = Builder::with_defaults(dir.path()).unwrap();
        b.add(5, &tokens(&["a"])).unwrap();
        let err = b.add(3, &tokens(&["b"])).unwrap_err();
        assert!(matches!(err, Error::DocIdOutOfOrder { last: 5, got: 3 }));
    }

    #[test]
    fn spills_across_memory_budget() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = Builder::new(dir.path(), 64, SkipListLayout::default()).unwrap();
        for doc_id in 1..=50u32 {
            b.add(doc_id, &tokens(&["common", &doc_id.to_string()]))
                .unwrap();
        }
        assert!(b.run_count > 1, "expected at least one spill to occur");
        b.save().unwrap();

        let reader = Reader::restore(dir.path()).unwrap();
        assert_eq!(reader.count_and(&["common".into()]).unwrap(), 50);
    }
}
