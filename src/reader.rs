// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Memory-mapped reader and in-memory lexicon.
//!
//! [`Reader::restore`] maps the finished index file once, reads its 4-byte
//! `doc_id_offset` header, and walks the rest a single time to build a
//! `term -> (freq, list_type, offset)` lexicon. Every [`Cursor`] handed out
//! afterwards borrows from that same mapping, so the reader must outlive
//! every cursor and every query result. `search_and`/`count_and` return
//! shard-local DocIds; translating them back to global ones (by adding
//! [`Reader::doc_id_offset`]) is the caller's job — see
//! [`crate::shard::Engine`].

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::posting::{self, ListType};
use crate::query::{self, Operand};

struct LexiconEntry {
    freq: u32,
    list_type: ListType,
    /// Offset of the body's first byte, right after the stored `freq` field
    /// (Flat/Skip) or right after the tag byte (Single, which has no freq).
    offset: usize,
}

/// A finished index, mapped read-only and ready to query.
pub struct Reader {
    mmap: Mmap,
    lexicon: HashMap<String, LexiconEntry>,
    doc_id_offset: u32,
}

impl Reader {
    /// Opens `<idx_dir>/inverted_index`, maps it, and builds the lexicon.
    pub fn restore(idx_dir: impl AsRef<Path>) -> Result<Self> {
        Self::restore_file(&idx_dir.as_ref().join("inverted_index"))
    }

    /// Opens one shard's index file, `<idx_dir>/inverted_index_<shard_id>`.
    pub fn restore_shard(idx_dir: impl AsRef<Path>, shard_id: u32) -> Result<Self> {
        Self::restore_file(&idx_dir.as_ref().join(crate::shard::shard_file_name(shard_id)))
    }

    fn restore_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // Safety: the mapped file is never mutated concurrently by this
        // process; callers own the file exclusively once build has finished.
        let mmap = unsafe { Mmap::map(&file)? };

        let header = mmap
            .get(0..4)
            .ok_or_else(|| Error::IndexCorrupt("missing doc id offset header".into()))?;
        let doc_id_offset = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);

        let lexicon = Self::build_lexicon(&mmap)?;
        info!(path = %path.display(), terms = lexicon.len(), doc_id_offset, "index restored");
        Ok(Reader {
            mmap,
            lexicon,
            doc_id_offset,
        })
    }

    /// This reader's shard's first global DocId (0 for an unsharded index).
    /// Every DocId returned by [`Reader::search_and`]/[`Reader::count_and`]
    /// is shard-local; add this to recover the true global DocId.
    pub fn doc_id_offset(&self) -> u32 {
        self.doc_id_offset
    }

    fn build_lexicon(mem: &[u8]) -> Result<HashMap<String, LexiconEntry>> {
        let mut lexicon = HashMap::new();
        let mut pos = 4usize; // skip the 4-byte doc_id_offset header
        loop {
            let len_bytes = mem
                .get(pos..pos + 2)
                .ok_or_else(|| Error::IndexCorrupt("lexicon: truncated term length".into()))?;
            let term_len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
            pos += 2;
            if term_len == 0 {
                break; // terminator record
            }

            let term_bytes = mem
                .get(pos..pos + term_len)
                .ok_or_else(|| Error::IndexCorrupt("lexicon: truncated term".into()))?;
            let term = std::str::from_utf8(term_bytes)
                .map_err(|e| Error::IndexCorrupt(format!("lexicon: non-utf8 term: {e}")))?
                .to_string();
            pos += term_len;

            let tag = *mem
                .get(pos)
                .ok_or_else(|| Error::IndexCorrupt("lexicon: missing tag byte".into()))?;
            pos += 1;
            let list_type = ListType::from_tag(tag)?;

            let (freq, body_offset) = match list_type {
                ListType::Single => (1u32, pos),
                ListType::Flat | ListType::Skip => {
                    let freq_bytes = mem
                        .get(pos..pos + 4)
                        .ok_or_else(|| Error::IndexCorrupt("lexicon: truncated freq".into()))?;
                    let freq = u32::from_le_bytes([
                        freq_bytes[0],
                        freq_bytes[1],
                        freq_bytes[2],
                        freq_bytes[3],
                    ]);
                    (freq, pos + 4)
                }
            };

            if body_offset > mem.len() {
                return Err(Error::IndexCorrupt(
                    "lexicon: body offset past end of file".into(),
                ));
            }

            let body_len = posting::body_byte_len(mem, tag, body_offset, freq)?;
            pos = body_offset + body_len;

            debug!(term = %term, freq, "indexed term");
            lexicon.insert(
                term,
                LexiconEntry {
                    freq,
                    list_type,
                    offset: body_offset,
                },
            );
        }
        Ok(lexicon)
    }

    /// Looks up one term's `(freq, list_type, offset)` triple, if present.
    pub fn get(&self, term: &str) -> Option<(u32, ListType, usize)> {
        self.lexicon
            .get(term)
            .map(|e| (e.freq, e.list_type, e.offset))
    }

    fn operands(&self, terms: &[String]) -> Option<Vec<Operand>> {
        terms
            .iter()
            .map(|t| {
                self.lexicon.get(t).map(|e| Operand {
                    freq: e.freq,
                    list_type: e.list_type,
                    offset: e.offset,
                })
            })
            .collect()
    }

    /// DocIds containing every one of `terms`, ascending. A term absent from
    /// the lexicon makes the whole query return no results.
    pub fn search_and(&self, terms: &[String]) -> Result<Vec<u32>> {
        match self.operands(terms) {
            Some(operands) => query::search_and(&self.mmap, operands),
            None => Ok(Vec::new()),
        }
    }

    /// Count of DocIds containing every one of `terms`.
    pub fn count_and(&self, terms: &[String]) -> Result<usize> {
        match self.operands(terms) {
            Some(operands) => query::count_and(&self.mmap, operands),
            None => Ok(0),
        }
    }

    /// Number of distinct terms in the lexicon.
    pub fn term_count(&self) -> usize {
        self.lexicon.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;

    #[test]
    fn unknown_term_yields_empty_results() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = Builder::with_defaults(dir.path()).unwrap();
        b.add(1, &["known".to_string()]).unwrap();
        b.save().unwrap();

        let reader = Reader::restore(dir.path()).unwrap();
        assert_eq!(reader.search_and(&["missing".into()]).unwrap(), Vec::<u32>::new());
        assert_eq!(reader.count_and(&["known".into(), "missing".into()]).unwrap(), 0);
    }

    #[test]
    fn empty_index_has_no_terms() {
        let dir = tempfile::tempdir().unwrap();
        let b = Builder::with_defaults(dir.path()).unwrap();
        b.save().unwrap();
        let reader = Reader::restore(dir.path()).unwrap();
        assert_eq!(reader.term_count(), 0);
    }

    #[test]
    fn unsharded_index_has_zero_offset() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = Builder::with_defaults(dir.path()).unwrap();
        b.add(0, &["a".to_string()]).unwrap();
        b.save().unwrap();
        let reader = Reader::restore(dir.path()).unwrap();
        assert_eq!(reader.doc_id_offset(), 0);
    }

    #[test]
    fn shard_carries_its_own_offset() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = Builder::with_defaults(dir.path()).unwrap().for_shard(3, 600);
        b.add(0, &["a".to_string()]).unwrap();
        b.save().unwrap();
        let reader = Reader::restore_shard(dir.path(), 3).unwrap();
        assert_eq!(reader.doc_id_offset(), 600);
        assert_eq!(reader.search_and(&["a".into()]).unwrap(), vec![0]);
    }
}
