// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Posting-list representations and their uniform cursor contract.
//!
//! Three variants are chosen by term frequency: [`Single`] for a
//! one-document term, [`FlatList`] for a small dense run of varints, and
//! [`SkipList`] (a fixed-block multi-level skip list, Pugh 1990) once the
//! encoded body no longer fits one block. Dispatch between them is a tagged
//! enum, not a trait object: the hot query-time match is then a single
//! branch the compiler lowers to a jump table, with no allocation.
//!
//! [`Single`]: ListType::Single
//! [`FlatList`]: ListType::Flat
//! [`SkipList`]: ListType::Skip

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::varint;

pub const TAG_SINGLE: u8 = 0x01;
pub const TAG_FLAT: u8 = 0x02;
pub const TAG_SKIP: u8 = 0x03;

/// Block header size: `next_block_index` (4 bytes LE) + `block_freq` (1 byte).
const BLOCK_HEADER_LEN: usize = varint::BLOCK_INDEX_BYTES + 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListType {
    Single,
    Flat,
    Skip,
}

impl ListType {
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            TAG_SINGLE => Ok(ListType::Single),
            TAG_FLAT => Ok(ListType::Flat),
            TAG_SKIP => Ok(ListType::Skip),
            other => Err(Error::IndexCorrupt(format!("unknown posting tag 0x{other:02x}"))),
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            ListType::Single => TAG_SINGLE,
            ListType::Flat => TAG_FLAT,
            ListType::Skip => TAG_SKIP,
        }
    }
}

// ============================================================================
// ENCODING (builder side: convert a sorted DocId run into a tagged body)
// ============================================================================

/// Parameters controlling how the builder lays out `SkipList` postings.
#[derive(Clone, Copy, Debug)]
pub struct SkipListLayout {
    pub block_size: u8,
    pub max_level: u8,
}

impl Default for SkipListLayout {
    fn default() -> Self {
        SkipListLayout {
            block_size: 44,
            max_level: 10,
        }
    }
}

struct RawBlocks {
    blocks: Vec<Vec<u8>>,
    next_block_idx: Vec<u32>,
    block_freq: Vec<u8>,
    /// `level_block_idx[0]` is always 0 (the level-0 head block).
    level_block_idx: Vec<u32>,
}

/// Port of the forward, single-pass block/skip-level construction: input
/// DocIds arrive already sorted, so no reordering is ever needed.
fn build_blocks(doc_ids: &[u32], layout: SkipListLayout) -> Result<RawBlocks> {
    let block_size = layout.block_size as usize;
    let max_level = layout.max_level;

    let mut first = Vec::new();
    varint::encode(doc_ids[0], &mut first)?;
    let mut blocks = vec![first];
    let mut next_block_idx = vec![0u32];
    let mut block_freq = vec![1u8];
    let mut level_block_idx = vec![0u32];
    let mut current_block_idx = vec![0u32];

    for &doc_id in &doc_ids[1..] {
        let mut doc_id_bytes = Vec::new();
        varint::encode(doc_id, &mut doc_id_bytes)?;

        let cur0 = current_block_idx[0] as usize;
        if blocks[cur0].len() + doc_id_bytes.len() + varint::BLOCK_INDEX_BYTES + 1 <= block_size {
            blocks[cur0].extend_from_slice(&doc_id_bytes);
            block_freq[cur0] += 1;
            continue;
        }

        let new_block_idx = blocks.len() as u32;
        next_block_idx[cur0] = new_block_idx;
        blocks.push(doc_id_bytes.clone());
        next_block_idx.push(0);
        block_freq.push(1);
        current_block_idx[0] = new_block_idx;

        let mut level = 0u8;
        while level < max_level {
            level += 1;
            let level = level as usize;
            if current_block_idx.len() <= level {
                let new_idx = blocks.len() as u32;
                let mut head = Vec::new();
                varint::encode(doc_ids[0], &mut head)?;
                head.extend_from_slice(&varint::encode_block_index(level_block_idx[level - 1]));
                blocks.push(head);
                level_block_idx.push(new_idx);
                next_block_idx.push(0);
                block_freq.push(1);
                current_block_idx.push(new_idx);
            }

            let skip_block_idx = current_block_idx[level] as usize;
            let fits = blocks[skip_block_idx].len()
                + doc_id_bytes.len()
                + varint::BLOCK_INDEX_BYTES * 2
                + 1
                <= block_size;
            if fits {
                blocks[skip_block_idx].extend_from_slice(&doc_id_bytes);
                blocks[skip_block_idx]
                    .extend_from_slice(&varint::encode_block_index(current_block_idx[level - 1]));
                block_freq[skip_block_idx] += 1;
                break;
            }

            let new_idx = blocks.len() as u32;
            next_block_idx[skip_block_idx] = new_idx;
            let mut body = doc_id_bytes.clone();
            body.extend_from_slice(&varint::encode_block_index(current_block_idx[level - 1]));
            blocks.push(body);
            next_block_idx.push(0);
            block_freq.push(1);
            current_block_idx[level] = new_idx;
        }
    }

    Ok(RawBlocks {
        blocks,
        next_block_idx,
        block_freq,
        level_block_idx,
    })
}

/// Choose a representation for `doc_ids` (sorted, non-empty) and encode its
/// tag + body. Mirrors the original's `BlockSkipList.from_list`: build the
/// block structure first, then downgrade to `Single`/`Flat` if it turns out
/// trivial — a single entry, or a structure that never needed a second
/// level because everything fit in one block.
pub fn encode_posting(doc_ids: &[u32], layout: SkipListLayout) -> Result<(u8, Vec<u8>)> {
    assert!(!doc_ids.is_empty(), "posting lists are never empty");

    if doc_ids.len() == 1 {
        let mut body = Vec::new();
        varint::encode(doc_ids[0], &mut body)?;
        return Ok((TAG_SINGLE, body));
    }

    let raw = build_blocks(doc_ids, layout)?;

    if raw.level_block_idx.len() == 1 {
        let mut body = Vec::with_capacity(4 + raw.blocks[0].len());
        body.extend_from_slice(&(doc_ids.len() as u32).to_le_bytes());
        body.extend_from_slice(&raw.blocks[0]);
        return Ok((TAG_FLAT, body));
    }

    let max_level = (raw.level_block_idx.len() - 1) as u8;
    let mut body = Vec::new();
    body.extend_from_slice(&(doc_ids.len() as u32).to_le_bytes());
    body.push(layout.block_size);
    body.push(max_level);
    for &idx in &raw.level_block_idx[1..] {
        body.extend_from_slice(&varint::encode_block_index(idx));
    }
    body.extend_from_slice(&(raw.blocks.len() as u32).to_le_bytes());

    let block_size = layout.block_size as usize;
    for (i, block) in raw.blocks.iter().enumerate() {
        let mut b = Vec::with_capacity(block_size);
        b.extend_from_slice(&varint::encode_block_index(raw.next_block_idx[i]));
        b.push(raw.block_freq[i]);
        b.extend_from_slice(block);
        if b.len() > block_size {
            return Err(Error::IndexCorrupt(format!(
                "skip list block {} overflowed configured block size {}",
                i, block_size
            )));
        }
        b.resize(block_size, 0);
        body.extend_from_slice(&b);
    }

    Ok((TAG_SKIP, body))
}

// ============================================================================
// SCANNING (reader side: how many bytes does a body occupy, given its tag)
// ============================================================================

/// Byte length of a `Flat` body's varint array, given its frequency.
fn flat_ids_byte_len(mem: &[u8], offset: usize, freq: u32) -> Result<usize> {
    let mut pos = offset;
    for _ in 0..freq {
        let b0 = *mem
            .get(pos)
            .ok_or_else(|| Error::IndexCorrupt("flat posting: truncated".into()))?;
        pos += varint::encoded_byte_length(b0);
    }
    Ok(pos - offset)
}

struct SkipHeader {
    block_size: u8,
    max_level: u8,
    /// index 0 is always 0 (level-0 head block).
    level_block_idx: Vec<u32>,
    num_blocks: u32,
    /// offset of the first byte of block 0, i.e. right after `num_blocks`.
    blocks_offset: usize,
}

fn parse_skip_header(mem: &[u8], offset: usize) -> Result<SkipHeader> {
    let corrupt = || Error::IndexCorrupt("skip list header: truncated".into());
    let block_size = *mem.get(offset).ok_or_else(corrupt)?;
    let max_level = *mem.get(offset + 1).ok_or_else(corrupt)?;
    let mut level_block_idx = vec![0u32];
    let mut pos = offset + 2;
    for _ in 0..max_level {
        level_block_idx.push(varint::decode_block_index(mem, pos)?);
        pos += varint::BLOCK_INDEX_BYTES;
    }
    let num_blocks = varint::decode_block_index(mem, pos)?;
    pos += varint::BLOCK_INDEX_BYTES;
    Ok(SkipHeader {
        block_size,
        max_level,
        level_block_idx,
        num_blocks,
        blocks_offset: pos,
    })
}

/// Number of bytes from `offset` (the body's first byte, right after any
/// `freq` field) to the end of this term's record. Used only to skip past a
/// record while scanning the file; does not validate its internal structure.
pub fn body_byte_len(mem: &[u8], tag: u8, offset: usize, freq: u32) -> Result<usize> {
    match ListType::from_tag(tag)? {
        ListType::Single => {
            let b0 = *mem
                .get(offset)
                .ok_or_else(|| Error::IndexCorrupt("single posting: truncated".into()))?;
            Ok(varint::encoded_byte_length(b0))
        }
        ListType::Flat => flat_ids_byte_len(mem, offset, freq),
        ListType::Skip => {
            let header = parse_skip_header(mem, offset)?;
            let end = header
                .blocks_offset
                .checked_add(header.block_size as usize * header.num_blocks as usize)
                .ok_or_else(|| Error::IndexCorrupt("skip list: size overflow".into()))?;
            if end > mem.len() {
                return Err(Error::IndexCorrupt(
                    "skip list: blocks extend past end of file".into(),
                ));
            }
            Ok(end - offset)
        }
    }
}

// ============================================================================
// CURSORS
// ============================================================================

pub struct SingleCursor<'a> {
    mem: &'a [u8],
    offset: usize,
    exhausted: bool,
}

impl<'a> SingleCursor<'a> {
    fn get_pos(&self) -> usize {
        self.offset
    }

    fn search(&mut self, target: &[u8], target_off: usize) -> (usize, Ordering) {
        (self.offset, varint::compare(self.mem, self.offset, target, target_off))
    }

    fn next_pos(&mut self) -> (usize, Ordering) {
        if self.exhausted {
            (self.offset, Ordering::Less)
        } else {
            self.exhausted = true;
            (self.offset, Ordering::Less)
        }
    }

    fn decode_all(&self) -> Result<Vec<u32>> {
        Ok(vec![varint::decode(self.mem, self.offset)?.0])
    }
}

pub struct FlatCursor<'a> {
    mem: &'a [u8],
    freq: u32,
    idx: u32,
    pos: usize,
}

impl<'a> FlatCursor<'a> {
    fn get_pos(&self) -> usize {
        self.pos
    }

    fn search(&mut self, target: &[u8], target_off: usize) -> (usize, Ordering) {
        loop {
            let cmp = varint::compare(self.mem, self.pos, target, target_off);
            if cmp != Ordering::Less || self.idx + 1 >= self.freq {
                return (self.pos, cmp);
            }
            self.pos += varint::encoded_byte_length(self.mem[self.pos]);
            self.idx += 1;
        }
    }

    fn next_pos(&mut self) -> (usize, Ordering) {
        if self.idx + 1 >= self.freq {
            (self.pos, Ordering::Less)
        } else {
            self.pos += varint::encoded_byte_length(self.mem[self.pos]);
            self.idx += 1;
            (self.pos, Ordering::Equal)
        }
    }

    fn decode_all(&self) -> Result<Vec<u32>> {
        debug_assert_eq!(self.idx, 0, "decode_all expects a freshly built cursor");
        let mut out = Vec::with_capacity(self.freq as usize);
        let mut pos = self.pos;
        for _ in 0..self.freq {
            let (v, len) = varint::decode(self.mem, pos)?;
            out.push(v);
            pos += len;
        }
        Ok(out)
    }
}

pub struct SkipCursor<'a> {
    mem: &'a [u8],
    block_size: usize,
    max_level: u8,
    level_block_idx: Vec<u32>,
    blocks_offset: usize,
    num_blocks: u32,
    last_block_idx: Vec<u32>,
    last_pos: Vec<usize>,
    last_idx_in_block: Vec<u8>,
}

impl<'a> SkipCursor<'a> {
    fn new(mem: &'a [u8], offset: usize, _freq: u32) -> Result<Self> {
        let header = parse_skip_header(mem, offset)?;
        let levels = header.max_level as usize + 1;
        let mut cursor = SkipCursor {
            mem,
            block_size: header.block_size as usize,
            max_level: header.max_level,
            level_block_idx: header.level_block_idx,
            blocks_offset: header.blocks_offset,
            num_blocks: header.num_blocks,
            last_block_idx: vec![0; levels],
            last_pos: vec![0; levels],
            last_idx_in_block: vec![0; levels],
        };
        cursor.reset();
        Ok(cursor)
    }

    fn reset(&mut self) {
        for level in 0..=self.max_level as usize {
            let block_idx = self.level_block_idx[level];
            self.last_block_idx[level] = block_idx;
            self.last_pos[level] = self.block_pos(block_idx) + BLOCK_HEADER_LEN;
            self.last_idx_in_block[level] = 0;
        }
    }

    fn block_pos(&self, block_idx: u32) -> usize {
        self.blocks_offset + self.block_size * block_idx as usize
    }

    fn block_freq(&self, block_idx: u32) -> u8 {
        self.mem[self.block_pos(block_idx) + varint::BLOCK_INDEX_BYTES]
    }

    fn block_next(&self, block_idx: u32) -> u32 {
        varint::decode_block_index(self.mem, self.block_pos(block_idx)).unwrap_or(0)
    }

    fn get_pos(&self) -> usize {
        self.last_pos[0]
    }

    fn search(&mut self, target: &[u8], target_off: usize) -> (usize, Ordering) {
        let mut level = 0usize;
        for l in 0..=self.max_level as usize {
            level = l;
            if varint::compare(self.mem, self.last_pos[l], target, target_off) != Ordering::Less {
                break;
            }
        }

        let mut block_idx = self.last_block_idx[level];
        let mut pos = self.last_pos[level];
        let mut idx = self.last_idx_in_block[level];
        let mut freq = self.block_freq(block_idx);

        let mut last_pos_local = pos;
        let mut last_idx_local = idx;

        let mut cmp = varint::compare(self.mem, pos, target, target_off);
        if cmp != Ordering::Less {
            return (pos, cmp);
        }

        while level > 0 {
            loop {
                cmp = varint::compare(self.mem, pos, target, target_off);
                match cmp {
                    Ordering::Less => {
                        last_pos_local = pos;
                        last_idx_local = idx;
                        pos += varint::encoded_byte_length(self.mem[pos]) + varint::BLOCK_INDEX_BYTES;
                        idx += 1;
                        if idx >= freq {
                            let next_block_idx = self.block_next(block_idx);
                            if next_block_idx == 0 {
                                pos = last_pos_local;
                                self.last_pos[level] = last_pos_local;
                                self.last_idx_in_block[level] = last_idx_local;
                                break;
                            }
                            let next_pos0 = self.block_pos(next_block_idx) + BLOCK_HEADER_LEN;
                            if varint::compare(self.mem, next_pos0, target, target_off)
                                == Ordering::Greater
                            {
                                pos = last_pos_local;
                                self.last_pos[level] = last_pos_local;
                                self.last_idx_in_block[level] = last_idx_local;
                                break;
                            }
                            block_idx = next_block_idx;
                            pos = next_pos0;
                            idx = 0;
                            freq = self.block_freq(block_idx);
                            self.last_block_idx[level] = block_idx;
                        }
                    }
                    Ordering::Greater => {
                        pos = last_pos_local;
                        self.last_pos[level] = last_pos_local;
                        self.last_idx_in_block[level] = last_idx_local;
                        break;
                    }
                    Ordering::Equal => {
                        self.last_pos[level] = pos;
                        self.last_idx_in_block[level] = last_idx_local;
                        return (pos, cmp);
                    }
                }
            }
            level -= 1;
            let down_ptr_pos = pos + varint::encoded_byte_length(self.mem[pos]);
            let down_block = varint::decode_block_index(self.mem, down_ptr_pos).unwrap_or(0);
            block_idx = down_block;
            pos = self.block_pos(block_idx) + BLOCK_HEADER_LEN;
            idx = 0;
            freq = self.block_freq(block_idx);
            self.last_block_idx[level] = block_idx;
            self.last_pos[level] = pos;
            self.last_idx_in_block[level] = 0;
        }

        loop {
            cmp = varint::compare(self.mem, pos, target, target_off);
            match cmp {
                Ordering::Less => {
                    let advanced = pos + varint::encoded_byte_length(self.mem[pos]);
                    idx += 1;
                    if idx >= freq {
                        let next_block_idx = self.block_next(block_idx);
                        if next_block_idx == 0 {
                            self.last_pos[0] = pos;
                            self.last_idx_in_block[0] = idx - 1;
                            return (pos, cmp);
                        }
                        block_idx = next_block_idx;
                        pos = self.block_pos(block_idx) + BLOCK_HEADER_LEN;
                        idx = 0;
                        freq = self.block_freq(block_idx);
                        self.last_block_idx[0] = block_idx;
                    } else {
                        pos = advanced;
                    }
                }
                _ => {
                    self.last_pos[0] = pos;
                    self.last_idx_in_block[0] = idx;
                    return (pos, cmp);
                }
            }
        }
    }

    fn next_pos(&mut self) -> (usize, Ordering) {
        let block_idx = self.last_block_idx[0];
        let pos = self.last_pos[0];
        let idx = self.last_idx_in_block[0];
        let freq = self.block_freq(block_idx);
        let step = varint::encoded_byte_length(self.mem[pos]);
        let next_idx = idx + 1;
        if next_idx < freq {
            let new_pos = pos + step;
            self.last_pos[0] = new_pos;
            self.last_idx_in_block[0] = next_idx;
            (new_pos, Ordering::Equal)
        } else {
            let next_block_idx = self.block_next(block_idx);
            if next_block_idx == 0 {
                (pos, Ordering::Less)
            } else {
                let new_pos = self.block_pos(next_block_idx) + BLOCK_HEADER_LEN;
                self.last_block_idx[0] = next_block_idx;
                self.last_pos[0] = new_pos;
                self.last_idx_in_block[0] = 0;
                (new_pos, Ordering::Equal)
            }
        }
    }

    fn decode_all(&self) -> Result<Vec<u32>> {
        let mut out = Vec::new();
        let mut block_idx = self.level_block_idx[0];
        loop {
            let block_pos = self.block_pos(block_idx);
            let freq = self.block_freq(block_idx);
            let mut pos = block_pos + BLOCK_HEADER_LEN;
            for _ in 0..freq {
                let (v, len) = varint::decode(self.mem, pos)?;
                out.push(v);
                pos += len;
            }
            let next = self.block_next(block_idx);
            if next == 0 {
                break;
            }
            block_idx = next;
        }
        Ok(out)
    }

    /// Total on-disk block count, for corruption checks during restore.
    pub fn num_blocks(&self) -> u32 {
        self.num_blocks
    }
}

/// A forward-only view into one term's posting list, borrowed from the
/// mapped index file. `search`/`next_pos` never move backwards and never
/// decode a DocId beyond what the comparison needs.
pub enum Cursor<'a> {
    Single(SingleCursor<'a>),
    Flat(FlatCursor<'a>),
    Skip(SkipCursor<'a>),
}

impl<'a> Cursor<'a> {
    pub fn new(mem: &'a [u8], list_type: ListType, offset: usize, freq: u32) -> Result<Self> {
        Ok(match list_type {
            ListType::Single => Cursor::Single(SingleCursor {
                mem,
                offset,
                exhausted: false,
            }),
            ListType::Flat => Cursor::Flat(FlatCursor {
                mem,
                freq,
                idx: 0,
                pos: offset,
            }),
            ListType::Skip => Cursor::Skip(SkipCursor::new(mem, offset, freq)?),
        })
    }

    pub fn get_pos(&self) -> usize {
        match self {
            Cursor::Single(c) => c.get_pos(),
            Cursor::Flat(c) => c.get_pos(),
            Cursor::Skip(c) => c.get_pos(),
        }
    }

    /// Advance forward-or-stay until pointing at the least DocId `>= target`.
    /// Returns the new position and the three-way comparison against
    /// `target`; if the list is exhausted the cursor stops at the last
    /// valid DocId with `Ordering::Less`.
    pub fn search(&mut self, target: &[u8], target_off: usize) -> (usize, Ordering) {
        match self {
            Cursor::Single(c) => c.search(target, target_off),
            Cursor::Flat(c) => c.search(target, target_off),
            Cursor::Skip(c) => c.search(target, target_off),
        }
    }

    /// Advance by exactly one DocId. Returns `Ordering::Less` if the cursor
    /// was already exhausted (position unchanged).
    pub fn next_pos(&mut self) -> (usize, Ordering) {
        match self {
            Cursor::Single(c) => c.next_pos(),
            Cursor::Flat(c) => c.next_pos(),
            Cursor::Skip(c) => c.next_pos(),
        }
    }

    /// Decode every DocId in the list, in ascending order. Used for
    /// single-term queries and for tests; the conjunctive engine never
    /// calls this on its hot path.
    pub fn decode_all(&self) -> Result<Vec<u32>> {
        match self {
            Cursor::Single(c) => c.decode_all(),
            Cursor::Flat(c) => c.decode_all(),
            Cursor::Skip(c) => c.decode_all(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_roundtrip(doc_ids: &[u32], layout: SkipListLayout) -> (u8, Vec<u32>) {
        let (tag, body) = encode_posting(doc_ids, layout).unwrap();
        let list_type = ListType::from_tag(tag).unwrap();
        let offset = match list_type {
            ListType::Single => 0,
            ListType::Flat | ListType::Skip => 4, // skip the freq(u32 LE) field
        };
        let cursor = Cursor::new(&body, list_type, offset, doc_ids.len() as u32).unwrap();
        (tag, cursor.decode_all().unwrap())
    }

    #[test]
    fn single_posting_round_trips() {
        let (tag, ids) = decode_roundtrip(&[42], SkipListLayout::default());
        assert_eq!(tag, TAG_SINGLE);
        assert_eq!(ids, vec![42]);
    }

    #[test]
    fn flat_posting_round_trips() {
        let ids: Vec<u32> = vec![1, 2, 3, 10, 11];
        let (tag, decoded) = decode_roundtrip(&ids, SkipListLayout::default());
        assert_eq!(tag, TAG_FLAT);
        assert_eq!(decoded, ids);
    }

    #[test]
    fn skip_list_round_trips_for_large_run() {
        let ids: Vec<u32> = (0..5000u32).map(|i| i * 2).collect();
        let layout = SkipListLayout::default();
        let (tag, decoded) = decode_roundtrip(&ids, layout);
        assert_eq!(tag, TAG_SKIP);
        assert_eq!(decoded, ids);
    }

    #[test]
    fn search_finds_least_upper_bound() {
        let ids: Vec<u32> = (0..5000u32).map(|i| i * 2).collect();
        let (tag, body) = encode_posting(&ids, SkipListLayout::default()).unwrap();
        let list_type = ListType::from_tag(tag).unwrap();
        let mut cursor = Cursor::new(&body, list_type, 4, ids.len() as u32).unwrap();

        let mut target = Vec::new();
        varint::encode(777, &mut target).unwrap();
        let (pos, cmp) = cursor.search(&target, 0);
        assert_eq!(cmp, Ordering::Greater);
        let (found, _) = varint::decode(&body, pos).unwrap();
        assert_eq!(found, 778);
    }

    #[test]
    fn search_past_end_reports_less() {
        let ids: Vec<u32> = vec![1, 2, 3];
        let (tag, body) = encode_posting(&ids, SkipListLayout::default()).unwrap();
        let list_type = ListType::from_tag(tag).unwrap();
        let mut cursor = Cursor::new(&body, list_type, 4, ids.len() as u32).unwrap();
        let mut target = Vec::new();
        varint::encode(100, &mut target).unwrap();
        let (_, cmp) = cursor.search(&target, 0);
        assert_eq!(cmp, Ordering::Less);
    }
}
