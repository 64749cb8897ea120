// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Conjunctive ("AND") query engine.
//!
//! Operand posting lists are sorted by ascending term frequency and
//! intersected with a leap-frog join: the rarest cursor (A) drives the scan,
//! the next-rarest (B) is resynced against it, and once A and B agree every
//! remaining cursor must also agree before a DocId is emitted. No cursor
//! ever decodes a DocId it does not have to, and none ever moves backwards.

use std::cmp::Ordering;

use crate::error::Result;
use crate::posting::{Cursor, ListType};
use crate::varint;

/// One query term's posting-list location, as found in the lexicon.
#[derive(Clone, Copy, Debug)]
pub struct Operand {
    pub freq: u32,
    pub list_type: ListType,
    pub offset: usize,
}

/// Returns the DocIds present in every operand's posting list, ascending.
pub fn search_and(mem: &[u8], mut operands: Vec<Operand>) -> Result<Vec<u32>> {
    if operands.is_empty() || operands.iter().any(|o| o.freq == 0) {
        return Ok(Vec::new());
    }
    if operands.len() == 1 {
        let cursor = Cursor::new(mem, operands[0].list_type, operands[0].offset, operands[0].freq)?;
        return cursor.decode_all();
    }

    operands.sort_by_key(|o| o.freq);
    let mut cursors = operands
        .iter()
        .map(|o| Cursor::new(mem, o.list_type, o.offset, o.freq))
        .collect::<Result<Vec<_>>>()?;

    let positions = leapfrog(mem, &mut cursors)?;
    positions
        .into_iter()
        .map(|pos| Ok(varint::decode(mem, pos)?.0))
        .collect()
}

/// Returns the number of DocIds present in every operand's posting list.
pub fn count_and(mem: &[u8], mut operands: Vec<Operand>) -> Result<usize> {
    if operands.is_empty() || operands.iter().any(|o| o.freq == 0) {
        return Ok(0);
    }
    if operands.len() == 1 {
        return Ok(operands[0].freq as usize);
    }

    operands.sort_by_key(|o| o.freq);
    let mut cursors = operands
        .iter()
        .map(|o| Cursor::new(mem, o.list_type, o.offset, o.freq))
        .collect::<Result<Vec<_>>>()?;

    Ok(leapfrog(mem, &mut cursors)?.len())
}

/// Leap-frog intersection over `cursors`, already sorted by ascending
/// frequency. Returns the byte offset of each matching DocId's encoding in
/// `mem`, in ascending order.
fn leapfrog(mem: &[u8], cursors: &mut [Cursor]) -> Result<Vec<usize>> {
    let mut out = Vec::new();

    'main: loop {
        // Sync the two rarest cursors (A = cursors[0], B = cursors[1]) until
        // they agree on the same DocId or one of them runs out.
        let agreed = loop {
            let pos_a = cursors[0].get_pos();
            let (pos_b, cmp_b) = cursors[1].search(mem, pos_a);
            match cmp_b {
                Ordering::Equal => break pos_b,
                Ordering::Less => return Ok(out),
                Ordering::Greater => {
                    let (_, cmp_a) = cursors[0].search(mem, pos_b);
                    match cmp_a {
                        Ordering::Equal => break pos_b,
                        Ordering::Less => return Ok(out),
                        Ordering::Greater => continue,
                    }
                }
            }
        };

        // A and B agree at `agreed`. Every remaining cursor must also reach
        // that DocId before it counts as a match.
        let mut overshoot = None;
        for cursor in cursors[2..].iter_mut() {
            let (pos, cmp) = cursor.search(mem, agreed);
            match cmp {
                Ordering::Equal => continue,
                Ordering::Less => return Ok(out),
                Ordering::Greater => {
                    overshoot = Some(pos);
                    break;
                }
            }
        }

        if let Some(pos) = overshoot {
            // A tail cursor forced a value past the current A/B agreement:
            // advance A to that position and restart the sync.
            let (_, cmp) = cursors[0].search(mem, pos);
            if cmp == Ordering::Less {
                return Ok(out);
            }
            continue 'main;
        }

        out.push(cursors[0].get_pos());
        let (_, cmp) = cursors[0].next_pos();
        if cmp == Ordering::Less {
            break;
        }
    }

    Ok(out)
}
