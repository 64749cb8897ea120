// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Environment-driven configuration for the skip-list layout.

use crate::posting::SkipListLayout;

const BLOCK_SIZE_VAR: &str = "PYSEARCHLITE_SKIPLIST_BLOCK_SIZE";
const MAX_LEVEL_VAR: &str = "PYSEARCHLITE_SKIPLIST_MAX_LEVEL";

/// Reads `PYSEARCHLITE_SKIPLIST_BLOCK_SIZE` (default 44) and
/// `PYSEARCHLITE_SKIPLIST_MAX_LEVEL` (default 10) from the environment.
/// Names kept verbatim from the original implementation for on-disk
/// compatibility across ports.
pub fn skip_list_layout_from_env() -> SkipListLayout {
    let default = SkipListLayout::default();
    let block_size = std::env::var(BLOCK_SIZE_VAR)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default.block_size);
    let max_level = std::env::var(MAX_LEVEL_VAR)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default.max_level);
    SkipListLayout {
        block_size,
        max_level,
    }
}

/// Default builder memory budget in bytes (charged at 20 bytes per new
/// term + 10 bytes per additional posting, a deliberate overestimate).
pub const DEFAULT_MEM_BUDGET: usize = 1_000_000_000;

/// Largest number of distinct DocIds a single shard may hold: the 3-byte
/// varint ceiling minus slack, so a shard never forces a 4-byte encoding.
pub const MAX_DOC_IDS_PER_SHARD: u32 = (1 << 21) - 1;
