// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Crate-wide error type.

use thiserror::Error;

/// Errors raised by the codec, builder, reader and query engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A DocId exceeds the varint range (see `varint::MAX_ENCODABLE`).
    #[error("doc id {value} exceeds encodable varint range")]
    EncodingOverflow { value: u64 },

    /// `Builder::add` was called with a DocId not strictly greater than the
    /// last one added to this shard.
    #[error("doc id {got} is not greater than the last added doc id {last}")]
    DocIdOutOfOrder { last: u32, got: u32 },

    /// A `--shards` cap was larger than `config::MAX_DOC_IDS_PER_SHARD`
    /// allows, which would risk forcing a 4-byte varint within a shard.
    #[error("shard cap {cap} exceeds the maximum of {max} doc ids per shard")]
    ShardCapTooLarge { cap: u32, max: u32 },

    /// The reader encountered an unknown tag, a short record, or an offset
    /// outside the mapped region.
    #[error("index corrupt: {0}")]
    IndexCorrupt(String),

    /// spill/merge/convert failed partway through `Builder::save`.
    #[error("index build failed: {0}")]
    IndexBuildFailed(#[source] std::io::Error),

    /// Any other file or memory-map failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
