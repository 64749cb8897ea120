//! Compact inverted-index engine: varint postings, skip lists, conjunctive
//! queries.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────┐   ┌────────────┐   ┌───────────┐   ┌──────────┐
//! │ tokenize  │──▶│  builder   │──▶│  reader   │──▶│  query   │
//! │ (ASCII    │   │ (SPIMI +   │   │ (mmap +   │   │ (leap-   │
//! │  runs)    │   │  merge)    │   │  lexicon) │   │  frog AND│
//! └───────────┘   └─────┬──────┘   └─────┬─────┘   └──────────┘
//!                       │                │
//!                       ▼                ▼
//!                  posting.rs       varint.rs
//!                (Single/Flat/     (length-prefixed
//!                 SkipList)         big-endian codec)
//! ```
//!
//! `shard` composes many (reader, doc_list) pairs behind one [`Engine`] for
//! corpora too large for a single index file. `doclist` maps DocIds back to
//! document names. `config` reads layout knobs from the environment.
//!
//! # Usage
//!
//! ```ignore
//! use searchlite::{builder::Builder, reader::Reader, tokenize::tokenize};
//!
//! let mut b = Builder::with_defaults("./idx")?;
//! b.add(0, &tokenize("the quick brown fox"))?;
//! b.save()?;
//!
//! let reader = Reader::restore("./idx")?;
//! let hits = reader.search_and(&["quick".to_string(), "fox".to_string()])?;
//! ```

pub mod builder;
pub mod cli;
pub mod config;
pub mod doclist;
pub mod error;
pub mod posting;
pub mod query;
pub mod reader;
pub mod shard;
pub mod tokenize;
pub mod varint;

pub use builder::Builder;
pub use error::{Error, Result};
pub use reader::Reader;
pub use shard::Engine;
