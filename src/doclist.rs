// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! `doc_list` companion file: one UTF-8 document name per line, where the
//! line index equals the DocId assigned to that document.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::Result;

/// Accumulates document names in DocId order and writes them to `doc_list`.
#[derive(Default)]
pub struct DocListBuilder {
    names: Vec<String>,
}

impl DocListBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` as the document at `doc_id`. Names must arrive in
    /// increasing DocId order with no gaps, matching `Builder::add`.
    pub fn add(&mut self, doc_id: u32, name: &str) {
        debug_assert_eq!(
            doc_id as usize,
            self.names.len(),
            "doc list entries must arrive in contiguous DocId order"
        );
        self.names.push(name.to_string());
    }

    pub fn save(&self, idx_dir: impl AsRef<Path>) -> Result<()> {
        let path = idx_dir.as_ref().join("doc_list");
        let mut w = BufWriter::new(File::create(path)?);
        for name in &self.names {
            writeln!(w, "{name}")?;
        }
        w.flush()?;
        Ok(())
    }
}

/// Read-only view over a restored `doc_list` file.
pub struct DocList {
    names: Vec<String>,
}

impl DocList {
    pub fn restore(idx_dir: impl AsRef<Path>) -> Result<Self> {
        let path = idx_dir.as_ref().join("doc_list");
        let reader = BufReader::new(File::open(path)?);
        let names = reader.lines().collect::<std::io::Result<Vec<_>>>()?;
        Ok(DocList { names })
    }

    /// The document name for `doc_id`, if present.
    pub fn get(&self, doc_id: u32) -> Option<&str> {
        self.names.get(doc_id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
