// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

use std::io::Write;

use searchlite::builder::Builder;
use searchlite::reader::Reader;
use searchlite::tokenize::tokenize;
use searchlite::Error;

fn build_corpus(dir: &std::path::Path, docs: &[(u32, &str)]) {
    let mut builder = Builder::with_defaults(dir).unwrap();
    for (doc_id, text) in docs {
        builder.add(*doc_id, &tokenize(text)).unwrap();
    }
    builder.save().unwrap();
}

#[test]
fn single_term_queries() {
    let dir = tempfile::tempdir().unwrap();
    build_corpus(
        dir.path(),
        &[
            (1, "hello world"),
            (2, "this is a test"),
            (3, "this is another test"),
        ],
    );
    let reader = Reader::restore(dir.path()).unwrap();
    assert_eq!(reader.search_and(&["hello".into()]).unwrap(), vec![1]);
    assert_eq!(reader.count_and(&["this".into(), "test".into()]).unwrap(), 2);
    assert_eq!(reader.search_and(&["that".into()]).unwrap(), Vec::<u32>::new());
}

#[test]
fn two_term_and_hits_one_intersection() {
    let dir = tempfile::tempdir().unwrap();
    build_corpus(dir.path(), &[(10, "a b c"), (20, "a c d"), (30, "b d")]);
    let reader = Reader::restore(dir.path()).unwrap();
    assert_eq!(
        reader.search_and(&["a".into(), "c".into()]).unwrap(),
        vec![10, 20]
    );
    assert_eq!(reader.count_and(&["b".into(), "d".into()]).unwrap(), 1);
}

#[test]
fn boundary_varint_widths_with_large_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let n = 400_000u32;
    let mut builder = Builder::with_defaults(dir.path()).unwrap();
    for doc_id in 1..=n {
        let unique = format!("uniq{doc_id}");
        builder
            .add(doc_id, &[unique, "common".to_string()])
            .unwrap();
    }
    builder.save().unwrap();

    let reader = Reader::restore(dir.path()).unwrap();
    assert_eq!(reader.count_and(&["common".into()]).unwrap(), n as usize);
    let hits = reader.search_and(&["common".into()]).unwrap();
    let expected: Vec<u32> = (1..=n).collect();
    assert_eq!(hits, expected);
}

#[test]
fn empty_intersection() {
    let dir = tempfile::tempdir().unwrap();
    build_corpus(dir.path(), &[(1, "a"), (2, "b")]);
    let reader = Reader::restore(dir.path()).unwrap();
    assert_eq!(
        reader.search_and(&["a".into(), "b".into()]).unwrap(),
        Vec::<u32>::new()
    );
}

#[test]
fn round_trip_through_fresh_reader() {
    let dir = tempfile::tempdir().unwrap();
    let docs = [
        (0, "rust is fast and safe"),
        (1, "python is slow but friendly"),
        (2, "rust and python can interop"),
    ];
    build_corpus(dir.path(), &docs);

    let first = Reader::restore(dir.path()).unwrap();
    let first_hits = first.search_and(&["rust".into(), "python".into()]).unwrap();
    drop(first);

    let second = Reader::restore(dir.path()).unwrap();
    let second_hits = second.search_and(&["rust".into(), "python".into()]).unwrap();
    assert_eq!(first_hits, second_hits);
    assert_eq!(second_hits, vec![2]);
}

#[test]
fn truncated_index_reports_corruption() {
    let dir = tempfile::tempdir().unwrap();
    build_corpus(dir.path(), &[(0, "hello world"), (1, "goodbye world")]);

    let path = dir.path().join("inverted_index");
    let len = std::fs::metadata(&path).unwrap().len();
    let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(len - 1).unwrap();
    drop(file);

    let err = Reader::restore(dir.path()).unwrap_err();
    assert!(matches!(err, Error::IndexCorrupt(_)));
}

#[test]
fn build_is_deterministic_for_same_input() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let docs = [(0, "alpha beta"), (1, "beta gamma"), (2, "gamma delta alpha")];
    build_corpus(dir_a.path(), &docs);
    build_corpus(dir_b.path(), &docs);

    let bytes_a = std::fs::read(dir_a.path().join("inverted_index")).unwrap();
    let bytes_b = std::fs::read(dir_b.path().join("inverted_index")).unwrap();
    assert_eq!(bytes_a, bytes_b);
}

#[test]
fn cli_build_and_query_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let ndjson_path = dir.path().join("docs.ndjson");
    let mut f = std::fs::File::create(&ndjson_path).unwrap();
    writeln!(f, r#"{{"id": "doc-a", "text": "hello world"}}"#).unwrap();
    writeln!(f, r#"{{"id": "doc-b", "text": "hello rust"}}"#).unwrap();
    drop(f);

    let idx_dir = dir.path().join("idx");
    let bin = env!("CARGO_BIN_EXE_searchlite");
    let status = std::process::Command::new(bin)
        .args(["build", "--input"])
        .arg(&ndjson_path)
        .args(["--output"])
        .arg(&idx_dir)
        .status()
        .unwrap();
    assert!(status.success());

    let mut child = std::process::Command::new(bin)
        .args(["query", "--index"])
        .arg(&idx_dir)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .spawn()
        .unwrap();
    {
        let stdin = child.stdin.as_mut().unwrap();
        writeln!(stdin, "COUNT\thello").unwrap();
        writeln!(stdin, "COUNT\trust").unwrap();
    }
    let output = child.wait_with_output().unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, vec!["2", "1"]);
}

#[test]
fn cli_build_and_query_round_trip_with_shards() {
    let dir = tempfile::tempdir().unwrap();
    let ndjson_path = dir.path().join("docs.ndjson");
    let mut f = std::fs::File::create(&ndjson_path).unwrap();
    for i in 0..5 {
        writeln!(f, r#"{{"id": "doc-{i}", "text": "hello rust doc{i}"}}"#).unwrap();
    }
    drop(f);

    let idx_dir = dir.path().join("idx");
    let bin = env!("CARGO_BIN_EXE_searchlite");
    let status = std::process::Command::new(bin)
        .args(["build", "--input"])
        .arg(&ndjson_path)
        .args(["--output"])
        .arg(&idx_dir)
        .args(["--shards", "2"])
        .status()
        .unwrap();
    assert!(status.success());

    assert!(idx_dir.join("inverted_index_0").exists());
    assert!(idx_dir.join("inverted_index_1").exists());
    assert!(idx_dir.join("inverted_index_2").exists());
    assert!(!idx_dir.join("inverted_index").exists());

    let mut child = std::process::Command::new(bin)
        .args(["query", "--index"])
        .arg(&idx_dir)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .spawn()
        .unwrap();
    {
        let stdin = child.stdin.as_mut().unwrap();
        writeln!(stdin, "COUNT\thello").unwrap();
        writeln!(stdin, "COUNT\tdoc3").unwrap();
    }
    let output = child.wait_with_output().unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, vec!["5", "1"]);
}
