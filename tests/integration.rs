//! Integration tests for the pagelens library.
//!
//! These tests verify full roundtrips: building an index from a JSON page
//! corpus and querying it, plus the on-disk invariants of the final
//! partitioned form.

use pagelens::index::Layout;
use pagelens::partition::{PartitionDirectory, PartitionReader};
use pagelens::vectors::VectorTable;
use pagelens::{Index, IndexOptions};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_page(dir: &Path, file_name: &str, url: &str, html: &str) {
    let body = serde_json::json!({ "url": url, "content": html });
    fs::write(dir.join(file_name), body.to_string()).unwrap();
}

fn quick_fox_corpus(dir: &Path) {
    write_page(dir, "a.json", "http://docs.example/0", "the quick brown fox");
    write_page(dir, "b.json", "http://docs.example/1", "quick brown dogs");
    write_page(dir, "c.json", "http://docs.example/2", "lazy fox");
}

fn options_for(tmp: &TempDir) -> IndexOptions {
    IndexOptions {
        source: tmp.path().join("corpus"),
        data_dir: tmp.path().join("data"),
        ..IndexOptions::default()
    }
}

fn build(tmp: &TempDir, options: IndexOptions) -> Index {
    fs::create_dir_all(tmp.path().join("corpus")).unwrap();
    Index::open_or_build(options).unwrap()
}

#[test]
fn test_ranked_query_roundtrip() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("corpus")).unwrap();
    quick_fox_corpus(&tmp.path().join("corpus"));

    let index = build(&tmp, options_for(&tmp));
    assert_eq!(index.doc_count(), 3);

    let searcher = index.searcher().unwrap();
    let hits = searcher.search("quick fox", 10).unwrap();

    // The document containing both query terms ranks first; the single-term
    // documents follow.
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].url, "http://docs.example/0");
    assert!(hits[0].score > hits[1].score);
    for hit in &hits {
        assert!(hit.score >= 0.0 && hit.score <= 1.0);
    }
}

#[test]
fn test_unknown_token_yields_empty_result() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("corpus")).unwrap();
    quick_fox_corpus(&tmp.path().join("corpus"));

    let index = build(&tmp, options_for(&tmp));
    let searcher = index.searcher().unwrap();

    let hits = searcher.search("nonexistentterm", 10).unwrap();
    assert!(hits.is_empty());
}

#[test]
fn test_stopword_only_query_yields_empty_result() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("corpus")).unwrap();
    quick_fox_corpus(&tmp.path().join("corpus"));

    let index = build(&tmp, options_for(&tmp));
    let searcher = index.searcher().unwrap();

    // "a" tokenizes to nothing at all.
    let hits = searcher.search("a", 10).unwrap();
    assert!(hits.is_empty());
}

#[test]
fn test_pipeline_invariant_across_case_and_punctuation() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("corpus")).unwrap();
    quick_fox_corpus(&tmp.path().join("corpus"));

    let index = build(&tmp, options_for(&tmp));
    let searcher = index.searcher().unwrap();

    let shouty = searcher.search("QUICK   Brown!!", 10).unwrap();
    let plain = searcher.search("quick brown", 10).unwrap();
    assert_eq!(shouty, plain);
    assert!(!plain.is_empty());
}

#[test]
fn test_search_is_deterministic() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("corpus")).unwrap();
    quick_fox_corpus(&tmp.path().join("corpus"));

    let index = build(&tmp, options_for(&tmp));
    let searcher = index.searcher().unwrap();

    let first = searcher.search("quick fox", 10).unwrap();
    let second = searcher.search("quick fox", 10).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_duplicate_suppression_consumes_no_doc_id() {
    let tmp = TempDir::new().unwrap();
    let corpus = tmp.path().join("corpus");
    fs::create_dir_all(&corpus).unwrap();
    write_page(
        &corpus,
        "a.json",
        "http://docs.example/first",
        "some shared page body",
    );
    write_page(
        &corpus,
        "b.json",
        "http://docs.example/second",
        "some shared page body",
    );

    let options = IndexOptions {
        no_duplicate_detection: false,
        ..options_for(&tmp)
    };
    let index = build(&tmp, options);
    assert_eq!(index.doc_count(), 1);

    let searcher = index.searcher().unwrap();
    let hits = searcher.search("shared", 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].url, "http://docs.example/first");
}

#[test]
fn test_title_matches_outrank_body_matches() {
    let tmp = TempDir::new().unwrap();
    let corpus = tmp.path().join("corpus");
    fs::create_dir_all(&corpus).unwrap();
    write_page(
        &corpus,
        "a.json",
        "http://docs.example/title",
        "<title>foxes</title><p>cats</p>",
    );
    write_page(
        &corpus,
        "b.json",
        "http://docs.example/body",
        "<p>foxes cats</p>",
    );
    write_page(
        &corpus,
        "c.json",
        "http://docs.example/other",
        "<p>birds trees</p>",
    );

    let index = build(&tmp, options_for(&tmp));
    let searcher = index.searcher().unwrap();

    let hits = searcher.search("foxes", 10).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].url, "http://docs.example/title");
}

#[test]
fn test_empty_corpus_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let options = options_for(&tmp);
    fs::create_dir_all(tmp.path().join("corpus")).unwrap();
    assert!(Index::open_or_build(options).is_err());
}

#[test]
fn test_malformed_documents_are_skipped_not_fatal() {
    let tmp = TempDir::new().unwrap();
    let corpus = tmp.path().join("corpus");
    fs::create_dir_all(&corpus).unwrap();
    quick_fox_corpus(&corpus);
    fs::write(corpus.join("broken.json"), "{this is not json").unwrap();
    fs::write(corpus.join("keyless.json"), r#"{"content": "no url here"}"#).unwrap();

    let index = build(&tmp, options_for(&tmp));
    assert_eq!(index.doc_count(), 3);
}

fn index_dir_snapshot(layout: &Layout, name: &str) -> Vec<(String, Vec<u8>)> {
    let mut files: Vec<PathBuf> = fs::read_dir(layout.index_dir(name))
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    files.sort();
    files
        .into_iter()
        .map(|path| {
            (
                path.file_name().unwrap().to_string_lossy().into_owned(),
                fs::read(&path).unwrap(),
            )
        })
        .collect()
}

#[test]
fn test_spilled_build_equals_single_flush_build() {
    let corpus_tmp = TempDir::new().unwrap();
    let corpus = corpus_tmp.path().join("corpus");
    fs::create_dir_all(&corpus).unwrap();
    for i in 0..40 {
        write_page(
            &corpus,
            &format!("{:03}.json", i),
            &format!("http://docs.example/{}", i),
            &format!("<p>shared tokens everywhere plus unique{} marker</p>", i),
        );
    }

    let spilled_tmp = TempDir::new().unwrap();
    let spilled = Index::open_or_build(IndexOptions {
        source: corpus.clone(),
        data_dir: spilled_tmp.path().to_path_buf(),
        // Forces a flush roughly every document (6 postings each).
        postings_flush_limit: 6,
        ..IndexOptions::default()
    })
    .unwrap();

    let single_tmp = TempDir::new().unwrap();
    let single = Index::open_or_build(IndexOptions {
        source: corpus,
        data_dir: single_tmp.path().to_path_buf(),
        postings_flush_limit: usize::MAX,
        ..IndexOptions::default()
    })
    .unwrap();

    assert_eq!(spilled.doc_count(), single.doc_count());
    assert_eq!(
        index_dir_snapshot(spilled.layout(), "main"),
        index_dir_snapshot(single.layout(), "main"),
    );
}

#[test]
fn test_rebuild_is_bit_reproducible() {
    let corpus_tmp = TempDir::new().unwrap();
    let corpus = corpus_tmp.path().join("corpus");
    fs::create_dir_all(&corpus).unwrap();
    quick_fox_corpus(&corpus);

    let tmp_a = TempDir::new().unwrap();
    let a = Index::open_or_build(IndexOptions {
        source: corpus.clone(),
        data_dir: tmp_a.path().to_path_buf(),
        ..IndexOptions::default()
    })
    .unwrap();

    let tmp_b = TempDir::new().unwrap();
    let b = Index::open_or_build(IndexOptions {
        source: corpus,
        data_dir: tmp_b.path().to_path_buf(),
        ..IndexOptions::default()
    })
    .unwrap();

    assert_eq!(
        index_dir_snapshot(a.layout(), "main"),
        index_dir_snapshot(b.layout(), "main"),
    );
}

#[test]
fn test_final_partitions_hold_index_invariants() {
    let tmp = TempDir::new().unwrap();
    let corpus = tmp.path().join("corpus");
    fs::create_dir_all(&corpus).unwrap();
    for i in 0..20 {
        write_page(
            &corpus,
            &format!("{:03}.json", i),
            &format!("http://docs.example/{}", i),
            &format!("<p>alpha beta gamma delta epsilon unique{}</p>", i),
        );
    }

    let options = IndexOptions {
        // Small partitions so the directory holds several files.
        partition_target_bytes: 256,
        postings_flush_limit: 16,
        ..options_for(&tmp)
    };
    let index = build(&tmp, options);

    let layout = index.layout();
    let directory = PartitionDirectory::load(&layout.directory_path("main")).unwrap();
    assert!(directory.len() > 1);

    let mut all_tokens: Vec<String> = Vec::new();
    for file_name in directory.file_names() {
        let path = layout.index_dir("main").join(file_name);
        let mut reader = PartitionReader::open(&path).unwrap();
        while let Some((token, entry)) = reader.next_record().unwrap() {
            // df matches the posting list, which ascends strictly by doc_id.
            assert_eq!(entry.df as usize, entry.postings.len());
            assert!(entry
                .postings
                .windows(2)
                .all(|w| w[0].doc_id < w[1].doc_id));
            // The directory resolves every token to the file holding it.
            assert_eq!(directory.locate(&token), Some(file_name));
            all_tokens.push(token);
        }
    }

    // Strictly ascending across the whole directory walk: partitions are
    // internally sorted and pairwise disjoint.
    assert!(all_tokens.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_document_vectors_are_normalized() {
    let tmp = TempDir::new().unwrap();
    let corpus = tmp.path().join("corpus");
    fs::create_dir_all(&corpus).unwrap();
    quick_fox_corpus(&corpus);

    let index = build(&tmp, options_for(&tmp));
    let vectors = VectorTable::load(&index.layout().vectors_path("main")).unwrap();

    assert_eq!(vectors.len(), 3);
    for doc_id in 0..3 {
        let norm = vectors.get(doc_id).unwrap().norm();
        // Unit length, or zero when every term's idf vanished.
        assert!(norm == 0.0 || (norm - 1.0).abs() < 1e-5);
    }
}

#[test]
fn test_ready_index_is_reused_without_rebuild() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("corpus")).unwrap();
    quick_fox_corpus(&tmp.path().join("corpus"));

    let first = build(&tmp, options_for(&tmp));
    let meta_path = first.layout().meta_path("main");
    let before = fs::metadata(&meta_path).unwrap().modified().unwrap();

    // Reopening without the rebuild flag must not touch the artifacts.
    let second = Index::open_or_build(options_for(&tmp)).unwrap();
    let after = fs::metadata(&meta_path).unwrap().modified().unwrap();
    assert_eq!(before, after);
    assert_eq!(first.doc_count(), second.doc_count());
}

#[test]
fn test_missing_partition_degrades_to_not_found() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("corpus")).unwrap();
    quick_fox_corpus(&tmp.path().join("corpus"));

    let index = build(&tmp, options_for(&tmp));
    let searcher = index.searcher().unwrap();

    // Drop every partition file out from under the searcher.
    for entry in fs::read_dir(index.layout().index_dir("main")).unwrap() {
        let path = entry.unwrap().path();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        if name.starts_with("partition_") {
            fs::remove_file(path).unwrap();
        }
    }

    let hits = searcher.search("quick fox", 10).unwrap();
    assert!(hits.is_empty());
}

#[test]
fn test_spellcheck_recovers_zero_hit_queries() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("corpus")).unwrap();
    quick_fox_corpus(&tmp.path().join("corpus"));

    let options = IndexOptions {
        use_spellcheck: true,
        ..options_for(&tmp)
    };
    let index = build(&tmp, options);
    let searcher = index.searcher().unwrap();

    let hits = searcher.search("quikc", 10).unwrap();
    assert!(!hits.is_empty());

    // Off by default: the same misspelling finds nothing.
    let plain_index = Index::open_or_build(options_for(&tmp)).unwrap();
    let plain_searcher = plain_index.searcher().unwrap();
    assert!(plain_searcher.search("quikc", 10).unwrap().is_empty());
}
