//! Text pipeline: HTML extraction, tokenization, stop-word filtering, and
//! stemming.
//!
//! Indexing and querying both go through [`tokenize`], so the two sides
//! always agree on the vocabulary. Documents additionally pass through
//! [`tokenize_document`], which attributes each token occurrence to the
//! nearest enclosing structural tag of interest.

use crate::types::{Posting, Tag};
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use ego_tree::NodeRef;
use scraper::{Html, Node};
use std::collections::{BTreeMap, HashSet};
use unicode_normalization::UnicodeNormalization;

/// Tokens longer than this many bytes are dropped. Guards against
/// pathological inputs like kilobyte-long runs of a single letter.
pub const MAX_TOKEN_LEN: usize = 64;

lazy_static! {
    static ref TOKEN_RE: Regex = Regex::new(r"[\p{L}\p{N}]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","cannot","could",
            "did","do","does","doing","down","during",
            "each","few","for","from","further",
            "had","has","have","having","he","her","here","hers","herself","him","himself","his","how",
            "i","if","in","into","is","it","its","itself",
            "me","more","most","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","should","so","some","such",
            "than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
            "under","until","up","very",
            "was","we","were","what","when","where","which","while","who","whom","why","will","with","would",
            "you","your","yours","yourself","yourselves",
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// Tokenize text into stemmed terms.
///
/// Applies: NFKC normalization, lowercase, split on non-alphanumeric
/// boundaries, drop stop words and tokens outside `2..=MAX_TOKEN_LEN` bytes,
/// stem with the Snowball English stemmer.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    let mut tokens = Vec::new();
    for mat in TOKEN_RE.find_iter(&normalized) {
        let word = mat.as_str();
        if word.len() < 2 || word.len() > MAX_TOKEN_LEN {
            continue;
        }
        if is_stopword(word) {
            continue;
        }
        tokens.push(STEMMER.stem(word).to_string());
    }
    tokens
}

/// Per-token occurrence counts broken down by structural tag.
///
/// Indexed by the `Tag::ALL` order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagCounts([u32; Tag::ALL.len()]);

impl TagCounts {
    /// Record one occurrence under `tag`.
    pub fn add(&mut self, tag: Tag) {
        self.0[tag as usize] += 1;
    }

    /// Total occurrences across all tags.
    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    /// Count for a single tag.
    pub fn count(&self, tag: Tag) -> u32 {
        self.0[tag as usize]
    }

    /// Materialize into a posting for `doc_id`, omitting zero-count tags.
    pub fn into_posting(self, doc_id: crate::types::DocId) -> Posting {
        let tag_frequencies: Vec<(Tag, u32)> = Tag::ALL
            .iter()
            .filter(|tag| self.count(**tag) > 0)
            .map(|tag| (*tag, self.count(*tag)))
            .collect();
        Posting {
            doc_id,
            frequency: self.total(),
            tag_frequencies,
        }
    }
}

/// The tokenized form of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentTokens {
    /// Token -> per-tag counts. Ordered for deterministic downstream
    /// iteration.
    pub counts: BTreeMap<String, TagCounts>,
    /// Document length in tokens.
    pub total_tokens: u32,
}

impl DocumentTokens {
    /// True if the pipeline produced no tokens at all.
    pub fn is_empty(&self) -> bool {
        self.total_tokens == 0
    }
}

/// Extract and tokenize the visible text of an HTML page.
///
/// Each token occurrence is attributed to the nearest enclosing element in
/// the weighted tag set (title, h1-h3, b, strong), or `Tag::Other` for plain
/// body text. Script and style subtrees are invisible and skipped.
pub fn tokenize_document(html: &str) -> DocumentTokens {
    let document = Html::parse_document(html);
    let mut tokens = DocumentTokens::default();
    collect_text(document.tree.root(), Tag::Other, &mut tokens);
    tokens
}

fn collect_text(node: NodeRef<'_, Node>, tag: Tag, out: &mut DocumentTokens) {
    for child in node.children() {
        match child.value() {
            Node::Element(element) => {
                let name = element.name();
                if matches!(name, "script" | "style" | "noscript") {
                    continue;
                }
                let child_tag = Tag::from_element_name(name).unwrap_or(tag);
                collect_text(child, child_tag, out);
            }
            Node::Text(text) => {
                for token in tokenize(&text) {
                    out.counts.entry(token).or_default().add(tag);
                    out.total_tokens += 1;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_basic() {
        let tokens = tokenize("Hello, World!");
        assert_eq!(tokens, vec!["hello", "world"]);
    }

    #[test]
    fn test_tokenize_case_and_punctuation_idempotent() {
        assert_eq!(tokenize("QUICK   Brown!!"), tokenize("quick brown"));
    }

    #[test]
    fn test_tokenize_drops_stopwords_and_short_tokens() {
        // "a" is both a stop word and below the length floor.
        assert!(tokenize("a").is_empty());
        assert_eq!(tokenize("the quick fox"), vec!["quick", "fox"]);
    }

    #[test]
    fn test_tokenize_stems() {
        assert_eq!(tokenize("running dogs"), vec!["run", "dog"]);
    }

    #[test]
    fn test_tokenize_keeps_alphanumeric_runs() {
        assert_eq!(tokenize("test123 456test"), vec!["test123", "456test"]);
    }

    #[test]
    fn test_tokenize_caps_token_length() {
        let long = "a".repeat(MAX_TOKEN_LEN + 1);
        assert!(tokenize(&long).is_empty());
    }

    #[test]
    fn test_document_tags_attributed() {
        let html = "<html><head><title>Search Engines</title></head>\
                    <body><h1>Crawling</h1><p>engines crawl pages</p></body></html>";
        let doc = tokenize_document(html);

        let engine = doc.counts.get("engin").expect("'engin' indexed");
        assert_eq!(engine.count(Tag::Title), 1);
        assert_eq!(engine.count(Tag::Other), 1);

        let crawl = doc.counts.get("crawl").expect("'crawl' indexed");
        assert_eq!(crawl.count(Tag::H1), 1);
        assert_eq!(crawl.count(Tag::Other), 1);
    }

    #[test]
    fn test_document_skips_scripts() {
        let html = "<body><p>visible</p><script>var hidden = 1;</script></body>";
        let doc = tokenize_document(html);
        assert!(doc.counts.contains_key("visibl"));
        assert!(!doc.counts.contains_key("hidden"));
        assert!(!doc.counts.contains_key("var"));
    }

    #[test]
    fn test_document_nested_tag_uses_nearest() {
        let html = "<h1>outer <b>inner</b></h1>";
        let doc = tokenize_document(html);
        assert_eq!(doc.counts.get("outer").unwrap().count(Tag::H1), 1);
        assert_eq!(doc.counts.get("inner").unwrap().count(Tag::B), 1);
    }

    #[test]
    fn test_into_posting_totals() {
        let html = "<title>fox</title><p>fox fox</p>";
        let doc = tokenize_document(html);
        let counts = doc.counts.get("fox").unwrap().clone();
        let posting = counts.into_posting(7);
        assert_eq!(posting.doc_id, 7);
        assert_eq!(posting.frequency, 3);
        assert_eq!(
            posting.tag_frequencies,
            vec![(Tag::Title, 1), (Tag::Other, 2)]
        );
    }
}
