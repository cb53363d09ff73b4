//! Command-line driver: builds (or reopens) the index for a JSON page
//! corpus, then answers queries.
//!
//! Usage:
//! ```bash
//! cargo run --release --bin pagelens -- \
//!   --source ./developer --data-dir ./pagelens-data --query "quick brown fox" --k 5
//! ```
//!
//! Without `--query`, an interactive prompt reads queries from stdin until
//! `exit`. Environment variables (`REBUILD`, `SOURCE`,
//! `NO_DUPLICATE_DETECTION`, `USE_SPELLCHECK`, `DEBUG`) seed the options;
//! flags override them.

use pagelens::{Index, IndexOptions, Searcher};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

struct Args {
    options: IndexOptions,
    query: Option<String>,
    k: usize,
}

fn parse_args() -> Args {
    let mut options = IndexOptions::from_env();
    let mut query: Option<String> = None;
    let mut k: usize = 5;

    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--source" => {
                i += 1;
                if let Some(v) = args.get(i) {
                    options.source = PathBuf::from(v);
                }
            }
            "--data-dir" => {
                i += 1;
                if let Some(v) = args.get(i) {
                    options.data_dir = PathBuf::from(v);
                }
            }
            "--index-name" => {
                i += 1;
                if let Some(v) = args.get(i) {
                    options.index_name = v.clone();
                }
            }
            "--rebuild" => options.rebuild = true,
            "--dedup" => options.no_duplicate_detection = false,
            "--spellcheck" => options.use_spellcheck = true,
            "--debug" => options.debug = true,
            "--query" => {
                i += 1;
                query = args.get(i).cloned();
            }
            "--k" => {
                i += 1;
                k = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(5);
            }
            _ => {}
        }
        i += 1;
    }

    Args { options, query, k }
}

fn print_hits(searcher: &Searcher, query: &str, k: usize) -> pagelens::Result<()> {
    let started = std::time::Instant::now();
    let hits = searcher.search(query, k)?;
    let elapsed = started.elapsed();

    if hits.is_empty() {
        println!("no results ({:.1?})", elapsed);
        return Ok(());
    }
    for (rank, hit) in hits.iter().enumerate() {
        println!("{:>2}. {:.4}  {}", rank + 1, hit.score, hit.url);
    }
    println!("{} results ({:.1?})", hits.len(), elapsed);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args();

    let filter = if args.options.debug {
        EnvFilter::new("pagelens=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pagelens=warn"))
    };
    fmt().with_env_filter(filter).init();

    println!("pagelens");
    println!("========");
    println!("source:   {}", args.options.source.display());
    println!("data dir: {}", args.options.data_dir.display());
    println!();

    let index = Index::open_or_build(args.options)?;
    let stats = index.stats()?;
    println!(
        "{} documents, {} unique tokens, {:.1} KB on disk",
        stats.doc_count,
        stats.token_count,
        stats.disk_bytes as f64 / 1024.0
    );

    let searcher = index.searcher()?;

    if let Some(query) = args.query {
        print_hits(&searcher, &query, args.k)?;
        return Ok(());
    }

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("query ('exit' to quit)> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query == "exit" {
            break;
        }
        print_hits(&searcher, query, args.k)?;
    }

    Ok(())
}
