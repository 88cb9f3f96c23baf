use std::env;
use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use indicatif::ProgressBar;

use rank_files::cache::{default_cache_path, Cache, CachedRanker};
use rank_files::document::{load_directory, DEFAULT_MAX_FILES};
use rank_files::rank::{build_ranker, wrap_for_pairwise_comparison, Provider, Ranker};
use rank_files::tournament::{estimated_comparisons, tournament, ComparisonTracker};
use rank_files::ProgressSink;

#[derive(Parser)]
#[command(
    name = "rank-files",
    version,
    about = "Rank files in a directory by an LLM-judged criterion"
)]
struct Args {
    /// Ranking criteria, e.g. "The best document is the one with the most elegant prose."
    criteria: String,

    /// Path to directory containing files to rank
    input_dir: PathBuf,

    /// How many top documents to find
    #[arg(short = 'k', long = "top-k", default_value_t = 10)]
    top_k: usize,

    /// Only print final rankings, no stats or progress bar
    #[arg(short, long)]
    quiet: bool,

    /// Judging backend: fake, ollama or anthropic ($RANK_FILES_PROVIDER, default ollama)
    #[arg(long)]
    provider: Option<Provider>,

    /// Model name ($RANK_FILES_MODEL, default depends on the provider)
    #[arg(long)]
    model: Option<String>,

    /// Refuse to rank more than this many files ($RANK_FILES_MAX_FILES, default 500)
    #[arg(long)]
    max_files: Option<usize>,

    /// Reuse judgments from a sqlite cache at PATH ($RANK_FILES_CACHE if no PATH given)
    #[arg(long, value_name = "PATH", num_args = 0..=1, default_missing_value = "")]
    cache: Option<PathBuf>,
}

struct BarSink(ProgressBar);

impl ProgressSink for BarSink {
    fn on_comparison(&self) {
        self.0.inc(1);
    }
}

enum CliRanker {
    Plain(Box<dyn Ranker>),
    Cached(CachedRanker),
}

impl CliRanker {
    fn as_dyn(&self) -> &dyn Ranker {
        match self {
            CliRanker::Plain(ranker) => ranker.as_ref(),
            CliRanker::Cached(ranker) => ranker,
        }
    }

    fn cache_hits(&self) -> Option<u64> {
        match self {
            CliRanker::Plain(_) => None,
            CliRanker::Cached(ranker) => Some(ranker.cache().total_hits()),
        }
    }
}

fn max_files_limit(arg: Option<usize>) -> usize {
    if let Some(limit) = arg {
        return limit;
    }
    env::var("RANK_FILES_MAX_FILES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_FILES)
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    // Both the count limit and the duplicate check run before any judgment
    // is paid for.
    let docs = load_directory(&args.input_dir, max_files_limit(args.max_files))?;
    let n = docs.len();

    let base = build_ranker(args.provider, args.model.clone())?;
    let ranker = match &args.cache {
        Some(path) => {
            let cache = if path.as_os_str().is_empty() {
                Cache::open(default_cache_path())?
            } else {
                Cache::open(path)?
            };
            CliRanker::Cached(CachedRanker::new(base, cache))
        }
        None => CliRanker::Plain(base),
    };

    let bar = if args.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(estimated_comparisons(args.top_k, n))
    };
    let tracker = ComparisonTracker::new(Some(Box::new(BarSink(bar.clone()))));

    let wrapped = wrap_for_pairwise_comparison(ranker.as_dyn(), &args.criteria, docs);
    let counted = tracker.wrap(wrapped);
    let top = tournament(args.top_k, counted)?;
    let top = ComparisonTracker::unwrap(top);
    bar.finish_and_clear();

    if !args.quiet {
        println!("(Total comparisons: {})", tracker.total());
        if let Some(hits) = ranker.cache_hits() {
            println!("(Cache hits: {})", hits);
        }
    }
    for doc in top {
        println!("{}", doc.into_document().name());
    }
    Ok(())
}
