// Comparison-Frugal File Ranking Library

/// The single capability the selection algorithm needs from its items: a
/// fallible, strict "does this lose to that" relation.
///
/// Two distinct contenders never tie. When the relation does not prefer
/// `other`, `self` is the winner by default.
pub trait Contender {
    type Error;

    /// Returns true when `other` outranks `self`.
    fn loses_to(&self, other: &Self) -> Result<bool, Self::Error>;
}

/// Receives one notification per comparison. Only ever driven by a single
/// sequential caller, so implementations need no internal ordering guarantees.
pub trait ProgressSink {
    fn on_comparison(&self);
}

// Implementations
pub mod cache;
pub mod document;
pub mod rank;
pub mod tournament;

// Export the main types
pub use cache::{Cache, CachedRanker};
pub use document::{load_directory, Document, DocumentError, FileDocument, StrDocument};
pub use rank::{
    build_ranker, wrap_for_pairwise_comparison, AnthropicRanker, FakeRanker, OllamaRanker,
    PairwiseDocument, Provider, RankError, Ranker, Winner,
};
pub use tournament::{estimated_comparisons, tournament, ComparisonTracker, Counted};
