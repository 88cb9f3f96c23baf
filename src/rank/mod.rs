use std::env;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::document::{Document, DocumentError};
use crate::Contender;

pub mod anthropic;
pub mod fake;
pub mod ollama;

pub use anthropic::AnthropicRanker;
pub use fake::FakeRanker;
pub use ollama::OllamaRanker;

pub(crate) const PAIRWISE_SYSTEM_PROMPT: &str = include_str!("pairwise-system.txt");

#[derive(Debug, Error)]
pub enum RankError {
    #[error(
        "model was instructed to answer '1' for {first} or '2' for {second} but answered: {got:?}"
    )]
    InvalidResponse {
        first: String,
        second: String,
        got: String,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("api error: {0}")]
    Api(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("judgment cache error: {0}")]
    Cache(#[from] rusqlite::Error),
}

/// The single discrete token a judgment boils down to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    First,
    Second,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Fake,
    Ollama,
    Anthropic,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Fake => "fake",
            Provider::Ollama => "ollama",
            Provider::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = RankError;

    fn from_str(s: &str) -> Result<Self, RankError> {
        match s {
            "fake" => Ok(Provider::Fake),
            "ollama" => Ok(Provider::Ollama),
            "anthropic" => Ok(Provider::Anthropic),
            other => Err(RankError::Config(format!(
                "unsupported provider {:?} (expected fake, ollama or anthropic)",
                other
            ))),
        }
    }
}

pub fn default_provider() -> Result<Provider, RankError> {
    match env::var("RANK_FILES_PROVIDER") {
        Ok(value) => value.parse(),
        Err(_) => Ok(Provider::Ollama),
    }
}

pub fn default_model(provider: Provider) -> String {
    if let Ok(model) = env::var("RANK_FILES_MODEL") {
        return model;
    }
    match provider {
        Provider::Fake => "random",
        Provider::Ollama => "gemma3:4b",
        Provider::Anthropic => "claude-3-5-haiku-latest",
    }
    .to_string()
}

/// Picks the preferred of two documents for a criteria statement.
///
/// A judgment may be a remote, costly and fallible call; implementations
/// impose no retry of their own, and any failure aborts the selection run
/// that issued it. Judgments are not required to be transitive — the
/// selection simply reflects whatever answers come back.
pub trait Ranker {
    fn choose_better(
        &self,
        criteria: &str,
        first: &dyn Document,
        second: &dyn Document,
    ) -> Result<Winner, RankError>;
}

/// Pair each document with the ranker and criteria so the tournament can
/// fight them against each other.
pub fn wrap_for_pairwise_comparison<'r>(
    ranker: &'r dyn Ranker,
    criteria: &'r str,
    docs: Vec<Box<dyn Document>>,
) -> Vec<PairwiseDocument<'r>> {
    docs.into_iter()
        .map(|doc| PairwiseDocument {
            doc,
            ranker,
            criteria,
        })
        .collect()
}

/// A document bound to the ranker and criteria that judge it.
pub struct PairwiseDocument<'r> {
    doc: Box<dyn Document>,
    ranker: &'r dyn Ranker,
    criteria: &'r str,
}

impl PairwiseDocument<'_> {
    pub fn document(&self) -> &dyn Document {
        self.doc.as_ref()
    }

    pub fn into_document(self) -> Box<dyn Document> {
        self.doc
    }
}

impl Contender for PairwiseDocument<'_> {
    type Error = RankError;

    fn loses_to(&self, other: &Self) -> Result<bool, RankError> {
        let winner = self
            .ranker
            .choose_better(self.criteria, self.doc.as_ref(), other.doc.as_ref())?;
        Ok(winner == Winner::Second)
    }
}

// TODO Escaping angle brackets keeps content from breaking the
//      criteria/document-1/document-2 tag structure, but how much protection
//      this buys against adversarial documents (and how much superfluous
//      escaping costs in judgment quality) has not been measured.
pub fn escape_prompt_part(text: &str) -> String {
    text.replace('<', "&lt;").replace('>', "&gt;")
}

pub fn pairwise_user_prompt(
    criteria: &str,
    first: &dyn Document,
    second: &dyn Document,
) -> Result<String, RankError> {
    Ok(format!(
        "<criteria>{}</criteria>\n<document-1>{}</document-1>\n<document-2>{}</document-2>",
        escape_prompt_part(criteria),
        escape_prompt_part(&first.read_text()?),
        escape_prompt_part(&second.read_text()?),
    ))
}

/// Map the model's output token back to a side. Anything but a bare "1" or
/// "2" is unusable and fatal to the run.
pub fn extract_pairwise_response(
    first: &dyn Document,
    second: &dyn Document,
    content: &str,
) -> Result<Winner, RankError> {
    match content {
        "1" => Ok(Winner::First),
        "2" => Ok(Winner::Second),
        other => Err(RankError::InvalidResponse {
            first: first.name(),
            second: second.name(),
            got: other.to_string(),
        }),
    }
}

pub fn build_ranker(
    provider: Option<Provider>,
    model: Option<String>,
) -> Result<Box<dyn Ranker>, RankError> {
    let provider = match provider {
        Some(provider) => provider,
        None => default_provider()?,
    };
    let model = model.unwrap_or_else(|| default_model(provider));
    Ok(match provider {
        Provider::Fake => Box::new(FakeRanker),
        Provider::Ollama => Box::new(OllamaRanker::new(model)),
        Provider::Anthropic => Box::new(AnthropicRanker::new(model)?),
    })
}
