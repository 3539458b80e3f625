//! Error type shared by the flattener, the samplers and the corpus loaders.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("unrecognized tokenizer backend '{0}' (expected 'gpt2' or 'bert')")]
    UnknownTokenizer(String),

    #[error("unrecognized sampling strategy '{0}' (expected 'discourse', 'triplet' or 'tpk')")]
    UnknownStrategy(String),

    #[error("window size must be positive, got {0}")]
    InvalidWindow(usize),

    #[error("index {index} out of range for {len} records")]
    IndexOutOfRange { index: usize, len: usize },

    /// Index arithmetic resolved records from two different units.
    #[error("records {first} (doc {first_doc}) and {second} (doc {second_doc}) belong to different units")]
    CrossUnit {
        first: usize,
        first_doc: usize,
        second: usize,
        second_doc: usize,
    },

    #[error("record {index} has sentence_id {sentence_id}; need at least two earlier sentences in its unit")]
    UnitTooShort { index: usize, sentence_id: usize },

    #[error("document {0} not found in corpus")]
    DocumentNotFound(usize),

    #[error("tokenizer has no end-of-sequence token")]
    MissingEosToken,

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("failed to parse {path:?} line {line}: {source}")]
    Json {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CorpusError>;
