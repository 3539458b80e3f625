//! Sentence flattening and discourse sampling for how-to corpora.
//!
//! Articles made of a title, methods and numbered steps are flattened into a
//! single stream of sentence records. Sampling strategies then draw pairs,
//! triplets and k-step windows from that stream for order discrimination and
//! contrastive training objectives.

use crate::error::Result;

/// Trait for tokenization operations.
///
/// Implementors provide token ids for a piece of text. The flattener only
/// needs counts; batch encoding additionally uses the pad and EOS ids.
pub trait Tokenizer {
    /// Encode text into token ids, including any special tokens the backend adds.
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Count the number of tokens in the given text.
    fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(self.encode(text)?.len())
    }

    /// Id used to pad rows in a batch.
    fn pad_id(&self) -> u32 {
        0
    }

    /// End-of-sequence id, if the backend has one.
    fn eos_id(&self) -> Option<u32> {
        None
    }
}

// Blanket implementation for references to Tokenizers
impl<T: Tokenizer + ?Sized> Tokenizer for &T {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        (*self).encode(text)
    }

    fn count_tokens(&self, text: &str) -> Result<usize> {
        (*self).count_tokens(text)
    }

    fn pad_id(&self) -> u32 {
        (*self).pad_id()
    }

    fn eos_id(&self) -> Option<u32> {
        (*self).eos_id()
    }
}

pub mod dataset;
pub mod document;
pub mod error;
pub mod flatten;
pub mod sampling;
pub mod tokenizer;

pub use dataset::{Dataset, DatasetConfig, Split};
pub use document::{discover_jsonl_files, load_jsonl, Corpus, DocumentSource, RawDocument, StepInfo};
pub use error::CorpusError;
pub use flatten::{flatten, render_unit, FlattenOutput, FlattenStats, SentenceRecord};
pub use sampling::{
    DiscourseSample, OrderLabel, Sample, SamplingStrategy, StrategyKind, TpkSample, TripletSample,
};
pub use tokenizer::{encode_batch, special_vocabulary, EncodedBatch, TokenizerBackend};

/// Marker prepended to the title sentence of every unit.
pub const TITLE_MARKER: &str = "[ TITLE ]";

/// Marker prepended to the method sentence of every unit.
pub const METHOD_MARKER: &str = "[ METHOD ]";

/// Marker prepended to each step's summary sentence.
pub const STEP_MARKER: &str = "[ STEP ]";

/// Delimiter appended to every rendered sentence.
pub const SENTENCE_DELIMITER: &str = " . ";

/// Units containing a sentence with this many tokens or more are dropped.
pub const MAX_SENTENCE_TOKENS: usize = 1024;
