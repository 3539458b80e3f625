//! Dataset facade: flattens a corpus slice once and samples from it by index.

use std::ops::Range;
use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::document::DocumentSource;
use crate::error::{CorpusError, Result};
use crate::flatten::{flatten, FlattenStats, SentenceRecord};
use crate::sampling::{Sample, SamplingStrategy, StrategyKind};
use crate::tokenizer::{encode_batch, EncodedBatch, TokenizerBackend};
use crate::{Tokenizer, MAX_SENTENCE_TOKENS};

/// Which fixed slice of the corpus a dataset is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Eval,
}

impl Split {
    pub fn from_train_flag(train: bool) -> Self {
        if train {
            Split::Train
        } else {
            Split::Eval
        }
    }

    /// Document id range of the split.
    pub fn document_range(self) -> Range<usize> {
        match self {
            Split::Train => 0..1_000,
            Split::Eval => 40_000..40_100,
        }
    }
}

/// Configuration for a [`Dataset`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub split: Split,
    pub strategy: StrategyKind,
    /// Window size used by the discourse and TPK strategies.
    pub k: usize,
    /// Emit discourse labels as `[swapped, in_order]` vectors.
    pub one_hot_labels: bool,
    pub tokenizer: TokenizerBackend,
    pub seed: u64,
    pub max_sentence_tokens: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            split: Split::Train,
            strategy: StrategyKind::Discourse,
            k: 1,
            one_hot_labels: false,
            tokenizer: TokenizerBackend::Gpt2,
            seed: 1,
            max_sentence_tokens: MAX_SENTENCE_TOKENS,
        }
    }
}

/// Flattened sentence records plus a sampling strategy.
///
/// Records are built once in [`Dataset::build`] and only handed out by
/// shared reference afterwards. The random generator sits behind a mutex so
/// `get` can be called through `&self`.
#[derive(Debug)]
pub struct Dataset {
    records: Vec<SentenceRecord>,
    stats: FlattenStats,
    strategy: SamplingStrategy,
    config: DatasetConfig,
    rng: Mutex<StdRng>,
}

impl Dataset {
    /// Flatten the configured split of `source` and prepare the sampler.
    pub fn build<S, T>(source: &S, tokenizer: &T, config: DatasetConfig) -> Result<Self>
    where
        S: DocumentSource + Sync + ?Sized,
        T: Tokenizer + Sync + ?Sized,
    {
        let strategy = SamplingStrategy::new(config.strategy, config.k, config.one_hot_labels)?;

        info!(split = ?config.split, strategy = %config.strategy, "loading dataset");
        let output = flatten(
            source,
            config.split.document_range(),
            tokenizer,
            config.max_sentence_tokens,
        )?;

        Ok(Self::from_parts(output.records, output.stats, strategy, config))
    }

    fn from_parts(
        records: Vec<SentenceRecord>,
        stats: FlattenStats,
        strategy: SamplingStrategy,
        config: DatasetConfig,
    ) -> Self {
        Self {
            records,
            stats,
            strategy,
            rng: Mutex::new(StdRng::seed_from_u64(config.seed)),
            config,
        }
    }

    /// Number of valid anchor indices.
    ///
    /// The last record is never an anchor so that `index + 1` lookups stay in
    /// bounds.
    pub fn len(&self) -> usize {
        self.records.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Draw a sample anchored at `index` using the dataset's own generator.
    pub fn get(&self, index: usize) -> Result<Sample> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        self.sample_with(index, &mut *rng)
    }

    /// Draw a sample anchored at `index` using a caller-owned generator.
    pub fn sample_with<R>(&self, index: usize, rng: &mut R) -> Result<Sample>
    where
        R: Rng + ?Sized,
    {
        if index >= self.len() {
            return Err(CorpusError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        self.strategy.sample(&self.records, index, rng)
    }

    /// Pad sentences into a model-input batch for the configured backend.
    pub fn encode<T, S>(&self, tokenizer: &T, texts: &[S]) -> Result<EncodedBatch>
    where
        T: Tokenizer + ?Sized,
        S: AsRef<str>,
    {
        encode_batch(tokenizer, self.config.tokenizer, texts)
    }

    pub fn records(&self) -> &[SentenceRecord] {
        &self.records
    }

    pub fn stats(&self) -> FlattenStats {
        self.stats
    }

    pub fn strategy(&self) -> SamplingStrategy {
        self.strategy
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }
}
