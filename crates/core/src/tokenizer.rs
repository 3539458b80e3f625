//! Tokenizer backend selection and padded batch encoding for model input.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CorpusError, Result};
use crate::{Tokenizer, METHOD_MARKER, SENTENCE_DELIMITER, STEP_MARKER, TITLE_MARKER};

/// The two supported tokenizer families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenizerBackend {
    /// Byte-level BPE; pads with EOS and appends a masked EOS column.
    Gpt2,
    /// WordPiece; every row starts with the `[CLS]` classification token.
    Bert,
}

impl TokenizerBackend {
    /// Maximum sequence length the backend's models accept.
    pub fn max_length(self) -> usize {
        match self {
            TokenizerBackend::Gpt2 => 1024,
            TokenizerBackend::Bert => 512,
        }
    }

    /// Hub name of the pretrained tokenizer for this backend.
    pub fn default_model(self) -> &'static str {
        match self {
            TokenizerBackend::Gpt2 => "gpt2",
            TokenizerBackend::Bert => "bert-base-cased",
        }
    }

    /// Whether encoding should add the backend's own special tokens.
    pub fn adds_special_tokens(self) -> bool {
        matches!(self, TokenizerBackend::Bert)
    }
}

impl FromStr for TokenizerBackend {
    type Err = CorpusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gpt2" => Ok(TokenizerBackend::Gpt2),
            "bert" => Ok(TokenizerBackend::Bert),
            _ => Err(CorpusError::UnknownTokenizer(s.to_string())),
        }
    }
}

impl fmt::Display for TokenizerBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenizerBackend::Gpt2 => write!(f, "gpt2"),
            TokenizerBackend::Bert => write!(f, "bert"),
        }
    }
}

/// Tokens every backend must register as atomic vocabulary entries.
pub fn special_vocabulary() -> [&'static str; 4] {
    [TITLE_MARKER, METHOD_MARKER, STEP_MARKER, SENTENCE_DELIMITER]
}

/// A padded batch of token ids with its attention mask.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct EncodedBatch {
    pub input_ids: Vec<Vec<u32>>,
    pub attention_mask: Vec<Vec<u32>>,
}

impl EncodedBatch {
    /// Length shared by every row.
    pub fn width(&self) -> usize {
        self.input_ids.first().map_or(0, Vec::len)
    }
}

/// Encode sentences into a right-padded batch.
///
/// Rows are padded to the longest sentence. The GPT2 backend pads with EOS
/// and then appends one extra EOS column whose attention is zero.
pub fn encode_batch<T, S>(tokenizer: &T, backend: TokenizerBackend, texts: &[S]) -> Result<EncodedBatch>
where
    T: Tokenizer + ?Sized,
    S: AsRef<str>,
{
    let encoded: Vec<Vec<u32>> = texts
        .iter()
        .map(|text| tokenizer.encode(text.as_ref()))
        .collect::<Result<_>>()?;

    let pad_id = match backend {
        TokenizerBackend::Gpt2 => tokenizer.eos_id().ok_or(CorpusError::MissingEosToken)?,
        TokenizerBackend::Bert => tokenizer.pad_id(),
    };
    let width = encoded.iter().map(Vec::len).max().unwrap_or(0);

    let mut batch = EncodedBatch::default();
    for mut ids in encoded {
        let mut mask = vec![1u32; ids.len()];
        ids.resize(width, pad_id);
        mask.resize(width, 0);

        if backend == TokenizerBackend::Gpt2 {
            ids.push(pad_id);
            mask.push(0);
        }

        batch.input_ids.push(ids);
        batch.attention_mask.push(mask);
    }

    Ok(batch)
}
