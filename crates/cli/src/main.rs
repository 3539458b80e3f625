//! CLI tool for flattening how-to corpora and drawing discourse samples.
//!
//! This tool reads raw how-to documents from JSONL, flattens the configured
//! split into sentence records and writes sampled training tuples as JSONL.
//! It uses the HuggingFace tokenizers Rust library for the token-length gate.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use tokenizers::{AddedToken, Tokenizer as HfTokenizer};
use tracing_subscriber::EnvFilter;

use howto_discourse_core::{
    special_vocabulary, Corpus, CorpusError, Dataset, DatasetConfig, Split, StrategyKind, Tokenizer,
    TokenizerBackend, MAX_SENTENCE_TOKENS,
};

/// Flatten a how-to corpus and sample sentence tuples to JSONL.
#[derive(Parser, Debug)]
#[command(name = "howto-discourse")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSONL file, or directory of JSONL shards, with one document per line
    #[arg(long)]
    corpus: PathBuf,

    /// Output directory for JSONL files
    #[arg(long)]
    output_dir: PathBuf,

    /// Tokenizer backend: gpt2 or bert
    #[arg(long, default_value = "gpt2")]
    tokenizer_backend: String,

    /// HuggingFace tokenizer model name or tokenizer.json path (defaults to the backend's model)
    #[arg(long)]
    tokenizer: Option<String>,

    /// Sampling strategy: discourse, triplet or tpk
    #[arg(long, default_value = "discourse")]
    strategy: String,

    /// Window size for the discourse and tpk strategies
    #[arg(long, default_value = "1")]
    k: usize,

    /// Emit discourse labels as one-hot vectors
    #[arg(long)]
    one_hot_labels: bool,

    /// Use the evaluation slice instead of the training slice
    #[arg(long)]
    eval: bool,

    /// Random seed for label and position draws
    #[arg(long, default_value = "1")]
    seed: u64,

    /// Number of samples to draw
    #[arg(long, default_value = "1000")]
    num_samples: usize,
}

/// Wrapper around HuggingFace tokenizers for token counting.
///
/// Structural markers and the sentence delimiter are registered as added
/// tokens so they are never split into sub-words.
struct RustTokenizer {
    inner: HfTokenizer,
    backend: TokenizerBackend,
    pad_id: u32,
    eos_id: Option<u32>,
}

impl RustTokenizer {
    /// Load a HuggingFace tokenizer from a local file or a hub model name.
    fn load(model: &str, backend: TokenizerBackend) -> Result<Self, Box<dyn std::error::Error>> {
        let mut inner = if Path::new(model).is_file() {
            HfTokenizer::from_file(model)
        } else {
            HfTokenizer::from_pretrained(model, None)
        }
        .map_err(|e| e as Box<dyn std::error::Error>)?;

        let added: Vec<AddedToken> = special_vocabulary()
            .iter()
            .map(|token| AddedToken::from(token.to_string(), false))
            .collect();
        inner.add_tokens(&added);

        let (pad_id, eos_id) = match backend {
            TokenizerBackend::Gpt2 => {
                let eos = inner.token_to_id("<|endoftext|>");
                (eos.unwrap_or(0), eos)
            }
            TokenizerBackend::Bert => (inner.token_to_id("[PAD]").unwrap_or(0), None),
        };

        Ok(Self {
            inner,
            backend,
            pad_id,
            eos_id,
        })
    }
}

impl Tokenizer for RustTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>, CorpusError> {
        self.inner
            .encode(text, self.backend.adds_special_tokens())
            .map(|encoding| encoding.get_ids().to_vec())
            .map_err(|e| CorpusError::Tokenizer(e.to_string()))
    }

    fn pad_id(&self) -> u32 {
        self.pad_id
    }

    fn eos_id(&self) -> Option<u32> {
        self.eos_id
    }
}

fn write_jsonl<T: serde::Serialize>(
    path: &Path,
    items: impl IntoIterator<Item = T>,
) -> Result<usize, Box<dyn std::error::Error>> {
    let mut file = BufWriter::new(File::create(path)?);
    let mut count = 0;
    for item in items {
        writeln!(file, "{}", serde_json::to_string(&item)?)?;
        count += 1;
    }
    file.flush()?;
    Ok(count)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let backend: TokenizerBackend = args.tokenizer_backend.parse()?;
    let strategy: StrategyKind = args.strategy.parse()?;
    let model = args.tokenizer.as_deref().unwrap_or(backend.default_model());

    println!("Loading tokenizer from {}...", model);
    let tokenizer = RustTokenizer::load(model, backend)?;

    println!("Loading corpus from {:?}...", args.corpus);
    let corpus = Corpus::from_path(&args.corpus)?;
    println!("Loaded {} documents", corpus.documents().len());

    let config = DatasetConfig {
        split: Split::from_train_flag(!args.eval),
        strategy,
        k: args.k,
        one_hot_labels: args.one_hot_labels,
        tokenizer: backend,
        seed: args.seed,
        max_sentence_tokens: MAX_SENTENCE_TOKENS,
    };

    println!("Flattening documents {:?}...", config.split.document_range());
    let dataset = Dataset::build(&corpus, &tokenizer, config.clone())?;
    if dataset.is_empty() {
        return Err("no sentence records survived flattening".into());
    }

    std::fs::create_dir_all(&args.output_dir)?;
    let sentences_path = args.output_dir.join("sentences.jsonl");
    let samples_path = args.output_dir.join("samples.jsonl");

    println!("Writing output to {:?}...", args.output_dir);
    write_jsonl(&sentences_path, dataset.records())?;

    let samples = (0..args.num_samples)
        .map(|i| dataset.get(i % dataset.len()))
        .collect::<Result<Vec<_>, _>>()?;
    let sample_count = write_jsonl(&samples_path, &samples)?;

    let stats = dataset.stats();
    let metadata_path = args.output_dir.join("metadata.json");
    let metadata = serde_json::json!({
        "config": {
            "corpus": args.corpus.to_string_lossy(),
            "output_dir": args.output_dir.to_string_lossy(),
            "tokenizer": model,
            "dataset": config,
        },
        "counts": {
            "documents": stats.documents,
            "units_kept": stats.units_kept,
            "units_skipped": stats.units_skipped,
            "sentences": stats.sentences,
            "samples": sample_count,
        },
        "stats": {
            "avg_sentences_per_unit": if stats.units_kept > 0 {
                stats.sentences as f64 / stats.units_kept as f64
            } else {
                0.0
            },
        },
        "files": {
            "sentences_path": sentences_path.to_string_lossy(),
            "samples_path": samples_path.to_string_lossy(),
        },
    });
    std::fs::write(&metadata_path, serde_json::to_string_pretty(&metadata)?)?;

    println!("\n[summary]");
    println!("  Documents flattened: {}", stats.documents);
    println!("  Units kept: {}", stats.units_kept);
    println!("  Units skipped (over token budget): {}", stats.units_skipped);
    println!("  Sentence records: {}", stats.sentences);
    println!("  Samples ({}): {}", strategy, sample_count);
    println!("  Output: {:?}/{{sentences,samples}}.jsonl", args.output_dir);
    println!("  Metadata: {:?}", metadata_path);

    Ok(())
}
