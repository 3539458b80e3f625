//! Flattening of how-to documents into per-unit sentence records.
//!
//! A unit is one (document, method) pair. Each unit is rendered into a
//! candidate sentence list, validated against the token budget as a whole,
//! and only then materialized into records with its final sentence count.

use std::ops::Range;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::document::{DocumentSource, StepInfo};
use crate::error::{CorpusError, Result};
use crate::{Tokenizer, METHOD_MARKER, SENTENCE_DELIMITER, STEP_MARKER, TITLE_MARKER};

/// Step bodies are split into sentences on this literal pattern.
const BODY_SPLIT_PATTERN: &str = ".  ";

/// What a body fragment looks like when it already ended with a period.
const DOUBLED_DELIMITER: &str = ". . ";

/// One rendered sentence and its position inside its unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceRecord {
    pub sentence: String,
    pub sentence_id: usize,
    pub doc_id: usize,
    pub total_doc_sentences: usize,
}

/// Counters collected during a flattening pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlattenStats {
    pub documents: usize,
    pub units_kept: usize,
    pub units_skipped: usize,
    pub sentences: usize,
}

/// Result of flattening a document range.
#[derive(Debug, Clone, Default)]
pub struct FlattenOutput {
    pub records: Vec<SentenceRecord>,
    pub stats: FlattenStats,
}

/// Render the candidate sentences of one unit, before any filtering.
///
/// Order: title, method, then for each step its numbered summary followed by
/// the sentences of its body.
pub fn render_unit(title: &str, method_name: &str, steps: &[&StepInfo]) -> Vec<String> {
    let mut sentences = vec![
        format!("{} {}{}", TITLE_MARKER, title, SENTENCE_DELIMITER),
        format!("{} {}{}", METHOD_MARKER, method_name, SENTENCE_DELIMITER),
    ];

    for (step_num, step) in steps.iter().enumerate() {
        sentences.push(format!(
            "{} {} {}{}",
            STEP_MARKER,
            step_num,
            without_last_char(&step.summary),
            SENTENCE_DELIMITER
        ));
        sentences.extend(split_body(&step.text));
    }

    sentences
}

/// Summaries end with their own punctuation, which the delimiter replaces.
fn without_last_char(s: &str) -> &str {
    let mut chars = s.chars();
    chars.next_back();
    chars.as_str()
}

fn split_body(text: &str) -> Vec<String> {
    let mut sentences: Vec<String> = text
        .split(BODY_SPLIT_PATTERN)
        .map(|fragment| format!("{}{}", fragment, SENTENCE_DELIMITER))
        .collect();

    if let Some(last) = sentences.last_mut() {
        if last.ends_with(DOUBLED_DELIMITER) {
            *last = last.replace(DOUBLED_DELIMITER, SENTENCE_DELIMITER);
        }
    }

    sentences
}

fn fits_budget<T>(tokenizer: &T, sentences: &[String], max_tokens: usize) -> Result<bool>
where
    T: Tokenizer + ?Sized,
{
    for sentence in sentences {
        if tokenizer.count_tokens(sentence)? >= max_tokens {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Drop empty and delimiter-only sentences, then append the unit's records.
fn push_unit(records: &mut Vec<SentenceRecord>, doc_id: usize, sentences: Vec<String>) {
    let kept: Vec<String> = sentences
        .into_iter()
        .filter(|s| !s.is_empty() && s != SENTENCE_DELIMITER)
        .collect();
    let total = kept.len();

    records.extend(kept.into_iter().enumerate().map(|(sentence_id, sentence)| SentenceRecord {
        sentence,
        sentence_id,
        doc_id,
        total_doc_sentences: total,
    }));
}

/// Flatten every document in `range` into one ordered record stream.
///
/// Documents are rendered and validated in parallel; unit ids are assigned
/// afterwards in document-then-method order, so the output does not depend
/// on scheduling. Units with any sentence at or above `max_tokens` tokens are
/// skipped whole and do not consume a unit id.
pub fn flatten<S, T>(source: &S, range: Range<usize>, tokenizer: &T, max_tokens: usize) -> Result<FlattenOutput>
where
    S: DocumentSource + Sync + ?Sized,
    T: Tokenizer + Sync + ?Sized,
{
    let rendered: Vec<Vec<Option<Vec<String>>>> = range
        .clone()
        .into_par_iter()
        .map(|doc_index| {
            let doc = source
                .document(doc_index)
                .ok_or(CorpusError::DocumentNotFound(doc_index))?;

            doc.methods()
                .into_iter()
                .map(|(method_name, steps)| {
                    let sentences = render_unit(&doc.title, method_name, &steps);
                    if fits_budget(tokenizer, &sentences, max_tokens)? {
                        Ok(Some(sentences))
                    } else {
                        debug!(doc_index, method = method_name, "skipping unit over token budget");
                        Ok(None)
                    }
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    let mut output = FlattenOutput::default();
    let mut doc_counter = 0;

    for units in rendered {
        output.stats.documents += 1;
        for unit in units {
            match unit {
                Some(sentences) => {
                    push_unit(&mut output.records, doc_counter, sentences);
                    doc_counter += 1;
                    output.stats.units_kept += 1;
                }
                None => output.stats.units_skipped += 1,
            }
        }
    }
    output.stats.sentences = output.records.len();

    info!(
        start = range.start,
        end = range.end,
        documents = output.stats.documents,
        units_kept = output.stats.units_kept,
        units_skipped = output.stats.units_skipped,
        sentences = output.stats.sentences,
        "flattened corpus slice"
    );

    Ok(output)
}
