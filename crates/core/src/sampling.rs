//! Sampling strategies over a flattened sentence stream.
//!
//! Every strategy resolves related sentences by offset arithmetic from an
//! anchor index, using the anchor's `sentence_id` to find the start of its
//! unit. None of them mutate the record slice.
//!
//! Boundary gap: the discourse and TPK strategies do not exclude anchors near
//! a unit boundary. Discourse windows always stay inside a well-formed unit,
//! but TPK with `k == 1` can pair sentences from two units when the anchor
//! sits in a single-sentence unit. Callers that need strict same-unit pairs
//! have to filter such anchors themselves.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CorpusError, Result};
use crate::flatten::SentenceRecord;

/// Which sampling rule a dataset applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Pairwise order discrimination.
    Discourse,
    /// Ordered triplets `t1 < t2 < T` from one unit.
    Triplet,
    /// Current sentence, three lags and the sentence `k` ahead.
    Tpk,
}

impl FromStr for StrategyKind {
    type Err = CorpusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "discourse" => Ok(StrategyKind::Discourse),
            "triplet" => Ok(StrategyKind::Triplet),
            "tpk" => Ok(StrategyKind::Tpk),
            _ => Err(CorpusError::UnknownStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::Discourse => "discourse",
            StrategyKind::Triplet => "triplet",
            StrategyKind::Tpk => "tpk",
        };
        f.write_str(name)
    }
}

/// A configured sampling strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingStrategy {
    Discourse { k: usize, one_hot_labels: bool },
    Triplet,
    Tpk { k: usize },
}

impl SamplingStrategy {
    pub fn new(kind: StrategyKind, k: usize, one_hot_labels: bool) -> Result<Self> {
        if k == 0 {
            return Err(CorpusError::InvalidWindow(k));
        }
        Ok(match kind {
            StrategyKind::Discourse => SamplingStrategy::Discourse { k, one_hot_labels },
            StrategyKind::Triplet => SamplingStrategy::Triplet,
            StrategyKind::Tpk => SamplingStrategy::Tpk { k },
        })
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            SamplingStrategy::Discourse { .. } => StrategyKind::Discourse,
            SamplingStrategy::Triplet => StrategyKind::Triplet,
            SamplingStrategy::Tpk { .. } => StrategyKind::Tpk,
        }
    }

    /// Draw one sample anchored at `index`.
    pub fn sample<R>(&self, records: &[SentenceRecord], index: usize, rng: &mut R) -> Result<Sample>
    where
        R: Rng + ?Sized,
    {
        match *self {
            SamplingStrategy::Discourse { k, one_hot_labels } => {
                sample_discourse(records, index, k, one_hot_labels, rng).map(Sample::Discourse)
            }
            SamplingStrategy::Triplet => sample_triplet(records, index, rng).map(Sample::Triplet),
            SamplingStrategy::Tpk { k } => sample_tpk(records, index, k).map(Sample::Tpk),
        }
    }
}

/// Output of any strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum Sample {
    Discourse(DiscourseSample),
    Triplet(TripletSample),
    Tpk(TpkSample),
}

/// Whether a discourse pair was emitted in its original order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OrderLabel {
    /// 1 = in order, 0 = swapped.
    Scalar(u8),
    /// `[swapped, in_order]` with a single 1.0.
    OneHot([f32; 2]),
}

impl OrderLabel {
    fn new(in_order: bool, one_hot: bool) -> Self {
        let class = usize::from(in_order);
        if one_hot {
            let mut labels = [0.0; 2];
            labels[class] = 1.0;
            OrderLabel::OneHot(labels)
        } else {
            OrderLabel::Scalar(class as u8)
        }
    }

    pub fn is_in_order(&self) -> bool {
        match self {
            OrderLabel::Scalar(v) => *v == 1,
            OrderLabel::OneHot(v) => v[1] == 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscourseSample {
    /// Earlier sentence when in order, later one otherwise.
    pub y_t: String,
    pub y_tp1: String,
    pub label: OrderLabel,
    pub idx: usize,
    /// Global index of the earlier sentence.
    pub t: usize,
    /// Global index of the later sentence.
    pub tp1: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TripletSample {
    pub y_0: String,
    pub y_t: String,
    #[serde(rename = "y_T")]
    pub y_end: String,
    /// Unit position of `y_0`.
    pub t1: usize,
    /// Unit position of `y_t`.
    pub t2: usize,
    /// Unit position of `y_T`.
    #[serde(rename = "T")]
    pub t_end: usize,
    pub total_t: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TpkSample {
    pub y_t: String,
    pub y_tm1: String,
    pub y_tm2: String,
    pub y_tm3: String,
    pub y_tpk: String,
    /// `sentence_id / total_doc_sentences` of `y_t`.
    pub t_norm: f64,
}

fn record(records: &[SentenceRecord], index: usize) -> Result<&SentenceRecord> {
    records.get(index).ok_or(CorpusError::IndexOutOfRange {
        index,
        len: records.len(),
    })
}

fn ensure_same_unit(records: &[SentenceRecord], first: usize, second: usize) -> Result<()> {
    let (a, b) = (record(records, first)?, record(records, second)?);
    if a.doc_id != b.doc_id {
        return Err(CorpusError::CrossUnit {
            first,
            first_doc: a.doc_id,
            second,
            second_doc: b.doc_id,
        });
    }
    Ok(())
}

/// Global index of unit position `pos` relative to the anchor at `index`.
fn resolve(anchor: &SentenceRecord, index: usize, pos: usize, len: usize) -> Result<usize> {
    (index + pos)
        .checked_sub(anchor.sentence_id)
        .ok_or(CorpusError::IndexOutOfRange { index, len })
}

/// Global indices `(t, tp1)` of the k-window around the anchor.
///
/// `tp1` is `k` ahead of the anchor, clamped to the unit's last sentence, and
/// `t` is `k` before `tp1`, clamped to the unit's first sentence.
fn window(records: &[SentenceRecord], index: usize, k: usize) -> Result<(usize, usize)> {
    let anchor = record(records, index)?;
    let tp1_pos = anchor
        .total_doc_sentences
        .saturating_sub(1)
        .min(anchor.sentence_id + k);
    let t_pos = tp1_pos.saturating_sub(k);

    Ok((
        resolve(anchor, index, t_pos, records.len())?,
        resolve(anchor, index, tp1_pos, records.len())?,
    ))
}

/// Pairwise order sample: a k-window pair, swapped with probability 1/2.
pub fn sample_discourse<R>(
    records: &[SentenceRecord],
    index: usize,
    k: usize,
    one_hot_labels: bool,
    rng: &mut R,
) -> Result<DiscourseSample>
where
    R: Rng + ?Sized,
{
    let in_order = rng.gen_range(0..=1u8) == 1;

    let (t, tp1) = window(records, index, k)?;
    ensure_same_unit(records, t, tp1)?;

    let earlier = record(records, t)?.sentence.clone();
    let later = record(records, tp1)?.sentence.clone();
    let (y_t, y_tp1) = if in_order { (earlier, later) } else { (later, earlier) };

    Ok(DiscourseSample {
        y_t,
        y_tp1,
        label: OrderLabel::new(in_order, one_hot_labels),
        idx: index,
        t,
        tp1,
    })
}

/// Ordered triplet sample: two random earlier positions plus the anchor.
///
/// Anchors at the first or second sentence of a unit are moved forward so
/// the anchor has at least two predecessors.
pub fn sample_triplet<R>(records: &[SentenceRecord], index: usize, rng: &mut R) -> Result<TripletSample>
where
    R: Rng + ?Sized,
{
    let index = match record(records, index)?.sentence_id {
        0 => index + 2,
        1 => index + 1,
        _ => index,
    };
    let anchor = record(records, index)?;
    let t_end = anchor.sentence_id;
    if t_end < 2 {
        return Err(CorpusError::UnitTooShort {
            index,
            sentence_id: t_end,
        });
    }

    let picks = rand::seq::index::sample(rng, t_end, 2);
    let (t1, t2) = {
        let (a, b) = (picks.index(0), picks.index(1));
        (a.min(b), a.max(b))
    };
    debug_assert!(t1 < t2 && t2 < t_end);

    let start = index - t_end;
    ensure_same_unit(records, start + t1, index)?;
    ensure_same_unit(records, start + t2, index)?;

    Ok(TripletSample {
        y_0: records[start + t1].sentence.clone(),
        y_t: records[start + t2].sentence.clone(),
        y_end: anchor.sentence.clone(),
        t1,
        t2,
        t_end,
        total_t: anchor.total_doc_sentences,
    })
}

/// Windowed context sample: current sentence, three lags and a lookahead.
pub fn sample_tpk(records: &[SentenceRecord], index: usize, k: usize) -> Result<TpkSample> {
    let (index, t, tpk) = if k == 1 {
        let here = record(records, index)?;
        let next = record(records, index + 1)?;
        let index = if here.doc_id != next.doc_id {
            index.checked_sub(1).ok_or(CorpusError::IndexOutOfRange {
                index,
                len: records.len(),
            })?
        } else {
            index
        };
        (index, index, index + 1)
    } else {
        let (t, tpk) = window(records, index, k)?;
        (index, t, tpk)
    };

    let anchor = record(records, index)?;
    let current = record(records, t)?;
    let ahead = record(records, tpk)?;
    if current.doc_id != ahead.doc_id {
        debug!(index, t, tpk, "tpk pair crosses a unit boundary");
    }

    let lagged = |lag: usize| {
        index
            .checked_sub(lag)
            .map(|i| &records[i])
            .filter(|r| r.doc_id == anchor.doc_id)
            .unwrap_or(anchor)
            .sentence
            .clone()
    };

    Ok(TpkSample {
        y_t: current.sentence.clone(),
        y_tm1: lagged(1),
        y_tm2: lagged(2),
        y_tm3: lagged(3),
        y_tpk: ahead.sentence.clone(),
        t_norm: current.sentence_id as f64 / anchor.total_doc_sentences as f64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Records for consecutive units of the given lengths, text "d{doc}s{pos}".
    fn units(lengths: &[usize]) -> Vec<SentenceRecord> {
        lengths
            .iter()
            .enumerate()
            .flat_map(|(doc_id, &len)| {
                (0..len).map(move |sentence_id| SentenceRecord {
                    sentence: format!("d{}s{}", doc_id, sentence_id),
                    sentence_id,
                    doc_id,
                    total_doc_sentences: len,
                })
            })
            .collect()
    }

    fn parse(text: &str) -> (usize, usize) {
        let (doc, pos) = text[1..].split_once('s').unwrap();
        (doc.parse().unwrap(), pos.parse().unwrap())
    }

    #[test]
    fn test_strategy_kind_from_str() {
        assert_eq!("TPK".parse::<StrategyKind>().unwrap(), StrategyKind::Tpk);
        assert!(matches!(
            "shuffle".parse::<StrategyKind>(),
            Err(CorpusError::UnknownStrategy(_))
        ));
        assert!(matches!(
            SamplingStrategy::new(StrategyKind::Discourse, 0, false),
            Err(CorpusError::InvalidWindow(0))
        ));
    }

    #[test]
    fn test_discourse_labels_roughly_uniform() {
        let records = units(&[5, 7, 3, 9, 1, 4]);
        let mut rng = StdRng::seed_from_u64(7);
        let mut in_order = 0;

        for draw in 0..10_000 {
            let index = draw % records.len();
            let sample = sample_discourse(&records, index, 2, false, &mut rng).unwrap();
            assert!(sample.t <= sample.tp1);
            assert_eq!(records[sample.t].doc_id, records[sample.tp1].doc_id);
            assert_eq!(sample.idx, index);
            if sample.label.is_in_order() {
                in_order += 1;
            }
        }

        assert!((4_700..=5_300).contains(&in_order), "in-order count {}", in_order);
    }

    #[test]
    fn test_discourse_window_and_swap() {
        let records = units(&[6]);
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..50 {
            // Anchor 1 with k=3: tp1 = 4, t = 1.
            let sample = sample_discourse(&records, 1, 3, true, &mut rng).unwrap();
            assert_eq!((sample.t, sample.tp1), (1, 4));
            if sample.label.is_in_order() {
                assert_eq!(sample.label, OrderLabel::OneHot([0.0, 1.0]));
                assert_eq!((sample.y_t.as_str(), sample.y_tp1.as_str()), ("d0s1", "d0s4"));
            } else {
                assert_eq!(sample.label, OrderLabel::OneHot([1.0, 0.0]));
                assert_eq!((sample.y_t.as_str(), sample.y_tp1.as_str()), ("d0s4", "d0s1"));
            }
        }

        // Anchor near the end clamps tp1 to the last sentence.
        let sample = sample_discourse(&records, 5, 3, false, &mut rng).unwrap();
        assert_eq!((sample.t, sample.tp1), (2, 5));
    }

    #[test]
    fn test_discourse_rejects_malformed_units() {
        let mut records = units(&[4]);
        records[3].doc_id = 9;
        let mut rng = StdRng::seed_from_u64(0);

        assert!(matches!(
            sample_discourse(&records, 0, 3, false, &mut rng),
            Err(CorpusError::CrossUnit { first: 0, second: 3, .. })
        ));
    }

    #[test]
    fn test_triplet_positions_ordered() {
        let records = units(&[3, 8, 5, 12]);
        let mut rng = StdRng::seed_from_u64(11);

        for draw in 0..2_000 {
            let index = draw % records.len();
            let sample = sample_triplet(&records, index, &mut rng).unwrap();
            assert!(sample.t1 < sample.t2 && sample.t2 < sample.t_end);

            let (doc0, pos0) = parse(&sample.y_0);
            let (doc1, pos1) = parse(&sample.y_t);
            let (doc2, pos2) = parse(&sample.y_end);
            assert!(doc0 == doc1 && doc1 == doc2);
            assert_eq!((pos0, pos1, pos2), (sample.t1, sample.t2, sample.t_end));
            assert_eq!(sample.total_t, [3, 8, 5, 12][doc2]);
        }
    }

    #[test]
    fn test_triplet_advances_unit_start() {
        let records = units(&[3]);
        let mut rng = StdRng::seed_from_u64(5);

        for index in 0..3 {
            let sample = sample_triplet(&records, index, &mut rng).unwrap();
            assert_eq!((sample.t1, sample.t2, sample.t_end), (0, 1, 2));
            assert_eq!(sample.y_end, "d0s2");
        }
    }

    #[test]
    fn test_triplet_short_unit() {
        let records = units(&[2, 5]);
        let mut rng = StdRng::seed_from_u64(5);

        assert!(matches!(
            sample_triplet(&records, 0, &mut rng),
            Err(CorpusError::UnitTooShort { index: 2, sentence_id: 0 })
        ));
    }

    #[test]
    fn test_tpk_adjacent_pairs() {
        let records = units(&[2, 5, 3, 4]);

        for index in 0..records.len() - 1 {
            let sample = sample_tpk(&records, index, 1).unwrap();
            let (doc_t, pos_t) = parse(&sample.y_t);
            let (doc_k, pos_k) = parse(&sample.y_tpk);
            assert_eq!(doc_t, doc_k);
            assert_eq!(pos_t + 1, pos_k);
        }
    }

    #[test]
    fn test_tpk_steps_back_at_unit_end() {
        let records = units(&[4, 3]);
        let sample = sample_tpk(&records, 3, 1).unwrap();

        assert_eq!(sample.y_t, "d0s2");
        assert_eq!(sample.y_tpk, "d0s3");
        assert_eq!(sample.y_tm1, "d0s1");
        assert_eq!(sample.y_tm2, "d0s0");
        assert_eq!(sample.y_tm3, "d0s2");
        assert!((sample.t_norm - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_tpk_lags_clamp_at_unit_start() {
        let records = units(&[3, 6]);

        let sample = sample_tpk(&records, 3, 1).unwrap();
        assert_eq!(sample.y_t, "d1s0");
        assert_eq!(sample.y_tm1, "d1s0");
        assert_eq!(sample.y_tm2, "d1s0");
        assert_eq!(sample.y_tm3, "d1s0");

        let sample = sample_tpk(&records, 0, 1).unwrap();
        assert_eq!(sample.y_tm3, "d0s0");
    }

    #[test]
    fn test_tpk_window_mode() {
        let records = units(&[8]);

        // Anchor 2, k=3: tpk = 5, t = 2; lags measured from the anchor.
        let sample = sample_tpk(&records, 2, 3).unwrap();
        assert_eq!(sample.y_t, "d0s2");
        assert_eq!(sample.y_tpk, "d0s5");
        assert_eq!(sample.y_tm1, "d0s1");
        assert_eq!(sample.y_tm2, "d0s0");
        assert_eq!(sample.y_tm3, "d0s2");

        // Anchor 7 clamps: tpk = 7, t = 4.
        let sample = sample_tpk(&records, 7, 3).unwrap();
        assert_eq!(sample.y_t, "d0s4");
        assert_eq!(sample.y_tpk, "d0s7");
        assert_eq!(sample.y_tm1, "d0s6");
        assert!((sample.t_norm - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_strategy_dispatch() {
        let records = units(&[6]);
        let mut rng = StdRng::seed_from_u64(1);
        let strategy = SamplingStrategy::new(StrategyKind::Tpk, 2, false).unwrap();

        assert_eq!(strategy.kind(), StrategyKind::Tpk);
        match strategy.sample(&records, 1, &mut rng).unwrap() {
            Sample::Tpk(sample) => assert_eq!(sample.y_tpk, "d0s3"),
            other => panic!("unexpected sample {:?}", other),
        }
    }
}
