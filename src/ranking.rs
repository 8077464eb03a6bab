//! Ordering of finished topic results for display.

use std::cmp::Ordering;
use std::fmt;

use clap::ValueEnum;

use crate::status::TopicResult;

/// Display orderings offered for a finished result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortMode {
    /// Match score, best first.
    ScoreDesc,
    /// Match score, worst first.
    ScoreAsc,
    /// Creation time, newest first.
    Newest,
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortMode::ScoreDesc => write!(f, "score-desc"),
            SortMode::ScoreAsc => write!(f, "score-asc"),
            SortMode::Newest => write!(f, "newest"),
        }
    }
}

/// Produce a new ordering of `results` without mutating the input.
///
/// Equal keys keep their input order (the underlying sort is stable), so
/// repeated re-sorts do not shuffle ties.
pub fn rank(results: &[TopicResult], mode: SortMode) -> Vec<TopicResult> {
    let mut ordered = results.to_vec();
    match mode {
        SortMode::Newest => {
            ordered.sort_by(|a, b| b.created_at.unwrap_or(0).cmp(&a.created_at.unwrap_or(0)))
        }
        SortMode::ScoreAsc => ordered.sort_by(|a, b| cmp_scores(a, b)),
        SortMode::ScoreDesc => ordered.sort_by(|a, b| cmp_scores(b, a)),
    }
    ordered
}

fn cmp_scores(a: &TopicResult, b: &TopicResult) -> Ordering {
    score_value(a)
        .partial_cmp(&score_value(b))
        .unwrap_or(Ordering::Equal)
}

/// Numeric value of a "value/maxValue" score string, e.g. "8.5/10" → 8.5.
///
/// Absent or unparseable scores rank as 0 — they lose ranking preference
/// but never cause an error.
pub fn score_value(result: &TopicResult) -> f64 {
    result
        .match_score
        .as_deref()
        .and_then(|score| score.split('/').next())
        .and_then(|token| token.trim().parse::<f64>().ok())
        .unwrap_or(0.0)
}
