use crate::model::SubjectResult;
use std::collections::BTreeMap;

/// Wrong answers needed to cancel one correct answer.
pub const WRONG_PER_CORRECT: f64 = 4.0;

/// 2-decimal rounding, half away from zero: `round(100*x) / 100`.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Net for one subject. Negative nets are kept as-is.
pub fn compute_subject_net(correct: f64, incorrect: f64) -> f64 {
    round2(correct - incorrect / WRONG_PER_CORRECT)
}

pub fn subject_result_from_counts(correct: f64, incorrect: f64) -> SubjectResult {
    SubjectResult {
        correct,
        incorrect,
        net: compute_subject_net(correct, incorrect),
    }
}

/// Source only supplied a net; counts are unknown and stored as zero.
pub fn subject_result_from_net(net: f64) -> SubjectResult {
    SubjectResult {
        correct: 0.0,
        incorrect: 0.0,
        net: round2(net),
    }
}

pub fn compute_total_net(results: &BTreeMap<String, SubjectResult>) -> f64 {
    round2(results.values().map(|r| r.net).sum())
}

/// Full-precision mean; `None` for an empty input. Round only the final figure.
pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut sum = 0.0_f64;
    let mut n: usize = 0;
    for v in values {
        sum += v;
        n += 1;
    }
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}
