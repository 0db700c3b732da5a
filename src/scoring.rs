use crate::models::ScoreSet;
use crate::rubric::{Rubric, ScoreScale};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Labels accepted for the aggregate score, most specific first
pub const TOTAL_LABELS: [&str; 4] = ["Total Score", "Total Rating", "Rating", "Score"];

/// Scale of the single-rating rubric
const RATING_SCALE: ScoreScale = ScoreScale::new(1, 4);

/// Compiled field patterns keyed by label
static FIELD_PATTERNS: Lazy<Mutex<HashMap<String, Regex>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn field_pattern(label: &str) -> Option<Regex> {
    let mut patterns = FIELD_PATTERNS
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(re) = patterns.get(label) {
        return Some(re.clone());
    }

    let pattern = format!(r"(?i){}[ \t:*_=#\-]*([0-9]{{1,2}})\b", regex::escape(label));
    let re = Regex::new(&pattern).ok()?;
    patterns.insert(label.to_string(), re.clone());
    Some(re)
}

/// Extract the number written after `label`.
///
/// The label is matched case-insensitively and may be followed by spaces,
/// tabs and the characters `: * _ - = #` before the number, which covers
/// markdown emphasis such as `**Total Score:** 8`. Only ASCII digits count
/// and the number has to sit on the same line as the label. The first
/// occurrence of the label followed by a number is used; a value outside
/// `scale` counts as not found.
pub fn extract_field(label: &str, text: &str, scale: ScoreScale) -> Option<u8> {
    let re = field_pattern(label)?;

    let value: u8 = re.captures(text)?.get(1)?.as_str().parse().ok()?;
    scale.contains(value).then_some(value)
}

/// Extract the aggregate score, trying each of [`TOTAL_LABELS`] in order.
///
/// The bare `Score` synonym also matches dimension lines: a response that
/// gives `Relevance Score: 9` but no total yields 9 here.
pub fn extract_total(text: &str, scale: ScoreScale) -> Option<u8> {
    TOTAL_LABELS
        .iter()
        .find_map(|label| extract_field(label, text, scale))
}

/// Extract the 1-4 rating used by the simple rubric
pub fn extract_rating(text: &str) -> Option<u8> {
    extract_total(text, RATING_SCALE)
}

/// Extract the total and every rubric dimension from a judge response
pub fn extract_scores(text: &str, rubric: &Rubric) -> ScoreSet {
    let mut scores = ScoreSet::absent(rubric);
    scores.total = extract_total(text, rubric.scale);

    for dimension in &rubric.dimensions {
        scores.dimensions.insert(
            dimension.name.to_string(),
            extract_field(dimension.label, text, rubric.scale),
        );
    }

    scores
}
