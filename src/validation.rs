use crate::models::Validation;

pub const VALID: &str = "Valid";

/// Check that an answer is usable before it is logged.
///
/// A valid answer gets a completeness score of 1.0, anything else 0.0.
pub fn validate_answer(question: &str, answer: &str) -> Validation {
    match find_problem(question, answer) {
        Some(problem) => Validation {
            status: format!("Invalid: {}", problem),
            completeness_score: 0.0,
        },
        None => Validation {
            status: VALID.to_string(),
            completeness_score: 1.0,
        },
    }
}

fn find_problem(question: &str, answer: &str) -> Option<&'static str> {
    if answer.trim().is_empty() {
        return Some("answer is empty");
    }
    if normalize(answer) == normalize(question) {
        return Some("answer repeats the question");
    }
    if answer.starts_with("Error:") {
        return Some("answer generation failed");
    }
    None
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
