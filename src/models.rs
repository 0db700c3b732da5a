use crate::rubric::Rubric;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Input to a single evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub question: String,
    pub answer: String,
    /// Judge model name
    pub model_name: String,
    /// Sampling temperature, left to the backend default when unset
    pub temperature: Option<f64>,
}

/// Scores recovered from a judge response; `None` marks a score that could not be extracted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSet {
    /// Aggregate score as stated by the judge
    pub total: Option<u8>,
    /// Per-dimension scores keyed by dimension name
    pub dimensions: BTreeMap<String, Option<u8>>,
}

impl ScoreSet {
    /// A score set with every rubric field absent
    pub fn absent(rubric: &Rubric) -> Self {
        Self {
            total: None,
            dimensions: rubric
                .dimensions
                .iter()
                .map(|d| (d.name.to_string(), None))
                .collect(),
        }
    }

    pub fn get(&self, dimension: &str) -> Option<u8> {
        self.dimensions.get(dimension).copied().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.total.is_none() && self.dimensions.values().all(Option::is_none)
    }
}

/// Judge output for one question/answer pair, before validation and logging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Raw judge response, or the error description when the call failed
    pub feedback: String,
    /// Prompt sent (or that would have been sent) to the judge
    pub prompt: String,
    pub scores: ScoreSet,
    /// Whether the backend call failed
    pub failed: bool,
}

/// Outcome of answer validation carried into the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    pub status: String,
    pub completeness_score: f64,
}

/// One row of the evaluation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub timestamp: NaiveDateTime,
    pub model: String,
    pub temperature: Option<f64>,
    pub question: String,
    pub answer: String,
    pub judge_feedback: String,
    pub judge_prompt: String,
    pub scores: ScoreSet,
    pub validation_status: String,
    pub completeness_score: Option<f64>,
}

impl EvaluationRecord {
    /// Assemble a record from the pieces produced by one evaluation
    pub fn new(
        timestamp: NaiveDateTime,
        request: &EvaluationRequest,
        evaluation: Evaluation,
        validation: Validation,
    ) -> Self {
        Self {
            timestamp,
            model: request.model_name.clone(),
            temperature: request.temperature,
            question: request.question.clone(),
            answer: request.answer.clone(),
            judge_feedback: evaluation.feedback,
            judge_prompt: evaluation.prompt,
            scores: evaluation.scores,
            validation_status: validation.status,
            completeness_score: Some(validation.completeness_score),
        }
    }
}

/// Mean and median of the scores present for each rubric field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub mean: BTreeMap<String, f64>,
    pub median: BTreeMap<String, f64>,
    /// Number of records with the score present
    pub count: BTreeMap<String, usize>,
}

/// Logged record of one case and whether its judge call failed
#[derive(Debug, Clone, PartialEq)]
pub struct CaseOutcome {
    pub record: EvaluationRecord,
    pub judge_failed: bool,
}

/// Records produced by one run, together with their statistics
#[derive(Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub statistics: Statistics,
    /// Cases whose judge call failed and were logged without scores
    pub judge_failures: usize,
    pub records: Vec<EvaluationRecord>,
}
