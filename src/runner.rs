use crate::config::{CaseConfig, Config};
use crate::eval_log::EvaluationLog;
use crate::judge::{CompletionBackend, Judge, OpenAiCompatibleBackend};
use crate::models::{
    CaseOutcome, Evaluation, EvaluationRecord, EvaluationRequest, RunSummary, Statistics,
};
use crate::rubric::Rubric;
use crate::validation::validate_answer;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Key used for the aggregate score in statistics
pub const TOTAL_KEY: &str = "total";

/// Main runner that orchestrates the evaluation process
pub struct Runner<B> {
    config: Config,
    judge: Judge<B>,
    log: EvaluationLog,
}

impl Runner<OpenAiCompatibleBackend> {
    /// Create a runner talking to the backend named in the configuration
    pub fn from_config(config: Config) -> Result<Self> {
        let backend = OpenAiCompatibleBackend::from_config(&config.judge)?;
        Ok(Self::new(config, backend))
    }
}

impl<B: CompletionBackend> Runner<B> {
    pub fn new(config: Config, backend: B) -> Self {
        let rubric = Rubric::new(config.judge.rubric);
        let log = EvaluationLog::new(&config.log_path, rubric.clone());

        Self {
            config,
            judge: Judge::new(backend, rubric),
            log,
        }
    }

    pub fn log(&self) -> &EvaluationLog {
        &self.log
    }

    /// Build the prompt, ask the judge and extract the scores for one pair
    pub async fn run_evaluation(&self, request: &EvaluationRequest) -> Evaluation {
        self.judge.evaluate(request).await
    }

    /// Run every configured case in order
    pub async fn run_all(&self) -> Result<RunSummary> {
        let total_cases = self.config.cases.len();
        let mut records = Vec::with_capacity(total_cases);
        let mut judge_failures = 0;

        for (index, case) in self.config.cases.iter().enumerate() {
            let outcome = self
                .run_case(case, index + 1, total_cases)
                .await
                .with_context(|| format!("Failed to evaluate question: {}", case.question))?;
            if outcome.judge_failed {
                judge_failures += 1;
            }
            records.push(outcome.record);
        }

        if judge_failures > 0 {
            warn!(failed = judge_failures, total = total_cases, "Some judge calls failed");
        }

        let statistics = calculate_statistics(&records, self.judge.rubric());
        Ok(RunSummary {
            statistics,
            judge_failures,
            records,
        })
    }

    /// Evaluate, validate and log a single case
    pub async fn run_case(
        &self,
        case: &CaseConfig,
        case_num: usize,
        total_cases: usize,
    ) -> Result<CaseOutcome> {
        info!(case = case_num, total = total_cases, "Evaluating case");

        let answer = self.resolve_answer(case).await;
        let request = EvaluationRequest {
            question: case.question.clone(),
            answer,
            model_name: self.config.judge.model.clone(),
            temperature: self.config.judge.temperature,
        };

        let evaluation = self.run_evaluation(&request).await;
        let judge_failed = evaluation.failed;
        let validation = validate_answer(&request.question, &request.answer);
        debug!(status = %validation.status, "Validated answer");

        let record = self.log.record(&request, evaluation, validation)?;
        info!(
            case = case_num,
            total_rating = ?record.scores.total,
            path = %self.log.path().display(),
            "Logged evaluation"
        );

        Ok(CaseOutcome {
            record,
            judge_failed,
        })
    }

    /// Use the case's answer, or generate one when it has none
    async fn resolve_answer(&self, case: &CaseConfig) -> String {
        if let Some(answer) = &case.answer {
            return answer.clone();
        }

        let generation = &self.config.generation;
        debug!(model = %generation.model, "Generating answer");
        let answer = self
            .judge
            .generate(
                &case.question,
                &generation.provider,
                &generation.model,
                generation.temperature,
            )
            .await;

        if answer.starts_with("Error:") {
            warn!(
                question = %case.question,
                "Answer generation failed, evaluating the error text"
            );
        }
        answer
    }
}

/// Mean and median of every rubric score across records, skipping absent values
pub fn calculate_statistics(records: &[EvaluationRecord], rubric: &Rubric) -> Statistics {
    let mut statistics = Statistics::default();

    let keys = std::iter::once(TOTAL_KEY).chain(rubric.dimensions.iter().map(|d| d.name));
    for key in keys {
        let scores = collect_scores(records, key);
        statistics.count.insert(key.to_string(), scores.len());

        if scores.is_empty() {
            continue;
        }

        statistics.mean.insert(key.to_string(), calculate_mean(&scores));
        statistics.median.insert(key.to_string(), calculate_median(&scores));
    }

    statistics
}

fn collect_scores(records: &[EvaluationRecord], key: &str) -> Vec<f64> {
    records
        .iter()
        .filter_map(|r| {
            if key == TOTAL_KEY {
                r.scores.total
            } else {
                r.scores.get(key)
            }
        })
        .map(f64::from)
        .collect()
}

fn calculate_mean(scores: &[f64]) -> f64 {
    let sum: f64 = scores.iter().sum();
    sum / scores.len() as f64
}

fn calculate_median(scores: &[f64]) -> f64 {
    let mut sorted_scores = scores.to_vec();
    sorted_scores.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted_scores.len() / 2;
    if sorted_scores.len() % 2 == 0 {
        (sorted_scores[mid - 1] + sorted_scores[mid]) / 2.0
    } else {
        sorted_scores[mid]
    }
}

/// Keys of a statistics table in rubric order
pub fn statistic_keys(rubric: &Rubric) -> Vec<String> {
    std::iter::once(TOTAL_KEY.to_string())
        .chain(rubric.dimensions.iter().map(|d| d.name.to_string()))
        .collect()
}

/// Count how many records carry each validation status
pub fn count_statuses(records: &[EvaluationRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.validation_status.clone()).or_insert(0) += 1;
    }
    counts
}
