//! LLM-as-a-judge evaluation harness
//!
//! Sends a question/answer pair to a judge model with a fixed rubric, pulls
//! the numeric scores out of the judge's free-text reply and appends the
//! result to a CSV evaluation log.
//!
//! Pipeline for one pair:
//!
//! 1. [`rubric::Rubric::build_prompt`] renders the rubric template.
//! 2. [`judge::Judge::evaluate`] calls the backend; failures become data.
//! 3. [`scoring::extract_scores`] recovers the scores.
//! 4. [`validation::validate_answer`] labels the answer.
//! 5. [`eval_log::EvaluationLog::record`] stamps and appends the row.
//!
//! [`runner::Runner`] drives these steps for every case of a run file.

pub mod config;
pub mod eval_log;
pub mod judge;
pub mod models;
pub mod output;
pub mod rubric;
pub mod runner;
pub mod scoring;
pub mod validation;
