use crate::models::{EvaluationRecord, RunSummary, Statistics};
use crate::rubric::Rubric;
use crate::runner::{count_statuses, statistic_keys, TOTAL_KEY};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Output format options
#[derive(Debug, Clone, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    Plain,
    Json,
}

/// Print the records and statistics of a run in the specified format
pub fn print_summary(summary: &RunSummary, rubric: &Rubric, format: OutputFormat) {
    match format {
        OutputFormat::Plain => print!("{}", render_summary_plain(summary, rubric)),
        OutputFormat::Json => print_json(summary),
    }
}

/// Print the logged history in the specified format
pub fn print_history(records: &[EvaluationRecord], rubric: &Rubric, format: OutputFormat) {
    match format {
        OutputFormat::Plain => print!("{}", render_history_plain(records, rubric)),
        OutputFormat::Json => print_json(&records),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing results to JSON: {}", e),
    }
}

fn render_summary_plain(summary: &RunSummary, rubric: &Rubric) -> String {
    let mut out = String::new();

    out.push_str("📊 STATISTICS\n");
    out.push_str("-------------\n");
    out.push_str(&render_statistics_plain(&summary.statistics, rubric));
    let _ = writeln!(
        out,
        "Judge failures: {}/{}",
        summary.judge_failures,
        summary.records.len()
    );
    out.push('\n');

    out.push_str("📝 DETAILED RESULTS\n");
    out.push_str("-------------------\n");
    for (i, record) in summary.records.iter().enumerate() {
        let _ = writeln!(out, "Result #{}", i + 1);
        out.push_str(&render_record_plain(record, rubric));
        out.push('\n');
    }

    out
}

fn render_history_plain(records: &[EvaluationRecord], rubric: &Rubric) -> String {
    if records.is_empty() {
        return "No evaluations logged yet.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "🗂  HISTORY ({} evaluations)", records.len());
    out.push_str("----------------------------\n");
    for (i, record) in records.iter().enumerate() {
        let timestamp = record.timestamp.format("%Y-%m-%d %H:%M:%S");
        let _ = writeln!(out, "#{} at {}", i + 1, timestamp);
        out.push_str(&render_record_plain(record, rubric));
        out.push('\n');
    }

    out.push_str("Validation:\n");
    for (status, count) in count_statuses(records) {
        let _ = writeln!(out, "  • {}: {}", status, count);
    }

    out
}

fn render_record_plain(record: &EvaluationRecord, rubric: &Rubric) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Model: {}", record.model);
    let _ = writeln!(out, "Question: {}", record.question);
    let _ = writeln!(out, "Answer: {}", record.answer);
    out.push_str("Scores:\n");
    let _ = writeln!(
        out,
        "  • {}: {}",
        TOTAL_KEY,
        score_text(record.scores.total, rubric)
    );
    for dimension in &rubric.dimensions {
        let _ = writeln!(
            out,
            "  • {}: {}",
            dimension.name,
            score_text(record.scores.get(dimension.name), rubric)
        );
    }
    let _ = writeln!(out, "Validation: {}", record.validation_status);
    let _ = writeln!(out, "Feedback: {}", record.judge_feedback);
    out
}

fn score_text(score: Option<u8>, rubric: &Rubric) -> String {
    match score {
        Some(score) => format!("{}/{}", score, rubric.scale.max),
        None => "n/a".to_string(),
    }
}

fn render_statistics_plain(stats: &Statistics, rubric: &Rubric) -> String {
    if stats.mean.is_empty() {
        return "No statistics available.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<15} {:<8} {:<8} {:<8}",
        "Category", "Mean", "Median", "Count"
    );
    let _ = writeln!(out, "{}", "-".repeat(42));

    for key in statistic_keys(rubric) {
        let count = stats.count.get(&key).copied().unwrap_or(0);
        match (stats.mean.get(&key), stats.median.get(&key)) {
            (Some(mean), Some(median)) => {
                let _ = writeln!(
                    out,
                    "{:<15} {:<8.3} {:<8.3} {:<8}",
                    key, mean, median, count
                );
            }
            _ => {
                let _ = writeln!(out, "{:<15} {:<8} {:<8} {:<8}", key, "n/a", "n/a", count);
            }
        }
    }

    out
}
