use crate::models::{Evaluation, EvaluationRecord, EvaluationRequest, ScoreSet, Validation};
use crate::rubric::Rubric;
use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime, Timelike};
use csv::{ReaderBuilder, StringRecord, Writer};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Format of the timestamp column
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Written in place of a value that is absent
pub const MISSING: &str = "NA";

const LEADING_COLUMNS: [&str; 7] = [
    "timestamp",
    "model",
    "temperature",
    "question",
    "answer",
    "judge_feedback",
    "judge_prompt",
];

const TRAILING_COLUMNS: [&str; 2] = ["validation_status", "completeness_score"];

/// Append-only CSV table of evaluation records.
///
/// Every append rewrites the whole table into a sibling `.tmp` file and
/// renames it over the log, so a failed write leaves the previous contents in
/// place. There is no locking, so two processes appending at the same time can
/// lose one of the rows.
pub struct EvaluationLog {
    path: PathBuf,
    rubric: Rubric,
}

impl EvaluationLog {
    pub fn new(path: impl Into<PathBuf>, rubric: Rubric) -> Self {
        Self {
            path: path.into(),
            rubric,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Header of the table: fixed columns, then one score column per rubric dimension
    pub fn columns(&self) -> Vec<String> {
        let scale = self.rubric.scale;
        LEADING_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(std::iter::once(format!("total_rating({}-{})", scale.min, scale.max)))
            .chain(TRAILING_COLUMNS.iter().map(|c| c.to_string()))
            .chain(self.rubric.dimensions.iter().map(|d| format!("{}_score", d.name)))
            .collect()
    }

    /// Stamp an evaluation with the current time and append it
    pub fn record(
        &self,
        request: &EvaluationRequest,
        evaluation: Evaluation,
        validation: Validation,
    ) -> Result<EvaluationRecord> {
        let now = Local::now().naive_local();
        let timestamp = now.with_nanosecond(0).unwrap_or(now);

        let record = EvaluationRecord::new(timestamp, request, evaluation, validation);
        self.append(&record)?;
        Ok(record)
    }

    /// Add one record to the end of the table, creating the file if needed
    pub fn append(&self, record: &EvaluationRecord) -> Result<()> {
        let mut rows = self.read_rows()?;
        rows.push(self.to_row(record));
        self.write_rows(&rows)?;

        debug!(path = %self.path.display(), rows = rows.len(), "Appended evaluation");
        Ok(())
    }

    /// All records in insertion order; empty when nothing has been logged yet
    pub fn history(&self) -> Result<Vec<EvaluationRecord>> {
        self.read_rows()?
            .iter()
            .enumerate()
            .map(|(index, row)| {
                self.parse_row(row).with_context(|| {
                    format!("Invalid row {} in {}", index + 1, self.path.display())
                })
            })
            .collect()
    }

    fn read_rows(&self) -> Result<Vec<StringRecord>> {
        if !self.has_content()? {
            return Ok(Vec::new());
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)
            .with_context(|| format!("Failed to open evaluation log: {}", self.path.display()))?;

        let columns = self.columns();
        let headers = reader
            .headers()
            .with_context(|| format!("Failed to read header of {}", self.path.display()))?;
        if !headers.iter().eq(columns.iter().map(String::as_str)) {
            anyhow::bail!(
                "Evaluation log {} has columns [{}], expected [{}]",
                self.path.display(),
                headers.iter().collect::<Vec<_>>().join(", "),
                columns.join(", ")
            );
        }

        reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to read evaluation log: {}", self.path.display()))
    }

    fn has_content(&self) -> Result<bool> {
        match std::fs::metadata(&self.path) {
            Ok(metadata) => Ok(metadata.len() > 0),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err).with_context(|| {
                format!("Failed to inspect evaluation log: {}", self.path.display())
            }),
        }
    }

    fn write_rows(&self, rows: &[StringRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let temp_path = self.temp_path();
        let result = self.write_table(&temp_path, rows).and_then(|()| {
            std::fs::rename(&temp_path, &self.path).with_context(|| {
                format!("Failed to replace evaluation log: {}", self.path.display())
            })
        });
        if result.is_err() {
            let _ = std::fs::remove_file(&temp_path);
        }
        result
    }

    fn write_table(&self, path: &Path, rows: &[StringRecord]) -> Result<()> {
        let context = || format!("Failed to write evaluation log: {}", path.display());

        let mut writer = Writer::from_path(path).with_context(context)?;
        writer.write_record(self.columns()).with_context(context)?;
        for row in rows {
            writer.write_record(row).with_context(context)?;
        }
        writer.flush().with_context(context)?;
        writer.get_ref().sync_all().with_context(context)
    }

    /// Sibling file the table is written to before it replaces the log
    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn to_row(&self, record: &EvaluationRecord) -> StringRecord {
        let mut row = StringRecord::new();
        row.push_field(&record.timestamp.format(TIMESTAMP_FORMAT).to_string());
        row.push_field(&record.model);
        row.push_field(&optional(record.temperature));
        row.push_field(&record.question);
        row.push_field(&record.answer);
        row.push_field(&record.judge_feedback);
        row.push_field(&record.judge_prompt);
        row.push_field(&optional(record.scores.total));
        row.push_field(&record.validation_status);
        row.push_field(&optional(record.completeness_score));
        for dimension in &self.rubric.dimensions {
            row.push_field(&optional(record.scores.get(dimension.name)));
        }
        row
    }

    fn parse_row(&self, row: &StringRecord) -> Result<EvaluationRecord> {
        let field = move |index: usize| row.get(index).unwrap_or_default();

        let timestamp = NaiveDateTime::parse_from_str(field(0), TIMESTAMP_FORMAT)
            .with_context(|| format!("Invalid timestamp: {}", field(0)))?;

        let mut scores = ScoreSet::absent(&self.rubric);
        scores.total = parse_optional(field(7)).context("Invalid total rating")?;

        let first_dimension = LEADING_COLUMNS.len() + 1 + TRAILING_COLUMNS.len();
        for (offset, dimension) in self.rubric.dimensions.iter().enumerate() {
            let value = parse_optional(field(first_dimension + offset))
                .with_context(|| format!("Invalid {} score", dimension.name))?;
            scores.dimensions.insert(dimension.name.to_string(), value);
        }

        Ok(EvaluationRecord {
            timestamp,
            model: field(1).to_string(),
            temperature: parse_optional(field(2)).context("Invalid temperature")?,
            question: field(3).to_string(),
            answer: field(4).to_string(),
            judge_feedback: field(5).to_string(),
            judge_prompt: field(6).to_string(),
            scores,
            validation_status: field(8).to_string(),
            completeness_score: parse_optional(field(9)).context("Invalid completeness score")?,
        })
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => MISSING.to_string(),
    }
}

fn parse_optional<T>(raw: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if raw == MISSING {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .with_context(|| format!("Cannot parse '{}'", raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rubric::RubricKind;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn timestamp(second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(9, 26, second)
            .unwrap()
    }

    fn multi_record(second: u32, relevance: Option<u8>, total: Option<u8>) -> EvaluationRecord {
        let mut dimensions = BTreeMap::new();
        dimensions.insert("relevance".to_string(), relevance);
        dimensions.insert("clarity".to_string(), Some(7));
        dimensions.insert("consistency".to_string(), None);
        dimensions.insert("creativity".to_string(), Some(10));

        EvaluationRecord {
            timestamp: timestamp(second),
            model: "gemini-2.5-flash".to_string(),
            temperature: Some(0.35),
            question: "Why is the sky blue?".to_string(),
            answer: "Rayleigh scattering, mostly.".to_string(),
            judge_feedback: "**Evaluation:**\nGood, \"concise\", correct.\n\nTotal Score: 8"
                .to_string(),
            judge_prompt: "Question: Why is the sky blue?\nAnswer: ...".to_string(),
            scores: ScoreSet { total, dimensions },
            validation_status: "Valid".to_string(),
            completeness_score: Some(1.0),
        }
    }

    #[test]
    fn test_history_without_file_is_empty() {
        let dir = tempdir().unwrap();
        let log = EvaluationLog::new(dir.path().join("evaluations.csv"), Rubric::default());

        assert!(log.history().unwrap().is_empty());
    }

    #[test]
    fn test_history_with_empty_file_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("evaluations.csv");
        std::fs::write(&path, "").unwrap();
        let log = EvaluationLog::new(&path, Rubric::default());

        assert!(log.history().unwrap().is_empty());
    }

    #[test]
    fn test_append_then_history_round_trip() {
        let dir = tempdir().unwrap();
        let log = EvaluationLog::new(dir.path().join("evaluations.csv"), Rubric::default());

        let records = vec![
            multi_record(1, Some(9), Some(8)),
            multi_record(2, None, None),
            multi_record(3, Some(1), Some(10)),
        ];
        for record in &records {
            log.append(record).unwrap();
        }

        let history = log.history().unwrap();
        assert_eq!(history, records);
        assert_eq!(history[1].scores.total, None);
        assert_eq!(history[1].scores.get("relevance"), None);
    }

    #[test]
    fn test_header_and_missing_marker_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("evaluations.csv");
        let log = EvaluationLog::new(&path, Rubric::default());

        log.append(&multi_record(5, None, Some(8))).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let header = content.lines().next().unwrap();
        assert_eq!(
            header,
            "timestamp,model,temperature,question,answer,judge_feedback,judge_prompt,\
             total_rating(1-10),validation_status,completeness_score,relevance_score,\
             clarity_score,consistency_score,creativity_score"
        );
        assert!(content.contains("2025-03-14 09:26:05"));
        assert!(content.ends_with(",1,NA,7,NA,10\n"));
    }

    #[test]
    fn test_failed_rewrite_keeps_existing_history() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("evaluations.csv");
        let log = EvaluationLog::new(&path, Rubric::default());
        let first = multi_record(1, Some(9), Some(8));
        log.append(&first).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let mut rows = log.read_rows().unwrap();
        rows.push(StringRecord::from(vec!["2025-03-14 09:26:02", "truncated"]));
        assert!(log.write_rows(&rows).is_err());

        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
        assert_eq!(log.history().unwrap(), vec![first]);
        assert!(!log.temp_path().exists());
    }

    #[test]
    fn test_append_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let log = EvaluationLog::new(dir.path().join("evaluations.csv"), Rubric::default());

        log.append(&multi_record(1, Some(9), Some(8))).unwrap();
        log.append(&multi_record(2, None, None)).unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["evaluations.csv"]);
        assert_eq!(log.history().unwrap().len(), 2);
    }

    #[test]
    fn test_simple_rubric_columns() {
        let log = EvaluationLog::new("unused.csv", Rubric::new(RubricKind::Simple));
        let columns = log.columns();

        assert_eq!(columns.len(), 10);
        assert_eq!(columns[7], "total_rating(1-4)");
        assert_eq!(columns.last().unwrap(), "completeness_score");
    }

    #[test]
    fn test_simple_rubric_round_trip_with_absent_temperature() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/evaluations.csv");
        let log = EvaluationLog::new(path, Rubric::new(RubricKind::Simple));

        let record = EvaluationRecord {
            timestamp: timestamp(0),
            model: "gemini-2.5-flash".to_string(),
            temperature: None,
            question: "What is 2+2?".to_string(),
            answer: "4".to_string(),
            judge_feedback: "**Evaluation:**\nCorrect.\n\n**Total Rating:** 4".to_string(),
            judge_prompt: "prompt".to_string(),
            scores: ScoreSet { total: Some(4), dimensions: BTreeMap::new() },
            validation_status: "Valid".to_string(),
            completeness_score: None,
        };
        log.append(&record).unwrap();

        assert_eq!(log.history().unwrap(), vec![record]);
    }

    #[test]
    fn test_mismatched_header_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("evaluations.csv");
        EvaluationLog::new(&path, Rubric::new(RubricKind::Simple))
            .append(&multi_record(1, None, Some(3)))
            .unwrap();

        let log = EvaluationLog::new(&path, Rubric::new(RubricKind::MultiDimension));
        let err = log.history().unwrap_err();
        assert!(err.to_string().contains("has columns"));
        assert!(log.append(&multi_record(2, None, None)).is_err());
    }

    #[test]
    fn test_invalid_score_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("evaluations.csv");
        let log = EvaluationLog::new(&path, Rubric::new(RubricKind::Simple));
        let header = log.columns().join(",");
        std::fs::write(
            &path,
            format!("{}\n2025-03-14 09:26:00,m,NA,q,a,f,p,zero,Valid,1\n", header),
        )
        .unwrap();

        let err = log.history().unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid total rating"));
    }

    #[test]
    fn test_record_stamps_whole_seconds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("evaluations.csv");
        let log = EvaluationLog::new(path, Rubric::new(RubricKind::Simple));
        let request = EvaluationRequest {
            question: "What is 2+2?".to_string(),
            answer: "4".to_string(),
            model_name: "gemini-2.5-flash".to_string(),
            temperature: Some(0.2),
        };
        let evaluation = Evaluation {
            feedback: "Total Rating: 4".to_string(),
            prompt: "prompt".to_string(),
            scores: ScoreSet { total: Some(4), dimensions: BTreeMap::new() },
            failed: false,
        };
        let validation = Validation {
            status: "Valid".to_string(),
            completeness_score: 1.0,
        };

        let record = log.record(&request, evaluation, validation).unwrap();

        assert_eq!(record.timestamp.nanosecond(), 0);
        assert_eq!(record.scores.total, Some(4));
        assert_eq!(log.history().unwrap(), vec![record]);
    }
}
