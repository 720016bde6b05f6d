//! Filesystem result sink for batch reports

use async_trait::async_trait;
use review_guard_domain::{BatchReport, ResultSink, ResultSinkError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// On-disk layout of batch results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed JSON of the whole report
    #[default]
    Json,
    /// One JSON entry per line, in input order
    Jsonl,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Jsonl => f.write_str("jsonl"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "jsonl" | "ndjson" => Ok(OutputFormat::Jsonl),
            other => Err(format!("Unknown output format '{}' (expected json|jsonl)", other)),
        }
    }
}

/// Writes a finished batch to a file, replacing any previous content
#[derive(Debug, Clone)]
pub struct FsResultSink {
    path: PathBuf,
    format: OutputFormat,
}

impl FsResultSink {
    pub fn new(path: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn create_parent(&self) -> Result<(), ResultSinkError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    fn render(&self, report: &BatchReport) -> Result<Vec<u8>, ResultSinkError> {
        match self.format {
            OutputFormat::Json => {
                let mut out = serde_json::to_vec_pretty(report)?;
                out.push(b'\n');
                Ok(out)
            }
            OutputFormat::Jsonl => {
                let mut out = Vec::new();
                for entry in &report.entries {
                    serde_json::to_writer(&mut out, entry)?;
                    out.push(b'\n');
                }
                Ok(out)
            }
        }
    }
}

#[async_trait]
impl ResultSink for FsResultSink {
    /// Create the parent directory and open the file for writing.
    ///
    /// Existing content is left alone until `persist` replaces it.
    async fn prepare(&self) -> Result<(), ResultSinkError> {
        self.create_parent().await?;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .open(&self.path)
            .await?;
        Ok(())
    }

    async fn persist(&self, report: &BatchReport) -> Result<(), ResultSinkError> {
        self.create_parent().await?;

        let body = self.render(report)?;
        let mut file = fs::File::create(&self.path).await?;
        file.write_all(&body).await?;
        file.flush().await?;

        tracing::info!(
            path = %self.path.display(),
            format = %self.format,
            entries = report.entries.len(),
            "Wrote batch results"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_guard_domain::{BatchEntry, Label, Verdict};
    use serde_json::Value;
    use tempfile::TempDir;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn sample_report() -> BatchReport {
        let mut ok = BatchEntry::pending("r1");
        ok.classify_as(
            Verdict {
                label: Label::Advertisement,
                confidence: Some(0.9),
                relevant: Some(false),
                rationale: None,
                indicators: vec!["www.x.com".to_string()],
                raw_response: "{}".to_string(),
            },
            1,
        );
        let mut failed = BatchEntry::pending("r2");
        failed.fail("Rate limited");

        let now = OffsetDateTime::now_utc();
        BatchReport::new(Uuid::new_v4(), now, now, vec![ok, failed])
    }

    #[tokio::test]
    async fn test_writes_pretty_json_report() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("out/results.json");

        let sink = FsResultSink::new(path.clone(), OutputFormat::Json);
        sink.persist(&sample_report()).await.expect("persist");

        let contents = tokio::fs::read_to_string(&path).await.expect("read results");
        let value: Value = serde_json::from_str(&contents).expect("valid json");

        assert_eq!(value["total"], 2);
        assert_eq!(value["classified"], 1);
        assert_eq!(value["failed"], 1);
        assert_eq!(value["entries"][0]["review_id"], "r1");
        assert_eq!(value["entries"][0]["label"], "advertisement");
        assert_eq!(value["entries"][1]["state"], "failed");
        assert_eq!(value["entries"][1]["error"], "Rate limited");
    }

    #[tokio::test]
    async fn test_writes_jsonl_entries_and_overwrites() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("results.jsonl");
        tokio::fs::write(&path, "stale\nstale\nstale\n").await.unwrap();

        let sink = FsResultSink::new(path.clone(), OutputFormat::Jsonl);
        sink.persist(&sample_report()).await.expect("persist");

        let contents = tokio::fs::read_to_string(&path).await.expect("read results");
        let lines: Vec<Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).expect("valid json line"))
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["review_id"], "r1");
        assert_eq!(lines[1]["review_id"], "r2");
        assert!(lines[1].get("label").is_none());
    }

    #[tokio::test]
    async fn test_prepare_creates_output_and_keeps_content() {
        let dir = TempDir::new().expect("temp dir");
        let fresh = dir.path().join("nested/results.json");
        let existing = dir.path().join("previous.json");
        tokio::fs::write(&existing, "previous run").await.unwrap();

        FsResultSink::new(fresh.clone(), OutputFormat::Json)
            .prepare()
            .await
            .expect("prepare");
        FsResultSink::new(existing.clone(), OutputFormat::Json)
            .prepare()
            .await
            .expect("prepare");

        assert!(fresh.is_file());
        assert_eq!(
            tokio::fs::read_to_string(&existing).await.unwrap(),
            "previous run"
        );
    }

    #[tokio::test]
    async fn test_prepare_fails_when_parent_is_a_file() {
        let dir = TempDir::new().expect("temp dir");
        let blocker = dir.path().join("blocker");
        tokio::fs::write(&blocker, "not a directory").await.unwrap();

        let sink = FsResultSink::new(blocker.join("results.json"), OutputFormat::Json);
        assert!(matches!(sink.prepare().await, Err(ResultSinkError::Io(_))));
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("JSONL".parse::<OutputFormat>().unwrap(), OutputFormat::Jsonl);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("csv".parse::<OutputFormat>().is_err());
    }
}
