//! REST API types returned to the UI shell.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::models::ChartData;
use crate::transform::pipeline::{PipelineRun, SourceInfo, StagePreview};

/// Response to `POST /api/preview`: one report per uploaded file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    /// Unique job identifier
    pub job_id: String,

    /// "ready" (all files ok), "partial" or "error" (no file ok)
    pub status: String,

    pub processed_at: DateTime<Utc>,

    pub files: Vec<FileReport>,
}

impl PreviewResponse {
    pub fn new(files: Vec<FileReport>) -> Self {
        let failed = files.iter().filter(|f| f.error.is_some()).count();
        let status = if failed == 0 {
            "ready"
        } else if failed == files.len() {
            "error"
        } else {
            "partial"
        };

        Self {
            job_id: Uuid::new_v4().to_string(),
            status: status.to_string(),
            processed_at: Utc::now(),
            files,
        }
    }
}

/// Outcome of one file's pipeline run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub file_name: String,

    /// Human-readable failure, `None` on success
    pub error: Option<String>,

    pub source: Option<SourceInfo>,

    /// Column names after the last stage (choices for the column picker)
    pub columns: Vec<String>,

    pub previews: Vec<StagePreview>,

    pub chart: Option<ChartData>,

    pub duplicates_removed: usize,

    pub cells_filled: usize,
}

impl FileReport {
    pub fn from_result(file_name: impl Into<String>, result: Result<PipelineRun, PipelineError>) -> Self {
        match result {
            Ok(run) => Self::from(run),
            Err(e) => Self::failed(file_name, e.to_string()),
        }
    }

    pub fn failed(file_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            error: Some(error.into()),
            source: None,
            columns: Vec::new(),
            previews: Vec::new(),
            chart: None,
            duplicates_removed: 0,
            cells_filled: 0,
        }
    }
}

impl From<PipelineRun> for FileReport {
    fn from(run: PipelineRun) -> Self {
        FileReport {
            file_name: run.source.file_name.clone(),
            error: None,
            columns: run.table.column_names(),
            source: Some(run.source),
            previews: run.previews,
            chart: run.chart,
            duplicates_removed: run.duplicates_removed,
            cells_filled: run.cells_filled,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "files": []
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use crate::models::ConversionRequest;
    use crate::transform::pipeline::{run_pipeline, PipelineOptions};

    fn ok_report() -> FileReport {
        let run = run_pipeline(
            "a.csv",
            b"x,y\n1,2",
            &ConversionRequest::default(),
            &PipelineOptions::default(),
        )
        .unwrap();
        FileReport::from(run)
    }

    #[test]
    fn test_report_json_shape() {
        let json = serde_json::to_value(ok_report()).unwrap();

        assert_eq!(json["fileName"], "a.csv");
        assert_eq!(json["columns"], json!(["x", "y"]));
        assert_eq!(json["previews"][0]["stage"], "uploaded");
        assert_eq!(json["previews"][0]["columns"][0]["type"], "numeric");
        assert_eq!(json["previews"][0]["rows"], json!([[1.0, 2.0]]));
        assert!(json["error"].is_null());
    }

    #[test]
    fn test_status_reflects_failures() {
        let failed = FileReport::from_result("b.txt", Err(ParseError::Empty.into()));
        assert!(failed.error.as_deref().unwrap().contains("No columns"));

        assert_eq!(PreviewResponse::new(vec![ok_report()]).status, "ready");
        assert_eq!(PreviewResponse::new(vec![ok_report(), failed.clone()]).status, "partial");
        assert_eq!(PreviewResponse::new(vec![failed]).status, "error");
    }

    #[test]
    fn test_error_response() {
        let value = error_response("boom");
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"], "boom");
    }
}
