//! Audit report encoding
//!
//! Serializes an analysis run for downstream consumers: the metrics table as
//! flat rows for statistical tooling, and one provenance-stamped audit
//! document per participant so every verdict stays traceable to the rules
//! that produced it.

use crate::error::AnalysisError;
use crate::pipeline::{AnalysisRun, ParticipantArtifacts};
use crate::{ENGINE_VERSION, PRODUCER_NAME};
use serde::Serialize;

/// Current output schema version
pub const REPORT_VERSION: &str = "lexitrace.report.v1";

/// Output serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Newline-delimited JSON, one metrics row per line
    Ndjson,
    /// JSON array
    Json,
    /// Pretty-printed JSON array
    JsonPretty,
}

/// Provenance block stamped on every audit document
#[derive(Debug, Clone, Serialize)]
pub struct ReportProvenance {
    pub producer: String,
    pub version: String,
    pub report_version: String,
    pub run_id: String,
    pub computed_at_utc: String,
}

/// One participant's audit document
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantAuditDocument<'a> {
    pub provenance: ReportProvenance,
    #[serde(flatten)]
    pub artifacts: &'a ParticipantArtifacts,
}

/// Encoder for analysis-run outputs
#[derive(Debug, Default)]
pub struct ReportEncoder;

impl ReportEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Encode the metrics table in the requested format
    pub fn encode_metrics(
        &self,
        run: &AnalysisRun,
        format: ReportFormat,
    ) -> Result<String, AnalysisError> {
        match format {
            ReportFormat::Ndjson => {
                let mut lines = Vec::with_capacity(run.metrics.len());
                for row in &run.metrics {
                    lines.push(serde_json::to_string(row)?);
                }
                Ok(lines.join("\n") + "\n")
            }
            ReportFormat::Json => Ok(serde_json::to_string(&run.metrics)?),
            ReportFormat::JsonPretty => Ok(serde_json::to_string_pretty(&run.metrics)?),
        }
    }

    /// Encode one audit document per participant, each stamped with run
    /// provenance. Returns `(participant_id, json)` pairs in run order.
    pub fn encode_artifacts(
        &self,
        run: &AnalysisRun,
    ) -> Result<Vec<(String, String)>, AnalysisError> {
        let mut documents = Vec::with_capacity(run.artifacts.len());
        for artifacts in &run.artifacts {
            let document = ParticipantAuditDocument {
                provenance: self.provenance(run),
                artifacts,
            };
            documents.push((
                artifacts.participant_id.clone(),
                serde_json::to_string_pretty(&document)?,
            ));
        }
        Ok(documents)
    }

    /// Encode the run summary (provenance plus counts) as JSON
    pub fn encode_summary(&self, run: &AnalysisRun) -> Result<String, AnalysisError> {
        #[derive(Serialize)]
        struct RunSummary {
            provenance: ReportProvenance,
            participants: usize,
            participants_with_quality_issues: usize,
            orphan_record_count: usize,
        }

        let summary = RunSummary {
            provenance: self.provenance(run),
            participants: run.metrics.len(),
            participants_with_quality_issues: run
                .metrics
                .iter()
                .filter(|m| m.data_quality_issue)
                .count(),
            orphan_record_count: run.orphan_record_count,
        };
        serde_json::to_string_pretty(&summary).map_err(AnalysisError::JsonError)
    }

    fn provenance(&self, run: &AnalysisRun) -> ReportProvenance {
        ReportProvenance {
            producer: PRODUCER_NAME.to_string(),
            version: ENGINE_VERSION.to_string(),
            report_version: REPORT_VERSION.to_string(),
            run_id: run.run_id.clone(),
            computed_at_utc: run.computed_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::AnalysisEngine;
    use crate::schema::RawEventRecord;

    fn sample_run() -> AnalysisRun {
        let mut records = Vec::new();
        for p in ["p-1", "p-2"] {
            records.push(RawEventRecord {
                schema_version: None,
                participant_id: Some(p.to_string()),
                session_phase: Some("main".to_string()),
                event_type: Some("mouse_active".to_string()),
                timestamp: Some("2025-03-10T12:00:00Z".to_string()),
                payload: serde_json::Value::Null,
            });
            for i in 0..5u32 {
                records.push(RawEventRecord {
                    schema_version: None,
                    participant_id: Some(p.to_string()),
                    session_phase: Some("main".to_string()),
                    event_type: Some("word_validation".to_string()),
                    timestamp: Some(format!("2025-03-10T12:00:{:02}Z", 10 * (i + 1))),
                    payload: serde_json::json!({
                        "word": format!("WORD{i}"),
                        "length": 5,
                        "isValid": true,
                        "reward": 1.0
                    }),
                });
            }
        }
        AnalysisEngine::new().run(records, &[]).unwrap()
    }

    #[test]
    fn test_ndjson_has_one_row_per_participant() {
        let run = sample_run();
        let encoder = ReportEncoder::new();
        let ndjson = encoder.encode_metrics(&run, ReportFormat::Ndjson).unwrap();

        let lines: Vec<_> = ndjson.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 2);

        let row: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(row["participantId"], "p-1");
        assert!(row["cheatingRateMainRound"].is_number());
    }

    #[test]
    fn test_json_formats_parse_back() {
        let run = sample_run();
        let encoder = ReportEncoder::new();

        for format in [ReportFormat::Json, ReportFormat::JsonPretty] {
            let json = encoder.encode_metrics(&run, format).unwrap();
            let rows: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert_eq!(rows.as_array().unwrap().len(), 2);
        }
    }

    #[test]
    fn test_artifact_documents_carry_provenance() {
        let run = sample_run();
        let encoder = ReportEncoder::new();
        let documents = encoder.encode_artifacts(&run).unwrap();

        assert_eq!(documents.len(), 2);
        let (participant_id, json) = &documents[0];
        assert_eq!(participant_id, "p-1");

        let parsed: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(parsed["provenance"]["producer"], PRODUCER_NAME);
        assert_eq!(parsed["provenance"]["run_id"], run.run_id.as_str());
        assert!(parsed["verdicts"].is_array());
        assert!(parsed["intervals"].is_array());
    }

    #[test]
    fn test_summary_counts() {
        let run = sample_run();
        let encoder = ReportEncoder::new();
        let summary = encoder.encode_summary(&run).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&summary).unwrap();
        assert_eq!(parsed["participants"], 2);
        assert_eq!(parsed["participants_with_quality_issues"], 0);
        assert_eq!(parsed["orphan_record_count"], 0);
    }
}
