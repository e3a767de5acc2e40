//! study.raw_event.v1 schema
//!
//! Wire format for raw event records and confession records as exported by
//! the session-ingestion API. Raw records are deliberately permissive: every
//! field is optional so one malformed record never fails the whole parse —
//! validation happens per record, per participant, during normalization.

use crate::error::AnalysisError;
use crate::types::{ConfessionRecord, Event, EventType, SessionPhase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current input schema version
pub const SCHEMA_VERSION: &str = "study.raw_event.v1";

/// A raw event record as exported by the ingestion store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEventRecord {
    /// Schema version identifier (optional; older exports omit it)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    /// Participant the event belongs to
    #[serde(default, alias = "participant_id")]
    pub participant_id: Option<String>,
    /// Study phase (tutorial or main)
    #[serde(default, alias = "session_phase")]
    pub session_phase: Option<String>,
    /// Event type name
    #[serde(default, rename = "type", alias = "event_type")]
    pub event_type: Option<String>,
    /// ISO-8601 timestamp
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Type-dependent payload, passed through as-is
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl RawEventRecord {
    /// Check mandatory fields without converting
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.participant_id.as_deref().map_or(true, str::is_empty) {
            return Err(AnalysisError::MissingField("participantId".to_string()));
        }
        match self.event_type.as_deref() {
            None | Some("") => return Err(AnalysisError::MissingField("type".to_string())),
            Some(raw) => {
                parse_event_type(raw)?;
            }
        }
        match &self.timestamp {
            None => return Err(AnalysisError::MissingField("timestamp".to_string())),
            Some(raw) => {
                parse_timestamp(raw)?;
            }
        }
        Ok(())
    }

    /// Convert to a canonical [`Event`], validating mandatory fields
    ///
    /// A missing or unrecognized phase does not fail the record; it defaults
    /// to the main round and the caller records an `UnknownPhase` note.
    pub fn to_event(&self) -> Result<Event, AnalysisError> {
        self.validate()?;

        let participant_id = self.participant_id.clone().unwrap_or_default();
        let event_type = parse_event_type(self.event_type.as_deref().unwrap_or_default())?;
        let timestamp = parse_timestamp(self.timestamp.as_deref().unwrap_or_default())?;
        let phase = self
            .session_phase
            .as_deref()
            .and_then(parse_phase)
            .unwrap_or(SessionPhase::Main);

        let mut event = Event {
            participant_id,
            phase,
            event_type,
            timestamp,
            word: None,
            page: None,
            confession: None,
        };

        match event_type {
            EventType::WordValidation | EventType::WordSubmission | EventType::WordRemoval => {
                event.word = serde_json::from_value(self.payload.clone()).ok();
            }
            EventType::PageLeave | EventType::PageReturn => {
                event.page = serde_json::from_value(self.payload.clone()).ok();
            }
            EventType::Confession => {
                event.confession = serde_json::from_value(self.payload.clone()).ok();
            }
            EventType::MouseInactiveStart | EventType::MouseActive => {}
        }

        Ok(event)
    }

    /// Whether the record names a phase the taxonomy knows
    pub fn has_known_phase(&self) -> bool {
        self.session_phase.as_deref().and_then(parse_phase).is_some()
    }
}

/// A raw confession record as exported by the ingestion store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConfessionRecord {
    #[serde(default, alias = "participant_id")]
    pub participant_id: Option<String>,
    #[serde(default, alias = "confessed_words")]
    pub confessed_words: Vec<String>,
    #[serde(default, alias = "used_external_resources")]
    pub used_external_resources: bool,
}

impl RawConfessionRecord {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.participant_id.as_deref().map_or(true, str::is_empty) {
            return Err(AnalysisError::MissingField("participantId".to_string()));
        }
        Ok(())
    }

    pub fn to_confession(&self) -> Result<ConfessionRecord, AnalysisError> {
        self.validate()?;
        Ok(ConfessionRecord {
            participant_id: self.participant_id.clone().unwrap_or_default(),
            confessed_words: self
                .confessed_words
                .iter()
                .map(|w| w.trim().to_uppercase())
                .filter(|w| !w.is_empty())
                .collect(),
            used_external_resources: self.used_external_resources,
        })
    }
}

/// Parses and groups raw records for one analysis run
pub struct RecordAdapter;

impl RecordAdapter {
    /// Parse a JSON array of raw event records
    pub fn parse_array(json: &str) -> Result<Vec<RawEventRecord>, AnalysisError> {
        let records: Vec<RawEventRecord> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Parse NDJSON (one raw event record per line)
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<RawEventRecord>, AnalysisError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawEventRecord>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    return Err(AnalysisError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(records)
    }

    /// Parse a JSON array of confession records
    pub fn parse_confession_array(json: &str) -> Result<Vec<RawConfessionRecord>, AnalysisError> {
        let records: Vec<RawConfessionRecord> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Parse NDJSON confession records
    pub fn parse_confession_ndjson(
        ndjson: &str,
    ) -> Result<Vec<RawConfessionRecord>, AnalysisError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawConfessionRecord>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    return Err(AnalysisError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(records)
    }

    /// Group records by participant id, in stable (sorted) participant order.
    ///
    /// Records missing a participant id cannot be attributed to anyone; they
    /// are returned separately as orphans so the run can report them.
    pub fn group_by_participant(
        records: Vec<RawEventRecord>,
    ) -> (BTreeMap<String, Vec<RawEventRecord>>, Vec<RawEventRecord>) {
        let mut by_participant: BTreeMap<String, Vec<RawEventRecord>> = BTreeMap::new();
        let mut orphans = Vec::new();

        for record in records {
            match record.participant_id.as_deref() {
                Some(id) if !id.is_empty() => {
                    by_participant.entry(id.to_string()).or_default().push(record);
                }
                _ => orphans.push(record),
            }
        }

        (by_participant, orphans)
    }

    /// Validate a batch of records without converting
    pub fn validate_records(records: &[RawEventRecord]) -> Vec<ValidationIssue> {
        records
            .iter()
            .enumerate()
            .filter_map(|(idx, record)| {
                record.validate().err().map(|error| ValidationIssue {
                    index: idx,
                    participant_id: record.participant_id.clone(),
                    error: error.to_string(),
                })
            })
            .collect()
    }
}

/// One record that failed validation
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub index: usize,
    pub participant_id: Option<String>,
    pub error: String,
}

fn parse_event_type(raw: &str) -> Result<EventType, AnalysisError> {
    match raw {
        "page_leave" => Ok(EventType::PageLeave),
        "page_return" => Ok(EventType::PageReturn),
        "mouse_inactive_start" => Ok(EventType::MouseInactiveStart),
        "mouse_active" => Ok(EventType::MouseActive),
        "word_validation" => Ok(EventType::WordValidation),
        "word_submission" => Ok(EventType::WordSubmission),
        "word_removal" => Ok(EventType::WordRemoval),
        "confession" => Ok(EventType::Confession),
        other => Err(AnalysisError::UnknownEventType(other.to_string())),
    }
}

fn parse_phase(raw: &str) -> Option<SessionPhase> {
    match raw {
        "tutorial" | "practice" => Some(SessionPhase::Tutorial),
        "main" => Some(SessionPhase::Main),
        _ => None,
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, AnalysisError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AnalysisError::TimestampError(format!("{raw:?}: {e}")))
}
