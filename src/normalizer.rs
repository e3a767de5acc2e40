//! Event normalization and extraction
//!
//! Client timestamps are untrusted input: retries duplicate events and
//! batching reorders them. This module is the single defensive repair point —
//! everything downstream assumes a deduplicated, time-ascending sequence.

use crate::error::AnalysisError;
use crate::schema::RawEventRecord;
use crate::types::{ConfessionRecord, DataQualityFlag, Event, EventType, SessionPhase, WordRecord};
use std::collections::{BTreeMap, HashSet};

/// A participant's repaired event sequence plus the repairs applied
#[derive(Debug, Clone)]
pub struct NormalizedEvents {
    pub participant_id: String,
    /// Time-ascending, deduplicated events
    pub events: Vec<Event>,
    /// Non-fatal repairs and oddities observed during normalization
    pub notes: Vec<DataQualityFlag>,
}

/// Normalize one participant's raw records into a canonical event sequence.
///
/// Fails when any record is missing a mandatory field (`participantId`,
/// `type`, `timestamp`), carries an unparsable timestamp, or names an event
/// type outside the taxonomy. The failure is per-participant: the caller
/// records it and continues with the rest of the run.
pub fn normalize_participant(
    participant_id: &str,
    records: &[RawEventRecord],
) -> Result<NormalizedEvents, AnalysisError> {
    let mut notes = Vec::new();
    let mut events = Vec::with_capacity(records.len());
    let mut saw_unknown_phase = false;

    for record in records {
        if !record.has_known_phase() {
            saw_unknown_phase = true;
        }
        events.push(record.to_event()?);
    }

    if saw_unknown_phase {
        notes.push(DataQualityFlag::UnknownPhase);
    }

    // Dedup by (type, timestamp, payload), keeping the first occurrence
    let mut seen: HashSet<String> = HashSet::with_capacity(events.len());
    let before = events.len();
    events.retain(|event| seen.insert(dedup_key(event)));
    if events.len() < before {
        notes.push(DataQualityFlag::DuplicatesDropped);
    }

    // Repair ordering; the tie-break on event type makes the order total
    let already_sorted = events
        .windows(2)
        .all(|pair| sort_key(&pair[0]) <= sort_key(&pair[1]));
    if !already_sorted {
        events.sort_by_key(sort_key);
        notes.push(DataQualityFlag::OutOfOrderRepaired);
    }

    for phase in [SessionPhase::Tutorial, SessionPhase::Main] {
        if !events.iter().any(|e| e.phase == phase) {
            notes.push(DataQualityFlag::EmptyPhase);
            break;
        }
    }

    Ok(NormalizedEvents {
        participant_id: participant_id.to_string(),
        events,
        notes,
    })
}

fn dedup_key(event: &Event) -> String {
    let payload = serde_json::to_string(&(&event.word, &event.page, &event.confession))
        .unwrap_or_default();
    format!(
        "{}|{}|{}|{}",
        event.phase.as_str(),
        event.event_type.as_str(),
        event.timestamp.timestamp_millis(),
        payload
    )
}

fn sort_key(event: &Event) -> (i64, SessionPhase, EventType) {
    (event.timestamp.timestamp_millis(), event.phase, event.event_type)
}

/// Split a normalized sequence by phase, preserving order
pub fn events_by_phase(events: &[Event]) -> BTreeMap<SessionPhase, Vec<Event>> {
    let mut by_phase: BTreeMap<SessionPhase, Vec<Event>> = BTreeMap::new();
    for event in events {
        by_phase.entry(event.phase).or_default().push(event.clone());
    }
    by_phase
}

/// Reconstruct word records from one phase's normalized events.
///
/// Creation time is measured from the previous validation (or the phase
/// start — the phase's first event — for the first word). Submission events
/// stamp `submitted_at` on the matching record; removal events mark the most
/// recent matching record removed. Matching is case-insensitive.
pub fn extract_word_records(
    participant_id: &str,
    phase: SessionPhase,
    events: &[Event],
) -> Vec<WordRecord> {
    let mut records: Vec<WordRecord> = Vec::new();
    let phase_start = match events.first() {
        Some(first) => first.timestamp,
        None => return records,
    };
    let mut previous_validation = phase_start;

    for event in events {
        let payload = match &event.word {
            Some(payload) if !payload.word.trim().is_empty() => payload,
            _ => continue,
        };
        let key = payload.word.trim().to_uppercase();

        match event.event_type {
            EventType::WordValidation => {
                let creation_time_sec =
                    (event.timestamp - previous_validation).num_milliseconds() as f64 / 1000.0;
                previous_validation = event.timestamp;

                records.push(WordRecord {
                    participant_id: participant_id.to_string(),
                    phase,
                    word: key,
                    length: payload.resolved_length(),
                    is_valid_dictionary_word: payload.is_valid.unwrap_or(false),
                    validated_at: event.timestamp,
                    submitted_at: None,
                    removed: false,
                    reward_if_valid: payload.reward.unwrap_or(0.0),
                    creation_time_sec,
                });
            }
            EventType::WordSubmission => {
                if let Some(record) = records
                    .iter_mut()
                    .rev()
                    .find(|r| r.word == key && !r.removed && r.submitted_at.is_none())
                {
                    record.submitted_at = Some(event.timestamp);
                }
            }
            EventType::WordRemoval => {
                if let Some(record) = records
                    .iter_mut()
                    .rev()
                    .find(|r| r.word == key && !r.removed)
                {
                    record.removed = true;
                }
            }
            _ => {}
        }
    }

    records
}

/// Merge any in-stream confession events into one confession record
pub fn extract_confession(participant_id: &str, events: &[Event]) -> Option<ConfessionRecord> {
    let mut merged: Option<ConfessionRecord> = None;

    for event in events {
        let payload = match (&event.event_type, &event.confession) {
            (EventType::Confession, Some(payload)) => payload,
            _ => continue,
        };
        let record = merged.get_or_insert_with(|| ConfessionRecord {
            participant_id: participant_id.to_string(),
            ..Default::default()
        });
        for word in &payload.confessed_words {
            let word = word.trim().to_uppercase();
            if !word.is_empty() {
                record.confessed_words.insert(word);
            }
        }
        record.used_external_resources |= payload.used_external_resources;
    }

    merged
}
