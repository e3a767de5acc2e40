//! Core data types for the detection pipeline
//!
//! This module defines the canonical event taxonomy, the derived interval and
//! word records, per-word verdicts, and the terminal per-session metrics row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Study phase a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Practice round
    Tutorial,
    /// Scored round
    Main,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Tutorial => "tutorial",
            SessionPhase::Main => "main",
        }
    }
}

/// Canonical event taxonomy captured by the game client
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PageLeave,
    PageReturn,
    MouseInactiveStart,
    MouseActive,
    WordValidation,
    WordSubmission,
    WordRemoval,
    Confession,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PageLeave => "page_leave",
            EventType::PageReturn => "page_return",
            EventType::MouseInactiveStart => "mouse_inactive_start",
            EventType::MouseActive => "mouse_active",
            EventType::WordValidation => "word_validation",
            EventType::WordSubmission => "word_submission",
            EventType::WordRemoval => "word_removal",
            EventType::Confession => "confession",
        }
    }
}

/// Word event data (present for validation, submission, removal events)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordPayload {
    /// The word as typed by the participant
    pub word: String,
    /// Letter count; derived from the word text when the client omits it
    #[serde(default)]
    pub length: Option<u32>,
    /// Whether the word matched the study dictionary
    #[serde(default, alias = "isValid", alias = "isValidDictionaryWord")]
    pub is_valid: Option<bool>,
    /// Reward granted if the word is valid
    #[serde(default, alias = "rewardIfValid")]
    pub reward: Option<f64>,
}

impl WordPayload {
    /// Letter count, falling back to the word text itself
    pub fn resolved_length(&self) -> u32 {
        self.length.unwrap_or_else(|| self.word.chars().count() as u32)
    }
}

/// Page focus event data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagePayload {
    /// Tab-change count reported by the client
    #[serde(default, alias = "tabCount")]
    pub tab_count: Option<u32>,
}

/// Self-reported confession data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfessionPayload {
    /// Words the participant admits were created with external help
    #[serde(default, alias = "confessedWords")]
    pub confessed_words: Vec<String>,
    /// Whether the participant admits using external resources at all
    #[serde(default, alias = "usedExternalResources")]
    pub used_external_resources: bool,
}

/// A canonical event with timestamp and type-specific payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Participant the event belongs to
    pub participant_id: String,
    /// Study phase
    pub phase: SessionPhase,
    /// Event type
    pub event_type: EventType,
    /// Event timestamp
    pub timestamp: DateTime<Utc>,
    /// Word event data (present for word_* events)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word: Option<WordPayload>,
    /// Page event data (present for page_* events)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<PagePayload>,
    /// Confession data (present for confession events)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confession: Option<ConfessionPayload>,
}

/// Kind of inactivity an interval describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalKind {
    /// Participant left the page (tab/window blur)
    Page,
    /// Mouse went inactive
    Mouse,
}

/// A closed time range of suspicious inactivity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspiciousInterval {
    pub participant_id: String,
    pub phase: SessionPhase,
    pub kind: IntervalKind,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Duration in seconds
    pub duration_sec: f64,
    /// True when the closing event was missing and the interval was closed
    /// at the phase boundary instead
    pub truncated: bool,
}

impl SuspiciousInterval {
    pub fn new(
        participant_id: impl Into<String>,
        phase: SessionPhase,
        kind: IntervalKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        truncated: bool,
    ) -> Self {
        let duration_sec = (end - start).num_milliseconds() as f64 / 1000.0;
        Self {
            participant_id: participant_id.into(),
            phase,
            kind,
            start,
            end,
            duration_sec,
            truncated,
        }
    }
}

/// One validated word, with its timing reconstructed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordRecord {
    pub participant_id: String,
    pub phase: SessionPhase,
    pub word: String,
    pub length: u32,
    pub is_valid_dictionary_word: bool,
    /// When the client validated the word against the dictionary
    pub validated_at: DateTime<Utc>,
    /// When the word was submitted, if it was
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    /// True when the participant removed the word before the phase ended
    pub removed: bool,
    /// Reward granted if the word is valid
    pub reward_if_valid: f64,
    /// Seconds since the previous word's validation (or phase start for the
    /// first word)
    pub creation_time_sec: f64,
}

/// Classification rules, kept as tagged variants so experimenters can
/// re-weight or ablate individual rules without re-deriving intervals or
/// thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerRule {
    /// First or second word validated after an interval end, in the top
    /// length band
    PostIntervalLongWord,
    /// Majority of post-interval words in the phase are in the mid band or
    /// above
    SustainedLengthAfterIntervals,
    /// Creation time below the population threshold for (phase, length)
    FastCreation,
}

/// Per-word classification outcome, attached alongside the word record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordVerdict {
    pub word: String,
    pub length: u32,
    pub phase: SessionPhase,
    pub validated_at: DateTime<Utc>,
    pub creation_time_sec: f64,
    /// Which rules fired for this word
    pub triggered_rules: BTreeSet<TriggerRule>,
    /// True if any rule fired
    pub flagged: bool,
}

/// A participant's self-reported confession
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfessionRecord {
    pub participant_id: String,
    /// Words admitted to be externally assisted
    pub confessed_words: BTreeSet<String>,
    /// Whether the participant admits using external resources at all
    pub used_external_resources: bool,
}

/// Data-quality notes recorded per participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQualityFlag {
    /// A record was missing its participant id
    MissingParticipantId,
    /// A record was missing its event type
    MissingEventType,
    /// A record was missing its timestamp
    MissingTimestamp,
    /// A record's timestamp could not be parsed
    UnparsableTimestamp,
    /// A record carried an event type outside the taxonomy
    UnknownEventType,
    /// A record carried no recognizable phase; defaulted to main
    UnknownPhase,
    /// Duplicate events were dropped during normalization
    DuplicatesDropped,
    /// Events arrived out of order and were re-sorted
    OutOfOrderRepaired,
    /// A phase contained no events at all
    EmptyPhase,
}

/// Terminal per-participant aggregate, emitted as one flat tabular row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetrics {
    pub participant_id: String,
    /// Fraction of practice-round words flagged
    pub cheating_rate_practice_round: f64,
    /// Fraction of main-round words flagged
    pub cheating_rate_main_round: f64,
    /// True if any main-round word was flagged
    pub cheating_main_round: bool,
    /// Fraction of flagged words not self-reported
    pub lying_rate: f64,
    /// True if the participant confessed anything
    pub has_confessed: bool,
    pub has_page_left: bool,
    /// Total merged page-away time in seconds
    pub total_time_page_left: f64,
    pub has_mouse_inactivity: bool,
    /// Total merged mouse-inactive time in seconds
    pub total_time_mouse_inactivity: f64,
    /// Reward sum over valid main-round words, flagged words excluded
    pub performance_score_excluding_cheated_words: f64,
    /// Reward sum over valid main-round words, flagged words included
    pub performance_score_including_cheated_words: f64,
    /// Valid main-round words below the mid length band
    pub valid_words_short: u32,
    /// Valid main-round words in the mid band
    pub valid_words_medium: u32,
    /// Valid main-round words in the top band
    pub valid_words_long: u32,
    /// True when the participant's raw records failed normalization
    pub data_quality_issue: bool,
}
