//! Pipeline orchestration
//!
//! The run is an explicit two-phase batch. Phase one normalizes each
//! participant and extracts word timings and intervals — work that touches
//! only that participant's data. Phase two needs the population: threshold
//! estimation is the single cross-participant dependency, so it sits between
//! the phases as a visible barrier, and the resulting table is immutable
//! while classification, reconciliation, and aggregation run.

use crate::aggregator::{aggregate, empty_metrics, PhaseAnalysis};
use crate::classifier::classify_phase_words;
use crate::config::AnalysisConfig;
use crate::confession::{reconcile, ReconciliationNote, WordCrossCheck};
use crate::error::AnalysisError;
use crate::intervals::{detect_phase_intervals, PhaseIntervals};
use crate::normalizer::{
    events_by_phase, extract_confession, extract_word_records, normalize_participant,
};
use crate::schema::{RawEventRecord, RecordAdapter};
use crate::types::{
    ConfessionRecord, DataQualityFlag, SessionMetrics, SessionPhase, SuspiciousInterval,
    WordRecord, WordVerdict,
};
use crate::ENGINE_VERSION;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Per-participant audit trail: every verdict traceable to its rules
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantArtifacts {
    pub participant_id: String,
    /// Normalization repairs and failures
    pub data_quality_flags: Vec<DataQualityFlag>,
    /// Merged suspicious intervals, both phases
    pub intervals: Vec<SuspiciousInterval>,
    /// Reconstructed word records, both phases
    pub words: Vec<WordRecord>,
    /// Per-word verdicts, both phases
    pub verdicts: Vec<WordVerdict>,
    /// Flagged words cross-referenced against the confession
    pub cross_check: Vec<WordCrossCheck>,
    /// Confession oddities
    pub reconciliation_notes: Vec<ReconciliationNote>,
}

/// Result of one full analysis run
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRun {
    pub run_id: String,
    pub engine_version: String,
    pub computed_at: DateTime<Utc>,
    pub config: AnalysisConfig,
    /// One row per participant, sorted by participant id
    pub metrics: Vec<SessionMetrics>,
    /// One audit record per participant, same order
    pub artifacts: Vec<ParticipantArtifacts>,
    /// Records that could not be attributed to any participant
    pub orphan_record_count: usize,
}

/// Batch analysis engine
pub struct AnalysisEngine {
    config: AnalysisConfig,
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisEngine {
    /// Engine with default tuning
    pub fn new() -> Self {
        Self {
            config: AnalysisConfig::default(),
        }
    }

    /// Engine with explicit tuning; rejects inconsistent configurations
    pub fn with_config(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run the full pipeline over one input snapshot.
    ///
    /// Per-participant failures never abort the run; the only run-level
    /// failures are an empty input and a threshold table with no clean
    /// participant to seed it.
    pub fn run(
        &self,
        records: Vec<RawEventRecord>,
        confessions: &[ConfessionRecord],
    ) -> Result<AnalysisRun, AnalysisError> {
        if records.is_empty() {
            return Err(AnalysisError::EmptyRun);
        }

        let (by_participant, orphans) = RecordAdapter::group_by_participant(records);
        let orphan_record_count = orphans.len();

        // Phase one: per-participant normalization and extraction. Each
        // entry is independent of every other participant.
        let mut collected: BTreeMap<String, CollectOutcome> = BTreeMap::new();
        for (participant_id, participant_records) in &by_participant {
            let outcome = collect_participant(participant_id, participant_records, &self.config);
            collected.insert(participant_id.clone(), outcome);
        }

        // Barrier: thresholds need every clean participant's word timings
        // before any classification can start.
        let seed_words: Vec<WordRecord> = collected
            .values()
            .filter_map(|outcome| match outcome {
                CollectOutcome::Clean(clean) => Some(clean.all_words()),
                CollectOutcome::Dirty(_) => None,
            })
            .flatten()
            .collect();
        let clean_count = collected
            .values()
            .filter(|o| matches!(o, CollectOutcome::Clean(_)))
            .count();
        if clean_count == 0 {
            return Err(AnalysisError::NoThresholdSeed);
        }
        let thresholds = crate::thresholds::ThresholdTable::estimate(&seed_words, &self.config);

        let confessions_by_id: BTreeMap<&str, &ConfessionRecord> = confessions
            .iter()
            .map(|c| (c.participant_id.as_str(), c))
            .collect();

        // Phase two: classification against the shared read-only table,
        // reconciliation, aggregation.
        let mut metrics = Vec::with_capacity(collected.len());
        let mut artifacts = Vec::with_capacity(collected.len());

        for (participant_id, outcome) in collected {
            match outcome {
                CollectOutcome::Dirty(flags) => {
                    metrics.push(empty_metrics(&participant_id));
                    artifacts.push(ParticipantArtifacts {
                        participant_id,
                        data_quality_flags: flags,
                        intervals: Vec::new(),
                        words: Vec::new(),
                        verdicts: Vec::new(),
                        cross_check: Vec::new(),
                        reconciliation_notes: Vec::new(),
                    });
                }
                CollectOutcome::Clean(clean) => {
                    let tutorial = PhaseAnalysis {
                        verdicts: classify_phase_words(
                            &clean.tutorial_words,
                            &clean.tutorial_intervals.intervals,
                            &thresholds,
                            &self.config,
                        ),
                        words: clean.tutorial_words,
                        intervals: clean.tutorial_intervals,
                    };
                    let main = PhaseAnalysis {
                        verdicts: classify_phase_words(
                            &clean.main_words,
                            &clean.main_intervals.intervals,
                            &thresholds,
                            &self.config,
                        ),
                        words: clean.main_words,
                        intervals: clean.main_intervals,
                    };

                    let confession = merge_confessions(
                        confessions_by_id.get(participant_id.as_str()).copied(),
                        clean.event_confession.as_ref(),
                    );

                    let all_verdicts: Vec<WordVerdict> = tutorial
                        .verdicts
                        .iter()
                        .chain(&main.verdicts)
                        .cloned()
                        .collect();
                    let submitted_words = tutorial
                        .words
                        .iter()
                        .chain(&main.words)
                        .map(|w| w.word.clone())
                        .collect();

                    let reconciliation =
                        reconcile(&all_verdicts, &submitted_words, confession.as_ref());

                    metrics.push(aggregate(
                        &participant_id,
                        &tutorial,
                        &main,
                        &reconciliation,
                        &self.config,
                    ));

                    let mut intervals: Vec<SuspiciousInterval> = tutorial
                        .intervals
                        .intervals
                        .iter()
                        .chain(&main.intervals.intervals)
                        .cloned()
                        .collect();
                    intervals.sort_by_key(|i| (i.phase, i.start, i.kind));

                    artifacts.push(ParticipantArtifacts {
                        participant_id,
                        data_quality_flags: clean.notes,
                        intervals,
                        words: tutorial.words.iter().chain(&main.words).cloned().collect(),
                        verdicts: all_verdicts,
                        cross_check: reconciliation.cross_check,
                        reconciliation_notes: reconciliation.notes,
                    });
                }
            }
        }

        Ok(AnalysisRun {
            run_id: Uuid::new_v4().to_string(),
            engine_version: ENGINE_VERSION.to_string(),
            computed_at: Utc::now(),
            config: self.config.clone(),
            metrics,
            artifacts,
            orphan_record_count,
        })
    }
}

/// One-shot analysis over serialized input (JSON array or NDJSON,
/// autodetected), with default tuning
pub fn analyze_records(
    events_json: &str,
    confessions_json: Option<&str>,
) -> Result<AnalysisRun, AnalysisError> {
    let records = if events_json.trim_start().starts_with('[') {
        RecordAdapter::parse_array(events_json)?
    } else {
        RecordAdapter::parse_ndjson(events_json)?
    };

    let confessions = match confessions_json {
        Some(json) => {
            let raw = if json.trim_start().starts_with('[') {
                RecordAdapter::parse_confession_array(json)?
            } else {
                RecordAdapter::parse_confession_ndjson(json)?
            };
            raw.iter()
                .map(|r| r.to_confession())
                .collect::<Result<Vec<_>, _>>()?
        }
        None => Vec::new(),
    };

    AnalysisEngine::new().run(records, &confessions)
}

/// Phase-one result for one participant
enum CollectOutcome {
    Clean(CleanParticipant),
    Dirty(Vec<DataQualityFlag>),
}

struct CleanParticipant {
    notes: Vec<DataQualityFlag>,
    tutorial_words: Vec<WordRecord>,
    main_words: Vec<WordRecord>,
    tutorial_intervals: PhaseIntervals,
    main_intervals: PhaseIntervals,
    event_confession: Option<ConfessionRecord>,
}

impl CleanParticipant {
    fn all_words(&self) -> Vec<WordRecord> {
        self.tutorial_words
            .iter()
            .chain(&self.main_words)
            .cloned()
            .collect()
    }
}

fn collect_participant(
    participant_id: &str,
    records: &[RawEventRecord],
    config: &AnalysisConfig,
) -> CollectOutcome {
    let normalized = match normalize_participant(participant_id, records) {
        Ok(normalized) => normalized,
        Err(error) => return CollectOutcome::Dirty(vec![quality_flag_for(&error)]),
    };

    let by_phase = events_by_phase(&normalized.events);
    let empty = Vec::new();
    let tutorial_events = by_phase.get(&SessionPhase::Tutorial).unwrap_or(&empty);
    let main_events = by_phase.get(&SessionPhase::Main).unwrap_or(&empty);

    CollectOutcome::Clean(CleanParticipant {
        tutorial_words: extract_word_records(participant_id, SessionPhase::Tutorial, tutorial_events),
        main_words: extract_word_records(participant_id, SessionPhase::Main, main_events),
        tutorial_intervals: detect_phase_intervals(
            participant_id,
            SessionPhase::Tutorial,
            tutorial_events,
            config,
        ),
        main_intervals: detect_phase_intervals(
            participant_id,
            SessionPhase::Main,
            main_events,
            config,
        ),
        event_confession: extract_confession(participant_id, &normalized.events),
        notes: normalized.notes,
    })
}

fn quality_flag_for(error: &AnalysisError) -> DataQualityFlag {
    match error {
        AnalysisError::MissingField(field) if field == "participantId" => {
            DataQualityFlag::MissingParticipantId
        }
        AnalysisError::MissingField(field) if field == "timestamp" => {
            DataQualityFlag::MissingTimestamp
        }
        AnalysisError::MissingField(_) => DataQualityFlag::MissingEventType,
        AnalysisError::TimestampError(_) => DataQualityFlag::UnparsableTimestamp,
        _ => DataQualityFlag::UnknownEventType,
    }
}

/// Combine an externally supplied confession with one reconstructed from
/// in-stream confession events: words union, resource admission ORs
fn merge_confessions(
    external: Option<&ConfessionRecord>,
    from_events: Option<&ConfessionRecord>,
) -> Option<ConfessionRecord> {
    match (external, from_events) {
        (None, None) => None,
        (Some(c), None) | (None, Some(c)) => Some(c.clone()),
        (Some(a), Some(b)) => {
            let mut merged = a.clone();
            merged
                .confessed_words
                .extend(b.confessed_words.iter().cloned());
            merged.used_external_resources |= b.used_external_resources;
            Some(merged)
        }
    }
}
