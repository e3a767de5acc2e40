//! Lexitrace - batch behavioral anomaly detection for word-puzzle studies
//!
//! Lexitrace ingests per-participant event logs from a word-creation puzzle
//! study and produces auditable per-word cheating verdicts plus per-session
//! behavioral metrics, through a deterministic pipeline: normalization →
//! interval detection → threshold estimation → classification → confession
//! reconciliation → aggregation.
//!
//! Threshold estimation is the one cross-participant step, so a run is an
//! explicit two-phase batch: collect every participant's word timings first,
//! publish the read-only threshold table, then classify.

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod confession;
pub mod error;
pub mod intervals;
pub mod normalizer;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod thresholds;
pub mod types;

pub use config::AnalysisConfig;
pub use error::AnalysisError;
pub use pipeline::{analyze_records, AnalysisEngine, AnalysisRun, ParticipantArtifacts};
pub use report::{ReportEncoder, ReportFormat};
pub use schema::{RawConfessionRecord, RawEventRecord, RecordAdapter, SCHEMA_VERSION};
pub use thresholds::ThresholdTable;
pub use types::{
    ConfessionRecord, Event, EventType, SessionMetrics, SessionPhase, SuspiciousInterval,
    TriggerRule, WordRecord, WordVerdict,
};

/// Engine version embedded in all audit reports
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for audit reports
pub const PRODUCER_NAME: &str = "lexitrace";
