//! Analysis configuration
//!
//! Every empirically-tuned knob of the detection heuristic lives here as a
//! named field. The defaults reproduce the study's original tuning; none of
//! them carries a theoretical justification, so experimenters are expected to
//! sweep them rather than trust them.

use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};

/// Default percentile of pooled creation times treated as implausibly fast
pub const DEFAULT_FAST_PERCENTILE: f64 = 10.0;

/// Default minimum sample count for a (phase, length) threshold group
pub const DEFAULT_MIN_GROUP_SAMPLES: usize = 5;

/// Default lower bound of the top word-length band (Rule 1)
pub const DEFAULT_LONG_WORD_MIN_LENGTH: u32 = 7;

/// Default lower bound of the mid word-length band (Rule 2)
pub const DEFAULT_MID_WORD_MIN_LENGTH: u32 = 6;

/// Default number of post-interval validation positions checked by Rule 1
pub const DEFAULT_POST_INTERVAL_POSITIONS: usize = 2;

/// Default minimum post-interval word count before Rule 2 can fire
pub const DEFAULT_SUSTAINED_MIN_WORDS: usize = 2;

/// Default gap (seconds) under which adjacent same-kind intervals merge
pub const DEFAULT_INTERVAL_MERGE_GAP_SEC: f64 = 1.0;

/// Tunable parameters for one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Percentile (0-100, exclusive) of the pooled creation-time distribution
    /// used as the "implausibly fast" threshold per (phase, length) group
    pub fast_percentile: f64,
    /// Minimum samples a (phase, length) group needs to derive its own
    /// threshold; smaller groups fall back to the nearest qualified length
    pub min_group_samples: usize,
    /// Words at least this long are in the top band (Rule 1)
    pub long_word_min_length: u32,
    /// Words at least this long are in the mid band (Rule 2)
    pub mid_word_min_length: u32,
    /// How many words validated right after an interval end count as
    /// "immediately after" for Rule 1 (first, second, ...)
    pub post_interval_positions: usize,
    /// Minimum post-interval words in a phase before the majority-length
    /// rule applies; "sustained" performance needs more than one word
    pub sustained_min_words: usize,
    /// Same-kind intervals closer than this many seconds merge into one
    pub interval_merge_gap_sec: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fast_percentile: DEFAULT_FAST_PERCENTILE,
            min_group_samples: DEFAULT_MIN_GROUP_SAMPLES,
            long_word_min_length: DEFAULT_LONG_WORD_MIN_LENGTH,
            mid_word_min_length: DEFAULT_MID_WORD_MIN_LENGTH,
            post_interval_positions: DEFAULT_POST_INTERVAL_POSITIONS,
            sustained_min_words: DEFAULT_SUSTAINED_MIN_WORDS,
            interval_merge_gap_sec: DEFAULT_INTERVAL_MERGE_GAP_SEC,
        }
    }
}

impl AnalysisConfig {
    /// Check that the configuration is internally consistent
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(self.fast_percentile > 0.0 && self.fast_percentile < 100.0) {
            return Err(AnalysisError::ConfigError(format!(
                "fast_percentile must be in (0, 100), got {}",
                self.fast_percentile
            )));
        }
        if self.min_group_samples == 0 {
            return Err(AnalysisError::ConfigError(
                "min_group_samples must be at least 1".to_string(),
            ));
        }
        if self.mid_word_min_length > self.long_word_min_length {
            return Err(AnalysisError::ConfigError(format!(
                "mid_word_min_length ({}) must not exceed long_word_min_length ({})",
                self.mid_word_min_length, self.long_word_min_length
            )));
        }
        if self.post_interval_positions == 0 {
            return Err(AnalysisError::ConfigError(
                "post_interval_positions must be at least 1".to_string(),
            ));
        }
        if self.sustained_min_words == 0 {
            return Err(AnalysisError::ConfigError(
                "sustained_min_words must be at least 1".to_string(),
            ));
        }
        if self.interval_merge_gap_sec < 0.0 {
            return Err(AnalysisError::ConfigError(format!(
                "interval_merge_gap_sec must be non-negative, got {}",
                self.interval_merge_gap_sec
            )));
        }
        Ok(())
    }
}
