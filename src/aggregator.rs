//! Session aggregation
//!
//! Reduces per-word verdicts, merged intervals, and the confession
//! reconciliation into one `SessionMetrics` row per participant. Pure
//! reduction: no side effects beyond the returned record.

use crate::config::AnalysisConfig;
use crate::confession::Reconciliation;
use crate::intervals::PhaseIntervals;
use crate::types::{IntervalKind, SessionMetrics, WordRecord, WordVerdict};

/// Everything derived for one participant phase
#[derive(Debug, Clone, Default)]
pub struct PhaseAnalysis {
    pub words: Vec<WordRecord>,
    /// One verdict per word, in word order
    pub verdicts: Vec<WordVerdict>,
    pub intervals: PhaseIntervals,
}

impl PhaseAnalysis {
    fn flagged_rate(&self) -> f64 {
        if self.words.is_empty() {
            return 0.0;
        }
        let flagged = self.verdicts.iter().filter(|v| v.flagged).count();
        flagged as f64 / self.words.len() as f64
    }

    fn has_interval(&self, kind: IntervalKind) -> bool {
        self.intervals.intervals.iter().any(|i| i.kind == kind)
    }
}

/// Reduce one participant's analysis into the terminal metrics row.
///
/// Performance scores and word-length counts cover the scored (main) round;
/// page and mouse totals cover the whole session. Rewards count only valid,
/// dictionary-matched words the participant did not remove; the excluding
/// variant additionally omits flagged words.
pub fn aggregate(
    participant_id: &str,
    tutorial: &PhaseAnalysis,
    main: &PhaseAnalysis,
    reconciliation: &Reconciliation,
    config: &AnalysisConfig,
) -> SessionMetrics {
    let mut including = 0.0;
    let mut excluding = 0.0;
    let mut valid_words_short = 0;
    let mut valid_words_medium = 0;
    let mut valid_words_long = 0;

    for (word, verdict) in main.words.iter().zip(&main.verdicts) {
        if !word.is_valid_dictionary_word || word.removed {
            continue;
        }
        including += word.reward_if_valid;
        if !verdict.flagged {
            excluding += word.reward_if_valid;
        }

        if word.length >= config.long_word_min_length {
            valid_words_long += 1;
        } else if word.length >= config.mid_word_min_length {
            valid_words_medium += 1;
        } else {
            valid_words_short += 1;
        }
    }

    SessionMetrics {
        participant_id: participant_id.to_string(),
        cheating_rate_practice_round: tutorial.flagged_rate(),
        cheating_rate_main_round: main.flagged_rate(),
        cheating_main_round: main.verdicts.iter().any(|v| v.flagged),
        lying_rate: reconciliation.lying_rate,
        has_confessed: reconciliation.has_confessed,
        has_page_left: tutorial.has_interval(IntervalKind::Page)
            || main.has_interval(IntervalKind::Page),
        total_time_page_left: tutorial.intervals.total_time_away_sec
            + main.intervals.total_time_away_sec,
        has_mouse_inactivity: tutorial.has_interval(IntervalKind::Mouse)
            || main.has_interval(IntervalKind::Mouse),
        total_time_mouse_inactivity: tutorial.intervals.total_inactive_time_sec
            + main.intervals.total_inactive_time_sec,
        performance_score_excluding_cheated_words: excluding,
        performance_score_including_cheated_words: including,
        valid_words_short,
        valid_words_medium,
        valid_words_long,
        data_quality_issue: false,
    }
}

/// Metrics row for a participant whose raw records failed normalization:
/// everything zeroed, only the data-quality flag set
pub fn empty_metrics(participant_id: &str) -> SessionMetrics {
    SessionMetrics {
        participant_id: participant_id.to_string(),
        cheating_rate_practice_round: 0.0,
        cheating_rate_main_round: 0.0,
        cheating_main_round: false,
        lying_rate: 0.0,
        has_confessed: false,
        has_page_left: false,
        total_time_page_left: 0.0,
        has_mouse_inactivity: false,
        total_time_mouse_inactivity: 0.0,
        performance_score_excluding_cheated_words: 0.0,
        performance_score_including_cheated_words: 0.0,
        valid_words_short: 0,
        valid_words_medium: 0,
        valid_words_long: 0,
        data_quality_issue: true,
    }
}
