//! Word creation classification
//!
//! Evaluates three independent rules per word. Rules are unweighted and
//! OR-combined: any single trigger flags the word, and the verdict keeps the
//! full set of triggers so downstream analysis can re-weight or ablate rules
//! without re-deriving intervals or thresholds. This combination is
//! conservative toward detection and must stay that way for metric
//! comparability across cohorts.

use crate::config::AnalysisConfig;
use crate::thresholds::ThresholdTable;
use crate::types::{SuspiciousInterval, TriggerRule, WordRecord, WordVerdict};
use std::collections::BTreeSet;

/// Classify one phase's word records against its suspicious intervals and
/// the shared threshold table.
///
/// Returns one verdict per record, in record order.
pub fn classify_phase_words(
    words: &[WordRecord],
    intervals: &[SuspiciousInterval],
    thresholds: &ThresholdTable,
    config: &AnalysisConfig,
) -> Vec<WordVerdict> {
    // Words validated at-or-after the end of at least one interval
    let post_interval: Vec<bool> = words
        .iter()
        .map(|w| intervals.iter().any(|i| w.validated_at >= i.end))
        .collect();

    // Words in the first `post_interval_positions` validation slots after
    // some interval's end
    let mut immediately_after = vec![false; words.len()];
    for interval in intervals {
        let mut position = 0;
        for (idx, word) in words.iter().enumerate() {
            if word.validated_at < interval.end {
                continue;
            }
            position += 1;
            if position > config.post_interval_positions {
                break;
            }
            immediately_after[idx] = true;
        }
    }

    // Rule 2 is a phase-level condition: a strict majority of post-interval
    // words in the mid band or above. A single post-interval word is not
    // "sustained" performance, hence the minimum count.
    let post_interval_count = post_interval.iter().filter(|&&p| p).count();
    let mid_or_longer = words
        .iter()
        .zip(&post_interval)
        .filter(|(w, &p)| p && w.length >= config.mid_word_min_length)
        .count();
    let sustained_length = post_interval_count >= config.sustained_min_words
        && mid_or_longer * 2 > post_interval_count;

    words
        .iter()
        .enumerate()
        .map(|(idx, word)| {
            let mut triggered_rules = BTreeSet::new();

            if immediately_after[idx] && word.length >= config.long_word_min_length {
                triggered_rules.insert(TriggerRule::PostIntervalLongWord);
            }

            if sustained_length && post_interval[idx] {
                triggered_rules.insert(TriggerRule::SustainedLengthAfterIntervals);
            }

            if let Some(threshold) = thresholds.lookup(word.phase, word.length) {
                if word.creation_time_sec < threshold {
                    triggered_rules.insert(TriggerRule::FastCreation);
                }
            }

            WordVerdict {
                word: word.word.clone(),
                length: word.length,
                phase: word.phase,
                validated_at: word.validated_at,
                creation_time_sec: word.creation_time_sec,
                flagged: !triggered_rules.is_empty(),
                triggered_rules,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IntervalKind, SessionPhase};
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap() + chrono::Duration::seconds(sec as i64)
    }

    fn word(word_text: &str, length: u32, validated_sec: u32, creation_sec: f64) -> WordRecord {
        WordRecord {
            participant_id: "p-1".to_string(),
            phase: SessionPhase::Main,
            word: word_text.to_string(),
            length,
            is_valid_dictionary_word: true,
            validated_at: ts(validated_sec),
            submitted_at: None,
            removed: false,
            reward_if_valid: 1.0,
            creation_time_sec: creation_sec,
        }
    }

    fn page_interval(start: u32, end: u32) -> SuspiciousInterval {
        SuspiciousInterval::new(
            "p-1",
            SessionPhase::Main,
            IntervalKind::Page,
            ts(start),
            ts(end),
            false,
        )
    }

    /// Threshold pool where every creation time is 10s, so nothing under
    /// default settings counts as fast
    fn slow_pool() -> Vec<WordRecord> {
        (0..5)
            .flat_map(|i| {
                (3..=8).map(move |len| {
                    let mut w = word("POOLED", len, 100 + i, 10.0);
                    w.word = format!("POOL{len}{i}");
                    w
                })
            })
            .collect()
    }

    #[test]
    fn test_rule1_long_word_right_after_interval() {
        // Leave at t=10, return at t=45, 8-letter word at t=47
        let thresholds = ThresholdTable::estimate(&slow_pool(), &AnalysisConfig::default());
        let words = vec![word("SLEUTHED", 8, 47, 10.0)];
        let intervals = vec![page_interval(10, 45)];

        let verdicts =
            classify_phase_words(&words, &intervals, &thresholds, &AnalysisConfig::default());
        assert!(verdicts[0].flagged);
        // A single post-interval word is not "sustained", and the pool is
        // slow, so Rule 1 is the only trigger
        assert_eq!(
            verdicts[0].triggered_rules.iter().collect::<Vec<_>>(),
            vec![&TriggerRule::PostIntervalLongWord]
        );
    }

    #[test]
    fn test_rule1_only_first_two_positions() {
        let thresholds = ThresholdTable::estimate(&slow_pool(), &AnalysisConfig::default());
        let words = vec![
            word("SHORT", 4, 47, 10.0),
            word("TRACED", 7, 50, 10.0),
            word("RECASTED", 8, 55, 10.0),
        ];
        let intervals = vec![page_interval(10, 45)];

        let verdicts =
            classify_phase_words(&words, &intervals, &thresholds, &AnalysisConfig::default());
        // Position 1 is short: no Rule 1. Position 2 is long: Rule 1.
        // Position 3 is long but too late for Rule 1.
        assert!(!verdicts[0]
            .triggered_rules
            .contains(&TriggerRule::PostIntervalLongWord));
        assert!(verdicts[1]
            .triggered_rules
            .contains(&TriggerRule::PostIntervalLongWord));
        assert!(!verdicts[2]
            .triggered_rules
            .contains(&TriggerRule::PostIntervalLongWord));
    }

    #[test]
    fn test_rule2_majority_of_post_interval_words_long() {
        let thresholds = ThresholdTable::estimate(&slow_pool(), &AnalysisConfig::default());
        let words = vec![
            word("BEFORE", 4, 5, 10.0),
            word("SIXLET", 6, 50, 10.0),
            word("SEVENER", 7, 60, 10.0),
            word("TINY", 4, 70, 10.0),
        ];
        let intervals = vec![page_interval(10, 45)];

        let verdicts =
            classify_phase_words(&words, &intervals, &thresholds, &AnalysisConfig::default());
        // Post-interval words: SIXLET, SEVENER, TINY → 2 of 3 in mid band,
        // strict majority → Rule 2 fires for all three, not for BEFORE
        assert!(!verdicts[0].flagged);
        for verdict in &verdicts[1..] {
            assert!(verdict
                .triggered_rules
                .contains(&TriggerRule::SustainedLengthAfterIntervals));
        }
    }

    #[test]
    fn test_rule2_exact_half_is_not_majority() {
        let thresholds = ThresholdTable::estimate(&slow_pool(), &AnalysisConfig::default());
        let words = vec![
            word("SIXLET", 6, 50, 10.0),
            word("TINY", 4, 60, 10.0),
        ];
        let intervals = vec![page_interval(10, 45)];

        let verdicts =
            classify_phase_words(&words, &intervals, &thresholds, &AnalysisConfig::default());
        assert!(verdicts
            .iter()
            .all(|v| !v.triggered_rules.contains(&TriggerRule::SustainedLengthAfterIntervals)));
    }

    #[test]
    fn test_rule3_fast_creation_fires_without_intervals() {
        // 2s creation for a 7-letter word where the (main, 7)
        // threshold is 6s
        let pool = samples_with_threshold_six();
        let thresholds = ThresholdTable::estimate(&pool, &AnalysisConfig::default());
        assert!((thresholds.lookup(SessionPhase::Main, 7).unwrap() - 6.0).abs() < 0.001);

        let words = vec![word("QUICKLY", 7, 30, 2.0)];
        let verdicts = classify_phase_words(&words, &[], &thresholds, &AnalysisConfig::default());

        assert!(verdicts[0].flagged);
        assert_eq!(
            verdicts[0].triggered_rules.iter().collect::<Vec<_>>(),
            vec![&TriggerRule::FastCreation]
        );
    }

    /// Pool where the 10th percentile for (main, 7) lands exactly on 6s
    fn samples_with_threshold_six() -> Vec<WordRecord> {
        [6.0, 6.0, 6.0, 6.0, 6.0, 8.0, 9.0, 10.0, 11.0, 12.0]
            .iter()
            .enumerate()
            .map(|(i, &t)| {
                let mut w = word("SAMPLES", 7, 100 + i as u32, t);
                w.word = format!("SAMPLE{i}");
                w
            })
            .collect()
    }

    #[test]
    fn test_creation_at_threshold_does_not_fire() {
        let pool = samples_with_threshold_six();
        let thresholds = ThresholdTable::estimate(&pool, &AnalysisConfig::default());

        // Strictly below fires; exactly at the threshold does not
        let words = vec![word("BOUNDARY", 7, 30, 6.0)];
        let verdicts = classify_phase_words(&words, &[], &thresholds, &AnalysisConfig::default());
        assert!(!verdicts[0].triggered_rules.contains(&TriggerRule::FastCreation));
    }

    #[test]
    fn test_word_before_all_intervals_only_rule3_eligible() {
        let pool = samples_with_threshold_six();
        let thresholds = ThresholdTable::estimate(&pool, &AnalysisConfig::default());

        let words = vec![word("HASTENS", 7, 5, 2.0)];
        let intervals = vec![page_interval(10, 45)];
        let verdicts =
            classify_phase_words(&words, &intervals, &thresholds, &AnalysisConfig::default());

        assert_eq!(
            verdicts[0].triggered_rules.iter().collect::<Vec<_>>(),
            vec![&TriggerRule::FastCreation]
        );
    }

    #[test]
    fn test_unflagged_word_has_empty_rule_set() {
        let thresholds = ThresholdTable::estimate(&slow_pool(), &AnalysisConfig::default());
        let words = vec![word("STEADY", 5, 30, 10.0)];
        let verdicts = classify_phase_words(&words, &[], &thresholds, &AnalysisConfig::default());

        assert!(!verdicts[0].flagged);
        assert!(verdicts[0].triggered_rules.is_empty());
    }

    #[test]
    fn test_multiple_rules_recorded_together() {
        let pool = samples_with_threshold_six();
        let thresholds = ThresholdTable::estimate(&pool, &AnalysisConfig::default());

        // 7-letter word right after an interval, created in 2s, with a
        // second mid-band word keeping Rule 2 in play: Rules 1, 2, 3
        let words = vec![word("STACKED", 7, 47, 2.0), word("SEVENTH", 7, 60, 10.0)];
        let intervals = vec![page_interval(10, 45)];
        let verdicts =
            classify_phase_words(&words, &intervals, &thresholds, &AnalysisConfig::default());

        assert_eq!(verdicts[0].triggered_rules.len(), 3);
    }
}
