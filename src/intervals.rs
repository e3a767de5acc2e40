//! Suspicious interval detection
//!
//! Pairs complementary events (page leave/return, mouse inactive/active)
//! into closed intervals per phase, then merges overlapping or near-adjacent
//! intervals of the same kind so total away time is never double counted.

use crate::config::AnalysisConfig;
use crate::types::{Event, EventType, IntervalKind, SessionPhase, SuspiciousInterval};
use chrono::{DateTime, Utc};

/// Intervals detected in one participant phase, with merged totals
#[derive(Debug, Clone, Default)]
pub struct PhaseIntervals {
    /// Merged intervals, ordered by start time
    pub intervals: Vec<SuspiciousInterval>,
    /// Sum of merged page-interval durations, seconds
    pub total_time_away_sec: f64,
    /// Sum of merged mouse-interval durations, seconds
    pub total_inactive_time_sec: f64,
}

/// Detect suspicious intervals in one phase's normalized events.
///
/// At most one interval per kind is open at a time: a second open event while
/// one is open is a no-op (duplicate client events), and a close with nothing
/// open is ignored. Anything still open at the phase boundary (the last event
/// timestamp) is closed there and marked truncated.
pub fn detect_phase_intervals(
    participant_id: &str,
    phase: SessionPhase,
    events: &[Event],
    config: &AnalysisConfig,
) -> PhaseIntervals {
    let phase_end = match events.last() {
        Some(last) => last.timestamp,
        None => return PhaseIntervals::default(),
    };

    let mut raw: Vec<SuspiciousInterval> = Vec::new();
    let mut open_page: Option<DateTime<Utc>> = None;
    let mut open_mouse: Option<DateTime<Utc>> = None;

    for event in events {
        match event.event_type {
            EventType::PageLeave => {
                open_page.get_or_insert(event.timestamp);
            }
            EventType::PageReturn => {
                if let Some(start) = open_page.take() {
                    raw.push(SuspiciousInterval::new(
                        participant_id,
                        phase,
                        IntervalKind::Page,
                        start,
                        event.timestamp,
                        false,
                    ));
                }
            }
            EventType::MouseInactiveStart => {
                open_mouse.get_or_insert(event.timestamp);
            }
            EventType::MouseActive => {
                if let Some(start) = open_mouse.take() {
                    raw.push(SuspiciousInterval::new(
                        participant_id,
                        phase,
                        IntervalKind::Mouse,
                        start,
                        event.timestamp,
                        false,
                    ));
                }
            }
            _ => {}
        }
    }

    if let Some(start) = open_page.take() {
        raw.push(SuspiciousInterval::new(
            participant_id,
            phase,
            IntervalKind::Page,
            start,
            phase_end,
            true,
        ));
    }
    if let Some(start) = open_mouse.take() {
        raw.push(SuspiciousInterval::new(
            participant_id,
            phase,
            IntervalKind::Mouse,
            start,
            phase_end,
            true,
        ));
    }

    let intervals = merge_intervals(raw, config.interval_merge_gap_sec);

    let total_time_away_sec = intervals
        .iter()
        .filter(|i| i.kind == IntervalKind::Page)
        .map(|i| i.duration_sec)
        .sum();
    let total_inactive_time_sec = intervals
        .iter()
        .filter(|i| i.kind == IntervalKind::Mouse)
        .map(|i| i.duration_sec)
        .sum();

    PhaseIntervals {
        intervals,
        total_time_away_sec,
        total_inactive_time_sec,
    }
}

/// Merge overlapping or near-adjacent (gap < `merge_gap_sec`) intervals of
/// the same kind into their union. Idempotent: merging a merged list is a
/// no-op.
pub fn merge_intervals(
    intervals: Vec<SuspiciousInterval>,
    merge_gap_sec: f64,
) -> Vec<SuspiciousInterval> {
    let mut merged: Vec<SuspiciousInterval> = Vec::with_capacity(intervals.len());

    for kind in [IntervalKind::Page, IntervalKind::Mouse] {
        let mut of_kind: Vec<SuspiciousInterval> =
            intervals.iter().filter(|i| i.kind == kind).cloned().collect();
        of_kind.sort_by_key(|i| (i.start, i.end));

        let mut current: Option<SuspiciousInterval> = None;
        for interval in of_kind {
            match current.as_mut() {
                None => current = Some(interval),
                Some(open) => {
                    let gap_sec =
                        (interval.start - open.end).num_milliseconds() as f64 / 1000.0;
                    if gap_sec < merge_gap_sec {
                        if interval.end > open.end {
                            open.end = interval.end;
                        }
                        open.truncated |= interval.truncated;
                        open.duration_sec =
                            (open.end - open.start).num_milliseconds() as f64 / 1000.0;
                    } else {
                        merged.push(current.take().unwrap());
                        current = Some(interval);
                    }
                }
            }
        }
        if let Some(open) = current {
            merged.push(open);
        }
    }

    merged.sort_by_key(|i| (i.start, i.end, i.kind));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap() + chrono::Duration::seconds(sec as i64)
    }

    fn event(event_type: EventType, sec: u32) -> Event {
        Event {
            participant_id: "p-1".to_string(),
            phase: SessionPhase::Main,
            event_type,
            timestamp: ts(sec),
            word: None,
            page: None,
            confession: None,
        }
    }

    fn interval(kind: IntervalKind, start: u32, end: u32) -> SuspiciousInterval {
        SuspiciousInterval::new("p-1", SessionPhase::Main, kind, ts(start), ts(end), false)
    }

    #[test]
    fn test_leave_return_pair_closes_interval() {
        let events = vec![
            event(EventType::PageLeave, 10),
            event(EventType::PageReturn, 45),
            event(EventType::WordValidation, 47),
        ];

        let detected =
            detect_phase_intervals("p-1", SessionPhase::Main, &events, &AnalysisConfig::default());
        assert_eq!(detected.intervals.len(), 1);
        let i = &detected.intervals[0];
        assert_eq!(i.kind, IntervalKind::Page);
        assert!((i.duration_sec - 35.0).abs() < 0.001);
        assert!(!i.truncated);
        assert!((detected.total_time_away_sec - 35.0).abs() < 0.001);
    }

    #[test]
    fn test_duplicate_open_is_noop() {
        let events = vec![
            event(EventType::PageLeave, 10),
            event(EventType::PageLeave, 20),
            event(EventType::PageReturn, 45),
        ];

        let detected =
            detect_phase_intervals("p-1", SessionPhase::Main, &events, &AnalysisConfig::default());
        assert_eq!(detected.intervals.len(), 1);
        // The first open wins; away time is 35s, not 25s
        assert!((detected.total_time_away_sec - 35.0).abs() < 0.001);
    }

    #[test]
    fn test_unmatched_close_ignored() {
        let events = vec![
            event(EventType::PageReturn, 5),
            event(EventType::MouseActive, 6),
            event(EventType::WordValidation, 30),
        ];

        let detected =
            detect_phase_intervals("p-1", SessionPhase::Main, &events, &AnalysisConfig::default());
        assert!(detected.intervals.is_empty());
    }

    #[test]
    fn test_open_interval_truncated_at_phase_end() {
        let events = vec![
            event(EventType::MouseInactiveStart, 10),
            event(EventType::WordValidation, 50),
        ];

        let detected =
            detect_phase_intervals("p-1", SessionPhase::Main, &events, &AnalysisConfig::default());
        assert_eq!(detected.intervals.len(), 1);
        let i = &detected.intervals[0];
        assert!(i.truncated);
        assert_eq!(i.kind, IntervalKind::Mouse);
        assert!((i.duration_sec - 40.0).abs() < 0.001);
    }

    #[test]
    fn test_page_and_mouse_tracked_independently() {
        let events = vec![
            event(EventType::MouseInactiveStart, 5),
            event(EventType::PageLeave, 10),
            event(EventType::PageReturn, 20),
            event(EventType::MouseActive, 30),
        ];

        let detected =
            detect_phase_intervals("p-1", SessionPhase::Main, &events, &AnalysisConfig::default());
        assert_eq!(detected.intervals.len(), 2);
        assert!((detected.total_time_away_sec - 10.0).abs() < 0.001);
        assert!((detected.total_inactive_time_sec - 25.0).abs() < 0.001);
    }

    #[test]
    fn test_overlapping_intervals_merge_without_double_counting() {
        let raw = vec![
            interval(IntervalKind::Page, 10, 30),
            interval(IntervalKind::Page, 20, 40),
        ];

        let merged = merge_intervals(raw, 1.0);
        assert_eq!(merged.len(), 1);
        assert!((merged[0].duration_sec - 30.0).abs() < 0.001);
    }

    #[test]
    fn test_adjacent_intervals_within_gap_merge() {
        let raw = vec![
            interval(IntervalKind::Page, 10, 20),
            interval(IntervalKind::Page, 20, 30),
        ];
        let merged = merge_intervals(raw, 1.0);
        assert_eq!(merged.len(), 1);

        let apart = vec![
            interval(IntervalKind::Page, 10, 20),
            interval(IntervalKind::Page, 22, 30),
        ];
        let merged = merge_intervals(apart, 1.0);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_different_kinds_never_merge() {
        let raw = vec![
            interval(IntervalKind::Page, 10, 30),
            interval(IntervalKind::Mouse, 20, 40),
        ];
        let merged = merge_intervals(raw, 1.0);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let raw = vec![
            interval(IntervalKind::Page, 10, 30),
            interval(IntervalKind::Page, 25, 50),
            interval(IntervalKind::Mouse, 5, 12),
            interval(IntervalKind::Page, 80, 90),
        ];

        let once = merge_intervals(raw, 1.0);
        let twice = merge_intervals(once.clone(), 1.0);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_truncated_flag_survives_merge() {
        let mut second = interval(IntervalKind::Page, 25, 50);
        second.truncated = true;
        let raw = vec![interval(IntervalKind::Page, 10, 30), second];

        let merged = merge_intervals(raw, 1.0);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].truncated);
    }

    #[test]
    fn test_empty_phase_yields_no_intervals() {
        let detected =
            detect_phase_intervals("p-1", SessionPhase::Main, &[], &AnalysisConfig::default());
        assert!(detected.intervals.is_empty());
        assert_eq!(detected.total_time_away_sec, 0.0);
    }
}
