//! Dynamic threshold estimation
//!
//! "Fast" is relative: a 4-letter word in 3 seconds is routine, an 8-letter
//! word in 3 seconds is not, and cohorts differ. Thresholds are therefore
//! derived from the observed population per (phase, word length) instead of
//! hard-coded, using a low percentile of the pooled creation times.

use crate::config::AnalysisConfig;
use crate::types::{SessionPhase, WordRecord};
use std::collections::BTreeMap;

/// Read-only map from (phase, word length) to the fast-creation threshold,
/// computed once per run and shared by every classifier invocation
#[derive(Debug, Clone)]
pub struct ThresholdTable {
    /// Thresholds for groups that met the minimum sample count
    qualified: BTreeMap<(SessionPhase, u32), f64>,
    /// Per-phase percentile over all lengths, the fallback of last resort
    phase_global: BTreeMap<SessionPhase, f64>,
    /// Percentile the table was built with
    percentile: f64,
}

impl ThresholdTable {
    /// Estimate thresholds from the full pool of word records.
    ///
    /// Only valid dictionary words with non-negative creation times
    /// contribute. The caller is responsible for passing only records from
    /// participants without data-quality issues.
    pub fn estimate(words: &[WordRecord], config: &AnalysisConfig) -> Self {
        let mut groups: BTreeMap<(SessionPhase, u32), Vec<f64>> = BTreeMap::new();
        let mut per_phase: BTreeMap<SessionPhase, Vec<f64>> = BTreeMap::new();

        for record in words {
            if !record.is_valid_dictionary_word || record.creation_time_sec < 0.0 {
                continue;
            }
            groups
                .entry((record.phase, record.length))
                .or_default()
                .push(record.creation_time_sec);
            per_phase
                .entry(record.phase)
                .or_default()
                .push(record.creation_time_sec);
        }

        let qualified = groups
            .into_iter()
            .filter(|(_, samples)| samples.len() >= config.min_group_samples)
            .map(|(key, mut samples)| (key, percentile(&mut samples, config.fast_percentile)))
            .collect();

        let phase_global = per_phase
            .into_iter()
            .map(|(phase, mut samples)| (phase, percentile(&mut samples, config.fast_percentile)))
            .collect();

        Self {
            qualified,
            phase_global,
            percentile: config.fast_percentile,
        }
    }

    /// Threshold for a (phase, length) group.
    ///
    /// Resolution order: the group's own threshold if it qualified, else the
    /// nearest qualified length group in the same phase (ties resolve to the
    /// shorter length, so the result is independent of processing order),
    /// else the phase-global percentile. `None` only when the phase has no
    /// valid samples at all — Rule 3 simply cannot fire there.
    pub fn lookup(&self, phase: SessionPhase, length: u32) -> Option<f64> {
        if let Some(&threshold) = self.qualified.get(&(phase, length)) {
            return Some(threshold);
        }

        let nearest = self
            .qualified
            .iter()
            .filter(|((p, _), _)| *p == phase)
            .min_by_key(|((_, len), _)| (len.abs_diff(length), *len))
            .map(|(_, &threshold)| threshold);
        if nearest.is_some() {
            return nearest;
        }

        self.phase_global.get(&phase).copied()
    }

    /// Percentile the table was built with
    pub fn percentile(&self) -> f64 {
        self.percentile
    }

    /// True when no phase produced any valid samples
    pub fn is_empty(&self) -> bool {
        self.phase_global.is_empty()
    }

    /// Number of (phase, length) groups that met the sample minimum
    pub fn qualified_group_count(&self) -> usize {
        self.qualified.len()
    }
}

/// Percentile with linear interpolation between closest ranks.
///
/// Sorting happens in here; callers hand over scratch vectors.
fn percentile(samples: &mut [f64], p: f64) -> f64 {
    debug_assert!(!samples.is_empty());
    samples.sort_by(|a, b| a.partial_cmp(b).expect("creation times are finite"));

    let rank = (p / 100.0) * (samples.len() as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return samples[lower];
    }
    let weight = rank - lower as f64;
    samples[lower] * (1.0 - weight) + samples[upper] * weight
}
