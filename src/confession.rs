//! Confession reconciliation
//!
//! Cross-references automated verdicts against a participant's self-reported
//! list of externally-assisted words, quantifying under-reporting.

use crate::types::{ConfessionRecord, WordVerdict};
use serde::Serialize;
use std::collections::BTreeSet;

/// Outcome of reconciling verdicts with a confession
#[derive(Debug, Clone, Default, Serialize)]
pub struct Reconciliation {
    /// Fraction of flagged words the participant did not confess to.
    /// Defined as 0 when no words were flagged.
    pub lying_rate: f64,
    /// True when the participant confessed any word or admitted using
    /// external resources
    pub has_confessed: bool,
    /// Per flagged word: was it also confessed?
    pub cross_check: Vec<WordCrossCheck>,
    /// Confession oddities; recorded, never fatal
    pub notes: Vec<ReconciliationNote>,
}

/// One flagged word cross-referenced against the confession
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordCrossCheck {
    pub word: String,
    pub flagged: bool,
    pub confessed: bool,
}

/// A confession that does not line up with the rest of the data
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconciliationNote {
    /// The participant confessed a word the classifier never flagged
    ConfessedWordNeverFlagged { word: String },
    /// The participant confessed a word absent from their submissions
    ConfessedWordNotSubmitted { word: String },
}

/// Reconcile a participant's verdicts (all phases) against their confession.
///
/// Word comparison is case-insensitive; verdicts and confessions are both
/// normalized to uppercase upstream, submitted words are passed in already
/// uppercased.
pub fn reconcile(
    verdicts: &[WordVerdict],
    submitted_words: &BTreeSet<String>,
    confession: Option<&ConfessionRecord>,
) -> Reconciliation {
    let flagged: BTreeSet<String> = verdicts
        .iter()
        .filter(|v| v.flagged)
        .map(|v| v.word.to_uppercase())
        .collect();

    let confessed: BTreeSet<String> = confession
        .map(|c| c.confessed_words.iter().map(|w| w.to_uppercase()).collect())
        .unwrap_or_default();

    let unconfessed_count = flagged.difference(&confessed).count();
    let lying_rate = if flagged.is_empty() {
        0.0
    } else {
        unconfessed_count as f64 / flagged.len() as f64
    };

    let cross_check = flagged
        .iter()
        .map(|word| WordCrossCheck {
            word: word.clone(),
            flagged: true,
            confessed: confessed.contains(word),
        })
        .collect();

    let mut notes = Vec::new();
    for word in &confessed {
        if !flagged.contains(word) {
            notes.push(ReconciliationNote::ConfessedWordNeverFlagged { word: word.clone() });
        }
        if !submitted_words.contains(word) {
            notes.push(ReconciliationNote::ConfessedWordNotSubmitted { word: word.clone() });
        }
    }

    let has_confessed = confession
        .map(|c| c.used_external_resources || !c.confessed_words.is_empty())
        .unwrap_or(false);

    Reconciliation {
        lying_rate,
        has_confessed,
        cross_check,
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SessionPhase, TriggerRule};
    use chrono::{TimeZone, Utc};

    fn verdict(word: &str, flagged: bool) -> WordVerdict {
        let mut triggered_rules = BTreeSet::new();
        if flagged {
            triggered_rules.insert(TriggerRule::FastCreation);
        }
        WordVerdict {
            word: word.to_string(),
            length: word.chars().count() as u32,
            phase: SessionPhase::Main,
            validated_at: Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap(),
            creation_time_sec: 2.0,
            triggered_rules,
            flagged,
        }
    }

    fn confession(words: &[&str], used_external: bool) -> ConfessionRecord {
        ConfessionRecord {
            participant_id: "p-1".to_string(),
            confessed_words: words.iter().map(|w| w.to_string()).collect(),
            used_external_resources: used_external,
        }
    }

    fn submitted(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_partial_confession_yields_half_lying_rate() {
        // Confessed {CRATE, TRACED}, flagged {TRACED, RECAST}
        // → flagged − confessed = {RECAST} → lying rate 0.5
        let verdicts = vec![verdict("TRACED", true), verdict("RECAST", true)];
        let conf = confession(&["CRATE", "TRACED"], true);
        let words = submitted(&["CRATE", "TRACED", "RECAST"]);

        let result = reconcile(&verdicts, &words, Some(&conf));
        assert!((result.lying_rate - 0.5).abs() < 0.001);
        assert!(result.has_confessed);

        let unconfessed: Vec<_> = result
            .cross_check
            .iter()
            .filter(|c| !c.confessed)
            .map(|c| c.word.as_str())
            .collect();
        assert_eq!(unconfessed, vec!["RECAST"]);
    }

    #[test]
    fn test_no_flagged_words_gives_zero_lying_rate() {
        let verdicts = vec![verdict("STEADY", false)];
        let conf = confession(&["CRATE"], false);
        let result = reconcile(&verdicts, &submitted(&["STEADY"]), Some(&conf));
        assert_eq!(result.lying_rate, 0.0);
    }

    #[test]
    fn test_lying_rate_stays_in_unit_interval() {
        let verdicts = vec![
            verdict("ONE", true),
            verdict("TWO", true),
            verdict("THREE", true),
        ];

        // Nothing confessed: every flagged word unconfessed
        let none = reconcile(&verdicts, &submitted(&["ONE", "TWO", "THREE"]), None);
        assert_eq!(none.lying_rate, 1.0);

        // Everything confessed
        let conf = confession(&["ONE", "TWO", "THREE"], false);
        let all = reconcile(&verdicts, &submitted(&["ONE", "TWO", "THREE"]), Some(&conf));
        assert_eq!(all.lying_rate, 0.0);
    }

    #[test]
    fn test_confessed_but_never_flagged_is_noted() {
        let verdicts = vec![verdict("TRACED", true)];
        let conf = confession(&["CRATE", "TRACED"], false);
        let result = reconcile(&verdicts, &submitted(&["CRATE", "TRACED"]), Some(&conf));

        assert!(result.notes.contains(&ReconciliationNote::ConfessedWordNeverFlagged {
            word: "CRATE".to_string()
        }));
    }

    #[test]
    fn test_confessed_word_not_submitted_is_noted() {
        let verdicts = vec![verdict("TRACED", true)];
        let conf = confession(&["GHOSTLY"], false);
        let result = reconcile(&verdicts, &submitted(&["TRACED"]), Some(&conf));

        assert!(result.notes.contains(&ReconciliationNote::ConfessedWordNotSubmitted {
            word: "GHOSTLY".to_string()
        }));
    }

    #[test]
    fn test_has_confessed_from_resource_admission_alone() {
        let result = reconcile(&[], &BTreeSet::new(), Some(&confession(&[], true)));
        assert!(result.has_confessed);
        assert_eq!(result.lying_rate, 0.0);

        let silent = reconcile(&[], &BTreeSet::new(), Some(&confession(&[], false)));
        assert!(!silent.has_confessed);
    }

    #[test]
    fn test_no_confession_record_at_all() {
        let verdicts = vec![verdict("TRACED", true)];
        let result = reconcile(&verdicts, &submitted(&["TRACED"]), None);
        assert!(!result.has_confessed);
        assert_eq!(result.lying_rate, 1.0);
        assert!(result.notes.is_empty());
    }
}
