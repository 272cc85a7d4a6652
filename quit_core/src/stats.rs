//! Aggregate views over the craving log.
//!
//! All functions here are pure over a slice of events; callers load the log
//! once and derive as many views as they need.

use crate::{CravingEvent, Location, Trigger};
use chrono::{DateTime, Utc};
use serde::ser::{Serialize, Serializer};

/// Occurrence counts per label, in first-appearance order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Counts<L> {
    entries: Vec<(L, usize)>,
}

pub type TriggerCounts = Counts<Trigger>;
pub type LocationCounts = Counts<Location>;

impl<L> Default for Counts<L> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<L: PartialEq + Clone + AsRef<str>> Counts<L> {
    /// Count each label yielded by `labels`
    pub fn tally<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a L>,
        L: 'a,
    {
        let mut counts = Self::default();
        for label in labels {
            match counts.entries.iter_mut().find(|entry| entry.0 == *label) {
                Some(entry) => entry.1 += 1,
                None => counts.entries.push((label.clone(), 1)),
            }
        }
        counts
    }

    /// Count for a label given by name; 0 when it never occurred
    pub fn get(&self, label: &str) -> usize {
        self.entries
            .iter()
            .find(|(l, _)| l.as_ref() == label)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&L, usize)> {
        self.entries.iter().map(|(l, n)| (l, *n))
    }

    /// Number of distinct labels
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts
    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, n)| n).sum()
    }

    /// Entries by count, highest first; ties keep first-appearance order
    pub fn sorted_by_frequency(&self) -> Vec<(L, usize)> {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| b.1.cmp(&a.1));
        sorted
    }
}

impl<L: Serialize> Serialize for Counts<L> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(l, n)| (l, n)))
    }
}

/// Count craving events per location
pub fn aggregate_by_location(log: &[CravingEvent]) -> LocationCounts {
    Counts::tally(log.iter().map(|e| &e.location))
}

/// Headline figures for the craving log
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct LogSummary {
    pub total: usize,
    pub resisted: usize,
    pub smoked: usize,
    /// Share of cravings resisted; `None` for an empty log
    pub resist_rate: Option<f64>,
    pub mean_intensity: Option<f64>,
    pub last_event: Option<DateTime<Utc>>,
}

pub fn summarize(log: &[CravingEvent]) -> LogSummary {
    let total = log.len();
    let resisted = log.iter().filter(|e| e.resisted).count();

    let (resist_rate, mean_intensity) = if total == 0 {
        (None, None)
    } else {
        let intensity_sum: u32 = log.iter().map(|e| u32::from(e.intensity)).sum();
        (
            Some(resisted as f64 / total as f64),
            Some(intensity_sum as f64 / total as f64),
        )
    };

    LogSummary {
        total,
        resisted,
        smoked: total - resisted,
        resist_rate,
        mean_intensity,
        last_event: log.iter().map(|e| e.timestamp).max(),
    }
}

/// The `limit` most recent events, newest first
pub fn recent(log: &[CravingEvent], limit: usize) -> Vec<CravingEvent> {
    let mut events = log.to_vec();
    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    events.truncate(limit);
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::default_vocabulary;
    use chrono::{Duration, TimeZone};

    fn event(
        minutes: i64,
        trigger: &str,
        location: &str,
        intensity: u8,
        resisted: bool,
    ) -> CravingEvent {
        let vocab = default_vocabulary();
        CravingEvent {
            timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minutes),
            intensity,
            trigger: vocab.resolve_trigger(trigger).unwrap(),
            action_taken: String::new(),
            resisted,
            location: vocab.resolve_location(location).unwrap(),
        }
    }

    #[test]
    fn test_location_counts() {
        let log = vec![
            event(0, "Stress", "Work", 5, true),
            event(1, "Coffee", "Home", 5, true),
            event(2, "Stress", "Work", 5, false),
        ];
        let counts = aggregate_by_location(&log);

        assert_eq!(counts.get("Work"), 2);
        assert_eq!(counts.get("Home"), 1);
        assert_eq!(counts.get("Outside"), 0);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_sorted_by_frequency_keeps_ties_stable() {
        let log = vec![
            event(0, "Meal", "Home", 3, true),
            event(1, "Social", "Outside", 3, true),
            event(2, "Alcohol", "Outside", 3, true),
            event(3, "Alcohol", "Outside", 3, true),
        ];
        let counts = Counts::tally(log.iter().map(|e| &e.trigger));
        let order: Vec<String> = counts
            .sorted_by_frequency()
            .into_iter()
            .map(|(t, _)| t.to_string())
            .collect();

        assert_eq!(order, vec!["Alcohol", "Meal", "Social"]);
    }

    #[test]
    fn test_counts_serialize_as_ordered_map() {
        let log = vec![
            event(0, "Boredom", "Home", 3, true),
            event(1, "Stress", "Home", 3, true),
            event(2, "Boredom", "Home", 3, true),
        ];
        let counts = Counts::tally(log.iter().map(|e| &e.trigger));
        let json = serde_json::to_string(&counts).unwrap();
        assert_eq!(json, r#"{"Boredom":2,"Stress":1}"#);
    }

    #[test]
    fn test_summary() {
        let log = vec![
            event(0, "Stress", "Home", 8, true),
            event(30, "Stress", "Home", 4, false),
            event(10, "Meal", "Home", 6, true),
            event(20, "Coffee", "Work", 2, true),
        ];
        let summary = summarize(&log);

        assert_eq!(summary.total, 4);
        assert_eq!(summary.resisted, 3);
        assert_eq!(summary.smoked, 1);
        assert_eq!(summary.resist_rate, Some(0.75));
        assert_eq!(summary.mean_intensity, Some(5.0));
        assert_eq!(summary.last_event, Some(log[1].timestamp));
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.resist_rate, None);
        assert_eq!(summary.mean_intensity, None);
        assert_eq!(summary.last_event, None);
        assert!(aggregate_by_location(&[]).is_empty());
    }

    #[test]
    fn test_recent_is_newest_first() {
        let log = vec![
            event(5, "Stress", "Home", 1, true),
            event(50, "Meal", "Home", 1, true),
            event(20, "Coffee", "Home", 1, true),
        ];
        let latest = recent(&log, 2);

        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].trigger.as_str(), "Meal");
        assert_eq!(latest[1].trigger.as_str(), "Coffee");
        assert_eq!(recent(&log, 10).len(), 3);
    }
}
