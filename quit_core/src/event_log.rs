//! Append-only craving log over the `Logs` table.
//!
//! Events are only ever appended; nothing here edits or removes a row.
//! Reading is tolerant: rows that can't be parsed are skipped with a warning
//! rather than failing the whole load.

use crate::settings::parse_timestamp;
use crate::stats::{Counts, TriggerCounts};
use crate::store::{cell, Table, TableStore};
use crate::{CravingDraft, CravingEvent, Error, Location, Result, Trigger, Vocabulary};
use chrono::{DateTime, Utc};

pub const LOGS_TABLE: &str = "Logs";
pub const LOG_COLUMNS: [&str; 6] = [
    "Timestamp",
    "Intensity",
    "Trigger",
    "Action",
    "Resisted",
    "Location",
];

pub const MIN_INTENSITY: u8 = 1;
pub const MAX_INTENSITY: u8 = 10;

/// Positions of the log columns within a stored header
struct LogColumns {
    timestamp: usize,
    intensity: usize,
    trigger: usize,
    action: usize,
    resisted: usize,
    location: usize,
}

impl LogColumns {
    fn locate(table: &Table) -> Result<Self> {
        let find = |name: &str| {
            table.column_index(name).ok_or_else(|| {
                Error::Schema(format!(
                    "table '{}' has no column '{}' (found {:?})",
                    LOGS_TABLE, name, table.columns
                ))
            })
        };

        Ok(Self {
            timestamp: find(LOG_COLUMNS[0])?,
            intensity: find(LOG_COLUMNS[1])?,
            trigger: find(LOG_COLUMNS[2])?,
            action: find(LOG_COLUMNS[3])?,
            resisted: find(LOG_COLUMNS[4])?,
            location: find(LOG_COLUMNS[5])?,
        })
    }
}

fn format_resisted(resisted: bool) -> &'static str {
    if resisted {
        "Yes"
    } else {
        "No"
    }
}

fn parse_resisted(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "yes" | "y" | "true" | "1" => Some(true),
        "no" | "n" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// Row laid out as [`LOG_COLUMNS`]
fn event_to_row(event: &CravingEvent) -> Vec<String> {
    vec![
        event.timestamp.to_rfc3339(),
        event.intensity.to_string(),
        event.trigger.to_string(),
        event.action_taken.clone(),
        format_resisted(event.resisted).to_string(),
        event.location.to_string(),
    ]
}

/// Decode one stored row; the error is the reason the row was rejected
fn row_to_event(
    row: &[String],
    cols: &LogColumns,
    vocabulary: &Vocabulary,
) -> std::result::Result<CravingEvent, String> {
    let raw_timestamp = cell(row, cols.timestamp);
    let timestamp = parse_timestamp(raw_timestamp)
        .ok_or_else(|| format!("invalid timestamp '{}'", raw_timestamp))?;

    let raw_intensity = cell(row, cols.intensity);
    let intensity = raw_intensity
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|i| (MIN_INTENSITY..=MAX_INTENSITY).contains(i))
        .ok_or_else(|| format!("invalid intensity '{}'", raw_intensity))?;

    let raw_resisted = cell(row, cols.resisted);
    let resisted = parse_resisted(raw_resisted)
        .ok_or_else(|| format!("invalid resisted flag '{}'", raw_resisted))?;

    Ok(CravingEvent {
        timestamp,
        intensity,
        trigger: vocabulary.resolve_trigger_lenient(cell(row, cols.trigger)),
        action_taken: cell(row, cols.action).to_string(),
        resisted,
        location: vocabulary.resolve_location_lenient(cell(row, cols.location)),
    })
}

/// Count craving events per trigger
///
/// Pure; an empty log gives empty counts.
pub fn aggregate_by_trigger(log: &[CravingEvent]) -> TriggerCounts {
    Counts::tally(log.iter().map(|e| &e.trigger))
}

/// Craving log bound to a table store and a vocabulary
pub struct EventLog<'a, S: TableStore> {
    store: &'a S,
    vocabulary: &'a Vocabulary,
}

impl<'a, S: TableStore> EventLog<'a, S> {
    pub fn new(store: &'a S, vocabulary: &'a Vocabulary) -> Self {
        Self { store, vocabulary }
    }

    /// Check a draft against the intensity range and the vocabulary
    fn validate(&self, draft: &CravingDraft) -> Result<(Trigger, Location)> {
        if !(MIN_INTENSITY..=MAX_INTENSITY).contains(&draft.intensity) {
            return Err(Error::Validation(format!(
                "intensity must be between {} and {}, got {}",
                MIN_INTENSITY, MAX_INTENSITY, draft.intensity
            )));
        }

        let trigger = self.vocabulary.resolve_trigger(&draft.trigger)?;
        let location = self.vocabulary.resolve_location(&draft.location)?;
        Ok((trigger, location))
    }

    /// Record a craving, stamped with the current time
    ///
    /// Invalid drafts are rejected before the store is touched. Store
    /// failures are returned to the caller.
    pub fn append_event(&self, draft: CravingDraft) -> Result<CravingEvent> {
        self.append_event_at(draft, Utc::now())
    }

    pub(crate) fn append_event_at(
        &self,
        draft: CravingDraft,
        now: DateTime<Utc>,
    ) -> Result<CravingEvent> {
        let (trigger, location) = self.validate(&draft)?;

        let event = CravingEvent {
            timestamp: now,
            intensity: draft.intensity,
            trigger,
            action_taken: draft.action_taken.trim().to_string(),
            resisted: draft.resisted,
            location,
        };

        self.store.append_rows(LOGS_TABLE, &LOG_COLUMNS, vec![event_to_row(&event)])?;

        tracing::info!(
            "Logged craving: {} at {} (intensity {}, {})",
            event.trigger,
            event.location,
            event.intensity,
            if event.resisted { "resisted" } else { "smoked" }
        );
        Ok(event)
    }

    /// Load the whole log, degrading to empty if the store can't be read
    pub fn load(&self) -> Vec<CravingEvent> {
        match self.try_load() {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!("Unable to read craving log: {}. Showing an empty log.", e);
                Vec::new()
            }
        }
    }

    /// Load the whole log, surfacing storage and schema failures
    ///
    /// A missing or header-less table is an empty log.
    pub fn try_load(&self) -> Result<Vec<CravingEvent>> {
        let table = match self.store.read(LOGS_TABLE)? {
            Some(t) if !t.columns.is_empty() => t,
            _ => return Ok(Vec::new()),
        };

        let cols = LogColumns::locate(&table)?;
        let mut events = Vec::with_capacity(table.len());

        for (line, row) in table.rows.iter().enumerate() {
            match row_to_event(row, &cols, self.vocabulary) {
                Ok(event) => events.push(event),
                Err(e) => {
                    tracing::warn!("Skipping log row {}: {}", line + 1, e);
                }
            }
        }

        tracing::debug!("Loaded {} craving events", events.len());
        Ok(events)
    }

    /// Trigger counts over the full log
    pub fn trigger_counts(&self) -> TriggerCounts {
        aggregate_by_trigger(&self.load())
    }
}
