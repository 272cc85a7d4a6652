//! Core domain types for the Quitlog tracker.
//!
//! This module defines the fundamental types used throughout the system:
//! - Settings (quit timestamp and smoking habit figures)
//! - Craving events and the drafts they are created from
//! - Trigger/location labels from the configured vocabulary
//! - Derived progress, recovery stages and ranks

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Settings
// ============================================================================

/// 2024-01-01T00:00:00Z
const DEFAULT_QUIT_EPOCH_SECS: i64 = 1_704_067_200;

pub const DEFAULT_COST_PER_PACK: f64 = 12.0;
pub const DEFAULT_CIGARETTES_PER_DAY: f64 = 15.0;

/// Quit timestamp used when none is stored or the stored one is unreadable
pub fn default_quit_timestamp() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(DEFAULT_QUIT_EPOCH_SECS)
}

/// The singleton settings record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub quit_timestamp: DateTime<Utc>,
    pub cost_per_pack: f64,
    pub cigarettes_per_day: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quit_timestamp: default_quit_timestamp(),
            cost_per_pack: DEFAULT_COST_PER_PACK,
            cigarettes_per_day: DEFAULT_CIGARETTES_PER_DAY,
        }
    }
}

// ============================================================================
// Vocabulary labels
// ============================================================================

/// A craving trigger, always a member of the configured trigger set
///
/// Only [`crate::Vocabulary`] hands these out, so a `Trigger` is never free text.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Trigger(String);

impl Trigger {
    pub(crate) fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Trigger {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a craving happened, always a member of the configured location set
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Location(String);

impl Location {
    pub(crate) fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Location {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Craving events
// ============================================================================

/// Caller input for a new craving event
///
/// Trigger and location are raw labels; the event log resolves them against
/// the vocabulary and stamps the timestamp itself.
#[derive(Clone, Debug, Default)]
pub struct CravingDraft {
    pub intensity: u8,
    pub trigger: String,
    pub action_taken: String,
    pub resisted: bool,
    pub location: String,
}

/// A recorded craving event. Immutable once written.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CravingEvent {
    pub timestamp: DateTime<Utc>,
    pub intensity: u8,
    pub trigger: Trigger,
    pub action_taken: String,
    pub resisted: bool,
    pub location: Location,
}

// ============================================================================
// Progress
// ============================================================================

/// A recovery milestone: the stage is current while hours free < `hours`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecoveryMilestone {
    pub hours: f64,
    pub label: String,
}

impl RecoveryMilestone {
    pub fn new(hours: f64, label: impl Into<String>) -> Self {
        Self {
            hours,
            label: label.into(),
        }
    }
}

/// A rank tier: the rank is held while days free < `days`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankTier {
    pub days: i64,
    pub label: String,
    pub reward: f64,
}

impl RankTier {
    pub fn new(days: i64, label: impl Into<String>, reward: f64) -> Self {
        Self {
            days,
            label: label.into(),
            reward,
        }
    }
}

/// Label reported once every recovery milestone has been passed
pub const ADVANCED_RECOVERY_LABEL: &str = "advanced recovery";

/// Physiological recovery bucket selected by hours free
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RecoveryStage {
    /// Working towards the milestone at `index`
    Milestone {
        index: usize,
        label: String,
        threshold_hours: f64,
        progress_fraction: f64,
    },
    /// Past every milestone
    Advanced,
}

impl RecoveryStage {
    pub fn label(&self) -> &str {
        match self {
            RecoveryStage::Milestone { label, .. } => label,
            RecoveryStage::Advanced => ADVANCED_RECOVERY_LABEL,
        }
    }

    /// Progress towards the current milestone in [0, 1]; 1.0 once advanced
    pub fn progress_fraction(&self) -> f64 {
        match self {
            RecoveryStage::Milestone {
                progress_fraction, ..
            } => *progress_fraction,
            RecoveryStage::Advanced => 1.0,
        }
    }

    pub fn is_advanced(&self) -> bool {
        matches!(self, RecoveryStage::Advanced)
    }
}

/// Rank badge selected by days free
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Rank {
    pub label: String,
    pub reward_fraction: f64,
    /// Day count at which the next rank is reached; `None` at the top rank
    pub next_threshold_days: Option<i64>,
}

/// Statistics derived from the settings at a given instant. Never stored.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DerivedProgress {
    pub days_free: i64,
    pub hours_free: f64,
    pub money_saved: f64,
    pub cigarettes_avoided: f64,
    /// The quit timestamp is still in the future; all figures are clamped to zero
    pub not_started: bool,
    pub recovery_stage: RecoveryStage,
    pub rank: Rank,
}
