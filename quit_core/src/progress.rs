//! Progress engine: derived statistics from the quit timestamp.
//!
//! Everything here is a pure function of `(now, settings)` plus the
//! milestone/rank tables:
//! - Days free (floored), hours free (fractional)
//! - Money saved and cigarettes avoided
//! - Recovery stage by hours free, rank badge by days free
//!
//! Both classifications scan their table in ascending order and pick the
//! first entry whose threshold is strictly greater than the elapsed figure,
//! so a value sitting exactly on a threshold already belongs to the next
//! bucket.

use crate::{DerivedProgress, Rank, RankTier, RecoveryMilestone, RecoveryStage, Settings};
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Cigarettes in a pack
pub const PACK_SIZE: f64 = 20.0;

/// Rank held once every tier threshold has been passed
pub const TOP_RANK_LABEL: &str = "Smoke-Free Legend";

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Cached default milestone and rank tables
static DEFAULT_TABLES: Lazy<ProgressTables> = Lazy::new(ProgressTables::default);

/// Ordered recovery milestones and rank tiers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressTables {
    pub milestones: Vec<RecoveryMilestone>,
    pub ranks: Vec<RankTier>,
}

impl Default for ProgressTables {
    fn default() -> Self {
        Self {
            milestones: default_recovery_milestones(),
            ranks: default_rank_tiers(),
        }
    }
}

impl ProgressTables {
    /// Get a reference to the cached default tables
    pub fn builtin() -> &'static ProgressTables {
        &DEFAULT_TABLES
    }

    /// Validate both tables and return any problems found
    pub fn validate(&self) -> Vec<String> {
        let mut errors = validate_milestones(&self.milestones);
        errors.extend(validate_ranks(&self.ranks));
        errors
    }
}

pub fn default_recovery_milestones() -> Vec<RecoveryMilestone> {
    vec![
        RecoveryMilestone::new(24.0, "CO cleared"),
        RecoveryMilestone::new(72.0, "nicotine cleared"),
        RecoveryMilestone::new(336.0, "circulation/lung improvement"),
        RecoveryMilestone::new(2160.0, "extended lung capacity gain"),
    ]
}

pub fn default_rank_tiers() -> Vec<RankTier> {
    vec![
        RankTier::new(1, "Recruit", 0.0),
        RankTier::new(3, "Survivor", 0.1),
        RankTier::new(7, "Fighter", 0.25),
        RankTier::new(30, "Warrior", 0.5),
        RankTier::new(90, "Champion", 0.75),
        RankTier::new(365, "Master", 0.9),
    ]
}

/// Compute progress with the built-in milestone and rank tables
pub fn compute_progress(now: DateTime<Utc>, settings: &Settings) -> DerivedProgress {
    compute_progress_with(now, settings, ProgressTables::builtin())
}

/// Compute progress with the given milestone and rank tables
///
/// A quit timestamp in the future is clamped: elapsed time counts as zero
/// and `not_started` is set.
pub fn compute_progress_with(
    now: DateTime<Utc>,
    settings: &Settings,
    tables: &ProgressTables,
) -> DerivedProgress {
    let raw_elapsed = now - settings.quit_timestamp;
    let not_started = raw_elapsed < Duration::zero();
    let elapsed = if not_started {
        Duration::zero()
    } else {
        raw_elapsed
    };

    // Non-negative, so truncation equals floor
    let days_free = elapsed.num_days();
    let hours_free = elapsed.num_milliseconds() as f64 / MS_PER_HOUR;

    let days = days_free as f64;
    let money_saved = days * (settings.cost_per_pack / PACK_SIZE) * settings.cigarettes_per_day;
    let cigarettes_avoided = days * settings.cigarettes_per_day;

    DerivedProgress {
        days_free,
        hours_free,
        money_saved,
        cigarettes_avoided,
        not_started,
        recovery_stage: classify_recovery(hours_free, &tables.milestones),
        rank: classify_rank(days_free, &tables.ranks),
    }
}

/// Place `hours_free` in the first milestone it hasn't reached yet
pub fn classify_recovery(hours_free: f64, milestones: &[RecoveryMilestone]) -> RecoveryStage {
    milestones
        .iter()
        .enumerate()
        .find(|(_, m)| hours_free < m.hours)
        .map(|(index, m)| RecoveryStage::Milestone {
            index,
            label: m.label.clone(),
            threshold_hours: m.hours,
            progress_fraction: (hours_free / m.hours).clamp(0.0, 1.0),
        })
        .unwrap_or(RecoveryStage::Advanced)
}

/// Place `days_free` in the first rank tier it hasn't reached yet
pub fn classify_rank(days_free: i64, tiers: &[RankTier]) -> Rank {
    match tiers.iter().find(|t| days_free < t.days) {
        Some(tier) => Rank {
            label: tier.label.clone(),
            reward_fraction: tier.reward,
            next_threshold_days: Some(tier.days),
        },
        None => Rank {
            label: TOP_RANK_LABEL.to_string(),
            reward_fraction: 1.0,
            next_threshold_days: None,
        },
    }
}

/// Validate a milestone table and return any problems found
pub fn validate_milestones(milestones: &[RecoveryMilestone]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut previous: Option<f64> = None;

    for m in milestones {
        if m.label.trim().is_empty() {
            errors.push(format!("Recovery milestone at {}h has empty label", m.hours));
        }
        if !m.hours.is_finite() || m.hours <= 0.0 {
            errors.push(format!(
                "Recovery milestone '{}' has invalid threshold {}h",
                m.label, m.hours
            ));
        }
        if let Some(prev) = previous {
            if m.hours <= prev {
                errors.push(format!(
                    "Recovery milestone '{}' ({}h) is not after the previous one ({}h)",
                    m.label, m.hours, prev
                ));
            }
        }
        previous = Some(m.hours);
    }

    errors
}

/// Validate a rank table and return any problems found
pub fn validate_ranks(tiers: &[RankTier]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut previous: Option<i64> = None;

    for t in tiers {
        if t.label.trim().is_empty() {
            errors.push(format!("Rank tier at {} days has empty label", t.days));
        }
        if t.days <= 0 {
            errors.push(format!(
                "Rank '{}' has invalid threshold {} days",
                t.label, t.days
            ));
        }
        if !(0.0..=1.0).contains(&t.reward) {
            errors.push(format!(
                "Rank '{}' reward {} is outside [0, 1]",
                t.label, t.reward
            ));
        }
        if let Some(prev) = previous {
            if t.days <= prev {
                errors.push(format!(
                    "Rank '{}' ({} days) is not after the previous one ({} days)",
                    t.label, t.days, prev
                ));
            }
        }
        previous = Some(t.days);
    }

    errors
}
