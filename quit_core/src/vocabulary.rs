//! Closed label sets for craving triggers and locations.
//!
//! Deployments disagree on the exact sets ("Coffee" in one, "Waking Up" in
//! another), so the sets are configuration rather than a compiled enum. Each
//! set is still closed: submissions must name a member, and stored rows with
//! unknown labels fold into the designated fallback.

use crate::{Error, Location, Result, Trigger};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Cached default vocabulary
static DEFAULT_VOCABULARY: Lazy<Vocabulary> = Lazy::new(Vocabulary::default);

/// Get a reference to the cached default vocabulary
pub fn default_vocabulary() -> &'static Vocabulary {
    &DEFAULT_VOCABULARY
}

/// Trigger and location label sets, plus the shared fallback label
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    #[serde(default = "default_triggers")]
    pub triggers: Vec<String>,

    #[serde(default = "default_locations")]
    pub locations: Vec<String>,

    #[serde(default = "default_fallback")]
    pub fallback: String,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            triggers: default_triggers(),
            locations: default_locations(),
            fallback: default_fallback(),
        }
    }
}

fn default_triggers() -> Vec<String> {
    vec![
        "Stress".into(),
        "Boredom".into(),
        "Meal".into(),
        "Coffee".into(),
        "Alcohol".into(),
        "Social".into(),
        "Waking Up".into(),
        "Other".into(),
    ]
}

fn default_locations() -> Vec<String> {
    vec![
        "Home".into(),
        "Work".into(),
        "Car/Transit".into(),
        "Outside".into(),
        "Other".into(),
    ]
}

fn default_fallback() -> String {
    "Other".into()
}

/// Find the canonical spelling of `raw` in `set`, ignoring case and padding
fn find_label<'a>(set: &'a [String], raw: &str) -> Option<&'a str> {
    let wanted = raw.trim();
    set.iter()
        .find(|label| label.eq_ignore_ascii_case(wanted))
        .map(String::as_str)
}

impl Vocabulary {
    /// Resolve a submitted trigger label; unknown labels are rejected
    pub fn resolve_trigger(&self, raw: &str) -> Result<Trigger> {
        find_label(&self.triggers, raw)
            .map(Trigger::new)
            .ok_or_else(|| {
                Error::Validation(format!(
                    "unknown trigger '{}' (expected one of: {})",
                    raw.trim(),
                    self.triggers.join(", ")
                ))
            })
    }

    /// Resolve a submitted location label; unknown labels are rejected
    pub fn resolve_location(&self, raw: &str) -> Result<Location> {
        find_label(&self.locations, raw)
            .map(Location::new)
            .ok_or_else(|| {
                Error::Validation(format!(
                    "unknown location '{}' (expected one of: {})",
                    raw.trim(),
                    self.locations.join(", ")
                ))
            })
    }

    /// Resolve a stored trigger label, folding unknown labels into the fallback
    pub fn resolve_trigger_lenient(&self, raw: &str) -> Trigger {
        match find_label(&self.triggers, raw) {
            Some(label) => Trigger::new(label),
            None => {
                tracing::warn!(
                    "Unknown trigger '{}' in log, counting it as '{}'",
                    raw,
                    self.fallback
                );
                Trigger::new(self.fallback.clone())
            }
        }
    }

    /// Resolve a stored location label, folding unknown labels into the fallback
    pub fn resolve_location_lenient(&self, raw: &str) -> Location {
        match find_label(&self.locations, raw) {
            Some(label) => Location::new(label),
            None => {
                tracing::warn!(
                    "Unknown location '{}' in log, counting it as '{}'",
                    raw,
                    self.fallback
                );
                Location::new(self.fallback.clone())
            }
        }
    }

    /// Validate the vocabulary and return any problems found
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (kind, set) in [("trigger", &self.triggers), ("location", &self.locations)] {
            if set.is_empty() {
                errors.push(format!("No {} labels configured", kind));
                continue;
            }

            let mut seen = HashSet::new();
            for label in set {
                if label.trim().is_empty() {
                    errors.push(format!("Empty {} label", kind));
                    continue;
                }
                if !seen.insert(label.trim().to_lowercase()) {
                    errors.push(format!("Duplicate {} label '{}'", kind, label));
                }
            }

            if find_label(set, &self.fallback).is_none() {
                errors.push(format!(
                    "Fallback label '{}' is not one of the {} labels",
                    self.fallback, kind
                ));
            }
        }

        errors
    }
}
