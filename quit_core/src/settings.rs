//! Settings accessor over the `Settings` key/value table.
//!
//! Reading never fails: a missing table, missing key or malformed value
//! resolves to the documented default. Writing always replaces the whole
//! table with exactly three rows in one atomic overwrite.

use crate::store::{cell, Table, TableStore};
use crate::{Error, Result, Settings};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

pub const SETTINGS_TABLE: &str = "Settings";
pub const KEY_COLUMN: &str = "Key";
pub const VALUE_COLUMN: &str = "Value";

pub const QUIT_TIMESTAMP_KEY: &str = "quit_timestamp";
pub const COST_PER_PACK_KEY: &str = "cost_per_pack";
pub const CIGARETTES_PER_DAY_KEY: &str = "cigarettes_per_day";

/// Naive layouts accepted besides RFC 3339, all read as UTC
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a stored timestamp
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` and a bare
/// `YYYY-MM-DD` (midnight). Offset-less forms are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parse a strictly positive, finite decimal
fn parse_positive(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

/// Value stored under `key`, matched case-insensitively
fn lookup<'a>(table: &'a Table, key_col: usize, value_col: usize, key: &str) -> Option<&'a str> {
    table
        .rows
        .iter()
        .find(|row| cell(row, key_col).trim().eq_ignore_ascii_case(key))
        .map(|row| cell(row, value_col))
}

/// Resolve a stored value or fall back to `default`, logging why
fn resolve_or<T>(
    raw: Option<&str>,
    key: &str,
    default: T,
    parse: impl Fn(&str) -> Option<T>,
) -> T {
    match raw {
        None => {
            tracing::debug!("Setting '{}' not stored, using default", key);
            default
        }
        Some(raw) => match parse(raw) {
            Some(value) => value,
            None => {
                tracing::warn!("Setting '{}' has unusable value '{}', using default", key, raw);
                default
            }
        },
    }
}

/// Resolve settings from the raw `Settings` table
///
/// Never fails. `None`, an empty table or a table without `Key`/`Value`
/// columns all give the defaults.
pub fn resolve_settings(rows: Option<&Table>) -> Settings {
    let defaults = Settings::default();

    let table = match rows {
        Some(t) => t,
        None => return defaults,
    };

    let (key_col, value_col) = match (
        table.column_index(KEY_COLUMN),
        table.column_index(VALUE_COLUMN),
    ) {
        (Some(k), Some(v)) => (k, v),
        _ => {
            if !table.columns.is_empty() {
                tracing::warn!(
                    "Settings table has columns {:?}, expected Key/Value. Using defaults.",
                    table.columns
                );
            }
            return defaults;
        }
    };

    let get = |key| lookup(table, key_col, value_col, key);

    Settings {
        quit_timestamp: resolve_or(
            get(QUIT_TIMESTAMP_KEY),
            QUIT_TIMESTAMP_KEY,
            defaults.quit_timestamp,
            parse_timestamp,
        ),
        cost_per_pack: resolve_or(
            get(COST_PER_PACK_KEY),
            COST_PER_PACK_KEY,
            defaults.cost_per_pack,
            parse_positive,
        ),
        cigarettes_per_day: resolve_or(
            get(CIGARETTES_PER_DAY_KEY),
            CIGARETTES_PER_DAY_KEY,
            defaults.cigarettes_per_day,
            parse_positive,
        ),
    }
}

/// The three-row table that represents `settings`
pub fn settings_table(settings: &Settings) -> Table {
    Table::with_rows(
        &[KEY_COLUMN, VALUE_COLUMN],
        vec![
            vec![
                QUIT_TIMESTAMP_KEY.to_string(),
                settings.quit_timestamp.to_rfc3339(),
            ],
            vec![
                COST_PER_PACK_KEY.to_string(),
                settings.cost_per_pack.to_string(),
            ],
            vec![
                CIGARETTES_PER_DAY_KEY.to_string(),
                settings.cigarettes_per_day.to_string(),
            ],
        ],
    )
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "{} must be a positive number, got {}",
            name, value
        )))
    }
}

/// Settings accessor bound to a table store
pub struct SettingsStore<'a, S: TableStore> {
    store: &'a S,
}

impl<'a, S: TableStore> SettingsStore<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Load settings, degrading to defaults if the store can't be read
    pub fn load(&self) -> Settings {
        match self.try_load() {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Unable to read settings: {}. Using defaults.", e);
                Settings::default()
            }
        }
    }

    /// Load settings, surfacing storage failures
    ///
    /// A missing table or malformed values still resolve to defaults.
    pub fn try_load(&self) -> Result<Settings> {
        let table = self.store.read(SETTINGS_TABLE)?;
        if table.is_none() {
            tracing::info!("No settings stored yet, using defaults");
        }
        Ok(resolve_settings(table.as_ref()))
    }

    /// Replace all three settings in one overwrite
    ///
    /// Rejects non-positive or non-finite figures before touching the store.
    pub fn persist(
        &self,
        quit_timestamp: DateTime<Utc>,
        cost_per_pack: f64,
        cigarettes_per_day: f64,
    ) -> Result<()> {
        self.persist_settings(&Settings {
            quit_timestamp,
            cost_per_pack,
            cigarettes_per_day,
        })
    }

    pub fn persist_settings(&self, settings: &Settings) -> Result<()> {
        check_positive(COST_PER_PACK_KEY, settings.cost_per_pack)?;
        check_positive(CIGARETTES_PER_DAY_KEY, settings.cigarettes_per_day)?;

        self.store.overwrite(SETTINGS_TABLE, &settings_table(settings))?;

        tracing::info!(
            "Saved settings: quit {} / {} per pack / {} per day",
            settings.quit_timestamp.to_rfc3339(),
            settings.cost_per_pack,
            settings.cigarettes_per_day
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::UnavailableStore;
    use crate::MemoryTableStore;
    use chrono::TimeZone;

    fn kv(pairs: &[(&str, &str)]) -> Table {
        Table::with_rows(
            &["Key", "Value"],
            pairs
                .iter()
                .map(|(k, v)| vec![k.to_string(), v.to_string()])
                .collect(),
        )
    }

    #[test]
    fn test_empty_table_gives_defaults() {
        assert_eq!(resolve_settings(None), Settings::default());
        assert_eq!(resolve_settings(Some(&kv(&[]))), Settings::default());

        let settings = resolve_settings(Some(&kv(&[])));
        assert_eq!(
            settings.quit_timestamp,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(settings.cost_per_pack, 12.0);
        assert_eq!(settings.cigarettes_per_day, 15.0);
    }

    #[test]
    fn test_stored_values_are_used() {
        let settings = resolve_settings(Some(&kv(&[
            ("quit_timestamp", "2025-03-14 09:30:00"),
            ("cost_per_pack", "9.5"),
            ("cigarettes_per_day", "20"),
        ])));

        assert_eq!(
            settings.quit_timestamp,
            Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap()
        );
        assert_eq!(settings.cost_per_pack, 9.5);
        assert_eq!(settings.cigarettes_per_day, 20.0);
    }

    #[test]
    fn test_malformed_date_falls_back() {
        let settings = resolve_settings(Some(&kv(&[
            ("quit_timestamp", "not-a-date"),
            ("cost_per_pack", "10"),
        ])));

        assert_eq!(settings.quit_timestamp, Settings::default().quit_timestamp);
        assert_eq!(settings.cost_per_pack, 10.0);
    }

    #[test]
    fn test_unusable_numbers_fall_back_individually() {
        let settings = resolve_settings(Some(&kv(&[
            ("cost_per_pack", "twelve"),
            ("cigarettes_per_day", "-3"),
        ])));

        assert_eq!(settings.cost_per_pack, 12.0);
        assert_eq!(settings.cigarettes_per_day, 15.0);

        let settings = resolve_settings(Some(&kv(&[("cost_per_pack", "NaN")])));
        assert_eq!(settings.cost_per_pack, 12.0);
    }

    #[test]
    fn test_wrong_columns_give_defaults() {
        let table = Table::with_rows(
            &["Name", "Setting"],
            vec![vec!["cost_per_pack".into(), "99".into()]],
        );
        assert_eq!(resolve_settings(Some(&table)), Settings::default());
    }

    #[test]
    fn test_keys_match_case_insensitively() {
        let settings = resolve_settings(Some(&kv(&[(" Cost_Per_Pack ", "7.25")])));
        assert_eq!(settings.cost_per_pack, 7.25);
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-06-01T08:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-06-01T10:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-06-01 08:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-06-01T08:00:00.000"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-06-01"),
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("June 1st"), None);
    }

    #[test]
    fn test_persist_then_load_roundtrip() {
        let store = MemoryTableStore::new();
        let settings_store = SettingsStore::new(&store);
        let quit = Utc.with_ymd_and_hms(2025, 2, 3, 4, 5, 6).unwrap();

        settings_store.persist(quit, 14.0, 8.0).unwrap();

        let table = store.read(SETTINGS_TABLE).unwrap().unwrap();
        assert_eq!(table.len(), 3);

        let loaded = settings_store.load();
        assert_eq!(loaded.quit_timestamp, quit);
        assert_eq!(loaded.cost_per_pack, 14.0);
        assert_eq!(loaded.cigarettes_per_day, 8.0);
    }

    #[test]
    fn test_persist_replaces_every_row() {
        let store = MemoryTableStore::new();
        store
            .overwrite(
                SETTINGS_TABLE,
                &kv(&[("cost_per_pack", "1"), ("stale_key", "x"), ("another", "y")]),
            )
            .unwrap();

        SettingsStore::new(&store)
            .persist_settings(&Settings::default())
            .unwrap();

        let table = store.read(SETTINGS_TABLE).unwrap().unwrap();
        assert_eq!(table, settings_table(&Settings::default()));
    }

    #[test]
    fn test_persist_rejects_non_positive_values() {
        let store = MemoryTableStore::new();
        let settings_store = SettingsStore::new(&store);

        let err = settings_store
            .persist(Utc::now(), 0.0, 10.0)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = settings_store
            .persist(Utc::now(), 10.0, f64::INFINITY)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        // Nothing was written
        assert!(store.read(SETTINGS_TABLE).unwrap().is_none());
    }

    #[test]
    fn test_unreachable_store() {
        let settings_store = SettingsStore::new(&UnavailableStore);

        // Reads degrade to defaults
        assert_eq!(settings_store.load(), Settings::default());
        assert!(settings_store.try_load().is_err());

        // Writes surface the failure
        let err = settings_store
            .persist_settings(&Settings::default())
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }
}
