use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use quit_core::settings::parse_timestamp;
use quit_core::stats::recent;
use quit_core::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quitlog")]
#[command(about = "Smoke-free progress tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the progress dashboard (default)
    Status {
        /// Evaluate progress at this instant instead of now (RFC 3339 or YYYY-MM-DD HH:MM:SS)
        #[arg(long)]
        at: Option<String>,

        /// Print JSON instead of the dashboard
        #[arg(long)]
        json: bool,
    },

    /// Log a craving
    Log {
        /// How strong the craving was (1-10)
        #[arg(long)]
        intensity: u8,

        /// What set it off
        #[arg(long)]
        trigger: String,

        /// Where it happened
        #[arg(long)]
        location: String,

        /// What you did about it
        #[arg(long, default_value = "")]
        action: String,

        /// You got through it without smoking
        #[arg(long)]
        resisted: bool,
    },

    /// Show or replace the quit settings
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },

    /// Show how often each trigger comes up
    Triggers {
        /// Print JSON instead of the chart
        #[arg(long)]
        json: bool,
    },

    /// List recent cravings, newest first
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the current settings (default)
    Show,

    /// Replace all three settings
    Set {
        /// When you quit (RFC 3339, YYYY-MM-DD HH:MM:SS or YYYY-MM-DD)
        #[arg(long)]
        quit: String,

        /// Price of one pack
        #[arg(long)]
        cost: f64,

        /// Cigarettes you used to smoke per day
        #[arg(long)]
        cigs: f64,
    },
}

fn main() -> Result<()> {
    // Keep stdout clean for dashboard and JSON output
    quit_core::logging::init_with_level("warn");

    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let errors = config.validate();
    if !errors.is_empty() {
        eprintln!("Configuration errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::Config("Invalid configuration".into()));
    }

    if let Some(dir) = cli.data_dir {
        config.data.data_dir = dir;
    }
    let store = CsvTableStore::new(config.tables_dir());
    tracing::debug!("Using tables in {}", store.dir().display());

    match cli.command {
        Some(Commands::Status { at, json }) => cmd_status(&store, &config, at, json),
        Some(Commands::Log {
            intensity,
            trigger,
            location,
            action,
            resisted,
        }) => cmd_log(
            &store,
            &config,
            CravingDraft {
                intensity,
                trigger,
                action_taken: action,
                resisted,
                location,
            },
        ),
        Some(Commands::Settings { action }) => match action {
            Some(SettingsAction::Set { quit, cost, cigs }) => {
                cmd_settings_set(&store, &quit, cost, cigs)
            }
            Some(SettingsAction::Show) | None => cmd_settings_show(&store),
        },
        Some(Commands::Triggers { json }) => cmd_triggers(&store, &config, json),
        Some(Commands::History { limit }) => cmd_history(&store, &config, limit),
        None => {
            // Default to "status" command
            cmd_status(&store, &config, None, false)
        }
    }
}

fn parse_instant(raw: &str, what: &str) -> Result<DateTime<Utc>> {
    parse_timestamp(raw)
        .ok_or_else(|| Error::Validation(format!("invalid {} '{}'", what, raw)))
}

fn cmd_status(
    store: &CsvTableStore,
    config: &Config,
    at: Option<String>,
    json: bool,
) -> Result<()> {
    let now = match at {
        Some(ref raw) => parse_instant(raw, "--at time")?,
        None => Utc::now(),
    };

    let settings = SettingsStore::new(store).load();
    let progress = compute_progress_with(now, &settings, &config.progress_tables());
    let events = EventLog::new(store, &config.vocabulary).load();
    let summary = summarize(&events);

    if json {
        let doc = serde_json::json!({
            "now": now,
            "settings": settings,
            "progress": progress,
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    display_status(&settings, &progress, &summary);
    Ok(())
}

fn cmd_log(store: &CsvTableStore, config: &Config, draft: CravingDraft) -> Result<()> {
    let event = EventLog::new(store, &config.vocabulary).append_event(draft)?;

    println!(
        "\n✓ Craving logged: {} at {} (intensity {})",
        event.trigger, event.location, event.intensity
    );
    if event.resisted {
        println!("  Resisted. Nice work.");
    }

    Ok(())
}

fn cmd_settings_show(store: &CsvTableStore) -> Result<()> {
    let settings = SettingsStore::new(store).load();
    display_settings(&settings);
    Ok(())
}

fn cmd_settings_set(store: &CsvTableStore, quit: &str, cost: f64, cigs: f64) -> Result<()> {
    let quit_timestamp = parse_instant(quit, "quit date")?;
    let settings_store = SettingsStore::new(store);
    settings_store.persist(quit_timestamp, cost, cigs)?;

    println!("\n✓ Settings saved");
    display_settings(&settings_store.load());
    Ok(())
}

fn cmd_triggers(store: &CsvTableStore, config: &Config, json: bool) -> Result<()> {
    let counts = EventLog::new(store, &config.vocabulary).trigger_counts();

    if json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
        return Ok(());
    }

    if counts.is_empty() {
        println!("No cravings logged yet.");
        return Ok(());
    }

    println!("\nCraving triggers ({} total)\n", counts.total());

    let sorted = counts.sorted_by_frequency();
    let max = sorted.first().map(|(_, n)| *n).unwrap_or(1);
    let width = sorted
        .iter()
        .map(|(t, _)| t.as_str().chars().count())
        .max()
        .unwrap_or(0);

    for (trigger, count) in &sorted {
        println!(
            "  {:<width$}  {} {}",
            trigger.as_str(),
            bar(*count as f64 / max as f64, 30),
            count,
            width = width
        );
    }
    println!();

    Ok(())
}

fn cmd_history(store: &CsvTableStore, config: &Config, limit: usize) -> Result<()> {
    let events = EventLog::new(store, &config.vocabulary).load();

    if events.is_empty() {
        println!("No cravings logged yet.");
        return Ok(());
    }

    for event in recent(&events, limit) {
        let outcome = if event.resisted { "resisted" } else { "smoked" };
        print!(
            "{}  {} @ {}  intensity {}  {}",
            event.timestamp.format("%Y-%m-%d %H:%M"),
            event.trigger,
            event.location,
            event.intensity,
            outcome
        );
        if !event.action_taken.is_empty() {
            print!("  ({})", event.action_taken);
        }
        println!();
    }

    Ok(())
}

/// Horizontal bar for a fraction in [0, 1]
fn bar(fraction: f64, width: usize) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

fn display_settings(settings: &Settings) {
    println!();
    println!(
        "  Quit on:            {}",
        settings.quit_timestamp.format("%Y-%m-%d %H:%M UTC")
    );
    println!("  Cost per pack:      {:.2}", settings.cost_per_pack);
    println!("  Cigarettes per day: {}", settings.cigarettes_per_day);
    println!();
}

fn display_status(settings: &Settings, progress: &DerivedProgress, summary: &LogSummary) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  SMOKE-FREE PROGRESS");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!(
        "  Quit on:            {}",
        settings.quit_timestamp.format("%Y-%m-%d %H:%M UTC")
    );
    if progress.not_started {
        println!("  (quit date is still ahead, counting starts then)");
    }
    println!("  Days free:          {}", progress.days_free);
    println!("  Hours free:         {:.1}", progress.hours_free);
    println!("  Money saved:        {:.2}", progress.money_saved);
    println!("  Cigarettes avoided: {:.0}", progress.cigarettes_avoided);
    println!();

    let stage = &progress.recovery_stage;
    println!(
        "  Recovery: {}  {} {:.0}%",
        stage.label(),
        bar(stage.progress_fraction(), 20),
        stage.progress_fraction() * 100.0
    );

    match progress.rank.next_threshold_days {
        Some(days) => println!(
            "  Rank:     {} (next rank at {} days)",
            progress.rank.label, days
        ),
        None => println!("  Rank:     {}", progress.rank.label),
    }
    println!();

    match summary.resist_rate {
        Some(rate) => println!(
            "  Cravings logged: {} ({} resisted, {:.0}%)",
            summary.total,
            summary.resisted,
            rate * 100.0
        ),
        None => println!("  Cravings logged: 0"),
    }
    println!();
}
