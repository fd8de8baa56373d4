mod error;
mod extract;
mod location;
mod models;
mod planner;
mod run;
mod scheduler;
mod transport;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::warn;

use location::LocationResolver;
use models::{JobRecord, SearchConfig};
use scheduler::{FetchScheduler, SchedulerConfig};
use transport::HttpTransport;

#[derive(Parser)]
#[command(name = "trawl")]
#[command(about = "Job listing scraper - plan searches, fetch postings, export records")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve locations and show the search units a config expands to
    Plan {
        /// Path to a search config (JSON)
        config: PathBuf,
    },

    /// Execute a config end to end and export the records
    Run {
        /// Path to a search config (JSON)
        config: PathBuf,

        /// Output file (JSON array); stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Concurrent search units
        #[arg(long, default_value = "6")]
        concurrency: usize,

        /// Concurrent detail-page fetches
        #[arg(long, default_value = "12")]
        detail_concurrency: usize,

        /// Per-request timeout in seconds
        #[arg(long, default_value = "20")]
        timeout: u64,

        /// Wall-clock budget per unit, in seconds
        #[arg(long)]
        unit_deadline: Option<u64>,
    },
}

fn init_logging() {
    use std::io::Write;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn load_config(path: &Path) -> Result<SearchConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid search config: {}", path.display()))
}

fn export_records(records: &[JobRecord], output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create {}", parent.display()))?;
                }
            }
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {} record(s) to {}", records.len(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Plan { config } => {
            let cfg = load_config(&config)?;
            let transport = Arc::new(HttpTransport::new(Duration::from_secs(20))?);
            let resolver = LocationResolver::new(transport);
            let outcome = planner::plan(&cfg, &resolver).await;

            if outcome.units.is_empty() {
                println!("No search units could be planned.");
            } else {
                println!(
                    "{:<30} {:<25} {:<12} {:>6} {:<9}",
                    "TITLE", "LOCATION", "GEO ID", "PAGES", "AMBIGUOUS"
                );
                println!("{}", "-".repeat(86));
                for unit in &outcome.units {
                    println!(
                        "{:<30} {:<25} {:<12} {:>6} {:<9}",
                        truncate(&unit.title, 28),
                        truncate(&unit.location.display, 23),
                        unit.location.geo_id,
                        unit.page_cap,
                        if unit.location.ambiguous { "yes" } else { "" }
                    );
                }
                println!("\n{} unit(s) planned.", outcome.units.len());
            }
            for (text, err) in &outcome.unresolved {
                println!("Unresolved location '{}': {}", text, err);
            }
        }

        Commands::Run {
            config,
            output,
            concurrency,
            detail_concurrency,
            timeout,
            unit_deadline,
        } => {
            let cfg = load_config(&config)?;
            let transport = Arc::new(HttpTransport::new(Duration::from_secs(timeout))?);
            let resolver = LocationResolver::new(transport.clone());
            let scheduler = FetchScheduler::with_config(
                transport,
                SchedulerConfig {
                    unit_concurrency: concurrency,
                    detail_concurrency,
                    unit_deadline: unit_deadline.map(Duration::from_secs),
                    ..Default::default()
                },
            );

            // First Ctrl-C stops new work; in-flight fetches drain normally.
            let cancel = scheduler.cancel_flag();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("cancellation requested, letting in-flight work finish");
                    cancel.store(true, Ordering::Relaxed);
                }
            });

            let result = run::execute(&cfg, &resolver, &scheduler).await?;
            export_records(&result.records, output.as_deref())?;

            let summary = &result.summary;
            println!(
                "\n{:<28} {:<22} {:<8} {:>6} {:>6} {:>8}",
                "TITLE", "LOCATION", "STATUS", "PAGES", "JOBS", "DROPPED"
            );
            println!("{}", "-".repeat(84));
            for report in &summary.unit_reports {
                println!(
                    "{:<28} {:<22} {:<8} {:>6} {:>6} {:>8}",
                    truncate(&report.title, 26),
                    truncate(&report.location, 20),
                    format!("{:?}", report.status).to_lowercase(),
                    report.pages_fetched,
                    report.fragments_emitted,
                    report.listings_dropped
                );
                if let Some(err) = &report.error {
                    println!("    {}", err);
                }
            }
            println!(
                "\n{} record(s), {} duplicate(s) skipped, {} malformed dropped.",
                summary.records_emitted, summary.duplicates_skipped, summary.malformed_dropped
            );
            for unresolved in &summary.unresolved_locations {
                println!("Unresolved location: {}", unresolved);
            }
        }
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::truncate;

    #[test]
    fn truncate_cuts_on_char_boundaries() {
        assert_eq!(truncate("Développeur Logiciel Senior", 10), "Dévelop...");
        assert_eq!(truncate("Zürich, Switzerland", 8), "Züric...");
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly ten", 11), "exactly ten");
    }
}
