use std::collections::HashSet;

use anyhow::{Context, bail};
use log::{info, warn};
use serde::Serialize;
use tokio_stream::StreamExt;

use crate::extract::extract;
use crate::location::LocationResolver;
use crate::models::{JobRecord, SearchConfig};
use crate::planner::plan;
use crate::scheduler::{FetchScheduler, UnitReport};

/// Run-level accounting across every unit.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub units_planned: usize,
    pub unit_reports: Vec<UnitReport>,
    /// Location inputs dropped at planning time, with the reason.
    pub unresolved_locations: Vec<String>,
    pub records_emitted: usize,
    /// Fragments whose id had already been emitted by another unit.
    pub duplicates_skipped: usize,
    /// Fragments that failed required-field validation.
    pub malformed_dropped: usize,
}

#[derive(Debug)]
pub struct RunOutput {
    pub records: Vec<JobRecord>,
    pub summary: RunSummary,
}

/// Executes a full scraping run: plan the units, fetch them, parse fragments
/// as they arrive. Unit failures and bad listings degrade the summary, not
/// the run; only a plan with zero workable units is a hard error.
pub async fn execute(
    config: &SearchConfig,
    resolver: &LocationResolver,
    scheduler: &FetchScheduler,
) -> anyhow::Result<RunOutput> {
    let outcome = plan(config, resolver).await;
    let unresolved_locations: Vec<String> = outcome
        .unresolved
        .iter()
        .map(|(text, err)| format!("{text}: {err}"))
        .collect();
    if outcome.units.is_empty() {
        bail!(
            "nothing to search: no unit could be planned ({})",
            if unresolved_locations.is_empty() {
                "no titles or locations given".to_string()
            } else {
                unresolved_locations.join("; ")
            }
        );
    }
    let units_planned = outcome.units.len();
    info!("planned {units_planned} search units");

    let (mut stream, reports) = scheduler.stream(outcome.units);

    // Cross-unit dedup: overlapping searches surface the same listing, and
    // the first occurrence wins.
    let mut seen: HashSet<String> = HashSet::new();
    let mut records = Vec::new();
    let mut duplicates_skipped = 0;
    let mut malformed_dropped = 0;
    while let Some(fragment) = stream.next().await {
        match extract(&fragment) {
            Ok(record) => {
                if seen.insert(record.id.clone()) {
                    records.push(record);
                } else {
                    duplicates_skipped += 1;
                }
            }
            Err(e) => {
                warn!("dropping fragment: {e}");
                malformed_dropped += 1;
            }
        }
    }

    let unit_reports = reports.await.context("scheduler task failed")?;
    let summary = RunSummary {
        units_planned,
        unit_reports,
        unresolved_locations,
        records_emitted: records.len(),
        duplicates_skipped,
        malformed_dropped,
    };
    info!(
        "run finished: {} records, {} duplicates skipped, {} malformed dropped",
        summary.records_emitted, summary.duplicates_skipped, summary.malformed_dropped
    );
    Ok(RunOutput { records, summary })
}
