use std::collections::HashSet;

use log::warn;

use crate::error::ScrapeError;
use crate::location::LocationResolver;
use crate::models::{ResolvedLocation, SearchConfig, SearchUnit};

/// Hard ceiling on pagination depth, reflecting the source site's limit.
/// Not configurable upward.
pub const PAGE_CAP_CEILING: u32 = 40;

#[derive(Debug)]
pub struct PlanOutcome {
    pub units: Vec<SearchUnit>,
    /// Location inputs that could not be resolved, with the failure each hit.
    /// These are warnings: their units are dropped, the run continues.
    pub unresolved: Vec<(String, ScrapeError)>,
}

/// Expands a config into the ordered, deduplicated unit list: cartesian
/// product of titles × resolved locations, shared filters, one page cap.
/// Deterministic for a given config and set of resolver responses: titles
/// outer, locations inner, input order preserved.
pub async fn plan(config: &SearchConfig, resolver: &LocationResolver) -> PlanOutcome {
    let page_cap = config
        .max_pages
        .unwrap_or(PAGE_CAP_CEILING)
        .min(PAGE_CAP_CEILING);

    // Each distinct location text is resolved exactly once.
    let mut resolved: Vec<ResolvedLocation> = Vec::new();
    let mut seen_locations = HashSet::new();
    let mut unresolved = Vec::new();
    for text in &config.locations {
        if !seen_locations.insert(text.trim().to_lowercase()) {
            continue;
        }
        match resolver.select(text).await {
            Ok(location) => {
                if location.ambiguous {
                    warn!(
                        "location {:?} resolved ambiguously to {:?} (geo {})",
                        text, location.display, location.geo_id
                    );
                }
                resolved.push(location);
            }
            Err(e) => {
                warn!("dropping location {:?}: {}", text, e);
                unresolved.push((text.clone(), e));
            }
        }
    }

    let mut units = Vec::new();
    let mut seen_units = HashSet::new();
    for title in &config.titles {
        let title = title.trim();
        if title.is_empty() {
            warn!("skipping search with empty title");
            continue;
        }
        for location in &resolved {
            // Filters are shared across the whole config, so the identity of
            // a unit reduces to (title, geoId).
            let key = (title.to_lowercase(), location.geo_id.clone());
            if !seen_units.insert(key) {
                continue;
            }
            units.push(SearchUnit {
                title: title.to_string(),
                location: location.clone(),
                filters: config.filters.clone(),
                page_cap,
                max_items: config.max_items_per_query,
            });
        }
    }

    PlanOutcome { units, unresolved }
}
