//! Module sources.
//!
//! Remote modules are declared by the build plan and fetched by an
//! external collaborator implementing [`ModuleFetcher`].

pub mod source;

pub use source::{FetchRequest, ModuleFetcher};

use std::collections::HashSet;

use anyhow::{Context, Result};

use crate::builder::plan::BuildPlanRecord;

/// Distinct fetch requests across `records`, in first-seen order.
pub fn collect_fetch_requests(records: &[BuildPlanRecord]) -> Vec<FetchRequest> {
    let mut seen = HashSet::new();
    records
        .iter()
        .flat_map(|record| record.fetch_requests())
        .filter(|request| seen.insert(request.clone()))
        .collect()
}

/// Hand every distinct remote module in `records` to `fetcher`.
///
/// Stops at the first failure.
pub fn fetch_all(records: &[BuildPlanRecord], fetcher: &mut dyn ModuleFetcher) -> Result<()> {
    let requests = collect_fetch_requests(records);
    tracing::info!(
        "fetching {} remote module(s) with {}",
        requests.len(),
        fetcher.name()
    );

    for request in &requests {
        fetcher.fetch(request).with_context(|| {
            format!(
                "failed to fetch module `{}` from {} ({})",
                request.name, request.locator, request.reference
            )
        })?;
    }

    Ok(())
}
