//! Job Planner (C3): turns the catalog of titles the operator cares about into pending rows
//! in `version_processing_jobs`.
//!
//! Grounded on `original_source/data_parser/job_queue.py`'s `populate_jobs` (walk titles of
//! interest, list their versions, insert one job per version, skip duplicates).

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::error::PipelineResult;
use crate::store::CatalogStore;

/// Creates a PENDING job for every `(title, version_date)` pair among `config.interest_titles`
/// that doesn't already have one. Safe to run repeatedly — the unique index on
/// `(title_number, version_date)` makes this idempotent (spec §4.2, §9).
pub async fn plan_jobs(config: &Config, store: Arc<CatalogStore>) -> PipelineResult<usize> {
    let mut planned = 0;

    for &title_number in &config.interest_titles {
        let versions = store.list_versions_for_title(title_number).await?;
        if versions.is_empty() {
            info!(title_number, "no catalogued versions for title of interest");
            continue;
        }

        let version_dates: Vec<_> = versions.iter().map(|v| v.version_date).collect();
        store
            .create_pending_jobs_for_title(title_number, &version_dates)
            .await?;
        planned += version_dates.len();
        info!(
            title_number,
            version_count = versions.len(),
            "planned jobs for title"
        );
    }

    Ok(planned)
}
