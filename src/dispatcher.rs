//! Job Dispatcher (C7): a pool of workers draining `version_processing_jobs`.
//!
//! Grounded on `original_source/data_parser/job_processor.py`'s `JobProcessor.run` loop
//! (claim a batch, process sequentially, sleep between jobs, longer sleep on an empty
//! batch, fresh DB session per status update so one bad job can't poison the rest) and the
//! teacher's `tokio::spawn`-per-worker idiom in `rust_rewrite/src/main.rs`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::client::EcfrClient;
use crate::config::Config;
use crate::extractor;
use crate::models::{Job, JobStatus, TitlePathMap, WordCountRecord};
use crate::normalizer::{self, SurfaceForms, TransformationStore};
use crate::store::CatalogStore;

/// Gap between two jobs claimed by the same worker, so a single worker doesn't monopolize
/// the upstream API (spec §5).
const INTER_JOB_SLEEP: Duration = Duration::from_millis(250);

/// Sleep applied when a worker's claim comes back empty, before it polls again.
const EMPTY_POLL_SLEEP: Duration = Duration::from_secs(2);

/// How often the lock-TTL sweeper looks for stale PROCESSING jobs, expressed as a fraction
/// of the configured TTL so the sweep cadence scales with it.
const SWEEP_INTERVAL_FRACTION: u32 = 4;

/// Runs the dispatcher to completion: spawns `config.worker_count` worker tasks plus one
/// lock-TTL sweeper, and returns once every worker has observed two consecutive empty
/// claims (i.e. the queue appears drained). Intended for the `process` binary; a long-running
/// daemon would instead just `.await` the sweeper handle forever.
pub async fn run_to_drain(
    config: Arc<Config>,
    store: Arc<CatalogStore>,
    client: Arc<EcfrClient>,
    transforms: Arc<TransformationStore>,
    path_map: Arc<TitlePathMap>,
) -> Result<(), crate::error::PipelineError> {
    let sweeper = tokio::spawn(sweep_loop(config.clone(), store.clone()));

    let mut handles = Vec::with_capacity(config.worker_count);
    for worker_id in 0..config.worker_count {
        handles.push(tokio::spawn(worker_loop(
            worker_id,
            config.clone(),
            store.clone(),
            client.clone(),
            transforms.clone(),
            path_map.clone(),
        )));
    }

    for handle in handles {
        handle.await.expect("worker task panicked")?;
    }
    sweeper.abort();
    Ok(())
}

async fn sweep_loop(config: Arc<Config>, store: Arc<CatalogStore>) {
    let interval = config.lock_ttl / SWEEP_INTERVAL_FRACTION.max(1);
    loop {
        tokio::time::sleep(interval).await;
        match store
            .reclaim_expired_locks(config.lock_ttl.as_secs() as i64)
            .await
        {
            Ok(0) => {}
            Ok(n) => info!(reclaimed = n, "reclaimed expired job locks"),
            Err(e) => error!(error = %e, "lock sweep failed"),
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    config: Arc<Config>,
    store: Arc<CatalogStore>,
    client: Arc<EcfrClient>,
    transforms: Arc<TransformationStore>,
    path_map: Arc<TitlePathMap>,
) -> Result<(), crate::error::PipelineError> {
    let lock_id = Uuid::new_v4();
    let mut consecutive_empty = 0;

    loop {
        let jobs = store.claim_pending_jobs(config.batch_size, lock_id).await?;
        if jobs.is_empty() {
            consecutive_empty += 1;
            if consecutive_empty >= 2 {
                return Ok(());
            }
            tokio::time::sleep(EMPTY_POLL_SLEEP).await;
            continue;
        }
        consecutive_empty = 0;

        for job in jobs {
            process_job(worker_id, &store, &client, &transforms, &path_map, &job).await;
            tokio::time::sleep(INTER_JOB_SLEEP).await;
        }
    }
}

/// Processes one claimed job to completion, always leaving it COMPLETED or FAILED (spec §4.7
/// "a job never stays PROCESSING after a worker touches it"). Errors are caught here rather
/// than propagated, so one bad job can't take the worker down.
async fn process_job(
    worker_id: usize,
    store: &CatalogStore,
    client: &EcfrClient,
    transforms: &TransformationStore,
    path_map: &TitlePathMap,
    job: &Job,
) {
    match run_job(client, transforms, path_map, job).await {
        Ok(rows) => {
            if let Err(e) = store.replace_word_counts(job.id, &rows).await {
                warn!(worker_id, job_id = job.id, error = %e, "failed to persist word counts");
                let _ = store
                    .update_job_status(job.id, JobStatus::Failed, Some(&e.to_string()))
                    .await;
                return;
            }
            if let Err(e) = store
                .update_job_status(job.id, JobStatus::Completed, None)
                .await
            {
                error!(worker_id, job_id = job.id, error = %e, "failed to mark job completed");
            }
        }
        Err(e) => {
            warn!(worker_id, job_id = job.id, error = %e, "job failed");
            let _ = store
                .update_job_status(job.id, JobStatus::Failed, Some(&e.to_string()))
                .await;
        }
    }
}

/// Fetches, extracts, and normalizes one title version. A title absent from the path map
/// (no agency references any subdivision of it) yields an empty row set, not a failure
/// (spec §4.4/§4.5: nothing to extract is a legitimate outcome). Extraction and
/// normalization are CPU-bound, so both run on the blocking pool via `spawn_blocking`,
/// leaving the worker's async task free to service other jobs' network I/O.
async fn run_job(
    client: &EcfrClient,
    transforms: &TransformationStore,
    path_map: &TitlePathMap,
    job: &Job,
) -> Result<Vec<WordCountRecord>, crate::error::PipelineError> {
    let Some(selector) = path_map.get(&job.title_number).cloned() else {
        return Ok(Vec::new());
    };

    let xml = client
        .fetch_full_title(job.title_number, job.version_date)
        .await?;

    let task_id = job.id;
    let title_number = job.title_number;
    let version_date = job.version_date;
    let (rows, local_transforms) = tokio::task::spawn_blocking(move || {
        build_rows(&xml, &selector, task_id, title_number, version_date)
    })
    .await
    .expect("extraction/normalization task panicked")?;

    if !local_transforms.is_empty() {
        transforms.merge(local_transforms).await?;
    }

    Ok(rows)
}

type RowsAndTransforms = (Vec<WordCountRecord>, HashMap<String, SurfaceForms>);

fn build_rows(
    xml: &str,
    selector: &HashMap<String, std::collections::HashSet<String>>,
    task_id: i64,
    title_number: i32,
    version_date: chrono::NaiveDate,
) -> Result<RowsAndTransforms, crate::error::PipelineError> {
    let extracted = extractor::extract_subdivisions(xml, selector)?;

    let mut rows = Vec::new();
    let mut local_transforms: HashMap<String, SurfaceForms> = HashMap::new();
    for (subdivision_type, by_code) in extracted {
        for (code, text) in by_code {
            let counts = normalizer::normalize_and_count(&text, &mut local_transforms);
            if counts.is_empty() {
                continue;
            }
            rows.push(WordCountRecord {
                task_id,
                title_number,
                version_date,
                r#type: subdivision_type.clone(),
                code,
                word_statistics: counts,
            });
        }
    }

    Ok((rows, local_transforms))
}
