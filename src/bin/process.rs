//! `process`: runs the worker pool that drains `version_processing_jobs` — fetch, extract,
//! normalize, persist — until the queue is empty (spec §4.5–§4.7).

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use ecfr_pipeline::client::EcfrClient;
use ecfr_pipeline::config::Config;
use ecfr_pipeline::dispatcher;
use ecfr_pipeline::normalizer::TransformationStore;
use ecfr_pipeline::path_map::build_path_maps;
use ecfr_pipeline::store::CatalogStore;
use tracing::info;

#[derive(Parser)]
#[command(about = "Run the job dispatcher until the processing queue is drained")]
struct Args {
    /// Where the word transformation map is persisted across runs.
    #[arg(long, default_value = "word_transformation_map.json")]
    transformation_map_path: PathBuf,

    /// Overrides ECFR_WORKER_COUNT for this run.
    #[arg(long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("tracing subscriber already set");
    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(workers) = args.workers {
        config.worker_count = workers;
    }
    let config = Arc::new(config);
    let store = Arc::new(CatalogStore::connect(&config.database_url()).await?);
    let client = Arc::new(EcfrClient::new(config.ecfr_base_url.clone()));
    let transforms = Arc::new(TransformationStore::load(&args.transformation_map_path).await?);

    let agencies = store.list_agencies().await?;
    let (path_map, _) = build_path_maps(&agencies);
    let path_map = Arc::new(path_map);

    info!(workers = config.worker_count, "starting job dispatcher");
    dispatcher::run_to_drain(config, store, client, transforms, path_map).await?;
    info!("job dispatcher drained the queue");
    Ok(())
}
