//! `plan`: populates `version_processing_jobs` with one PENDING row per catalogued version
//! of every title of interest (spec §4.2). Safe to re-run.

use std::sync::Arc;

use clap::Parser;
use ecfr_pipeline::config::Config;
use ecfr_pipeline::planner;
use ecfr_pipeline::store::CatalogStore;
use tracing::info;

#[derive(Parser)]
#[command(about = "Plan processing jobs for every title of interest")]
struct Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("tracing subscriber already set");
    Args::parse();
    let config = Config::from_env()?;
    let store = Arc::new(CatalogStore::connect(&config.database_url()).await?);

    let planned = planner::plan_jobs(&config, store).await?;
    info!(planned, "job planning complete");
    Ok(())
}
