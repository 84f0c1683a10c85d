//! `build-path-map`: derives the title/subdivision -> agency maps from the catalogued agency
//! directory and writes them out for operator inspection (spec §4.4). The dispatcher and
//! aggregator binaries rebuild these maps directly from the store at startup rather than
//! reading this artifact back, so it is always in sync with the live catalog.

use std::path::PathBuf;

use clap::Parser;
use ecfr_pipeline::config::Config;
use ecfr_pipeline::path_map::build_path_maps;
use ecfr_pipeline::store::CatalogStore;
use tracing::info;

#[derive(Parser)]
#[command(about = "Build and dump the title/subdivision -> agency path maps")]
struct Args {
    /// Directory the two JSON artifacts are written into.
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,
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
    let config = Config::from_env()?;
    let store = CatalogStore::connect(&config.database_url()).await?;

    let agencies = store.list_agencies().await?;
    let (path_map, agency_map) = build_path_maps(&agencies);

    tokio::fs::create_dir_all(&args.output_dir).await?;
    tokio::fs::write(
        args.output_dir.join("title_path_map.json"),
        serde_json::to_string_pretty(&path_map)?,
    )
    .await?;
    tokio::fs::write(
        args.output_dir.join("title_agency_map.json"),
        serde_json::to_string_pretty(&agency_map)?,
    )
    .await?;

    info!(
        titles = path_map.len(),
        "wrote title path map and title agency map"
    );
    Ok(())
}
