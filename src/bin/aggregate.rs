//! `aggregate`: rolls persisted word counts up into the year/agency JSON artifacts (spec
//! §4.8).

use std::path::PathBuf;

use clap::Parser;
use ecfr_pipeline::aggregator;
use ecfr_pipeline::config::Config;
use ecfr_pipeline::normalizer::TransformationStore;
use ecfr_pipeline::path_map::build_path_maps;
use ecfr_pipeline::store::CatalogStore;
use tracing::info;

#[derive(Parser)]
#[command(about = "Aggregate word counts into year/agency rollups")]
struct Args {
    #[arg(long, default_value = "word_transformation_map.json")]
    transformation_map_path: PathBuf,

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
    let transforms = TransformationStore::load(&args.transformation_map_path).await?;

    let agencies = store.list_agencies().await?;
    let (_, agency_map) = build_path_maps(&agencies);

    tokio::fs::create_dir_all(&args.output_dir).await?;
    aggregator::run(&store, &transforms, &agency_map, &args.output_dir).await?;

    info!(output_dir = %args.output_dir.display(), "aggregation complete");
    Ok(())
}
