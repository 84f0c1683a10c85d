//! `ingest`: pulls the agency directory, title catalog, and per-title version history from
//! the eCFR API and upserts them into the catalog store (spec §4.1/§4.2).

use clap::Parser;
use ecfr_pipeline::client::EcfrClient;
use ecfr_pipeline::config::Config;
use ecfr_pipeline::store::CatalogStore;
use tracing::info;

#[derive(Parser)]
#[command(about = "Fetch agencies, titles, and title versions from the eCFR API")]
struct Args {
    /// Restrict version fetching to these title numbers; defaults to ECFR_INTEREST_TITLES.
    #[arg(long, value_delimiter = ',')]
    titles: Option<Vec<i32>>,
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
    let client = EcfrClient::new(config.ecfr_base_url.clone());

    let agencies = client.fetch_agencies().await?;
    info!(count = agencies.agencies.len(), "fetched agencies");
    store.upsert_agencies(&agencies.agencies).await?;

    let titles = client.fetch_titles().await?;
    info!(count = titles.titles.len(), "fetched titles");
    store.upsert_titles(&titles.titles).await?;

    let title_numbers = args.titles.unwrap_or_else(|| config.interest_titles.clone());
    for title_number in title_numbers {
        let versions = client.fetch_title_versions(title_number).await?;
        info!(
            title_number,
            count = versions.content_versions.len(),
            "fetched title versions"
        );
        store
            .upsert_title_versions(title_number, &versions.content_versions)
            .await?;
    }

    Ok(())
}
