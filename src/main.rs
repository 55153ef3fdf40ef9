use release_index_harvester::{HarvestConfig, HarvestError, HarvestExecutor, HttpIndexFetcher};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; RUST_LOG overrides the default level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Harvest failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), HarvestError> {
    let config = HarvestConfig::load()?;
    let fetcher = HttpIndexFetcher::new(config.base_url.clone(), config.fetch_timeout())?;
    let executor = HarvestExecutor::from_config(fetcher, &config);

    let report = executor.execute(&config.projects).await?;
    tracing::info!(
        path = %report.output_path.display(),
        projects = report.document.len(),
        "Wrote package document"
    );
    Ok(())
}
