use crate::config::{HarvestConfig, ProjectSpec};
use crate::harvest::{HarvestError, HarvestStats, Harvester};
use crate::model::HarvestDocument;
use crate::output::{write_document, OutputError};
use crate::traits::IndexFetcher;
use std::path::PathBuf;
use tracing::{info, instrument};

/// Outcome of a completed run.
#[derive(Debug)]
pub struct HarvestReport {
    pub document: HarvestDocument,
    pub stats: HarvestStats,
    pub output_path: PathBuf,
}

/// Runs one harvest-and-write cycle. The output file is only replaced after
/// the whole traversal has succeeded.
pub struct HarvestExecutor<F: IndexFetcher> {
    harvester: Harvester<F>,
    output_path: PathBuf,
}

impl<F: IndexFetcher> HarvestExecutor<F> {
    pub fn new(harvester: Harvester<F>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            harvester,
            output_path: output_path.into(),
        }
    }

    pub fn from_config(fetcher: F, config: &HarvestConfig) -> Self {
        Self::new(
            Harvester::from_config(fetcher, config),
            config.output_path.clone(),
        )
    }

    #[instrument(skip(self, projects), fields(output = %self.output_path.display()))]
    pub async fn execute(&self, projects: &[ProjectSpec]) -> Result<HarvestReport, HarvestError> {
        info!("Starting harvest of {} projects", projects.len());

        let result = self.harvester.harvest(projects).await?;

        let path = self.output_path.clone();
        let document = result.document;
        let document = tokio::task::spawn_blocking(move || {
            write_document(&path, &document).map(|()| document)
        })
        .await
        .map_err(|e| OutputError::Task(e.to_string()))??;

        let stats = result.stats;
        info!(
            fetches = stats.index_fetches,
            versions = stats.full_versions,
            sources = stats.source_files,
            packages = stats.packages,
            checksums = stats.checksum_links,
            duration_ms = stats.total_duration_ms,
            "Finished harvest"
        );

        Ok(HarvestReport {
            document,
            stats,
            output_path: self.output_path.clone(),
        })
    }
}
