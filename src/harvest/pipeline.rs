//! Tree harvester.
//!
//! This module provides the [`Harvester`] that walks the remote store level
//! by level (project → major version → full version → OS → OS version →
//! package file) with:
//! - Per-level filtering via [`crate::harvest::filter`]
//! - A configurable timeout around every index fetch
//! - Structured logging via `tracing`
//! - Run statistics in [`HarvestStats`]
//!
//! Traversal is strictly sequential: a child listing is fetched only after its
//! parent has been processed, and any failure aborts the whole run.

use indexmap::IndexMap;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{validate_projects, ConfigError, HarvestConfig, ProjectSpec};
use crate::harvest::filter::{
    classify_major, infer_arch, is_checksum_file, is_traversable_dir, MajorVersion,
};
use crate::model::{ArchEntry, FileInfo, HarvestDocument, Index, OsEntry, VersionEntry};
use crate::output::OutputError;
use crate::traits::{IndexError, IndexFetcher};

// ============================================================================
// Result Types
// ============================================================================

/// Complete harvest result with the document and statistics.
#[derive(Debug)]
pub struct HarvestResult {
    pub document: HarvestDocument,
    pub stats: HarvestStats,
}

/// Statistics about a harvest run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HarvestStats {
    /// Number of `index.json` listings fetched
    pub index_fetches: usize,

    /// Number of projects harvested
    pub projects: usize,

    /// Major version directories that passed the minimum-version filter
    pub major_versions: usize,

    /// Full version directories harvested
    pub full_versions: usize,

    /// Source artifacts found directly under full versions
    pub source_files: usize,

    /// Package files emitted as architecture entries
    pub packages: usize,

    /// Packages that received a checksum link
    pub checksum_links: usize,

    /// Wall-clock time of the traversal (milliseconds)
    pub total_duration_ms: u64,
}

// ============================================================================
// Errors
// ============================================================================

/// Errors that abort a harvest run.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),
}

// ============================================================================
// Harvester
// ============================================================================

/// Walks the remote store and assembles a [`HarvestDocument`].
///
/// # Example
///
/// ```ignore
/// let harvester = Harvester::new(HttpIndexFetcher::new(base_url, timeout)?)
///     .with_timeout(Duration::from_secs(30))
///     .with_checksum_suffix(".sha");
///
/// let result = harvester.harvest(&config.projects).await?;
/// println!("{} projects", result.document.len());
/// ```
#[derive(Debug)]
pub struct Harvester<F: IndexFetcher> {
    fetcher: F,

    /// Timeout for each index fetch (default: 30 seconds)
    fetch_timeout: Duration,

    /// Appended to a package name to find its checksum sibling
    checksum_suffix: String,
}

impl<F: IndexFetcher> Harvester<F> {
    /// Creates a harvester with a 30 second fetch timeout and `.sha` checksums.
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            fetch_timeout: Duration::from_secs(30),
            checksum_suffix: ".sha".to_string(),
        }
    }

    /// Creates a harvester using the timeout and checksum suffix of `config`.
    pub fn from_config(fetcher: F, config: &HarvestConfig) -> Self {
        Self::new(fetcher)
            .with_timeout(config.fetch_timeout())
            .with_checksum_suffix(config.checksum_suffix.clone())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_checksum_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.checksum_suffix = suffix.into();
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Harvests every project into one document keyed by designation.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Config`] if the project table is invalid, and
    /// [`HarvestError::Index`] on the first failed fetch. No partial document
    /// is returned.
    pub async fn harvest(&self, projects: &[ProjectSpec]) -> Result<HarvestResult, HarvestError> {
        validate_projects(projects)?;

        let start = Instant::now();
        let mut stats = HarvestStats::default();
        let mut document = HarvestDocument::new();

        for project in projects {
            info!(
                project = %project.designation,
                root = %project.root,
                min_version = project.min_version,
                "Harvesting project"
            );
            let versions = self.harvest_project(project, &mut stats).await?;
            stats.projects += 1;
            document.insert(project.designation.clone(), versions);
        }

        stats.total_duration_ms = start.elapsed().as_millis() as u64;
        Ok(HarvestResult { document, stats })
    }

    async fn fetch(&self, path: &str, stats: &mut HarvestStats) -> Result<Index, IndexError> {
        stats.index_fetches += 1;
        timeout(self.fetch_timeout, self.fetcher.fetch_index(path))
            .await
            .map_err(|_| IndexError::Timeout {
                path: path.to_string(),
                timeout: self.fetch_timeout,
            })?
    }

    async fn harvest_project(
        &self,
        project: &ProjectSpec,
        stats: &mut HarvestStats,
    ) -> Result<IndexMap<String, Vec<OsEntry>>, IndexError> {
        let root = project.root.trim_matches('/');
        let majors = self.fetch(root, stats).await?;
        let mut versions = IndexMap::new();

        for (major, meta) in &majors {
            if !is_traversable_dir(major, meta) {
                continue;
            }
            match classify_major(major, project.min_version) {
                MajorVersion::Included => {}
                MajorVersion::BelowMinimum => {
                    debug!(project = %project.designation, major = %major, "Below minimum version");
                    continue;
                }
                MajorVersion::Unparseable => {
                    warn!(
                        project = %project.designation,
                        major = %major,
                        "Skipping major version directory with non-numeric name"
                    );
                    continue;
                }
            }
            stats.major_versions += 1;

            let major_path = child_path(root, major);
            let full_versions = self.fetch(&major_path, stats).await?;
            for (full, meta) in &full_versions {
                if !is_traversable_dir(full, meta) {
                    continue;
                }
                let entries = self
                    .harvest_version(&child_path(&major_path, full), stats)
                    .await?;
                stats.full_versions += 1;
                versions.insert(full.clone(), entries);
            }
        }

        Ok(versions)
    }

    /// Source files first, then one fully built entry per OS directory.
    async fn harvest_version(
        &self,
        path: &str,
        stats: &mut HarvestStats,
    ) -> Result<Vec<OsEntry>, IndexError> {
        let contents = self.fetch(path, stats).await?;
        let mut entries: Vec<OsEntry> = contents
            .iter()
            .filter(|(_, meta)| meta.is_file())
            .map(|(name, meta)| OsEntry::Source(FileInfo::from_entry(name, meta)))
            .collect();
        stats.source_files += entries.len();

        for (os, meta) in &contents {
            if !is_traversable_dir(os, meta) {
                continue;
            }
            let versions = self.harvest_os(&child_path(path, os), stats).await?;
            entries.push(OsEntry::PerOs {
                name: os.clone(),
                versions,
            });
        }

        Ok(entries)
    }

    async fn harvest_os(
        &self,
        path: &str,
        stats: &mut HarvestStats,
    ) -> Result<Vec<VersionEntry>, IndexError> {
        let releases = self.fetch(path, stats).await?;
        let mut versions = Vec::new();

        for (release, meta) in &releases {
            if !is_traversable_dir(release, meta) {
                continue;
            }
            let architectures = self
                .harvest_packages(&child_path(path, release), stats)
                .await?;
            versions.push(VersionEntry {
                version: release.clone(),
                architectures,
            });
        }

        Ok(versions)
    }

    async fn harvest_packages(
        &self,
        path: &str,
        stats: &mut HarvestStats,
    ) -> Result<Vec<ArchEntry>, IndexError> {
        let listing = self.fetch(path, stats).await?;

        let mut architectures = Vec::new();
        for (name, meta) in listing.iter().filter(|(_, meta)| meta.is_file()) {
            if is_checksum_file(name, &self.checksum_suffix) {
                continue;
            }

            let mut file_info = FileInfo::from_entry(name, meta);
            let sibling = format!("{name}{}", self.checksum_suffix);
            file_info.chksum_href = listing
                .get(&sibling)
                .filter(|m| m.is_file())
                .map(|m| m.static_link.clone());
            if file_info.chksum_href.is_some() {
                stats.checksum_links += 1;
            }

            let arch = infer_arch(name);
            debug!(path = %path, file = %name, arch = %arch, "Package found");
            architectures.push(ArchEntry { arch, file_info });
        }
        stats.packages += architectures.len();

        Ok(architectures)
    }
}

fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Arch;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    // In-memory store keyed by relative path
    #[derive(Default)]
    struct FakeFetcher {
        listings: HashMap<String, Index>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn with(mut self, path: &str, listing: serde_json::Value) -> Self {
            self.listings
                .insert(path.to_string(), serde_json::from_value(listing).unwrap());
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl IndexFetcher for FakeFetcher {
        async fn fetch_index(&self, relative_path: &str) -> Result<Index, IndexError> {
            self.calls.lock().unwrap().push(relative_path.to_string());
            self.listings
                .get(relative_path)
                .cloned()
                .ok_or_else(|| IndexError::Fetch {
                    url: relative_path.to_string(),
                    reason: "404 Not Found".to_string(),
                })
        }
    }

    struct SlowFetcher;

    #[async_trait]
    impl IndexFetcher for SlowFetcher {
        async fn fetch_index(&self, _relative_path: &str) -> Result<Index, IndexError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Index::new())
        }
    }

    fn dir() -> serde_json::Value {
        json!({"type": "dir"})
    }

    fn file(name: &str, size: u64) -> serde_json::Value {
        json!({"type": "file", "staticLink": format!("https://cdn.example/{name}"), "size": size})
    }

    fn file_info(name: &str, size: u64, chksum: Option<&str>) -> FileInfo {
        FileInfo {
            file_name: name.to_string(),
            file_href: format!("https://cdn.example/{name}"),
            file_size: size,
            chksum_href: chksum.map(|c| format!("https://cdn.example/{c}")),
        }
    }

    fn server() -> ProjectSpec {
        ProjectSpec::new("server", "server", 2.0)
    }

    /// One project with a single version carrying a tarball and a debian build.
    fn store() -> FakeFetcher {
        FakeFetcher::default()
            .with(
                "server",
                json!({"2.0": dir(), "CURRENT": dir(), "1.9": dir()}),
            )
            .with("server/2.0", json!({"2.0.1": dir(), "CURRENT": dir()}))
            .with(
                "server/2.0/2.0.1",
                json!({
                    "pkg-2.0.1.tar.gz": file("pkg-2.0.1.tar.gz", 100),
                    "debian": dir(),
                    "CURRENT": dir(),
                }),
            )
            .with("server/2.0/2.0.1/debian", json!({"6": dir(), "CURRENT": dir()}))
            .with(
                "server/2.0/2.0.1/debian/6",
                json!({
                    "pkg_amd64.deb": file("pkg_amd64.deb", 10),
                    "pkg_amd64.deb.sha": file("pkg_amd64.deb.sha", 1),
                    "pkg_i386.deb": file("pkg_i386.deb", 9),
                    "CURRENT": dir(),
                }),
            )
    }

    #[tokio::test]
    async fn test_harvest_builds_full_document() {
        let harvester = Harvester::new(store());
        let result = harvester.harvest(&[server()]).await.unwrap();

        let expected = vec![
            OsEntry::Source(file_info("pkg-2.0.1.tar.gz", 100, None)),
            OsEntry::PerOs {
                name: "debian".to_string(),
                versions: vec![VersionEntry {
                    version: "6".to_string(),
                    architectures: vec![
                        ArchEntry {
                            arch: Arch::Amd64,
                            file_info: file_info("pkg_amd64.deb", 10, Some("pkg_amd64.deb.sha")),
                        },
                        ArchEntry {
                            arch: Arch::I386,
                            file_info: file_info("pkg_i386.deb", 9, None),
                        },
                    ],
                }],
            },
        ];

        assert_eq!(result.document.keys().collect::<Vec<_>>(), vec!["server"]);
        assert_eq!(result.document["server"].len(), 1);
        assert_eq!(result.document["server"]["2.0.1"], expected);
    }

    #[tokio::test]
    async fn test_harvest_skips_current_and_below_minimum_majors() {
        let harvester = Harvester::new(store());
        harvester.harvest(&[server()]).await.unwrap();

        let calls = harvester.fetcher().calls();
        assert!(calls.contains(&"server/2.0".to_string()));
        assert!(!calls.iter().any(|c| c.starts_with("server/1.9")));
        assert!(!calls.iter().any(|c| c.contains("CURRENT")));
    }

    #[tokio::test]
    async fn test_harvest_fetches_children_after_parents() {
        let harvester = Harvester::new(store());
        harvester.harvest(&[server()]).await.unwrap();

        assert_eq!(
            harvester.fetcher().calls(),
            vec![
                "server",
                "server/2.0",
                "server/2.0/2.0.1",
                "server/2.0/2.0.1/debian",
                "server/2.0/2.0.1/debian/6",
            ]
        );
    }

    #[tokio::test]
    async fn test_harvest_excludes_non_numeric_majors() {
        let fetcher = FakeFetcher::default()
            .with("tools", json!({"beta": dir(), "nightly": dir()}));
        let harvester = Harvester::new(fetcher);

        let result = harvester
            .harvest(&[ProjectSpec::new("tools", "tools", 0.0)])
            .await
            .unwrap();

        assert!(result.document["tools"].is_empty());
        assert_eq!(harvester.fetcher().calls(), vec!["tools"]);
    }

    #[tokio::test]
    async fn test_every_tracked_project_is_a_top_level_key() {
        let fetcher = store().with("client", json!({"1.0": dir()}));
        let harvester = Harvester::new(fetcher);

        let result = harvester
            .harvest(&[server(), ProjectSpec::new("client", "client", 2.0)])
            .await
            .unwrap();

        assert_eq!(
            result.document.keys().collect::<Vec<_>>(),
            vec!["server", "client"]
        );
        assert!(result.document["client"].is_empty());
    }

    #[tokio::test]
    async fn test_harvest_keeps_upstream_listing_order() {
        let fetcher = FakeFetcher::default()
            .with("server", json!({"2.1": dir(), "2.0": dir()}))
            .with("server/2.1", json!({"2.1.10": dir(), "2.1.9": dir()}))
            .with("server/2.1/2.1.10", json!({}))
            .with("server/2.1/2.1.9", json!({}))
            .with("server/2.0", json!({"2.0.1": dir()}))
            .with(
                "server/2.0/2.0.1",
                json!({"ubuntu": dir(), "debian": dir()}),
            )
            .with("server/2.0/2.0.1/ubuntu", json!({}))
            .with("server/2.0/2.0.1/debian", json!({"9": dir(), "10": dir()}))
            .with("server/2.0/2.0.1/debian/9", json!({}))
            .with(
                "server/2.0/2.0.1/debian/10",
                json!({
                    "pkg_i386.deb": file("pkg_i386.deb", 9),
                    "pkg_amd64.deb": file("pkg_amd64.deb", 10),
                }),
            );

        let result = Harvester::new(fetcher).harvest(&[server()]).await.unwrap();

        let versions = &result.document["server"];
        assert_eq!(
            versions.keys().collect::<Vec<_>>(),
            vec!["2.1.10", "2.1.9", "2.0.1"]
        );
        let entries = &versions["2.0.1"];
        assert_eq!(
            entries.iter().map(OsEntry::os).collect::<Vec<_>>(),
            vec!["ubuntu", "debian"]
        );
        let OsEntry::PerOs { versions: releases, .. } = &entries[1] else {
            panic!("expected an OS entry");
        };
        assert_eq!(
            releases.iter().map(|r| r.version.as_str()).collect::<Vec<_>>(),
            vec!["9", "10"]
        );
        assert_eq!(
            releases[1]
                .architectures
                .iter()
                .map(|a| a.file_info.file_name.as_str())
                .collect::<Vec<_>>(),
            vec!["pkg_i386.deb", "pkg_amd64.deb"]
        );
    }

    #[tokio::test]
    async fn test_each_source_file_gets_its_own_entry() {
        let fetcher = FakeFetcher::default()
            .with("server", json!({"2.1": dir()}))
            .with("server/2.1", json!({"2.1.3": dir()}))
            .with(
                "server/2.1/2.1.3",
                json!({
                    "pkg-2.1.3.tar.gz": file("pkg-2.1.3.tar.gz", 5),
                    "pkg-2.1.3.zip": file("pkg-2.1.3.zip", 6),
                    "debian": dir(),
                }),
            )
            .with("server/2.1/2.1.3/debian", json!({}));

        let result = Harvester::new(fetcher).harvest(&[server()]).await.unwrap();

        let entries = &result.document["server"]["2.1.3"];
        assert_eq!(
            entries.iter().map(OsEntry::os).collect::<Vec<_>>(),
            vec!["source", "source", "debian"]
        );
        assert_eq!(
            entries[2],
            OsEntry::PerOs {
                name: "debian".to_string(),
                versions: vec![],
            }
        );
    }

    #[tokio::test]
    async fn test_checksum_files_never_become_packages() {
        let fetcher = FakeFetcher::default()
            .with("server", json!({"2.1": dir()}))
            .with("server/2.1", json!({"2.1.3": dir()}))
            .with("server/2.1/2.1.3", json!({"centos": dir()}))
            .with("server/2.1/2.1.3/centos", json!({"7": dir()}))
            .with(
                "server/2.1/2.1.3/centos/7",
                json!({
                    "pkg.x86_64.rpm": file("pkg.x86_64.rpm", 3),
                    "pkg.src.rpm": file("pkg.src.rpm", 4),
                    "pkg.src.rpm.sha": file("pkg.src.rpm.sha", 1),
                    "orphan.sha": file("orphan.sha", 1),
                    "repodata": dir(),
                }),
            );

        let result = Harvester::new(fetcher).harvest(&[server()]).await.unwrap();

        let OsEntry::PerOs { versions, .. } = &result.document["server"]["2.1.3"][0] else {
            panic!("expected an OS entry");
        };
        let arches = &versions[0].architectures;
        assert_eq!(
            arches
                .iter()
                .map(|a| a.file_info.file_name.as_str())
                .collect::<Vec<_>>(),
            vec!["pkg.x86_64.rpm", "pkg.src.rpm"]
        );
        assert_eq!(arches[0].arch, Arch::X86_64);
        assert_eq!(arches[0].file_info.chksum_href, None);
        assert_eq!(arches[1].arch, Arch::Source);
        assert_eq!(
            arches[1].file_info.chksum_href.as_deref(),
            Some("https://cdn.example/pkg.src.rpm.sha")
        );
        assert_eq!(result.stats.packages, 2);
        assert_eq!(result.stats.checksum_links, 1);
    }

    #[tokio::test]
    async fn test_custom_checksum_suffix() {
        let fetcher = FakeFetcher::default()
            .with("server", json!({"2.1": dir()}))
            .with("server/2.1", json!({"2.1.3": dir()}))
            .with("server/2.1/2.1.3", json!({"freebsd": dir()}))
            .with("server/2.1/2.1.3/freebsd", json!({"12": dir()}))
            .with(
                "server/2.1/2.1.3/freebsd/12",
                json!({
                    "pkg-2.1.3.txz": file("pkg-2.1.3.txz", 8),
                    "pkg-2.1.3.txz.md5": file("pkg-2.1.3.txz.md5", 1),
                }),
            );

        let result = Harvester::new(fetcher)
            .with_checksum_suffix(".md5")
            .harvest(&[server()])
            .await
            .unwrap();

        let OsEntry::PerOs { versions, .. } = &result.document["server"]["2.1.3"][0] else {
            panic!("expected an OS entry");
        };
        assert_eq!(
            versions[0].architectures,
            vec![ArchEntry {
                arch: Arch::Txz,
                file_info: file_info("pkg-2.1.3.txz", 8, Some("pkg-2.1.3.txz.md5")),
            }]
        );
    }

    #[tokio::test]
    async fn test_missing_listing_aborts_run() {
        let fetcher = FakeFetcher::default()
            .with("server", json!({"2.1": dir()}))
            .with("server/2.1", json!({"2.1.3": dir()}));

        let err = Harvester::new(fetcher)
            .harvest(&[server()])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            HarvestError::Index(IndexError::Fetch { ref url, .. }) if url == "server/2.1/2.1.3"
        ));
    }

    #[tokio::test]
    async fn test_invalid_minimum_is_rejected_before_fetching() {
        let harvester = Harvester::new(store());
        let err = harvester
            .harvest(&[ProjectSpec::new("server", "server", f64::NAN)])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            HarvestError::Config(ConfigError::IncomparableMinimum { .. })
        ));
        assert!(harvester.fetcher().calls().is_empty());
    }

    #[tokio::test]
    async fn test_slow_fetch_times_out() {
        let harvester = Harvester::new(SlowFetcher).with_timeout(Duration::from_millis(20));
        let err = harvester.harvest(&[server()]).await.unwrap_err();

        assert!(matches!(
            err,
            HarvestError::Index(IndexError::Timeout { ref path, .. }) if path == "server"
        ));
        assert_eq!(
            err.to_string(),
            "Index error: Fetching index for 'server' timed out after 20ms"
        );
    }

    #[tokio::test]
    async fn test_harvest_is_repeatable() {
        let harvester = Harvester::new(store());
        let first = harvester.harvest(&[server()]).await.unwrap();
        let second = harvester.harvest(&[server()]).await.unwrap();

        assert_eq!(first.document, second.document);
    }

    #[tokio::test]
    async fn test_harvest_stats() {
        let result = Harvester::new(store()).harvest(&[server()]).await.unwrap();

        let stats = result.stats;
        assert_eq!(stats.index_fetches, 5);
        assert_eq!(stats.projects, 1);
        assert_eq!(stats.major_versions, 1);
        assert_eq!(stats.full_versions, 1);
        assert_eq!(stats.source_files, 1);
        assert_eq!(stats.packages, 2);
        assert_eq!(stats.checksum_links, 1);
    }

    #[test]
    fn test_child_path() {
        assert_eq!(child_path("server/2.1", "2.1.3"), "server/2.1/2.1.3");
        assert_eq!(child_path("", "server"), "server");
    }
}
