//! Sweep Engine - Orchestrates a full retire/revive pass
//!
//! A sweep scans the active sources directory, retires every declaration file
//! holding a bad mirror, then rescans the retired directory and brings back
//! every file whose mirror answers again. Retiring and reviving later is the
//! retry mechanism; a single pass never re-probes.

use crate::classifier::{Classification, Classifier};
use crate::declaration::{list_declaration_files, parse_declarations, RepoDeclaration};
use crate::quarantine::Quarantine;
use crate::Config;
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Results from a complete sweep
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Declarations found in the active directory
    pub scanned: usize,
    /// Bad declarations from the active directory
    pub failed: Vec<Classification>,
    /// Files moved (or, in a dry run, to be moved) into the retired directory
    pub retired_files: Vec<String>,
    /// Declarations found in the retired directory
    pub rescanned: usize,
    /// Good declarations from the retired directory
    pub revived: Vec<Classification>,
    /// Files moved (or, in a dry run, to be moved) back into the active directory
    pub revived_files: Vec<String>,
    /// Files that could not be moved, with the reason
    pub skipped_files: Vec<(String, String)>,
    /// Whether the retired directory had to be created
    pub created_retired_dir: bool,
    pub dry_run: bool,
    pub duration: Duration,
}

/// The engine that sequences scanning, classification and file moves
#[derive(Clone)]
pub struct SweepEngine {
    config: Arc<Config>,
    classifier: Classifier,
    quarantine: Quarantine,
}

impl SweepEngine {
    pub fn new(config: Config, classifier: Classifier) -> Self {
        let quarantine = Quarantine::new(config.sources_directory(), config.retired_directory());

        Self {
            config: Arc::new(config),
            classifier,
            quarantine,
        }
    }

    /// Build an engine with real network probes
    pub fn from_config(config: Config) -> Result<Self> {
        let classifier =
            Classifier::from_config(&config).context("Failed to create classifier")?;
        Ok(Self::new(config, classifier))
    }

    /// Run a complete sweep. With `dry_run` nothing is created or moved.
    pub async fn run(&self, dry_run: bool) -> Result<SweepReport> {
        let start_time = Instant::now();
        let mut report = SweepReport {
            dry_run,
            ..Default::default()
        };

        if !dry_run {
            report.created_retired_dir = self.quarantine.ensure_retired_dir()?;
        }

        self.retire_failures(&mut report).await?;
        self.revive_recovered(&mut report).await?;

        report.duration = start_time.elapsed();

        info!(
            "Sweep completed in {:.2}s: {} scanned, {} retired, {} rescanned, {} revived",
            report.duration.as_secs_f64(),
            report.scanned,
            report.retired_files.len(),
            report.rescanned,
            report.revived_files.len()
        );

        Ok(report)
    }

    /// Classify the active directory and retire files with a bad declaration
    async fn retire_failures(&self, report: &mut SweepReport) -> Result<()> {
        let active_dir = self.quarantine.active_dir();

        let files = list_declaration_files(active_dir, &self.config.exclusions)?;
        let declarations = parse_declarations(active_dir, &files)?;

        if declarations.is_empty() {
            bail!("Unable to find our repos! Something is wrong.");
        }

        report.scanned = declarations.len();
        info!("Scanning {} repositories", declarations.len());

        let results = self.classify(&declarations).await;
        report.failed = results.into_iter().filter(|c| !c.is_good()).collect();

        let candidates = unique_files(&report.failed);
        if report.dry_run {
            report.retired_files = candidates;
            return Ok(());
        }

        for filename in candidates {
            match self.quarantine.quarantine(&filename) {
                Ok(()) => report.retired_files.push(filename),
                Err(e) => {
                    warn!("Leaving {} in place: {:#}", filename, e);
                    report.skipped_files.push((filename, format!("{:#}", e)));
                }
            }
        }

        Ok(())
    }

    /// Classify the retired directory and revive files with a good declaration
    async fn revive_recovered(&self, report: &mut SweepReport) -> Result<()> {
        let retired_dir = self.quarantine.retired_dir();

        if !retired_dir.is_dir() {
            debug!("No retired directory at {}", retired_dir.display());
            return Ok(());
        }

        // Files retired moments ago are not re-checked in the same pass
        let exclusions: Vec<String> = self
            .config
            .exclusions
            .iter()
            .chain(report.retired_files.iter())
            .cloned()
            .collect();

        let files = list_declaration_files(retired_dir, &exclusions)?;
        let declarations = parse_declarations(retired_dir, &files)?;

        report.rescanned = declarations.len();
        if declarations.is_empty() {
            info!("No retired repositories to validate");
            return Ok(());
        }

        info!("Scanning {} retired repositories", declarations.len());

        let results = self.classify(&declarations).await;
        report.revived = results.into_iter().filter(|c| c.is_good()).collect();

        let candidates = unique_files(&report.revived);
        if report.dry_run {
            report.revived_files = candidates;
            return Ok(());
        }

        for filename in candidates {
            match self.quarantine.restore(&filename) {
                Ok(()) => report.revived_files.push(filename),
                Err(e) => {
                    warn!("Leaving {} retired: {:#}", filename, e);
                    report.skipped_files.push((filename, format!("{:#}", e)));
                }
            }
        }

        Ok(())
    }

    async fn classify(&self, declarations: &[RepoDeclaration]) -> Vec<Classification> {
        self.classifier
            .classify_all(declarations, self.config.max_parallel())
            .await
    }
}

/// Source files of `results`, each once, in first-seen order
fn unique_files(results: &[Classification]) -> Vec<String> {
    let mut files: Vec<String> = Vec::new();
    for result in results {
        let name = &result.declaration.source_filename;
        if !files.contains(name) {
            files.push(name.clone());
        }
    }
    files
}
