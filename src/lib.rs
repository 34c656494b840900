//! Conformance harness for a glTF renderer.
//!
//! Loads the corpus manifest, runs the renderer once per (model, variant) under a timeout,
//! stores each case's artifacts in its own result directory, and writes a static HTML report that
//! lines up reference and captured screenshots with the curated known-issue registry.
//!
//! ```rust,ignore
//! use gltf_conformance::{KnownIssueRegistry, Manifest, ResultStore, TestRunner};
//!
//! let manifest = Manifest::load("Models/model-index.json".as_ref())?;
//! let store = ResultStore::new("build/test_gltf_results");
//! let summary = TestRunner::new(&renderer_config, &store).run_all(&manifest, &selection, 1)?;
//! ```

pub mod config;
pub mod error;
pub mod known_issues;
pub mod manifest;
pub mod process;
pub mod provenance;
pub mod report;
pub mod result_store;
pub mod runner;
pub mod transcode;

pub use config::{CaseSelection, HarnessConfig, RendererConfig};
pub use error::{Error, Result};
pub use known_issues::{Classification, DefectRef, KnownIssueRegistry};
pub use manifest::{Manifest, TestCase, TestIdentity, TestManifestEntry};
pub use report::{Report, ReportInputs, ReportMetadata, ReportRow};
pub use result_store::{CaseOutcome, CaseStatus, ResultRecord, ResultStore};
pub use runner::{RunSummary, TestRunner};
pub use transcode::{ArtifactTranscoder, CommandTranscoder, ImageTranscoder};

use std::path::Path;

/// Outcome of a full `run`: execution followed by report generation.
#[derive(Debug)]
pub struct HarnessOutcome {
  pub summary: RunSummary,
  pub report: Report,
  pub html: std::path::PathBuf,
}

impl HarnessOutcome {
  /// Process exit code: 0 when every executed case passed, 1 otherwise.
  pub fn exit_code(&self) -> i32 {
    if self.summary.has_failures() {
      1
    } else {
      0
    }
  }
}

/// Load inputs, execute the selected cases, then write the report.
///
/// The manifest and registry are loaded before anything runs, so malformed inputs abort before a
/// single result directory is created. Report generation starts only after every case finished.
pub fn run_harness(
  config: &HarnessConfig,
  transcoder: &dyn ArtifactTranscoder,
  repo_dir: &Path,
) -> Result<HarnessOutcome> {
  config.validate()?;
  let manifest = Manifest::load(&config.manifest_path)?;
  let registry = match &config.registry_path {
    Some(path) => KnownIssueRegistry::load(path)?,
    None => KnownIssueRegistry::empty(),
  };

  let store = ResultStore::new(&config.results_dir);
  let summary =
    TestRunner::new(&config.renderer, &store).run_all(&manifest, &config.selection, config.jobs)?;

  let inputs = ReportInputs {
    manifest: &manifest,
    store: &store,
    registry: &registry,
    models_dir: &config.models_dir,
    transcoder,
    issue_url_base: &config.issue_url_base,
  };
  let (report, written) = report::generate(&inputs, ReportMetadata::collect(repo_dir))?;
  Ok(HarnessOutcome {
    summary,
    report,
    html: written.html,
  })
}
