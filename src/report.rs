//! Report generation.
//!
//! Generation runs in two steps so aggregation can be tested without HTML:
//! 1. [`collect_rows`] walks the manifest in order, prepares display artifacts inside each result
//!    directory and returns one [`ReportRow`] per case that has a result directory;
//! 2. [`html::render_html`] turns the rows and [`ReportMetadata`] into the document.
//!
//! Cases without a result directory are skipped: they produce no row and are only counted in the
//! header totals. Everything else that can go wrong for a single row (missing reference image,
//! missing or undecodable screenshot) is shown in that row.

pub mod html;

use crate::error::{ReportAssetMissing, ReportError};
use crate::known_issues::{Classification, KnownIssueRegistry};
use crate::manifest::{Manifest, TestCase};
use crate::result_store::{
  CaseOutcome, ResultStore, DISPLAY_SCREENSHOT_FILE, EXPECTED_STEM, RENDERER_LOG_FILE,
  SCREENSHOT_FILE, STDERR_FILE, STDOUT_FILE,
};
use crate::transcode::ArtifactTranscoder;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const HTML_FILE: &str = "index.html";
pub const JSON_FILE: &str = "report.json";

/// Header information; the only part of a report that changes between identical regenerations
/// is `generated_at` and `host`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportMetadata {
  pub generated_at: String,
  pub revision: Option<String>,
  pub host: String,
}

impl ReportMetadata {
  /// Metadata for "now" on this machine, with the revision of `repo_dir`.
  pub fn collect(repo_dir: &Path) -> Self {
    Self {
      generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S %z").to_string(),
      revision: crate::provenance::revision_stamp(repo_dir),
      host: crate::provenance::host_identity(),
    }
  }
}

/// An image column of a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ImageCell {
  /// Relative link from the report document.
  Available { src: String },
  Missing { detail: String },
  Error { detail: String },
}

/// A log column entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLink {
  pub name: &'static str,
  pub href: String,
  pub present: bool,
}

/// One reported case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
  pub identity: String,
  /// Result directory, relative to the report document.
  pub dir: String,
  pub label: String,
  pub classification: Classification,
  pub outcome: CaseOutcome,
  /// Contents of `status.txt`, if readable.
  pub status: Option<String>,
  pub duration_ms: Option<u64>,
  pub reference: ImageCell,
  pub captured: ImageCell,
  pub logs: Vec<LogLink>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportTotals {
  pub cases: usize,
  pub reported: usize,
  pub skipped: usize,
  pub passed: usize,
  pub failed: usize,
  pub untriaged: usize,
  pub clean: usize,
  pub known_issues: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
  pub metadata: ReportMetadata,
  pub issue_url_base: String,
  pub totals: ReportTotals,
  pub rows: Vec<ReportRow>,
  /// Registry identities that are not in the manifest.
  pub stale_registry_keys: Vec<String>,
}

/// Read-only inputs of report generation.
pub struct ReportInputs<'a> {
  pub manifest: &'a Manifest,
  pub store: &'a ResultStore,
  pub registry: &'a KnownIssueRegistry,
  /// Corpus `Models` directory with the reference screenshots.
  pub models_dir: &'a Path,
  pub transcoder: &'a dyn ArtifactTranscoder,
  pub issue_url_base: &'a str,
}

/// Rows for every manifest case with a result directory, in manifest order, plus the number of
/// skipped cases.
pub fn collect_rows(inputs: &ReportInputs<'_>) -> (Vec<ReportRow>, usize) {
  let mut rows = Vec::new();
  let mut skipped = 0;
  for case in inputs.manifest.cases() {
    if !inputs.store.has_result(&case.identity) {
      tracing::debug!(identity = %case.identity, "no result directory; skipping row");
      skipped += 1;
      continue;
    }
    rows.push(build_row(inputs, &case));
  }
  (rows, skipped)
}

fn build_row(inputs: &ReportInputs<'_>, case: &TestCase<'_>) -> ReportRow {
  let dir = inputs.store.case_dir(&case.identity);
  let dir_name = ResultStore::dir_name(&case.identity);
  let link = |file: &str| format!("{dir_name}/{file}");

  let status = ResultStore::read_status(&dir);
  let screenshot = dir.join(SCREENSHOT_FILE);
  let outcome = CaseOutcome::classify(status, screenshot.is_file());
  let duration_ms = ResultStore::read_record(&dir).map(|record| record.duration_ms);

  let captured = if screenshot.is_file() {
    match inputs
      .transcoder
      .transcode(&screenshot, &dir.join(DISPLAY_SCREENSHOT_FILE))
    {
      Ok(()) => ImageCell::Available {
        src: link(DISPLAY_SCREENSHOT_FILE),
      },
      Err(err) => {
        tracing::warn!(identity = %case.identity, error = %err, "screenshot conversion failed");
        ImageCell::Error {
          detail: err.to_string(),
        }
      }
    }
  } else {
    ImageCell::Missing {
      detail: "no screenshot produced".to_string(),
    }
  };

  let reference_src = case.reference_image_path(inputs.models_dir);
  let reference = match copy_reference(&reference_src, &dir) {
    Ok(file) => ImageCell::Available { src: link(&file) },
    Err(missing) => {
      tracing::warn!(identity = %case.identity, "{missing}");
      ImageCell::Missing {
        detail: missing.to_string(),
      }
    }
  };

  let logs = [RENDERER_LOG_FILE, STDOUT_FILE, STDERR_FILE]
    .into_iter()
    .map(|name| LogLink {
      name,
      href: link(name),
      present: dir.join(name).is_file(),
    })
    .collect();

  ReportRow {
    identity: case.identity.to_string(),
    dir: dir_name.clone(),
    label: case.display_label(),
    classification: inputs.registry.lookup(case.identity.as_str()),
    outcome,
    status: status.map(|s| s.to_string()),
    duration_ms,
    reference,
    captured,
    logs,
  }
}

/// Copy the reference screenshot into the result directory as `expected.<ext>`.
fn copy_reference(src: &Path, dir: &Path) -> Result<String, ReportAssetMissing> {
  let missing = || ReportAssetMissing {
    path: src.to_path_buf(),
  };
  if !src.is_file() {
    return Err(missing());
  }
  let file = match src.extension().and_then(|ext| ext.to_str()) {
    Some(ext) => format!("{EXPECTED_STEM}.{ext}"),
    None => EXPECTED_STEM.to_string(),
  };
  fs::copy(src, dir.join(&file)).map_err(|_| missing())?;
  Ok(file)
}

impl Report {
  pub fn new(
    metadata: ReportMetadata,
    issue_url_base: &str,
    rows: Vec<ReportRow>,
    cases: usize,
    skipped: usize,
    stale_registry_keys: Vec<String>,
  ) -> Self {
    let mut totals = ReportTotals {
      cases,
      reported: rows.len(),
      skipped,
      ..ReportTotals::default()
    };
    for row in &rows {
      if row.outcome.is_failure() {
        totals.failed += 1;
      } else {
        totals.passed += 1;
      }
      match row.classification {
        Classification::Untriaged => totals.untriaged += 1,
        Classification::Clean => totals.clean += 1,
        Classification::KnownIssues(_) => totals.known_issues += 1,
      }
    }
    Self {
      metadata,
      issue_url_base: issue_url_base.to_string(),
      totals,
      rows,
      stale_registry_keys,
    }
  }

  pub fn has_failures(&self) -> bool {
    self.totals.failed > 0
  }
}

/// Build the report for `inputs`.
pub fn build_report(inputs: &ReportInputs<'_>, metadata: ReportMetadata) -> Report {
  let (rows, skipped) = collect_rows(inputs);
  let stale: Vec<String> = inputs
    .registry
    .stale_identities(inputs.manifest)
    .into_iter()
    .map(str::to_string)
    .collect();
  for key in &stale {
    tracing::warn!(identity = %key, "known-issue entry does not match any manifest case");
  }
  Report::new(
    metadata,
    inputs.issue_url_base,
    rows,
    inputs.manifest.case_count(),
    skipped,
    stale,
  )
}

/// Paths of the written report documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenReport {
  pub html: PathBuf,
  pub json: PathBuf,
}

/// Write `index.html` and `report.json` at the results root.
pub fn write_report(report: &Report, root: &Path) -> Result<WrittenReport, ReportError> {
  let html_path = root.join(HTML_FILE);
  let json_path = root.join(JSON_FILE);
  fs::write(&html_path, html::render_html(report)).map_err(|source| ReportError::Write {
    path: html_path.clone(),
    source,
  })?;
  let json = serde_json::to_string_pretty(report)?;
  fs::write(&json_path, json).map_err(|source| ReportError::Write {
    path: json_path.clone(),
    source,
  })?;
  Ok(WrittenReport {
    html: html_path,
    json: json_path,
  })
}

/// Collect, render and write in one go.
pub fn generate(
  inputs: &ReportInputs<'_>,
  metadata: ReportMetadata,
) -> Result<(Report, WrittenReport), ReportError> {
  let report = build_report(inputs, metadata);
  let written = write_report(&report, inputs.store.root())?;
  tracing::info!(
    html = %written.html.display(),
    rows = report.totals.reported,
    skipped = report.totals.skipped,
    transcoder = inputs.transcoder.name(),
    "report written"
  );
  Ok((report, written))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::known_issues::DefectRef;
  use crate::manifest::TestIdentity;
  use crate::result_store::CaseStatus;
  use crate::transcode::ImageTranscoder;

  const MANIFEST: &str = r#"[
    {"label": "Box", "name": "Box", "screenshot": "screenshot/screenshot.png",
     "variants": {"glTF": "Box.gltf", "glTF-Binary": "Box.glb"}},
    {"label": "Empty", "name": "Empty", "screenshot": "s.png", "variants": {}}
  ]"#;

  fn fixture() -> (tempfile::TempDir, Manifest, ResultStore, PathBuf) {
    let tmp = tempfile::TempDir::new().expect("tempdir");
    let manifest = Manifest::from_json_str(MANIFEST).unwrap();
    let store = ResultStore::new(tmp.path().join("results"));
    store.ensure_root().unwrap();
    let models = tmp.path().join("Models");
    fs::create_dir_all(models.join("Box/screenshot")).unwrap();
    image::RgbImage::from_pixel(2, 2, image::Rgb([0, 255, 0]))
      .save(models.join("Box/screenshot/screenshot.png"))
      .unwrap();
    (tmp, manifest, store, models)
  }

  fn metadata() -> ReportMetadata {
    ReportMetadata {
      generated_at: "2024-01-01 00:00:00 +0000".to_string(),
      revision: Some("abc123".to_string()),
      host: "builder".to_string(),
    }
  }

  #[test]
  fn rows_follow_manifest_order_and_skip_cases_without_results() {
    let (_tmp, manifest, store, models) = fixture();
    let dir = store
      .create_case_dir(&TestIdentity::new("Box", "glTF-Binary"))
      .unwrap();
    ResultStore::write_status(&dir, CaseStatus::Exited(0)).unwrap();
    fs::write(dir.join(SCREENSHOT_FILE), b"P3\n1 1\n255\n1 2 3\n").unwrap();

    let registry = KnownIssueRegistry::empty();
    let inputs = ReportInputs {
      manifest: &manifest,
      store: &store,
      registry: &registry,
      models_dir: &models,
      transcoder: &ImageTranscoder,
      issue_url_base: "https://issues.example",
    };
    let (rows, skipped) = collect_rows(&inputs);
    assert_eq!(skipped, 1);
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.identity, "Box-glTF-Binary");
    assert_eq!(row.label, "Box (glTF-Binary)");
    assert_eq!(row.outcome, CaseOutcome::Passed);
    assert_eq!(row.classification, Classification::Untriaged);
    assert_eq!(
      row.captured,
      ImageCell::Available {
        src: "Box-glTF-Binary/actual.png".to_string()
      }
    );
    assert_eq!(
      row.reference,
      ImageCell::Available {
        src: "Box-glTF-Binary/expected.png".to_string()
      }
    );
    assert!(dir.join("expected.png").is_file());
    assert!(dir.join("actual.png").is_file());
    assert!(row.logs.iter().all(|log| !log.present));
  }

  #[test]
  fn missing_reference_is_reported_in_the_row() {
    let (_tmp, manifest, store, _models) = fixture();
    let dir = store.create_case_dir(&TestIdentity::new("Box", "glTF")).unwrap();
    ResultStore::write_status(&dir, CaseStatus::Exited(1)).unwrap();

    let registry = KnownIssueRegistry::from_entries([("Box-glTF", Some(vec![DefectRef::Number(455)]))]);
    let empty_models = PathBuf::from("/nonexistent/Models");
    let inputs = ReportInputs {
      manifest: &manifest,
      store: &store,
      registry: &registry,
      models_dir: &empty_models,
      transcoder: &ImageTranscoder,
      issue_url_base: "https://issues.example",
    };
    let report = build_report(&inputs, metadata());
    assert_eq!(report.rows.len(), 1);
    let row = &report.rows[0];
    assert_eq!(row.outcome, CaseOutcome::Failed);
    assert_eq!(row.status.as_deref(), Some("1"));
    match &row.reference {
      ImageCell::Missing { detail } => assert!(detail.contains("reference image missing")),
      other => panic!("unexpected reference cell {other:?}"),
    }
    assert!(matches!(row.captured, ImageCell::Missing { .. }));
    assert_eq!(report.totals.failed, 1);
    assert_eq!(report.totals.known_issues, 1);
    assert_eq!(report.totals.cases, 2);
    assert_eq!(report.totals.skipped, 1);
    assert!(report.has_failures());
  }
}
