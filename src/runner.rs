//! Renderer execution.
//!
//! Every selected case gets a fresh result directory, one renderer process with a hard timeout,
//! and a status artifact. Failures of the case itself (nonzero exit, crash, timeout, no
//! screenshot) become data in the returned [`ResultRecord`]; only problems with the host
//! environment stop the batch.

use crate::config::{CaseSelection, RendererConfig};
use crate::error::InfrastructureError;
use crate::manifest::{Manifest, TestCase};
use crate::process::{self, Completion};
use crate::result_store::{
  CaseOutcome, CaseStatus, ResultRecord, ResultStore, SCREENSHOT_FILE, STDERR_FILE, STDOUT_FILE,
};
use rayon::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

/// Runs renderer invocations into a [`ResultStore`].
pub struct TestRunner<'a> {
  config: &'a RendererConfig,
  store: &'a ResultStore,
  program: PathBuf,
}

impl<'a> TestRunner<'a> {
  pub fn new(config: &'a RendererConfig, store: &'a ResultStore) -> Self {
    Self {
      program: absolutize_program(&config.program),
      config,
      store,
    }
  }

  /// Command line for one case, relative to the case's result directory.
  pub fn renderer_args(&self, case: &TestCase<'_>) -> Vec<String> {
    let mut args = vec![
      "--frame-count".to_string(),
      self.config.frame_count.to_string(),
      "--screenshot-frame-number".to_string(),
      self.config.screenshot_frame().to_string(),
      "--gltf-scene-file".to_string(),
      case.scene_path(&self.config.scene_prefix),
      "--screenshot-path".to_string(),
      SCREENSHOT_FILE.to_string(),
    ];
    if self.config.headless {
      args.push("--headless".to_string());
    }
    args.extend(self.config.extra_args.iter().cloned());
    args
  }

  /// Execute one case. `Err` only for infrastructure failures.
  pub fn run_case(&self, case: &TestCase<'_>) -> Result<ResultRecord, InfrastructureError> {
    let dir = self.store.create_case_dir(&case.identity)?;
    let stdout = create_capture(&dir.join(STDOUT_FILE))?;
    let stderr = create_capture(&dir.join(STDERR_FILE))?;

    let mut cmd = Command::new(&self.program);
    cmd
      .args(self.renderer_args(case))
      .current_dir(&dir)
      .stdin(Stdio::null())
      .stdout(Stdio::from(stdout))
      .stderr(Stdio::from(stderr));

    tracing::debug!(identity = %case.identity, program = %self.program.display(), "spawning renderer");
    let start = Instant::now();
    let mut child =
      process::spawn_isolated(&mut cmd).map_err(|source| InfrastructureError::Spawn {
        program: self.program.clone(),
        source,
      })?;
    let completion = process::wait_with_deadline(&mut child, start, self.config.timeout)
      .map_err(|source| InfrastructureError::Supervise {
        identity: case.identity.to_string(),
        source,
      })?;
    let elapsed = start.elapsed();

    let status = match completion {
      Completion::TimedOut => CaseStatus::TimedOut,
      Completion::Exited(exit) => CaseStatus::from_exit_status(&exit),
    };
    let screenshot = dir
      .join(SCREENSHOT_FILE)
      .is_file()
      .then(|| SCREENSHOT_FILE.to_string());

    let record = ResultRecord::new(case.identity.clone(), dir.clone(), status, screenshot, elapsed);
    ResultStore::write_status(&dir, status)?;
    ResultStore::write_record(&record)?;
    log_outcome(&record);
    Ok(record)
  }

  /// Execute every selected case of `manifest`.
  ///
  /// Records come back in manifest order regardless of `jobs`. All workers have finished when this
  /// returns. An infrastructure error stops the scheduling of further cases and is returned.
  pub fn run_all(
    &self,
    manifest: &Manifest,
    selection: &CaseSelection,
    jobs: usize,
  ) -> Result<RunSummary, InfrastructureError> {
    self.store.ensure_root()?;
    let cases: Vec<TestCase<'_>> = manifest
      .cases()
      .enumerate()
      .filter(|(position, case)| selection.includes(*position, case.identity.as_str()))
      .map(|(_, case)| case)
      .collect();
    tracing::info!(
      selected = cases.len(),
      total = manifest.case_count(),
      jobs,
      "running cases"
    );

    let start = Instant::now();
    let records = if jobs <= 1 || cases.len() <= 1 {
      let mut records = Vec::with_capacity(cases.len());
      for case in &cases {
        records.push(self.run_case(case)?);
      }
      records
    } else {
      self.run_parallel(&cases, jobs)?
    };

    Ok(RunSummary {
      records,
      elapsed_ms: start.elapsed().as_millis() as u64,
    })
  }

  fn run_parallel(
    &self,
    cases: &[TestCase<'_>],
    jobs: usize,
  ) -> Result<Vec<ResultRecord>, InfrastructureError> {
    // One worker per renderer process; `jobs` caps the concurrent renderers exactly.
    let pool = rayon::ThreadPoolBuilder::new()
      .num_threads(jobs)
      .build()
      .map_err(InfrastructureError::WorkerPool)?;
    pool.install(|| {
      cases
        .par_iter()
        .map(|case| self.run_case(case))
        .collect::<Result<Vec<_>, _>>()
    })
  }
}

/// Records of a finished batch, in manifest order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
  pub records: Vec<ResultRecord>,
  pub elapsed_ms: u64,
}

impl RunSummary {
  pub fn count(&self, outcome: CaseOutcome) -> usize {
    self.records.iter().filter(|r| r.outcome == outcome).count()
  }

  pub fn failures(&self) -> impl Iterator<Item = &ResultRecord> {
    self.records.iter().filter(|r| r.outcome.is_failure())
  }

  pub fn has_failures(&self) -> bool {
    self.failures().next().is_some()
  }
}

fn create_capture(path: &Path) -> Result<File, InfrastructureError> {
  File::create(path).map_err(|source| InfrastructureError::WriteArtifact {
    path: path.to_path_buf(),
    source,
  })
}

/// The renderer runs inside its result directory, so relative paths with a directory part must
/// be anchored to the harness' working directory first. Bare names are left for `PATH` lookup.
fn absolutize_program(program: &Path) -> PathBuf {
  if program.is_absolute() || program.components().count() <= 1 {
    return program.to_path_buf();
  }
  std::env::current_dir()
    .map(|cwd| cwd.join(program))
    .unwrap_or_else(|_| program.to_path_buf())
}

fn log_outcome(record: &ResultRecord) {
  let identity = record.identity.as_str();
  match record.outcome {
    CaseOutcome::Passed => {
      tracing::info!(identity, duration_ms = record.duration_ms, "PASS");
    }
    CaseOutcome::TimedOut => {
      tracing::warn!(identity, duration_ms = record.duration_ms, "TIMEOUT");
    }
    CaseOutcome::MissingArtifact => {
      tracing::warn!(identity, "MISSING screenshot (renderer exited 0)");
    }
    outcome => {
      tracing::warn!(identity, status = %record.status, "{}", outcome.label());
    }
  }
}
