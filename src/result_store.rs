//! On-disk layout of per-case results
//!
//! ```text
//! <results>/
//!   index.html            report (written by `report`)
//!   report.json
//!   <encoded identity>/
//!     actual.ppm          screenshot written by the renderer
//!     ppx.log             renderer's own log
//!     stdout.log          verbatim renderer stdout
//!     stderr.log          verbatim renderer stderr
//!     status.txt          exit code, `SIGNAL <n>` or `TIMEOUT`
//!     result.json         ResultRecord
//!     actual.png          display copy (report)
//!     expected.<ext>      reference copy (report)
//! ```
//!
//! The existence of an identity's directory is the only signal that the case ran.

use crate::error::InfrastructureError;
use crate::manifest::TestIdentity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

pub const SCREENSHOT_FILE: &str = "actual.ppm";
pub const DISPLAY_SCREENSHOT_FILE: &str = "actual.png";
pub const RENDERER_LOG_FILE: &str = "ppx.log";
pub const STDOUT_FILE: &str = "stdout.log";
pub const STDERR_FILE: &str = "stderr.log";
pub const STATUS_FILE: &str = "status.txt";
pub const RECORD_FILE: &str = "result.json";
pub const EXPECTED_STEM: &str = "expected";

const TIMEOUT_SENTINEL: &str = "TIMEOUT";
const SIGNAL_PREFIX: &str = "SIGNAL ";

/// Encode an identity as a single path component.
///
/// ASCII alphanumerics, `-`, `_` and `.` are kept (a leading `.` is escaped so the result is never
/// hidden, `.` or `..`); every other UTF-8 byte becomes `~HH`. The mapping is injective and its
/// output only uses URL-unreserved characters, so it doubles as a relative link.
pub fn encode_identity(identity: &str) -> String {
  let mut out = String::with_capacity(identity.len());
  for (i, byte) in identity.bytes().enumerate() {
    let keep = byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' || (byte == b'.' && i > 0);
    if keep {
      out.push(byte as char);
    } else {
      out.push('~');
      out.push_str(&format!("{byte:02X}"));
    }
  }
  out
}

/// Inverse of [`encode_identity`]; `None` for names it cannot have produced.
pub fn decode_identity(encoded: &str) -> Option<String> {
  let bytes = encoded.as_bytes();
  let mut out = Vec::with_capacity(bytes.len());
  let mut i = 0;
  while i < bytes.len() {
    if bytes[i] == b'~' {
      let hex = encoded.get(i + 1..i + 3)?;
      out.push(u8::from_str_radix(hex, 16).ok()?);
      i += 3;
    } else {
      out.push(bytes[i]);
      i += 1;
    }
  }
  String::from_utf8(out).ok()
}

/// How the renderer process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CaseStatus {
  Exited(i32),
  Signaled(i32),
  TimedOut,
}

impl CaseStatus {
  /// Parse the contents of `status.txt`.
  pub fn parse(raw: &str) -> Option<Self> {
    let trimmed = raw.trim();
    if trimmed == TIMEOUT_SENTINEL {
      return Some(CaseStatus::TimedOut);
    }
    if let Some(signal) = trimmed.strip_prefix(SIGNAL_PREFIX) {
      return signal.trim().parse().ok().map(CaseStatus::Signaled);
    }
    trimmed.parse().ok().map(CaseStatus::Exited)
  }

  /// Status of a renderer that exited on its own (or was killed by something other than the
  /// harness' deadline).
  pub fn from_exit_status(status: &ExitStatus) -> Self {
    match (status.code(), crate::process::exit_signal(status)) {
      (Some(code), _) => CaseStatus::Exited(code),
      (None, Some(signal)) => CaseStatus::Signaled(signal),
      (None, None) => CaseStatus::Exited(-1),
    }
  }

  pub fn exit_code(&self) -> Option<i32> {
    match self {
      CaseStatus::Exited(code) => Some(*code),
      _ => None,
    }
  }
}

impl fmt::Display for CaseStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CaseStatus::Exited(code) => write!(f, "{code}"),
      CaseStatus::Signaled(signal) => write!(f, "{SIGNAL_PREFIX}{signal}"),
      CaseStatus::TimedOut => f.write_str(TIMEOUT_SENTINEL),
    }
  }
}

/// Pass/fail verdict of a case, derived from its status and artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseOutcome {
  Passed,
  /// Nonzero exit code.
  Failed,
  /// Killed by a signal.
  Crashed,
  TimedOut,
  /// Exit code 0 but no screenshot.
  MissingArtifact,
  /// Result directory without a readable status file (the run was interrupted).
  Incomplete,
}

impl CaseOutcome {
  pub fn classify(status: Option<CaseStatus>, screenshot_present: bool) -> Self {
    match status {
      None => CaseOutcome::Incomplete,
      Some(CaseStatus::TimedOut) => CaseOutcome::TimedOut,
      Some(CaseStatus::Signaled(_)) => CaseOutcome::Crashed,
      Some(CaseStatus::Exited(0)) if screenshot_present => CaseOutcome::Passed,
      Some(CaseStatus::Exited(0)) => CaseOutcome::MissingArtifact,
      Some(CaseStatus::Exited(_)) => CaseOutcome::Failed,
    }
  }

  pub fn is_failure(&self) -> bool {
    !matches!(self, CaseOutcome::Passed)
  }

  pub fn label(&self) -> &'static str {
    match self {
      CaseOutcome::Passed => "PASS",
      CaseOutcome::Failed => "FAIL",
      CaseOutcome::Crashed => "CRASH",
      CaseOutcome::TimedOut => "TIMEOUT",
      CaseOutcome::MissingArtifact => "MISSING",
      CaseOutcome::Incomplete => "INCOMPLETE",
    }
  }
}

/// Everything the runner learned about one case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
  pub identity: TestIdentity,
  pub status: CaseStatus,
  pub outcome: CaseOutcome,
  /// Screenshot file name inside the result directory, if the renderer produced one.
  pub screenshot: Option<String>,
  pub duration_ms: u64,
  #[serde(skip)]
  pub dir: PathBuf,
}

impl ResultRecord {
  pub fn new(
    identity: TestIdentity,
    dir: PathBuf,
    status: CaseStatus,
    screenshot: Option<String>,
    duration: Duration,
  ) -> Self {
    let outcome = CaseOutcome::classify(Some(status), screenshot.is_some());
    Self {
      identity,
      status,
      outcome,
      screenshot,
      duration_ms: duration.as_millis().min(u64::MAX as u128) as u64,
      dir,
    }
  }

  pub fn stdout_path(&self) -> PathBuf {
    self.dir.join(STDOUT_FILE)
  }

  pub fn stderr_path(&self) -> PathBuf {
    self.dir.join(STDERR_FILE)
  }

  pub fn screenshot_path(&self) -> Option<PathBuf> {
    self.screenshot.as_ref().map(|name| self.dir.join(name))
  }
}

/// Root of a results tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultStore {
  root: PathBuf,
}

impl ResultStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Ensure the results root exists. Existing roots are reused; case directories are not.
  pub fn ensure_root(&self) -> Result<(), InfrastructureError> {
    fs::create_dir_all(&self.root).map_err(|source| InfrastructureError::CreateDirectory {
      path: self.root.clone(),
      source,
    })
  }

  /// Directory name of an identity relative to the root (also its relative link).
  pub fn dir_name(identity: &TestIdentity) -> String {
    encode_identity(identity.as_str())
  }

  pub fn case_dir(&self, identity: &TestIdentity) -> PathBuf {
    self.root.join(Self::dir_name(identity))
  }

  pub fn has_result(&self, identity: &TestIdentity) -> bool {
    self.case_dir(identity).is_dir()
  }

  /// Create the directory for a case that is about to run.
  ///
  /// Fails instead of reusing a directory left behind by an earlier run.
  pub fn create_case_dir(&self, identity: &TestIdentity) -> Result<PathBuf, InfrastructureError> {
    let dir = self.case_dir(identity);
    match fs::create_dir(&dir) {
      Ok(()) => Ok(dir),
      Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
        Err(InfrastructureError::ResultDirectoryExists { path: dir })
      }
      Err(source) => Err(InfrastructureError::CreateDirectory { path: dir, source }),
    }
  }

  pub fn write_status(dir: &Path, status: CaseStatus) -> Result<(), InfrastructureError> {
    let path = dir.join(STATUS_FILE);
    fs::write(&path, format!("{status}\n"))
      .map_err(|source| InfrastructureError::WriteArtifact { path, source })
  }

  pub fn read_status(dir: &Path) -> Option<CaseStatus> {
    fs::read_to_string(dir.join(STATUS_FILE))
      .ok()
      .and_then(|raw| CaseStatus::parse(&raw))
  }

  pub fn write_record(record: &ResultRecord) -> Result<(), InfrastructureError> {
    let path = record.dir.join(RECORD_FILE);
    let json = serde_json::to_string_pretty(record)
      .map_err(|e| InfrastructureError::WriteArtifact {
        path: path.clone(),
        source: io::Error::new(io::ErrorKind::InvalidData, e),
      })?;
    fs::write(&path, json).map_err(|source| InfrastructureError::WriteArtifact { path, source })
  }

  /// Load `result.json`, if present and readable.
  pub fn read_record(dir: &Path) -> Option<ResultRecord> {
    let raw = fs::read_to_string(dir.join(RECORD_FILE)).ok()?;
    let mut record: ResultRecord = serde_json::from_str(&raw).ok()?;
    record.dir = dir.to_path_buf();
    Some(record)
  }
}
