//! Error types for the conformance harness
//!
//! The harness distinguishes between failures that make a run untrustworthy and failures that
//! belong to a single test case:
//! - Manifest errors (malformed corpus description)
//! - Registry errors (malformed known-issue data)
//! - Infrastructure errors (result directories, process spawning, artifact writes)
//! - Report errors (report documents could not be written)
//!
//! Per-case failures (nonzero exit, timeout, missing screenshot) are *not* errors;
//! they are recorded as [`crate::result_store::CaseStatus`] data and flow into the report.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the harness
///
/// Every variant is fatal to the run that produced it.
#[derive(Error, Debug)]
pub enum Error {
  /// The corpus manifest could not be loaded
  #[error("Manifest error: {0}")]
  Manifest(#[from] ManifestError),

  /// The known-issue registry could not be loaded
  #[error("Registry error: {0}")]
  Registry(#[from] RegistryError),

  /// The run could not continue because of the host environment
  #[error("Infrastructure error: {0}")]
  Infrastructure(#[from] InfrastructureError),

  /// The report documents could not be produced
  #[error("Report error: {0}")]
  Report(#[from] ReportError),

  /// Invalid harness configuration
  #[error("Invalid configuration: {0}")]
  Config(String),
}

/// Errors that occur while loading the test manifest
#[derive(Error, Debug)]
pub enum ManifestError {
  /// The manifest file could not be read
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The manifest is not valid JSON or lacks required fields
  #[error("invalid manifest: {0}")]
  Parse(#[from] serde_json::Error),

  /// A field that must be non-empty was empty
  #[error("entry {index}: field `{field}` must not be empty")]
  EmptyField { index: usize, field: &'static str },

  /// A variant maps to an empty asset filename
  #[error("entry {index} ({name}): variant `{variant}` has no asset filename")]
  EmptyVariantFile {
    index: usize,
    name: String,
    variant: String,
  },

  /// Two (entry, variant) pairs produce the same identity
  #[error("duplicate test identity `{identity}` (entries {first} and {second})")]
  DuplicateIdentity {
    identity: String,
    first: usize,
    second: usize,
  },

  /// Two identities differ only in ASCII case and would share a result directory on
  /// case-insensitive filesystems
  #[error("test identities `{first_identity}` and `{second_identity}` differ only in case (entries {first} and {second})")]
  CaseCollision {
    first_identity: String,
    second_identity: String,
    first: usize,
    second: usize,
  },
}

/// Errors that occur while loading the known-issue registry
#[derive(Error, Debug)]
pub enum RegistryError {
  /// The registry file could not be read
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The registry is not a JSON object of identity -> list/null
  #[error("invalid registry {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// Failures of the host environment that abort the remaining run
#[derive(Error, Debug)]
pub enum InfrastructureError {
  /// A result directory for this identity is left over from an earlier run
  #[error("result directory already exists: {}", path.display())]
  ResultDirectoryExists { path: PathBuf },

  /// A directory could not be created
  #[error("failed to create directory {}: {source}", path.display())]
  CreateDirectory {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The renderer process could not be started
  #[error("failed to spawn renderer {}: {source}", program.display())]
  Spawn {
    program: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// Waiting on or terminating the renderer process failed
  #[error("failed to supervise renderer for {identity}: {source}")]
  Supervise {
    identity: String,
    #[source]
    source: std::io::Error,
  },

  /// The worker pool for parallel runs could not be started
  #[error("failed to start worker pool: {0}")]
  WorkerPool(#[source] rayon::ThreadPoolBuildError),

  /// An artifact owned by the runner could not be written
  #[error("failed to write {}: {source}", path.display())]
  WriteArtifact {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Failures writing the report documents themselves
#[derive(Error, Debug)]
pub enum ReportError {
  #[error("failed to write {}: {source}", path.display())]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to serialize report: {0}")]
  Serialize(#[from] serde_json::Error),
}

/// The reference image for a case is absent at report time
///
/// Surfaced in the affected report row; never aborts report generation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("reference image missing: {}", path.display())]
pub struct ReportAssetMissing {
  pub path: PathBuf,
}

/// A screenshot could not be converted to its display format
#[derive(Error, Debug)]
pub enum TranscodeError {
  #[error("failed to decode {}: {source}", path.display())]
  Decode {
    path: PathBuf,
    #[source]
    source: image::ImageError,
  },

  #[error("failed to encode {}: {source}", path.display())]
  Encode {
    path: PathBuf,
    #[source]
    source: image::ImageError,
  },

  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("{program} exited with {status}")]
  CommandFailed { program: String, status: String },
}
