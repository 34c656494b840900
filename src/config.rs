//! Harness configuration.
//!
//! The CLI fills a [`HarnessConfig`]; knobs that are awkward to pass on every invocation also
//! resolve from environment variables.

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Environment fallback for the renderer executable.
pub const RENDERER_ENV: &str = "GLTF_CONFORMANCE_RENDERER";
/// Environment fallback for the per-case timeout, in seconds.
pub const TIMEOUT_ENV: &str = "GLTF_CONFORMANCE_TIMEOUT";

pub const DEFAULT_FRAME_COUNT: u32 = 2;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SCENE_PREFIX: &str = "glTF-Sample-Assets/Models";
pub const DEFAULT_ISSUE_URL_BASE: &str = "https://github.com/google/bigwheels/issues";

/// Settings for invoking the renderer on one case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererConfig {
  pub program: PathBuf,
  /// Frames rendered before the renderer quits; the screenshot is taken of the last one.
  pub frame_count: u32,
  pub timeout: Duration,
  pub headless: bool,
  /// Prefix joined with `{name}/{variant}/{asset}` to form the scene path.
  pub scene_prefix: String,
  /// Forwarded verbatim after the standard flags.
  pub extra_args: Vec<String>,
}

impl RendererConfig {
  pub fn new(program: impl Into<PathBuf>) -> Self {
    Self {
      program: program.into(),
      frame_count: DEFAULT_FRAME_COUNT,
      timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
      headless: true,
      scene_prefix: DEFAULT_SCENE_PREFIX.to_string(),
      extra_args: Vec::new(),
    }
  }

  /// Frame index passed as `--screenshot-frame-number`.
  pub fn screenshot_frame(&self) -> u32 {
    self.frame_count.saturating_sub(1)
  }

  pub fn validate(&self) -> Result<()> {
    if self.frame_count == 0 {
      return Err(Error::Config("frame count must be > 0".to_string()));
    }
    if self.timeout.is_zero() {
      return Err(Error::Config("timeout must be > 0".to_string()));
    }
    Ok(())
  }
}

/// Which cases of the manifest a run executes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseSelection {
  /// Only these identities (all when empty).
  pub identities: Vec<String>,
  /// Deterministic shard `(index, total)` over the manifest-ordered case list.
  pub shard: Option<(usize, usize)>,
}

impl CaseSelection {
  /// Whether the case at `position` (manifest order) with `identity` is selected.
  pub fn includes(&self, position: usize, identity: &str) -> bool {
    if !self.identities.is_empty() && !self.identities.iter().any(|id| id == identity) {
      return false;
    }
    match self.shard {
      Some((index, total)) => position % total == index,
      None => true,
    }
  }
}

/// Full configuration of a `run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
  pub renderer: RendererConfig,
  pub manifest_path: PathBuf,
  /// Corpus `Models` directory holding the reference screenshots.
  pub models_dir: PathBuf,
  pub results_dir: PathBuf,
  /// Known-issue registry; every case is untriaged without one.
  pub registry_path: Option<PathBuf>,
  pub issue_url_base: String,
  pub selection: CaseSelection,
  /// Concurrent renderer processes. 1 keeps exclusive use of the rendering device.
  pub jobs: usize,
}

impl HarnessConfig {
  pub fn validate(&self) -> Result<()> {
    self.renderer.validate()?;
    if self.jobs == 0 {
      return Err(Error::Config("jobs must be > 0".to_string()));
    }
    if let Some((index, total)) = self.selection.shard {
      validate_shard(index, total).map_err(Error::Config)?;
    }
    Ok(())
  }
}

/// Parse `index/total` (0-based), e.g. `1/4` for the second of four shards.
pub fn parse_shard(s: &str) -> std::result::Result<(usize, usize), String> {
  let (index, total) = s
    .trim()
    .split_once('/')
    .ok_or_else(|| format!("shard `{s}` is not of the form index/total"))?;
  let parse = |part: &str, what: &str| {
    part
      .trim()
      .parse::<usize>()
      .map_err(|_| format!("shard {what} `{part}` is not a non-negative integer"))
  };
  let (index, total) = (parse(index, "index")?, parse(total, "total")?);
  validate_shard(index, total)?;
  Ok((index, total))
}

fn validate_shard(index: usize, total: usize) -> std::result::Result<(), String> {
  match (index, total) {
    (_, 0) => Err("shard total must be at least 1".to_string()),
    (index, total) if index >= total => Err(format!(
      "shard index {index} is out of range for {total} shards"
    )),
    _ => Ok(()),
  }
}

/// Renderer path from the flag, else [`RENDERER_ENV`].
pub fn resolve_renderer(flag: Option<PathBuf>) -> Result<PathBuf> {
  if let Some(path) = flag {
    return Ok(path);
  }
  match std::env::var_os(RENDERER_ENV) {
    Some(value) if !value.is_empty() => Ok(PathBuf::from(value)),
    _ => Err(Error::Config(format!(
      "no renderer given; pass --renderer or set {RENDERER_ENV}"
    ))),
  }
}

/// Timeout from the flag, else [`TIMEOUT_ENV`], else [`DEFAULT_TIMEOUT_SECS`].
pub fn resolve_timeout(flag: Option<u64>) -> Result<Duration> {
  if let Some(secs) = flag {
    return Ok(Duration::from_secs(secs));
  }
  if let Ok(env) = std::env::var(TIMEOUT_ENV) {
    let secs = env
      .trim()
      .parse::<u64>()
      .map_err(|e| Error::Config(format!("Invalid {TIMEOUT_ENV} '{env}': {e}")))?;
    return Ok(Duration::from_secs(secs));
  }
  Ok(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}
