//! Screenshot conversion for the report.
//!
//! Renderers write PPM, which browsers do not display. Report generation asks an
//! [`ArtifactTranscoder`] for a PNG copy instead of shelling out on its own, so the conversion can
//! run in-process ([`ImageTranscoder`]), through an external tool ([`CommandTranscoder`]), or be
//! stubbed in tests.

use crate::error::TranscodeError;
use image::ImageFormat;
use std::path::Path;
use std::process::{Command, Stdio};

/// Converts a captured screenshot into a web-displayable file.
pub trait ArtifactTranscoder: Send + Sync {
  /// Read `src` and write the converted image to `dest`, replacing any existing file.
  fn transcode(&self, src: &Path, dest: &Path) -> Result<(), TranscodeError>;

  /// Short name for logs and the report header.
  fn name(&self) -> &str;
}

/// In-process conversion via the `image` crate (PPM/PNG in, PNG out).
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageTranscoder;

impl ArtifactTranscoder for ImageTranscoder {
  fn transcode(&self, src: &Path, dest: &Path) -> Result<(), TranscodeError> {
    let img = image::open(src).map_err(|source| TranscodeError::Decode {
      path: src.to_path_buf(),
      source,
    })?;
    img
      .save_with_format(dest, ImageFormat::Png)
      .map_err(|source| TranscodeError::Encode {
        path: dest.to_path_buf(),
        source,
      })
  }

  fn name(&self) -> &str {
    "image"
  }
}

/// Conversion by an external program invoked as `<program> [args..] <src> <dest>`.
///
/// `CommandTranscoder::new("convert")` reproduces the ImageMagick workflow.
#[derive(Debug, Clone)]
pub struct CommandTranscoder {
  program: String,
  args: Vec<String>,
}

impl CommandTranscoder {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
    }
  }

  pub fn with_args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args = args.into_iter().map(Into::into).collect();
    self
  }
}

impl ArtifactTranscoder for CommandTranscoder {
  fn transcode(&self, src: &Path, dest: &Path) -> Result<(), TranscodeError> {
    let output = Command::new(&self.program)
      .args(&self.args)
      .arg(src)
      .arg(dest)
      .stdin(Stdio::null())
      .output()
      .map_err(|source| TranscodeError::Spawn {
        program: self.program.clone(),
        source,
      })?;
    if output.status.success() {
      return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let status = match stderr.trim() {
      "" => output.status.to_string(),
      detail => format!("{}: {}", output.status, detail.lines().next().unwrap_or(detail)),
    };
    Err(TranscodeError::CommandFailed {
      program: self.program.clone(),
      status,
    })
  }

  fn name(&self) -> &str {
    &self.program
  }
}
