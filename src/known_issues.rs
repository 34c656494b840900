//! Curated known-issue registry
//!
//! The registry is a JSON object keyed by test identity:
//!
//! ```json
//! {
//!   "Box-glTF": [],
//!   "Fox-glTF-Binary": [455, "https://example.com/bugs/17"],
//!   "Sponza-glTF": null
//! }
//! ```
//!
//! An identity missing from the file is *untriaged*; `null` or `[]` means a human verified the
//! render; a non-empty list names the tracked defects. The registry is loaded once and handed to
//! report generation by reference; nothing mutates it after loading.

use crate::error::RegistryError;
use crate::manifest::Manifest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// One tracked defect: an issue number or free-form id/URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefectRef {
  Number(u64),
  Text(String),
}

impl DefectRef {
  /// Link target for this defect, relative to the issue tracker base URL.
  pub fn url(&self, issue_url_base: &str) -> String {
    let base = issue_url_base.trim_end_matches('/');
    match self {
      DefectRef::Number(n) => format!("{base}/{n}"),
      DefectRef::Text(text) if text.contains("://") => text.clone(),
      DefectRef::Text(text) => format!("{base}/{}", text.trim_start_matches('#')),
    }
  }
}

impl fmt::Display for DefectRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DefectRef::Number(n) => write!(f, "#{n}"),
      DefectRef::Text(text) if text.contains("://") => f.write_str(text),
      DefectRef::Text(text) if text.starts_with('#') => f.write_str(text),
      DefectRef::Text(text) => write!(f, "#{text}"),
    }
  }
}

/// Three-way triage state of an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "issues", rename_all = "snake_case")]
pub enum Classification {
  Untriaged,
  Clean,
  KnownIssues(Vec<DefectRef>),
}

impl Classification {
  pub fn label(&self) -> &'static str {
    match self {
      Classification::Untriaged => "untriaged",
      Classification::Clean => "clean",
      Classification::KnownIssues(_) => "known-issues",
    }
  }
}

/// Immutable identity -> defect list mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownIssueRegistry {
  entries: BTreeMap<String, Option<Vec<DefectRef>>>,
}

impl KnownIssueRegistry {
  /// A registry with no entries; every identity is untriaged.
  pub fn empty() -> Self {
    Self::default()
  }

  pub fn load(path: &Path) -> Result<Self, RegistryError> {
    let raw = std::fs::read_to_string(path).map_err(|source| RegistryError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json_str(&raw).map_err(|source| RegistryError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
    let entries = serde_json::from_str(json)?;
    Ok(Self { entries })
  }

  pub fn from_entries<I, K>(entries: I) -> Self
  where
    I: IntoIterator<Item = (K, Option<Vec<DefectRef>>)>,
    K: Into<String>,
  {
    Self {
      entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
    }
  }

  pub fn lookup(&self, identity: &str) -> Classification {
    match self.entries.get(identity) {
      None => Classification::Untriaged,
      Some(None) => Classification::Clean,
      Some(Some(issues)) if issues.is_empty() => Classification::Clean,
      Some(Some(issues)) => Classification::KnownIssues(issues.clone()),
    }
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Registry keys that no longer correspond to a manifest case.
  pub fn stale_identities(&self, manifest: &Manifest) -> Vec<&str> {
    let known: std::collections::HashSet<String> = manifest
      .cases()
      .map(|case| case.identity.to_string())
      .collect();
    self
      .entries
      .keys()
      .filter(|key| !known.contains(key.as_str()))
      .map(String::as_str)
      .collect()
  }

  /// Registry skeleton listing every manifest identity as clean, in manifest order.
  ///
  /// Curators start from this and replace `[]` with defect numbers as they triage.
  pub fn template(manifest: &Manifest) -> Result<String, serde_json::Error> {
    let entries: serde_json::Map<String, serde_json::Value> = manifest
      .cases()
      .map(|case| (case.identity.to_string(), serde_json::Value::Array(Vec::new())))
      .collect();
    let mut out = serde_json::to_string_pretty(&entries)?;
    out.push('\n');
    Ok(out)
  }
}
