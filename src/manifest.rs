//! Corpus manifest loading
//!
//! The manifest is the corpus' `model-index.json`: a JSON array where every entry names a model
//! directory, a reference screenshot, and the variants (asset flavours) available for it.
//!
//! ```json
//! [
//!   {
//!     "label": "Box",
//!     "name": "Box",
//!     "screenshot": "screenshot/screenshot.png",
//!     "variants": { "glTF": "Box.gltf", "glTF-Binary": "Box.glb" }
//!   }
//! ]
//! ```
//!
//! Each (entry, variant) pair is one test case keyed by its [`TestIdentity`].

use crate::error::ManifestError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

/// One model in the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestManifestEntry {
  /// Human-readable name.
  pub label: String,
  /// Directory of the model inside the corpus.
  pub name: String,
  /// Reference screenshot, relative to the model directory.
  pub screenshot: String,
  /// Variant name -> asset filename. Iterated in key order.
  pub variants: BTreeMap<String, String>,
}

/// `{name}-{variant}`: the unique key of a test case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestIdentity(String);

impl TestIdentity {
  pub fn new(name: &str, variant: &str) -> Self {
    Self(format!("{name}-{variant}"))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for TestIdentity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for TestIdentity {
  fn from(value: &str) -> Self {
    Self(value.to_string())
  }
}

/// A single (entry, variant) pair, borrowed from the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase<'a> {
  pub entry_index: usize,
  pub entry: &'a TestManifestEntry,
  pub variant: &'a str,
  pub asset_file: &'a str,
  pub identity: TestIdentity,
}

impl TestCase<'_> {
  /// Scene path handed to the renderer: `{prefix}/{name}/{variant}/{asset}`.
  ///
  /// The renderer resolves this against its own asset root, so forward slashes are used on every
  /// platform.
  pub fn scene_path(&self, prefix: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let tail = format!("{}/{}/{}", self.entry.name, self.variant, self.asset_file);
    if prefix.is_empty() {
      tail
    } else {
      format!("{prefix}/{tail}")
    }
  }

  /// Location of the reference screenshot inside the corpus models directory.
  pub fn reference_image_path(&self, models_dir: &Path) -> PathBuf {
    models_dir
      .join(&self.entry.name)
      .join(&self.entry.screenshot)
  }

  /// `"{label} ({variant})"`, as shown in the report.
  pub fn display_label(&self) -> String {
    format!("{} ({})", self.entry.label, self.variant)
  }
}

/// Validated corpus manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
  entries: Vec<TestManifestEntry>,
}

impl Manifest {
  /// Read and validate a manifest file.
  pub fn load(path: &Path) -> Result<Self, ManifestError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json_str(&raw)
  }

  /// Parse and validate manifest JSON.
  pub fn from_json_str(json: &str) -> Result<Self, ManifestError> {
    let entries: Vec<TestManifestEntry> = serde_json::from_str(json)?;
    Self::from_entries(entries)
  }

  /// Validate already-deserialized entries.
  pub fn from_entries(entries: Vec<TestManifestEntry>) -> Result<Self, ManifestError> {
    let mut seen: HashMap<TestIdentity, usize> = HashMap::new();
    let mut folded: HashMap<String, (TestIdentity, usize)> = HashMap::new();
    for (index, entry) in entries.iter().enumerate() {
      if entry.name.trim().is_empty() {
        return Err(ManifestError::EmptyField {
          index,
          field: "name",
        });
      }
      if entry.screenshot.trim().is_empty() {
        return Err(ManifestError::EmptyField {
          index,
          field: "screenshot",
        });
      }
      for (variant, file) in &entry.variants {
        if variant.trim().is_empty() {
          return Err(ManifestError::EmptyField {
            index,
            field: "variants",
          });
        }
        if file.trim().is_empty() {
          return Err(ManifestError::EmptyVariantFile {
            index,
            name: entry.name.clone(),
            variant: variant.clone(),
          });
        }
        let identity = TestIdentity::new(&entry.name, variant);
        if let Some(first) = seen.insert(identity.clone(), index) {
          return Err(ManifestError::DuplicateIdentity {
            identity: identity.to_string(),
            first,
            second: index,
          });
        }
        let key = identity.as_str().to_ascii_lowercase();
        if let Some((other, first)) = folded.get(&key) {
          return Err(ManifestError::CaseCollision {
            first_identity: other.to_string(),
            second_identity: identity.to_string(),
            first: *first,
            second: index,
          });
        }
        folded.insert(key, (identity, index));
      }
    }
    Ok(Self { entries })
  }

  pub fn entries(&self) -> &[TestManifestEntry] {
    &self.entries
  }

  /// All test cases in manifest order.
  pub fn cases(&self) -> impl Iterator<Item = TestCase<'_>> {
    self
      .entries
      .iter()
      .enumerate()
      .flat_map(|(entry_index, entry)| {
        entry.variants.iter().map(move |(variant, file)| TestCase {
          entry_index,
          entry,
          variant: variant.as_str(),
          asset_file: file.as_str(),
          identity: TestIdentity::new(&entry.name, variant),
        })
      })
  }

  pub fn case_count(&self) -> usize {
    self.entries.iter().map(|e| e.variants.len()).sum()
  }

  pub fn contains(&self, identity: &str) -> bool {
    self.cases().any(|case| case.identity.as_str() == identity)
  }
}
