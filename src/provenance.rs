//! Where and from what a report was produced.

use std::path::Path;
use std::process::Command;

/// `git rev-parse HEAD` in `repo_dir`, falling back to CI-provided environment variables.
///
/// Returns `None` rather than failing when no revision can be determined.
pub fn revision_stamp(repo_dir: &Path) -> Option<String> {
  if let Ok(output) = Command::new("git")
    .arg("rev-parse")
    .arg("HEAD")
    .current_dir(repo_dir)
    .output()
  {
    if output.status.success() {
      let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
      if !sha.is_empty() {
        return Some(sha);
      }
    }
  }
  for key in ["GLTF_CONFORMANCE_REVISION", "GITHUB_SHA"] {
    if let Ok(val) = std::env::var(key) {
      let trimmed = val.trim();
      if !trimmed.is_empty() {
        return Some(trimmed.to_string());
      }
    }
  }
  None
}

/// Host name of this machine, or `"unknown"`.
pub fn host_identity() -> String {
  os_hostname()
    .or_else(|| {
      ["HOSTNAME", "COMPUTERNAME"]
        .into_iter()
        .filter_map(|key| std::env::var(key).ok())
        .map(|val| val.trim().to_string())
        .find(|val| !val.is_empty())
    })
    .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(unix)]
fn os_hostname() -> Option<String> {
  let mut buf = [0u8; 256];
  // SAFETY: the buffer is valid for `buf.len()` bytes; gethostname NUL-terminates on success
  // when the name fits, and we only read up to the first NUL.
  let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
  if rc != 0 {
    return None;
  }
  let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
  let name = String::from_utf8_lossy(&buf[..len]).trim().to_string();
  (!name.is_empty()).then_some(name)
}

#[cfg(not(unix))]
fn os_hostname() -> Option<String> {
  None
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn host_identity_is_never_empty() {
    assert!(!host_identity().is_empty());
  }

  #[test]
  fn revision_outside_a_checkout_does_not_fail() {
    let tmp = tempfile::TempDir::new().expect("tempdir");
    // Either a CI variable is set or the lookup degrades to None; it must not panic.
    if let Some(sha) = revision_stamp(tmp.path()) {
      assert!(!sha.is_empty());
    }
  }
}
