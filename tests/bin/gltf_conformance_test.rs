use crate::test_support::{manifest_json, write_manifest, write_reference, write_registry};
use std::fs;
use std::process::Command;

fn harness() -> Command {
  let mut cmd = Command::new(env!("CARGO_BIN_EXE_gltf_conformance"));
  cmd.env_remove("GLTF_CONFORMANCE_RENDERER");
  cmd.env_remove("GLTF_CONFORMANCE_TIMEOUT");
  cmd.env("RUST_LOG", "warn");
  cmd
}

#[cfg(unix)]
#[test]
fn run_writes_results_and_report_and_exits_zero_when_everything_passes() {
  use crate::test_support::write_fake_renderer;

  let tmp = tempfile::TempDir::new().expect("tempdir");
  let renderer = write_fake_renderer(tmp.path());
  let models = tmp.path().join("Models");
  fs::create_dir_all(&models).unwrap();
  let manifest = write_manifest(&models, &manifest_json(&["Box", "Duck"]));
  write_reference(&models, "Box");
  let registry = write_registry(tmp.path(), r#"{"Box-glTF": [], "Duck-glTF": [455]}"#);
  let results = tmp.path().join("results");

  let output = harness()
    .arg("run")
    .arg("--manifest")
    .arg(&manifest)
    .arg("--results")
    .arg(&results)
    .arg("--known-issues")
    .arg(&registry)
    .arg("--renderer")
    .arg(&renderer)
    .args(["--timeout", "10", "--repo"])
    .arg(tmp.path())
    .output()
    .expect("run gltf_conformance");

  let stdout = String::from_utf8_lossy(&output.stdout);
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert_eq!(
    output.status.code(),
    Some(0),
    "stdout:\n{stdout}\nstderr:\n{stderr}"
  );
  assert!(stdout.contains("2 passed"), "stdout:\n{stdout}");

  assert!(results.join("Box-glTF/actual.ppm").is_file());
  assert!(results.join("Duck-glTF/actual.ppm").is_file());
  let html = fs::read_to_string(results.join("index.html")).expect("report");
  assert!(html.contains("no known issues"));
  assert!(html.contains("https://github.com/google/bigwheels/issues/455"));
  assert!(html.contains("reference image missing"));
}

#[cfg(unix)]
#[test]
fn run_exits_one_when_a_case_fails_and_still_reports_it() {
  use crate::test_support::write_fake_renderer;

  let tmp = tempfile::TempDir::new().expect("tempdir");
  let renderer = write_fake_renderer(tmp.path());
  let manifest = write_manifest(tmp.path(), &manifest_json(&["Fail", "NoShot", "Box"]));
  let results = tmp.path().join("results");

  let output = harness()
    .arg("run")
    .arg("--manifest")
    .arg(&manifest)
    .arg("--results")
    .arg(&results)
    .arg("--renderer")
    .arg(&renderer)
    .args(["--timeout", "10"])
    .output()
    .expect("run gltf_conformance");

  let stdout = String::from_utf8_lossy(&output.stdout);
  assert_eq!(output.status.code(), Some(1), "stdout:\n{stdout}");
  assert!(stdout.contains("Fail-glTF (FAIL)"), "stdout:\n{stdout}");
  assert!(stdout.contains("NoShot-glTF (MISSING)"), "stdout:\n{stdout}");

  let html = fs::read_to_string(results.join("index.html")).expect("report");
  assert!(html.contains("Fail (glTF)"));
  assert!(html.contains("MISSING<br>exit: 0"));
  assert!(html.contains(r#"<span class="untriaged">Untriaged</span>"#));
}

#[cfg(unix)]
#[test]
fn rerun_into_existing_results_is_fatal() {
  use crate::test_support::write_fake_renderer;

  let tmp = tempfile::TempDir::new().expect("tempdir");
  let renderer = write_fake_renderer(tmp.path());
  let manifest = write_manifest(tmp.path(), &manifest_json(&["Box"]));
  let results = tmp.path().join("results");
  fs::create_dir_all(results.join("Box-glTF")).unwrap();

  let output = harness()
    .arg("run")
    .arg("--manifest")
    .arg(&manifest)
    .arg("--results")
    .arg(&results)
    .arg("--renderer")
    .arg(&renderer)
    .output()
    .expect("run gltf_conformance");

  assert_eq!(output.status.code(), Some(2));
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(
    stderr.contains("result directory already exists"),
    "stderr:\n{stderr}"
  );
}

#[test]
fn malformed_manifest_aborts_before_running() {
  let tmp = tempfile::TempDir::new().expect("tempdir");
  let manifest = write_manifest(tmp.path(), r#"[{"label": "Box", "name": "Box"}]"#);
  let results = tmp.path().join("results");

  let output = harness()
    .arg("run")
    .arg("--manifest")
    .arg(&manifest)
    .arg("--results")
    .arg(&results)
    .args(["--renderer", "/nonexistent/renderer"])
    .output()
    .expect("run gltf_conformance");

  assert_eq!(output.status.code(), Some(2));
  assert!(!results.exists());
}

#[test]
fn missing_renderer_configuration_is_fatal() {
  let tmp = tempfile::TempDir::new().expect("tempdir");
  let manifest = write_manifest(tmp.path(), &manifest_json(&["Box"]));

  let output = harness()
    .arg("run")
    .arg("--manifest")
    .arg(&manifest)
    .arg("--results")
    .arg(tmp.path().join("results"))
    .output()
    .expect("run gltf_conformance");

  assert_eq!(output.status.code(), Some(2));
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("GLTF_CONFORMANCE_RENDERER"), "stderr:\n{stderr}");
}

#[test]
fn report_subcommand_regenerates_from_existing_results() {
  let tmp = tempfile::TempDir::new().expect("tempdir");
  let manifest = write_manifest(tmp.path(), &manifest_json(&["Box", "Never"]));
  let results = tmp.path().join("results");
  let case = results.join("Box-glTF");
  fs::create_dir_all(&case).unwrap();
  fs::write(case.join("status.txt"), "0\n").unwrap();
  fs::write(case.join("actual.ppm"), "P3\n1 1\n255\n1 2 3\n").unwrap();

  let output = harness()
    .arg("report")
    .arg("--manifest")
    .arg(&manifest)
    .arg("--results")
    .arg(&results)
    .output()
    .expect("run gltf_conformance report");

  let stdout = String::from_utf8_lossy(&output.stdout);
  assert_eq!(output.status.code(), Some(0), "stdout:\n{stdout}");
  assert!(stdout.contains("1 cases without results"), "stdout:\n{stdout}");
  assert!(results.join("index.html").is_file());
  assert!(results.join("report.json").is_file());
  assert!(case.join("actual.png").is_file());
}

#[test]
fn report_subcommand_requires_results_directory() {
  let tmp = tempfile::TempDir::new().expect("tempdir");
  let manifest = write_manifest(tmp.path(), &manifest_json(&["Box"]));

  let output = harness()
    .arg("report")
    .arg("--manifest")
    .arg(&manifest)
    .arg("--results")
    .arg(tmp.path().join("missing"))
    .output()
    .expect("run gltf_conformance report");

  assert_eq!(output.status.code(), Some(2));
}

#[test]
fn known_issues_template_lists_every_identity() {
  let tmp = tempfile::TempDir::new().expect("tempdir");
  let manifest = write_manifest(
    tmp.path(),
    r#"[{"label": "Box", "name": "Box", "screenshot": "s.png",
         "variants": {"glTF": "Box.gltf", "glTF-Binary": "Box.glb"}}]"#,
  );

  let output = harness()
    .arg("known-issues-template")
    .arg("--manifest")
    .arg(&manifest)
    .output()
    .expect("run gltf_conformance known-issues-template");

  assert!(output.status.success());
  let stdout = String::from_utf8_lossy(&output.stdout);
  let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("template is JSON");
  assert_eq!(
    parsed,
    serde_json::json!({"Box-glTF": [], "Box-glTF-Binary": []})
  );
}
