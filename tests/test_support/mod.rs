#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// Stand-in renderer. Behaviour is chosen by the model name in `--gltf-scene-file`:
/// `Hang` sleeps past any test timeout, `Crash` kills itself, `Fail` exits 3 and `NoShot`
/// exits 0 without a screenshot. Everything else writes a 1x1 PPM and exits 0.
const FAKE_RENDERER: &str = r#"#!/bin/sh
scene=""
shot=""
while [ $# -gt 0 ]; do
  case "$1" in
    --gltf-scene-file) scene="$2"; shift 2 ;;
    --screenshot-path) shot="$2"; shift 2 ;;
    *) shift ;;
  esac
done
echo "rendering $scene"
echo "log for $scene" > ppx.log
case "$scene" in
  */Hang/*) sleep 30 ;;
  */Crash/*) kill -9 $$ ;;
  */Fail/*) echo "boom" >&2; exit 3 ;;
  */NoShot/*) exit 0 ;;
esac
printf 'P3\n1 1\n255\n0 255 0\n' > "$shot"
exit 0
"#;

#[cfg(unix)]
pub fn write_fake_renderer(dir: &Path) -> PathBuf {
  use std::os::unix::fs::PermissionsExt;

  let path = dir.join("fake_renderer.sh");
  fs::write(&path, FAKE_RENDERER).expect("write fake renderer");
  let mut perms = fs::metadata(&path).expect("stat fake renderer").permissions();
  perms.set_mode(0o755);
  fs::set_permissions(&path, perms).expect("chmod fake renderer");
  path
}

/// Manifest with one `glTF` variant per model name.
pub fn manifest_json(names: &[&str]) -> String {
  let entries: Vec<serde_json::Value> = names
    .iter()
    .map(|name| {
      serde_json::json!({
        "label": name,
        "name": name,
        "screenshot": "screenshot/screenshot.png",
        "variants": { "glTF": format!("{name}.gltf") },
      })
    })
    .collect();
  serde_json::to_string_pretty(&entries).expect("serialize manifest")
}

pub fn write_manifest(dir: &Path, json: &str) -> PathBuf {
  let path = dir.join("model-index.json");
  fs::write(&path, json).expect("write manifest");
  path
}

pub fn write_registry(dir: &Path, json: &str) -> PathBuf {
  let path = dir.join("known_issues.json");
  fs::write(&path, json).expect("write registry");
  path
}

/// Reference screenshot at `{models}/{name}/screenshot/screenshot.png`.
pub fn write_reference(models_dir: &Path, name: &str) {
  let dir = models_dir.join(name).join("screenshot");
  fs::create_dir_all(&dir).expect("create reference dir");
  image::RgbImage::from_pixel(2, 2, image::Rgb([0, 128, 255]))
    .save(dir.join("screenshot.png"))
    .expect("write reference png");
}

/// Drop the header lines that legitimately differ between two generations.
pub fn strip_volatile_lines(html: &str) -> String {
  html
    .lines()
    .filter(|line| !line.contains("class=\"meta-time\"") && !line.contains("class=\"meta-host\""))
    .collect::<Vec<_>>()
    .join("\n")
}
