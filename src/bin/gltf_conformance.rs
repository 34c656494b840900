//! Render the glTF sample corpus and produce a conformance report.
//!
//! Results go to `<results>/<identity>/`; the report to `<results>/index.html`.
//! Exit codes: 0 all executed cases passed, 1 at least one case failed, 2 the run itself failed.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use gltf_conformance::config::{self, parse_shard, CaseSelection, HarnessConfig, RendererConfig};
use gltf_conformance::report::{self, ReportInputs, ReportMetadata};
use gltf_conformance::{
  ArtifactTranscoder, CaseOutcome, CommandTranscoder, ImageTranscoder, KnownIssueRegistry,
  Manifest, ResultStore,
};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
  name = "gltf_conformance",
  about = "Render a glTF sample corpus and report the results",
  arg_required_else_help = true,
  version
)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the renderer over the corpus, then write the report
  Run(RunArgs),
  /// Regenerate the report from an existing results directory
  Report(ReportArgs),
  /// Print a known-issue registry listing every manifest case as clean
  KnownIssuesTemplate(TemplateArgs),
}

#[derive(Args)]
struct CorpusArgs {
  /// Corpus manifest (model-index.json)
  #[arg(long)]
  manifest: PathBuf,

  /// Corpus Models directory holding the reference screenshots (defaults to the manifest's directory)
  #[arg(long)]
  models_dir: Option<PathBuf>,

  /// Results directory (one subdirectory per case, report at its root)
  #[arg(long, default_value = "build/test_gltf_results")]
  results: PathBuf,

  /// Known-issue registry (JSON); every case is untriaged without one
  #[arg(long)]
  known_issues: Option<PathBuf>,

  /// Base URL for numeric defect references
  #[arg(long, default_value = config::DEFAULT_ISSUE_URL_BASE)]
  issue_url: String,

  /// How captured screenshots are converted for the report
  #[arg(long, value_enum, default_value_t = TranscoderKind::Image)]
  transcoder: TranscoderKind,

  /// Program used by `--transcoder command`, invoked as `<program> <src> <dest>`
  #[arg(long, default_value = "convert")]
  transcode_command: String,

  /// Checkout whose revision is stamped into the report
  #[arg(long, default_value = ".")]
  repo: PathBuf,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum TranscoderKind {
  /// Decode in-process
  Image,
  /// Run an external program (ImageMagick `convert` by default)
  Command,
}

#[derive(Args)]
struct RunArgs {
  #[command(flatten)]
  corpus: CorpusArgs,

  /// Renderer executable (defaults to GLTF_CONFORMANCE_RENDERER)
  #[arg(long)]
  renderer: Option<PathBuf>,

  /// Frames to render; the screenshot is taken of the last one
  #[arg(long, default_value_t = config::DEFAULT_FRAME_COUNT)]
  frame_count: u32,

  /// Hard per-case timeout in seconds (defaults to GLTF_CONFORMANCE_TIMEOUT or 30)
  #[arg(long)]
  timeout: Option<u64>,

  /// Let the renderer open a window
  #[arg(long)]
  no_headless: bool,

  /// Prefix of the scene path handed to the renderer
  #[arg(long, default_value = config::DEFAULT_SCENE_PREFIX)]
  scene_prefix: String,

  /// Run only these identities (comma-separated)
  #[arg(long, value_delimiter = ',')]
  cases: Option<Vec<String>>,

  /// Run only a deterministic shard of the cases (index/total, 0-based)
  #[arg(long, value_parser = parse_shard)]
  shard: Option<(usize, usize)>,

  /// Concurrent renderer processes; keep at 1 unless each gets its own device
  #[arg(long, short, default_value_t = 1)]
  jobs: usize,

  /// Extra arguments forwarded to the renderer (use `--` before these)
  #[arg(last = true)]
  extra: Vec<String>,
}

#[derive(Args)]
struct ReportArgs {
  #[command(flatten)]
  corpus: CorpusArgs,
}

#[derive(Args)]
struct TemplateArgs {
  /// Corpus manifest (model-index.json)
  #[arg(long)]
  manifest: PathBuf,

  /// Write to this file instead of stdout
  #[arg(long)]
  output: Option<PathBuf>,
}

fn main() {
  init_logging();
  let cli = Cli::parse();
  let result = match cli.command {
    Commands::Run(args) => run(args),
    Commands::Report(args) => run_report(args),
    Commands::KnownIssuesTemplate(args) => run_template(args).map(|()| 0),
  };
  match result {
    Ok(code) => std::process::exit(code),
    Err(err) => {
      eprintln!("error: {err:#}");
      std::process::exit(2);
    }
  }
}

fn init_logging() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .init();
}

impl CorpusArgs {
  fn models_dir(&self) -> PathBuf {
    self.models_dir.clone().unwrap_or_else(|| {
      self
        .manifest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
    })
  }

  fn transcoder(&self) -> Box<dyn ArtifactTranscoder> {
    match self.transcoder {
      TranscoderKind::Image => Box::new(ImageTranscoder),
      TranscoderKind::Command => Box::new(CommandTranscoder::new(self.transcode_command.clone())),
    }
  }
}

fn run(args: RunArgs) -> Result<i32> {
  let mut renderer = RendererConfig::new(config::resolve_renderer(args.renderer)?);
  renderer.frame_count = args.frame_count;
  renderer.timeout = config::resolve_timeout(args.timeout)?;
  renderer.headless = !args.no_headless;
  renderer.scene_prefix = args.scene_prefix;
  renderer.extra_args = args.extra;

  let harness = HarnessConfig {
    renderer,
    manifest_path: args.corpus.manifest.clone(),
    models_dir: args.corpus.models_dir(),
    results_dir: args.corpus.results.clone(),
    registry_path: args.corpus.known_issues.clone(),
    issue_url_base: args.corpus.issue_url.clone(),
    selection: CaseSelection {
      identities: args.cases.unwrap_or_default(),
      shard: args.shard,
    },
    jobs: args.jobs,
  };

  let transcoder = args.corpus.transcoder();
  let outcome = gltf_conformance::run_harness(&harness, transcoder.as_ref(), &args.corpus.repo)?;

  let summary = &outcome.summary;
  println!(
    "Done in {:.1}s: {} cases, {} passed, {} failed, {} timed out, {} missing screenshots, {} crashed",
    summary.elapsed_ms as f64 / 1000.0,
    summary.records.len(),
    summary.count(CaseOutcome::Passed),
    summary.count(CaseOutcome::Failed),
    summary.count(CaseOutcome::TimedOut),
    summary.count(CaseOutcome::MissingArtifact),
    summary.count(CaseOutcome::Crashed),
  );
  let failures: Vec<_> = summary.failures().collect();
  if !failures.is_empty() {
    println!("Failures:");
    for record in failures {
      println!("  {} ({})", record.identity, record.outcome.label());
    }
  }
  println!("Report: {}", outcome.html.display());
  Ok(outcome.exit_code())
}

fn run_report(args: ReportArgs) -> Result<i32> {
  let corpus = args.corpus;
  let manifest = Manifest::load(&corpus.manifest)?;
  let registry = match &corpus.known_issues {
    Some(path) => KnownIssueRegistry::load(path)?,
    None => KnownIssueRegistry::empty(),
  };
  let store = ResultStore::new(&corpus.results);
  if !store.root().is_dir() {
    anyhow::bail!("results directory {} does not exist", store.root().display());
  }

  let models_dir = corpus.models_dir();
  let transcoder = corpus.transcoder();
  let inputs = ReportInputs {
    manifest: &manifest,
    store: &store,
    registry: &registry,
    models_dir: &models_dir,
    transcoder: transcoder.as_ref(),
    issue_url_base: &corpus.issue_url,
  };
  let (report, written) = report::generate(&inputs, ReportMetadata::collect(&corpus.repo))?;
  println!(
    "{} rows ({} passed, {} failed, {} cases without results)",
    report.totals.reported, report.totals.passed, report.totals.failed, report.totals.skipped
  );
  println!("Report: {}", written.html.display());
  Ok(if report.has_failures() { 1 } else { 0 })
}

fn run_template(args: TemplateArgs) -> Result<()> {
  let manifest = Manifest::load(&args.manifest)?;
  let template = KnownIssueRegistry::template(&manifest).context("serialize template")?;
  match args.output {
    Some(path) => {
      fs::write(&path, template).with_context(|| format!("write {}", path.display()))?;
    }
    None => print!("{template}"),
  }
  Ok(())
}
