use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::prelude::*;

use imagewright_config::{AutomationParameters, BASE_BUNDLES, BuildPolicy};
use imagewright_orchestrator::{BuildFailure, BuildOutcome, ImageBuildOrchestrator, WorkflowRun};
use imagewright_provider_aws::{AwsSettings, LambdaFunctions};

/// imagewright - builds custom WorkSpaces images and bundles
#[derive(Parser)]
#[command(name = "imagewright")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.imagewright)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run an image build
  ///
  /// Automation parameters are read from stdin when piped, otherwise from the
  /// `parameters` section of the config file.
  Run {
    /// Build config file (default: <data-dir>/config.json)
    #[arg(long)]
    config: Option<PathBuf>,
  },

  /// Continue a failed build from its saved run file
  Resume {
    /// Run file written when the build failed
    run_file: PathBuf,

    /// Build config file (default: <data-dir>/config.json)
    #[arg(long)]
    config: Option<PathBuf>,
  },

  /// Check parameters and policy without calling AWS
  Validate {
    /// Build config file (default: <data-dir>/config.json)
    #[arg(long)]
    config: Option<PathBuf>,
  },

  /// List the public base bundles builders can launch from
  Bundles,
}

/// Contents of the build config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BuildConfig {
  parameters: Option<AutomationParameters>,
  policy: BuildPolicy,
  functions: LambdaFunctions,
  aws: AwsSettings,
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_tracing()?;

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".imagewright"),
  };

  match cli.command {
    Some(Commands::Run { config }) => {
      let config_file = config.unwrap_or_else(|| data_dir.join("config.json"));
      block_on(run_build(config_file, data_dir))
    }
    Some(Commands::Resume { run_file, config }) => {
      let config_file = config.unwrap_or_else(|| data_dir.join("config.json"));
      block_on(resume_build(run_file, config_file, data_dir))
    }
    Some(Commands::Validate { config }) => {
      let config_file = config.unwrap_or_else(|| data_dir.join("config.json"));
      validate(&config_file)
    }
    Some(Commands::Bundles) => {
      list_bundles();
      Ok(())
    }
    None => {
      println!("imagewright - use --help to see available commands");
      Ok(())
    }
  }
}

fn init_tracing() -> Result<()> {
  let subscriber = tracing_subscriber::registry()
    .with(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with(tracing_subscriber::fmt::layer().with_writer(io::stderr));
  tracing::subscriber::set_global_default(subscriber).context("failed to install logger")
}

fn block_on<F: std::future::Future<Output = Result<()>>>(future: F) -> Result<()> {
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(future)
}

async fn run_build(config_file: PathBuf, data_dir: PathBuf) -> Result<()> {
  let config = load_config(&config_file)?;
  let params = resolve_parameters(&config)?;
  let orchestrator = connect(&config).await;

  let cancel = cancel_on_ctrl_c();
  let result = orchestrator.run(params, cancel).await;
  report(result, &data_dir).await
}

async fn resume_build(run_file: PathBuf, config_file: PathBuf, data_dir: PathBuf) -> Result<()> {
  let config = load_config(&config_file)?;
  let content = tokio::fs::read_to_string(&run_file)
    .await
    .with_context(|| format!("failed to read run file: {}", run_file.display()))?;
  let run: WorkflowRun = serde_json::from_str(&content)
    .with_context(|| format!("failed to parse run file: {}", run_file.display()))?;

  eprintln!("Resuming run {} from {:?}", run.run_id, run.failed_in);
  let orchestrator = connect(&config).await;

  let cancel = cancel_on_ctrl_c();
  let result = orchestrator.resume(run, cancel).await;
  report(result, &data_dir).await
}

fn validate(config_file: &Path) -> Result<()> {
  let config = load_config(config_file)?;
  config.policy.validate().context("invalid build policy")?;
  let params = resolve_parameters(&config)?;
  params.validate().context("invalid automation parameters")?;

  let bundle = params
    .builder_desktop_id
    .as_deref()
    .map(|id| format!("existing builder {id}"))
    .or_else(|| params.resolved_bundle_id().map(|b| format!("base bundle {b}")))
    .unwrap_or_default();
  println!(
    "ok: image '{}' -> bundle '{}' from {}",
    params.image_name, params.bundle_name, bundle
  );
  Ok(())
}

fn list_bundles() {
  println!("{:<24} {:<10} BUNDLE", "COMPUTE", "OS");
  for (compute, os, bundle) in BASE_BUNDLES {
    println!("{:<24} {:<10} {}", compute.as_str(), os.as_str(), bundle);
  }
}

fn load_config(path: &Path) -> Result<BuildConfig> {
  if !path.exists() {
    warn!(path = %path.display(), "config file not found, using defaults");
    return Ok(BuildConfig::default());
  }

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read config file: {}", path.display()))?;
  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse config file: {}", path.display()))
}

/// Parameters piped on stdin win over the config file.
fn resolve_parameters(config: &BuildConfig) -> Result<AutomationParameters> {
  if let Some(params) = read_parameters_from_stdin()? {
    return Ok(params);
  }
  match &config.parameters {
    Some(params) => Ok(params.clone()),
    None => bail!(
      "no automation parameters: pipe them on stdin or set `parameters` in the config"
    ),
  }
}

fn read_parameters_from_stdin() -> Result<Option<AutomationParameters>> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    return Ok(None);
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read parameters from stdin")?;

  if input.trim().is_empty() {
    Ok(None)
  } else {
    AutomationParameters::from_json(&input)
      .map(Some)
      .context("failed to parse parameters JSON from stdin")
  }
}

async fn connect(config: &BuildConfig) -> ImageBuildOrchestrator {
  let sdk = config.aws.load().await;
  let (provisioner, tasks) = imagewright_provider_aws::connect(&sdk, config.functions.clone());
  ImageBuildOrchestrator::new(Arc::new(provisioner), Arc::new(tasks), config.policy.clone())
}

fn cancel_on_ctrl_c() -> CancellationToken {
  let cancel = CancellationToken::new();
  let token = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupt received, cancelling build");
      token.cancel();
    }
  });
  cancel
}

async fn report(result: Result<BuildOutcome, BuildFailure>, data_dir: &Path) -> Result<()> {
  match result {
    Ok(outcome) => {
      println!("{}", serde_json::to_string_pretty(&outcome)?);
      Ok(())
    }
    Err(failure) => {
      let path = save_run(&failure.run, data_dir).await?;
      eprintln!("Run state saved to {}", path.display());
      eprintln!("Resume with: imagewright resume {}", path.display());
      Err(failure.into())
    }
  }
}

async fn save_run(run: &WorkflowRun, data_dir: &Path) -> Result<PathBuf> {
  let runs_dir = data_dir.join("runs");
  tokio::fs::create_dir_all(&runs_dir)
    .await
    .with_context(|| format!("failed to create {}", runs_dir.display()))?;

  let path = runs_dir.join(format!("{}.json", run.run_id));
  tokio::fs::write(&path, serde_json::to_vec_pretty(run)?)
    .await
    .with_context(|| format!("failed to write run file: {}", path.display()))?;
  info!(run_id = %run.run_id, path = %path.display(), "run state saved");
  Ok(path)
}
