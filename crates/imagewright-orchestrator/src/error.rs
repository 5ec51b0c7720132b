//! Orchestrator errors.

use imagewright_config::ConfigError;
use imagewright_provider::{DesktopId, DesktopState, ImageId, ImageState, ProviderError, TaskKind};

use crate::phase::Phase;
use crate::run::WorkflowRun;

/// Errors that terminate an image build.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
  /// Automation parameters or policy are invalid. Raised before any remote call.
  #[error(transparent)]
  Configuration(#[from] ConfigError),

  /// A provisioning call failed. Faults are never retried.
  #[error("remote call failed during {phase}")]
  RemoteCall {
    phase: Phase,
    #[source]
    source: ProviderError,
  },

  /// A wait loop or the run deadline was exhausted.
  #[error(
    "timed out in {phase} after {attempts} polls (last state: {})",
    .last_state.as_deref().unwrap_or("unknown")
  )]
  Timeout {
    phase: Phase,
    attempts: u32,
    last_state: Option<String>,
  },

  /// The builder desktop entered a state it cannot recover from.
  #[error("builder desktop {desktop_id} entered state {state}")]
  Provisioning {
    desktop_id: DesktopId,
    state: DesktopState,
  },

  /// The captured image failed.
  #[error("image {image_id} entered state {state}")]
  ImageCapture { image_id: ImageId, state: ImageState },

  /// A configuration task failed.
  #[error("configuration task {task} failed")]
  PhaseFailure {
    task: TaskKind,
    #[source]
    source: ProviderError,
  },

  /// A phase was entered without the artifact an earlier phase records.
  #[error("cannot run {phase}: no {artifact} recorded on the run")]
  MissingArtifact {
    phase: Phase,
    artifact: &'static str,
  },

  /// The run was cancelled.
  #[error("build cancelled")]
  Cancelled,
}

impl OrchestratorError {
  pub(crate) fn remote(phase: Phase) -> impl FnOnce(ProviderError) -> Self {
    move |source| Self::RemoteCall { phase, source }
  }
}

/// A failed run together with everything needed to retry or resume it.
#[derive(Debug, thiserror::Error)]
#[error("run {} failed in {phase}", .run.run_id)]
pub struct BuildFailure {
  /// Phase in which the error was raised.
  pub phase: Phase,
  /// The run as it stood when it failed.
  pub run: Box<WorkflowRun>,
  #[source]
  pub error: OrchestratorError,
}
