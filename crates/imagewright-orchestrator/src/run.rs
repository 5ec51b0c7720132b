//! The record of one image build.

use imagewright_config::{AutomationParameters, ComputeType};
use imagewright_provider::{BundleId, DesktopId, DesktopState, ImageId, ImageState, StateBag, TaskKind};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::OrchestratorError;
use crate::phase::Phase;

/// One execution of the image build pipeline.
///
/// Mutated by every phase transition. Serializable so a failed run can be
/// written out, inspected and handed back to
/// [`ImageBuildOrchestrator::resume`](crate::ImageBuildOrchestrator::resume).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
  /// Unique run ID.
  pub run_id: String,
  pub params: AutomationParameters,
  pub phase: Phase,
  /// Phase the run was in when it failed.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub failed_in: Option<Phase>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub builder_desktop_id: Option<DesktopId>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image_id: Option<ImageId>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bundle_id: Option<BundleId>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_desktop_state: Option<DesktopState>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_image_state: Option<ImageState>,
  /// Describe calls made in the current desktop wait loop.
  #[serde(default)]
  pub desktop_polls: u32,
  /// Describe calls made in the current image wait loop.
  #[serde(default)]
  pub image_polls: u32,
  /// Whether the configuration chain has completed.
  #[serde(default)]
  pub configured: bool,
  /// Output of the most recent task, input of the next one.
  pub state_bag: StateBag,
  #[serde(default)]
  pub completed_tasks: Vec<TaskKind>,
}

impl WorkflowRun {
  pub fn new(params: AutomationParameters) -> Self {
    let run_id = uuid::Uuid::new_v4().to_string();
    let state_bag = json!({
      "run_id": run_id,
      "automation_parameters": params,
    });

    Self {
      run_id,
      builder_desktop_id: params.builder_desktop_id.clone(),
      params,
      phase: Phase::Init,
      failed_in: None,
      image_id: None,
      bundle_id: None,
      last_desktop_state: None,
      last_image_state: None,
      desktop_polls: 0,
      image_polls: 0,
      configured: false,
      state_bag,
      completed_tasks: Vec::new(),
    }
  }

  /// Record a value on the state bag if it is a JSON object.
  ///
  /// Tasks may return any JSON; a non-object bag is passed on untouched.
  pub(crate) fn annotate(&mut self, key: &str, value: impl Serialize) {
    if let Some(map) = self.state_bag.as_object_mut() {
      map.insert(key.to_string(), json!(value));
    }
  }

  pub(crate) fn require_builder(&self) -> Result<DesktopId, OrchestratorError> {
    self
      .builder_desktop_id
      .clone()
      .ok_or(OrchestratorError::MissingArtifact {
        phase: self.phase,
        artifact: "builder desktop id",
      })
  }

  pub(crate) fn require_image(&self) -> Result<ImageId, OrchestratorError> {
    self.image_id.clone().ok_or(OrchestratorError::MissingArtifact {
      phase: self.phase,
      artifact: "image id",
    })
  }

  pub(crate) fn require_compute_type(&self) -> Result<ComputeType, OrchestratorError> {
    self
      .params
      .compute_type
      .ok_or(OrchestratorError::MissingArtifact {
        phase: self.phase,
        artifact: "compute type",
      })
  }

  pub(crate) fn require_bundle(&self) -> Result<BundleId, OrchestratorError> {
    self.bundle_id.clone().ok_or(OrchestratorError::MissingArtifact {
      phase: self.phase,
      artifact: "bundle id",
    })
  }

  /// Poll count of whichever wait loop the run is in; zero outside a wait loop.
  pub fn polls_in_phase(&self) -> u32 {
    if self.phase.is_image_wait_loop() {
      self.image_polls
    } else if self.phase.is_builder_wait_loop() {
      self.desktop_polls
    } else {
      0
    }
  }

  /// Last remote state relevant to the current phase, for error reports.
  pub fn last_state_label(&self) -> Option<String> {
    if self.phase.is_image_wait_loop() {
      self.last_image_state.as_ref().map(|s| s.to_string())
    } else if self.phase.is_builder_wait_loop() {
      self.last_desktop_state.as_ref().map(|s| s.to_string())
    } else {
      None
    }
  }

  /// Configuration tasks completed since the last cleanup.
  fn since_cleanup(&self) -> impl Iterator<Item = &TaskKind> {
    self
      .completed_tasks
      .iter()
      .rev()
      .take_while(|t| **t != TaskKind::Cleanup)
      .filter(|t| **t != TaskKind::NotifyCompletion)
  }

  /// Some configuration task has run since access was last revoked.
  pub fn cleanup_pending(&self) -> bool {
    self.since_cleanup().next().is_some()
  }

  /// Whether `task` is already done and must not run again.
  ///
  /// Configuration routines run once per run. The security group attachment
  /// only counts while no cleanup has revoked it since.
  pub fn task_done(&self, task: TaskKind) -> bool {
    match task {
      TaskKind::AttachSecurityGroup => self.since_cleanup().any(|t| *t == task),
      TaskKind::RunConfiguration | TaskKind::RunUpdates => self.completed_tasks.contains(&task),
      TaskKind::Cleanup | TaskKind::NotifyCompletion => false,
    }
  }
}
