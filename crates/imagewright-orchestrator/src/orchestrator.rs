//! The image build state machine and its driver loop.

use std::sync::Arc;
use std::time::Duration;

use imagewright_config::{BuildPolicy, BuilderDisposition};
use imagewright_provider::{
  BundleId, BundleRequest, DesktopId, DesktopProvisioner, DesktopRequest, DesktopState, ImageId,
  ImageRequest, ImageState, ProviderError, TaskKind, TaskRunner,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::error::{BuildFailure, OrchestratorError};
use crate::events::{BuildEvent, BuildNotifier, NoopNotifier};
use crate::phase::Phase;
use crate::run::WorkflowRun;

/// Result of a successful image build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOutcome {
  pub run_id: String,
  pub bundle_id: BundleId,
  pub image_id: ImageId,
  pub builder_desktop_id: DesktopId,
  /// The completed run. The builder desktop and image remain as side artifacts.
  pub run: WorkflowRun,
}

/// Drives workflow runs through the image build phases.
///
/// Holds only immutable collaborators and policy, so one orchestrator can be
/// shared behind an `Arc` by any number of concurrent runs.
pub struct ImageBuildOrchestrator<N: BuildNotifier = NoopNotifier> {
  pub(crate) provisioner: Arc<dyn DesktopProvisioner>,
  pub(crate) tasks: Arc<dyn TaskRunner>,
  pub(crate) policy: BuildPolicy,
  pub(crate) notifier: N,
}

impl ImageBuildOrchestrator<NoopNotifier> {
  /// Create an orchestrator that discards build events.
  pub fn new(
    provisioner: Arc<dyn DesktopProvisioner>,
    tasks: Arc<dyn TaskRunner>,
    policy: BuildPolicy,
  ) -> Self {
    Self::with_notifier(provisioner, tasks, policy, NoopNotifier)
  }
}

impl<N: BuildNotifier> ImageBuildOrchestrator<N> {
  pub fn with_notifier(
    provisioner: Arc<dyn DesktopProvisioner>,
    tasks: Arc<dyn TaskRunner>,
    policy: BuildPolicy,
    notifier: N,
  ) -> Self {
    Self {
      provisioner,
      tasks,
      policy,
      notifier,
    }
  }

  pub fn policy(&self) -> &BuildPolicy {
    &self.policy
  }

  /// Run the whole pipeline for one set of automation parameters.
  ///
  /// Parameters and policy are validated before any remote call. Nothing
  /// created along the way is deleted on failure; the returned
  /// [`BuildFailure`] carries the run so an operator can clean up or
  /// [`resume`](Self::resume).
  pub async fn run(
    &self,
    params: imagewright_config::AutomationParameters,
    cancel: CancellationToken,
  ) -> Result<BuildOutcome, BuildFailure> {
    self.execute(WorkflowRun::new(params), cancel).await
  }

  /// Continue a failed run from the phase it failed in.
  ///
  /// Poll counters are reset; artifacts already recorded on the run (builder
  /// desktop, image) are reused rather than created again.
  /// Configuration tasks that already completed are not repeated.
  pub async fn resume(
    &self,
    mut run: WorkflowRun,
    cancel: CancellationToken,
  ) -> Result<BuildOutcome, BuildFailure> {
    if run.phase == Phase::Failed {
      run.phase = run.failed_in.take().unwrap_or(Phase::Init);
    }
    run.desktop_polls = 0;
    run.image_polls = 0;
    self.execute(run, cancel).await
  }

  #[instrument(
    name = "image_build",
    skip(self, run, cancel),
    fields(
      run_id = %run.run_id,
      image_name = %run.params.image_name,
      bundle_name = %run.params.bundle_name,
    )
  )]
  async fn execute(
    &self,
    mut run: WorkflowRun,
    cancel: CancellationToken,
  ) -> Result<BuildOutcome, BuildFailure> {
    if let Err(e) = self.policy.validate().and_then(|_| run.params.validate()) {
      return Err(self.fail(run, e.into()));
    }

    info!(
      run_id = %run.run_id,
      phase = %run.phase,
      builder_desktop_id = ?run.builder_desktop_id,
      "build_started"
    );
    self.notifier.notify(BuildEvent::RunStarted {
      run_id: run.run_id.clone(),
      phase: run.phase,
    });

    let driven = match self.policy.timeout() {
      Some(limit) => {
        let bounded = tokio::time::timeout(limit, self.drive(&mut run, &cancel)).await;
        match bounded {
          Ok(result) => result,
          Err(_) => {
            let timeout = OrchestratorError::Timeout {
              phase: run.phase,
              attempts: run.polls_in_phase(),
              last_state: run.last_state_label(),
            };
            // A configuration task was cut off mid-flight
            if run.phase == Phase::Configure {
              self.compensate(&mut run).await;
            }
            Err(timeout)
          }
        }
      }
      None => self.drive(&mut run, &cancel).await,
    };

    let finished = driven.and_then(|_| {
      Ok((
        run.require_bundle()?,
        run.require_image()?,
        run.require_builder()?,
      ))
    });

    match finished {
      Ok((bundle_id, image_id, builder_desktop_id)) => {
        info!(
          run_id = %run.run_id,
          bundle_id = %bundle_id,
          image_id = %image_id,
          "build_completed"
        );
        self.notifier.notify(BuildEvent::RunCompleted {
          run_id: run.run_id.clone(),
          bundle_id: bundle_id.clone(),
        });
        Ok(BuildOutcome {
          run_id: run.run_id.clone(),
          bundle_id,
          image_id,
          builder_desktop_id,
          run,
        })
      }
      Err(e) => Err(self.fail(run, e)),
    }
  }

  /// Step the run until it reaches `Done`.
  async fn drive(
    &self,
    run: &mut WorkflowRun,
    cancel: &CancellationToken,
  ) -> Result<(), OrchestratorError> {
    while !run.phase.is_terminal() {
      if cancel.is_cancelled() {
        warn!(run_id = %run.run_id, phase = %run.phase, "build cancelled");
        return Err(OrchestratorError::Cancelled);
      }

      let next = self.step(run, cancel).await?;
      self.enter(run, next);
    }

    Ok(())
  }

  /// Execute the current phase and return the phase to move to.
  async fn step(
    &self,
    run: &mut WorkflowRun,
    cancel: &CancellationToken,
  ) -> Result<Phase, OrchestratorError> {
    match run.phase {
      Phase::Init => Ok(Phase::BuilderCreating),
      Phase::BuilderCreating => self.create_builder(run).await,
      Phase::BuilderCheck => self.check_builder(run).await,
      Phase::BuilderStarting => {
        let desktop_id = run.require_builder()?;
        self
          .provisioner
          .start_desktops(&[desktop_id])
          .await
          .map_err(OrchestratorError::remote(Phase::BuilderStarting))?;
        Ok(Phase::BuilderWait)
      }
      Phase::BuilderWait => {
        self
          .wait(run, self.policy.desktop_poll_interval(), cancel)
          .await?;
        Ok(Phase::BuilderCheck)
      }
      Phase::Configure => {
        self.configure(run, cancel).await?;
        run.configured = true;
        Ok(Phase::PreImageWait)
      }
      Phase::PreImageWait => {
        self.wait(run, self.policy.pre_image_delay(), cancel).await?;
        // Capture requires the builder to be available again after configuration
        run.desktop_polls = 0;
        Ok(Phase::BuilderCheck)
      }
      Phase::ImageCreate => self.create_image(run).await,
      Phase::ImageWait => {
        self
          .wait(run, self.policy.image_poll_interval(), cancel)
          .await?;
        Ok(Phase::ImageCheck)
      }
      Phase::ImageCheck => self.check_image(run).await,
      Phase::BundleCreate => self.create_bundle(run).await,
      Phase::DisposeBuilder => self.dispose_builder(run).await,
      Phase::Notify => self.notify_completion(run).await,
      Phase::Done | Phase::Failed => Ok(run.phase),
    }
  }

  fn enter(&self, run: &mut WorkflowRun, next: Phase) {
    run.phase = next;
    info!(run_id = %run.run_id, phase = %next, "phase_entered");
    self.notifier.notify(BuildEvent::PhaseEntered {
      run_id: run.run_id.clone(),
      phase: next,
    });
  }

  fn fail(&self, mut run: WorkflowRun, error: OrchestratorError) -> BuildFailure {
    let phase = run.phase;
    run.failed_in = Some(phase);
    run.phase = Phase::Failed;

    error!(
      run_id = %run.run_id,
      phase = %phase,
      builder_desktop_id = ?run.builder_desktop_id,
      image_id = ?run.image_id,
      last_desktop_state = ?run.last_desktop_state,
      last_image_state = ?run.last_image_state,
      error = %error,
      "build_failed"
    );
    self.notifier.notify(BuildEvent::RunFailed {
      run_id: run.run_id.clone(),
      phase,
      error: error.to_string(),
    });

    BuildFailure {
      phase,
      run: Box::new(run),
      error,
    }
  }

  /// Suspend the run for `delay`, returning early if the run is cancelled.
  pub(crate) async fn wait(
    &self,
    run: &WorkflowRun,
    delay: Duration,
    cancel: &CancellationToken,
  ) -> Result<(), OrchestratorError> {
    self.notifier.notify(BuildEvent::Waiting {
      run_id: run.run_id.clone(),
      phase: run.phase,
      delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
    });

    tokio::select! {
      _ = tokio::time::sleep(delay) => Ok(()),
      _ = cancel.cancelled() => {
        warn!(run_id = %run.run_id, phase = %run.phase, "build cancelled while waiting");
        Err(OrchestratorError::Cancelled)
      }
    }
  }

  async fn create_builder(&self, run: &mut WorkflowRun) -> Result<Phase, OrchestratorError> {
    let desktop_id = match &run.builder_desktop_id {
      Some(id) => {
        info!(run_id = %run.run_id, desktop_id = %id, "reusing builder desktop");
        id.clone()
      }
      None => {
        let params = &run.params;
        let compute_type = run.require_compute_type()?;
        let bundle_id = params
          .resolved_bundle_id()
          .ok_or(OrchestratorError::MissingArtifact {
            phase: Phase::BuilderCreating,
            artifact: "base bundle id",
          })?;
        let request = DesktopRequest {
          directory_id: params.directory_id.clone(),
          user_name: params.user_name.clone(),
          bundle_id,
          compute_type,
          protocol: params.protocol,
          running_mode: params.running_mode,
          root_volume_gib: params.root_volume_gib,
          user_volume_gib: params.user_volume_gib,
        };

        let id = self
          .provisioner
          .create_desktop(&request)
          .await
          .map_err(OrchestratorError::remote(Phase::BuilderCreating))?;
        info!(run_id = %run.run_id, desktop_id = %id, "builder desktop created");
        id
      }
    };

    run.annotate("builder_desktop_id", &desktop_id);
    run.builder_desktop_id = Some(desktop_id);
    run.desktop_polls = 0;
    Ok(Phase::BuilderCheck)
  }

  async fn check_builder(&self, run: &mut WorkflowRun) -> Result<Phase, OrchestratorError> {
    let desktop_id = run.require_builder()?;

    run.desktop_polls += 1;
    let statuses = self
      .provisioner
      .describe_desktops(std::slice::from_ref(&desktop_id))
      .await
      .map_err(OrchestratorError::remote(Phase::BuilderCheck))?;
    let state = statuses
      .into_iter()
      .find(|s| s.id == desktop_id)
      .map(|s| s.state)
      .ok_or_else(|| OrchestratorError::RemoteCall {
        phase: Phase::BuilderCheck,
        source: ProviderError::NotFound {
          resource: format!("desktop {}", desktop_id),
        },
      })?;

    info!(
      run_id = %run.run_id,
      desktop_id = %desktop_id,
      state = %state,
      attempt = run.desktop_polls,
      "builder state observed"
    );
    self.notifier.notify(BuildEvent::DesktopObserved {
      run_id: run.run_id.clone(),
      desktop_id: desktop_id.clone(),
      state: state.clone(),
      attempt: run.desktop_polls,
    });
    run.last_desktop_state = Some(state.clone());

    if state == DesktopState::Available {
      return Ok(if run.configured {
        Phase::ImageCreate
      } else {
        Phase::Configure
      });
    }

    if state.is_failed() {
      return Err(OrchestratorError::Provisioning { desktop_id, state });
    }

    if run.desktop_polls >= self.policy.max_desktop_polls {
      return Err(OrchestratorError::Timeout {
        phase: Phase::BuilderCheck,
        attempts: run.desktop_polls,
        last_state: Some(state.to_string()),
      });
    }

    Ok(if state == DesktopState::Stopped {
      Phase::BuilderStarting
    } else {
      Phase::BuilderWait
    })
  }

  async fn create_image(&self, run: &mut WorkflowRun) -> Result<Phase, OrchestratorError> {
    let desktop_id = run.require_builder()?;
    let request = ImageRequest {
      name: run.params.image_name.clone(),
      description: run.params.image_description.clone(),
      desktop_id,
    };

    let image_id = self
      .provisioner
      .create_image(&request)
      .await
      .map_err(OrchestratorError::remote(Phase::ImageCreate))?;
    info!(run_id = %run.run_id, image_id = %image_id, "image capture started");

    run.annotate("image_id", &image_id);
    run.image_id = Some(image_id);
    run.image_polls = 0;
    Ok(Phase::ImageWait)
  }

  async fn check_image(&self, run: &mut WorkflowRun) -> Result<Phase, OrchestratorError> {
    let image_id = run.require_image()?;

    run.image_polls += 1;
    let statuses = self
      .provisioner
      .describe_images(std::slice::from_ref(&image_id))
      .await
      .map_err(OrchestratorError::remote(Phase::ImageCheck))?;
    let state = statuses
      .into_iter()
      .find(|s| s.id == image_id)
      .map(|s| s.state)
      .ok_or_else(|| OrchestratorError::RemoteCall {
        phase: Phase::ImageCheck,
        source: ProviderError::NotFound {
          resource: format!("image {}", image_id),
        },
      })?;

    info!(
      run_id = %run.run_id,
      image_id = %image_id,
      state = %state,
      attempt = run.image_polls,
      "image state observed"
    );
    self.notifier.notify(BuildEvent::ImageObserved {
      run_id: run.run_id.clone(),
      image_id: image_id.clone(),
      state: state.clone(),
      attempt: run.image_polls,
    });
    run.last_image_state = Some(state.clone());

    match state {
      ImageState::Available => Ok(Phase::BundleCreate),
      ImageState::Error => Err(OrchestratorError::ImageCapture { image_id, state }),
      state if run.image_polls >= self.policy.max_image_polls => Err(OrchestratorError::Timeout {
        phase: Phase::ImageCheck,
        attempts: run.image_polls,
        last_state: Some(state.to_string()),
      }),
      _ => Ok(Phase::ImageWait),
    }
  }

  async fn create_bundle(&self, run: &mut WorkflowRun) -> Result<Phase, OrchestratorError> {
    let image_id = run.require_image()?;
    let compute_type = run.require_compute_type()?;
    let params = &run.params;
    let request = BundleRequest {
      name: params.bundle_name.clone(),
      description: params.bundle_description().to_string(),
      image_id,
      compute_type,
      root_capacity_gib: params.root_volume_gib,
      user_capacity_gib: params.user_volume_gib,
    };

    let bundle_id = self
      .provisioner
      .create_bundle(&request)
      .await
      .map_err(OrchestratorError::remote(Phase::BundleCreate))?;
    info!(run_id = %run.run_id, bundle_id = %bundle_id, "bundle created");

    run.annotate("bundle_id", &bundle_id);
    run.bundle_id = Some(bundle_id);
    Ok(Phase::DisposeBuilder)
  }

  async fn dispose_builder(&self, run: &mut WorkflowRun) -> Result<Phase, OrchestratorError> {
    let desktop_id = run.require_builder()?;
    let ids = [desktop_id];

    match self.policy.builder_disposition {
      BuilderDisposition::Retain => {
        info!(run_id = %run.run_id, desktop_id = %ids[0], "retaining builder desktop");
      }
      BuilderDisposition::Stop => {
        self
          .provisioner
          .stop_desktops(&ids)
          .await
          .map_err(OrchestratorError::remote(Phase::DisposeBuilder))?;
        info!(run_id = %run.run_id, desktop_id = %ids[0], "builder desktop stopped");
      }
      BuilderDisposition::Terminate => {
        self
          .provisioner
          .terminate_desktops(&ids)
          .await
          .map_err(OrchestratorError::remote(Phase::DisposeBuilder))?;
        info!(run_id = %run.run_id, desktop_id = %ids[0], "builder desktop terminated");
      }
    }

    Ok(Phase::Notify)
  }

  async fn notify_completion(&self, run: &mut WorkflowRun) -> Result<Phase, OrchestratorError> {
    let Some(target) = run.params.notification_target.clone() else {
      return Ok(Phase::Done);
    };

    run.annotate("notification_target", &target);
    self
      .invoke_task(run, TaskKind::NotifyCompletion)
      .await
      .map_err(OrchestratorError::remote(Phase::Notify))?;
    Ok(Phase::Done)
  }

  /// Invoke a task with the run's state bag, storing its output as the new bag.
  pub(crate) async fn invoke_task(
    &self,
    run: &mut WorkflowRun,
    task: TaskKind,
  ) -> Result<(), ProviderError> {
    info!(run_id = %run.run_id, task = %task, "task started");
    let output = self.tasks.invoke(task, run.state_bag.clone()).await?;

    run.state_bag = output;
    run.completed_tasks.push(task);
    info!(run_id = %run.run_id, task = %task, "task completed");
    self.notifier.notify(BuildEvent::TaskCompleted {
      run_id: run.run_id.clone(),
      task,
    });
    Ok(())
  }
}
