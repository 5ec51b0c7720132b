//! The configuration chain run against an available builder desktop.

use imagewright_config::AutomationParameters;
use imagewright_provider::TaskKind;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::OrchestratorError;
use crate::events::BuildNotifier;
use crate::orchestrator::ImageBuildOrchestrator;
use crate::run::WorkflowRun;

impl<N: BuildNotifier> ImageBuildOrchestrator<N> {
  /// Tasks to run, in order, for these parameters.
  pub(crate) fn configure_plan(&self, params: &AutomationParameters) -> Vec<TaskKind> {
    let steps = &self.policy.steps;
    let mut plan = Vec::with_capacity(4);

    if params.security_group.is_some() {
      plan.push(TaskKind::AttachSecurityGroup);
    }
    if steps.run_configuration {
      plan.push(TaskKind::RunConfiguration);
    }
    if steps.run_updates {
      plan.push(TaskKind::RunUpdates);
    }
    if steps.cleanup {
      plan.push(TaskKind::Cleanup);
    }

    plan
  }

  /// Run the configuration tasks strictly in sequence.
  ///
  /// Tasks a resumed run already finished are skipped; the security group
  /// is attached again only if a cleanup revoked it since. The first failure
  /// aborts the chain. With `cleanup_on_failure` set, the cleanup task is then
  /// invoked once to revoke whatever temporary access the earlier tasks
  /// granted; the task error is returned either way.
  pub(crate) async fn configure(
    &self,
    run: &mut WorkflowRun,
    cancel: &CancellationToken,
  ) -> Result<(), OrchestratorError> {
    let plan: Vec<TaskKind> = self
      .configure_plan(&run.params)
      .into_iter()
      .filter(|task| !run.task_done(*task))
      .collect();
    info!(run_id = %run.run_id, tasks = ?plan, "configuring builder");

    for task in plan {
      let result = if cancel.is_cancelled() {
        Err(OrchestratorError::Cancelled)
      } else {
        self
          .invoke_task(run, task)
          .await
          .map_err(|source| OrchestratorError::PhaseFailure { task, source })
      };

      if let Err(e) = result {
        let needs_cleanup = match e {
          OrchestratorError::Cancelled => run.cleanup_pending(),
          _ => task != TaskKind::Cleanup,
        };
        if needs_cleanup {
          self.compensate(run).await;
        }
        return Err(e);
      }
    }

    Ok(())
  }

  /// Invoke cleanup once after configuration was cut short.
  pub(crate) async fn compensate(&self, run: &mut WorkflowRun) {
    if !self.policy.cleanup_on_failure {
      return;
    }

    warn!(run_id = %run.run_id, "configuration aborted, running cleanup");
    if let Err(e) = self.invoke_task(run, TaskKind::Cleanup).await {
      warn!(run_id = %run.run_id, error = %e, "compensating cleanup failed");
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use async_trait::async_trait;
  use imagewright_config::BuildPolicy;
  use imagewright_provider::{
    BundleId, BundleRequest, DesktopId, DesktopProvisioner, DesktopRequest, DesktopStatus,
    ImageId, ImageRequest, ImageStatus, ProviderError, StateBag, TaskRunner,
  };
  use serde_json::json;

  use super::*;

  struct Unused;

  #[async_trait]
  impl DesktopProvisioner for Unused {
    async fn create_desktop(&self, _: &DesktopRequest) -> Result<DesktopId, ProviderError> {
      unimplemented!("not needed for tests")
    }
    async fn describe_desktops(&self, _: &[DesktopId]) -> Result<Vec<DesktopStatus>, ProviderError> {
      unimplemented!("not needed for tests")
    }
    async fn start_desktops(&self, _: &[DesktopId]) -> Result<(), ProviderError> {
      unimplemented!("not needed for tests")
    }
    async fn stop_desktops(&self, _: &[DesktopId]) -> Result<(), ProviderError> {
      unimplemented!("not needed for tests")
    }
    async fn terminate_desktops(&self, _: &[DesktopId]) -> Result<(), ProviderError> {
      unimplemented!("not needed for tests")
    }
    async fn create_image(&self, _: &ImageRequest) -> Result<ImageId, ProviderError> {
      unimplemented!("not needed for tests")
    }
    async fn describe_images(&self, _: &[ImageId]) -> Result<Vec<ImageStatus>, ProviderError> {
      unimplemented!("not needed for tests")
    }
    async fn create_bundle(&self, _: &BundleRequest) -> Result<BundleId, ProviderError> {
      unimplemented!("not needed for tests")
    }
  }

  #[async_trait]
  impl TaskRunner for Unused {
    async fn invoke(&self, _: TaskKind, input: StateBag) -> Result<StateBag, ProviderError> {
      Ok(input)
    }
  }

  fn orchestrator(policy: BuildPolicy) -> ImageBuildOrchestrator {
    ImageBuildOrchestrator::new(Arc::new(Unused), Arc::new(Unused), policy)
  }

  fn params(security_group: Option<&str>) -> AutomationParameters {
    let mut value = json!({
      "directory_id": "d-9067a1b2c3",
      "user_name": "builder",
      "bundle_id": "wsb-8wthbqzhx",
      "compute_type": "STANDARD",
      "image_name": "base",
      "image_description": "Base image",
      "bundle_name": "base",
    });
    if let Some(sg) = security_group {
      value["security_group"] = json!(sg);
    }
    serde_json::from_value(value).unwrap()
  }

  #[test]
  fn test_full_plan_order() {
    let plan = orchestrator(BuildPolicy::default()).configure_plan(&params(Some("sg-1")));
    assert_eq!(
      plan,
      vec![
        TaskKind::AttachSecurityGroup,
        TaskKind::RunConfiguration,
        TaskKind::RunUpdates,
        TaskKind::Cleanup,
      ]
    );
  }

  #[test]
  fn test_plan_without_security_group_or_updates() {
    let mut policy = BuildPolicy::default();
    policy.steps.run_updates = false;

    let plan = orchestrator(policy).configure_plan(&params(None));
    assert_eq!(plan, vec![TaskKind::RunConfiguration, TaskKind::Cleanup]);
  }
}
