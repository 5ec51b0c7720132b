//! Build runner with channel-based triggering.
//!
//! The `BuildRunner` owns an mpsc channel of automation parameters and starts
//! an independent image build for each one it receives.

use std::sync::Arc;

use imagewright_config::AutomationParameters;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::BuildFailure;
use crate::events::BuildNotifier;
use crate::orchestrator::{BuildOutcome, ImageBuildOrchestrator};

/// Channel closed before the request could be queued.
#[derive(Debug, thiserror::Error)]
#[error("build runner channel closed")]
pub struct RunnerClosed;

/// A runner that starts a build for every set of parameters it receives.
///
/// Builds run concurrently; each one owns its own builder desktop and shares
/// nothing with the others.
///
/// # Usage
///
/// ```ignore
/// let runner = BuildRunner::new(orchestrator);
///
/// // Get sender for external triggers
/// let sender = runner.sender();
///
/// // Start the loop
/// let cancel = CancellationToken::new();
/// let results = runner.start(cancel).await;
/// ```
pub struct BuildRunner<N: BuildNotifier + 'static> {
  sender: mpsc::Sender<AutomationParameters>,
  receiver: mpsc::Receiver<AutomationParameters>,
  orchestrator: Arc<ImageBuildOrchestrator<N>>,
}

impl<N: BuildNotifier + 'static> BuildRunner<N> {
  pub fn new(orchestrator: Arc<ImageBuildOrchestrator<N>>) -> Self {
    Self::with_buffer_size(orchestrator, 16)
  }

  pub fn with_buffer_size(orchestrator: Arc<ImageBuildOrchestrator<N>>, buffer_size: usize) -> Self {
    let (sender, receiver) = mpsc::channel(buffer_size);
    Self {
      sender,
      receiver,
      orchestrator,
    }
  }

  /// Get a sender handle for queueing builds.
  pub fn sender(&self) -> mpsc::Sender<AutomationParameters> {
    self.sender.clone()
  }

  /// Queue a build with the given parameters.
  pub async fn submit(&self, params: AutomationParameters) -> Result<(), RunnerClosed> {
    self.sender.send(params).await.map_err(|_| RunnerClosed)
  }

  /// Start the loop.
  ///
  /// Runs until the cancellation token is triggered or every sender is
  /// dropped, then waits for in-flight builds. Each build gets a child token,
  /// so cancelling `cancel` aborts them at their next wait.
  pub async fn start(
    mut self,
    cancel: CancellationToken,
  ) -> Vec<Result<BuildOutcome, BuildFailure>> {
    // Only external senders should keep the loop alive
    drop(self.sender);

    info!("starting build runner");
    let mut builds = JoinSet::new();
    let mut results = Vec::new();

    loop {
      tokio::select! {
        _ = cancel.cancelled() => {
          info!("build runner cancelled");
          break;
        }
        Some(joined) = builds.join_next(), if !builds.is_empty() => {
          collect(joined, &mut results);
        }
        params = self.receiver.recv() => {
          match params {
            Some(params) => {
              let orchestrator = self.orchestrator.clone();
              let build_cancel = cancel.child_token();
              info!(image_name = %params.image_name, "starting build");
              builds.spawn(async move { orchestrator.run(params, build_cancel).await });
            }
            None => {
              info!("build runner channel closed");
              break;
            }
          }
        }
      }
    }

    while let Some(joined) = builds.join_next().await {
      collect(joined, &mut results);
    }

    results
  }

  pub fn orchestrator(&self) -> &ImageBuildOrchestrator<N> {
    &self.orchestrator
  }
}

fn collect(
  joined: Result<Result<BuildOutcome, BuildFailure>, tokio::task::JoinError>,
  results: &mut Vec<Result<BuildOutcome, BuildFailure>>,
) {
  match joined {
    Ok(Ok(outcome)) => {
      info!(
        run_id = %outcome.run_id,
        bundle_id = %outcome.bundle_id,
        "build completed"
      );
      results.push(Ok(outcome));
    }
    Ok(Err(failure)) => {
      error!(
        run_id = %failure.run.run_id,
        phase = %failure.phase,
        error = %failure.error,
        "build failed"
      );
      results.push(Err(failure));
    }
    Err(e) => {
      error!(error = %e, "build task panicked");
    }
  }
}
