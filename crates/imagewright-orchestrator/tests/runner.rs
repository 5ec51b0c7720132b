mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{RecordingTasks, ScriptedProvider, params, policy};
use imagewright_orchestrator::{BuildRunner, ImageBuildOrchestrator, OrchestratorError};
use tokio_util::sync::CancellationToken;

fn runner(provider: Arc<ScriptedProvider>) -> BuildRunner<imagewright_orchestrator::NoopNotifier> {
  let orchestrator =
    ImageBuildOrchestrator::new(provider, Arc::new(RecordingTasks::new()), policy());
  BuildRunner::new(Arc::new(orchestrator))
}

#[tokio::test(start_paused = true)]
async fn test_runner_completes_every_submitted_build() {
  let provider = Arc::new(ScriptedProvider::ready());
  let runner = runner(provider.clone());

  let sender = runner.sender();
  for _ in 0..3 {
    sender.send(params()).await.unwrap();
  }
  drop(sender);

  let results = runner.start(CancellationToken::new()).await;

  assert_eq!(results.len(), 3);
  let bundles: HashSet<String> = results
    .into_iter()
    .map(|r| r.unwrap().bundle_id)
    .collect();
  assert_eq!(bundles.len(), 3);
  assert_eq!(provider.calls("create_desktop"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_runner_cancel_aborts_in_flight_builds() {
  let provider = Arc::new(ScriptedProvider::new(
    vec![imagewright_provider::DesktopState::Pending],
    vec![imagewright_provider::ImageState::Available],
  ));
  let runner = runner(provider.clone());
  let sender = runner.sender();
  let cancel = CancellationToken::new();

  let handle = tokio::spawn(runner.start(cancel.clone()));
  sender.send(params()).await.unwrap();
  sender.send(params()).await.unwrap();

  tokio::time::sleep(std::time::Duration::from_secs(30)).await;
  cancel.cancel();

  let results = handle.await.unwrap();
  assert_eq!(results.len(), 2);
  for result in results {
    let failure = result.unwrap_err();
    assert!(matches!(failure.error, OrchestratorError::Cancelled));
  }
  assert_eq!(provider.calls("create_image"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_runner_stops_when_senders_are_dropped() {
  let runner = runner(Arc::new(ScriptedProvider::ready()));
  runner.submit(params()).await.unwrap();

  // The runner drops its own sender, so only the queued build runs
  let results = runner.start(CancellationToken::new()).await;
  assert_eq!(results.len(), 1);
  assert!(results[0].is_ok());
}
