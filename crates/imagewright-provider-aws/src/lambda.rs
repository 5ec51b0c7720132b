//! AWS Lambda backed task runner.

use async_trait::async_trait;
use aws_sdk_lambda::Client;
use aws_sdk_lambda::error::DisplayErrorContext;
use aws_sdk_lambda::primitives::Blob;
use imagewright_provider::{ProviderError, StateBag, TaskKind, TaskRunner};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Function names (or ARNs) for each task.
///
/// A task with no function configured fails when invoked; the orchestrator
/// only invokes the tasks enabled by its policy and parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LambdaFunctions {
  pub attach_security_group: Option<String>,
  pub run_configuration: Option<String>,
  pub run_updates: Option<String>,
  pub cleanup: Option<String>,
  pub notify_completion: Option<String>,
}

impl LambdaFunctions {
  pub fn function_for(&self, task: TaskKind) -> Option<&str> {
    let name = match task {
      TaskKind::AttachSecurityGroup => &self.attach_security_group,
      TaskKind::RunConfiguration => &self.run_configuration,
      TaskKind::RunUpdates => &self.run_updates,
      TaskKind::Cleanup => &self.cleanup,
      TaskKind::NotifyCompletion => &self.notify_completion,
    };
    name.as_deref()
  }
}

/// Runs each task as a synchronous Lambda invocation.
///
/// The state bag is sent as the request payload and the function's JSON
/// response becomes the next bag.
#[derive(Debug, Clone)]
pub struct LambdaTaskRunner {
  client: Client,
  functions: LambdaFunctions,
}

impl LambdaTaskRunner {
  pub fn new(client: Client, functions: LambdaFunctions) -> Self {
    Self { client, functions }
  }
}

/// Interpret an invocation response.
///
/// An empty payload passes the input through unchanged.
fn decode_output(
  task: TaskKind,
  function_error: Option<&str>,
  payload: &[u8],
  input: StateBag,
) -> Result<StateBag, ProviderError> {
  if let Some(kind) = function_error {
    let detail = String::from_utf8_lossy(payload);
    return Err(ProviderError::task(task.as_str(), format!("{kind}: {detail}")));
  }

  if payload.is_empty() {
    return Ok(input);
  }

  serde_json::from_slice(payload)
    .map_err(|e| ProviderError::invalid_response(task.as_str(), e.to_string()))
}

#[async_trait]
impl TaskRunner for LambdaTaskRunner {
  #[instrument(skip(self, input), fields(task = %task))]
  async fn invoke(&self, task: TaskKind, input: StateBag) -> Result<StateBag, ProviderError> {
    let function = self
      .functions
      .function_for(task)
      .ok_or_else(|| ProviderError::task(task.as_str(), "no function configured"))?;

    let body = serde_json::to_vec(&input)
      .map_err(|e| ProviderError::task(task.as_str(), e.to_string()))?;

    let output = self
      .client
      .invoke()
      .function_name(function)
      .payload(Blob::new(body))
      .send()
      .await
      .map_err(|e| ProviderError::remote("Invoke", DisplayErrorContext(e).to_string()))?;

    info!(
      function,
      status = output.status_code(),
      executed_version = ?output.executed_version(),
      "task function returned"
    );

    let payload = output.payload().map(|b| b.as_ref()).unwrap_or_default();
    decode_output(task, output.function_error(), payload, input)
  }
}
