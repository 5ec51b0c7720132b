use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Pass-through state handed from one task to the next.
///
/// The orchestrator never looks inside; each task's output becomes the next
/// task's input.
pub type StateBag = serde_json::Value;

/// Auxiliary tasks run against the builder desktop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
  /// Attach the security group and issue temporary credentials.
  AttachSecurityGroup,
  /// Run the configuration routine on the builder.
  RunConfiguration,
  /// Apply operating system updates.
  RunUpdates,
  /// Revoke temporary credentials and access.
  Cleanup,
  /// Announce the finished bundle.
  NotifyCompletion,
}

impl TaskKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      TaskKind::AttachSecurityGroup => "attach_security_group",
      TaskKind::RunConfiguration => "run_configuration",
      TaskKind::RunUpdates => "run_updates",
      TaskKind::Cleanup => "cleanup",
      TaskKind::NotifyCompletion => "notify_completion",
    }
  }
}

impl fmt::Display for TaskKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Executes short-lived tasks as opaque remote procedure calls.
#[async_trait]
pub trait TaskRunner: Send + Sync {
  /// Run `task` with `input` and return its output state.
  async fn invoke(&self, task: TaskKind, input: StateBag) -> Result<StateBag, ProviderError>;
}
