use thiserror::Error;

/// Errors returned by remote collaborators.
#[derive(Debug, Error)]
pub enum ProviderError {
  /// The remote call failed or was rejected.
  #[error("{operation} failed: {message}")]
  Remote { operation: String, message: String },

  /// The remote service does not know the resource.
  #[error("resource not found: {resource}")]
  NotFound { resource: String },

  /// The remote call succeeded but the response was unusable.
  #[error("invalid response from {operation}: {message}")]
  InvalidResponse { operation: String, message: String },

  /// A configuration task reported failure.
  #[error("task {task} failed: {message}")]
  Task { task: String, message: String },
}

impl ProviderError {
  pub fn remote(operation: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Remote {
      operation: operation.into(),
      message: message.into(),
    }
  }

  pub fn invalid_response(operation: impl Into<String>, message: impl Into<String>) -> Self {
    Self::InvalidResponse {
      operation: operation.into(),
      message: message.into(),
    }
  }

  pub fn task(task: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Task {
      task: task.into(),
      message: message.into(),
    }
  }
}
