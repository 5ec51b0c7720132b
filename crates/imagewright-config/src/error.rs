use std::fmt;

/// A single problem found while validating configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
  pub field: &'static str,
  pub message: String,
}

impl Violation {
  pub fn new(field: &'static str, message: impl Into<String>) -> Self {
    Self {
      field,
      message: message.into(),
    }
  }
}

impl fmt::Display for Violation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.field, self.message)
  }
}

/// Errors produced while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  /// One or more fields are missing or out of range.
  #[error("invalid {subject}: {}", join(.violations))]
  Invalid {
    subject: &'static str,
    violations: Vec<Violation>,
  },

  /// The configuration document is not valid JSON for the expected shape.
  #[error("failed to parse configuration: {0}")]
  Parse(#[from] serde_json::Error),
}

impl ConfigError {
  /// Violations carried by an `Invalid` error, empty otherwise.
  pub fn violations(&self) -> &[Violation] {
    match self {
      ConfigError::Invalid { violations, .. } => violations,
      ConfigError::Parse(_) => &[],
    }
  }
}

fn join(violations: &[Violation]) -> String {
  violations
    .iter()
    .map(Violation::to_string)
    .collect::<Vec<_>>()
    .join("; ")
}
