use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::enums::BuilderDisposition;
use crate::error::{ConfigError, Violation};

/// Wait intervals, poll caps and optional steps for an image build.
///
/// Waits use a fixed delay rather than backoff: the provider's state
/// transitions take minutes, so polling faster only burns API quota.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildPolicy {
  pub desktop_poll_interval_ms: u64,
  pub image_poll_interval_ms: u64,
  /// Settling delay between configuration and image capture.
  pub pre_image_delay_ms: u64,
  /// Describe calls allowed per desktop wait loop.
  pub max_desktop_polls: u32,
  /// Describe calls allowed per image wait loop.
  pub max_image_polls: u32,
  /// Deadline for the whole run.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
  pub steps: ConfigureSteps,
  pub cleanup_on_failure: bool,
  pub builder_disposition: BuilderDisposition,
}

impl Default for BuildPolicy {
  fn default() -> Self {
    Self {
      desktop_poll_interval_ms: 3 * 60 * 1000,
      image_poll_interval_ms: 3 * 60 * 1000,
      pre_image_delay_ms: 2 * 60 * 1000,
      max_desktop_polls: 40,
      max_image_polls: 40,
      timeout_ms: None,
      steps: ConfigureSteps::default(),
      cleanup_on_failure: true,
      builder_disposition: BuilderDisposition::Retain,
    }
  }
}

impl BuildPolicy {
  pub fn validate(&self) -> Result<(), ConfigError> {
    let mut violations = Vec::new();

    if self.max_desktop_polls == 0 {
      violations.push(Violation::new("max_desktop_polls", "must be at least 1"));
    }
    if self.max_image_polls == 0 {
      violations.push(Violation::new("max_image_polls", "must be at least 1"));
    }
    if self.timeout_ms == Some(0) {
      violations.push(Violation::new("timeout_ms", "must be positive when set"));
    }

    if violations.is_empty() {
      Ok(())
    } else {
      Err(ConfigError::Invalid {
        subject: "build policy",
        violations,
      })
    }
  }

  pub fn desktop_poll_interval(&self) -> Duration {
    Duration::from_millis(self.desktop_poll_interval_ms)
  }

  pub fn image_poll_interval(&self) -> Duration {
    Duration::from_millis(self.image_poll_interval_ms)
  }

  pub fn pre_image_delay(&self) -> Duration {
    Duration::from_millis(self.pre_image_delay_ms)
  }

  pub fn timeout(&self) -> Option<Duration> {
    self.timeout_ms.map(Duration::from_millis)
  }
}

/// Which configuration tasks run against the builder.
///
/// Attaching the security group is governed by the presence of
/// `security_group` in the automation parameters instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigureSteps {
  pub run_configuration: bool,
  pub run_updates: bool,
  pub cleanup: bool,
}

impl Default for ConfigureSteps {
  fn default() -> Self {
    Self {
      run_configuration: true,
      run_updates: true,
      cleanup: true,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_intervals() {
    let policy = BuildPolicy::default();
    assert_eq!(policy.desktop_poll_interval(), Duration::from_secs(180));
    assert_eq!(policy.image_poll_interval(), Duration::from_secs(180));
    assert_eq!(policy.pre_image_delay(), Duration::from_secs(120));
    assert!(policy.timeout().is_none());
    assert!(policy.validate().is_ok());
  }

  #[test]
  fn test_partial_document_keeps_defaults() {
    let policy: BuildPolicy = serde_json::from_str(
      r#"{ "max_image_polls": 5, "builder_disposition": "terminate", "steps": { "run_updates": false } }"#,
    )
    .unwrap();

    assert_eq!(policy.max_image_polls, 5);
    assert_eq!(policy.max_desktop_polls, 40);
    assert_eq!(policy.builder_disposition, BuilderDisposition::Terminate);
    assert!(!policy.steps.run_updates);
    assert!(policy.steps.run_configuration);
    assert!(policy.cleanup_on_failure);
  }

  #[test]
  fn test_zero_caps_rejected() {
    let policy = BuildPolicy {
      max_desktop_polls: 0,
      max_image_polls: 0,
      ..Default::default()
    };

    let err = policy.validate().unwrap_err();
    assert_eq!(err.violations().len(), 2);
  }
}
