use serde::{Deserialize, Serialize};

use crate::catalog::base_bundle_id;
use crate::enums::{ComputeType, OperatingSystem, Protocol, RunningMode};
use crate::error::{ConfigError, Violation};

const MAX_NAME_LEN: usize = 64;
const MAX_DESCRIPTION_LEN: usize = 256;
const ROOT_VOLUME_RANGE: std::ops::RangeInclusive<u32> = 80..=2000;
const USER_VOLUME_RANGE: std::ops::RangeInclusive<u32> = 10..=2000;

/// The structured input record driving one image build.
///
/// Required string fields default to empty so that a document missing them
/// still parses and the omission is reported by [`AutomationParameters::validate`]
/// together with every other problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationParameters {
  /// Directory the builder desktop is registered with, e.g. "d-1234567890".
  #[serde(default)]
  pub directory_id: String,

  /// Directory user that owns the builder desktop.
  #[serde(default)]
  pub user_name: String,

  /// Existing builder desktop to reuse instead of creating one.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub builder_desktop_id: Option<String>,

  /// Bundle the builder desktop is launched from.
  /// If not specified, looked up from `compute_type` and `operating_system`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bundle_id: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub operating_system: Option<OperatingSystem>,

  /// Required; optional here so an omission is reported as a violation.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub compute_type: Option<ComputeType>,

  #[serde(default)]
  pub protocol: Protocol,

  #[serde(default)]
  pub running_mode: RunningMode,

  #[serde(default = "default_root_volume_gib")]
  pub root_volume_gib: u32,

  #[serde(default = "default_user_volume_gib")]
  pub user_volume_gib: u32,

  /// Security group attached to the builder during configuration.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub security_group: Option<String>,

  #[serde(default)]
  pub image_name: String,

  #[serde(default)]
  pub image_description: String,

  #[serde(default)]
  pub bundle_name: String,

  /// Defaults to the image description.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bundle_description: Option<String>,

  /// Where completion is announced, e.g. a topic ARN.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub notification_target: Option<String>,
}

fn default_root_volume_gib() -> u32 {
  100
}

fn default_user_volume_gib() -> u32 {
  50
}

impl AutomationParameters {
  /// Parse parameters from a JSON document. Does not validate.
  pub fn from_json(json: &str) -> Result<Self, ConfigError> {
    Ok(serde_json::from_str(json)?)
  }

  /// Check every field, reporting all violations at once.
  pub fn validate(&self) -> Result<(), ConfigError> {
    let mut violations = Vec::new();

    if self.directory_id.trim().is_empty() {
      violations.push(Violation::new("directory_id", "is required"));
    } else if !self.directory_id.starts_with("d-") || self.directory_id.len() <= 2 {
      violations.push(Violation::new(
        "directory_id",
        format!("'{}' is not a directory id", self.directory_id),
      ));
    }

    if self.user_name.trim().is_empty() {
      violations.push(Violation::new("user_name", "is required"));
    }

    if self.compute_type.is_none() {
      violations.push(Violation::new("compute_type", "is required"));
    }

    if let Some(id) = &self.builder_desktop_id {
      if id.trim().is_empty() {
        violations.push(Violation::new("builder_desktop_id", "must not be empty"));
      }
    } else if self.resolved_bundle_id().is_none() {
      violations.push(Violation::new(
        "bundle_id",
        "is required when no builder_desktop_id is given and no base bundle matches",
      ));
    }

    check_name("image_name", &self.image_name, &mut violations);
    check_name("bundle_name", &self.bundle_name, &mut violations);
    check_description("image_description", &self.image_description, &mut violations);
    if let Some(description) = &self.bundle_description {
      check_description("bundle_description", description, &mut violations);
    }

    if !ROOT_VOLUME_RANGE.contains(&self.root_volume_gib) {
      violations.push(Violation::new(
        "root_volume_gib",
        format!(
          "{} is outside {}..={}",
          self.root_volume_gib,
          ROOT_VOLUME_RANGE.start(),
          ROOT_VOLUME_RANGE.end()
        ),
      ));
    }
    if !USER_VOLUME_RANGE.contains(&self.user_volume_gib) {
      violations.push(Violation::new(
        "user_volume_gib",
        format!(
          "{} is outside {}..={}",
          self.user_volume_gib,
          USER_VOLUME_RANGE.start(),
          USER_VOLUME_RANGE.end()
        ),
      ));
    }

    if let Some(sg) = &self.security_group {
      if sg.trim().is_empty() {
        violations.push(Violation::new("security_group", "must not be empty"));
      }
    }
    if let Some(target) = &self.notification_target {
      if target.trim().is_empty() {
        violations.push(Violation::new("notification_target", "must not be empty"));
      }
    }

    if violations.is_empty() {
      Ok(())
    } else {
      Err(ConfigError::Invalid {
        subject: "automation parameters",
        violations,
      })
    }
  }

  /// The bundle to launch the builder from, falling back to the base-bundle catalog.
  pub fn resolved_bundle_id(&self) -> Option<String> {
    match &self.bundle_id {
      Some(id) if !id.trim().is_empty() => Some(id.clone()),
      Some(_) => None,
      None => self
        .compute_type
        .zip(self.operating_system)
        .and_then(|(compute_type, os)| base_bundle_id(compute_type, os))
        .map(str::to_string),
    }
  }

  pub fn bundle_description(&self) -> &str {
    self
      .bundle_description
      .as_deref()
      .unwrap_or(&self.image_description)
  }
}

fn check_name(field: &'static str, value: &str, violations: &mut Vec<Violation>) {
  if value.is_empty() {
    violations.push(Violation::new(field, "is required"));
    return;
  }
  if value.chars().count() > MAX_NAME_LEN {
    violations.push(Violation::new(
      field,
      format!("must be at most {} characters", MAX_NAME_LEN),
    ));
  }
  if let Some(c) = value
    .chars()
    .find(|c| !(c.is_ascii_alphanumeric() || "_./()-".contains(*c)))
  {
    violations.push(Violation::new(
      field,
      format!("contains disallowed character '{}'", c),
    ));
  }
}

fn check_description(field: &'static str, value: &str, violations: &mut Vec<Violation>) {
  if value.trim().is_empty() {
    violations.push(Violation::new(field, "is required"));
  } else if value.chars().count() > MAX_DESCRIPTION_LEN {
    violations.push(Violation::new(
      field,
      format!("must be at most {} characters", MAX_DESCRIPTION_LEN),
    ));
  }
}
