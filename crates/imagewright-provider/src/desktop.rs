use std::fmt;

use async_trait::async_trait;
use imagewright_config::{ComputeType, Protocol, RunningMode};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

pub type DesktopId = String;
pub type ImageId = String;
pub type BundleId = String;

/// Power/lifecycle state of a virtual desktop as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DesktopState {
  Pending,
  Starting,
  Available,
  Stopping,
  Stopped,
  Rebooting,
  Error,
  Terminating,
  Terminated,
  Suspended,
  /// A state this crate does not know about; treated as transitional.
  Other(String),
}

impl DesktopState {
  pub fn as_str(&self) -> &str {
    match self {
      DesktopState::Pending => "PENDING",
      DesktopState::Starting => "STARTING",
      DesktopState::Available => "AVAILABLE",
      DesktopState::Stopping => "STOPPING",
      DesktopState::Stopped => "STOPPED",
      DesktopState::Rebooting => "REBOOTING",
      DesktopState::Error => "ERROR",
      DesktopState::Terminating => "TERMINATING",
      DesktopState::Terminated => "TERMINATED",
      DesktopState::Suspended => "SUSPENDED",
      DesktopState::Other(s) => s,
    }
  }

  /// The desktop can never become available again without operator action.
  pub fn is_failed(&self) -> bool {
    matches!(
      self,
      DesktopState::Error
        | DesktopState::Terminating
        | DesktopState::Terminated
        | DesktopState::Suspended
    )
  }
}

impl From<&str> for DesktopState {
  fn from(value: &str) -> Self {
    match value {
      "PENDING" => DesktopState::Pending,
      "STARTING" => DesktopState::Starting,
      "AVAILABLE" => DesktopState::Available,
      "STOPPING" => DesktopState::Stopping,
      "STOPPED" => DesktopState::Stopped,
      "REBOOTING" => DesktopState::Rebooting,
      "ERROR" => DesktopState::Error,
      "TERMINATING" => DesktopState::Terminating,
      "TERMINATED" => DesktopState::Terminated,
      "SUSPENDED" => DesktopState::Suspended,
      other => DesktopState::Other(other.to_string()),
    }
  }
}

impl From<String> for DesktopState {
  fn from(value: String) -> Self {
    DesktopState::from(value.as_str())
  }
}

impl From<DesktopState> for String {
  fn from(state: DesktopState) -> Self {
    state.as_str().to_string()
  }
}

impl fmt::Display for DesktopState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// State of a captured image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ImageState {
  Pending,
  Available,
  Error,
  Other(String),
}

impl ImageState {
  pub fn as_str(&self) -> &str {
    match self {
      ImageState::Pending => "PENDING",
      ImageState::Available => "AVAILABLE",
      ImageState::Error => "ERROR",
      ImageState::Other(s) => s,
    }
  }
}

impl From<&str> for ImageState {
  fn from(value: &str) -> Self {
    match value {
      "PENDING" => ImageState::Pending,
      "AVAILABLE" => ImageState::Available,
      "ERROR" => ImageState::Error,
      other => ImageState::Other(other.to_string()),
    }
  }
}

impl From<String> for ImageState {
  fn from(value: String) -> Self {
    ImageState::from(value.as_str())
  }
}

impl From<ImageState> for String {
  fn from(state: ImageState) -> Self {
    state.as_str().to_string()
  }
}

impl fmt::Display for ImageState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesktopStatus {
  pub id: DesktopId,
  pub state: DesktopState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageStatus {
  pub id: ImageId,
  pub state: ImageState,
}

/// Request to launch a builder desktop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesktopRequest {
  pub directory_id: String,
  pub user_name: String,
  pub bundle_id: String,
  pub compute_type: ComputeType,
  pub protocol: Protocol,
  pub running_mode: RunningMode,
  pub root_volume_gib: u32,
  pub user_volume_gib: u32,
}

/// Request to capture an image from a desktop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequest {
  pub name: String,
  pub description: String,
  pub desktop_id: DesktopId,
}

/// Request to create a bundle from an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleRequest {
  pub name: String,
  pub description: String,
  pub image_id: ImageId,
  pub compute_type: ComputeType,
  pub root_capacity_gib: u32,
  pub user_capacity_gib: u32,
}

/// Control-plane operations on virtual desktops, images and bundles.
///
/// Calls are one-shot; the orchestrator does the polling.
#[async_trait]
pub trait DesktopProvisioner: Send + Sync {
  /// Launch a new desktop and return its id. The desktop starts out pending.
  async fn create_desktop(&self, request: &DesktopRequest) -> Result<DesktopId, ProviderError>;

  /// Report the current state of each requested desktop.
  async fn describe_desktops(
    &self,
    ids: &[DesktopId],
  ) -> Result<Vec<DesktopStatus>, ProviderError>;

  async fn start_desktops(&self, ids: &[DesktopId]) -> Result<(), ProviderError>;

  async fn stop_desktops(&self, ids: &[DesktopId]) -> Result<(), ProviderError>;

  async fn terminate_desktops(&self, ids: &[DesktopId]) -> Result<(), ProviderError>;

  /// Begin capturing an image from an available desktop.
  async fn create_image(&self, request: &ImageRequest) -> Result<ImageId, ProviderError>;

  async fn describe_images(&self, ids: &[ImageId]) -> Result<Vec<ImageStatus>, ProviderError>;

  async fn create_bundle(&self, request: &BundleRequest) -> Result<BundleId, ProviderError>;
}
