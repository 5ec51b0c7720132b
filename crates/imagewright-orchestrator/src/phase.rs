//! Phases of an image build.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A stage of the image build state machine.
///
/// ```text
/// Init -> BuilderCreating -> BuilderCheck
/// BuilderCheck --STOPPED--> BuilderStarting -> BuilderWait -> BuilderCheck
/// BuilderCheck --transitional--> BuilderWait -> BuilderCheck
/// BuilderCheck --AVAILABLE--> Configure -> PreImageWait -> BuilderCheck
/// BuilderCheck --AVAILABLE, configured--> ImageCreate
/// ImageCreate -> ImageWait -> ImageCheck --not AVAILABLE--> ImageWait
/// ImageCheck --AVAILABLE--> BundleCreate -> DisposeBuilder -> Notify -> Done
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  Init,
  BuilderCreating,
  BuilderCheck,
  BuilderStarting,
  BuilderWait,
  Configure,
  PreImageWait,
  ImageCreate,
  ImageWait,
  ImageCheck,
  BundleCreate,
  DisposeBuilder,
  Notify,
  Done,
  Failed,
}

impl Phase {
  pub fn as_str(&self) -> &'static str {
    match self {
      Phase::Init => "init",
      Phase::BuilderCreating => "builder_creating",
      Phase::BuilderCheck => "builder_check",
      Phase::BuilderStarting => "builder_starting",
      Phase::BuilderWait => "builder_wait",
      Phase::Configure => "configure",
      Phase::PreImageWait => "pre_image_wait",
      Phase::ImageCreate => "image_create",
      Phase::ImageWait => "image_wait",
      Phase::ImageCheck => "image_check",
      Phase::BundleCreate => "bundle_create",
      Phase::DisposeBuilder => "dispose_builder",
      Phase::Notify => "notify",
      Phase::Done => "done",
      Phase::Failed => "failed",
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, Phase::Done | Phase::Failed)
  }

  /// Phases that poll the builder desktop.
  pub fn is_builder_wait_loop(&self) -> bool {
    matches!(
      self,
      Phase::BuilderCheck | Phase::BuilderStarting | Phase::BuilderWait | Phase::PreImageWait
    )
  }

  /// Phases that poll the captured image.
  pub fn is_image_wait_loop(&self) -> bool {
    matches!(self, Phase::ImageWait | Phase::ImageCheck)
  }
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
