//! imagewright Provider
//!
//! This crate defines the remote collaborators the image build orchestrator
//! talks to. Implementations live elsewhere (`imagewright-provider-aws`) or in
//! tests as scripted mocks.
//!
//! The [`DesktopProvisioner`] trait covers the virtual-desktop control plane:
//! - Creating, starting, stopping and terminating desktops
//! - Capturing images and creating bundles
//! - Describing desktop and image state for polling
//!
//! The [`TaskRunner`] trait invokes opaque configuration tasks that take and
//! return a pass-through [`StateBag`].

mod desktop;
mod error;
mod task;

pub use desktop::{
  BundleId, BundleRequest, DesktopId, DesktopProvisioner, DesktopRequest, DesktopState,
  DesktopStatus, ImageId, ImageRequest, ImageState, ImageStatus,
};
pub use error::ProviderError;
pub use task::{StateBag, TaskKind, TaskRunner};
