//! imagewright Orchestrator
//!
//! This crate drives the custom image build: it provisions a builder desktop,
//! configures it, captures an image and turns that image into a bundle,
//! polling the provider with fixed delays in between.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        BuildRunner                          │
//! │  - owns mpsc channel of AutomationParameters                │
//! │  - start(cancel) runs builds concurrently on child tokens   │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  ImageBuildOrchestrator                     │
//! │  - run(params, cancel) → BuildOutcome | BuildFailure        │
//! │  - Phase state machine, one dispatch per step               │
//! │  - bounded polling, cancellable waits                       │
//! └─────────────────────────────────────────────────────────────┘
//!                │                               │
//!                ▼                               ▼
//! ┌──────────────────────────────┐ ┌──────────────────────────────┐
//! │      DesktopProvisioner      │ │          TaskRunner          │
//! │  desktops, images, bundles   │ │  opaque configuration tasks  │
//! └──────────────────────────────┘ └──────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use imagewright_orchestrator::ImageBuildOrchestrator;
//! use tokio_util::sync::CancellationToken;
//!
//! let orchestrator = ImageBuildOrchestrator::new(provisioner, tasks, BuildPolicy::default());
//!
//! let cancel = CancellationToken::new();
//! let outcome = orchestrator.run(params, cancel).await?;
//! println!("bundle: {}", outcome.bundle_id);
//! ```

mod configure;
mod error;
mod events;
mod orchestrator;
mod phase;
mod run;
mod runner;

pub use error::{BuildFailure, OrchestratorError};
pub use events::{BuildEvent, BuildNotifier, ChannelNotifier, NoopNotifier};
pub use orchestrator::{BuildOutcome, ImageBuildOrchestrator};
pub use phase::Phase;
pub use run::WorkflowRun;
pub use runner::{BuildRunner, RunnerClosed};
