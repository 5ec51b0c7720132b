//! Build events and notifiers for observability.
//!
//! Events are emitted while a run progresses so consumers can persist state,
//! stream progress to a terminal, or assert on transitions in tests.

use imagewright_provider::{DesktopState, ImageState, TaskKind};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::phase::Phase;

/// Events emitted during an image build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BuildEvent {
  /// A run has started (or resumed) after its configuration was validated.
  RunStarted { run_id: String, phase: Phase },

  /// The run moved to a new phase.
  PhaseEntered { run_id: String, phase: Phase },

  /// The run is suspended for a fixed delay.
  Waiting {
    run_id: String,
    phase: Phase,
    delay_ms: u64,
  },

  /// A builder desktop state was observed.
  DesktopObserved {
    run_id: String,
    desktop_id: String,
    state: DesktopState,
    attempt: u32,
  },

  /// An image state was observed.
  ImageObserved {
    run_id: String,
    image_id: String,
    state: ImageState,
    attempt: u32,
  },

  /// An auxiliary task completed.
  TaskCompleted { run_id: String, task: TaskKind },

  /// The bundle exists and the run is done.
  RunCompleted { run_id: String, bundle_id: String },

  /// The run failed.
  RunFailed {
    run_id: String,
    phase: Phase,
    error: String,
  },
}

/// Trait for receiving build events.
///
/// The orchestrator calls `notify` for each event; implementations decide
/// what to do with them.
pub trait BuildNotifier: Send + Sync {
  fn notify(&self, event: BuildEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl BuildNotifier for NoopNotifier {
  fn notify(&self, _event: BuildEvent) {}
}

/// A notifier that sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls a run. A run emits a few
  // events per poll, and polls are minutes apart.
  sender: mpsc::UnboundedSender<BuildEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<BuildEvent>) -> Self {
    Self { sender }
  }
}

impl BuildNotifier for ChannelNotifier {
  fn notify(&self, event: BuildEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_event_serializes_with_tag() {
    let event = BuildEvent::DesktopObserved {
      run_id: "r1".to_string(),
      desktop_id: "ws-1".to_string(),
      state: DesktopState::Stopped,
      attempt: 2,
    };

    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["event"], "desktop_observed");
    assert_eq!(json["state"], "STOPPED");
  }

  #[test]
  fn test_channel_notifier_survives_dropped_receiver() {
    let (tx, rx) = mpsc::unbounded_channel();
    let notifier = ChannelNotifier::new(tx);
    drop(rx);

    notifier.notify(BuildEvent::PhaseEntered {
      run_id: "r1".to_string(),
      phase: Phase::Init,
    });
  }
}
