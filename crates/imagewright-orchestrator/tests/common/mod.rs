//! Scripted collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use imagewright_config::{AutomationParameters, BuildPolicy};
use imagewright_orchestrator::BuildEvent;
use imagewright_provider::{
  BundleId, BundleRequest, DesktopId, DesktopProvisioner, DesktopRequest, DesktopState,
  DesktopStatus, ImageId, ImageRequest, ImageState, ImageStatus, ProviderError, StateBag, TaskKind,
  TaskRunner,
};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A state sequence; the last entry repeats once the script runs out.
struct Script<T> {
  states: VecDeque<T>,
}

impl<T: Clone> Script<T> {
  fn new(states: Vec<T>) -> Self {
    Self {
      states: states.into(),
    }
  }

  fn next(&mut self) -> Option<T> {
    if self.states.len() > 1 {
      self.states.pop_front()
    } else {
      self.states.front().cloned()
    }
  }
}

struct ProviderState {
  desktop_script: Script<DesktopState>,
  image_script: Script<ImageState>,
  calls: HashMap<&'static str, usize>,
  failing: HashSet<&'static str>,
  desktops: Vec<DesktopRequest>,
  images: Vec<ImageRequest>,
  bundles: Vec<BundleRequest>,
}

/// In-memory provider replaying scripted desktop and image states.
pub struct ScriptedProvider {
  state: Mutex<ProviderState>,
}

impl ScriptedProvider {
  pub fn new(desktop_states: Vec<DesktopState>, image_states: Vec<ImageState>) -> Self {
    Self {
      state: Mutex::new(ProviderState {
        desktop_script: Script::new(desktop_states),
        image_script: Script::new(image_states),
        calls: HashMap::new(),
        failing: HashSet::new(),
        desktops: Vec::new(),
        images: Vec::new(),
        bundles: Vec::new(),
      }),
    }
  }

  /// Desktop and image are available on the first check.
  pub fn ready() -> Self {
    Self::new(vec![DesktopState::Available], vec![ImageState::Available])
  }

  pub fn set_image_states(&self, states: Vec<ImageState>) {
    self.state.lock().unwrap().image_script = Script::new(states);
  }

  /// Make every call to `operation` fail.
  pub fn fail_on(&self, operation: &'static str) {
    self.state.lock().unwrap().failing.insert(operation);
  }

  pub fn calls(&self, operation: &str) -> usize {
    self
      .state
      .lock()
      .unwrap()
      .calls
      .get(operation)
      .copied()
      .unwrap_or(0)
  }

  pub fn total_calls(&self) -> usize {
    self.state.lock().unwrap().calls.values().sum()
  }

  pub fn image_requests(&self) -> Vec<ImageRequest> {
    self.state.lock().unwrap().images.clone()
  }

  pub fn bundle_requests(&self) -> Vec<BundleRequest> {
    self.state.lock().unwrap().bundles.clone()
  }

  fn record(&self, operation: &'static str) -> Result<(), ProviderError> {
    let mut state = self.state.lock().unwrap();
    *state.calls.entry(operation).or_insert(0) += 1;
    if state.failing.contains(operation) {
      return Err(ProviderError::remote(operation, "injected failure"));
    }
    Ok(())
  }
}

#[async_trait]
impl DesktopProvisioner for ScriptedProvider {
  async fn create_desktop(&self, request: &DesktopRequest) -> Result<DesktopId, ProviderError> {
    self.record("create_desktop")?;
    let mut state = self.state.lock().unwrap();
    state.desktops.push(request.clone());
    Ok(format!("ws-{}", state.desktops.len()))
  }

  async fn describe_desktops(
    &self,
    ids: &[DesktopId],
  ) -> Result<Vec<DesktopStatus>, ProviderError> {
    self.record("describe_desktops")?;
    let mut state = self.state.lock().unwrap();
    let desktop_state = state
      .desktop_script
      .next()
      .unwrap_or(DesktopState::Available);
    Ok(
      ids
        .iter()
        .map(|id| DesktopStatus {
          id: id.clone(),
          state: desktop_state.clone(),
        })
        .collect(),
    )
  }

  async fn start_desktops(&self, _ids: &[DesktopId]) -> Result<(), ProviderError> {
    self.record("start_desktops")
  }

  async fn stop_desktops(&self, _ids: &[DesktopId]) -> Result<(), ProviderError> {
    self.record("stop_desktops")
  }

  async fn terminate_desktops(&self, _ids: &[DesktopId]) -> Result<(), ProviderError> {
    self.record("terminate_desktops")
  }

  async fn create_image(&self, request: &ImageRequest) -> Result<ImageId, ProviderError> {
    self.record("create_image")?;
    let mut state = self.state.lock().unwrap();
    state.images.push(request.clone());
    Ok(format!("wsi-{}", state.images.len()))
  }

  async fn describe_images(&self, ids: &[ImageId]) -> Result<Vec<ImageStatus>, ProviderError> {
    self.record("describe_images")?;
    let mut state = self.state.lock().unwrap();
    let image_state = state.image_script.next().unwrap_or(ImageState::Available);
    Ok(
      ids
        .iter()
        .map(|id| ImageStatus {
          id: id.clone(),
          state: image_state.clone(),
        })
        .collect(),
    )
  }

  async fn create_bundle(&self, request: &BundleRequest) -> Result<BundleId, ProviderError> {
    self.record("create_bundle")?;
    let mut state = self.state.lock().unwrap();
    state.bundles.push(request.clone());
    Ok(format!("wsb-custom-{}", state.bundles.len()))
  }
}

/// Task runner that records invocations and marks each task on the bag.
#[derive(Default)]
pub struct RecordingTasks {
  invocations: Mutex<Vec<(TaskKind, StateBag)>>,
  failing: Mutex<HashSet<TaskKind>>,
  delays: Mutex<HashMap<TaskKind, Duration>>,
  cancel_after: Mutex<Option<(TaskKind, CancellationToken)>>,
}

impl RecordingTasks {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn fail_on(&self, task: TaskKind) {
    self.failing.lock().unwrap().insert(task);
  }

  pub fn succeed_on(&self, task: TaskKind) {
    self.failing.lock().unwrap().remove(&task);
  }

  /// Make `task` take `delay` before returning.
  pub fn delay_on(&self, task: TaskKind, delay: Duration) {
    self.delays.lock().unwrap().insert(task, delay);
  }

  /// Cancel `token` once `task` has completed.
  pub fn cancel_after(&self, task: TaskKind, token: CancellationToken) {
    *self.cancel_after.lock().unwrap() = Some((task, token));
  }

  pub fn count(&self, task: TaskKind) -> usize {
    self
      .invocations
      .lock()
      .unwrap()
      .iter()
      .filter(|(t, _)| *t == task)
      .count()
  }

  pub fn invoked(&self) -> Vec<TaskKind> {
    self
      .invocations
      .lock()
      .unwrap()
      .iter()
      .map(|(task, _)| *task)
      .collect()
  }

  pub fn input_of(&self, task: TaskKind) -> Option<StateBag> {
    self
      .invocations
      .lock()
      .unwrap()
      .iter()
      .find(|(t, _)| *t == task)
      .map(|(_, input)| input.clone())
  }
}

#[async_trait]
impl TaskRunner for RecordingTasks {
  async fn invoke(&self, task: TaskKind, input: StateBag) -> Result<StateBag, ProviderError> {
    self
      .invocations
      .lock()
      .unwrap()
      .push((task, input.clone()));

    let delay = self.delays.lock().unwrap().get(&task).copied();
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }

    if self.failing.lock().unwrap().contains(&task) {
      return Err(ProviderError::task(task.as_str(), "exit status 1"));
    }

    let mut output = input;
    if let Some(map) = output.as_object_mut() {
      map.insert(format!("{}_done", task.as_str()), json!(true));
    }
    if let Some((after, token)) = &*self.cancel_after.lock().unwrap() {
      if *after == task {
        token.cancel();
      }
    }
    Ok(output)
  }
}

pub fn params() -> AutomationParameters {
  serde_json::from_value(json!({
    "directory_id": "d-9067a1b2c3",
    "user_name": "image.builder",
    "bundle_id": "wsb-8wthbqzhx",
    "compute_type": "STANDARD",
    "security_group": "sg-0a1b2c3d",
    "image_name": "dev-base",
    "image_description": "Developer base image",
    "bundle_name": "dev-base-bundle",
  }))
  .unwrap()
}

pub fn policy() -> BuildPolicy {
  BuildPolicy::default()
}

/// Drain every event received so far.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<BuildEvent>) -> Vec<BuildEvent> {
  let mut events = Vec::new();
  while let Ok(event) = rx.try_recv() {
    events.push(event);
  }
  events
}
