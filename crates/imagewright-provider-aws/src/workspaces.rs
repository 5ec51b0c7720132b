//! Amazon WorkSpaces backed desktop provisioner.

use async_trait::async_trait;
use aws_sdk_workspaces::Client;
use aws_sdk_workspaces::error::DisplayErrorContext;
use aws_sdk_workspaces::types::{
  Compute, ComputeType, FailedWorkspaceChangeRequest, Protocol, RootStorage, RunningMode,
  StartRequest, StopRequest, TerminateRequest, UserStorage, Workspace, WorkspaceImage,
  WorkspaceProperties, WorkspaceRequest,
};
use imagewright_provider::{
  BundleId, BundleRequest, DesktopId, DesktopProvisioner, DesktopRequest, DesktopStatus, ImageId,
  ImageRequest, ImageStatus, ProviderError,
};
use tracing::{debug, instrument};

/// Provisions builder desktops, images and bundles through the WorkSpaces API.
#[derive(Debug, Clone)]
pub struct WorkspacesProvisioner {
  client: Client,
}

impl WorkspacesProvisioner {
  pub fn new(client: Client) -> Self {
    Self { client }
  }
}

fn sdk_error<E>(operation: &'static str) -> impl FnOnce(E) -> ProviderError
where
  E: std::error::Error,
{
  move |e| ProviderError::remote(operation, DisplayErrorContext(e).to_string())
}

fn gib(value: u32) -> i32 {
  i32::try_from(value).unwrap_or(i32::MAX)
}

fn workspace_properties(request: &DesktopRequest) -> WorkspaceProperties {
  WorkspaceProperties::builder()
    .running_mode(RunningMode::from(request.running_mode.as_str()))
    .compute_type_name(Compute::from(request.compute_type.as_str()))
    .protocols(Protocol::from(request.protocol.as_str()))
    .root_volume_size_gib(gib(request.root_volume_gib))
    .user_volume_size_gib(gib(request.user_volume_gib))
    .build()
}

fn desktop_status(workspace: &Workspace) -> Option<DesktopStatus> {
  Some(DesktopStatus {
    id: workspace.workspace_id()?.to_string(),
    state: workspace.state()?.as_str().into(),
  })
}

fn image_status(image: &WorkspaceImage) -> Option<ImageStatus> {
  Some(ImageStatus {
    id: image.image_id()?.to_string(),
    state: image.state()?.as_str().into(),
  })
}

/// Turn per-desktop failures of a batch call into one error.
fn check_batch(
  operation: &'static str,
  failed: &[FailedWorkspaceChangeRequest],
) -> Result<(), ProviderError> {
  if failed.is_empty() {
    return Ok(());
  }

  let message = failed
    .iter()
    .map(|f| {
      format!(
        "{}: {} {}",
        f.workspace_id().unwrap_or("?"),
        f.error_code().unwrap_or("unknown"),
        f.error_message().unwrap_or_default()
      )
    })
    .collect::<Vec<_>>()
    .join("; ");
  Err(ProviderError::remote(operation, message))
}

#[async_trait]
impl DesktopProvisioner for WorkspacesProvisioner {
  #[instrument(skip(self, request), fields(directory_id = %request.directory_id, user_name = %request.user_name))]
  async fn create_desktop(&self, request: &DesktopRequest) -> Result<DesktopId, ProviderError> {
    let workspace = WorkspaceRequest::builder()
      .directory_id(&request.directory_id)
      .user_name(&request.user_name)
      .bundle_id(&request.bundle_id)
      .workspace_properties(workspace_properties(request))
      .build()
      .map_err(sdk_error("CreateWorkspaces"))?;

    let output = self
      .client
      .create_workspaces()
      .workspaces(workspace)
      .send()
      .await
      .map_err(sdk_error("CreateWorkspaces"))?;

    if let Some(failed) = output.failed_requests().first() {
      return Err(ProviderError::remote(
        "CreateWorkspaces",
        format!(
          "{} {}",
          failed.error_code().unwrap_or("unknown"),
          failed.error_message().unwrap_or_default()
        ),
      ));
    }

    output
      .pending_requests()
      .first()
      .and_then(|w| w.workspace_id())
      .map(str::to_string)
      .ok_or_else(|| {
        ProviderError::invalid_response("CreateWorkspaces", "no pending workspace returned")
      })
  }

  async fn describe_desktops(
    &self,
    ids: &[DesktopId],
  ) -> Result<Vec<DesktopStatus>, ProviderError> {
    let output = self
      .client
      .describe_workspaces()
      .set_workspace_ids(Some(ids.to_vec()))
      .send()
      .await
      .map_err(sdk_error("DescribeWorkspaces"))?;

    let statuses: Vec<DesktopStatus> = output
      .workspaces()
      .iter()
      .filter_map(desktop_status)
      .collect();
    debug!(
      requested = ids.len(),
      returned = statuses.len(),
      "described workspaces"
    );
    Ok(statuses)
  }

  async fn start_desktops(&self, ids: &[DesktopId]) -> Result<(), ProviderError> {
    let requests = ids
      .iter()
      .map(|id| StartRequest::builder().workspace_id(id).build())
      .collect();
    let output = self
      .client
      .start_workspaces()
      .set_start_workspace_requests(Some(requests))
      .send()
      .await
      .map_err(sdk_error("StartWorkspaces"))?;
    check_batch("StartWorkspaces", output.failed_requests())
  }

  async fn stop_desktops(&self, ids: &[DesktopId]) -> Result<(), ProviderError> {
    let requests = ids
      .iter()
      .map(|id| StopRequest::builder().workspace_id(id).build())
      .collect();
    let output = self
      .client
      .stop_workspaces()
      .set_stop_workspace_requests(Some(requests))
      .send()
      .await
      .map_err(sdk_error("StopWorkspaces"))?;
    check_batch("StopWorkspaces", output.failed_requests())
  }

  async fn terminate_desktops(&self, ids: &[DesktopId]) -> Result<(), ProviderError> {
    let requests = ids
      .iter()
      .map(|id| TerminateRequest::builder().workspace_id(id).build())
      .collect::<Result<Vec<_>, _>>()
      .map_err(sdk_error("TerminateWorkspaces"))?;
    let output = self
      .client
      .terminate_workspaces()
      .set_terminate_workspace_requests(Some(requests))
      .send()
      .await
      .map_err(sdk_error("TerminateWorkspaces"))?;
    check_batch("TerminateWorkspaces", output.failed_requests())
  }

  #[instrument(skip(self, request), fields(name = %request.name, desktop_id = %request.desktop_id))]
  async fn create_image(&self, request: &ImageRequest) -> Result<ImageId, ProviderError> {
    let output = self
      .client
      .create_workspace_image()
      .name(&request.name)
      .description(&request.description)
      .workspace_id(&request.desktop_id)
      .send()
      .await
      .map_err(sdk_error("CreateWorkspaceImage"))?;

    output
      .image_id()
      .map(str::to_string)
      .ok_or_else(|| {
        ProviderError::invalid_response("CreateWorkspaceImage", "no image id returned")
      })
  }

  async fn describe_images(&self, ids: &[ImageId]) -> Result<Vec<ImageStatus>, ProviderError> {
    let output = self
      .client
      .describe_workspace_images()
      .set_image_ids(Some(ids.to_vec()))
      .send()
      .await
      .map_err(sdk_error("DescribeWorkspaceImages"))?;

    Ok(output.images().iter().filter_map(image_status).collect())
  }

  #[instrument(skip(self, request), fields(name = %request.name, image_id = %request.image_id))]
  async fn create_bundle(&self, request: &BundleRequest) -> Result<BundleId, ProviderError> {
    let root = RootStorage::builder()
      .capacity(request.root_capacity_gib.to_string())
      .build()
      .map_err(sdk_error("CreateWorkspaceBundle"))?;
    let user = UserStorage::builder()
      .capacity(request.user_capacity_gib.to_string())
      .build()
      .map_err(sdk_error("CreateWorkspaceBundle"))?;
    let compute = ComputeType::builder()
      .name(Compute::from(request.compute_type.as_str()))
      .build();

    let output = self
      .client
      .create_workspace_bundle()
      .bundle_name(&request.name)
      .bundle_description(&request.description)
      .image_id(&request.image_id)
      .compute_type(compute)
      .root_storage(root)
      .user_storage(user)
      .send()
      .await
      .map_err(sdk_error("CreateWorkspaceBundle"))?;

    output
      .workspace_bundle()
      .and_then(|b| b.bundle_id())
      .map(str::to_string)
      .ok_or_else(|| {
        ProviderError::invalid_response("CreateWorkspaceBundle", "no bundle id returned")
      })
  }
}

#[cfg(test)]
mod tests {
  use aws_sdk_workspaces::types::{WorkspaceImageState, WorkspaceState};
  use imagewright_config::{ComputeType as Size, Protocol as Streaming, RunningMode as Mode};
  use imagewright_provider::{DesktopState, ImageState};

  use super::*;

  fn request() -> DesktopRequest {
    DesktopRequest {
      directory_id: "d-9067a1b2c3".to_string(),
      user_name: "builder".to_string(),
      bundle_id: "wsb-8wthbqzhx".to_string(),
      compute_type: Size::Performance,
      protocol: Streaming::Wsp,
      running_mode: Mode::AlwaysOn,
      root_volume_gib: 100,
      user_volume_gib: 50,
    }
  }

  #[test]
  fn test_workspace_properties_mapping() {
    let props = workspace_properties(&request());

    assert_eq!(props.compute_type_name(), Some(&Compute::Performance));
    assert_eq!(props.running_mode(), Some(&RunningMode::AlwaysOn));
    assert_eq!(props.protocols(), &[Protocol::Wsp]);
    assert_eq!(props.root_volume_size_gib(), Some(100));
    assert_eq!(props.user_volume_size_gib(), Some(50));
  }

  #[test]
  fn test_desktop_status_from_workspace() {
    let workspace = Workspace::builder()
      .workspace_id("ws-abc123")
      .state(WorkspaceState::Stopped)
      .build();

    let status = desktop_status(&workspace).unwrap();
    assert_eq!(status.id, "ws-abc123");
    assert_eq!(status.state, DesktopState::Stopped);
  }

  #[test]
  fn test_workspace_without_state_is_skipped() {
    let workspace = Workspace::builder().workspace_id("ws-abc123").build();
    assert!(desktop_status(&workspace).is_none());
  }

  #[test]
  fn test_image_status_from_image() {
    let image = WorkspaceImage::builder()
      .image_id("wsi-1")
      .state(WorkspaceImageState::Error)
      .build();

    let status = image_status(&image).unwrap();
    assert_eq!(status.state, ImageState::Error);
  }

  #[test]
  fn test_batch_failures_become_one_error() {
    let failed = vec![
      FailedWorkspaceChangeRequest::builder()
        .workspace_id("ws-1")
        .error_code("InvalidResourceState.NotStopped")
        .error_message("not stopped")
        .build(),
    ];

    let err = check_batch("StartWorkspaces", &failed).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("StartWorkspaces"));
    assert!(message.contains("ws-1: InvalidResourceState.NotStopped"));
    assert!(check_batch("StartWorkspaces", &[]).is_ok());
  }
}
