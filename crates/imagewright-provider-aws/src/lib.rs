//! imagewright AWS Provider
//!
//! Implements the provider traits against Amazon WorkSpaces (desktops,
//! images, bundles) and AWS Lambda (configuration tasks).
//!
//! Credentials and region come from the standard AWS provider chain; the
//! region can be overridden through [`AwsSettings`].

mod lambda;
mod workspaces;

pub use lambda::{LambdaFunctions, LambdaTaskRunner};
pub use workspaces::WorkspacesProvisioner;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use serde::{Deserialize, Serialize};

/// Connection settings shared by both AWS clients.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsSettings {
  /// Region override; the provider chain decides when unset.
  pub region: Option<String>,
  /// Named profile from the shared config files.
  pub profile: Option<String>,
}

impl AwsSettings {
  /// Resolve an SDK configuration from these settings.
  pub async fn load(&self) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = &self.region {
      loader = loader.region(Region::new(region.clone()));
    }
    if let Some(profile) = &self.profile {
      loader = loader.profile_name(profile);
    }
    loader.load().await
  }
}

/// Build both providers from one SDK configuration.
pub fn connect(
  sdk: &SdkConfig,
  functions: LambdaFunctions,
) -> (WorkspacesProvisioner, LambdaTaskRunner) {
  (
    WorkspacesProvisioner::new(aws_sdk_workspaces::Client::new(sdk)),
    LambdaTaskRunner::new(aws_sdk_lambda::Client::new(sdk), functions),
  )
}
