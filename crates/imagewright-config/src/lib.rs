//! imagewright Config
//!
//! Serializable configuration types for imagewright: the automation parameters
//! that drive one image build, and the build policy that bounds its waits.
//!
//! Configuration can be loaded from:
//! - JSON files (via CLI with `imagewright run --config build.json`)
//! - stdin, when parameters are piped to `imagewright run`
//!
//! Both [`AutomationParameters`] and [`BuildPolicy`] are validated before the
//! orchestrator issues any remote call. Validation collects every violation
//! rather than stopping at the first one.

mod catalog;
mod enums;
mod error;
mod params;
mod policy;

pub use catalog::{BASE_BUNDLES, base_bundle_id};
pub use enums::{BuilderDisposition, ComputeType, OperatingSystem, Protocol, RunningMode};
pub use error::{ConfigError, Violation};
pub use params::AutomationParameters;
pub use policy::{BuildPolicy, ConfigureSteps};
