//! Public base bundles the builder desktop can be launched from.

use crate::enums::{ComputeType, OperatingSystem};

/// Base bundle ids keyed by compute type and operating system.
pub const BASE_BUNDLES: &[(ComputeType, OperatingSystem, &str)] = &[
  (ComputeType::Value, OperatingSystem::Rhel8, "wsb-hflmxmbbz"),
  (ComputeType::Value, OperatingSystem::Windows10, "wsb-fb2xfp6r8"),
  (ComputeType::Standard, OperatingSystem::Rhel8, "wsb-8wthbqzhx"),
  (ComputeType::Standard, OperatingSystem::Windows10, "wsb-93xk71ss4"),
  (ComputeType::Performance, OperatingSystem::Rhel8, "wsb-5s0yn651c"),
  (ComputeType::Performance, OperatingSystem::Windows10, "wsb-gqbt42cw7"),
  (ComputeType::Power, OperatingSystem::Rhel8, "wsb-w8yg9jx6t"),
  (ComputeType::Power, OperatingSystem::Windows10, "wsb-g72p36ch9"),
];

/// Look up the public base bundle for a compute type and operating system.
pub fn base_bundle_id(compute_type: ComputeType, os: OperatingSystem) -> Option<&'static str> {
  BASE_BUNDLES
    .iter()
    .find(|(c, o, _)| *c == compute_type && *o == os)
    .map(|(_, _, id)| *id)
}
