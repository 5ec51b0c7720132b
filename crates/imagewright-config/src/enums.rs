use std::fmt;

use serde::{Deserialize, Serialize};

/// Hardware profile of a desktop or bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComputeType {
  #[serde(rename = "VALUE")]
  Value,
  #[serde(rename = "STANDARD")]
  Standard,
  #[serde(rename = "PERFORMANCE")]
  Performance,
  #[serde(rename = "POWER")]
  Power,
  #[serde(rename = "POWERPRO")]
  PowerPro,
  #[serde(rename = "GRAPHICS")]
  Graphics,
  #[serde(rename = "GRAPHICSPRO")]
  GraphicsPro,
  #[serde(rename = "GRAPHICS_G4DN")]
  GraphicsG4dn,
  #[serde(rename = "GRAPHICSPRO_G4DN")]
  GraphicsProG4dn,
  #[serde(rename = "GENERALPURPOSE_4XLARGE")]
  GeneralPurpose4xLarge,
  #[serde(rename = "GENERALPURPOSE_8XLARGE")]
  GeneralPurpose8xLarge,
}

impl ComputeType {
  /// Provider-facing name, identical to the serialized form.
  pub fn as_str(&self) -> &'static str {
    match self {
      ComputeType::Value => "VALUE",
      ComputeType::Standard => "STANDARD",
      ComputeType::Performance => "PERFORMANCE",
      ComputeType::Power => "POWER",
      ComputeType::PowerPro => "POWERPRO",
      ComputeType::Graphics => "GRAPHICS",
      ComputeType::GraphicsPro => "GRAPHICSPRO",
      ComputeType::GraphicsG4dn => "GRAPHICS_G4DN",
      ComputeType::GraphicsProG4dn => "GRAPHICSPRO_G4DN",
      ComputeType::GeneralPurpose4xLarge => "GENERALPURPOSE_4XLARGE",
      ComputeType::GeneralPurpose8xLarge => "GENERALPURPOSE_8XLARGE",
    }
  }
}

impl fmt::Display for ComputeType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Operating system of a public base bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatingSystem {
  #[serde(rename = "Windows10")]
  Windows10,
  #[serde(rename = "RHEL8")]
  Rhel8,
}

impl OperatingSystem {
  pub fn as_str(&self) -> &'static str {
    match self {
      OperatingSystem::Windows10 => "Windows10",
      OperatingSystem::Rhel8 => "RHEL8",
    }
  }
}

impl fmt::Display for OperatingSystem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Streaming protocol of the builder desktop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
  #[default]
  Pcoip,
  Wsp,
}

impl Protocol {
  pub fn as_str(&self) -> &'static str {
    match self {
      Protocol::Pcoip => "PCOIP",
      Protocol::Wsp => "WSP",
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunningMode {
  #[default]
  AutoStop,
  AlwaysOn,
  Manual,
}

impl RunningMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      RunningMode::AutoStop => "AUTO_STOP",
      RunningMode::AlwaysOn => "ALWAYS_ON",
      RunningMode::Manual => "MANUAL",
    }
  }
}

/// What happens to the builder desktop once the bundle exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuilderDisposition {
  /// Leave the builder running so it can be reused by a later build.
  #[default]
  Retain,
  /// Stop the builder but keep its volumes.
  Stop,
  /// Terminate the builder and discard its volumes.
  Terminate,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_compute_type_wire_names() {
    let json = serde_json::to_string(&ComputeType::GraphicsProG4dn).unwrap();
    assert_eq!(json, "\"GRAPHICSPRO_G4DN\"");

    let parsed: ComputeType = serde_json::from_str("\"GENERALPURPOSE_4XLARGE\"").unwrap();
    assert_eq!(parsed, ComputeType::GeneralPurpose4xLarge);
    assert_eq!(parsed.as_str(), "GENERALPURPOSE_4XLARGE");
  }

  #[test]
  fn test_unknown_compute_type_rejected() {
    let parsed: Result<ComputeType, _> = serde_json::from_str("\"HUGE\"");
    assert!(parsed.is_err());
  }

  #[test]
  fn test_defaults() {
    assert_eq!(Protocol::default(), Protocol::Pcoip);
    assert_eq!(RunningMode::default().as_str(), "AUTO_STOP");
    assert_eq!(BuilderDisposition::default(), BuilderDisposition::Retain);
  }
}
