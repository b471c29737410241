//! Spanning-tree vocabulary exchanged with the protocol engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ParseError;

/// Spanning-tree protocol version a bridge runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StpVersion {
    /// Legacy 802.1D STP.
    LegacyStp,
    /// Rapid STP (802.1w).
    Rstp,
    /// Multiple STP (802.1s); the only version with more than one tree.
    Mstp,
}

impl StpVersion {
    /// Converts to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LegacyStp => "stp",
            Self::Rstp => "rstp",
            Self::Mstp => "mstp",
        }
    }

    /// Returns true if this version supports more than one tree.
    pub fn is_multi_tree(&self) -> bool {
        matches!(self, Self::Mstp)
    }
}

impl fmt::Display for StpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StpVersion {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stp" | "legacy" => Ok(Self::LegacyStp),
            "rstp" => Ok(Self::Rstp),
            "mstp" => Ok(Self::Mstp),
            _ => Err(ParseError::InvalidStpVersion(s.to_string())),
        }
    }
}

/// Per-port, per-tree role computed by the protocol engine.
///
/// The model stores and exposes these without reinterpreting them.
/// `Disabled` doubles as the documented default reported whenever STP is
/// disabled on the bridge or the bridge is powered off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortRole {
    #[default]
    Disabled,
    Alternate,
    Backup,
    Root,
    Designated,
    /// MSTP only: master port of an MST region boundary.
    Master,
}

impl PortRole {
    /// Converts to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Alternate => "alternate",
            Self::Backup => "backup",
            Self::Root => "root",
            Self::Designated => "designated",
            Self::Master => "master",
        }
    }

    /// Returns true if the role participates in the active topology.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Root | Self::Designated | Self::Master)
    }
}

impl fmt::Display for PortRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PortRole {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "disabled" => Ok(Self::Disabled),
            "alternate" => Ok(Self::Alternate),
            "backup" => Ok(Self::Backup),
            "root" => Ok(Self::Root),
            "designated" => Ok(Self::Designated),
            "master" => Ok(Self::Master),
            _ => Err(ParseError::InvalidPortRole(s.to_string())),
        }
    }
}

/// Scope of a forwarding-database flush requested by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FdbFlushType {
    /// Discard learned entries right away.
    Immediate,
    /// Age learned entries out on a shortened timer.
    RapidAgeing,
}

impl FdbFlushType {
    /// Converts to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::RapidAgeing => "rapid_ageing",
        }
    }
}

impl fmt::Display for FdbFlushType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
