//! Save/load of topology state.
//!
//! The config document captures exactly what reconstruction needs: bridge
//! identity and geometry, port placements, the powered flag, wire endpoints
//! (by bridge + port index or free coordinates), and the STP-enabled flag
//! with version and tree count. Loading replays wire attachment (so link
//! state is recomputed, not trusted from the file) and re-enables protocol
//! sessions through the supplied engine factory.
//!
//! Unlike the in-memory editing API, which panics on precondition
//! violations by its single trusted caller, file content is external input:
//! malformed topology is reported as [`PersistError::InvalidTopology`].

use std::collections::HashSet;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use stpsim_engine::{EngineError, StpEngineFactory};
use stpsim_types::{MacAddress, Point, PortIndex, Side, StpVersion, Timestamp};

use crate::bridge::Bridge;
use crate::port::PortRef;
use crate::project::Project;
use crate::wire::WireEnd;

/// Error type for save/load failures.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("invalid topology: {0}")]
    InvalidTopology(String),
}

/// Persisted protocol session settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StpConfig {
    pub version: StpVersion,
    pub tree_count: usize,
}

/// Persisted port placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortConfig {
    pub side: Side,
    pub offset: f32,
}

/// Persisted bridge state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub mac: MacAddress,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub powered: bool,
    pub ports: Vec<PortConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stp: Option<StpConfig>,
}

/// Persisted wire endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireEndConfig {
    Attached { bridge: MacAddress, port: PortIndex },
    Free { x: f32, y: f32 },
}

/// Persisted wire state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WireConfig {
    pub ends: [WireEndConfig; 2],
}

/// The whole persisted document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub bridges: Vec<BridgeConfig>,
    pub wires: Vec<WireConfig>,
}

impl Project {
    /// Captures the project as a config document.
    pub fn to_config(&self) -> ProjectConfig {
        let bridges = self
            .bridges()
            .iter()
            .map(|bridge| BridgeConfig {
                mac: bridge.mac(),
                x: bridge.left(),
                y: bridge.top(),
                width: bridge.width(),
                height: bridge.height(),
                powered: bridge.is_powered(),
                ports: bridge
                    .ports()
                    .iter()
                    .map(|port| PortConfig {
                        side: port.side(),
                        offset: port.offset(),
                    })
                    .collect(),
                stp: if bridge.is_stp_enabled() {
                    Some(StpConfig {
                        version: bridge.stp_version().expect("enabled bridge has a version"),
                        tree_count: bridge.tree_count(),
                    })
                } else {
                    None
                },
            })
            .collect();

        let wires = self
            .wires()
            .iter()
            .map(|wire| WireConfig {
                ends: [0, 1].map(|end| match wire.end(end) {
                    WireEnd::Attached(port) => WireEndConfig::Attached {
                        bridge: port.bridge,
                        port: port.port,
                    },
                    WireEnd::Free(at) => WireEndConfig::Free { x: at.x, y: at.y },
                }),
            })
            .collect();

        ProjectConfig { bridges, wires }
    }

    /// Reconstructs a project from a config document, re-enabling protocol
    /// sessions through `factory` seeded with `timestamp`.
    pub fn from_config(
        config: &ProjectConfig,
        factory: &dyn StpEngineFactory,
        timestamp: Timestamp,
    ) -> Result<Project, PersistError> {
        let mut project = Project::new();

        let mut macs = HashSet::new();
        for bridge_config in &config.bridges {
            if !macs.insert(bridge_config.mac) {
                return Err(PersistError::InvalidTopology(format!(
                    "duplicate bridge {}",
                    bridge_config.mac
                )));
            }
            if bridge_config.ports.is_empty() {
                return Err(PersistError::InvalidTopology(format!(
                    "bridge {} has no ports",
                    bridge_config.mac
                )));
            }
            let placements: Vec<(Side, f32)> = bridge_config
                .ports
                .iter()
                .map(|p| (p.side, p.offset))
                .collect();
            let mut bridge = Bridge::with_placements(bridge_config.mac, &placements);
            bridge.restore_geometry(
                bridge_config.x,
                bridge_config.y,
                bridge_config.width,
                bridge_config.height,
            );
            project.insert_bridge(bridge);
        }

        // Validate every wire before mutating, then replay attachments so
        // link state is recomputed rather than trusted.
        let mut used_ports = HashSet::new();
        for wire_config in &config.wires {
            let mut attached = Vec::new();
            for end in &wire_config.ends {
                if let WireEndConfig::Attached { bridge, port } = end {
                    let owner = project.bridge(*bridge).ok_or_else(|| {
                        PersistError::InvalidTopology(format!("wire references unknown bridge {}", bridge))
                    })?;
                    if *port >= owner.ports().len() {
                        return Err(PersistError::InvalidTopology(format!(
                            "wire references port {} of bridge {}, which has {} ports",
                            port,
                            bridge,
                            owner.ports().len()
                        )));
                    }
                    if !used_ports.insert((*bridge, *port)) {
                        return Err(PersistError::InvalidTopology(format!(
                            "port {} of bridge {} has more than one wire",
                            port, bridge
                        )));
                    }
                    attached.push(*bridge);
                }
            }
            if let [a, b] = attached[..] {
                if a == b {
                    return Err(PersistError::InvalidTopology(format!(
                        "wire loops back into bridge {}",
                        a
                    )));
                }
            }
        }

        for wire_config in &config.wires {
            let id = project.add_wire();
            for (end, end_config) in wire_config.ends.iter().enumerate() {
                match end_config {
                    WireEndConfig::Attached { bridge, port } => {
                        project.attach_wire_end(id, end, PortRef::new(*bridge, *port), timestamp);
                    }
                    WireEndConfig::Free { x, y } => {
                        project.detach_wire_end(id, end, Point::new(*x, *y), timestamp);
                    }
                }
            }
        }

        // Sessions come up last, seeing the replayed link state; power
        // state applies after so an unpowered bridge still restores its
        // session.
        for bridge_config in &config.bridges {
            if let Some(stp) = &bridge_config.stp {
                let bridge = project.bridge(bridge_config.mac).unwrap();
                bridge.enable_stp(factory, stp.version, stp.tree_count, timestamp)?;
            }
        }
        for bridge_config in &config.bridges {
            if !bridge_config.powered {
                project
                    .bridge(bridge_config.mac)
                    .unwrap()
                    .set_powered(false, timestamp);
            }
        }

        Ok(project)
    }
}

/// Serializes a project as pretty-printed JSON.
pub fn save_json<W: Write>(project: &Project, writer: W) -> Result<(), PersistError> {
    serde_json::to_writer_pretty(writer, &project.to_config())?;
    Ok(())
}

/// Deserializes a project from JSON, re-enabling protocol sessions through
/// `factory`.
pub fn load_json<R: Read>(
    reader: R,
    factory: &dyn StpEngineFactory,
    timestamp: Timestamp,
) -> Result<Project, PersistError> {
    let config: ProjectConfig = serde_json::from_reader(reader)?;
    Project::from_config(&config, factory, timestamp)
}
