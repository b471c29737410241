//! Ports and port references.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use stpsim_types::{MacAddress, PortIndex, Side};

/// Non-owning reference to a port: the owning bridge's identity plus the
/// port's index within it.
///
/// Wires and engine callback contexts hold these instead of pointers into
/// the topology; they are validated against the container at use time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    /// MAC address of the owning bridge.
    pub bridge: MacAddress,
    /// Zero-based index of the port within the bridge.
    pub port: PortIndex,
}

impl PortRef {
    /// Creates a port reference.
    pub const fn new(bridge: MacAddress, port: PortIndex) -> Self {
        Self { bridge, port }
    }
}

/// A connection point on a bridge.
///
/// Ports are created with their bridge and destroyed with it; index and
/// placement never change. Link status is maintained by the topology
/// container, which calls `Bridge::notify_link_changed` after every wire
/// mutation touching the port.
#[derive(Debug)]
pub struct Port {
    index: PortIndex,
    side: Side,
    offset: f32,
    connected: AtomicBool,
}

impl Port {
    pub(crate) fn new(index: PortIndex, side: Side, offset: f32) -> Self {
        Self {
            index,
            side,
            offset,
            connected: AtomicBool::new(false),
        }
    }

    /// Zero-based index within the owning bridge.
    pub fn index(&self) -> PortIndex {
        self.index
    }

    /// Edge of the bridge the port sits on.
    pub fn side(&self) -> Side {
        self.side
    }

    /// Distance along the edge, in drawing units.
    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Whether the physical medium currently allows frame exchange: true
    /// only while a wire connects this port to a port on another bridge.
    pub fn mac_operational(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Updates link status; returns the previous value.
    pub(crate) fn set_connected(&self, connected: bool) -> bool {
        self.connected.swap(connected, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_port_starts_disconnected() {
        let port = Port::new(3, Side::Bottom, 75.0);
        assert_eq!(port.index(), 3);
        assert_eq!(port.side(), Side::Bottom);
        assert!(!port.mac_operational());
    }

    #[test]
    fn test_set_connected_returns_previous() {
        let port = Port::new(0, Side::Top, 25.0);
        assert!(!port.set_connected(true));
        assert!(port.mac_operational());
        assert!(port.set_connected(true));
        assert!(port.set_connected(false));
        assert!(!port.mac_operational());
    }
}
