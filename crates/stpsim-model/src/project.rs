//! Project: the topology container.
//!
//! Owns the bridges and wires, resolves port-to-port connectivity by
//! scanning wires, and propagates link-state changes into the affected
//! bridges after every wire mutation. All mutating operations take
//! `&mut self`: topology edits are confined to the single coordinating
//! thread that also issues ticks.

use tracing::{debug, info};

use stpsim_types::{MacAddress, MacAllocator, Point, Side, Timestamp};

use crate::bridge::Bridge;
use crate::port::PortRef;
use crate::wire::{Wire, WireEnd, WireId};

/// The topology container: owns bridges and wires in display order.
pub struct Project {
    bridges: Vec<Bridge>,
    wires: Vec<Wire>,
    macs: MacAllocator,
    next_wire_id: u64,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("bridges", &self.bridges.len())
            .field("wires", &self.wires.len())
            .field("next_wire_id", &self.next_wire_id)
            .finish()
    }
}

impl Project {
    /// Creates an empty project.
    pub fn new() -> Self {
        Self {
            bridges: Vec::new(),
            wires: Vec::new(),
            macs: MacAllocator::new(),
            next_wire_id: 0,
        }
    }

    // ------------------------------------------------------------------
    // Bridges
    // ------------------------------------------------------------------

    /// Adds a bridge with `port_count` default-placed ports and returns its
    /// newly allocated identity.
    pub fn add_bridge(&mut self, port_count: usize) -> MacAddress {
        let mac = self.macs.allocate();
        self.insert_bridge(Bridge::new(mac, port_count));
        mac
    }

    /// Adds a bridge with explicit port placements.
    pub fn add_bridge_with_placements(&mut self, placements: &[(Side, f32)]) -> MacAddress {
        let mac = self.macs.allocate();
        self.insert_bridge(Bridge::with_placements(mac, placements));
        mac
    }

    /// Inserts an externally constructed bridge (e.g. one returned by
    /// [`Project::remove_bridge`] being re-added by an undo). Panics if a
    /// bridge with the same identity is already owned.
    pub fn insert_bridge(&mut self, bridge: Bridge) {
        assert!(
            self.bridge(bridge.mac()).is_none(),
            "bridge {} is already owned by this project",
            bridge.mac()
        );
        self.macs.reserve(bridge.mac());
        info!(mac = %bridge.mac(), ports = bridge.ports().len(), "bridge added");
        self.bridges.push(bridge);
    }

    /// Looks a bridge up by identity.
    pub fn bridge(&self, mac: MacAddress) -> Option<&Bridge> {
        self.bridges.iter().find(|b| b.mac() == mac)
    }

    /// Mutable lookup, for geometry edits.
    pub fn bridge_mut(&mut self, mac: MacAddress) -> Option<&mut Bridge> {
        self.bridges.iter_mut().find(|b| b.mac() == mac)
    }

    /// All bridges, in display order.
    pub fn bridges(&self) -> &[Bridge] {
        &self.bridges
    }

    /// Detaches a bridge from the project and returns it.
    ///
    /// Wires referencing the bridge's ports are rewritten to dangle at the
    /// port's former connection-point location; ports at the far side of
    /// those wires see their link go down. An enabled protocol session is
    /// disabled first so the `stopping` notification fires while observers
    /// are still subscribed.
    ///
    /// Panics if the bridge is not owned by this project.
    pub fn remove_bridge(&mut self, mac: MacAddress, timestamp: Timestamp) -> Bridge {
        let index = self
            .bridges
            .iter()
            .position(|b| b.mac() == mac)
            .unwrap_or_else(|| panic!("bridge {} is not owned by this project", mac));

        if self.bridges[index].is_stp_enabled() {
            self.bridges[index].disable_stp(timestamp);
        }

        // Sever every wire end referencing this bridge, remembering both
        // sides so link state can be recomputed below.
        let mut severed: Vec<PortRef> = Vec::new();
        let mut far_ports: Vec<PortRef> = Vec::new();
        for wire in &mut self.wires {
            for end in 0..2 {
                let Some(port) = wire.end(end).attached_port() else {
                    continue;
                };
                if port.bridge != mac {
                    continue;
                }
                let at = self.bridges[index].port_connection_point(port.port);
                wire.set_end(end, WireEnd::Free(at));
                severed.push(port);
                if let Some(far) = wire.end(1 - end).attached_port() {
                    far_ports.push(far);
                }
            }
        }

        for port in severed {
            self.refresh_link(port, timestamp);
        }
        for port in far_ports {
            self.refresh_link(port, timestamp);
        }

        info!(mac = %mac, "bridge removed");
        self.bridges.remove(index)
    }

    // ------------------------------------------------------------------
    // Wires
    // ------------------------------------------------------------------

    /// Adds a wire with both ends dangling at the origin.
    pub fn add_wire(&mut self) -> WireId {
        let id = WireId(self.next_wire_id);
        self.next_wire_id += 1;
        self.wires.push(Wire::new(
            id,
            [
                WireEnd::Free(Point::default()),
                WireEnd::Free(Point::default()),
            ],
        ));
        debug!(%id, "wire added");
        id
    }

    /// Adds a wire and attaches both ends.
    pub fn add_wire_between(&mut self, a: PortRef, b: PortRef, timestamp: Timestamp) -> WireId {
        let id = self.add_wire();
        self.attach_wire_end(id, 0, a, timestamp);
        self.attach_wire_end(id, 1, b, timestamp);
        id
    }

    /// Re-inserts an externally held wire (e.g. one returned by
    /// [`Project::remove_wire`] being re-added by an undo), revalidating
    /// its endpoints and recomputing link state.
    pub fn insert_wire(&mut self, wire: Wire, timestamp: Timestamp) {
        assert!(
            self.wire(wire.id()).is_none(),
            "{} is already owned by this project",
            wire.id()
        );
        let attached: Vec<PortRef> = wire.ends().iter().filter_map(|e| e.attached_port()).collect();
        for port in &attached {
            self.validate_port(*port);
            assert!(
                self.find_wire_and_end(*port).is_none(),
                "port {} of bridge {} already has a wire",
                port.port,
                port.bridge
            );
        }
        if let [a, b] = attached[..] {
            assert!(
                a.bridge != b.bridge,
                "wire cannot loop back into bridge {}",
                a.bridge
            );
        }
        self.next_wire_id = self.next_wire_id.max(wire.id().0 + 1);
        self.wires.push(wire);
        for port in attached {
            self.refresh_link(port, timestamp);
        }
    }

    /// Looks a wire up by identity.
    pub fn wire(&self, id: WireId) -> Option<&Wire> {
        self.wires.iter().find(|w| w.id() == id)
    }

    /// All wires, in display order.
    pub fn wires(&self) -> &[Wire] {
        &self.wires
    }

    /// Attaches one end of a wire to a port, then recomputes link state for
    /// every port involved (the port gaining the wire, the port that end
    /// previously referenced, and the port at the opposite end).
    ///
    /// Panics on precondition violations: unknown wire or bridge, port
    /// index out of range, a port that already has a wire, or a self-loop
    /// back into the bridge the opposite end references. Attaching an end
    /// to the port it already references is a no-op.
    pub fn attach_wire_end(
        &mut self,
        id: WireId,
        end: usize,
        port: PortRef,
        timestamp: Timestamp,
    ) {
        self.validate_port(port);
        let wire = self
            .wires
            .iter()
            .find(|w| w.id() == id)
            .unwrap_or_else(|| panic!("{} is not owned by this project", id));

        if wire.end(end).attached_port() == Some(port) {
            return;
        }
        if let Some(opposite) = wire.end(1 - end).attached_port() {
            assert!(
                opposite.bridge != port.bridge,
                "wire cannot loop back into bridge {}",
                port.bridge
            );
        }
        assert!(
            self.find_wire_and_end(port).is_none(),
            "port {} of bridge {} already has a wire",
            port.port,
            port.bridge
        );

        let wire = self.wires.iter_mut().find(|w| w.id() == id).unwrap();
        let previous = wire.end(end).attached_port();
        let opposite = wire.end(1 - end).attached_port();
        wire.set_end(end, WireEnd::Attached(port));
        debug!(%id, end, port.port, bridge = %port.bridge, "wire end attached");

        if let Some(previous) = previous {
            self.refresh_link(previous, timestamp);
        }
        self.refresh_link(port, timestamp);
        if let Some(opposite) = opposite {
            self.refresh_link(opposite, timestamp);
        }
    }

    /// Detaches one end of a wire to a free point. A link that existed
    /// through this wire goes down on both sides. Detaching an already
    /// dangling end just moves its point.
    ///
    /// Panics if the wire is not owned by this project.
    pub fn detach_wire_end(&mut self, id: WireId, end: usize, at: Point, timestamp: Timestamp) {
        let wire = self
            .wires
            .iter_mut()
            .find(|w| w.id() == id)
            .unwrap_or_else(|| panic!("{} is not owned by this project", id));

        let previous = wire.end(end).attached_port();
        let opposite = wire.end(1 - end).attached_port();
        wire.set_end(end, WireEnd::Free(at));
        debug!(%id, end, "wire end detached");

        if let Some(previous) = previous {
            self.refresh_link(previous, timestamp);
        }
        if previous.is_some() {
            if let Some(opposite) = opposite {
                self.refresh_link(opposite, timestamp);
            }
        }
    }

    /// Detaches a wire from the project and returns it with its endpoints
    /// intact, so an editor can reinsert it. Ports it connected see their
    /// link go down.
    ///
    /// Panics if the wire is not owned by this project.
    pub fn remove_wire(&mut self, id: WireId, timestamp: Timestamp) -> Wire {
        let index = self
            .wires
            .iter()
            .position(|w| w.id() == id)
            .unwrap_or_else(|| panic!("{} is not owned by this project", id));
        let wire = self.wires.remove(index);
        for end in wire.ends() {
            if let Some(port) = end.attached_port() {
                self.refresh_link(port, timestamp);
            }
        }
        debug!(%id, "wire removed");
        wire
    }

    // ------------------------------------------------------------------
    // Connectivity queries
    // ------------------------------------------------------------------

    /// Finds the wire attached to `port` and which end references it.
    /// Linear scan; first match wins.
    pub fn find_wire_and_end(&self, port: PortRef) -> Option<(WireId, usize)> {
        for wire in &self.wires {
            for end in 0..2 {
                if wire.end(end).attached_port() == Some(port) {
                    return Some((wire.id(), end));
                }
            }
        }
        None
    }

    /// Finds the port at the opposite end of `tx_port`'s wire.
    ///
    /// `None` — whether because no wire is attached or because the opposite
    /// end dangles — means the physical medium does not allow frame
    /// exchange: link down, a normal outcome.
    pub fn find_connected_port(&self, tx_port: PortRef) -> Option<PortRef> {
        for wire in &self.wires {
            for end in 0..2 {
                if wire.end(end).attached_port() == Some(tx_port) {
                    return wire.end(1 - end).attached_port();
                }
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Driving
    // ------------------------------------------------------------------

    /// Advances every bridge's protocol computation to `timestamp`.
    pub fn tick(&self, timestamp: Timestamp) {
        for bridge in &self.bridges {
            bridge.tick(timestamp);
        }
    }

    fn refresh_link(&self, port: PortRef, timestamp: Timestamp) {
        let connected = self.find_connected_port(port).is_some();
        // The bridge may already have been detached in a removal flow.
        if let Some(bridge) = self.bridge(port.bridge) {
            bridge.notify_link_changed(port.port, connected, timestamp);
        }
    }

    fn validate_port(&self, port: PortRef) {
        let bridge = self
            .bridge(port.bridge)
            .unwrap_or_else(|| panic!("bridge {} is not owned by this project", port.bridge));
        assert!(
            port.port < bridge.ports().len(),
            "port index {} out of range on bridge {}",
            port.port,
            port.bridge
        );
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn two_bridges() -> (Project, MacAddress, MacAddress) {
        let mut project = Project::new();
        let a = project.add_bridge(4);
        let b = project.add_bridge(4);
        (project, a, b)
    }

    #[test]
    fn test_add_bridge_allocates_unique_macs() {
        let (project, a, b) = two_bridges();
        assert_ne!(a, b);
        assert_eq!(project.bridges().len(), 2);
        assert!(project.bridge(a).is_some());
        assert!(project.bridge(MacAddress::ZERO).is_none());
    }

    #[test]
    fn test_find_connected_port_round_trip() {
        let (mut project, a, b) = two_bridges();
        let p1 = PortRef::new(a, 0);
        let p2 = PortRef::new(b, 2);
        let wire = project.add_wire_between(p1, p2, 0);

        assert_eq!(project.find_connected_port(p1), Some(p2));
        assert_eq!(project.find_connected_port(p2), Some(p1));
        assert_eq!(project.find_wire_and_end(p1), Some((wire, 0)));
        assert_eq!(project.find_wire_and_end(p2), Some((wire, 1)));

        let removed = project.remove_wire(wire, 100);
        assert_eq!(removed.id(), wire);
        assert_eq!(project.find_connected_port(p1), None);
        assert_eq!(project.find_connected_port(p2), None);
    }

    #[test]
    fn test_dangling_end_means_no_connected_port() {
        let (mut project, a, _b) = two_bridges();
        let p1 = PortRef::new(a, 0);
        let wire = project.add_wire();
        project.attach_wire_end(wire, 0, p1, 0);

        assert_eq!(project.find_wire_and_end(p1), Some((wire, 0)));
        assert_eq!(project.find_connected_port(p1), None);
        assert!(!project.bridge(a).unwrap().port(0).mac_operational());
    }

    #[test]
    fn test_link_state_propagates_on_attach_and_detach() {
        let (mut project, a, b) = two_bridges();
        let p1 = PortRef::new(a, 1);
        let p2 = PortRef::new(b, 3);

        let wire = project.add_wire();
        project.attach_wire_end(wire, 0, p1, 0);
        assert!(!project.bridge(a).unwrap().port(1).mac_operational());

        project.attach_wire_end(wire, 1, p2, 10);
        assert!(project.bridge(a).unwrap().port(1).mac_operational());
        assert!(project.bridge(b).unwrap().port(3).mac_operational());

        project.detach_wire_end(wire, 0, Point::new(5.0, 5.0), 20);
        assert!(!project.bridge(a).unwrap().port(1).mac_operational());
        assert!(!project.bridge(b).unwrap().port(3).mac_operational());
    }

    #[test]
    fn test_attach_is_idempotent_for_same_port() {
        let (mut project, a, b) = two_bridges();
        let p1 = PortRef::new(a, 0);
        let p2 = PortRef::new(b, 0);
        let wire = project.add_wire_between(p1, p2, 0);
        // Re-attaching the same end to the same port must not trip the
        // occupancy check.
        project.attach_wire_end(wire, 0, p1, 10);
        assert_eq!(project.find_connected_port(p1), Some(p2));
    }

    #[test]
    #[should_panic(expected = "already has a wire")]
    fn test_attach_to_occupied_port_panics() {
        let (mut project, a, b) = two_bridges();
        let p1 = PortRef::new(a, 0);
        let p2 = PortRef::new(b, 0);
        project.add_wire_between(p1, p2, 0);

        let second = project.add_wire();
        project.attach_wire_end(second, 0, p1, 10);
    }

    #[test]
    #[should_panic(expected = "loop back")]
    fn test_self_loop_panics() {
        let (mut project, a, _b) = two_bridges();
        let wire = project.add_wire();
        project.attach_wire_end(wire, 0, PortRef::new(a, 0), 0);
        project.attach_wire_end(wire, 1, PortRef::new(a, 1), 0);
    }

    #[test]
    #[should_panic(expected = "not owned")]
    fn test_remove_unknown_wire_panics() {
        let mut project = Project::new();
        project.remove_wire(WireId(42), 0);
    }

    #[test]
    #[should_panic(expected = "not owned")]
    fn test_remove_unknown_bridge_panics() {
        let mut project = Project::new();
        project.remove_bridge(MacAddress::new([2, 0, 0, 0, 0, 9]), 0);
    }

    #[test]
    fn test_remove_bridge_detaches_wires_to_free_points() {
        let (mut project, a, b) = two_bridges();
        let p1 = PortRef::new(a, 0);
        let p2 = PortRef::new(b, 0);
        let wire = project.add_wire_between(p1, p2, 0);

        let removed = project.remove_bridge(a, 100);
        assert_eq!(removed.mac(), a);
        assert_eq!(project.bridges().len(), 1);

        // The wire survives with its severed end dangling where the port
        // used to be.
        let wire = project.wire(wire).unwrap();
        assert!(wire.end(0).is_free());
        assert_eq!(wire.end(1).attached_port(), Some(p2));
        assert_eq!(project.find_connected_port(p2), None);
        assert!(!project.bridge(b).unwrap().port(0).mac_operational());
    }

    #[test]
    fn test_reinsert_removed_wire() {
        let (mut project, a, b) = two_bridges();
        let p1 = PortRef::new(a, 0);
        let p2 = PortRef::new(b, 0);
        let id = project.add_wire_between(p1, p2, 0);

        let wire = project.remove_wire(id, 10);
        assert!(!project.bridge(a).unwrap().port(0).mac_operational());

        project.insert_wire(wire, 20);
        assert_eq!(project.find_connected_port(p1), Some(p2));
        assert!(project.bridge(a).unwrap().port(0).mac_operational());

        // Fresh wires keep getting fresh identities.
        let next = project.add_wire();
        assert_ne!(next, id);
    }

    #[test]
    fn test_queries_distinguish_ports_on_one_bridge() {
        let (mut project, a, b) = two_bridges();
        let w0 = project.add_wire_between(PortRef::new(a, 0), PortRef::new(b, 0), 0);
        let w1 = project.add_wire_between(PortRef::new(a, 1), PortRef::new(b, 1), 0);

        assert_eq!(project.find_wire_and_end(PortRef::new(a, 0)), Some((w0, 0)));
        assert_eq!(project.find_wire_and_end(PortRef::new(a, 1)), Some((w1, 0)));
        assert_eq!(project.find_wire_and_end(PortRef::new(a, 2)), None);
        assert_eq!(
            project.find_connected_port(PortRef::new(a, 1)),
            Some(PortRef::new(b, 1))
        );
    }
}
