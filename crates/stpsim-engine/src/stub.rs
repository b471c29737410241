//! Deterministic placeholder engine.
//!
//! `StubEngine` exists so the simulator driver and the test suites have an
//! engine to plug in without shipping a spanning-tree implementation: it
//! derives port state from link status alone and performs no topology
//! computation. A link-up port becomes `Designated` and starts learning
//! immediately; forwarding follows after a fixed forward delay of simulated
//! time. A link-down port drops back to `Disabled`, its learned addresses
//! are flushed, and both flags are cleared.
//!
//! Real protocol engines integrate by implementing [`StpEngine`] and
//! [`StpEngineFactory`]; nothing in the topology model depends on this
//! module.

use tracing::debug;

use crate::{BridgeControl, EngineError, EngineParams, StpEngine, StpEngineFactory};
use stpsim_types::{FdbFlushType, PortIndex, PortRole, StpVersion, Timestamp, TreeIndex, VlanId};

/// Simulated milliseconds between learning and forwarding on link-up.
pub const FORWARD_DELAY_MS: Timestamp = 15_000;

/// Default bridge priority reported for every tree.
pub const DEFAULT_BRIDGE_PRIORITY: u16 = 0x8000;

#[derive(Debug, Clone, Copy, Default)]
struct PortState {
    connected: bool,
    /// Set while the port is up; cleared once forwarding starts.
    learning_since: Option<Timestamp>,
    forwarding: bool,
}

/// Placeholder engine: port state follows link state, nothing else.
pub struct StubEngine {
    version: StpVersion,
    tree_count: usize,
    ports: Vec<PortState>,
}

impl StubEngine {
    fn new(params: &EngineParams, ctl: &mut dyn BridgeControl) -> Self {
        // Fresh session: everything down until link changes arrive.
        for port in 0..params.port_count {
            for tree in 0..params.tree_count {
                ctl.enable_learning(port, tree, false);
                ctl.enable_forwarding(port, tree, false);
            }
        }
        ctl.debug_output(
            None,
            None,
            &format!(
                "{} engine started: {} ports, {} trees",
                params.version, params.port_count, params.tree_count
            ),
            true,
        );
        debug!(
            mac = %params.mac,
            version = %params.version,
            ports = params.port_count,
            trees = params.tree_count,
            "stub engine created"
        );
        Self {
            version: params.version,
            tree_count: params.tree_count,
            ports: vec![PortState::default(); params.port_count],
        }
    }
}

impl StpEngine for StubEngine {
    fn version(&self) -> StpVersion {
        self.version
    }

    fn tree_count(&self) -> usize {
        self.tree_count
    }

    fn tick(&mut self, ctl: &mut dyn BridgeControl, timestamp: Timestamp) {
        for port in 0..self.ports.len() {
            let due = match self.ports[port].learning_since {
                Some(since) => timestamp.saturating_sub(since) >= FORWARD_DELAY_MS,
                None => false,
            };
            if due {
                self.ports[port].learning_since = None;
                self.ports[port].forwarding = true;
                for tree in 0..self.tree_count {
                    ctl.enable_forwarding(port, tree, true);
                }
                ctl.debug_output(Some(port), Some(0), "learning -> ", false);
                ctl.debug_output(Some(port), Some(0), "forwarding", true);
            }
        }
    }

    fn link_changed(
        &mut self,
        ctl: &mut dyn BridgeControl,
        port: PortIndex,
        connected: bool,
        timestamp: Timestamp,
    ) {
        let state = &mut self.ports[port];
        if state.connected == connected {
            return;
        }
        state.connected = connected;

        if connected {
            state.learning_since = Some(timestamp);
            state.forwarding = false;
            for tree in 0..self.tree_count {
                ctl.enable_learning(port, tree, true);
            }
            ctl.debug_output(Some(port), Some(0), "link up, ", false);
            ctl.debug_output(Some(port), Some(0), "learning", true);
        } else {
            let was_forwarding = state.forwarding;
            state.learning_since = None;
            state.forwarding = false;
            for tree in 0..self.tree_count {
                ctl.enable_learning(port, tree, false);
                ctl.enable_forwarding(port, tree, false);
                if was_forwarding {
                    ctl.flush_fdb(port, tree, FdbFlushType::Immediate);
                }
            }
            ctl.debug_output(Some(port), Some(0), "link down", true);
        }
    }

    fn port_role(&self, port: PortIndex, tree: TreeIndex) -> PortRole {
        assert!(tree < self.tree_count, "tree index {} out of range", tree);
        if self.ports[port].connected {
            PortRole::Designated
        } else {
            PortRole::Disabled
        }
    }

    fn port_oper_edge(&self, port: PortIndex) -> bool {
        let _ = &self.ports[port];
        false
    }

    fn bridge_priority(&self, tree: TreeIndex) -> u16 {
        assert!(tree < self.tree_count, "tree index {} out of range", tree);
        DEFAULT_BRIDGE_PRIORITY
    }

    fn tree_for_vlan(&self, _vlan: VlanId) -> TreeIndex {
        // No VLAN-to-instance table is configured on the stub; everything
        // maps to the first tree, as an unconfigured MSTP bridge would.
        0
    }
}

/// Factory for [`StubEngine`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StubEngineFactory;

impl StpEngineFactory for StubEngineFactory {
    fn create(
        &self,
        params: &EngineParams,
        ctl: &mut dyn BridgeControl,
    ) -> Result<Box<dyn StpEngine>, EngineError> {
        if params.port_count == 0 {
            return Err(EngineError::InvalidParams(
                "port count must be at least 1".to_string(),
            ));
        }
        if params.tree_count == 0 {
            return Err(EngineError::InvalidParams(
                "tree count must be at least 1".to_string(),
            ));
        }
        if params.tree_count > 1 && !params.version.is_multi_tree() {
            return Err(EngineError::InvalidParams(format!(
                "{} supports a single tree, {} requested",
                params.version, params.tree_count
            )));
        }
        Ok(Box::new(StubEngine::new(params, ctl)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use stpsim_types::MacAddress;

    /// Records every callback invocation in order.
    #[derive(Default)]
    struct RecordingControl {
        learning: Vec<(PortIndex, TreeIndex, bool)>,
        forwarding: Vec<(PortIndex, TreeIndex, bool)>,
        flushes: Vec<(PortIndex, TreeIndex, FdbFlushType)>,
        lines: Vec<String>,
        current: String,
    }

    impl BridgeControl for RecordingControl {
        fn enable_learning(&mut self, port: PortIndex, tree: TreeIndex, enable: bool) {
            self.learning.push((port, tree, enable));
        }

        fn enable_forwarding(&mut self, port: PortIndex, tree: TreeIndex, enable: bool) {
            self.forwarding.push((port, tree, enable));
        }

        fn flush_fdb(&mut self, port: PortIndex, tree: TreeIndex, flush_type: FdbFlushType) {
            self.flushes.push((port, tree, flush_type));
        }

        fn debug_output(
            &mut self,
            _port: Option<PortIndex>,
            _tree: Option<TreeIndex>,
            fragment: &str,
            flush: bool,
        ) {
            self.current.push_str(fragment);
            if flush {
                self.lines.push(std::mem::take(&mut self.current));
            }
        }
    }

    fn params(port_count: usize, tree_count: usize, version: StpVersion) -> EngineParams {
        EngineParams {
            mac: MacAddress::new([0x02, 0, 0, 0, 0, 1]),
            port_count,
            tree_count,
            version,
            timestamp: 0,
        }
    }

    fn create(port_count: usize) -> (Box<dyn StpEngine>, RecordingControl) {
        let mut ctl = RecordingControl::default();
        let engine = StubEngineFactory
            .create(&params(port_count, 1, StpVersion::Rstp), &mut ctl)
            .unwrap();
        (engine, ctl)
    }

    #[test]
    fn test_create_clears_all_flags() {
        let (_engine, ctl) = create(3);
        assert_eq!(ctl.learning.len(), 3);
        assert_eq!(ctl.forwarding.len(), 3);
        assert!(ctl.learning.iter().all(|&(_, _, enable)| !enable));
        assert!(ctl.forwarding.iter().all(|&(_, _, enable)| !enable));
        assert_eq!(ctl.lines, vec!["rstp engine started: 3 ports, 1 trees"]);
    }

    #[test]
    fn test_rejects_zero_trees() {
        let mut ctl = RecordingControl::default();
        let result = StubEngineFactory.create(&params(2, 0, StpVersion::Rstp), &mut ctl);
        assert!(matches!(result, Err(EngineError::InvalidParams(_))));
    }

    #[test]
    fn test_rejects_multi_tree_rstp() {
        let mut ctl = RecordingControl::default();
        let result = StubEngineFactory.create(&params(2, 4, StpVersion::Rstp), &mut ctl);
        assert!(matches!(result, Err(EngineError::InvalidParams(_))));
    }

    #[test]
    fn test_accepts_multi_tree_mstp() {
        let mut ctl = RecordingControl::default();
        let engine = StubEngineFactory
            .create(&params(2, 4, StpVersion::Mstp), &mut ctl)
            .unwrap();
        assert_eq!(engine.tree_count(), 4);
    }

    #[test]
    fn test_link_up_starts_learning() {
        let (mut engine, mut ctl) = create(2);
        engine.link_changed(&mut ctl, 1, true, 1_000);

        assert_eq!(engine.port_role(1, 0), PortRole::Designated);
        assert_eq!(engine.port_role(0, 0), PortRole::Disabled);
        assert_eq!(*ctl.learning.last().unwrap(), (1, 0, true));
        assert_eq!(ctl.lines.last().unwrap(), "link up, learning");
    }

    #[test]
    fn test_forward_delay_elapses_on_tick() {
        let (mut engine, mut ctl) = create(1);
        engine.link_changed(&mut ctl, 0, true, 1_000);

        // Not yet due.
        engine.tick(&mut ctl, 1_000 + FORWARD_DELAY_MS - 1);
        assert!(ctl.forwarding.iter().all(|&(_, _, enable)| !enable));

        engine.tick(&mut ctl, 1_000 + FORWARD_DELAY_MS);
        assert_eq!(*ctl.forwarding.last().unwrap(), (0, 0, true));
        assert_eq!(ctl.lines.last().unwrap(), "learning -> forwarding");

        // Idempotent: a later tick does not re-enable.
        let forwarding_count = ctl.forwarding.len();
        engine.tick(&mut ctl, 1_000 + 2 * FORWARD_DELAY_MS);
        assert_eq!(ctl.forwarding.len(), forwarding_count);
    }

    #[test]
    fn test_link_down_flushes_forwarding_port() {
        let (mut engine, mut ctl) = create(1);
        engine.link_changed(&mut ctl, 0, true, 0);
        engine.tick(&mut ctl, FORWARD_DELAY_MS);
        engine.link_changed(&mut ctl, 0, false, FORWARD_DELAY_MS + 5_000);

        assert_eq!(engine.port_role(0, 0), PortRole::Disabled);
        assert_eq!(ctl.flushes, vec![(0, 0, FdbFlushType::Immediate)]);
        assert_eq!(*ctl.learning.last().unwrap(), (0, 0, false));
        assert_eq!(*ctl.forwarding.last().unwrap(), (0, 0, false));
    }

    #[test]
    fn test_link_down_before_forwarding_does_not_flush() {
        let (mut engine, mut ctl) = create(1);
        engine.link_changed(&mut ctl, 0, true, 0);
        engine.link_changed(&mut ctl, 0, false, 1_000);
        assert!(ctl.flushes.is_empty());
    }

    #[test]
    fn test_redundant_link_change_is_ignored() {
        let (mut engine, mut ctl) = create(1);
        engine.link_changed(&mut ctl, 0, true, 0);
        let lines = ctl.lines.len();
        engine.link_changed(&mut ctl, 0, true, 500);
        assert_eq!(ctl.lines.len(), lines);
    }

    #[test]
    fn test_defaults() {
        let (engine, _ctl) = create(2);
        assert_eq!(engine.bridge_priority(0), DEFAULT_BRIDGE_PRIORITY);
        assert_eq!(engine.tree_for_vlan(100), 0);
        assert!(!engine.port_oper_edge(0));
        assert_eq!(engine.version(), StpVersion::Rstp);
    }
}
