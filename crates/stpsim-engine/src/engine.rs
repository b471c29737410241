//! Engine and callback-table traits.

use stpsim_types::{
    FdbFlushType, MacAddress, PortIndex, PortRole, StpVersion, Timestamp, TreeIndex, VlanId,
};

/// Engine construction parameters.
///
/// Seeds a fresh engine instance with the owning bridge's identity and the
/// dimensions of its state: ports are fixed for the bridge's lifetime, trees
/// for the session's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineParams {
    /// Identity of the owning bridge.
    pub mac: MacAddress,
    /// Number of ports on the owning bridge.
    pub port_count: usize,
    /// Number of spanning-tree instances (1 unless MSTP).
    pub tree_count: usize,
    /// Protocol version to run.
    pub version: StpVersion,
    /// Simulated time at which the session starts.
    pub timestamp: Timestamp,
}

/// Error type for engine construction failures.
///
/// All variants are fatal for the bridge's protocol session: the session is
/// simply never established and the bridge stays disabled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(StpVersion),

    #[error("invalid engine parameters: {0}")]
    InvalidParams(String),

    #[error("engine resources exhausted: {0}")]
    ResourceExhausted(String),
}

/// Hardware-control callback table invoked synchronously by the engine.
///
/// Implemented by the protocol adapter; the engine receives a `&mut dyn
/// BridgeControl` on every entry point and calls back into it zero or more
/// times before returning. The adapter's per-port/per-tree learning and
/// forwarding flags have no other writers.
pub trait BridgeControl {
    /// Enables or disables address learning for a port/tree pair.
    fn enable_learning(&mut self, port: PortIndex, tree: TreeIndex, enable: bool);

    /// Enables or disables frame forwarding for a port/tree pair.
    fn enable_forwarding(&mut self, port: PortIndex, tree: TreeIndex, enable: bool);

    /// Signals that learned address entries for the given scope must be
    /// discarded. The model records the signal; it does not keep an address
    /// table of its own.
    fn flush_fdb(&mut self, port: PortIndex, tree: TreeIndex, flush_type: FdbFlushType);

    /// Appends a diagnostic text fragment to the in-progress log line for
    /// the given scope. `flush` completes the line. `None` scopes address
    /// the bridge as a whole.
    fn debug_output(
        &mut self,
        port: Option<PortIndex>,
        tree: Option<TreeIndex>,
        fragment: &str,
        flush: bool,
    );
}

/// One bridge's spanning-tree computation, owned by the protocol adapter.
///
/// Destruction is `Drop`. All methods are called with the owning bridge's
/// protocol lock held; the read-only getters are queried by the adapter on
/// behalf of observers and must not mutate observable state.
pub trait StpEngine: Send {
    /// Protocol version this engine runs.
    fn version(&self) -> StpVersion;

    /// Number of spanning-tree instances.
    fn tree_count(&self) -> usize;

    /// Advances the computation to `timestamp`.
    fn tick(&mut self, ctl: &mut dyn BridgeControl, timestamp: Timestamp);

    /// Informs the engine that a port's physical link came up or went down.
    fn link_changed(
        &mut self,
        ctl: &mut dyn BridgeControl,
        port: PortIndex,
        connected: bool,
        timestamp: Timestamp,
    );

    /// Role currently assigned to a port in a tree.
    fn port_role(&self, port: PortIndex, tree: TreeIndex) -> PortRole;

    /// Whether a port is currently considered an operational edge port.
    fn port_oper_edge(&self, port: PortIndex) -> bool;

    /// Bridge priority for a tree.
    fn bridge_priority(&self, tree: TreeIndex) -> u16;

    /// Tree instance a VLAN maps to.
    fn tree_for_vlan(&self, vlan: VlanId) -> TreeIndex;
}

/// Constructs engine instances for bridges.
///
/// The factory is shared (one per simulation is typical) and must be usable
/// from whichever thread enables STP on a bridge. The engine may invoke
/// callbacks during `create` to establish initial port state; if `create`
/// fails, the session never existed and anything the callbacks wrote is
/// rolled back by the caller.
pub trait StpEngineFactory: Send + Sync {
    /// Builds a fresh engine seeded with `params`.
    fn create(
        &self,
        params: &EngineParams,
        ctl: &mut dyn BridgeControl,
    ) -> Result<Box<dyn StpEngine>, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::UnsupportedVersion(StpVersion::Mstp);
        assert_eq!(err.to_string(), "unsupported protocol version: mstp");

        let err = EngineError::InvalidParams("tree count must be at least 1".to_string());
        assert_eq!(
            err.to_string(),
            "invalid engine parameters: tree count must be at least 1"
        );
    }
}
