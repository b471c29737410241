//! Bridge: the unit of spanning-tree computation.
//!
//! A bridge aggregates a fixed set of ports, an optional protocol-engine
//! session, and a log of diagnostic lines. All protocol state lives behind
//! one mutex; see the crate docs for the locking discipline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::{debug, info};

use stpsim_engine::{BridgeControl, EngineError, EngineParams, StpEngine, StpEngineFactory};
use stpsim_types::{
    FdbFlushType, MacAddress, Point, PortIndex, PortRole, Side, StpVersion, Timestamp, TreeIndex,
    VlanId,
};

use crate::events::{BridgeChannels, Channel, LogLineEvent};
use crate::log::{BridgeLog, BridgeLogLine};
use crate::port::Port;

const DEFAULT_BRIDGE_HEIGHT: f32 = 120.0;
const MIN_BRIDGE_WIDTH: f32 = 250.0;
const PORT_SPACING: f32 = 50.0;

/// Bridge priority reported for every tree while STP is disabled.
pub const DEFAULT_BRIDGE_PRIORITY: u16 = 0x8000;

#[derive(Debug, Clone, Copy, Default)]
struct PortTreeFlag {
    learning: bool,
    forwarding: bool,
}

/// Dense port x tree grid of the learning/forwarding flags. Written only by
/// the engine callbacks.
struct PortTreeFlags {
    port_count: usize,
    tree_count: usize,
    flags: Vec<PortTreeFlag>,
}

impl PortTreeFlags {
    fn new(port_count: usize, tree_count: usize) -> Self {
        Self {
            port_count,
            tree_count,
            flags: vec![PortTreeFlag::default(); port_count * tree_count],
        }
    }

    fn idx(&self, port: PortIndex, tree: TreeIndex) -> usize {
        assert!(port < self.port_count, "port index {} out of range", port);
        assert!(tree < self.tree_count, "tree index {} out of range", tree);
        port * self.tree_count + tree
    }

    fn get(&self, port: PortIndex, tree: TreeIndex) -> PortTreeFlag {
        self.flags[self.idx(port, tree)]
    }

    fn get_mut(&mut self, port: PortIndex, tree: TreeIndex) -> &mut PortTreeFlag {
        let idx = self.idx(port, tree);
        &mut self.flags[idx]
    }
}

/// A live protocol session: the engine plus the state its callbacks write.
struct EngineSession {
    engine: Box<dyn StpEngine>,
    flags: PortTreeFlags,
}

/// Enabled/disabled as a tagged variant, so engine-only operations cannot
/// be expressed on a disabled bridge.
enum StpState {
    Disabled,
    Enabled(EngineSession),
}

/// Everything the per-bridge protocol lock covers.
struct StpCell {
    stp: StpState,
    log: BridgeLog,
}

/// The callback view handed to the engine. It borrows the cell's interior,
/// so callbacks run with the protocol lock already held and cannot acquire
/// it again. Completed log lines are queued for emission after the lock is
/// released.
struct CellControl<'a> {
    flags: &'a mut PortTreeFlags,
    log: &'a mut BridgeLog,
    completed: &'a mut Vec<BridgeLogLine>,
}

impl BridgeControl for CellControl<'_> {
    fn enable_learning(&mut self, port: PortIndex, tree: TreeIndex, enable: bool) {
        self.flags.get_mut(port, tree).learning = enable;
    }

    fn enable_forwarding(&mut self, port: PortIndex, tree: TreeIndex, enable: bool) {
        self.flags.get_mut(port, tree).forwarding = enable;
    }

    fn flush_fdb(&mut self, port: PortIndex, tree: TreeIndex, flush_type: FdbFlushType) {
        // No address table is modeled; the record in the log is the signal
        // consumers subscribe to.
        self.log.push_line(
            format!("fdb flush ({})", flush_type),
            Some(port),
            Some(tree),
            self.completed,
        );
    }

    fn debug_output(
        &mut self,
        port: Option<PortIndex>,
        tree: Option<TreeIndex>,
        fragment: &str,
        flush: bool,
    ) {
        self.log
            .append_fragment(port, tree, fragment, flush, self.completed);
    }
}

/// A simulated network switch participating in the spanning-tree protocol.
pub struct Bridge {
    mac: MacAddress,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    ports: Vec<Port>,
    powered: AtomicBool,
    cell: Mutex<StpCell>,
    channels: BridgeChannels,
}

impl Bridge {
    /// Creates a bridge with `port_count` ports spaced evenly along the
    /// bottom edge.
    pub fn new(mac: MacAddress, port_count: usize) -> Self {
        assert!(port_count > 0, "a bridge needs at least one port");
        let placements: Vec<(Side, f32)> = (0..port_count)
            .map(|i| (Side::Bottom, PORT_SPACING * (i as f32 + 1.0)))
            .collect();
        Self::with_placements(mac, &placements)
    }

    /// Creates a bridge with explicit port placements.
    pub fn with_placements(mac: MacAddress, placements: &[(Side, f32)]) -> Self {
        assert!(!placements.is_empty(), "a bridge needs at least one port");
        let ports = placements
            .iter()
            .enumerate()
            .map(|(index, &(side, offset))| Port::new(index, side, offset))
            .collect();
        let width = MIN_BRIDGE_WIDTH.max(PORT_SPACING * (placements.len() as f32 + 1.0));
        Self {
            mac,
            x: 0.0,
            y: 0.0,
            width,
            height: DEFAULT_BRIDGE_HEIGHT,
            ports,
            powered: AtomicBool::new(true),
            cell: Mutex::new(StpCell {
                stp: StpState::Disabled,
                log: BridgeLog::new(),
            }),
            channels: BridgeChannels::new(),
        }
    }

    /// Bridge identity, immutable after construction.
    pub fn mac(&self) -> MacAddress {
        self.mac
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    /// Moves the bridge; presentation only.
    pub fn set_location(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
        self.channels.invalidate.emit(&self.mac);
    }

    pub(crate) fn restore_geometry(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.x = x;
        self.y = y;
        self.width = width;
        self.height = height;
    }

    /// The bridge's ports, in index order.
    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    /// One port; panics if `port` is out of range.
    pub fn port(&self, port: PortIndex) -> &Port {
        &self.ports[port]
    }

    /// Where a port's wire attaches, in drawing coordinates.
    pub fn port_connection_point(&self, port: PortIndex) -> Point {
        let p = &self.ports[port];
        match p.side() {
            Side::Left => Point::new(self.x, self.y + p.offset()),
            Side::Right => Point::new(self.x + self.width, self.y + p.offset()),
            Side::Top => Point::new(self.x + p.offset(), self.y),
            Side::Bottom => Point::new(self.x + p.offset(), self.y + self.height),
        }
    }

    /// Whether the bridge is powered. An unpowered bridge is inert: ticks
    /// are no-ops and every per-port/per-tree query reports its default.
    pub fn is_powered(&self) -> bool {
        self.powered.load(Ordering::Acquire)
    }

    /// Powers the bridge on or off. Powering off does not tear down an
    /// enabled protocol session; powering back on replays current link
    /// state to the engine so it catches up with edits it missed.
    pub fn set_powered(&self, powered: bool, timestamp: Timestamp) {
        let was = self.powered.swap(powered, Ordering::AcqRel);
        if was == powered {
            return;
        }
        info!(mac = %self.mac, powered, "bridge power changed");
        if powered {
            let mut completed = Vec::new();
            {
                let mut guard = self.cell.lock().unwrap();
                let cell = &mut *guard;
                if let StpState::Enabled(session) = &mut cell.stp {
                    let mut ctl = CellControl {
                        flags: &mut session.flags,
                        log: &mut cell.log,
                        completed: &mut completed,
                    };
                    for port in &self.ports {
                        session.engine.link_changed(
                            &mut ctl,
                            port.index(),
                            port.mac_operational(),
                            timestamp,
                        );
                    }
                }
            }
            self.emit_log_lines(completed);
        }
        self.channels.invalidate.emit(&self.mac);
    }

    // ------------------------------------------------------------------
    // Protocol adapter
    // ------------------------------------------------------------------

    /// Enables STP with a fresh engine instance.
    ///
    /// Panics if STP is already enabled. On factory failure the bridge
    /// stays disabled and nothing the construction attempt logged survives.
    pub fn enable_stp(
        &self,
        factory: &dyn StpEngineFactory,
        version: StpVersion,
        tree_count: usize,
        timestamp: Timestamp,
    ) -> Result<(), EngineError> {
        let mut completed = Vec::new();
        {
            let mut guard = self.cell.lock().unwrap();
            let cell = &mut *guard;
            assert!(
                matches!(cell.stp, StpState::Disabled),
                "STP already enabled on bridge {}",
                self.mac
            );

            let params = EngineParams {
                mac: self.mac,
                port_count: self.ports.len(),
                tree_count,
                version,
                timestamp,
            };
            let mut flags = PortTreeFlags::new(self.ports.len(), tree_count);
            let log_mark = cell.log.len();
            let mut ctl = CellControl {
                flags: &mut flags,
                log: &mut cell.log,
                completed: &mut completed,
            };

            let mut engine = match factory.create(&params, &mut ctl) {
                Ok(engine) => engine,
                Err(err) => {
                    // The session never existed; its output must not either.
                    cell.log.truncate(log_mark);
                    return Err(err);
                }
            };

            // Catch the fresh engine up with wires attached before enable.
            for port in &self.ports {
                if port.mac_operational() {
                    engine.link_changed(&mut ctl, port.index(), true, timestamp);
                }
            }

            cell.stp = StpState::Enabled(EngineSession { engine, flags });
        }

        info!(mac = %self.mac, version = %version, tree_count, timestamp, "stp enabled");
        self.channels.started.emit(&self.mac);
        self.emit_log_lines(completed);
        self.channels.invalidate.emit(&self.mac);
        Ok(())
    }

    /// Disables STP and tears down the engine instance.
    ///
    /// Panics if STP is not enabled. The `stopping` notification fires
    /// before teardown so observers can detach while state is still
    /// queryable; a buffered partial log line is discarded without
    /// notification.
    pub fn disable_stp(&self, timestamp: Timestamp) {
        {
            let guard = self.cell.lock().unwrap();
            assert!(
                matches!(guard.stp, StpState::Enabled(_)),
                "STP not enabled on bridge {}",
                self.mac
            );
        }
        self.channels.stopping.emit(&self.mac);
        {
            let mut guard = self.cell.lock().unwrap();
            let cell = &mut *guard;
            cell.stp = StpState::Disabled;
            cell.log.discard_current();
        }
        info!(mac = %self.mac, timestamp, "stp disabled");
        self.channels.invalidate.emit(&self.mac);
    }

    /// Returns true while a protocol session is alive.
    pub fn is_stp_enabled(&self) -> bool {
        matches!(self.cell.lock().unwrap().stp, StpState::Enabled(_))
    }

    /// Advances the protocol computation to `timestamp`.
    ///
    /// No-op while disabled or powered off. Holds the protocol lock for the
    /// whole computation step; notifications fire after release.
    pub fn tick(&self, timestamp: Timestamp) {
        if !self.is_powered() {
            return;
        }
        let mut completed = Vec::new();
        let ticked = {
            let mut guard = self.cell.lock().unwrap();
            let cell = &mut *guard;
            match &mut cell.stp {
                StpState::Disabled => false,
                StpState::Enabled(session) => {
                    let mut ctl = CellControl {
                        flags: &mut session.flags,
                        log: &mut cell.log,
                        completed: &mut completed,
                    };
                    session.engine.tick(&mut ctl, timestamp);
                    true
                }
            }
        };
        if ticked {
            self.emit_log_lines(completed);
            self.channels.invalidate.emit(&self.mac);
        }
    }

    /// Informs the bridge that a port's physical link changed.
    ///
    /// Called by the topology container after every wire mutation touching
    /// the port. Redundant notifications are absorbed; a powered-off bridge
    /// records the new link state but does not involve the engine (it is
    /// caught up on power-on).
    pub fn notify_link_changed(&self, port: PortIndex, connected: bool, timestamp: Timestamp) {
        assert!(
            port < self.ports.len(),
            "port index {} out of range on bridge {}",
            port,
            self.mac
        );
        let previous = self.ports[port].set_connected(connected);
        if previous == connected {
            return;
        }
        debug!(mac = %self.mac, port, connected, "link changed");

        if self.is_powered() {
            let mut completed = Vec::new();
            {
                let mut guard = self.cell.lock().unwrap();
                let cell = &mut *guard;
                if let StpState::Enabled(session) = &mut cell.stp {
                    let mut ctl = CellControl {
                        flags: &mut session.flags,
                        log: &mut cell.log,
                        completed: &mut completed,
                    };
                    session.engine.link_changed(&mut ctl, port, connected, timestamp);
                }
            }
            self.emit_log_lines(completed);
        }
        self.channels.invalidate.emit(&self.mac);
    }

    // ------------------------------------------------------------------
    // Protocol queries
    // ------------------------------------------------------------------

    /// Number of spanning-tree instances of the live session, 0 when
    /// disabled.
    pub fn tree_count(&self) -> usize {
        match &self.cell.lock().unwrap().stp {
            StpState::Disabled => 0,
            StpState::Enabled(session) => session.engine.tree_count(),
        }
    }

    /// Protocol version of the live session, if any.
    pub fn stp_version(&self) -> Option<StpVersion> {
        match &self.cell.lock().unwrap().stp {
            StpState::Disabled => None,
            StpState::Enabled(session) => Some(session.engine.version()),
        }
    }

    /// Role of a port in a tree; `PortRole::Disabled` when STP is disabled
    /// or the bridge is powered off.
    pub fn port_role(&self, port: PortIndex, tree: TreeIndex) -> PortRole {
        self.assert_port(port);
        if !self.is_powered() {
            return PortRole::Disabled;
        }
        match &self.cell.lock().unwrap().stp {
            StpState::Disabled => PortRole::Disabled,
            StpState::Enabled(session) => session.engine.port_role(port, tree),
        }
    }

    /// Learning flag of a port in a tree; false when STP is disabled or the
    /// bridge is powered off.
    pub fn port_learning(&self, port: PortIndex, tree: TreeIndex) -> bool {
        self.assert_port(port);
        if !self.is_powered() {
            return false;
        }
        match &self.cell.lock().unwrap().stp {
            StpState::Disabled => false,
            StpState::Enabled(session) => session.flags.get(port, tree).learning,
        }
    }

    /// Forwarding flag of a port in a tree; false when STP is disabled or
    /// the bridge is powered off.
    pub fn port_forwarding(&self, port: PortIndex, tree: TreeIndex) -> bool {
        self.assert_port(port);
        if !self.is_powered() {
            return false;
        }
        match &self.cell.lock().unwrap().stp {
            StpState::Disabled => false,
            StpState::Enabled(session) => session.flags.get(port, tree).forwarding,
        }
    }

    /// Operational-edge flag of a port; false when STP is disabled or the
    /// bridge is powered off.
    pub fn port_oper_edge(&self, port: PortIndex) -> bool {
        self.assert_port(port);
        if !self.is_powered() {
            return false;
        }
        match &self.cell.lock().unwrap().stp {
            StpState::Disabled => false,
            StpState::Enabled(session) => session.engine.port_oper_edge(port),
        }
    }

    /// Bridge priority for a tree; [`DEFAULT_BRIDGE_PRIORITY`] when STP is
    /// disabled or the bridge is powered off.
    pub fn bridge_priority(&self, tree: TreeIndex) -> u16 {
        if !self.is_powered() {
            return DEFAULT_BRIDGE_PRIORITY;
        }
        match &self.cell.lock().unwrap().stp {
            StpState::Disabled => DEFAULT_BRIDGE_PRIORITY,
            StpState::Enabled(session) => session.engine.bridge_priority(tree),
        }
    }

    /// Tree instance a VLAN maps to; 0 when STP is disabled or the bridge
    /// is powered off.
    pub fn tree_for_vlan(&self, vlan: VlanId) -> TreeIndex {
        if !self.is_powered() {
            return 0;
        }
        match &self.cell.lock().unwrap().stp {
            StpState::Disabled => 0,
            StpState::Enabled(session) => session.engine.tree_for_vlan(vlan),
        }
    }

    /// Snapshot of all completed log lines, oldest first.
    pub fn log_lines(&self) -> Vec<BridgeLogLine> {
        self.cell.lock().unwrap().log.lines().to_vec()
    }

    // ------------------------------------------------------------------
    // Notification channels
    // ------------------------------------------------------------------

    /// Fired after any observable state change; observers re-read and
    /// redraw.
    pub fn invalidate_event(&self) -> &Channel<MacAddress> {
        &self.channels.invalidate
    }

    /// Fired after a protocol session comes up.
    pub fn started_event(&self) -> &Channel<MacAddress> {
        &self.channels.started
    }

    /// Fired before a protocol session is torn down, while its state is
    /// still queryable.
    pub fn stopping_event(&self) -> &Channel<MacAddress> {
        &self.channels.stopping
    }

    /// Fired once per completed diagnostic log line.
    pub fn log_line_generated_event(&self) -> &Channel<LogLineEvent> {
        &self.channels.log_line_generated
    }

    fn emit_log_lines(&self, completed: Vec<BridgeLogLine>) {
        for line in completed {
            self.channels.log_line_generated.emit(&LogLineEvent {
                bridge: self.mac,
                line,
            });
        }
    }

    fn assert_port(&self, port: PortIndex) {
        assert!(
            port < self.ports.len(),
            "port index {} out of range on bridge {}",
            port,
            self.mac
        );
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("mac", &self.mac)
            .field("ports", &self.ports.len())
            .field("powered", &self.is_powered())
            .field("stp_enabled", &self.is_stp_enabled())
            .finish()
    }
}
