//! stpsim topology model and protocol adapter.
//!
//! This crate is the simulator core: a mutable graph of bridges, ports, and
//! wires, plus the adapter layer that binds each bridge to an external
//! spanning-tree protocol engine and publishes state changes to observers.
//!
//! # Architecture
//!
//! ```text
//! [driver timer] ──tick──> [Bridge] <──callbacks── [StpEngine]
//!                             │
//!                             ├──> invalidate / started / stopping /
//!                             │    log_line_generated   (observers)
//!                             │
//! [topology edits] ──> [Project] ──notify_link_changed──> [Bridge]
//! ```
//!
//! # Thread safety
//!
//! Each [`Bridge`] guards its protocol state (engine handle, the per-port/
//! per-tree learning and forwarding flags, and the diagnostic log) with a
//! single mutex. Engine callbacks execute on the ticking thread through a
//! borrowed control view, so nested lock acquisition cannot be expressed,
//! and notifications are always emitted after the guard is dropped.
//! Observers may query any `&Bridge` from any thread; ticks on different
//! bridges never contend. Topology edits go through `&mut Project` and are
//! thereby confined to a single coordinating thread.

mod bridge;
mod events;
mod log;
mod persist;
mod port;
mod project;
mod wire;

pub use bridge::{Bridge, DEFAULT_BRIDGE_PRIORITY};
pub use events::{Channel, HandlerId, LogLineEvent};
pub use log::BridgeLogLine;
pub use persist::{
    load_json, save_json, BridgeConfig, PersistError, PortConfig, ProjectConfig, StpConfig,
    WireConfig, WireEndConfig,
};
pub use port::{Port, PortRef};
pub use project::Project;
pub use wire::{Wire, WireEnd, WireId};
