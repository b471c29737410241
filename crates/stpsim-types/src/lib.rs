//! Common stpsim types for the network topology model and protocol adapter.
//!
//! This crate provides type-safe representations of the primitives shared
//! across the simulator core:
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`MacAllocator`]: unique bridge-identity assignment
//! - [`Point`], [`Side`]: presentation placement geometry
//! - [`StpVersion`], [`PortRole`], [`FdbFlushType`]: the spanning-tree
//!   vocabulary exchanged with the protocol engine

mod geometry;
mod mac;
mod stp;

pub use geometry::{Point, Side};
pub use mac::{MacAddress, MacAllocator};
pub use stp::{FdbFlushType, PortRole, StpVersion};

/// Zero-based port index within a bridge.
pub type PortIndex = usize;

/// Zero-based spanning-tree instance index within a bridge.
pub type TreeIndex = usize;

/// IEEE 802.1Q VLAN identifier.
pub type VlanId = u16;

/// Simulated time in milliseconds.
pub type Timestamp = u32;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid side: {0}")]
    InvalidSide(String),

    #[error("invalid STP version: {0}")]
    InvalidStpVersion(String),

    #[error("invalid port role: {0}")]
    InvalidPortRole(String),
}
