//! Protocol-engine boundary for stpsim.
//!
//! The spanning-tree computation itself is a black-box collaborator: the
//! topology model constructs an engine per bridge through
//! [`StpEngineFactory`], drives it with timestamped [`StpEngine::tick`]
//! calls, and receives hardware-control actions back through the
//! [`BridgeControl`] callback table.
//!
//! # Callback contract
//!
//! Every engine entry point receives the control handle as an argument and
//! may invoke any subset of the callbacks, any number of times, before
//! returning. The engine never stores the handle; the caller guarantees the
//! handle stays valid for the duration of the call and that the bridge's
//! protocol lock is already held, so callbacks run on the caller's stack
//! with exclusive access to the bridge's protocol state.
//!
//! The C++ lineage of this boundary carried alloc/free memory-service
//! callbacks; those collapse to ordinary Rust allocation and do not appear
//! here. An engine that cannot acquire the resources it needs fails
//! construction with [`EngineError::ResourceExhausted`], which is fatal for
//! that bridge's protocol session only.

mod engine;
pub mod stub;

pub use engine::{BridgeControl, EngineError, EngineParams, StpEngine, StpEngineFactory};
