//! Typed synchronous publish/subscribe channels.
//!
//! Observers (a renderer, a UI, a test harness) subscribe to a bridge's
//! channels to learn when to re-read state. Delivery is synchronous on the
//! firing thread, in subscriber registration order. The subscriber list's
//! lock is released before handlers run, so a handler may re-enter the
//! channel (subscribe, unsubscribe) or query the bridge that fired it.

use std::sync::{Arc, Mutex};

use stpsim_types::MacAddress;

use crate::log::BridgeLogLine;

/// Identity of a registered handler, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct ChannelInner<E> {
    next_id: u64,
    handlers: Vec<(HandlerId, Handler<E>)>,
}

/// A typed pub/sub channel.
pub struct Channel<E> {
    inner: Mutex<ChannelInner<E>>,
}

impl<E> Channel<E> {
    /// Creates an empty channel.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ChannelInner {
                next_id: 0,
                handlers: Vec::new(),
            }),
        }
    }

    /// Registers a handler; returns its identity for later unsubscription.
    pub fn subscribe<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock().unwrap();
        let id = HandlerId(inner.next_id);
        inner.next_id += 1;
        inner.handlers.push((id, Arc::new(handler)));
        id
    }

    /// Removes a handler. Returns false if the id was not registered.
    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.handlers.len();
        inner.handlers.retain(|(hid, _)| *hid != id);
        inner.handlers.len() != before
    }

    /// Number of registered handlers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().unwrap().handlers.len()
    }

    /// Delivers `event` to every handler, in registration order.
    ///
    /// The subscriber list is snapshotted first so handlers run without the
    /// channel lock held; a handler registered during delivery sees only
    /// subsequent events.
    pub fn emit(&self, event: &E) {
        let handlers: Vec<Handler<E>> = {
            let inner = self.inner.lock().unwrap();
            inner.handlers.iter().map(|(_, h)| h.clone()).collect()
        };
        for handler in handlers {
            handler(event);
        }
    }
}

impl<E> Default for Channel<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Payload of the `log_line_generated` channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLineEvent {
    /// Bridge that generated the line.
    pub bridge: MacAddress,
    /// The completed line.
    pub line: BridgeLogLine,
}

/// The four per-bridge notification channels.
pub(crate) struct BridgeChannels {
    pub invalidate: Channel<MacAddress>,
    pub started: Channel<MacAddress>,
    pub stopping: Channel<MacAddress>,
    pub log_line_generated: Channel<LogLineEvent>,
}

impl BridgeChannels {
    pub fn new() -> Self {
        Self {
            invalidate: Channel::new(),
            started: Channel::new(),
            stopping: Channel::new(),
            log_line_generated: Channel::new(),
        }
    }
}
