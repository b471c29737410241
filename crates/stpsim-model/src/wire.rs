//! Wires: links between two port-or-free-point endpoints.

use std::fmt;

use stpsim_types::Point;

use crate::port::PortRef;

/// Stable, project-assigned wire identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WireId(pub(crate) u64);

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wire-{}", self.0)
    }
}

/// One end of a wire: attached to a port, or dangling at a location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WireEnd {
    /// Connected to a port. The wire never owns the port.
    Attached(PortRef),
    /// Dangling free point.
    Free(Point),
}

impl WireEnd {
    /// The attached port, if this end is not dangling.
    pub fn attached_port(&self) -> Option<PortRef> {
        match self {
            WireEnd::Attached(port) => Some(*port),
            WireEnd::Free(_) => None,
        }
    }

    /// Returns true if this end is dangling.
    pub fn is_free(&self) -> bool {
        matches!(self, WireEnd::Free(_))
    }
}

/// A link whose two ends each independently reference a port or a free
/// point. Owned by the project; removal returns the wire to the caller so
/// an editor can reinsert it.
#[derive(Debug, Clone, PartialEq)]
pub struct Wire {
    id: WireId,
    ends: [WireEnd; 2],
}

impl Wire {
    pub(crate) fn new(id: WireId, ends: [WireEnd; 2]) -> Self {
        Self { id, ends }
    }

    /// Stable identity within the owning project.
    pub fn id(&self) -> WireId {
        self.id
    }

    /// Both ends, in order.
    pub fn ends(&self) -> &[WireEnd; 2] {
        &self.ends
    }

    /// One end; `end` must be 0 or 1.
    pub fn end(&self, end: usize) -> &WireEnd {
        &self.ends[end]
    }

    pub(crate) fn set_end(&mut self, end: usize, value: WireEnd) {
        self.ends[end] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use stpsim_types::MacAddress;

    #[test]
    fn test_wire_ends() {
        let port = PortRef::new(MacAddress::new([2, 0, 0, 0, 0, 1]), 0);
        let wire = Wire::new(
            WireId(4),
            [WireEnd::Attached(port), WireEnd::Free(Point::new(5.0, 6.0))],
        );

        assert_eq!(wire.id().to_string(), "wire-4");
        assert_eq!(wire.end(0).attached_port(), Some(port));
        assert!(wire.end(1).is_free());
        assert_eq!(wire.end(1).attached_port(), None);
    }
}
