//! Placement geometry for bridges, ports, and dangling wire ends.
//!
//! These are presentation metadata only: the protocol adapter never reads
//! them, but wire ends detached from a removed bridge keep the port's last
//! connection-point location, so the types live next to the rest of the
//! shared vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ParseError;

/// A 2D coordinate used for free wire ends and bridge placement.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    /// Creates a new point.
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The edge of a bridge a port sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
    Top,
    #[default]
    Bottom,
}

impl Side {
    /// Converts to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Top => "top",
            Self::Bottom => "bottom",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            _ => Err(ParseError::InvalidSide(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_side_round_trip() {
        for side in [Side::Left, Side::Right, Side::Top, Side::Bottom] {
            assert_eq!(side.as_str().parse::<Side>().unwrap(), side);
        }
    }

    #[test]
    fn test_side_parse_invalid() {
        assert!("north".parse::<Side>().is_err());
    }

    #[test]
    fn test_point_display() {
        assert_eq!(Point::new(10.0, 20.5).to_string(), "(10, 20.5)");
    }
}
