//! # Telecommand module
//!
//! This module provides telecommand functionality to the communications
//! interface. Telecommands are sent as JSON objects tagged with their `type`,
//! for example `{"type": "MoveAbs", "az_deg": 120.0}`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use serde_json;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A telecommand, i.e. an instruction sent to the dome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Tc {
    /// No-op used by clients to check the link
    Heartbeat,

    /// Rotate to an absolute azimuth.
    MoveAbs {
        /// Units: degrees, any value, reduced into [0, 360)
        az_deg: f64,
    },

    /// Rotate by an offset from the current azimuth.
    MoveRel {
        /// Units: degrees, positive is clockwise
        delta_deg: f64,
    },

    /// Start or stop continuous rotation in one direction.
    MoveDir { dir: DomeDirection, cmd: MotionCmd },

    /// Open or close the shutter.
    Shutter { op: ShutterOp },

    Park,
    Unpark,

    /// Stop all motion immediately.
    Abort,

    /// Rerun the calibration procedure.
    Calibrate,
}

/// Response to a telecommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TcResponse {
    /// The command has been executed or its goal already holds
    Ok,

    /// The command was accepted and is in progress
    Busy,

    /// The TC could not be parsed
    Invalid,

    /// The TC is valid but cannot be executed in the current state
    CannotExecute,
}

/// Direction of continuous rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomeDirection {
    /// Clockwise, increasing azimuth
    Cw,
    /// Counter-clockwise, decreasing azimuth
    Ccw,
}

/// Start or stop a continuous motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionCmd {
    Start,
    Stop,
}

/// Shutter operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutterOp {
    Open,
    Close,
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {
    /// Parse a new TC from a JSON packet
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        serde_json::from_str(json_str).map_err(TcParseError::InvalidJson)
    }

    /// Serialise the TC into a JSON packet
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_json() {
        assert_eq!(
            Tc::from_json(r#"{"type": "MoveAbs", "az_deg": 120.5}"#).unwrap(),
            Tc::MoveAbs { az_deg: 120.5 }
        );
        assert_eq!(
            Tc::from_json(r#"{"type": "MoveDir", "dir": "Ccw", "cmd": "Start"}"#).unwrap(),
            Tc::MoveDir {
                dir: DomeDirection::Ccw,
                cmd: MotionCmd::Start
            }
        );
        assert_eq!(Tc::from_json(r#"{"type": "Abort"}"#).unwrap(), Tc::Abort);

        // Missing payload field
        assert!(Tc::from_json(r#"{"type": "MoveRel"}"#).is_err());

        // Unknown type
        assert!(Tc::from_json(r#"{"type": "Teleport"}"#).is_err());

        // Not JSON at all
        assert!(Tc::from_json("park please").is_err());
    }

    #[test]
    fn test_to_json() {
        let tc = Tc::Shutter { op: ShutterOp::Close };
        let json = tc.to_json().unwrap();
        assert_eq!(json, r#"{"type":"Shutter","op":"Close"}"#);
        assert_eq!(Tc::from_json(&json).unwrap(), tc);
    }
}
