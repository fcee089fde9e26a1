//! Dome telemetry

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{act_ctrl::RotationDirection, calib::CalibConsts, shutter_ctrl::ShutterState};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Snapshot of the dome's state, published by the telemetry server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomeTm {
    pub timestamp: DateTime<Utc>,

    /// Azimuth estimate.
    ///
    /// Units: degrees
    pub az_deg: f64,

    pub direction: RotationDirection,

    /// Active target azimuth, if any.
    ///
    /// Units: degrees
    pub target_deg: Option<f64>,

    pub shutter: ShutterState,
    pub shutter_alert: bool,

    pub parked: bool,
    pub connected: bool,

    pub calib: Option<CalibConsts>,
}
