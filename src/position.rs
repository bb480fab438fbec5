use serde::{Deserialize, Serialize};

use crate::geomath::mps_to_kmh;

/// One GPS fix as delivered by the position source.
///
/// `speed` and `heading` are `None` when the source cannot report them.
/// `timestamp` is source-supplied milliseconds since the Unix epoch;
/// within one session timestamps are expected to be non-decreasing, and
/// out-of-order delivery is a source fault rather than something the
/// core compensates for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub lat: f64,
    pub lng: f64,
    /// Radius of uncertainty in meters.
    pub accuracy: f64,
    /// Instantaneous speed in m/s.
    pub speed: Option<f64>,
    /// Course over ground in degrees, [0, 360).
    pub heading: Option<f64>,
    pub timestamp: i64,
}

impl PositionSample {
    pub fn new(
        lat: f64,
        lng: f64,
        accuracy: f64,
        speed: Option<f64>,
        heading: Option<f64>,
        timestamp: i64,
    ) -> Self {
        Self {
            lat,
            lng,
            accuracy,
            speed,
            heading,
            timestamp,
        }
    }

    /// Fix speed in km/h, treating an unknown speed as 0.
    pub fn speed_kmh(&self) -> f64 {
        mps_to_kmh(self.speed.unwrap_or(0.0))
    }
}
