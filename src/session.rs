use serde::{Deserialize, Serialize};

use crate::geomath::{haversine_distance_km, mps_to_kmh};
use crate::position::PositionSample;

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Nothing recorded, nothing accumulating
    Idle,
    /// Accepting samples
    Active,
    /// Recording finished, state frozen until reset
    Stopped,
}

/// Aggregate state of one tracking session.
///
/// The only writer is `SessionAggregator`; everyone else sees read-only
/// snapshots. `last_sample` is the anchor for the next distance delta and
/// always equals the last element of `route` while the route is non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackSession {
    pub status: SessionStatus,
    /// Accepted fixes in arrival order, append-only while active.
    pub route: Vec<PositionSample>,
    /// Epoch milliseconds, set once per start.
    pub started_at: Option<i64>,
    pub total_distance_km: f64,
    pub max_speed_kmh: f64,
    pub duration_sec: f64,
    pub avg_speed_kmh: f64,
    pub last_sample: Option<PositionSample>,
}

impl TrackSession {
    /// Fresh idle session: empty route, zeroed stats.
    pub fn idle() -> Self {
        Self {
            status: SessionStatus::Idle,
            route: Vec::new(),
            started_at: None,
            total_distance_km: 0.0,
            max_speed_kmh: 0.0,
            duration_sec: 0.0,
            avg_speed_kmh: 0.0,
            last_sample: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Summary statistics view for display and export.
    pub fn stats(&self) -> DerivedStats {
        DerivedStats {
            distance_km: self.total_distance_km,
            duration_sec: self.duration_sec,
            avg_speed_kmh: self.avg_speed_kmh,
            max_speed_kmh: self.max_speed_kmh,
        }
    }
}

impl Default for TrackSession {
    fn default() -> Self {
        Self::idle()
    }
}

/// Summary statistics derived from a session.
///
/// Field names are part of the export wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedStats {
    pub distance_km: f64,
    pub duration_sec: f64,
    pub avg_speed_kmh: f64,
    pub max_speed_kmh: f64,
}

/// Owns one `TrackSession` and applies each incoming fix deterministically.
///
/// Distance accumulates between consecutive fixes; duration and average
/// speed are recomputed on each accepted sample and freeze on stop; max
/// speed only ever rises. There is no accuracy or plausibility filtering:
/// every sample forwarded while active is accepted.
pub struct SessionAggregator {
    session: TrackSession,
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self {
            session: TrackSession::idle(),
        }
    }

    pub fn session(&self) -> &TrackSession {
        &self.session
    }

    /// Begin recording at `now_ms`. Always succeeds; starting while
    /// already active re-initializes, clearing route and stats.
    pub fn start(&mut self, now_ms: i64) -> &TrackSession {
        self.session = TrackSession::idle();
        self.session.status = SessionStatus::Active;
        self.session.started_at = Some(now_ms);
        &self.session
    }

    /// Apply one fix. Returns the session unchanged unless it is active.
    ///
    /// The first fix after start only anchors the route: distance needs
    /// two points, so no delta and no avg/max update happens until the
    /// second fix arrives.
    pub fn accept(&mut self, sample: PositionSample, now_ms: i64) -> &TrackSession {
        if self.session.status != SessionStatus::Active {
            return &self.session;
        }

        if let Some(last) = &self.session.last_sample {
            let delta = haversine_distance_km(last.lat, last.lng, sample.lat, sample.lng);
            self.session.total_distance_km += delta;

            if let Some(started_at) = self.session.started_at {
                self.session.duration_sec = (now_ms - started_at) as f64 / 1000.0;
            }
            self.session.avg_speed_kmh = if self.session.duration_sec > 0.0 {
                self.session.total_distance_km / self.session.duration_sec * 3600.0
            } else {
                0.0
            };

            // An unknown speed contributes 0 and never lowers a recorded max.
            let speed_kmh = mps_to_kmh(sample.speed.unwrap_or(0.0));
            if speed_kmh > self.session.max_speed_kmh {
                self.session.max_speed_kmh = speed_kmh;
            }
        }

        self.session.route.push(sample.clone());
        self.session.last_sample = Some(sample);
        &self.session
    }

    /// Freeze the session. No-op unless active.
    pub fn stop(&mut self) -> &TrackSession {
        if self.session.status == SessionStatus::Active {
            self.session.status = SessionStatus::Stopped;
        }
        &self.session
    }

    /// Discard the session and return to idle, regardless of prior state.
    pub fn reset(&mut self) -> &TrackSession {
        self.session = TrackSession::idle();
        &self.session
    }
}

impl Default for SessionAggregator {
    fn default() -> Self {
        Self::new()
    }
}
