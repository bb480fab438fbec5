use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::position::PositionSample;
use crate::session::{DerivedStats, TrackSession};

/// Complete session export (JSON-serializable).
///
/// The sole exported artifact. Field names are part of the wire
/// contract: `route`, `stats`, `exportedAt`, `totalPoints`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub route: Vec<PositionSample>,
    pub stats: DerivedStats,
    /// ISO-8601 time the document was produced, not session time.
    pub exported_at: String,
    pub total_points: usize,
}

impl ExportDocument {
    /// Snapshot `session` into an export document.
    ///
    /// Defined for any status; an idle session yields an empty route and
    /// zero points.
    pub fn from_session(session: &TrackSession, exported_at: DateTime<Utc>) -> Self {
        Self {
            route: session.route.clone(),
            stats: session.stats(),
            exported_at: exported_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            total_points: session.route.len(),
        }
    }

    /// Serialize to pretty JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Serialize to JSON bytes
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}
