// GPS Tracking Session Core
// Session state machine + incremental aggregation over a stream of position fixes

pub mod controller;
pub mod error;
pub mod export;
pub mod geomath;
pub mod position;
pub mod session;
pub mod source;

pub use controller::{NullPresenter, Presenter, TrackSessionController};
pub use error::{TrackerError, TrackerResult};
pub use export::ExportDocument;
pub use position::PositionSample;
pub use session::{DerivedStats, SessionAggregator, SessionStatus, TrackSession};
pub use source::{ChannelSource, PositionSource, SourceEvent, SourceHandle, Subscription};
