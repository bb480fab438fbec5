use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::error::TrackerResult;
use crate::export::ExportDocument;
use crate::position::PositionSample;
use crate::session::{DerivedStats, SessionAggregator, SessionStatus, TrackSession};
use crate::source::{PositionSource, SourceEvent, Subscription};

/// Presentation collaborator: receives read-only state updates.
///
/// All methods default to no-ops so implementors subscribe to what they
/// render.
pub trait Presenter {
    /// Latest fix, whether or not a session is active.
    fn on_position(&mut self, _sample: &PositionSample) {}

    /// Session snapshot plus derived stats, after every accepted sample
    /// and every lifecycle transition.
    fn on_snapshot(&mut self, _session: &TrackSession, _stats: &DerivedStats) {}

    /// Latest error message, or `None` when the error cleared.
    fn on_error(&mut self, _message: Option<&str>) {}
}

/// Presenter for hosts that poll the controller instead.
pub struct NullPresenter;

impl Presenter for NullPresenter {}

/// Milliseconds-since-epoch clock, injectable for tests and replays.
pub type Clock = Box<dyn Fn() -> i64 + Send>;

/// Session lifecycle state machine.
///
/// Wires the position source to the aggregator and publishes snapshots to
/// the presenter. Idle → Active → Stopped, with reset returning to Idle
/// from anywhere. The status lives on the session; the controller holds
/// no duplicate state.
pub struct TrackSessionController<S: PositionSource, P: Presenter> {
    source: S,
    presenter: P,
    aggregator: SessionAggregator,
    subscription: Option<Subscription>,
    last_error: Option<String>,
    clock: Clock,
}

impl<S: PositionSource, P: Presenter> TrackSessionController<S, P> {
    /// Controller on the system clock.
    pub fn new(source: S, presenter: P) -> Self {
        Self::with_clock(source, presenter, Box::new(|| Utc::now().timestamp_millis()))
    }

    /// Controller on a caller-supplied clock.
    pub fn with_clock(source: S, presenter: P, clock: Clock) -> Self {
        Self {
            source,
            presenter,
            aggregator: SessionAggregator::new(),
            subscription: None,
            last_error: None,
            clock,
        }
    }

    pub fn session(&self) -> &TrackSession {
        self.aggregator.session()
    }

    pub fn stats(&self) -> DerivedStats {
        self.aggregator.session().stats()
    }

    pub fn status(&self) -> SessionStatus {
        self.aggregator.session().status
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// One-shot fix to show a location before tracking starts.
    ///
    /// Does not change the session status either way.
    pub fn initial_fix(&mut self) -> TrackerResult<PositionSample> {
        match self.source.request_current_position() {
            Ok(sample) => {
                self.clear_error();
                self.presenter.on_position(&sample);
                Ok(sample)
            }
            Err(err) => {
                self.record_error(err.to_string());
                Err(err)
            }
        }
    }

    /// Begin a recording session.
    ///
    /// Subscribes to the source, then re-initializes the aggregator. A
    /// start while active restarts. On a source failure the session stays
    /// idle and the error is recorded as well as returned; nothing is
    /// fatal.
    pub fn start(&mut self) -> TrackerResult<()> {
        if let Some(subscription) = self.subscription.take() {
            self.source.unsubscribe(subscription);
        }

        match self.source.subscribe() {
            Ok(subscription) => {
                self.subscription = Some(subscription);
                let now_ms = (self.clock)();
                self.aggregator.start(now_ms);
                self.clear_error();
                info!("tracking started at {}", now_ms);
                self.emit_snapshot();
                Ok(())
            }
            Err(err) => {
                warn!("tracking not started: {}", err);
                self.record_error(err.to_string());
                Err(err)
            }
        }
    }

    /// Drain pending source events and apply them in arrival order.
    ///
    /// The host event loop calls this; controller and aggregator execute
    /// synchronously inside it, so the aggregator's mutations are never
    /// interleaved.
    pub fn pump(&mut self) {
        loop {
            let event = match &self.subscription {
                Some(subscription) => subscription.try_next(),
                None => None,
            };
            match event {
                Some(SourceEvent::Sample(sample)) => self.on_sample(sample),
                Some(SourceEvent::Error(message)) => self.on_source_error(&message),
                None => break,
            }
        }
    }

    /// Apply one fix from the stream.
    ///
    /// Dropped unless the session is active, so a callback racing a
    /// `stop()` can never mutate frozen state.
    pub fn on_sample(&mut self, sample: PositionSample) {
        if self.status() != SessionStatus::Active {
            debug!("dropping fix at {}: session not active", sample.timestamp);
            return;
        }
        // Each good fix clears the previous source error
        self.clear_error();
        self.presenter.on_position(&sample);
        let now_ms = (self.clock)();
        self.aggregator.accept(sample, now_ms);
        self.emit_snapshot();
    }

    /// A fault reported by the source.
    ///
    /// Advisory only: the session keeps its status and accumulated stats.
    pub fn on_source_error(&mut self, message: &str) {
        warn!("position source error: {}", message);
        self.record_error(message.to_string());
    }

    /// End the session and freeze its state. No-op unless active.
    ///
    /// Unsubscribes before freezing, so no event delivered after this
    /// returns can be processed.
    pub fn stop(&mut self) {
        if self.status() != SessionStatus::Active {
            return;
        }
        if let Some(subscription) = self.subscription.take() {
            self.source.unsubscribe(subscription);
        }
        let session = self.aggregator.stop();
        info!(
            "tracking stopped: {:.3} km over {:.1} s, {} fixes",
            session.total_distance_km,
            session.duration_sec,
            session.route.len()
        );
        self.emit_snapshot();
    }

    /// Discard the session from any state and return to idle.
    pub fn reset(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.source.unsubscribe(subscription);
        }
        self.aggregator.reset();
        info!("tracking reset");
        self.emit_snapshot();
    }

    /// Export document for the current session state, stamped with the
    /// controller clock.
    pub fn export(&self) -> ExportDocument {
        let now_ms = (self.clock)();
        let exported_at = DateTime::from_timestamp_millis(now_ms).unwrap_or_default();
        ExportDocument::from_session(self.aggregator.session(), exported_at)
    }

    fn emit_snapshot(&mut self) {
        let session = self.aggregator.session();
        let stats = session.stats();
        self.presenter.on_snapshot(session, &stats);
    }

    fn record_error(&mut self, message: String) {
        self.last_error = Some(message);
        self.presenter.on_error(self.last_error.as_deref());
    }

    fn clear_error(&mut self) {
        if self.last_error.take().is_some() {
            self.presenter.on_error(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackerError;
    use crate::source::ChannelSource;
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    fn fix(lat: f64, lng: f64, speed: Option<f64>, timestamp: i64) -> PositionSample {
        PositionSample::new(lat, lng, 5.0, speed, None, timestamp)
    }

    /// Captures everything the controller publishes.
    #[derive(Default)]
    struct RecordingPresenter {
        positions: Vec<PositionSample>,
        snapshots: Vec<(usize, DerivedStats)>,
        errors: Vec<Option<String>>,
    }

    impl Presenter for &mut RecordingPresenter {
        fn on_position(&mut self, sample: &PositionSample) {
            self.positions.push(sample.clone());
        }

        fn on_snapshot(&mut self, session: &TrackSession, stats: &DerivedStats) {
            self.snapshots.push((session.route.len(), *stats));
        }

        fn on_error(&mut self, message: Option<&str>) {
            self.errors.push(message.map(str::to_string));
        }
    }

    /// A source with no capability at all.
    struct DeadSource;

    impl PositionSource for DeadSource {
        fn request_current_position(&mut self) -> TrackerResult<PositionSample> {
            Err(TrackerError::SourceUnavailable(
                "geolocation not supported".to_string(),
            ))
        }

        fn subscribe(&mut self) -> TrackerResult<Subscription> {
            Err(TrackerError::SourceUnavailable(
                "geolocation not supported".to_string(),
            ))
        }

        fn unsubscribe(&mut self, _subscription: Subscription) {}
    }

    fn controller_at(
        source: ChannelSource,
        clock: Arc<AtomicI64>,
    ) -> TrackSessionController<ChannelSource, NullPresenter> {
        TrackSessionController::with_clock(
            source,
            NullPresenter,
            Box::new(move || clock.load(Ordering::Relaxed)),
        )
    }

    #[test]
    fn test_start_pump_stop_roundtrip() {
        let clock = Arc::new(AtomicI64::new(0));
        let source = ChannelSource::new();
        let handle = source.handle();
        let mut controller = controller_at(source, Arc::clone(&clock));

        controller.start().unwrap();
        assert_eq!(controller.status(), SessionStatus::Active);

        handle.push_sample(fix(0.0, 0.0, Some(0.0), 0));
        controller.pump();
        clock.store(10_000, Ordering::Relaxed);
        handle.push_sample(fix(0.0, 1.0, Some(10.0), 10_000));
        controller.pump();

        let stats = controller.stats();
        assert_eq!(controller.session().route.len(), 2);
        assert!((stats.distance_km - 111.19).abs() < 0.5);
        assert_relative_eq!(stats.max_speed_kmh, 36.0, epsilon = 1e-9);
        assert_relative_eq!(stats.duration_sec, 10.0, epsilon = 1e-9);

        controller.stop();
        assert_eq!(controller.status(), SessionStatus::Stopped);
        let doc = controller.export();
        assert_eq!(doc.total_points, 2);
    }

    #[test]
    fn test_unavailable_source_keeps_session_idle() {
        let mut presenter = RecordingPresenter::default();
        let mut controller = TrackSessionController::with_clock(
            DeadSource,
            &mut presenter,
            Box::new(|| 0),
        );

        let err = controller.start().unwrap_err();
        assert!(matches!(err, TrackerError::SourceUnavailable(_)));
        assert_eq!(controller.status(), SessionStatus::Idle);
        assert!(controller.last_error().unwrap().contains("not supported"));
        drop(controller);
        assert_eq!(presenter.errors.len(), 1);
    }

    #[test]
    fn test_events_after_stop_are_dropped() {
        let clock = Arc::new(AtomicI64::new(0));
        let source = ChannelSource::new();
        let handle = source.handle();
        let mut controller = controller_at(source, Arc::clone(&clock));

        controller.start().unwrap();
        handle.push_sample(fix(0.0, 0.0, None, 0));
        controller.pump();
        controller.stop();

        // In-flight callback racing the stop
        handle.push_sample(fix(5.0, 5.0, Some(30.0), 1000));
        controller.pump();
        controller.on_sample(fix(6.0, 6.0, Some(40.0), 2000));

        let session = controller.session();
        assert_eq!(session.route.len(), 1);
        assert_relative_eq!(session.total_distance_km, 0.0);
        assert_relative_eq!(session.max_speed_kmh, 0.0);
    }

    #[test]
    fn test_source_error_is_advisory() {
        let clock = Arc::new(AtomicI64::new(0));
        let source = ChannelSource::new();
        let handle = source.handle();
        let mut controller = controller_at(source, Arc::clone(&clock));

        controller.start().unwrap();
        handle.push_sample(fix(0.0, 0.0, None, 0));
        clock.store(1000, Ordering::Relaxed);
        handle.push_sample(fix(0.0, 0.01, Some(4.0), 1000));
        controller.pump();
        let distance_before = controller.stats().distance_km;

        handle.push_error("fix timeout");
        controller.pump();

        assert_eq!(controller.status(), SessionStatus::Active);
        assert_eq!(controller.last_error(), Some("fix timeout"));
        assert_relative_eq!(controller.stats().distance_km, distance_before);

        // The next good fix clears the error
        clock.store(2000, Ordering::Relaxed);
        handle.push_sample(fix(0.0, 0.02, Some(4.0), 2000));
        controller.pump();
        assert_eq!(controller.last_error(), None);
    }

    #[test]
    fn test_reset_from_active_unsubscribes_and_clears() {
        let clock = Arc::new(AtomicI64::new(0));
        let source = ChannelSource::new();
        let handle = source.handle();
        let mut controller = controller_at(source, Arc::clone(&clock));

        controller.start().unwrap();
        handle.push_sample(fix(0.0, 0.0, None, 0));
        handle.push_sample(fix(0.0, 1.0, None, 1000));
        controller.pump();

        controller.reset();
        assert_eq!(controller.status(), SessionStatus::Idle);
        assert!(controller.session().route.is_empty());

        // Stream is free again for the next session
        assert!(controller.start().is_ok());
    }

    #[test]
    fn test_restart_while_active_clears_previous_session() {
        let clock = Arc::new(AtomicI64::new(0));
        let source = ChannelSource::new();
        let handle = source.handle();
        let mut controller = controller_at(source, Arc::clone(&clock));

        controller.start().unwrap();
        handle.push_sample(fix(0.0, 0.0, None, 0));
        handle.push_sample(fix(0.0, 1.0, None, 1000));
        controller.pump();
        assert!(controller.stats().distance_km > 0.0);

        controller.start().unwrap();
        assert_eq!(controller.status(), SessionStatus::Active);
        assert!(controller.session().route.is_empty());
        assert_relative_eq!(controller.stats().distance_km, 0.0);
    }

    #[test]
    fn test_initial_fix_before_tracking() {
        let clock = Arc::new(AtomicI64::new(0));
        let source = ChannelSource::new();
        let handle = source.handle();

        let mut presenter = RecordingPresenter::default();
        let mut controller = TrackSessionController::with_clock(
            source,
            &mut presenter,
            Box::new(move || clock.load(Ordering::Relaxed)),
        );

        assert!(controller.initial_fix().is_err());
        assert!(controller.last_error().is_some());

        handle.push_sample(fix(52.52, 13.405, None, 500));
        let sample = controller.initial_fix().unwrap();
        assert_relative_eq!(sample.lat, 52.52);
        assert_eq!(controller.status(), SessionStatus::Idle);
        assert_eq!(controller.last_error(), None);
        drop(controller);
        assert_eq!(presenter.positions.len(), 1);
    }

    #[test]
    fn test_presenter_sees_every_accepted_sample() {
        let clock = Arc::new(AtomicI64::new(0));
        let source = ChannelSource::new();
        let handle = source.handle();

        let mut presenter = RecordingPresenter::default();
        let mut controller = TrackSessionController::with_clock(
            source,
            &mut presenter,
            Box::new(move || clock.load(Ordering::Relaxed)),
        );

        controller.start().unwrap();
        handle.push_sample(fix(0.0, 0.0, None, 0));
        handle.push_sample(fix(0.0, 0.01, None, 1000));
        controller.pump();
        controller.stop();
        drop(controller);

        assert_eq!(presenter.positions.len(), 2);
        // One snapshot per transition (start, stop) and per accepted sample
        assert_eq!(presenter.snapshots.len(), 4);
        let (route_len, _) = presenter.snapshots.last().unwrap();
        assert_eq!(*route_len, 2);
    }
}
