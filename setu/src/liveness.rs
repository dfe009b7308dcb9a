//! Disconnect detection
//!
//! There is no heartbeat message in the protocol. Instead the socket itself
//! is probed, at most once per interval, with a non-blocking one-byte `peek`
//! that leaves pending command bytes untouched:
//!
//! | Probe result | Verdict |
//! |--------------|---------|
//! | data pending / would block | alive |
//! | zero-length peek (orderly close) | dead |
//! | socket error | dead |
//!
//! A session the dispatcher already marked broken is reported dead at the
//! next check regardless of the interval. Errors never propagate out of here.

use crate::session::Session;
use crate::transport::{Probe, Transport};
use std::time::{Duration, Instant};

pub struct LivenessMonitor {
    interval: Duration,
}

impl LivenessMonitor {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// False when the session should be torn down
    pub fn check<T: Transport>(&self, session: &mut Session<T>, now: Instant) -> bool {
        if session.broken {
            log::debug!("Session {}: broken, tearing down", session.id);
            return false;
        }
        if now.saturating_duration_since(session.last_liveness_check) < self.interval {
            return true;
        }
        session.last_liveness_check = now;

        match session.transport.probe() {
            Probe::Alive => true,
            Probe::Closed => {
                log::info!("Session {}: client closed the connection", session.id);
                false
            }
            Probe::Failed => {
                log::warn!("Session {}: socket error", session.id);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::MockEngine;
    use crate::transport::mock::MockTransport;

    const INTERVAL: Duration = Duration::from_millis(100);

    fn open(transport: &MockTransport, now: Instant) -> Session<MockTransport> {
        let mut engine = MockEngine::with_resolution(4, 4);
        Session::open(1, transport.clone(), &mut engine, now).unwrap()
    }

    #[test]
    fn test_probe_rate_limited() {
        let start = Instant::now();
        let transport = MockTransport::new();
        let mut session = open(&transport, start);
        let monitor = LivenessMonitor::new(INTERVAL);

        assert!(monitor.check(&mut session, start + Duration::from_millis(10)));
        assert!(monitor.check(&mut session, start + Duration::from_millis(90)));
        assert_eq!(transport.probe_count(), 0);

        assert!(monitor.check(&mut session, start + INTERVAL));
        assert_eq!(transport.probe_count(), 1);
        assert!(monitor.check(&mut session, start + Duration::from_millis(150)));
        assert_eq!(transport.probe_count(), 1);
    }

    #[test]
    fn test_orderly_close_detected_within_interval() {
        let start = Instant::now();
        let transport = MockTransport::new();
        let mut session = open(&transport, start);
        let monitor = LivenessMonitor::new(INTERVAL);

        transport.close_peer();
        assert!(monitor.check(&mut session, start + Duration::from_millis(50)));
        assert!(!monitor.check(&mut session, start + INTERVAL));
    }

    #[test]
    fn test_pending_data_keeps_session_alive() {
        let start = Instant::now();
        let transport = MockTransport::new();
        let mut session = open(&transport, start);
        let monitor = LivenessMonitor::new(INTERVAL);

        transport.inject_read(&[1, 0, 0, 0]);
        transport.close_peer();
        assert!(monitor.check(&mut session, start + INTERVAL));
    }

    #[test]
    fn test_broken_session_reported_immediately() {
        let start = Instant::now();
        let transport = MockTransport::new();
        let mut session = open(&transport, start);
        let monitor = LivenessMonitor::new(INTERVAL);

        session.mark_broken();
        assert!(!monitor.check(&mut session, start));
        assert_eq!(transport.probe_count(), 0);
    }

    #[test]
    fn test_clock_going_backwards_is_harmless() {
        let start = Instant::now() + Duration::from_secs(1);
        let transport = MockTransport::new();
        let mut session = open(&transport, start);
        let monitor = LivenessMonitor::new(INTERVAL);

        assert!(monitor.check(&mut session, start - Duration::from_millis(500)));
        assert_eq!(transport.probe_count(), 0);
    }
}
