//! Event sink adapters.
//!
//! The session publishes every event synchronously. Downstream listeners that
//! redo expensive work on each `CharacterUpdated` signal wrap their sink in a
//! [`CoalescingEventSink`], which suppresses refresh signals that arrive within
//! a short window of the previous one.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use charbldr_domain::{BuildEvent, BuildSourceKind};

use crate::infrastructure::ports::{ClockPort, EventSink, ExternalCachePort};

/// Logs every event at debug level.
#[derive(Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, event: &BuildEvent) {
        match serde_json::to_string(event) {
            Ok(json) => {
                tracing::debug!(event_type = event.event_type(), payload = %json, "Build event")
            }
            Err(e) => tracing::warn!(
                event_type = event.event_type(),
                error = %e,
                "Unserializable build event"
            ),
        }
    }
}

/// Forwards events to an inner sink, dropping `CharacterUpdated` signals that
/// arrive within `window` of the last one forwarded.
pub struct CoalescingEventSink {
    inner: Arc<dyn EventSink>,
    clock: Arc<dyn ClockPort>,
    window: chrono::Duration,
    last_forwarded: Mutex<Option<DateTime<Utc>>>,
}

impl CoalescingEventSink {
    pub fn new(inner: Arc<dyn EventSink>, clock: Arc<dyn ClockPort>, window: Duration) -> Self {
        Self {
            inner,
            clock,
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero()),
            last_forwarded: Mutex::new(None),
        }
    }

    fn is_suppressed(&self) -> bool {
        let now = self.clock.now();
        let mut last = self
            .last_forwarded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let suppressed =
            matches!(*last, Some(prev) if now.signed_duration_since(prev) < self.window);
        if !suppressed {
            *last = Some(now);
        }
        suppressed
    }
}

impl EventSink for CoalescingEventSink {
    fn publish(&self, event: &BuildEvent) {
        if event.is_character_updated() && self.is_suppressed() {
            tracing::trace!("Suppressed refresh signal inside coalescing window");
            return;
        }
        self.inner.publish(event);
    }
}

/// Cache port for hosts that keep no state outside the engine.
#[derive(Debug, Default)]
pub struct NoopExternalCache;

impl ExternalCachePort for NoopExternalCache {
    fn invalidate(&self, kind: BuildSourceKind) {
        tracing::trace!(kind = %kind, "No external cache to invalidate");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{MockClockPort, MockEventSink};
    use charbldr_domain::{Origin, ProficiencyType};
    use chrono::TimeZone;

    fn clock_at(millis: Vec<i64>) -> Arc<dyn ClockPort> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut clock = MockClockPort::new();
        let mut times = millis.into_iter();
        clock
            .expect_now()
            .returning(move || base + chrono::Duration::milliseconds(times.next().unwrap_or(0)));
        Arc::new(clock)
    }

    fn updated() -> BuildEvent {
        BuildEvent::CharacterUpdated {
            kind: Some(BuildSourceKind::Race),
        }
    }

    #[test]
    fn updates_inside_the_window_are_suppressed() {
        let mut inner = MockEventSink::new();
        inner
            .expect_publish()
            .withf(|e| e.is_character_updated())
            .times(2)
            .return_const(());

        let sink = CoalescingEventSink::new(
            Arc::new(inner),
            clock_at(vec![0, 20, 49, 80]),
            Duration::from_millis(50),
        );
        // Forwarded at 0, suppressed at 20 and 49, forwarded at 80
        for _ in 0..4 {
            sink.publish(&updated());
        }
    }

    #[test]
    fn other_events_always_pass_through() {
        let mut inner = MockEventSink::new();
        inner
            .expect_publish()
            .withf(|e| !e.is_character_updated())
            .times(3)
            .return_const(());

        let mut clock = MockClockPort::new();
        clock.expect_now().never();
        let sink = CoalescingEventSink::new(
            Arc::new(inner),
            Arc::new(clock),
            Duration::from_millis(50),
        );

        for _ in 0..3 {
            sink.publish(&BuildEvent::OptionalSelected {
                proficiency_type: ProficiencyType::Skills,
                origin: Origin::Race,
                proficiency: "Stealth".to_string(),
            });
        }
    }

    #[test]
    fn zero_window_forwards_everything() {
        let mut inner = MockEventSink::new();
        inner.expect_publish().times(3).return_const(());
        let sink =
            CoalescingEventSink::new(Arc::new(inner), clock_at(vec![0, 0, 0]), Duration::ZERO);
        for _ in 0..3 {
            sink.publish(&updated());
        }
    }
}
