use super::backend::SourceId;
use std::collections::BTreeSet;

/// Where a buffer was placed on the output clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledSource {
    pub id: SourceId,
    pub start: f64,
}

/// Buffers currently playing plus the time the next one may start.
///
/// The cursor only moves forward while scheduling, so inbound segments play
/// back to back in arrival order. [`PlaybackQueue::interrupt`] is the only
/// way to move it back.
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    next_start: f64,
    in_flight: BTreeSet<SourceId>,
    next_id: u64,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> f64 {
        self.next_start
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Reserve a slot of `duration` seconds starting no earlier than `now`
    pub fn schedule(&mut self, duration: f64, now: f64) -> ScheduledSource {
        let start = self.next_start.max(now);
        self.next_start = start + duration.max(0.0);

        let id = SourceId(self.next_id);
        self.next_id += 1;
        self.in_flight.insert(id);

        ScheduledSource { id, start }
    }

    /// Forget a buffer that finished. Returns true when this emptied the queue.
    pub fn finish(&mut self, id: SourceId) -> bool {
        self.in_flight.remove(&id) && self.in_flight.is_empty()
    }

    /// Drop everything in flight and rewind the cursor.
    /// Returns the ids that still need stopping on the output context.
    pub fn interrupt(&mut self) -> Vec<SourceId> {
        self.next_start = 0.0;
        std::mem::take(&mut self.in_flight).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_buffer_starts_now() {
        let mut queue = PlaybackQueue::new();
        let scheduled = queue.schedule(0.5, 2.0);
        assert_eq!(scheduled.start, 2.0);
        assert_eq!(queue.cursor(), 2.5);
    }

    #[test]
    fn test_gapless_when_arrivals_lag() {
        let mut queue = PlaybackQueue::new();
        let durations = [0.4, 0.25, 0.6];
        // Arrivals come in while earlier audio is still playing
        let arrivals = [0.0, 0.1, 0.3];

        let starts: Vec<f64> = durations
            .iter()
            .zip(arrivals)
            .map(|(&d, now)| queue.schedule(d, now).start)
            .collect();

        assert_eq!(starts[0], 0.0);
        assert!((starts[1] - 0.4).abs() < 1e-12);
        assert!((starts[2] - 0.65).abs() < 1e-12);
        assert!(starts.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(queue.in_flight(), 3);
    }

    #[test]
    fn test_late_arrival_jumps_to_clock() {
        let mut queue = PlaybackQueue::new();
        queue.schedule(0.2, 0.0);
        let late = queue.schedule(0.2, 5.0);
        assert_eq!(late.start, 5.0);
        assert!((queue.cursor() - 5.2).abs() < 1e-12);
    }

    #[test]
    fn test_finish_reports_idle_only_when_empty() {
        let mut queue = PlaybackQueue::new();
        let a = queue.schedule(0.1, 0.0);
        let b = queue.schedule(0.1, 0.0);

        assert!(!queue.finish(a.id));
        assert!(queue.finish(b.id));
        assert!(queue.is_idle());
        // Unknown ids do not re-announce idle
        assert!(!queue.finish(b.id));
    }

    #[test]
    fn test_interrupt_clears_and_rewinds() {
        let mut queue = PlaybackQueue::new();
        for _ in 0..3 {
            queue.schedule(1.0, 0.0);
        }
        let stopped = queue.interrupt();

        assert_eq!(stopped.len(), 3);
        assert_eq!(queue.in_flight(), 0);
        assert_eq!(queue.cursor(), 0.0);

        let next = queue.schedule(0.5, 1.25);
        assert_eq!(next.start, 1.25);
    }

    #[test]
    fn test_ids_are_unique_across_interrupts() {
        let mut queue = PlaybackQueue::new();
        let first = queue.schedule(0.1, 0.0);
        queue.interrupt();
        let second = queue.schedule(0.1, 0.0);
        assert_ne!(first.id, second.id);
    }
}
