//! Tick-driven movement of decorative and conveyor items.

use std::time::{Duration, Instant};

use ahash::AHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftMode {
    /// Travel once across the path and de-register at the end.
    Once,
    /// Wrap back to the start, forever.
    Loop,
}

#[derive(Debug, Clone)]
struct DriftTrack {
    started: Instant,
    duration: Duration,
    mode: DriftMode,
}

impl DriftTrack {
    fn progress(&self, now: Instant) -> f64 {
        if now <= self.started {
            return 0.0;
        }
        let elapsed = now.duration_since(self.started).as_secs_f64();
        let total = self.duration.as_secs_f64().max(f64::EPSILON);
        match self.mode {
            DriftMode::Once => elapsed / total,
            DriftMode::Loop => (elapsed / total).fract(),
        }
    }
}

/// Result of advancing the scheduler by one tick.
#[derive(Debug, Default, PartialEq)]
pub struct DriftTick {
    /// Ids that reached the end of a one-shot path this tick.
    pub finished: Vec<u64>,
}

/// Keeps every moving item in one table and advances them on demand.
#[derive(Debug, Default)]
pub struct DriftScheduler {
    tracks: AHashMap<u64, DriftTrack>,
}

impl DriftScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id`. A start in the past yields a pre-advanced item.
    pub fn register(&mut self, id: u64, started: Instant, duration: Duration, mode: DriftMode) {
        self.tracks.insert(
            id,
            DriftTrack {
                started,
                duration,
                mode,
            },
        );
    }

    pub fn remove(&mut self, id: u64) -> bool {
        self.tracks.remove(&id).is_some()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.tracks.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Position along the path in `[0, 1)`.
    pub fn progress(&self, id: u64, now: Instant) -> Option<f64> {
        self.tracks
            .get(&id)
            .map(|track| track.progress(now).clamp(0.0, 1.0))
            .filter(|progress| *progress < 1.0)
    }

    /// De-register one-shot items whose travel completed.
    pub fn tick(&mut self, now: Instant) -> DriftTick {
        let mut finished: Vec<u64> = self
            .tracks
            .iter()
            .filter(|(_, track)| track.mode == DriftMode::Once && track.progress(now) >= 1.0)
            .map(|(id, _)| *id)
            .collect();
        finished.sort_unstable();
        for id in &finished {
            self.tracks.remove(id);
        }
        if !finished.is_empty() {
            tracing::trace!(
                target: "eco_quest::drift",
                count = finished.len(),
                "drift.finished"
            );
        }
        DriftTick { finished }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_items_deregister_at_end() {
        let start = Instant::now();
        let mut scheduler = DriftScheduler::new();
        scheduler.register(1, start, Duration::from_secs(30), DriftMode::Once);
        scheduler.register(2, start, Duration::from_secs(10), DriftMode::Once);

        let tick = scheduler.tick(start + Duration::from_secs(15));
        assert_eq!(tick.finished, vec![2]);
        assert!(scheduler.contains(1));
        assert!(!scheduler.contains(2));

        let progress = scheduler.progress(1, start + Duration::from_secs(15)).unwrap();
        assert!((progress - 0.5).abs() < 1e-9);
    }

    #[test]
    fn looping_items_wrap_and_never_finish() {
        let start = Instant::now();
        let mut scheduler = DriftScheduler::new();
        scheduler.register(7, start, Duration::from_secs(12), DriftMode::Loop);
        let later = start + Duration::from_secs(15);
        assert!(scheduler.tick(later).finished.is_empty());
        let progress = scheduler.progress(7, later).unwrap();
        assert!((progress - 0.25).abs() < 1e-9);
    }

    #[test]
    fn future_start_reads_as_not_yet_moving() {
        let now = Instant::now();
        let mut scheduler = DriftScheduler::new();
        scheduler.register(3, now + Duration::from_secs(2), Duration::from_secs(5), DriftMode::Loop);
        assert_eq!(scheduler.progress(3, now), Some(0.0));
    }
}
