//! Waste drifting down the river toward the sorting bins.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::config::WaterConfig;
use crate::scheduler::{DriftMode, DriftScheduler};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WasteKind {
    Plastic,
    Metal,
    Organic,
}

impl WasteKind {
    pub const ALL: [WasteKind; 3] = [WasteKind::Plastic, WasteKind::Metal, WasteKind::Organic];

    pub fn as_str(self) -> &'static str {
        match self {
            WasteKind::Plastic => "plastic",
            WasteKind::Metal => "metal",
            WasteKind::Organic => "organic",
        }
    }

    fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        WasteKind::ALL[rng.gen_range(0..WasteKind::ALL.len())]
    }
}

impl fmt::Display for WasteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WasteKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plastic" | "plastique" => Ok(WasteKind::Plastic),
            "metal" => Ok(WasteKind::Metal),
            "organic" | "organique" => Ok(WasteKind::Organic),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WasteItem {
    pub id: u64,
    pub kind: WasteKind,
    /// Vertical lane across the river, as a fraction of its height.
    pub lane: f64,
}

/// Snapshot of an item for rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WastePosition {
    pub item: WasteItem,
    pub progress: f64,
}

#[derive(Debug)]
pub struct WasteStream {
    items: BTreeMap<u64, WasteItem>,
    drift: DriftScheduler,
    next_id: u64,
    next_spawn: Option<Instant>,
    held: Option<u64>,
    config: WaterConfig,
}

impl WasteStream {
    pub fn new(config: WaterConfig) -> Self {
        Self {
            items: BTreeMap::new(),
            drift: DriftScheduler::new(),
            next_id: 1,
            next_spawn: None,
            held: None,
            config,
        }
    }

    /// Seed the river with pre-advanced items and arm the spawn clock.
    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R, now: Instant) {
        if self.next_spawn.is_some() {
            return;
        }
        let spread_ms = self.config.initial_spread().as_millis() as u64;
        for _ in 0..self.config.initial_items() {
            let head_start = Duration::from_millis(rng.gen_range(0..=spread_ms));
            let started = now.checked_sub(head_start).unwrap_or(now);
            self.spawn(rng, started);
        }
        self.next_spawn = Some(now + self.config.spawn_interval());
        tracing::debug!(
            target: "eco_quest::waste",
            items = self.items.len(),
            "waste.stream_started"
        );
    }

    pub fn is_running(&self) -> bool {
        self.next_spawn.is_some()
    }

    fn spawn<R: Rng + ?Sized>(&mut self, rng: &mut R, started: Instant) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let item = WasteItem {
            id,
            kind: WasteKind::random(rng),
            lane: rng.gen_range(0.2..0.8),
        };
        self.items.insert(id, item);
        self.drift
            .register(id, started, self.config.travel(), DriftMode::Once);
        id
    }

    /// Spawn due items and drop the ones that left the river.
    /// Returns the ids spawned this tick.
    pub fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R, now: Instant) -> Vec<u64> {
        let mut spawned = Vec::new();
        while let Some(due) = self.next_spawn {
            if now < due {
                break;
            }
            spawned.push(self.spawn(rng, due));
            self.next_spawn = Some(due + self.config.spawn_interval());
        }
        for id in self.drift.tick(now).finished {
            self.items.remove(&id);
            if self.held == Some(id) {
                self.held = None;
            }
        }
        spawned
    }

    pub fn positions(&self, now: Instant) -> Vec<WastePosition> {
        self.items
            .values()
            .filter_map(|item| {
                self.drift.progress(item.id, now).map(|progress| WastePosition {
                    item: *item,
                    progress,
                })
            })
            .collect()
    }

    pub fn get(&self, id: u64) -> Option<&WasteItem> {
        self.items.get(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Pick up an item; mouse and touch both start here.
    pub fn grab(&mut self, id: u64) -> bool {
        if self.items.contains_key(&id) {
            self.held = Some(id);
            true
        } else {
            false
        }
    }

    pub fn held(&self) -> Option<u64> {
        self.held
    }

    /// Release the held item over a bin.
    pub fn drop_held(&mut self, bin: WasteKind) -> Option<bool> {
        let id = self.held.take()?;
        self.sort(id, bin)
    }

    /// Sort `id` into `bin`, removing it. `None` when the item is gone.
    pub fn sort(&mut self, id: u64, bin: WasteKind) -> Option<bool> {
        let item = self.items.remove(&id)?;
        self.drift.remove(id);
        if self.held == Some(id) {
            self.held = None;
        }
        Some(item.kind == bin)
    }
}
