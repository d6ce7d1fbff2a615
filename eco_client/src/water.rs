//! Water room: sort the drifting waste, then balance the chemistry.

use std::time::Instant;

use eco_proto::PuzzleIntent;
use rand::Rng;

use crate::chemical::{ChemicalAdjustment, ChemicalBalance};
use crate::config::{ChemicalConfig, WaterConfig};
use crate::presenter::{BannerKind, Notice};
use crate::scheduler::{DriftMode, DriftScheduler};
use crate::verdict::ClientGuess;
use crate::waste::{WasteKind, WasteStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaterPhase {
    Sorting,
    Chemical,
}

/// What a water action produced: intents for the server, a local notice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaterOutcome {
    pub guess: Option<ClientGuess>,
    pub intents: Vec<PuzzleIntent>,
    pub notice: Option<Notice>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fish {
    pub id: u64,
    pub lane: f64,
}

#[derive(Debug)]
pub struct WaterPuzzle {
    purity: u8,
    phase: WaterPhase,
    stream: WasteStream,
    chemical: ChemicalBalance,
    bonus_granted: bool,
    completion_sent: bool,
    fish: Vec<Fish>,
    fish_pending: Vec<Instant>,
    fish_drift: DriftScheduler,
    modal_due: Option<Instant>,
    modal_open: bool,
    config: WaterConfig,
}

impl WaterPuzzle {
    pub fn new(config: WaterConfig, chemical: ChemicalConfig) -> Self {
        Self {
            purity: 0,
            phase: WaterPhase::Sorting,
            stream: WasteStream::new(config.clone()),
            chemical: ChemicalBalance::new(chemical),
            bonus_granted: false,
            completion_sent: false,
            fish: Vec::new(),
            fish_pending: Vec::new(),
            fish_drift: DriftScheduler::new(),
            modal_due: None,
            modal_open: false,
            config,
        }
    }

    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R, now: Instant) {
        self.stream.start(rng, now);
    }

    pub fn purity(&self) -> u8 {
        self.purity
    }

    pub fn phase(&self) -> WaterPhase {
        self.phase
    }

    pub fn stream(&self) -> &WasteStream {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut WasteStream {
        &mut self.stream
    }

    pub fn chemical(&self) -> &ChemicalBalance {
        &self.chemical
    }

    pub fn fish(&self) -> &[Fish] {
        &self.fish
    }

    pub fn fish_progress(&self, id: u64, now: Instant) -> Option<f64> {
        self.fish_drift.progress(id, now)
    }

    /// Advance the river, release queued fish, and fire the completion modal.
    /// Returns `true` when the modal opened this tick.
    pub fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R, now: Instant) -> bool {
        self.stream.tick(rng, now);

        let (min_ms, max_ms) = self.config.fish_swim_range_ms();
        let (due, waiting): (Vec<Instant>, Vec<Instant>) =
            self.fish_pending.iter().partition(|at| **at <= now);
        self.fish_pending = waiting;
        for at in due {
            let id = self.fish.len() as u64 + 1;
            let duration = std::time::Duration::from_millis(rng.gen_range(min_ms..=max_ms));
            self.fish_drift.register(id, at, duration, DriftMode::Loop);
            self.fish.push(Fish {
                id,
                lane: rng.gen_range(0.2..0.8),
            });
        }

        match self.modal_due {
            Some(due) if now >= due => {
                self.modal_due = None;
                self.modal_open = true;
                true
            }
            _ => false,
        }
    }

    fn apply_purity(&mut self, delta: i16, outcome: &mut WaterOutcome) {
        let next = (i16::from(self.purity) + delta).clamp(0, 100) as u8;
        self.purity = next;
        if self.phase == WaterPhase::Sorting && next >= self.config.chemical_phase_at() {
            self.phase = WaterPhase::Chemical;
            tracing::info!(target: "eco_quest::water", purity = next, "water.chemical_phase");
        }
        if next >= 100 && !self.completion_sent {
            self.completion_sent = true;
            outcome
                .intents
                .push(PuzzleIntent::CompleteWater { purity: next });
        }
    }

    /// Sort an item into a bin. Unknown or already-sorted items are ignored.
    pub fn sort(&mut self, id: u64, bin: WasteKind) -> Option<WaterOutcome> {
        let correct = self.stream.sort(id, bin)?;
        Some(self.sorted(correct))
    }

    /// Release whatever item is held over a bin.
    pub fn drop_held(&mut self, bin: WasteKind) -> Option<WaterOutcome> {
        let correct = self.stream.drop_held(bin)?;
        Some(self.sorted(correct))
    }

    fn sorted(&mut self, correct: bool) -> WaterOutcome {
        let mut outcome = WaterOutcome {
            guess: Some(ClientGuess::new(correct)),
            intents: vec![PuzzleIntent::SortWaste { correct }],
            notice: None,
        };
        let delta = if correct {
            i16::from(self.config.sort_reward())
        } else {
            -i16::from(self.config.sort_penalty())
        };
        self.apply_purity(delta, &mut outcome);
        outcome.notice = Some(if correct {
            Notice::new(BannerKind::Success, "Good sort! Purity increased.")
        } else {
            Notice::new(BannerKind::Error, "Wrong bin. Pollution increased.")
        });
        tracing::debug!(
            target: "eco_quest::water",
            correct,
            purity = self.purity,
            "water.sorted"
        );
        outcome
    }

    pub fn add_lime(&mut self) -> ChemicalAdjustment {
        self.chemical.add_lime()
    }

    pub fn activate_aerator(&mut self) -> ChemicalAdjustment {
        self.chemical.activate_aerator()
    }

    /// Check the chemistry. The first success grants the purity bonus and
    /// releases the fish.
    pub fn validate_chemical(&mut self, now: Instant) -> WaterOutcome {
        let validation = self.chemical.validate();
        let mut outcome = WaterOutcome {
            guess: Some(validation.guess),
            intents: vec![validation.intent],
            notice: None,
        };
        match validation.failure {
            Some(message) => {
                outcome.notice = Some(Notice::new(BannerKind::Error, message));
            }
            None => {
                if !self.bonus_granted {
                    self.bonus_granted = true;
                    self.apply_purity(i16::from(self.config.chemical_bonus()), &mut outcome);
                    let stagger = self.config.fish_stagger();
                    self.fish_pending
                        .extend((0..self.config.fish_count()).map(|i| now + stagger * i as u32));
                }
                outcome.notice = Some(Notice::new(
                    BannerKind::Success,
                    "Chemical balance reached!",
                ));
            }
        }
        outcome
    }

    /// Arm the follow-up modal shown after the server confirms the river.
    pub fn schedule_completion_modal(&mut self, now: Instant) {
        self.modal_due = Some(now + self.config.completion_modal_delay());
    }

    pub fn modal_open(&self) -> bool {
        self.modal_open
    }

    pub fn close_modal(&mut self) {
        self.modal_open = false;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::*;

    fn water() -> (WaterPuzzle, SmallRng, Instant) {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut water = WaterPuzzle::new(WaterConfig::default(), ChemicalConfig::default());
        let now = Instant::now() + Duration::from_secs(60);
        water.start(&mut rng, now);
        (water, rng, now)
    }

    fn sort_correctly(water: &mut WaterPuzzle, now: Instant, rng: &mut SmallRng) -> WaterOutcome {
        let mut clock = now;
        loop {
            if let Some(item) = water.stream().positions(now).first().map(|p| p.item) {
                return water.sort(item.id, item.kind).unwrap();
            }
            clock += Duration::from_secs(4);
            water.stream_mut().tick(rng, clock);
        }
    }

    fn balance(water: &mut WaterPuzzle) {
        for _ in 0..7 {
            water.add_lime();
        }
        for _ in 0..10 {
            water.activate_aerator();
        }
    }

    #[test]
    fn wrong_sort_from_zero_stays_at_zero() {
        let (mut water, _, now) = water();
        let item = water.stream().positions(now)[0].item;
        let wrong = WasteKind::ALL.into_iter().find(|k| *k != item.kind).unwrap();
        let outcome = water.sort(item.id, wrong).unwrap();
        assert_eq!(water.purity(), 0);
        assert_eq!(outcome.intents, vec![PuzzleIntent::SortWaste { correct: false }]);
        assert_eq!(outcome.notice.unwrap().kind, BannerKind::Error);
        assert!(water.sort(item.id, item.kind).is_none());
    }

    #[test]
    fn crossing_half_purity_enters_chemical_phase() {
        let (mut water, mut rng, now) = water();
        for _ in 0..9 {
            sort_correctly(&mut water, now, &mut rng);
        }
        assert_eq!(water.purity(), 45);
        assert_eq!(water.phase(), WaterPhase::Sorting);
        sort_correctly(&mut water, now, &mut rng);
        assert_eq!(water.purity(), 50);
        assert_eq!(water.phase(), WaterPhase::Chemical);
    }

    #[test]
    fn chemical_bonus_is_granted_once_and_completes_water() {
        let (mut water, mut rng, now) = water();
        for _ in 0..10 {
            sort_correctly(&mut water, now, &mut rng);
        }
        balance(&mut water);

        let first = water.validate_chemical(now);
        assert_eq!(water.purity(), 100);
        assert_eq!(
            first.intents,
            vec![
                PuzzleIntent::ValidateChemical {
                    correct: true,
                    ph: 7.0,
                    o2: 8.2
                },
                PuzzleIntent::CompleteWater { purity: 100 },
            ]
        );

        let second = water.validate_chemical(now);
        assert_eq!(second.intents.len(), 1);
        assert_eq!(water.purity(), 100);
    }

    #[test]
    fn fish_are_released_one_per_second() {
        let (mut water, mut rng, now) = water();
        balance(&mut water);
        water.validate_chemical(now);
        assert_eq!(water.purity(), 50);

        water.tick(&mut rng, now);
        assert_eq!(water.fish().len(), 1);
        water.tick(&mut rng, now + Duration::from_millis(2_500));
        assert_eq!(water.fish().len(), 3);
        water.tick(&mut rng, now + Duration::from_secs(10));
        assert_eq!(water.fish().len(), 5);
        assert!(water.fish_progress(5, now + Duration::from_secs(60)).is_some());
    }

    #[test]
    fn failed_chemistry_grants_nothing() {
        let (mut water, _, now) = water();
        let outcome = water.validate_chemical(now);
        assert_eq!(water.purity(), 0);
        assert_eq!(outcome.guess, Some(ClientGuess::new(false)));
        assert_eq!(outcome.notice.unwrap().kind, BannerKind::Error);
    }

    #[test]
    fn completion_modal_opens_after_delay() {
        let (mut water, mut rng, now) = water();
        water.schedule_completion_modal(now);
        assert!(!water.tick(&mut rng, now + Duration::from_secs(2)));
        assert!(water.tick(&mut rng, now + Duration::from_secs(3)));
        assert!(water.modal_open());
        water.close_modal();
        assert!(!water.modal_open());
    }
}
