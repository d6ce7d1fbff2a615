//! Chemical neutralization: lime raises pH, the aerator raises dissolved O2.

use eco_proto::PuzzleIntent;

use crate::config::ChemicalConfig;
use crate::mirror::Tone;
use crate::verdict::ClientGuess;

#[derive(Debug, Clone, PartialEq)]
pub struct ChemicalAdjustment {
    pub value: f64,
    pub tone: Tone,
    pub intent: PuzzleIntent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChemicalValidation {
    pub guess: ClientGuess,
    pub intent: PuzzleIntent,
    /// Set when either reading is out of range.
    pub failure: Option<String>,
}

/// pH and O2 levels, held in tenths.
#[derive(Debug, Clone)]
pub struct ChemicalBalance {
    ph: i32,
    o2: i32,
    config: ChemicalConfig,
}

fn from_tenths(value: i32) -> f64 {
    f64::from(value) / 10.0
}

/// Tone of a gauge reading against a target band of `target ± tolerance`.
fn gauge_tone(value: i32, target: i32, tolerance: i32) -> Tone {
    let offset = (value - target).abs();
    if offset <= tolerance {
        Tone::Good
    } else if offset < 10 {
        Tone::Warning
    } else {
        Tone::Critical
    }
}

impl ChemicalBalance {
    pub fn new(config: ChemicalConfig) -> Self {
        Self {
            ph: config.ph_start_tenths(),
            o2: config.o2_start_tenths(),
            config,
        }
    }

    pub fn ph(&self) -> f64 {
        from_tenths(self.ph)
    }

    pub fn o2(&self) -> f64 {
        from_tenths(self.o2)
    }

    pub fn ph_tone(&self) -> Tone {
        gauge_tone(
            self.ph,
            self.config.ph_target_tenths(),
            self.config.tolerance_tenths(),
        )
    }

    pub fn o2_tone(&self) -> Tone {
        gauge_tone(
            self.o2,
            self.config.o2_target_tenths(),
            self.config.tolerance_tenths(),
        )
    }

    pub fn add_lime(&mut self) -> ChemicalAdjustment {
        self.ph = (self.ph + self.config.ph_step_tenths()).min(self.config.ph_max_tenths());
        let value = self.ph();
        tracing::debug!(target: "eco_quest::chemical", ph = value, "chemical.lime_added");
        ChemicalAdjustment {
            value,
            tone: self.ph_tone(),
            intent: PuzzleIntent::AdjustPh { value },
        }
    }

    pub fn activate_aerator(&mut self) -> ChemicalAdjustment {
        self.o2 = (self.o2 + self.config.o2_step_tenths()).min(self.config.o2_max_tenths());
        let value = self.o2();
        tracing::debug!(target: "eco_quest::chemical", o2 = value, "chemical.aerated");
        ChemicalAdjustment {
            value,
            tone: self.o2_tone(),
            intent: PuzzleIntent::AdjustO2 { value },
        }
    }

    pub fn validate(&self) -> ChemicalValidation {
        let tolerance = self.config.tolerance_tenths();
        let ph_ok = (self.ph - self.config.ph_target_tenths()).abs() < tolerance;
        let o2_ok = (self.o2 - self.config.o2_target_tenths()).abs() < tolerance;
        let correct = ph_ok && o2_ok;

        let failure = (!correct).then(|| {
            let mut parts = vec!["Chemical imbalance:".to_string()];
            if !ph_ok {
                parts.push(format!(
                    "pH off target (aim for ~{:.1})",
                    from_tenths(self.config.ph_target_tenths())
                ));
            }
            if !o2_ok {
                parts.push(format!(
                    "O2 off target (aim for ~{:.1} mg/L)",
                    from_tenths(self.config.o2_target_tenths())
                ));
            }
            parts.join(" ")
        });

        tracing::info!(
            target: "eco_quest::chemical",
            correct,
            ph = self.ph(),
            o2 = self.o2(),
            "chemical.validated"
        );
        ChemicalValidation {
            guess: ClientGuess::new(correct),
            intent: PuzzleIntent::ValidateChemical {
                correct,
                ph: self.ph(),
                o2: self.o2(),
            },
            failure,
        }
    }
}
