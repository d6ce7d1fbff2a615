//! Read-only cache of server-owned game state.

use eco_proto::EnvironmentMetrics;

use crate::config::TimerConfig;

/// Display band for a metric or gauge value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Good,
    Warning,
    Critical,
}

impl Tone {
    /// Tone for an environmental gauge on the shared `[0, 100]` scale.
    pub fn for_level(value: f64) -> Tone {
        if value >= 70.0 {
            Tone::Good
        } else if value >= 40.0 {
            Tone::Warning
        } else {
            Tone::Critical
        }
    }
}

/// Clamp a server value into the displayable range.
pub fn clamp_display(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Energy,
    WaterPollution,
    AirCo2,
    AirO2,
    FloraHealth,
}

impl MetricKind {
    pub const ALL: [MetricKind; 5] = [
        MetricKind::Energy,
        MetricKind::WaterPollution,
        MetricKind::AirCo2,
        MetricKind::AirO2,
        MetricKind::FloraHealth,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MetricKind::Energy => "Energy",
            MetricKind::WaterPollution => "Water pollution",
            MetricKind::AirCo2 => "Air CO2",
            MetricKind::AirO2 => "Air O2",
            MetricKind::FloraHealth => "Flora health",
        }
    }

    pub fn read(self, metrics: &EnvironmentMetrics) -> f64 {
        match self {
            MetricKind::Energy => metrics.energy_level,
            MetricKind::WaterPollution => metrics.water_pollution,
            MetricKind::AirCo2 => metrics.air_co2,
            MetricKind::AirO2 => metrics.air_o2,
            MetricKind::FloraHealth => metrics.flora_health,
        }
    }

    /// Pollution and CO2 are better when low; the defeat screen judges them
    /// against 50 from the other side.
    pub fn lower_is_better(self) -> bool {
        matches!(self, MetricKind::WaterPollution | MetricKind::AirCo2)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricReading {
    pub kind: MetricKind,
    /// Clamped and rounded for display.
    pub value: u8,
    pub tone: Tone,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsView {
    pub readings: Vec<MetricReading>,
    /// `[pollution, cleanliness]`
    pub water_chart: [f64; 2],
    /// `[co2, o2]`
    pub air_chart: [f64; 2],
}

impl MetricsView {
    pub fn from_metrics(metrics: &EnvironmentMetrics) -> Self {
        let readings = MetricKind::ALL
            .iter()
            .map(|kind| {
                let clamped = clamp_display(kind.read(metrics));
                MetricReading {
                    kind: *kind,
                    value: clamped.round() as u8,
                    tone: Tone::for_level(clamped),
                }
            })
            .collect();
        let pollution = clamp_display(metrics.water_pollution);
        Self {
            readings,
            water_chart: [pollution, 100.0 - pollution],
            air_chart: [clamp_display(metrics.air_co2), clamp_display(metrics.air_o2)],
        }
    }
}

/// Visual urgency of the countdown. Ordered so escalation compares upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum TimerUrgency {
    #[default]
    Normal,
    Warning,
    Urgent,
}

impl TimerUrgency {
    pub fn pulses(self) -> bool {
        self == TimerUrgency::Urgent
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerView {
    pub label: String,
    pub urgency: TimerUrgency,
}

pub fn format_countdown(remaining: u32) -> String {
    format!("{}:{:02}", remaining / 60, remaining % 60)
}

/// Last-known metrics and countdown, overwritten only by server pushes.
#[derive(Debug, Clone)]
pub struct GameStateMirror {
    metrics: Option<EnvironmentMetrics>,
    revision: u64,
    remaining: Option<u32>,
    urgency: TimerUrgency,
    timer: TimerConfig,
}

impl GameStateMirror {
    pub fn new(timer: TimerConfig) -> Self {
        Self {
            metrics: None,
            revision: 0,
            remaining: None,
            urgency: TimerUrgency::Normal,
            timer,
        }
    }

    /// Replace the cached snapshot wholesale and return the fresh view.
    pub fn apply_state_update(&mut self, metrics: EnvironmentMetrics) -> MetricsView {
        self.metrics = Some(metrics);
        self.revision += 1;
        tracing::trace!(
            target: "eco_quest::mirror",
            revision = self.revision,
            "state.applied"
        );
        MetricsView::from_metrics(&metrics)
    }

    /// Update the countdown. Urgency only ever escalates.
    pub fn apply_timer_update(&mut self, remaining: u32) -> TimerView {
        self.remaining = Some(remaining);
        let level = if remaining < self.timer.urgent_below_secs() {
            TimerUrgency::Urgent
        } else if remaining < self.timer.warning_below_secs() {
            TimerUrgency::Warning
        } else {
            TimerUrgency::Normal
        };
        if level > self.urgency {
            tracing::debug!(
                target: "eco_quest::mirror",
                remaining,
                urgency = ?level,
                "timer.escalated"
            );
            self.urgency = level;
        }
        TimerView {
            label: format_countdown(remaining),
            urgency: self.urgency,
        }
    }

    pub fn metrics(&self) -> Option<&EnvironmentMetrics> {
        self.metrics.as_ref()
    }

    pub fn metrics_view(&self) -> Option<MetricsView> {
        self.metrics.as_ref().map(MetricsView::from_metrics)
    }

    pub fn timer_view(&self) -> Option<TimerView> {
        self.remaining.map(|remaining| TimerView {
            label: format_countdown(remaining),
            urgency: self.urgency,
        })
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}
