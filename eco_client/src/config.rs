use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

pub const BUILTIN_CLIENT_CONFIG: &str = include_str!("data/client_config.json");

/// Environment variable naming an override config file.
pub const CLIENT_CONFIG_ENV: &str = "ECO_CLIENT_CONFIG_PATH";

/// Tunables for the EcoQuest client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub event_endpoint: String,
    pub http_base: String,
    pub reconnect_delay_ms: u64,
    pub chat: ChatConfig,
    pub lobby: LobbyConfig,
    pub presenter: PresenterConfig,
    pub timer: TimerConfig,
    pub energy: EnergyConfig,
    pub water: WaterConfig,
    pub chemical: ChemicalConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            event_endpoint: "127.0.0.1:5001".to_string(),
            http_base: "http://127.0.0.1:5000".to_string(),
            reconnect_delay_ms: 2_000,
            chat: ChatConfig::default(),
            lobby: LobbyConfig::default(),
            presenter: PresenterConfig::default(),
            timer: TimerConfig::default(),
            energy: EnergyConfig::default(),
            water: WaterConfig::default(),
            chemical: ChemicalConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn builtin() -> Arc<Self> {
        match Self::from_json_str(BUILTIN_CLIENT_CONFIG) {
            Ok(config) => Arc::new(config),
            Err(err) => {
                tracing::warn!(
                    target: "eco_quest::config",
                    error = %err,
                    "client_config.builtin_invalid"
                );
                Arc::new(Self::default())
            }
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse client config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read client config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Load the config named by `ECO_CLIENT_CONFIG_PATH`, falling back to the
/// builtin defaults when the variable is unset or the file is unusable.
pub fn load_client_config_from_env() -> Arc<ClientConfig> {
    let Some(path) = env::var(CLIENT_CONFIG_ENV).ok().map(PathBuf::from) else {
        return ClientConfig::builtin();
    };
    load_client_config(&path)
}

pub fn load_client_config(path: &Path) -> Arc<ClientConfig> {
    match ClientConfig::from_file(path) {
        Ok(config) => Arc::new(config),
        Err(err) => {
            tracing::warn!(
                target: "eco_quest::config",
                path = %path.display(),
                error = %err,
                "client_config.load_failed"
            );
            ClientConfig::builtin()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    poll_interval_ms: u64,
    max_message_len: usize,
}

impl ChatConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn max_message_len(&self) -> usize {
        self.max_message_len
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            max_message_len: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    poll_interval_ms: u64,
}

impl LobbyConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PresenterConfig {
    banner_duration_ms: u64,
    final_code_redirect_ms: u64,
    victory_redirect_ms: u64,
    reset_redirect_ms: u64,
    completion_confetti: u32,
    victory_confetti: u32,
}

impl PresenterConfig {
    pub fn banner_duration(&self) -> Duration {
        Duration::from_millis(self.banner_duration_ms)
    }

    pub fn final_code_redirect(&self) -> Duration {
        Duration::from_millis(self.final_code_redirect_ms)
    }

    pub fn victory_redirect(&self) -> Duration {
        Duration::from_millis(self.victory_redirect_ms)
    }

    pub fn reset_redirect(&self) -> Duration {
        Duration::from_millis(self.reset_redirect_ms)
    }

    pub fn completion_confetti(&self) -> u32 {
        self.completion_confetti
    }

    pub fn victory_confetti(&self) -> u32 {
        self.victory_confetti
    }
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self {
            banner_duration_ms: 3_000,
            final_code_redirect_ms: 2_000,
            victory_redirect_ms: 3_000,
            reset_redirect_ms: 2_000,
            completion_confetti: 50,
            victory_confetti: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    warning_below_secs: u32,
    urgent_below_secs: u32,
}

impl TimerConfig {
    pub fn warning_below_secs(&self) -> u32 {
        self.warning_below_secs
    }

    pub fn urgent_below_secs(&self) -> u32 {
        self.urgent_below_secs
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            warning_below_secs: 180,
            urgent_below_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    success_modal_delay_ms: u64,
}

impl EnergyConfig {
    pub fn success_modal_delay(&self) -> Duration {
        Duration::from_millis(self.success_modal_delay_ms)
    }
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            success_modal_delay_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WaterConfig {
    spawn_interval_ms: u64,
    initial_items: usize,
    initial_spread_ms: u64,
    travel_ms: u64,
    sort_reward: u8,
    sort_penalty: u8,
    chemical_phase_at: u8,
    chemical_bonus: u8,
    completion_modal_delay_ms: u64,
    fish_count: usize,
    fish_stagger_ms: u64,
    fish_swim_min_ms: u64,
    fish_swim_max_ms: u64,
}

impl WaterConfig {
    pub fn spawn_interval(&self) -> Duration {
        Duration::from_millis(self.spawn_interval_ms.max(1))
    }

    pub fn initial_items(&self) -> usize {
        self.initial_items
    }

    pub fn initial_spread(&self) -> Duration {
        Duration::from_millis(self.initial_spread_ms)
    }

    pub fn travel(&self) -> Duration {
        Duration::from_millis(self.travel_ms.max(1))
    }

    pub fn sort_reward(&self) -> u8 {
        self.sort_reward
    }

    pub fn sort_penalty(&self) -> u8 {
        self.sort_penalty
    }

    pub fn chemical_phase_at(&self) -> u8 {
        self.chemical_phase_at.min(100)
    }

    pub fn chemical_bonus(&self) -> u8 {
        self.chemical_bonus
    }

    pub fn completion_modal_delay(&self) -> Duration {
        Duration::from_millis(self.completion_modal_delay_ms)
    }

    pub fn fish_count(&self) -> usize {
        self.fish_count
    }

    pub fn fish_stagger(&self) -> Duration {
        Duration::from_millis(self.fish_stagger_ms)
    }

    /// Inclusive range of a single fish crossing, in milliseconds.
    pub fn fish_swim_range_ms(&self) -> (u64, u64) {
        let min = self.fish_swim_min_ms.max(1);
        (min, self.fish_swim_max_ms.max(min))
    }
}

impl Default for WaterConfig {
    fn default() -> Self {
        Self {
            spawn_interval_ms: 3_500,
            initial_items: 5,
            initial_spread_ms: 15_000,
            travel_ms: 30_000,
            sort_reward: 5,
            sort_penalty: 3,
            chemical_phase_at: 50,
            chemical_bonus: 50,
            completion_modal_delay_ms: 3_000,
            fish_count: 5,
            fish_stagger_ms: 1_000,
            fish_swim_min_ms: 12_000,
            fish_swim_max_ms: 20_000,
        }
    }
}

/// Chemical levels are tracked in tenths so repeated increments stay exact.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChemicalConfig {
    ph_start: f64,
    ph_step: f64,
    ph_max: f64,
    ph_target: f64,
    o2_start: f64,
    o2_step: f64,
    o2_max: f64,
    o2_target: f64,
    tolerance: f64,
}

pub(crate) fn to_tenths(value: f64) -> i32 {
    if value.is_finite() {
        (value * 10.0).round() as i32
    } else {
        0
    }
}

impl ChemicalConfig {
    pub fn ph_start_tenths(&self) -> i32 {
        to_tenths(self.ph_start)
    }

    pub fn ph_step_tenths(&self) -> i32 {
        to_tenths(self.ph_step)
    }

    pub fn ph_max_tenths(&self) -> i32 {
        to_tenths(self.ph_max)
    }

    pub fn ph_target_tenths(&self) -> i32 {
        to_tenths(self.ph_target)
    }

    pub fn o2_start_tenths(&self) -> i32 {
        to_tenths(self.o2_start)
    }

    pub fn o2_step_tenths(&self) -> i32 {
        to_tenths(self.o2_step)
    }

    pub fn o2_max_tenths(&self) -> i32 {
        to_tenths(self.o2_max)
    }

    pub fn o2_target_tenths(&self) -> i32 {
        to_tenths(self.o2_target)
    }

    pub fn tolerance_tenths(&self) -> i32 {
        to_tenths(self.tolerance)
    }
}

impl Default for ChemicalConfig {
    fn default() -> Self {
        Self {
            ph_start: 5.6,
            ph_step: 0.2,
            ph_max: 9.0,
            ph_target: 7.0,
            o2_start: 3.2,
            o2_step: 0.5,
            o2_max: 10.0,
            o2_target: 8.0,
            tolerance: 0.5,
        }
    }
}
