//! EcoQuest game client core.
//!
//! Holds everything a front end needs to play: the event channel and REST
//! plumbing, the mirrored game state, the room puzzles, chat and the
//! notification surface. Rendering lives in the front end crates.

pub mod capability;
pub mod chat;
pub mod chemical;
pub mod command_text;
pub mod config;
pub mod energy;
pub mod final_code;
pub mod lobby;
pub mod mirror;
pub mod presenter;
pub mod rest;
pub mod scheduler;
pub mod session;
pub mod transport;
pub mod verdict;
pub mod waste;
pub mod water;

pub use capability::{detect_system_speech, Speech, SpeechCapabilities};
pub use chat::{run_chat_worker, ChatApi, ChatError, ChatRelay, ChatRequest, ChatUpdate};
pub use command_text::{parse_command_line, CommandParseError, PlayerCommand};
pub use config::{
    load_client_config, load_client_config_from_env, ClientConfig, ConfigError,
    CLIENT_CONFIG_ENV,
};
pub use final_code::{prepare_final_code, submit_final_code, FinalCodeApi, FinalCodeError};
pub use lobby::{run_lobby_poller, LobbyApi, LobbyState, LobbyUpdate};
pub use mirror::{GameStateMirror, MetricsView, Tone, TimerUrgency, TimerView};
pub use presenter::{Banner, BannerKind, NavTarget, Notice, Overlay, Presenter};
pub use rest::{RestClient, RestError};
pub use session::{GameSession, SessionTick};
pub use transport::{
    start_event_channel, EventChannel, EventChannelHandle, IntentSink, SubscriberRegistry,
    TransportError,
};
pub use verdict::{ClientGuess, ServerVerdict};
