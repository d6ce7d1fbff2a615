//! Wire contract between the EcoQuest client and the game server.
//!
//! The event channel carries length-prefixed JSON frames of the form
//! `{"event": <name>, "data": <payload>}`. The REST surfaces (chat, lobby,
//! final code) use plain JSON bodies.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Largest frame payload either side accepts.
pub const MAX_FRAME_LEN: usize = 1 << 20;

/// Handshake frame sent by the client on every (re)connect.
pub const HELLO_EVENT: &str = "hello";

/// Event name carrying every puzzle intent.
pub const ACTION_EVENT: &str = "action";

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame of {len} bytes exceeds limit of {MAX_FRAME_LEN}")]
    TooLarge { len: usize },
    #[error("malformed frame json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown event '{0}'")]
    UnknownEvent(String),
    #[error("unknown room '{0}'")]
    UnknownRoom(String),
    #[error("invalid payload for event '{event}': {source}")]
    InvalidPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Raw event frame as it travels over the channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventFrame {
    pub event: String,
    #[serde(default)]
    pub data: JsonValue,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, data: JsonValue) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn hello(username: &str) -> Self {
        Self::new(HELLO_EVENT, serde_json::json!({ "username": username }))
    }
}

/// Server-owned environmental gauges, each nominally in `[0, 100]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct EnvironmentMetrics {
    pub energy_level: f64,
    pub water_pollution: f64,
    pub air_co2: f64,
    pub air_o2: f64,
    pub flora_health: f64,
}

/// Game rooms in unlock order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Room {
    Energy,
    Water,
    Air,
    Flora,
}

impl Room {
    pub const ALL: [Room; 4] = [Room::Energy, Room::Water, Room::Air, Room::Flora];

    /// Name the server uses for the room.
    pub fn wire_name(self) -> &'static str {
        match self {
            Room::Energy => "Energie",
            Room::Water => "Eau",
            Room::Air => "Air",
            Room::Flora => "Flore",
        }
    }

    pub fn from_wire(name: &str) -> Option<Room> {
        match name {
            "Energie" => Some(Room::Energy),
            "Eau" => Some(Room::Water),
            "Air" => Some(Room::Air),
            "Flore" => Some(Room::Flora),
            _ => None,
        }
    }

    pub fn next(self) -> Option<Room> {
        match self {
            Room::Energy => Some(Room::Water),
            Room::Water => Some(Room::Air),
            Room::Air => Some(Room::Flora),
            Room::Flora => None,
        }
    }
}

impl std::fmt::Display for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Events pushed by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    TimerUpdate { remaining: u32 },
    StateUpdate(EnvironmentMetrics),
    Feedback { message: String },
    PuzzleCompleted { room: String },
    RoomUnlocked { room: String },
    GameOver { message: String },
    Victory(EnvironmentMetrics),
    Defeat(EnvironmentMetrics),
    Error { message: String },
    RedirectToFinal,
    VictoryAchieved {
        validator: String,
        message: Option<String>,
    },
    GameReset { message: String },
    RoomSelected { room: String },
}

#[derive(Deserialize)]
struct TimerPayload {
    remaining: i64,
}

#[derive(Serialize, Deserialize)]
struct MessagePayload {
    message: String,
}

#[derive(Serialize, Deserialize)]
struct RoomPayload {
    room: String,
}

#[derive(Serialize, Deserialize)]
struct VictoryAchievedPayload {
    validator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::TimerUpdate { .. } => "timer_update",
            ServerEvent::StateUpdate(_) => "state_update",
            ServerEvent::Feedback { .. } => "feedback",
            ServerEvent::PuzzleCompleted { .. } => "puzzle_completed",
            ServerEvent::RoomUnlocked { .. } => "room_unlocked",
            ServerEvent::GameOver { .. } => "game_over",
            ServerEvent::Victory(_) => "victory",
            ServerEvent::Defeat(_) => "defeat",
            ServerEvent::Error { .. } => "error",
            ServerEvent::RedirectToFinal => "redirect_to_final",
            ServerEvent::VictoryAchieved { .. } => "victory_achieved",
            ServerEvent::GameReset { .. } => "game_reset",
            ServerEvent::RoomSelected { .. } => "room_selected",
        }
    }

    /// Decode a typed event from a raw frame.
    pub fn from_frame(frame: EventFrame) -> Result<Self, FrameError> {
        let EventFrame { event, data } = frame;
        let invalid = |source: serde_json::Error| FrameError::InvalidPayload {
            event: event.clone(),
            source,
        };
        let decoded = match event.as_str() {
            "timer_update" => {
                let payload: TimerPayload = serde_json::from_value(data).map_err(invalid)?;
                ServerEvent::TimerUpdate {
                    remaining: payload.remaining.clamp(0, u32::MAX as i64) as u32,
                }
            }
            "state_update" => ServerEvent::StateUpdate(serde_json::from_value(data).map_err(invalid)?),
            "feedback" => {
                let payload: MessagePayload = serde_json::from_value(data).map_err(invalid)?;
                ServerEvent::Feedback {
                    message: payload.message,
                }
            }
            "puzzle_completed" => {
                let payload: RoomPayload = serde_json::from_value(data).map_err(invalid)?;
                ServerEvent::PuzzleCompleted { room: payload.room }
            }
            "room_unlocked" => {
                let payload: RoomPayload = serde_json::from_value(data).map_err(invalid)?;
                ServerEvent::RoomUnlocked { room: payload.room }
            }
            "game_over" => {
                let payload: MessagePayload = serde_json::from_value(data).map_err(invalid)?;
                ServerEvent::GameOver {
                    message: payload.message,
                }
            }
            "victory" => ServerEvent::Victory(serde_json::from_value(data).map_err(invalid)?),
            "defeat" => ServerEvent::Defeat(serde_json::from_value(data).map_err(invalid)?),
            "error" => {
                let payload: MessagePayload = serde_json::from_value(data).map_err(invalid)?;
                ServerEvent::Error {
                    message: payload.message,
                }
            }
            "redirect_to_final" => ServerEvent::RedirectToFinal,
            "victory_achieved" => {
                let payload: VictoryAchievedPayload =
                    serde_json::from_value(data).map_err(invalid)?;
                ServerEvent::VictoryAchieved {
                    validator: payload.validator,
                    message: payload.message,
                }
            }
            "game_reset" => {
                let payload: MessagePayload = serde_json::from_value(data).map_err(invalid)?;
                ServerEvent::GameReset {
                    message: payload.message,
                }
            }
            "room_selected" => {
                let payload: RoomPayload = serde_json::from_value(data).map_err(invalid)?;
                ServerEvent::RoomSelected { room: payload.room }
            }
            _ => return Err(FrameError::UnknownEvent(event)),
        };
        Ok(decoded)
    }

    /// Encode the event into a raw frame. Used by servers and test fixtures.
    pub fn to_frame(&self) -> Result<EventFrame, FrameError> {
        let data = match self {
            ServerEvent::TimerUpdate { remaining } => serde_json::json!({ "remaining": remaining }),
            ServerEvent::StateUpdate(metrics)
            | ServerEvent::Victory(metrics)
            | ServerEvent::Defeat(metrics) => serde_json::to_value(metrics)?,
            ServerEvent::Feedback { message }
            | ServerEvent::GameOver { message }
            | ServerEvent::Error { message }
            | ServerEvent::GameReset { message } => serde_json::to_value(MessagePayload {
                message: message.clone(),
            })?,
            ServerEvent::PuzzleCompleted { room }
            | ServerEvent::RoomUnlocked { room }
            | ServerEvent::RoomSelected { room } => {
                serde_json::to_value(RoomPayload { room: room.clone() })?
            }
            ServerEvent::RedirectToFinal => serde_json::json!({}),
            ServerEvent::VictoryAchieved { validator, message } => {
                serde_json::to_value(VictoryAchievedPayload {
                    validator: validator.clone(),
                    message: message.clone(),
                })?
            }
        };
        Ok(EventFrame::new(self.name(), data))
    }
}

/// Puzzle intents, sent as the payload of an `action` frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PuzzleIntent {
    ConnectCables {
        correct: bool,
    },
    SortWaste {
        correct: bool,
    },
    AdjustPh {
        value: f64,
    },
    #[serde(rename = "adjust_o2")]
    AdjustO2 {
        value: f64,
    },
    ValidateChemical {
        correct: bool,
        ph: f64,
        o2: f64,
    },
    CompleteWater {
        purity: u8,
    },
    IdentifyPollutionSource {
        source: String,
        correct: bool,
        attempts: u32,
    },
    SelectPlant {
        plant: String,
    },
}

impl PuzzleIntent {
    pub fn action_name(&self) -> &'static str {
        match self {
            PuzzleIntent::ConnectCables { .. } => "connect_cables",
            PuzzleIntent::SortWaste { .. } => "sort_waste",
            PuzzleIntent::AdjustPh { .. } => "adjust_ph",
            PuzzleIntent::AdjustO2 { .. } => "adjust_o2",
            PuzzleIntent::ValidateChemical { .. } => "validate_chemical",
            PuzzleIntent::CompleteWater { .. } => "complete_water",
            PuzzleIntent::IdentifyPollutionSource { .. } => "identify_pollution_source",
            PuzzleIntent::SelectPlant { .. } => "select_plant",
        }
    }
}

/// Everything the client can emit over the event channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientIntent {
    Action(PuzzleIntent),
    SelectRoom { room: Room },
    PlayerReady,
}

impl ClientIntent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientIntent::Action(intent) => intent.action_name(),
            ClientIntent::SelectRoom { .. } => "select_room",
            ClientIntent::PlayerReady => "player_ready",
        }
    }

    pub fn to_frame(&self) -> Result<EventFrame, FrameError> {
        let frame = match self {
            ClientIntent::Action(intent) => {
                EventFrame::new(ACTION_EVENT, serde_json::to_value(intent)?)
            }
            ClientIntent::SelectRoom { room } => EventFrame::new(
                "select_room",
                serde_json::json!({ "room": room.wire_name() }),
            ),
            ClientIntent::PlayerReady => EventFrame::new("player_ready", serde_json::json!({})),
        };
        Ok(frame)
    }

    /// Decode an intent frame. Used by servers and test fixtures.
    pub fn from_frame(frame: EventFrame) -> Result<Self, FrameError> {
        let EventFrame { event, data } = frame;
        match event.as_str() {
            ACTION_EVENT => serde_json::from_value(data)
                .map(ClientIntent::Action)
                .map_err(|source| FrameError::InvalidPayload { event, source }),
            "select_room" => {
                let payload: RoomPayload = serde_json::from_value(data).map_err(|source| {
                    FrameError::InvalidPayload {
                        event: event.clone(),
                        source,
                    }
                })?;
                Room::from_wire(&payload.room)
                    .map(|room| ClientIntent::SelectRoom { room })
                    .ok_or(FrameError::UnknownRoom(payload.room))
            }
            "player_ready" => Ok(ClientIntent::PlayerReady),
            _ => Err(FrameError::UnknownEvent(event)),
        }
    }
}

/// Prefix a JSON-encoded frame with its little-endian `u32` length.
pub fn encode_frame(frame: &EventFrame) -> Result<Vec<u8>, FrameError> {
    let payload = serde_json::to_vec(frame)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge { len: payload.len() });
    }
    let mut buffer = Vec::with_capacity(4 + payload.len());
    buffer.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buffer.extend_from_slice(&payload);
    Ok(buffer)
}

/// Validate a length prefix read off the wire.
pub fn frame_len(prefix: [u8; 4]) -> Result<usize, FrameError> {
    let len = u32::from_le_bytes(prefix) as usize;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge { len });
    }
    Ok(len)
}

pub fn decode_frame_payload(payload: &[u8]) -> Result<EventFrame, FrameError> {
    Ok(serde_json::from_slice(payload)?)
}

/// One chat line as stored by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: u64,
    pub username: String,
    pub message: String,
    /// Naive ISO-8601 timestamp in server UTC.
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatMessagesResponse {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSendRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ChatSendResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerStatus {
    pub username: String,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub is_ready: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomStatus {
    pub name: String,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub assigned_player: Option<String>,
}

/// Body of `GET /api/poll_status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LobbyStatus {
    #[serde(default)]
    pub players: Vec<PlayerStatus>,
    #[serde(default)]
    pub rooms: Vec<RoomStatus>,
    #[serde(default)]
    pub game_states: std::collections::BTreeMap<String, f64>,
    /// The server reports this flag as the string `"true"` or `"false"`.
    #[serde(default)]
    pub game_started: String,
    #[serde(default)]
    pub remaining_time: u32,
    #[serde(default)]
    pub can_access_game: bool,
    #[serde(default)]
    pub game_result: Option<String>,
}

impl LobbyStatus {
    pub fn is_started(&self) -> bool {
        self.game_started == "true"
    }

    pub fn room(&self, room: Room) -> Option<&RoomStatus> {
        self.rooms.iter().find(|status| status.name == room.wire_name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalCodeRequest {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FinalCodeResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub redirect: Option<String>,
}

/// Error body the REST endpoints return with 4xx statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intents_use_server_action_names() {
        let frame = ClientIntent::Action(PuzzleIntent::AdjustO2 { value: 8.0 })
            .to_frame()
            .unwrap();
        assert_eq!(frame.event, "action");
        assert_eq!(frame.data["action"], "adjust_o2");
        assert_eq!(frame.data["value"], 8.0);

        let frame = ClientIntent::Action(PuzzleIntent::ValidateChemical {
            correct: false,
            ph: 5.6,
            o2: 3.2,
        })
        .to_frame()
        .unwrap();
        assert_eq!(frame.data["action"], "validate_chemical");
        assert_eq!(frame.data["correct"], false);
    }

    #[test]
    fn redirect_accepts_missing_or_empty_payload() {
        let bare: EventFrame = serde_json::from_str(r#"{"event":"redirect_to_final"}"#).unwrap();
        assert_eq!(
            ServerEvent::from_frame(bare).unwrap(),
            ServerEvent::RedirectToFinal
        );
        let empty = EventFrame::new("redirect_to_final", serde_json::json!({}));
        assert_eq!(
            ServerEvent::from_frame(empty).unwrap(),
            ServerEvent::RedirectToFinal
        );
    }

    #[test]
    fn negative_timer_clamps_to_zero() {
        let frame = EventFrame::new("timer_update", serde_json::json!({ "remaining": -4 }));
        assert_eq!(
            ServerEvent::from_frame(frame).unwrap(),
            ServerEvent::TimerUpdate { remaining: 0 }
        );
    }

    #[test]
    fn unknown_event_is_reported_by_name() {
        let frame = EventFrame::new("fireworks", JsonValue::Null);
        match ServerEvent::from_frame(frame) {
            Err(FrameError::UnknownEvent(name)) => assert_eq!(name, "fireworks"),
            other => panic!("unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn state_update_without_metrics_is_invalid() {
        let frame = EventFrame::new("state_update", serde_json::json!({ "energy_level": 3 }));
        assert!(matches!(
            ServerEvent::from_frame(frame),
            Err(FrameError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn oversize_prefix_is_rejected() {
        let prefix = ((MAX_FRAME_LEN + 1) as u32).to_le_bytes();
        assert!(matches!(frame_len(prefix), Err(FrameError::TooLarge { .. })));
    }

    #[test]
    fn encoded_frame_carries_length_prefix() {
        let frame = EventFrame::hello("ada");
        let bytes = encode_frame(&frame).unwrap();
        let len = frame_len([bytes[0], bytes[1], bytes[2], bytes[3]]).unwrap();
        assert_eq!(len, bytes.len() - 4);
        assert_eq!(decode_frame_payload(&bytes[4..]).unwrap(), frame);
    }

    #[test]
    fn lobby_status_reads_string_started_flag() {
        let status: LobbyStatus = serde_json::from_str(
            r#"{"players":[],"rooms":[{"name":"Eau","is_locked":true,"is_completed":false,"assigned_player":null}],
                "game_states":{"energy_level":50.0},"game_started":"true","remaining_time":412,
                "can_access_game":false,"game_result":null}"#,
        )
        .unwrap();
        assert!(status.is_started());
        assert!(status.room(Room::Water).unwrap().is_locked);
        assert!(status.room(Room::Air).is_none());
    }
}
