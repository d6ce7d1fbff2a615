//! Lobby status polling and the room/ready intents.

use std::future::Future;
use std::time::Duration;

use eco_proto::{ClientIntent, LobbyStatus, Room};
use tokio::sync::mpsc::UnboundedSender;

use crate::rest::RestError;

pub trait LobbyApi: Send + Sync + 'static {
    fn poll_status(&self) -> impl Future<Output = Result<LobbyStatus, RestError>> + Send;
}

#[derive(Debug, Clone, PartialEq)]
pub enum LobbyUpdate {
    Status(LobbyStatus),
    NotLoggedIn,
    Failed(String),
}

/// Pull `/api/poll_status` on an interval until the receiver goes away.
pub async fn run_lobby_poller<A: LobbyApi>(
    api: A,
    poll_interval: Duration,
    updates: UnboundedSender<LobbyUpdate>,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let update = match api.poll_status().await {
            Ok(status) => LobbyUpdate::Status(status),
            Err(RestError::NotLoggedIn) => LobbyUpdate::NotLoggedIn,
            Err(err) => {
                tracing::warn!(target: "eco_quest::lobby", error = %err, "lobby.poll_failed");
                LobbyUpdate::Failed(err.to_string())
            }
        };
        if updates.send(update).is_err() {
            break;
        }
    }
    tracing::debug!(target: "eco_quest::lobby", "lobby.poller_stopped");
}

/// Latest lobby snapshot as seen by one player.
#[derive(Debug, Clone)]
pub struct LobbyState {
    username: String,
    latest: Option<LobbyStatus>,
}

impl LobbyState {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            latest: None,
        }
    }

    pub fn apply(&mut self, status: LobbyStatus) {
        self.latest = Some(status);
    }

    pub fn latest(&self) -> Option<&LobbyStatus> {
        self.latest.as_ref()
    }

    /// Room the local player picked, per the last poll.
    pub fn my_room(&self) -> Option<Room> {
        self.latest
            .as_ref()?
            .players
            .iter()
            .find(|player| player.username == self.username)
            .and_then(|player| player.room.as_deref())
            .and_then(Room::from_wire)
    }

    pub fn can_enter_game(&self) -> bool {
        self.latest
            .as_ref()
            .map(|status| status.can_access_game)
            .unwrap_or(false)
    }

    pub fn is_started(&self) -> bool {
        self.latest
            .as_ref()
            .map(LobbyStatus::is_started)
            .unwrap_or(false)
    }
}

pub fn select_room(room: Room) -> ClientIntent {
    ClientIntent::SelectRoom { room }
}

pub fn player_ready() -> ClientIntent {
    ClientIntent::PlayerReady
}
