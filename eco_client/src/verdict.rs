//! Local guesses versus server verdicts.
//!
//! A controller only ever produces a [`ClientGuess`]; it travels to the server
//! as part of an intent. A [`ServerVerdict`] is built solely from a pushed
//! event, so the two can never be confused at a call site.

use eco_proto::{Room, ServerEvent};

/// Advisory correctness computed by a puzzle controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientGuess {
    correct: bool,
}

impl ClientGuess {
    pub fn new(correct: bool) -> Self {
        Self { correct }
    }

    pub fn is_correct(self) -> bool {
        self.correct
    }
}

/// Authoritative outcome pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerVerdict {
    RoomCompleted(String),
    RoomUnlocked(String),
    GameWon,
    GameLost,
}

impl ServerVerdict {
    pub fn from_event(event: &ServerEvent) -> Option<Self> {
        match event {
            ServerEvent::PuzzleCompleted { room } => Some(ServerVerdict::RoomCompleted(room.clone())),
            ServerEvent::RoomUnlocked { room } => Some(ServerVerdict::RoomUnlocked(room.clone())),
            ServerEvent::Victory(_) | ServerEvent::VictoryAchieved { .. } => {
                Some(ServerVerdict::GameWon)
            }
            ServerEvent::Defeat(_) | ServerEvent::GameOver { .. } => Some(ServerVerdict::GameLost),
            _ => None,
        }
    }

    /// Room this verdict concerns, when the server named a known one.
    pub fn room(&self) -> Option<Room> {
        match self {
            ServerVerdict::RoomCompleted(name) | ServerVerdict::RoomUnlocked(name) => {
                Room::from_wire(name)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_outcome_events_become_verdicts() {
        assert_eq!(
            ServerVerdict::from_event(&ServerEvent::PuzzleCompleted { room: "Eau".into() }),
            Some(ServerVerdict::RoomCompleted("Eau".into()))
        );
        assert_eq!(
            ServerVerdict::from_event(&ServerEvent::Feedback {
                message: "ok".into()
            }),
            None
        );
        assert_eq!(
            ServerVerdict::from_event(&ServerEvent::GameOver {
                message: "time".into()
            }),
            Some(ServerVerdict::GameLost)
        );
    }

    #[test]
    fn verdict_room_resolves_wire_names() {
        let verdict = ServerVerdict::RoomUnlocked("Air".into());
        assert_eq!(verdict.room(), Some(Room::Air));
        assert_eq!(ServerVerdict::RoomUnlocked("Lune".into()).room(), None);
    }
}
