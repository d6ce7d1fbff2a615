use std::num::ParseIntError;

use eco_proto::Room;
use thiserror::Error;

use crate::energy::{LeftNode, RightNode};
use crate::waste::WasteKind;

/// A line typed into the inspector's command bar.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Link { left: LeftNode, right: RightNode },
    CheckCables,
    CloseModal,
    Grab { item: u64 },
    Sort { item: u64, bin: WasteKind },
    Drop { bin: WasteKind },
    AddLime,
    Aerate,
    ValidateChemical,
    IdentifySource { source: String, correct: bool },
    SelectPlant { plant: String },
    SelectRoom { room: Room },
    Ready,
    FinalCode { code: String },
    Say { text: String },
    ToggleSpeech,
    Voice,
    Return,
    ResetGame,
}

#[derive(Debug, Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("invalid integer '{value}' for {context}: {source}")]
    InvalidInteger {
        value: String,
        context: &'static str,
        source: ParseIntError,
    },
    #[error("invalid node '{0}'")]
    InvalidNode(String),
    #[error("invalid bin '{0}'")]
    InvalidBin(String),
    #[error("invalid room '{0}'")]
    InvalidRoom(String),
    #[error("invalid verdict '{0}' (use yes or no)")]
    InvalidVerdict(String),
}

pub fn parse_command_line(input: &str) -> Result<PlayerCommand, CommandParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CommandParseError::Empty);
    }

    let (verb, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb.to_ascii_lowercase(), rest.trim()),
        None => (trimmed.to_ascii_lowercase(), ""),
    };
    let mut parts = rest.split_whitespace();

    match verb.as_str() {
        "link" | "connect" => {
            let left_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("left node"))?;
            let right_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("right node"))?;
            let left = left_str
                .parse()
                .map_err(|_| CommandParseError::InvalidNode(left_str.to_string()))?;
            let right = right_str
                .parse()
                .map_err(|_| CommandParseError::InvalidNode(right_str.to_string()))?;
            Ok(PlayerCommand::Link { left, right })
        }
        "check" => Ok(PlayerCommand::CheckCables),
        "close" => Ok(PlayerCommand::CloseModal),
        "grab" => {
            let item_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("item"))?;
            let item = parse_u64(item_str, "grab item")?;
            Ok(PlayerCommand::Grab { item })
        }
        "sort" => {
            let item_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("item"))?;
            let bin_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("bin"))?;
            let item = parse_u64(item_str, "sort item")?;
            let bin = parse_bin(bin_str)?;
            Ok(PlayerCommand::Sort { item, bin })
        }
        "drop" => {
            let bin_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("bin"))?;
            Ok(PlayerCommand::Drop {
                bin: parse_bin(bin_str)?,
            })
        }
        "lime" => Ok(PlayerCommand::AddLime),
        "aerate" | "aerator" => Ok(PlayerCommand::Aerate),
        "validate" => Ok(PlayerCommand::ValidateChemical),
        "source" => {
            let source = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("source"))?
                .to_string();
            let verdict = parts.next().unwrap_or("yes").to_ascii_lowercase();
            let correct = match verdict.as_str() {
                "yes" | "y" | "correct" => true,
                "no" | "n" | "wrong" => false,
                other => return Err(CommandParseError::InvalidVerdict(other.to_string())),
            };
            Ok(PlayerCommand::IdentifySource { source, correct })
        }
        "plant" => {
            let plant = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("plant"))?
                .to_string();
            Ok(PlayerCommand::SelectPlant { plant })
        }
        "room" | "join" => {
            let room_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("room"))?;
            Ok(PlayerCommand::SelectRoom {
                room: parse_room(room_str)?,
            })
        }
        "ready" => Ok(PlayerCommand::Ready),
        "code" => {
            if rest.is_empty() {
                return Err(CommandParseError::MissingArgument("code"));
            }
            Ok(PlayerCommand::FinalCode {
                code: rest.to_string(),
            })
        }
        "say" => {
            if rest.is_empty() {
                return Err(CommandParseError::MissingArgument("message"));
            }
            Ok(PlayerCommand::Say {
                text: rest.to_string(),
            })
        }
        "tts" => Ok(PlayerCommand::ToggleSpeech),
        "voice" => Ok(PlayerCommand::Voice),
        "return" | "home" => Ok(PlayerCommand::Return),
        "reset" => Ok(PlayerCommand::ResetGame),
        other => Err(CommandParseError::UnknownCommand(other.to_string())),
    }
}

fn parse_u64(value: &str, context: &'static str) -> Result<u64, CommandParseError> {
    value
        .parse::<u64>()
        .map_err(|source| CommandParseError::InvalidInteger {
            value: value.to_string(),
            context,
            source,
        })
}

fn parse_bin(token: &str) -> Result<WasteKind, CommandParseError> {
    token
        .parse()
        .map_err(|_| CommandParseError::InvalidBin(token.to_string()))
}

fn parse_room(token: &str) -> Result<Room, CommandParseError> {
    if let Some(room) = Room::from_wire(token) {
        return Ok(room);
    }
    match token.to_ascii_lowercase().as_str() {
        "energy" | "energie" => Ok(Room::Energy),
        "water" | "eau" => Ok(Room::Water),
        "air" => Ok(Room::Air),
        "flora" | "flore" => Ok(Room::Flora),
        other => Err(CommandParseError::InvalidRoom(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cable_links() {
        assert_eq!(
            parse_command_line("link l1 R3").unwrap(),
            PlayerCommand::Link {
                left: LeftNode::L1,
                right: RightNode::R3
            }
        );
        assert!(matches!(
            parse_command_line("link L1"),
            Err(CommandParseError::MissingArgument("right node"))
        ));
        assert!(matches!(
            parse_command_line("link R1 L1"),
            Err(CommandParseError::InvalidNode(node)) if node == "R1"
        ));
    }

    #[test]
    fn free_text_keeps_inner_spacing() {
        assert_eq!(
            parse_command_line("say  hello   team ").unwrap(),
            PlayerCommand::Say {
                text: "hello   team".into()
            }
        );
        assert_eq!(
            parse_command_line("CODE terre 2025").unwrap(),
            PlayerCommand::FinalCode {
                code: "terre 2025".into()
            }
        );
    }

    #[test]
    fn rooms_accept_wire_and_english_names() {
        assert_eq!(
            parse_command_line("room Eau").unwrap(),
            PlayerCommand::SelectRoom { room: Room::Water }
        );
        assert_eq!(
            parse_command_line("join flora").unwrap(),
            PlayerCommand::SelectRoom { room: Room::Flora }
        );
        assert!(parse_command_line("room moon").is_err());
    }

    #[test]
    fn sorting_and_sources() {
        assert_eq!(
            parse_command_line("sort 4 metal").unwrap(),
            PlayerCommand::Sort {
                item: 4,
                bin: WasteKind::Metal
            }
        );
        assert!(matches!(
            parse_command_line("sort x metal"),
            Err(CommandParseError::InvalidInteger { .. })
        ));
        assert_eq!(
            parse_command_line("source factory no").unwrap(),
            PlayerCommand::IdentifySource {
                source: "factory".into(),
                correct: false
            }
        );
    }

    #[test]
    fn rejects_empty_and_unknown() {
        assert!(matches!(parse_command_line("   "), Err(CommandParseError::Empty)));
        assert!(matches!(
            parse_command_line("dance"),
            Err(CommandParseError::UnknownCommand(verb)) if verb == "dance"
        ));
    }
}
