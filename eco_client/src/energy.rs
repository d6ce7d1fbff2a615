//! Energy room: wire four grey sources to four colored sinks.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use eco_proto::PuzzleIntent;
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use crate::verdict::ClientGuess;

/// Hit radius of a node on the board, in board units.
pub const NODE_RADIUS: f64 = 15.0;

const LEFT_X: f64 = 50.0;
const RIGHT_X: f64 = 550.0;
const ROW_Y: [f64; 4] = [50.0, 150.0, 250.0, 350.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LeftNode {
    L1,
    L2,
    L3,
    L4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RightNode {
    R1,
    R2,
    R3,
    R4,
}

impl LeftNode {
    pub const ALL: [LeftNode; 4] = [LeftNode::L1, LeftNode::L2, LeftNode::L3, LeftNode::L4];

    fn index(self) -> usize {
        self as usize
    }

    /// The sink this source must reach.
    pub fn expected_target(self) -> RightNode {
        match self {
            LeftNode::L1 => RightNode::R3,
            LeftNode::L2 => RightNode::R1,
            LeftNode::L3 => RightNode::R4,
            LeftNode::L4 => RightNode::R2,
        }
    }
}

impl RightNode {
    pub const ALL: [RightNode; 4] = [RightNode::R1, RightNode::R2, RightNode::R3, RightNode::R4];

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for LeftNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.index() + 1)
    }
}

impl fmt::Display for RightNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.index() + 1)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown node '{0}'")]
pub struct UnknownNode(pub String);

impl FromStr for LeftNode {
    type Err = UnknownNode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "L1" => Ok(LeftNode::L1),
            "L2" => Ok(LeftNode::L2),
            "L3" => Ok(LeftNode::L3),
            "L4" => Ok(LeftNode::L4),
            _ => Err(UnknownNode(s.to_string())),
        }
    }
}

impl FromStr for RightNode {
    type Err = UnknownNode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "R1" => Ok(RightNode::R1),
            "R2" => Ok(RightNode::R2),
            "R3" => Ok(RightNode::R3),
            "R4" => Ok(RightNode::R4),
            _ => Err(UnknownNode(s.to_string())),
        }
    }
}

/// A node on either side of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardNode {
    Left(LeftNode),
    Right(RightNode),
}

impl BoardNode {
    pub fn position(self) -> (f64, f64) {
        match self {
            BoardNode::Left(node) => (LEFT_X, ROW_Y[node.index()]),
            BoardNode::Right(node) => (RIGHT_X, ROW_Y[node.index()]),
        }
    }

    /// Node whose disc contains the point, if any.
    pub fn hit_test(x: f64, y: f64) -> Option<BoardNode> {
        LeftNode::ALL
            .iter()
            .map(|node| BoardNode::Left(*node))
            .chain(RightNode::ALL.iter().map(|node| BoardNode::Right(*node)))
            .find(|node| {
                let (nx, ny) = node.position();
                (nx - x).hypot(ny - y) < NODE_RADIUS
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CableColor {
    Red,
    Blue,
    Yellow,
    Green,
}

impl CableColor {
    pub const ALL: [CableColor; 4] = [
        CableColor::Red,
        CableColor::Blue,
        CableColor::Yellow,
        CableColor::Green,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyPhase {
    NoConnections,
    Partial(u8),
    CompletePendingValidation,
}

/// Outcome of a validate action, before the server has spoken.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyValidation {
    pub guess: ClientGuess,
    pub intent: PuzzleIntent,
}

#[derive(Debug)]
pub struct EnergyPuzzle {
    connections: [Option<RightNode>; 4],
    colors: [CableColor; 4],
    dragging: Option<LeftNode>,
    modal_due: Option<Instant>,
    modal_open: bool,
    modal_delay: Duration,
}

impl EnergyPuzzle {
    pub fn new<R: Rng + ?Sized>(rng: &mut R, modal_delay: Duration) -> Self {
        let mut puzzle = Self {
            connections: [None; 4],
            colors: CableColor::ALL,
            dragging: None,
            modal_due: None,
            modal_open: false,
            modal_delay,
        };
        puzzle.reset(rng);
        puzzle
    }

    /// Drop every connection and deal a fresh color permutation.
    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.connections = [None; 4];
        self.dragging = None;
        self.colors = CableColor::ALL;
        self.colors.shuffle(rng);
    }

    pub fn color_of(&self, node: RightNode) -> CableColor {
        self.colors[node.index()]
    }

    pub fn begin_drag(&mut self, node: BoardNode) {
        match node {
            BoardNode::Left(left) => self.dragging = Some(left),
            BoardNode::Right(_) => self.dragging = None,
        }
    }

    /// Finish the active drag on `target`. Returns the connection made.
    pub fn drop_on(&mut self, target: BoardNode) -> Option<(LeftNode, RightNode)> {
        let source = self.dragging.take()?;
        match target {
            BoardNode::Right(right) => {
                self.connect(source, right);
                Some((source, right))
            }
            BoardNode::Left(_) => None,
        }
    }

    /// Pointer press on the board.
    pub fn press_at(&mut self, x: f64, y: f64) {
        self.dragging = match BoardNode::hit_test(x, y) {
            Some(BoardNode::Left(left)) => Some(left),
            _ => None,
        };
    }

    /// Pointer release on the board.
    pub fn release_at(&mut self, x: f64, y: f64) -> Option<(LeftNode, RightNode)> {
        match BoardNode::hit_test(x, y) {
            Some(node) => self.drop_on(node),
            None => {
                self.dragging = None;
                None
            }
        }
    }

    /// Add or replace the connection leaving `left`.
    pub fn connect(&mut self, left: LeftNode, right: RightNode) {
        self.connections[left.index()] = Some(right);
        tracing::debug!(
            target: "eco_quest::energy",
            from = %left,
            to = %right,
            "energy.connected"
        );
    }

    pub fn connections(&self) -> Vec<(LeftNode, RightNode)> {
        LeftNode::ALL
            .iter()
            .filter_map(|left| self.connections[left.index()].map(|right| (*left, right)))
            .collect()
    }

    pub fn phase(&self) -> EnergyPhase {
        match self.connections.iter().flatten().count() {
            0 => EnergyPhase::NoConnections,
            4 => EnergyPhase::CompletePendingValidation,
            n => EnergyPhase::Partial(n as u8),
        }
    }

    /// Compare against the fixed wiring. A wrong board is cleared and re-dealt;
    /// a right one schedules the follow-up modal.
    pub fn validate<R: Rng + ?Sized>(&mut self, rng: &mut R, now: Instant) -> EnergyValidation {
        let correct = LeftNode::ALL
            .iter()
            .all(|left| self.connections[left.index()] == Some(left.expected_target()));
        tracing::info!(
            target: "eco_quest::energy",
            correct,
            connections = self.connections.iter().flatten().count(),
            "energy.validated"
        );
        if correct {
            self.modal_due = Some(now + self.modal_delay);
        } else {
            self.reset(rng);
        }
        EnergyValidation {
            guess: ClientGuess::new(correct),
            intent: PuzzleIntent::ConnectCables { correct },
        }
    }

    /// Returns `true` exactly once, when the success modal becomes due.
    pub fn poll_modal(&mut self, now: Instant) -> bool {
        match self.modal_due {
            Some(due) if now >= due => {
                self.modal_due = None;
                self.modal_open = true;
                true
            }
            _ => false,
        }
    }

    pub fn modal_open(&self) -> bool {
        self.modal_open
    }

    pub fn close_modal(&mut self) {
        self.modal_open = false;
    }
}
