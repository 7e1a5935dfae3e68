//! Tavla - a backgammon rules engine
//!
//! This crate provides the authoritative game logic for a backgammon match
//! server, including:
//! - Board model with points, bars, off-trays, and the doubling cube
//! - Pure step legality and the maximum-dice-usage search
//! - Turn controller with commit-time obligation checks and the cube
//!   protocol
//!
//! # Architecture
//!
//! The engine is platform-agnostic and does no I/O: a transport layer owns
//! a [`Game`] per match, serializes commands into it, and broadcasts
//! [`BoardSnapshot`] values and incremental events to subscribers.
//!
//! # Modules
//!
//! - [`board`]: points, bars, off-trays, cube, and the `Position` value type
//! - [`moves`]: step legality and the depth-first dice-usage search
//! - [`game`]: the phase state machine and commit validation

pub mod board;
pub mod game;
pub mod moves;

// Re-export commonly used types
pub use board::{Board, PointState, Position, Side};
pub use game::{
    BoardSnapshot, Game, GameError, GameResult, OpeningDoublePolicy, Phase, Rules,
};
pub use moves::{check_step, destination, has_any_step, max_playable, StepError, StepKind, StepPlan, BAR};
