//! WebSocket protocol messages for tavla matches.

use serde::{Deserialize, Serialize};
use tavla_core::{BoardSnapshot, Rules, Side};
use uuid::Uuid;

/// How a session joins a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinRole {
    /// Takes a seat (white first, then black).
    Player,
    /// Watches and receives every event, plays nothing.
    Observer,
}

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Join a match, creating it lazily. `options` configure the match and
    /// are ignored when the match already exists.
    JoinMatch {
        match_id: String,
        role: JoinRole,
        #[serde(default)]
        options: Option<Rules>,
    },

    /// Ask for a snapshot of the current state (sent to the requester only)
    RequestSnapshot,

    /// Roll dice server-side (resolves the opening roll while pending)
    RollDice,

    /// Supply an external roll; during the opening, `d1`/`d2` are white's
    /// and black's single dice
    SetDice { d1: u8, d2: u8 },

    /// Move one checker; `from` is 0 (bar) or 1..=24, `pip` is 1..=6
    ApplyStep { from: u8, pip: u8 },

    /// Take back the last step of the current turn
    UndoStep,

    /// Finalize the turn
    CommitTurn,

    /// Offer the doubling cube
    OfferCube,

    /// Accept a pending cube offer
    TakeCube,

    /// Decline a pending cube offer and resign the game
    DropCube,

    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client. Every mutation event carries the
/// match version assigned to it; versions are strictly increasing per
/// match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Welcome message with the assigned session ID
    Welcome { session_id: Uuid },

    /// Full state of the match
    Snapshot { version: u64, state: BoardSnapshot },

    /// Dice were set for `actor`
    DiceSet {
        version: u64,
        dice: Vec<u8>,
        actor: Side,
    },

    /// A step was applied by `actor`
    StepApplied {
        version: u64,
        from: u8,
        pip: u8,
        actor: Side,
    },

    /// The last step was taken back
    StepUndone { version: u64 },

    /// The turn was committed; `next_to_move` is `None` when the game
    /// ended with this turn
    TurnCommitted {
        version: u64,
        next_to_move: Option<Side>,
    },

    /// The cube was offered to `offered_to` at the prospective value
    CubeOffered {
        version: u64,
        offered_to: Side,
        prospective_cube_value: u32,
    },

    /// The cube offer was taken
    CubeTaken {
        version: u64,
        holder: Side,
        cube_value: u32,
    },

    /// The cube offer was dropped; the game is over
    CubeDropped {
        version: u64,
        winner: Side,
        final_cube: u32,
    },

    /// Error occurred: 409 for rule violations, 400 for "JoinMatch first".
    /// Sent to the originating session only.
    Error { code: u16, message: String },

    /// Pong response
    Pong,
}
