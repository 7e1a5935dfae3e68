//! Match coordination: one game per table, versioned event fan-out.
//!
//! A `MatchTable` serializes all commands for one match (the registry hands
//! it out behind an exclusive guard), drives the rules engine, and fans
//! resulting events out to every subscriber. Sends are non-blocking pushes
//! into per-subscriber unbounded channels, so a slow socket never stalls
//! the match.

use std::collections::HashMap;

use tavla_core::{Game, GameError, Phase, Rules, Side};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;
use uuid::Uuid;

use crate::protocol::{ClientMessage, JoinRole, ServerMessage};

#[derive(Debug, Error)]
pub enum TableError {
    #[error("both seats are taken; join as observer")]
    SeatsFull,
}

/// Seat assignments for the two playing sessions.
#[derive(Debug, Default)]
struct Seats {
    white: Option<Uuid>,
    black: Option<Uuid>,
}

impl Seats {
    /// First free seat wins: white, then black.
    fn claim(&mut self, session: Uuid) -> Result<Side, TableError> {
        if self.white.is_none() {
            self.white = Some(session);
            Ok(Side::White)
        } else if self.black.is_none() {
            self.black = Some(session);
            Ok(Side::Black)
        } else {
            Err(TableError::SeatsFull)
        }
    }

    fn release(&mut self, session: Uuid) {
        if self.white == Some(session) {
            self.white = None;
        }
        if self.black == Some(session) {
            self.black = None;
        }
    }
}

/// One match: the authoritative game, its version counter, and the
/// subscriber set.
pub struct MatchTable {
    pub name: String,
    game: Game,
    version: u64,
    subscribers: HashMap<Uuid, UnboundedSender<ServerMessage>>,
    seats: Seats,
}

impl MatchTable {
    pub fn new(name: String, rules: Rules) -> Self {
        Self {
            name,
            game: Game::new(rules),
            version: 0,
            subscribers: HashMap::new(),
            seats: Seats::default(),
        }
    }

    /// Current match version (the value stamped on the last event).
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Add a subscriber and announce the join with a fresh snapshot to
    /// everyone. A `player` join claims a seat; observers always fit.
    pub fn subscribe(
        &mut self,
        session: Uuid,
        sender: UnboundedSender<ServerMessage>,
        role: JoinRole,
    ) -> Result<(), TableError> {
        if role == JoinRole::Player {
            let side = self.seats.claim(session)?;
            debug!("session {} seated as {} in {}", session, side, self.name);
        }
        self.subscribers.insert(session, sender);
        self.broadcast_snapshot();
        Ok(())
    }

    /// Drop a subscriber and free any seat it held. Match state is
    /// untouched; the game continues for the remaining subscribers.
    pub fn unsubscribe(&mut self, session: Uuid) {
        self.subscribers.remove(&session);
        self.seats.release(session);
    }

    /// Handle one command on behalf of `session`. Mutations broadcast
    /// versioned events; rejections go back to the originating session
    /// only, as Error{409}.
    pub fn dispatch(&mut self, session: Uuid, msg: ClientMessage) {
        match msg {
            ClientMessage::RequestSnapshot => {
                let snapshot = self.snapshot_message();
                self.send_to(session, snapshot);
            }

            ClientMessage::RollDice => {
                let rolled = if self.game.phase() == Phase::OpeningRoll {
                    self.game.roll_opening().map(|_| ())
                } else {
                    self.game.roll_dice().map(|_| ())
                };
                match rolled {
                    Ok(()) => self.broadcast_dice_set(),
                    Err(e) => self.reject(session, e),
                }
            }

            ClientMessage::SetDice { d1, d2 } => {
                if self.game.phase() == Phase::OpeningRoll {
                    match self.game.set_opening_dice(d1, d2) {
                        Ok(true) => self.broadcast_dice_set(),
                        // Opening doubles: unresolved, but the cube may
                        // have auto-doubled, so show everyone the state.
                        Ok(false) => self.broadcast_snapshot(),
                        Err(e) => self.reject(session, e),
                    }
                } else {
                    match self.game.set_dice(d1, d2) {
                        Ok(()) => self.broadcast_dice_set(),
                        Err(e) => self.reject(session, e),
                    }
                }
            }

            ClientMessage::ApplyStep { from, pip } => match self.game.apply_step(from, pip) {
                Ok(()) => {
                    let version = self.bump();
                    let actor = self
                        .game
                        .side_to_move()
                        .expect("a step was just applied for a side");
                    self.broadcast(ServerMessage::StepApplied {
                        version,
                        from,
                        pip,
                        actor,
                    });
                }
                Err(e) => self.reject(session, e),
            },

            ClientMessage::UndoStep => match self.game.undo_step() {
                Ok(()) => {
                    let version = self.bump();
                    self.broadcast(ServerMessage::StepUndone { version });
                }
                Err(e) => self.reject(session, e),
            },

            ClientMessage::CommitTurn => match self.game.commit_turn() {
                Ok(()) => {
                    let version = self.bump();
                    self.broadcast(ServerMessage::TurnCommitted {
                        version,
                        next_to_move: self.game.side_to_move(),
                    });
                    self.broadcast_snapshot();
                }
                Err(e) => self.reject(session, e),
            },

            ClientMessage::OfferCube => match self.game.offer_cube() {
                Ok(()) => {
                    let version = self.bump();
                    let offerer = self
                        .game
                        .side_to_move()
                        .expect("the cube was just offered by a side");
                    self.broadcast(ServerMessage::CubeOffered {
                        version,
                        offered_to: offerer.opponent(),
                        prospective_cube_value: self.game.cube_value() * 2,
                    });
                }
                Err(e) => self.reject(session, e),
            },

            ClientMessage::TakeCube => match self.game.take_cube() {
                Ok(()) => {
                    let version = self.bump();
                    let holder = self
                        .game
                        .cube_holder()
                        .expect("a taken cube has a holder");
                    self.broadcast(ServerMessage::CubeTaken {
                        version,
                        holder,
                        cube_value: self.game.cube_value(),
                    });
                }
                Err(e) => self.reject(session, e),
            },

            ClientMessage::DropCube => match self.game.drop_cube() {
                Ok(()) => {
                    let version = self.bump();
                    let result = self.game.result();
                    let winner = result.winner.expect("a dropped cube decides a winner");
                    self.broadcast(ServerMessage::CubeDropped {
                        version,
                        winner,
                        final_cube: result.final_cube,
                    });
                }
                Err(e) => self.reject(session, e),
            },

            // Connection-level messages; the server routes these before
            // dispatch.
            ClientMessage::JoinMatch { .. } | ClientMessage::Ping => {
                debug!("connection-level message reached table {}", self.name);
            }
        }
    }

    // ===== Event plumbing ===================================================

    fn bump(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    fn send_to(&self, session: Uuid, msg: ServerMessage) {
        if let Some(sender) = self.subscribers.get(&session) {
            let _ = sender.send(msg);
        }
    }

    fn broadcast(&self, msg: ServerMessage) {
        for sender in self.subscribers.values() {
            let _ = sender.send(msg.clone());
        }
    }

    fn reject(&self, session: Uuid, err: GameError) {
        self.send_to(
            session,
            ServerMessage::Error {
                code: 409,
                message: err.to_string(),
            },
        );
    }

    /// Snapshot at the current version, without bumping it.
    fn snapshot_message(&self) -> ServerMessage {
        ServerMessage::Snapshot {
            version: self.version,
            state: self.game.snapshot(),
        }
    }

    fn broadcast_snapshot(&mut self) {
        let version = self.bump();
        self.broadcast(ServerMessage::Snapshot {
            version,
            state: self.game.snapshot(),
        });
    }

    fn broadcast_dice_set(&mut self) {
        let version = self.bump();
        let actor = self
            .game
            .side_to_move()
            .expect("dice were just set for a side");
        self.broadcast(ServerMessage::DiceSet {
            version,
            dice: self.game.dice_remaining().to_vec(),
            actor,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn join(
        table: &mut MatchTable,
        role: JoinRole,
    ) -> (Uuid, UnboundedReceiver<ServerMessage>) {
        let session = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        table.subscribe(session, tx, role).unwrap();
        (session, rx)
    }

    #[test]
    fn join_broadcasts_snapshot_to_all() {
        let mut table = MatchTable::new("lobby".into(), Rules::default());
        let (_, mut rx1) = join(&mut table, JoinRole::Player);

        let first = drain(&mut rx1);
        assert!(matches!(
            first.as_slice(),
            [ServerMessage::Snapshot { version: 1, .. }]
        ));

        let (_, mut rx2) = join(&mut table, JoinRole::Player);
        assert!(matches!(
            drain(&mut rx1).as_slice(),
            [ServerMessage::Snapshot { version: 2, .. }]
        ));
        assert!(matches!(
            drain(&mut rx2).as_slice(),
            [ServerMessage::Snapshot { version: 2, .. }]
        ));
    }

    #[test]
    fn third_player_is_rejected_but_observer_fits() {
        let mut table = MatchTable::new("full".into(), Rules::default());
        let (_, _rx1) = join(&mut table, JoinRole::Player);
        let (_, _rx2) = join(&mut table, JoinRole::Player);

        let (tx, _rx3) = mpsc::unbounded_channel();
        let err = table
            .subscribe(Uuid::new_v4(), tx, JoinRole::Player)
            .unwrap_err();
        assert!(matches!(err, TableError::SeatsFull));

        let (tx, mut rx4) = mpsc::unbounded_channel();
        table
            .subscribe(Uuid::new_v4(), tx, JoinRole::Observer)
            .unwrap();
        assert!(!drain(&mut rx4).is_empty());
    }

    #[test]
    fn opening_and_steps_broadcast_versioned_events() {
        let mut table = MatchTable::new("game".into(), Rules::default());
        let (white, mut rx1) = join(&mut table, JoinRole::Player);
        let (_black, mut rx2) = join(&mut table, JoinRole::Player);
        drain(&mut rx1);
        drain(&mut rx2);

        // Opening throw: white 6, black 5 -> White moves with [6, 5].
        table.dispatch(white, ClientMessage::SetDice { d1: 6, d2: 5 });
        let events = drain(&mut rx2);
        match events.as_slice() {
            [ServerMessage::DiceSet {
                version,
                dice,
                actor,
            }] => {
                assert_eq!(*version, 3);
                assert_eq!(dice, &vec![6, 5]);
                assert_eq!(*actor, Side::White);
            }
            other => panic!("expected DiceSet, got {:?}", other),
        }
        drain(&mut rx1);

        table.dispatch(white, ClientMessage::ApplyStep { from: 24, pip: 6 });
        table.dispatch(white, ClientMessage::ApplyStep { from: 18, pip: 5 });
        table.dispatch(white, ClientMessage::CommitTurn);

        let events = drain(&mut rx1);
        let versions: Vec<u64> = events
            .iter()
            .map(|e| match e {
                ServerMessage::StepApplied { version, .. }
                | ServerMessage::TurnCommitted { version, .. }
                | ServerMessage::Snapshot { version, .. } => *version,
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(versions, vec![4, 5, 6, 7]);
        assert_eq!(table.version(), 7);
        assert!(matches!(
            events[2],
            ServerMessage::TurnCommitted {
                next_to_move: Some(Side::Black),
                ..
            }
        ));
    }

    #[test]
    fn rejection_goes_to_origin_only() {
        let mut table = MatchTable::new("errors".into(), Rules::default());
        let (white, mut rx1) = join(&mut table, JoinRole::Player);
        let (black, mut rx2) = join(&mut table, JoinRole::Player);
        drain(&mut rx1);
        drain(&mut rx2);

        // Committing during the opening roll is out of phase.
        table.dispatch(black, ClientMessage::CommitTurn);
        assert!(drain(&mut rx1).is_empty());
        match drain(&mut rx2).as_slice() {
            [ServerMessage::Error { code: 409, message }] => {
                assert!(message.contains("Moving"));
            }
            other => panic!("expected Error, got {:?}", other),
        }

        // The match is unaffected and still accepts the opening throw.
        table.dispatch(white, ClientMessage::SetDice { d1: 3, d2: 1 });
        assert!(matches!(
            drain(&mut rx2).as_slice(),
            [ServerMessage::DiceSet { .. }]
        ));
    }

    #[test]
    fn request_snapshot_answers_requester_at_current_version() {
        let mut table = MatchTable::new("snap".into(), Rules::default());
        let (white, mut rx1) = join(&mut table, JoinRole::Player);
        let (_obs, mut rx2) = join(&mut table, JoinRole::Observer);
        drain(&mut rx1);
        drain(&mut rx2);

        table.dispatch(white, ClientMessage::RequestSnapshot);
        assert!(matches!(
            drain(&mut rx1).as_slice(),
            [ServerMessage::Snapshot { version: 2, .. }]
        ));
        assert!(drain(&mut rx2).is_empty());
    }

    #[test]
    fn cube_flow_events() {
        let mut table = MatchTable::new("cube".into(), Rules::default());
        let (white, mut rx1) = join(&mut table, JoinRole::Player);
        let (black, mut rx2) = join(&mut table, JoinRole::Player);

        // Resolve the opening and pass the first turn back and forth until
        // White is on roll with no dice set: play White's 3-1 out.
        table.dispatch(white, ClientMessage::SetDice { d1: 3, d2: 1 });
        table.dispatch(white, ClientMessage::ApplyStep { from: 8, pip: 3 });
        table.dispatch(white, ClientMessage::ApplyStep { from: 6, pip: 1 });
        table.dispatch(white, ClientMessage::CommitTurn);
        drain(&mut rx1);
        drain(&mut rx2);

        // Black offers before rolling; White takes.
        table.dispatch(black, ClientMessage::OfferCube);
        match drain(&mut rx1).as_slice() {
            [ServerMessage::CubeOffered {
                offered_to: Side::White,
                prospective_cube_value: 2,
                ..
            }] => {}
            other => panic!("expected CubeOffered, got {:?}", other),
        }

        table.dispatch(white, ClientMessage::TakeCube);
        match drain(&mut rx2).as_slice() {
            [ServerMessage::CubeTaken {
                holder: Side::White,
                cube_value: 2,
                ..
            }] => {}
            other => panic!("expected CubeTaken, got {:?}", other),
        }
    }

    #[test]
    fn drop_cube_reports_winner_and_final_value() {
        let mut table = MatchTable::new("drop".into(), Rules::default());
        let (white, mut rx1) = join(&mut table, JoinRole::Player);
        let (black, mut rx2) = join(&mut table, JoinRole::Player);

        table.dispatch(white, ClientMessage::SetDice { d1: 3, d2: 1 });
        table.dispatch(white, ClientMessage::ApplyStep { from: 8, pip: 3 });
        table.dispatch(white, ClientMessage::ApplyStep { from: 6, pip: 1 });
        table.dispatch(white, ClientMessage::CommitTurn);
        table.dispatch(black, ClientMessage::OfferCube);
        drain(&mut rx1);
        drain(&mut rx2);

        table.dispatch(white, ClientMessage::DropCube);
        match drain(&mut rx1).as_slice() {
            [ServerMessage::CubeDropped {
                winner: Side::Black,
                final_cube: 1,
                ..
            }] => {}
            other => panic!("expected CubeDropped, got {:?}", other),
        }

        // Everything afterwards is rejected.
        table.dispatch(black, ClientMessage::RollDice);
        match drain(&mut rx2).as_slice() {
            [ServerMessage::Error { code: 409, message }] => {
                assert_eq!(message, "game over");
            }
            other => panic!("expected Error, got {:?}", other),
        }
    }

    #[test]
    fn unsubscribe_frees_the_seat() {
        let mut table = MatchTable::new("seats".into(), Rules::default());
        let (white, _rx1) = join(&mut table, JoinRole::Player);
        let (_black, _rx2) = join(&mut table, JoinRole::Player);
        assert_eq!(table.subscriber_count(), 2);

        table.unsubscribe(white);
        assert_eq!(table.subscriber_count(), 1);

        // The freed seat can be taken again.
        let (tx, _rx3) = mpsc::unbounded_channel();
        table
            .subscribe(Uuid::new_v4(), tx, JoinRole::Player)
            .unwrap();
    }
}
