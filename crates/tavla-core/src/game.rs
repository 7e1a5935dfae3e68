//! Turn controller: the phase state machine over the board.
//!
//! `Game` owns the [`Board`], consumes dice, records applied steps for
//! undo, and validates the commit-time obligations (maximum dice usage,
//! higher die) with the search in [`crate::moves`]. It also drives the
//! doubling cube protocol and the opening roll.
//!
//! Rule failures are ordinary `Err(GameError)` values and leave the board
//! unchanged; panics are reserved for internal invariant violations the
//! phase guards make unreachable.

use crate::board::{Board, PointState, Position, Side};
use crate::moves::{self, StepError, StepKind, StepPlan};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse phase of play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Before the first move: one die each; doubles handled per [`Rules`].
    OpeningRoll,
    /// A player must roll (or set) two dice to begin their turn.
    AwaitingRoll,
    /// Dice are set; per-die steps may be applied and undone.
    Moving,
    /// A cube offer is pending; the opponent must take or drop.
    CubeOffered,
}

/// Policy when the opening roll is doubles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OpeningDoublePolicy {
    /// Reroll until the dice differ.
    #[default]
    #[serde(rename = "REROLL")]
    Reroll,
    /// Double the cube and roll again.
    #[serde(rename = "AUTODOUBLE")]
    AutoDouble,
}

/// Rule options fixed at game start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    /// Opening doubles behavior.
    pub opening_double_policy: OpeningDoublePolicy,
    /// Cap on opening auto-doubles under [`OpeningDoublePolicy::AutoDouble`];
    /// 0 means unlimited.
    pub max_opening_auto_doubles: u32,
    /// Match length in points; 0 means continuous play. Carried for clients,
    /// not enforced by the engine.
    pub length_points: u32,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            opening_double_policy: OpeningDoublePolicy::default(),
            max_opening_auto_doubles: 0,
            length_points: 1,
        }
    }
}

/// Outcome of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    /// True once the game has ended.
    pub over: bool,
    /// Winning side when `over`.
    pub winner: Option<Side>,
    /// Cube value the result counts at.
    pub final_cube: u32,
    /// True when the game ended by declining a cube offer.
    pub resigned: bool,
}

impl Default for GameResult {
    fn default() -> Self {
        Self {
            over: false,
            winner: None,
            final_cube: 1,
            resigned: false,
        }
    }
}

/// Rule and phase violations. Every variant leaves the game state exactly
/// as it was before the rejected call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("game over")]
    GameOver,

    #[error("{0} requires the {1:?} phase")]
    WrongPhase(&'static str, Phase),

    #[error("dice out of range")]
    DiceOutOfRange,

    #[error("no dice remaining")]
    NoDiceRemaining,

    #[error("pip {0} not available")]
    PipUnavailable(u8),

    #[error(transparent)]
    Step(#[from] StepError),

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("at least one legal move exists")]
    MoveAvailable,

    #[error("must use maximum number of dice")]
    MustUseMaxDice,

    #[error("only one die playable; must use the higher die")]
    MustUseHigherDie,

    #[error("cube offer already pending")]
    OfferAlreadyPending,

    #[error("you do not own the cube")]
    NotCubeHolder,

    #[error("no cube offer pending")]
    NoOfferPending,
}

/// One applied step, kept for undo. `slot` remembers where the consumed
/// pip sat in the remaining-dice list so undo restores it bit-for-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StepRecord {
    from: u8,
    pip: u8,
    slot: usize,
    plan: StepPlan,
}

/// The broadcast form of the game state: everything a subscriber needs to
/// render the match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    /// Owner and count for points 1..=24, in order.
    pub points: [PointState; 24],
    pub white_bar: u8,
    pub black_bar: u8,
    pub white_off: u8,
    pub black_off: u8,
    /// Cube value (a power of two, >= 1).
    pub cube_value: u32,
    /// Cube holder; `None` while centered.
    pub cube_holder: Option<Side>,
    pub phase: Phase,
    /// `None` during the opening roll and after a terminal result.
    pub side_to_move: Option<Side>,
    /// Unplayed pips of the current turn; empty outside the Moving phase.
    pub dice_remaining: Vec<u8>,
}

/// The turn controller.
#[derive(Debug, Clone)]
pub struct Game {
    board: Board,
    rules: Rules,
    phase: Phase,
    actor: Option<Side>,
    dice_left: Vec<u8>,
    opening_auto_doubles: u32,
    cube_pending_from: Option<Side>,
    result: GameResult,

    // Per-turn bookkeeping: created when dice become known, cleared on
    // commit. The commit search runs against `turn_start`, never the live
    // board, so partial moves can be shuffled freely.
    steps: Vec<StepRecord>,
    turn_start: Position,
    turn_start_dice: Vec<u8>,
    turn_start_actor: Option<Side>,
}

impl Game {
    /// A fresh game in the opening-roll phase.
    pub fn new(rules: Rules) -> Self {
        Self {
            board: Board::new(),
            rules,
            phase: Phase::OpeningRoll,
            actor: None,
            dice_left: Vec::new(),
            opening_auto_doubles: 0,
            cube_pending_from: None,
            result: GameResult::default(),
            steps: Vec::new(),
            turn_start: Position::default(),
            turn_start_dice: Vec::new(),
            turn_start_actor: None,
        }
    }

    /// A controller over a prepared board with `side` to roll. Intended for
    /// resuming arbitrary positions and for tests.
    pub fn from_position(board: Board, side: Side, rules: Rules) -> Self {
        let mut game = Self::new(rules);
        game.board = board;
        game.phase = Phase::AwaitingRoll;
        game.actor = Some(side);
        game
    }

    /// Reinitialize in place for a new game: starting position, centered
    /// cube, opening-roll phase, cleared result and turn state.
    pub fn start_game(&mut self, rules: Rules) {
        self.board.reset();
        self.rules = rules;
        self.phase = Phase::OpeningRoll;
        self.actor = None;
        self.dice_left.clear();
        self.opening_auto_doubles = 0;
        self.cube_pending_from = None;
        self.result = GameResult::default();
        self.steps.clear();
        self.turn_start = Position::default();
        self.turn_start_dice.clear();
        self.turn_start_actor = None;
    }

    // ===== Queries ==========================================================

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whose turn it is; `None` during the opening roll and after a
    /// terminal result.
    pub fn side_to_move(&self) -> Option<Side> {
        self.actor
    }

    pub fn game_over(&self) -> bool {
        self.result.over
    }

    pub fn result(&self) -> GameResult {
        self.result
    }

    pub fn rules(&self) -> Rules {
        self.rules
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn cube_value(&self) -> u32 {
        self.board.cube_value()
    }

    pub fn cube_holder(&self) -> Option<Side> {
        self.board.cube_holder()
    }

    /// Unplayed pips of the current turn.
    pub fn dice_remaining(&self) -> &[u8] {
        &self.dice_left
    }

    /// Opening auto-doubles applied so far.
    pub fn opening_auto_doubles(&self) -> u32 {
        self.opening_auto_doubles
    }

    /// True if a dice roll is required before any step can be applied.
    pub fn needs_roll(&self) -> bool {
        self.phase == Phase::AwaitingRoll && !self.result.over
    }

    /// True if any legal step exists with the current dice and board.
    pub fn has_any_legal_step(&self) -> bool {
        if self.result.over || self.phase != Phase::Moving || self.dice_left.is_empty() {
            return false;
        }
        let actor = self.actor.expect("Moving phase always has a side to move");
        moves::has_any_step(&self.board.position(), actor, &self.dice_left)
    }

    // ===== Opening ==========================================================

    /// Perform the opening roll internally, one die per side, looping until
    /// resolved. Doubles apply the configured policy each time they occur.
    /// Returns the resolving throw.
    pub fn roll_opening(&mut self) -> Result<(u8, u8), GameError> {
        if self.phase != Phase::OpeningRoll {
            return Err(GameError::WrongPhase("roll_opening", Phase::OpeningRoll));
        }
        let mut rng = rand::thread_rng();
        loop {
            let w: u8 = rng.gen_range(1..=6);
            let b: u8 = rng.gen_range(1..=6);
            if w != b {
                self.resolve_opening(w, b);
                return Ok((w, b));
            }
            if self.rules.opening_double_policy == OpeningDoublePolicy::AutoDouble {
                self.apply_opening_double();
            }
        }
    }

    /// Supply an external opening throw. Returns `true` if resolved;
    /// `false` means doubles were processed and another throw is needed.
    pub fn set_opening_dice(&mut self, white_die: u8, black_die: u8) -> Result<bool, GameError> {
        if self.phase != Phase::OpeningRoll {
            return Err(GameError::WrongPhase("set_opening_dice", Phase::OpeningRoll));
        }
        if !(1..=6).contains(&white_die) || !(1..=6).contains(&black_die) {
            return Err(GameError::DiceOutOfRange);
        }
        if white_die != black_die {
            self.resolve_opening(white_die, black_die);
            return Ok(true);
        }
        if self.rules.opening_double_policy == OpeningDoublePolicy::AutoDouble {
            self.apply_opening_double();
        }
        Ok(false)
    }

    /// The higher die wins the opening and plays both dice.
    fn resolve_opening(&mut self, white_die: u8, black_die: u8) {
        let (actor, hi, lo) = if white_die > black_die {
            (Side::White, white_die, black_die)
        } else {
            (Side::Black, black_die, white_die)
        };
        self.actor = Some(actor);
        self.dice_left = vec![hi, lo];
        self.phase = Phase::Moving;
        self.steps.clear();
        self.snapshot_turn_start();
    }

    /// Double the cube while the auto-double cap permits. The counter is
    /// checked and bumped per doubles event.
    fn apply_opening_double(&mut self) {
        let cap = self.rules.max_opening_auto_doubles;
        if cap == 0 || self.opening_auto_doubles < cap {
            self.board.double_cube();
            self.opening_auto_doubles += 1;
        }
    }

    // ===== Turn & dice ======================================================

    /// Roll two dice internally and open a new turn.
    pub fn roll_dice(&mut self) -> Result<(u8, u8), GameError> {
        if self.result.over {
            return Err(GameError::GameOver);
        }
        if self.phase != Phase::AwaitingRoll {
            return Err(GameError::WrongPhase("roll_dice", Phase::AwaitingRoll));
        }
        let mut rng = rand::thread_rng();
        let d1: u8 = rng.gen_range(1..=6);
        let d2: u8 = rng.gen_range(1..=6);
        self.begin_turn(d1, d2);
        Ok((d1, d2))
    }

    /// Provide an external roll (UI or deterministic tests).
    pub fn set_dice(&mut self, d1: u8, d2: u8) -> Result<(), GameError> {
        if self.result.over {
            return Err(GameError::GameOver);
        }
        if self.phase != Phase::AwaitingRoll {
            return Err(GameError::WrongPhase("set_dice", Phase::AwaitingRoll));
        }
        if !(1..=6).contains(&d1) || !(1..=6).contains(&d2) {
            return Err(GameError::DiceOutOfRange);
        }
        self.begin_turn(d1, d2);
        Ok(())
    }

    /// Doubles expand to four pips; otherwise the higher die is stored
    /// first so the higher-die commit check can compare against slot 0.
    fn begin_turn(&mut self, d1: u8, d2: u8) {
        self.dice_left = if d1 == d2 {
            vec![d1; 4]
        } else {
            vec![d1.max(d2), d1.min(d2)]
        };
        self.phase = Phase::Moving;
        self.steps.clear();
        self.snapshot_turn_start();
    }

    /// Capture the board the instant dice become known. Commit validation
    /// always searches from this snapshot.
    fn snapshot_turn_start(&mut self) {
        self.turn_start = self.board.position();
        self.turn_start_dice = self.dice_left.clone();
        self.turn_start_actor = self.actor;
    }

    // ===== Steps ============================================================

    /// Attempt one per-die step from `from` (0 enters from the bar)
    /// consuming `pip`. Per-step legality only; global obligations are
    /// validated at [`Game::commit_turn`].
    pub fn apply_step(&mut self, from: u8, pip: u8) -> Result<(), GameError> {
        if self.result.over {
            return Err(GameError::GameOver);
        }
        if self.phase != Phase::Moving {
            return Err(GameError::WrongPhase("apply_step", Phase::Moving));
        }
        if self.dice_left.is_empty() {
            return Err(GameError::NoDiceRemaining);
        }
        let slot = self
            .dice_left
            .iter()
            .position(|&d| d == pip)
            .ok_or(GameError::PipUnavailable(pip))?;
        let actor = self.actor.expect("Moving phase always has a side to move");

        let plan = moves::check_step(&self.board.position(), actor, from, pip)?;

        if plan.from_bar {
            self.board.pop_bar(actor);
        } else {
            self.board.remove_checker(actor, from);
        }
        match plan.kind {
            StepKind::Land { to, hit } => {
                if hit {
                    let opp = actor.opponent();
                    self.board.remove_checker(opp, to);
                    self.board.push_bar(opp);
                }
                self.board.place_checker(actor, to);
            }
            StepKind::BearOff => self.board.push_off(actor),
        }

        self.steps.push(StepRecord {
            from,
            pip,
            slot,
            plan,
        });
        self.dice_left.remove(slot);
        Ok(())
    }

    /// Undo the last applied step of this turn, restoring the checker, any
    /// hit victim, and the consumed pip.
    pub fn undo_step(&mut self) -> Result<(), GameError> {
        if self.result.over {
            return Err(GameError::GameOver);
        }
        if self.phase != Phase::Moving {
            return Err(GameError::WrongPhase("undo_step", Phase::Moving));
        }
        let record = self.steps.pop().ok_or(GameError::NothingToUndo)?;
        let actor = self.actor.expect("Moving phase always has a side to move");

        match record.plan.kind {
            StepKind::BearOff => {
                self.board.pop_off(actor);
                self.board.place_checker(actor, record.from);
            }
            StepKind::Land { to, hit } => {
                self.board.remove_checker(actor, to);
                if hit {
                    let opp = actor.opponent();
                    self.board.pop_bar(opp);
                    self.board.place_checker(opp, to);
                }
                if record.plan.from_bar {
                    self.board.push_bar(actor);
                } else {
                    self.board.place_checker(actor, record.from);
                }
            }
        }

        self.dice_left.insert(record.slot, record.pip);
        Ok(())
    }

    /// Finalize the turn.
    ///
    /// Let M be the maximum number of dice playable from the turn-start
    /// snapshot and U the number of applied steps. An empty commit passes
    /// only when M = 0; U < M is "must use maximum number of dice"; when
    /// M = 1 on a non-double roll the single step must have used the
    /// higher die. On success the actor swaps and the next roll is awaited;
    /// if the actor has borne off all 15 checkers the game ends instead.
    pub fn commit_turn(&mut self) -> Result<(), GameError> {
        if self.result.over {
            return Err(GameError::GameOver);
        }
        if self.phase != Phase::Moving {
            return Err(GameError::WrongPhase("commit_turn", Phase::Moving));
        }
        let actor = self.actor.expect("Moving phase always has a side to move");
        let turn_actor = self
            .turn_start_actor
            .expect("turn-start snapshot always has an actor");

        let max_use = moves::max_playable(&self.turn_start, turn_actor, &self.turn_start_dice);
        let used = self.steps.len() as u32;

        if used == 0 && max_use > 0 {
            return Err(GameError::MoveAvailable);
        }
        if used < max_use {
            return Err(GameError::MustUseMaxDice);
        }
        if max_use == 1
            && self.turn_start_dice.len() == 2
            && self.turn_start_dice[0] != self.turn_start_dice[1]
            && self.steps[0].pip != self.turn_start_dice[0]
        {
            return Err(GameError::MustUseHigherDie);
        }

        self.dice_left.clear();
        self.steps.clear();
        self.phase = Phase::AwaitingRoll;
        if self.board.count_off(actor) == 15 {
            self.result = GameResult {
                over: true,
                winner: Some(actor),
                final_cube: self.board.cube_value(),
                resigned: false,
            };
            self.actor = None;
        } else {
            self.actor = Some(actor.opponent());
        }
        Ok(())
    }

    // ===== Doubling cube ====================================================

    /// Offer the cube. Only the side to move may offer, only before
    /// rolling, and only while holding the cube or with it centered.
    pub fn offer_cube(&mut self) -> Result<(), GameError> {
        if self.result.over {
            return Err(GameError::GameOver);
        }
        if self.phase != Phase::AwaitingRoll {
            return Err(GameError::WrongPhase("offer_cube", Phase::AwaitingRoll));
        }
        if self.cube_pending_from.is_some() {
            return Err(GameError::OfferAlreadyPending);
        }
        let actor = self
            .actor
            .expect("AwaitingRoll phase always has a side to move");
        match self.board.cube_holder() {
            None => {}
            Some(holder) if holder == actor => {}
            Some(_) => return Err(GameError::NotCubeHolder),
        }
        self.cube_pending_from = Some(actor);
        self.phase = Phase::CubeOffered;
        Ok(())
    }

    /// Accept the pending offer: the cube doubles and transfers to the
    /// taker; the offerer remains to roll.
    pub fn take_cube(&mut self) -> Result<(), GameError> {
        if self.result.over {
            return Err(GameError::GameOver);
        }
        if self.phase != Phase::CubeOffered {
            return Err(GameError::NoOfferPending);
        }
        let offerer = self
            .cube_pending_from
            .take()
            .expect("CubeOffered phase always has an offerer");
        self.board.double_cube();
        self.board.set_cube_holder(Some(offerer.opponent()));
        self.phase = Phase::AwaitingRoll;
        Ok(())
    }

    /// Decline the pending offer: the game ends at the pre-double cube
    /// value with the offerer as winner.
    pub fn drop_cube(&mut self) -> Result<(), GameError> {
        if self.result.over {
            return Err(GameError::GameOver);
        }
        if self.phase != Phase::CubeOffered {
            return Err(GameError::NoOfferPending);
        }
        let offerer = self
            .cube_pending_from
            .take()
            .expect("CubeOffered phase always has an offerer");
        self.result = GameResult {
            over: true,
            winner: Some(offerer),
            final_cube: self.board.cube_value(),
            resigned: true,
        };
        self.actor = None;
        Ok(())
    }

    // ===== Snapshot =========================================================

    /// Materialize the broadcast form of the current state.
    pub fn snapshot(&self) -> BoardSnapshot {
        let mut points = [PointState::default(); 24];
        for (i, slot) in points.iter_mut().enumerate() {
            *slot = self.board.point(i as u8 + 1);
        }
        BoardSnapshot {
            points,
            white_bar: self.board.count_bar(Side::White),
            black_bar: self.board.count_bar(Side::Black),
            white_off: self.board.count_off(Side::White),
            black_off: self.board.count_off(Side::Black),
            cube_value: self.board.cube_value(),
            cube_holder: self.board.cube_holder(),
            phase: self.phase,
            side_to_move: self.actor,
            dice_remaining: self.dice_left.clone(),
        }
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new(Rules::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_throw_resolves_to_higher_side() {
        let mut game = Game::new(Rules::default());
        assert!(game.set_opening_dice(3, 1).unwrap());
        assert_eq!(game.side_to_move(), Some(Side::White));
        assert_eq!(game.phase(), Phase::Moving);
        assert_eq!(game.dice_remaining(), &[3, 1]);

        let mut game = Game::new(Rules::default());
        assert!(game.set_opening_dice(2, 5).unwrap());
        assert_eq!(game.side_to_move(), Some(Side::Black));
        assert_eq!(game.dice_remaining(), &[5, 2]);
    }

    #[test]
    fn opening_doubles_reroll_policy() {
        let mut game = Game::new(Rules::default());
        assert!(!game.set_opening_dice(4, 4).unwrap());
        assert_eq!(game.phase(), Phase::OpeningRoll);
        assert_eq!(game.cube_value(), 1);
        assert_eq!(game.opening_auto_doubles(), 0);
    }

    #[test]
    fn opening_doubles_auto_double_policy() {
        let rules = Rules {
            opening_double_policy: OpeningDoublePolicy::AutoDouble,
            max_opening_auto_doubles: 2,
            ..Rules::default()
        };
        let mut game = Game::new(rules);
        assert!(!game.set_opening_dice(4, 4).unwrap());
        assert_eq!(game.cube_value(), 2);
        assert!(!game.set_opening_dice(2, 2).unwrap());
        assert_eq!(game.cube_value(), 4);
        // Cap reached: further doubles leave the cube alone.
        assert!(!game.set_opening_dice(6, 6).unwrap());
        assert_eq!(game.cube_value(), 4);
        assert_eq!(game.opening_auto_doubles(), 2);

        assert!(game.set_opening_dice(6, 2).unwrap());
        assert_eq!(game.side_to_move(), Some(Side::White));
    }

    #[test]
    fn roll_opening_resolves_internally() {
        let mut game = Game::new(Rules::default());
        let (w, b) = game.roll_opening().unwrap();
        assert_ne!(w, b);
        assert_eq!(game.phase(), Phase::Moving);
        assert_eq!(game.dice_remaining().len(), 2);
    }

    #[test]
    fn dice_are_stored_higher_first() {
        let mut game = Game::from_position(Board::new(), Side::White, Rules::default());
        assert!(game.needs_roll());
        game.set_dice(2, 6).unwrap();
        assert_eq!(game.dice_remaining(), &[6, 2]);
        assert!(!game.needs_roll());
    }

    #[test]
    fn rules_are_carried_verbatim() {
        let rules = Rules {
            length_points: 7,
            ..Rules::default()
        };
        let game = Game::new(rules);
        assert_eq!(game.rules(), rules);
    }

    #[test]
    fn doubles_expand_to_four_pips() {
        let mut game = Game::from_position(Board::new(), Side::Black, Rules::default());
        game.set_dice(5, 5).unwrap();
        assert_eq!(game.dice_remaining(), &[5, 5, 5, 5]);
    }

    #[test]
    fn phase_guards_reject_out_of_phase_commands() {
        let mut game = Game::new(Rules::default());
        assert!(matches!(
            game.set_dice(3, 1),
            Err(GameError::WrongPhase("set_dice", Phase::AwaitingRoll))
        ));
        assert!(matches!(
            game.commit_turn(),
            Err(GameError::WrongPhase("commit_turn", Phase::Moving))
        ));

        game.set_opening_dice(3, 1).unwrap();
        assert!(matches!(
            game.roll_dice(),
            Err(GameError::WrongPhase("roll_dice", Phase::AwaitingRoll))
        ));
    }

    #[test]
    fn apply_step_requires_available_pip() {
        let mut game = Game::new(Rules::default());
        game.set_opening_dice(3, 1).unwrap();
        assert_eq!(game.apply_step(8, 5), Err(GameError::PipUnavailable(5)));
    }

    #[test]
    fn undo_with_empty_log_is_rejected() {
        let mut game = Game::new(Rules::default());
        game.set_opening_dice(3, 1).unwrap();
        assert_eq!(game.undo_step(), Err(GameError::NothingToUndo));
    }

    #[test]
    fn cube_offer_preconditions() {
        let mut game = Game::from_position(Board::new(), Side::White, Rules::default());
        game.offer_cube().unwrap();
        assert_eq!(game.phase(), Phase::CubeOffered);
        // A second offer while one is pending is out of phase.
        assert_eq!(game.offer_cube(), Err(GameError::WrongPhase("offer_cube", Phase::AwaitingRoll)));

        game.take_cube().unwrap();
        assert_eq!(game.cube_value(), 2);
        assert_eq!(game.cube_holder(), Some(Side::Black));
        assert_eq!(game.side_to_move(), Some(Side::White));

        // White no longer owns the cube.
        assert_eq!(game.offer_cube(), Err(GameError::NotCubeHolder));
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut game = Game::new(Rules::default());
        game.set_opening_dice(6, 5).unwrap();
        let snap = game.snapshot();
        assert_eq!(snap.phase, Phase::Moving);
        assert_eq!(snap.side_to_move, Some(Side::White));
        assert_eq!(snap.dice_remaining, vec![6, 5]);
        assert_eq!(snap.points[23].count, 2);
        assert_eq!(snap.points[23].side, Some(Side::White));
        assert_eq!(snap.cube_value, 1);
    }

    #[test]
    fn start_game_reinitializes_in_place() {
        let mut game = Game::from_position(Board::new(), Side::White, Rules::default());
        game.offer_cube().unwrap();
        game.drop_cube().unwrap();
        assert!(game.game_over());

        game.start_game(Rules::default());
        assert!(!game.game_over());
        assert!(!game.needs_roll());
        assert_eq!(game.phase(), Phase::OpeningRoll);
        assert_eq!(game.side_to_move(), None);
        assert_eq!(game.cube_value(), 1);
        assert_eq!(game.board().count_at(Side::White, 24), 2);
    }
}
