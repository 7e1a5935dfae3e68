//! Step legality and the maximum-dice-usage search.
//!
//! Everything here is a pure function over a [`Position`] value: the same
//! legality code serves the live controller path (validating one step
//! against the current board) and the commit-time search (enumerating all
//! orderings of the turn's dice against the turn-start snapshot).

use crate::board::{Position, Side};
use thiserror::Error;

/// Source value that designates the bar in commands and step records.
pub const BAR: u8 = 0;

/// Reasons a single step is illegal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StepError {
    #[error("must enter from bar first")]
    MustEnterFromBar,

    #[error("bar is empty")]
    BarEmpty,

    #[error("invalid source point")]
    InvalidSource,

    #[error("no checker at source")]
    NoCheckerAtSource,

    #[error("destination blocked")]
    DestinationBlocked,

    #[error("cannot bear off, not all checkers in home")]
    NotAllHome,

    #[error("must use exact roll or bear off the rearmost checker")]
    InexactBearOff,
}

/// What a legal step does to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Land on a board point, optionally hitting a lone opposing checker.
    Land { to: u8, hit: bool },
    /// Remove the checker from play.
    BearOff,
}

/// A validated step, ready to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPlan {
    /// The checker enters from the bar rather than a point.
    pub from_bar: bool,
    pub kind: StepKind,
}

/// Destination of a checker of `actor` moved from `from` by `pip`.
///
/// `from == BAR` enters from the bar. Results outside 1..=24 are bear-off
/// candidates.
pub fn destination(actor: Side, from: u8, pip: u8) -> i32 {
    match actor {
        Side::White => {
            if from == BAR {
                25 - pip as i32
            } else {
                from as i32 - pip as i32
            }
        }
        Side::Black => {
            if from == BAR {
                pip as i32
            } else {
                from as i32 + pip as i32
            }
        }
    }
}

/// Validate one step of `actor` from `from` using `pip`.
///
/// Enforces per-step legality only; the global obligations (maximum dice
/// usage, higher die) are the controller's commit-time concern.
pub fn check_step(pos: &Position, actor: Side, from: u8, pip: u8) -> Result<StepPlan, StepError> {
    let on_bar = pos.bar[actor.index()] > 0;
    if on_bar && from != BAR {
        return Err(StepError::MustEnterFromBar);
    }

    if from == BAR {
        if !on_bar {
            return Err(StepError::BarEmpty);
        }
    } else {
        if !(1..=24).contains(&from) {
            return Err(StepError::InvalidSource);
        }
        if pos.count(actor, from) == 0 {
            return Err(StepError::NoCheckerAtSource);
        }
    }

    let to = destination(actor, from, pip);
    if (1..=24).contains(&to) {
        let to = to as u8;
        let opp_count = pos.count(actor.opponent(), to);
        if opp_count >= 2 {
            return Err(StepError::DestinationBlocked);
        }
        return Ok(StepPlan {
            from_bar: from == BAR,
            kind: StepKind::Land {
                to,
                hit: opp_count == 1,
            },
        });
    }

    // Off the board: a bear-off candidate. Entering from the bar always
    // lands on a point, so `from` is a real point here.
    if !pos.all_in_home(actor) {
        return Err(StepError::NotAllHome);
    }
    let exact = match actor {
        Side::White => from == pip,
        Side::Black => from == 25 - pip,
    };
    if !exact && pos.any_further_from_home(actor, from) {
        return Err(StepError::InexactBearOff);
    }
    Ok(StepPlan {
        from_bar: false,
        kind: StepKind::BearOff,
    })
}

/// Apply a validated step to a position value.
pub fn apply_step(pos: &mut Position, actor: Side, from: u8, plan: StepPlan) {
    let a = actor.index();
    if plan.from_bar {
        pos.bar[a] -= 1;
    } else {
        pos.points[a][from as usize] -= 1;
    }
    match plan.kind {
        StepKind::Land { to, hit } => {
            if hit {
                let o = actor.opponent().index();
                pos.points[o][to as usize] -= 1;
                pos.bar[o] += 1;
            }
            pos.points[a][to as usize] += 1;
        }
        StepKind::BearOff => pos.off[a] += 1,
    }
}

/// Maximum number of dice `actor` can legally play from `pos` across every
/// ordering of `dice` (doubles arrive expanded to four pips).
///
/// This is the authoritative arbiter for the commit-time obligations: the
/// maximum-dice rule compares the step count against this value, and the
/// higher-die rule applies when it returns 1 for a non-double roll.
pub fn max_playable(pos: &Position, actor: Side, dice: &[u8]) -> u32 {
    if dice.is_empty() {
        return 0;
    }
    dfs_max(pos, actor, dice, 0)
}

/// True if any single step is legal with the given dice.
pub fn has_any_step(pos: &Position, actor: Side, dice: &[u8]) -> bool {
    max_playable(pos, actor, dice) > 0
}

/// Depth-first enumeration over unused dice. `used` is a bitmask over
/// `dice` so the same die is not consumed twice within one branch.
fn dfs_max(pos: &Position, actor: Side, dice: &[u8], used: u32) -> u32 {
    let mut best = 0;
    for (i, &pip) in dice.iter().enumerate() {
        if used & (1 << i) != 0 {
            continue;
        }
        for from in candidate_sources(pos, actor) {
            let Ok(plan) = check_step(pos, actor, from, pip) else {
                continue;
            };
            let mut next = *pos;
            apply_step(&mut next, actor, from, plan);
            best = best.max(1 + dfs_max(&next, actor, dice, used | (1 << i)));
        }
    }
    best
}

/// Admissible `from` values: bar-first when the actor has checkers there,
/// otherwise every point holding at least one of the actor's checkers.
fn candidate_sources(pos: &Position, actor: Side) -> Vec<u8> {
    if pos.bar[actor.index()] > 0 {
        return vec![BAR];
    }
    (1..=24).filter(|&p| pos.count(actor, p) > 0).collect()
}
