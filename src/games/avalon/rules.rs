//! Fixed rule tables and win evaluation.

use super::types::GameStatus;
use tracing::instrument;

/// Number of seats at the table.
pub const PLAYER_COUNT: usize = 5;

/// Number of rounds in a game.
pub const ROUND_COUNT: u8 = 5;

/// Required team size per round (round 1 first).
pub const TEAM_SIZES: [usize; ROUND_COUNT as usize] = [2, 3, 2, 3, 3];

/// Consecutive rejections that hand the game to evil.
pub const MAX_CONSECUTIVE_REJECTS: u8 = 5;

/// Successes (or failures) needed to decide the mission track.
pub const MISSIONS_TO_WIN: u8 = 3;

/// Returns the required team size for a 1-indexed round.
#[instrument]
pub fn required_team_size(round: u8) -> Option<usize> {
    let index = usize::from(round).checked_sub(1)?;
    TEAM_SIZES.get(index).copied()
}

/// True iff `yes` is strictly more than half of `voters`.
#[instrument]
pub fn is_majority(yes: usize, voters: usize) -> bool {
    yes * 2 > voters
}

/// What happens after a mission resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionTrack {
    /// Play the next round.
    Continue,
    /// Status changes to the given value.
    Decided(GameStatus),
}

/// Evaluates the mission track. Failures are checked first.
#[instrument]
pub fn evaluate_track(success_count: u8, fail_count: u8) -> MissionTrack {
    if fail_count >= MISSIONS_TO_WIN {
        MissionTrack::Decided(GameStatus::EvilWin)
    } else if success_count >= MISSIONS_TO_WIN {
        MissionTrack::Decided(GameStatus::AssassinPhase)
    } else {
        MissionTrack::Continue
    }
}
