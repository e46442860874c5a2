//! Contract-based validation for ledger actions.
//!
//! Preconditions run before every ledger mutation. Postconditions run in
//! debug builds and check that the ledger only ever grows.

use super::mission::{CastVote, MissionLedger, MissionState, PlayedCard};
use super::rules::required_team_size;
use super::types::{Faction, MissionCard, Participant, ParticipantId};
use crate::error::GameError;
use std::collections::HashSet;
use tracing::{instrument, warn};

// ─────────────────────────────────────────────────────────────
//  Contract Trait
// ─────────────────────────────────────────────────────────────

/// Preconditions and postconditions for one kind of ledger action.
pub trait Contract<A: ?Sized> {
    /// Checks the action against the roster and ledger before it is applied.
    fn pre(roster: &[Participant], ledger: &MissionLedger, action: &A) -> Result<(), GameError>;

    /// Checks the transition after the action was applied.
    fn post(before: &MissionLedger, after: &MissionLedger) -> Result<(), GameError> {
        LedgerGrows::check(before, after)
    }
}

/// A team proposed for a round.
#[derive(Debug, Clone, Copy)]
pub struct TeamProposal<'a> {
    /// Round the team is proposed for.
    pub round: u8,
    /// Proposed members.
    pub team: &'a [ParticipantId],
}

// ─────────────────────────────────────────────────────────────
//  Preconditions
// ─────────────────────────────────────────────────────────────

/// Precondition: the team has the size the round requires.
pub struct TeamSizeMatchesRound;

impl TeamSizeMatchesRound {
    /// Fails with the round's expected size on a mismatch.
    #[instrument(skip(proposal), fields(round = proposal.round, size = proposal.team.len()))]
    pub fn check(proposal: &TeamProposal<'_>) -> Result<(), GameError> {
        let expected = required_team_size(proposal.round).ok_or_else(|| {
            GameError::Invariant(format!("no team size for round {}", proposal.round))
        })?;
        if proposal.team.len() != expected {
            return Err(GameError::WrongTeamSize {
                round: proposal.round,
                expected,
                actual: proposal.team.len(),
            });
        }
        Ok(())
    }
}

/// Precondition: every member is seated and listed once.
pub struct TeamMembersDistinct;

impl TeamMembersDistinct {
    /// Rejects unseated and repeated members.
    #[instrument(skip_all)]
    pub fn check(roster: &[Participant], team: &[ParticipantId]) -> Result<(), GameError> {
        let mut seen = HashSet::new();
        for id in team {
            if !roster.iter().any(|p| p.id() == id) {
                return Err(GameError::UnknownParticipant(id.clone()));
            }
            if !seen.insert(id) {
                return Err(GameError::DuplicateTeamMember(id.clone()));
            }
        }
        Ok(())
    }
}

/// Precondition: no mission is waiting for votes or cards.
pub struct NoPendingMission;

impl NoPendingMission {
    /// Rejects a new proposal while one is unresolved.
    #[instrument(skip_all)]
    pub fn check(ledger: &MissionLedger) -> Result<(), GameError> {
        match ledger.pending() {
            Some(mission) => Err(GameError::MissionPending(mission.round())),
            None => Ok(()),
        }
    }
}

/// Precondition: the latest mission is in the given state.
pub struct LatestMissionIn;

impl LatestMissionIn {
    /// Fails unless the latest mission is in `state`.
    #[instrument(skip(ledger))]
    pub fn check(ledger: &MissionLedger, state: MissionState) -> Result<(), GameError> {
        match ledger.latest() {
            Some(mission) if mission.state() == state => Ok(()),
            Some(mission) => Err(GameError::Invariant(format!(
                "latest mission is {}, expected {}",
                mission.state(),
                state
            ))),
            None => Err(GameError::Invariant(format!(
                "no mission recorded, expected one in {}",
                state
            ))),
        }
    }
}

/// Precondition: exactly one vote from every seated participant.
pub struct OneVoteEach;

impl OneVoteEach {
    /// Rejects any vote set other than one per participant.
    #[instrument(skip_all)]
    pub fn check(roster: &[Participant], votes: &[CastVote]) -> Result<(), GameError> {
        let voters: HashSet<&ParticipantId> = votes.iter().map(|v| &v.participant).collect();
        let all_seated = roster.iter().all(|p| voters.contains(p.id()));
        if votes.len() != roster.len() || voters.len() != roster.len() || !all_seated {
            warn!(votes = votes.len(), seats = roster.len(), "Vote set incomplete");
            return Err(GameError::Invariant(format!(
                "expected one vote from each of {} participants, got {}",
                roster.len(),
                votes.len()
            )));
        }
        Ok(())
    }
}

/// Precondition: exactly one card from every team member.
pub struct OneCardPerMember;

impl OneCardPerMember {
    /// Rejects any card set other than one per team member.
    #[instrument(skip_all)]
    pub fn check(team: &[ParticipantId], cards: &[PlayedCard]) -> Result<(), GameError> {
        let players: HashSet<&ParticipantId> = cards.iter().map(|c| &c.participant).collect();
        let all_members = team.iter().all(|id| players.contains(id));
        if cards.len() != team.len() || players.len() != team.len() || !all_members {
            warn!(cards = cards.len(), team = team.len(), "Card set incomplete");
            return Err(GameError::Invariant(format!(
                "expected one card from each of {} team members, got {}",
                team.len(),
                cards.len()
            )));
        }
        Ok(())
    }
}

/// Precondition: good participants only ever play success.
pub struct GoodPlaysSuccess;

impl GoodPlaysSuccess {
    /// Rejects a FAIL card from a good participant.
    #[instrument(skip_all)]
    pub fn check(roster: &[Participant], cards: &[PlayedCard]) -> Result<(), GameError> {
        for played in cards {
            let participant = roster
                .iter()
                .find(|p| p.id() == &played.participant)
                .ok_or_else(|| {
                    GameError::Invariant(format!("card from unseated {}", played.participant))
                })?;
            if participant.faction() == Faction::Good && played.card == MissionCard::Fail {
                return Err(GameError::Invariant(format!(
                    "good participant {} played FAIL",
                    played.participant
                )));
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────
//  Postconditions
// ─────────────────────────────────────────────────────────────

/// Postcondition: history is append-only and the mission counters never shrink.
pub struct LedgerGrows;

impl LedgerGrows {
    /// Compares the ledger before and after one action.
    #[instrument(skip_all)]
    pub fn check(before: &MissionLedger, after: &MissionLedger) -> Result<(), GameError> {
        let kept_history = after.missions().len() >= before.missions().len()
            && before
                .missions()
                .iter()
                .zip(after.missions())
                .take(before.missions().len().saturating_sub(1))
                .all(|(b, a)| b == a);
        let counters_grow = after.success_count() >= before.success_count()
            && after.fail_count() >= before.fail_count();
        if !kept_history || !counters_grow {
            return Err(GameError::Invariant(
                "mission ledger history or counters went backwards".to_string(),
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────
//  Action Contracts
// ─────────────────────────────────────────────────────────────

/// Contract for proposing a team.
pub struct StartContract;

impl<'a> Contract<TeamProposal<'a>> for StartContract {
    fn pre(
        roster: &[Participant],
        ledger: &MissionLedger,
        action: &TeamProposal<'a>,
    ) -> Result<(), GameError> {
        NoPendingMission::check(ledger)?;
        TeamSizeMatchesRound::check(action)?;
        TeamMembersDistinct::check(roster, action.team)
    }
}

/// Contract for tallying votes.
pub struct TallyContract;

impl Contract<[CastVote]> for TallyContract {
    fn pre(
        roster: &[Participant],
        ledger: &MissionLedger,
        action: &[CastVote],
    ) -> Result<(), GameError> {
        LatestMissionIn::check(ledger, MissionState::AwaitingVote)?;
        OneVoteEach::check(roster, action)
    }
}

/// Contract for revealing mission cards.
pub struct ResolveContract;

impl Contract<[PlayedCard]> for ResolveContract {
    fn pre(
        roster: &[Participant],
        ledger: &MissionLedger,
        action: &[PlayedCard],
    ) -> Result<(), GameError> {
        LatestMissionIn::check(ledger, MissionState::AwaitingCards)?;
        let team = ledger.latest().map(|m| m.team()).unwrap_or(&[]);
        OneCardPerMember::check(team, action)?;
        GoodPlaysSuccess::check(roster, action)
    }

    fn post(before: &MissionLedger, after: &MissionLedger) -> Result<(), GameError> {
        LedgerGrows::check(before, after)?;
        let resolved = u16::from(after.success_count()) + u16::from(after.fail_count());
        let before_resolved = u16::from(before.success_count()) + u16::from(before.fail_count());
        if resolved != before_resolved + 1 {
            return Err(GameError::Invariant(
                "resolving a mission must move exactly one counter".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::avalon::types::Role;

    fn roster() -> Vec<Participant> {
        vec![
            Participant::new("HUMAN".into(), "You", Role::Servant, true),
            Participant::new("BOT_1".into(), "Bot_1", Role::Merlin, false),
            Participant::new("BOT_2".into(), "Bot_2", Role::Assassin, false),
            Participant::new("BOT_3".into(), "Bot_3", Role::Percival, false),
            Participant::new("BOT_4".into(), "Bot_4", Role::Morgana, false),
        ]
    }

    #[test]
    fn test_unknown_member_rejected() {
        let team = vec![ParticipantId::from("HUMAN"), ParticipantId::from("BOT_9")];
        assert!(matches!(
            TeamMembersDistinct::check(&roster(), &team),
            Err(GameError::UnknownParticipant(_))
        ));
    }

    #[test]
    fn test_duplicate_member_rejected() {
        let team = vec![ParticipantId::from("BOT_1"), ParticipantId::from("BOT_1")];
        assert!(matches!(
            TeamMembersDistinct::check(&roster(), &team),
            Err(GameError::DuplicateTeamMember(_))
        ));
    }

    #[test]
    fn test_team_size_by_round() {
        let two = vec![ParticipantId::from("HUMAN"), ParticipantId::from("BOT_1")];
        assert!(TeamSizeMatchesRound::check(&TeamProposal { round: 1, team: &two }).is_ok());
        assert!(TeamSizeMatchesRound::check(&TeamProposal { round: 2, team: &two }).is_err());
        assert!(TeamSizeMatchesRound::check(&TeamProposal { round: 3, team: &two }).is_ok());
    }

    #[test]
    fn test_duplicate_votes_rejected() {
        let votes: Vec<CastVote> = ["HUMAN", "HUMAN", "BOT_1", "BOT_2", "BOT_3"]
            .iter()
            .map(|id| CastVote::new(ParticipantId::from(*id), super::super::types::Vote::Yes))
            .collect();
        assert!(OneVoteEach::check(&roster(), &votes).is_err());
    }

    #[test]
    fn test_evil_may_fail() {
        let cards = vec![
            PlayedCard::new("BOT_2".into(), MissionCard::Fail),
            PlayedCard::new("HUMAN".into(), MissionCard::Success),
        ];
        assert!(GoodPlaysSuccess::check(&roster(), &cards).is_ok());
        let cards = vec![PlayedCard::new("HUMAN".into(), MissionCard::Fail)];
        assert!(GoodPlaysSuccess::check(&roster(), &cards).is_err());
    }
}
