//! Five-player hidden-role mission game.
//!
//! Two factions, five roles, five rounds. Good wins three missions and then
//! survives the assassination; evil wins three failed missions, five rejected
//! teams in a row, or a correct guess at Merlin.

mod contracts;
mod machine;
mod mission;
mod roles;
mod rules;
mod types;
mod view;

pub use contracts::{
    Contract, GoodPlaysSuccess, LatestMissionIn, LedgerGrows, NoPendingMission, OneCardPerMember,
    OneVoteEach, ResolveContract, StartContract, TallyContract, TeamMembersDistinct,
    TeamProposal, TeamSizeMatchesRound,
};
pub use machine::{
    AssassinationOutcome, GameSession, MissionOutcome, MissionSummary, SessionId, TeamOutcome,
    VoteOutcome, VoteResult,
};
pub use mission::{CastVote, Mission, MissionLedger, MissionState, PlayedCard};
pub use roles::{BOT_IDS, HUMAN_ID, Knowledge, PrivateKnowledge, RoleAssigner, RoleAssignment};
pub use rules::{
    MAX_CONSECUTIVE_REJECTS, MISSIONS_TO_WIN, MissionTrack, PLAYER_COUNT, ROUND_COUNT, TEAM_SIZES,
    evaluate_track, is_majority, required_team_size,
};
pub use types::{
    Faction, GameStatus, MissionCard, MissionResult, Participant, ParticipantId, Phase, Role,
    Speech, Vote,
};
pub use view::{PrivacyProjector, PublicParticipant, PublicView};
