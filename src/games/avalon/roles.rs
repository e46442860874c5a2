//! Role assignment and private knowledge derivation.
//!
//! Knowledge is derived once when the roster is built and never changes.
//! Each participant only ever receives its own entry.

use super::rules::PLAYER_COUNT;
use super::types::{Faction, Participant, ParticipantId, Role};
use crate::error::GameError;
use rand::Rng;
use rand::seq::SliceRandom;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

/// Id of the human seat.
pub const HUMAN_ID: &str = "HUMAN";

/// Ids of the automated seats, in roster order.
pub const BOT_IDS: [&str; PLAYER_COUNT - 1] = ["BOT_1", "BOT_2", "BOT_3", "BOT_4"];

/// A single fact revealed to one participant at session start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, derive_more::Display)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Knowledge {
    /// The participant's own role and faction.
    #[display("You are {role}, on the {faction} side.")]
    OwnIdentity {
        /// Own role.
        role: Role,
        /// Own faction.
        faction: Faction,
    },
    /// Merlin's view of the evil side.
    #[display("These participants are evil: {}.", join_ids(participants))]
    EvilRevealed {
        /// Every evil participant.
        participants: Vec<ParticipantId>,
    },
    /// Percival's ambiguous pair.
    #[display(
        "These participants are Merlin and Morgana, but you do not know which is which: {}.",
        join_ids(participants)
    )]
    MerlinOrMorgana {
        /// Merlin and Morgana, roster order.
        participants: Vec<ParticipantId>,
    },
    /// An evil participant's view of its partners.
    #[display("These participants are evil like you: {}.", join_ids(participants))]
    FellowEvil {
        /// The other evil participants.
        participants: Vec<ParticipantId>,
    },
    /// The assassin's pending opportunity.
    #[display("If good completes three missions first, you get one chance to assassinate Merlin.")]
    AssassinationPending,
}

fn join_ids(ids: &[ParticipantId]) -> String {
    ids.iter()
        .map(ParticipantId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Per-participant knowledge, derived once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrivateKnowledge {
    entries: BTreeMap<ParticipantId, Vec<Knowledge>>,
}

impl PrivateKnowledge {
    /// Derives the knowledge of every participant in the roster.
    #[instrument(skip(participants), fields(count = participants.len()))]
    pub fn derive(participants: &[Participant]) -> Self {
        let ids_with = |pred: &dyn Fn(&Participant) -> bool| -> Vec<ParticipantId> {
            participants
                .iter()
                .filter(|p| pred(p))
                .map(|p| p.id().clone())
                .collect()
        };

        let mut entries = BTreeMap::new();
        for participant in participants {
            let mut list = vec![Knowledge::OwnIdentity {
                role: participant.role(),
                faction: participant.faction(),
            }];

            match participant.role() {
                Role::Merlin => {
                    let evil = ids_with(&|p| p.faction() == Faction::Evil);
                    if !evil.is_empty() {
                        list.push(Knowledge::EvilRevealed { participants: evil });
                    }
                }
                Role::Percival => {
                    let pair = ids_with(&|p| matches!(p.role(), Role::Merlin | Role::Morgana));
                    if !pair.is_empty() {
                        list.push(Knowledge::MerlinOrMorgana { participants: pair });
                    }
                }
                Role::Morgana | Role::Assassin => {
                    let me = participant.id();
                    let others = ids_with(&|p| p.faction() == Faction::Evil && p.id() != me);
                    if !others.is_empty() {
                        list.push(Knowledge::FellowEvil {
                            participants: others,
                        });
                    }
                }
                Role::Servant => {}
            }

            if participant.role() == Role::Assassin {
                list.push(Knowledge::AssassinationPending);
            }

            debug!(participant = %participant.id(), facts = list.len(), "Derived knowledge");
            entries.insert(participant.id().clone(), list);
        }

        Self { entries }
    }

    /// Returns the knowledge of one participant. Empty for unknown ids.
    pub fn for_participant(&self, id: &ParticipantId) -> &[Knowledge] {
        self.entries.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Result of building a roster.
#[derive(Debug, Clone)]
pub struct RoleAssignment {
    /// Roster in seating order; the human sits first.
    pub participants: Vec<Participant>,
    /// Index of the first leader.
    pub leader_index: usize,
    /// Knowledge derived from the roster.
    pub knowledge: PrivateKnowledge,
}

/// Builds the roster for a new session.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleAssigner;

impl RoleAssigner {
    /// Parses a role name, rejecting anything outside the five roles.
    #[instrument]
    pub fn parse_role(name: &str) -> Result<Role, GameError> {
        Role::from_str(name.trim()).map_err(|_| {
            warn!(role = name, "Unrecognized role");
            GameError::UnknownRole(name.to_string())
        })
    }

    /// Seats the human with `human_role` and shuffles the other four roles
    /// over the automated seats. The first leader is uniform over all seats.
    #[instrument(skip(rng))]
    pub fn assign<R: Rng + ?Sized>(human_role: Role, rng: &mut R) -> RoleAssignment {
        let mut remaining: Vec<Role> = Role::all()
            .into_iter()
            .filter(|role| *role != human_role)
            .collect();
        remaining.shuffle(rng);

        let mut participants = Vec::with_capacity(PLAYER_COUNT);
        participants.push(Participant::new(
            ParticipantId::from(HUMAN_ID),
            "You",
            human_role,
            true,
        ));
        for (index, (id, role)) in BOT_IDS.iter().zip(remaining).enumerate() {
            participants.push(Participant::new(
                ParticipantId::from(*id),
                format!("Bot_{}", index + 1),
                role,
                false,
            ));
        }

        let leader_index = rng.gen_range(0..participants.len());
        let knowledge = PrivateKnowledge::derive(&participants);

        info!(
            human_role = %human_role,
            leader = %participants[leader_index].id(),
            "Roles assigned"
        );

        RoleAssignment {
            participants,
            leader_index,
            knowledge,
        }
    }
}
