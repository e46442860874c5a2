//! End-to-end phase machine scenarios against a scripted gateway.

mod common;

use common::{ScriptedGateway, first_seats, play_round, propose, seat_of, session, session_with};
use strictly_avalon::{
    CardFallback, DecisionKind, FallbackPolicy, Faction, GameError, GameStatus, Knowledge,
    MissionCard, MissionResult, MissionState, ParticipantId, Phase, Reply, Role, Vote,
    VoteFallback,
};

#[test]
fn test_merlin_learns_both_evil_seats() {
    let session = session(Role::Merlin, 1);
    let mut expected = vec![seat_of(&session, Role::Morgana), seat_of(&session, Role::Assassin)];
    expected.sort();

    let knowledge = session.human_knowledge();
    let mut revealed = knowledge
        .iter()
        .find_map(|k| match k {
            Knowledge::EvilRevealed { participants } => Some(participants.clone()),
            _ => None,
        })
        .unwrap();
    revealed.sort();
    assert_eq!(revealed, expected);
    assert_eq!(session.status(), GameStatus::Ongoing);
    assert_eq!(session.phase(), Phase::TeamBuilding);
    assert_eq!(session.current_round(), 1);
    assert_eq!(session.required_team_size(), Some(2));
}

#[tokio::test]
async fn test_five_rejections_hand_evil_the_win() {
    let gateway = ScriptedGateway::new().voting(Reply::Parsed(Vote::No));
    let mut session = session(Role::Servant, 2);

    for attempt in 1..=5u8 {
        let leader = session.leader_index();
        propose(&mut session, &gateway).await.unwrap();
        let outcome = session.submit_vote(Vote::No, &gateway).await.unwrap();

        assert!(!outcome.vote_result.approved);
        assert_eq!(outcome.vote_result.votes.len(), 5);
        assert_eq!(outcome.mission.state(), MissionState::Rejected);
        assert_eq!(session.ledger().consecutive_rejects(), attempt);
        assert_eq!(session.current_round(), 1);

        if attempt < 5 {
            assert_eq!(session.status(), GameStatus::Ongoing);
            assert_eq!(session.phase(), Phase::TeamBuilding);
            assert_eq!(session.leader_index(), (leader + 1) % 5);
        }
    }

    assert_eq!(session.status(), GameStatus::EvilWin);
    assert_eq!(session.phase(), Phase::Finished);
    assert_eq!(session.ledger().missions().len(), 5);
}

#[tokio::test]
async fn test_five_rejections_override_earlier_successes() {
    let mut session = session(Role::Servant, 12);
    let yes = ScriptedGateway::new();
    play_round(&mut session, &yes, None).await;
    assert_eq!(session.ledger().success_count(), 1);
    assert_eq!(session.current_round(), 2);

    let no = ScriptedGateway::new().voting(Reply::Parsed(Vote::No));
    for attempt in 1..=5u8 {
        propose(&mut session, &no).await.unwrap();
        let outcome = session.submit_vote(Vote::No, &no).await.unwrap();
        assert!(!outcome.vote_result.approved);
        assert_eq!(session.ledger().consecutive_rejects(), attempt);
        assert_eq!(session.current_round(), 2);
    }

    assert_eq!(session.status(), GameStatus::EvilWin);
    assert_eq!(session.phase(), Phase::Finished);
    assert_eq!(session.ledger().success_count(), 1);
    assert_eq!(session.ledger().fail_count(), 0);
}

#[tokio::test]
async fn test_rejections_split_by_approval_do_not_end_game() {
    let mut session = session(Role::Merlin, 13);
    let no = ScriptedGateway::new().voting(Reply::Parsed(Vote::No));
    let yes = ScriptedGateway::new();

    for _ in 0..2 {
        propose(&mut session, &no).await.unwrap();
        session.submit_vote(Vote::No, &no).await.unwrap();
    }
    assert_eq!(session.ledger().consecutive_rejects(), 2);

    play_round(&mut session, &yes, None).await;
    assert_eq!(session.ledger().consecutive_rejects(), 0);

    for _ in 0..3 {
        propose(&mut session, &no).await.unwrap();
        session.submit_vote(Vote::No, &no).await.unwrap();
    }
    assert_eq!(session.ledger().consecutive_rejects(), 3);
    assert_eq!(session.status(), GameStatus::Ongoing);
    assert_eq!(session.phase(), Phase::TeamBuilding);
    assert_eq!(session.current_round(), 2);
}

#[tokio::test]
async fn test_approval_resets_rejection_streak() {
    let mut session = session(Role::Percival, 3);
    let no = ScriptedGateway::new().voting(Reply::Parsed(Vote::No));
    propose(&mut session, &no).await.unwrap();
    session.submit_vote(Vote::No, &no).await.unwrap();
    assert_eq!(session.ledger().consecutive_rejects(), 1);

    let yes = ScriptedGateway::new();
    propose(&mut session, &yes).await.unwrap();
    let outcome = session.submit_vote(Vote::No, &yes).await.unwrap();
    assert!(outcome.vote_result.approved);
    assert_eq!(session.ledger().consecutive_rejects(), 0);
    assert_eq!(session.phase(), Phase::AwaitingCards);
}

#[tokio::test]
async fn test_votes_collected_in_roster_order() {
    let gateway = ScriptedGateway::new();
    let mut session = session(Role::Servant, 4);
    propose(&mut session, &gateway).await.unwrap();
    let outcome = session.submit_vote(Vote::No, &gateway).await.unwrap();

    let voters: Vec<&str> = outcome
        .vote_result
        .votes
        .iter()
        .map(|v| v.participant.as_str())
        .collect();
    assert_eq!(voters, ["HUMAN", "BOT_1", "BOT_2", "BOT_3", "BOT_4"]);
    assert_eq!(outcome.vote_result.votes[0].vote, Vote::No);
    // Four YES against one NO.
    assert!(outcome.vote_result.approved);
}

#[tokio::test]
async fn test_good_survives_missed_assassination() {
    let mut session = session(Role::Servant, 5);
    let target = seat_of(&session, Role::Percival);
    let gateway = ScriptedGateway::new().targeting(Reply::Parsed(target.clone()));

    for round in 1..=3u8 {
        assert_eq!(session.current_round(), round);
        play_round(&mut session, &gateway, None).await;
    }
    assert_eq!(session.status(), GameStatus::AssassinPhase);
    assert_eq!(session.phase(), Phase::Assassination);
    assert_eq!(session.required_team_size(), None);

    let outcome = session
        .submit_assassination_target(None, &gateway)
        .await
        .unwrap();
    assert_eq!(outcome.target, target);
    assert_eq!(outcome.status, GameStatus::GoodWin);
    assert_eq!(session.phase(), Phase::Finished);
}

#[tokio::test]
async fn test_assassinating_merlin_hands_evil_the_win() {
    let mut session = session(Role::Assassin, 6);
    let merlin = seat_of(&session, Role::Merlin);
    let gateway = ScriptedGateway::new();

    for _ in 0..3 {
        play_round(&mut session, &gateway, Some(MissionCard::Success)).await;
    }
    assert_eq!(session.status(), GameStatus::AssassinPhase);

    // The human holds the assassin role and must name the target.
    let missing = session.submit_assassination_target(None, &gateway).await;
    assert!(matches!(missing, Err(GameError::HumanMustDecide { .. })));

    let unknown = session
        .submit_assassination_target(Some(ParticipantId::from("BOT_9")), &gateway)
        .await;
    assert!(matches!(unknown, Err(GameError::UnknownParticipant(_))));
    assert_eq!(session.status(), GameStatus::AssassinPhase);

    let outcome = session
        .submit_assassination_target(Some(merlin), &gateway)
        .await
        .unwrap();
    assert_eq!(outcome.status, GameStatus::EvilWin);
}

#[tokio::test]
async fn test_three_failed_missions_end_the_game() {
    let mut session = session(Role::Morgana, 7);
    let gateway = ScriptedGateway::new();

    for round in 1..=3u8 {
        play_round(&mut session, &gateway, Some(MissionCard::Fail)).await;
        let mission = session.ledger().latest().unwrap();
        assert_eq!(mission.round(), round);
        assert_eq!(mission.result(), Some(MissionResult::Fail));
    }
    assert_eq!(session.ledger().fail_count(), 3);
    assert_eq!(session.status(), GameStatus::EvilWin);

    let after = session.submit_vote(Vote::Yes, &gateway).await;
    assert!(matches!(after, Err(GameError::GameOver(GameStatus::EvilWin))));
    let speech = session.speak("gg", &gateway).await;
    assert!(matches!(speech, Err(GameError::GameOver(_))));
}

#[tokio::test]
async fn test_round_advances_leader_and_team_size() {
    let gateway = ScriptedGateway::new();
    let mut session = session(Role::Servant, 8);
    let leader = session.leader_index();
    play_round(&mut session, &gateway, None).await;

    assert_eq!(session.current_round(), 2);
    assert_eq!(session.required_team_size(), Some(3));
    assert_eq!(session.leader_index(), (leader + 1) % 5);
    assert_eq!(session.phase(), Phase::TeamBuilding);
    assert_eq!(session.ledger().success_count(), 1);
}

#[tokio::test]
async fn test_evil_human_on_team_must_choose_card() {
    let gateway = ScriptedGateway::new();
    let mut session = session(Role::Assassin, 9);
    propose(&mut session, &gateway).await.unwrap();
    session.submit_vote(Vote::Yes, &gateway).await.unwrap();

    let result = session.submit_mission_card(None, &gateway).await;
    assert!(matches!(result, Err(GameError::MissingHumanCard)));
    assert_eq!(session.phase(), Phase::AwaitingCards);
    assert!(session.ledger().latest().unwrap().cards().is_empty());
}

#[tokio::test]
async fn test_good_human_card_is_forced_to_success() {
    let gateway = ScriptedGateway::new();
    let mut session = session(Role::Merlin, 10);
    propose(&mut session, &gateway).await.unwrap();
    session.submit_vote(Vote::Yes, &gateway).await.unwrap();

    let outcome = session
        .submit_mission_card(Some(MissionCard::Fail), &gateway)
        .await
        .unwrap();
    assert_eq!(outcome.mission_summary.result, MissionResult::Success);
}

#[tokio::test]
async fn test_good_bots_never_fail() {
    let gateway = ScriptedGateway::new().playing(Reply::Parsed(MissionCard::Fail));
    let mut session = session(Role::Servant, 11);
    let team: Vec<ParticipantId> = session
        .participants()
        .iter()
        .filter(|p| p.faction() == Faction::Good)
        .take(2)
        .map(|p| p.id().clone())
        .collect();

    if session.leader().is_human() {
        session.submit_team(team).unwrap();
    } else {
        let gateway = ScriptedGateway::new().proposing(Reply::Parsed(team));
        session.auto_team(&gateway).await.unwrap();
    }
    session.submit_vote(Vote::Yes, &gateway).await.unwrap();
    let outcome = session.submit_mission_card(None, &gateway).await.unwrap();
    assert_eq!(outcome.mission_summary.result, MissionResult::Success);
}

#[tokio::test]
async fn test_unreadable_evil_card_follows_policy() {
    let policy = FallbackPolicy {
        card: CardFallback::Fail,
        ..Default::default()
    };
    let mut session = session_with(Role::Servant, 12, policy);
    let morgana = seat_of(&session, Role::Morgana);
    let team = vec![ParticipantId::from("HUMAN"), morgana];
    let gateway = ScriptedGateway::new()
        .proposing(Reply::Parsed(team.clone()))
        .playing(Reply::Unparseable("I'd rather not say".to_string()));

    if session.leader().is_human() {
        session.submit_team(team).unwrap();
    } else {
        session.auto_team(&gateway).await.unwrap();
    }
    session.submit_vote(Vote::Yes, &gateway).await.unwrap();
    let outcome = session.submit_mission_card(None, &gateway).await.unwrap();
    assert_eq!(outcome.mission_summary.result, MissionResult::Fail);
}

#[tokio::test]
async fn test_operations_out_of_phase_are_rejected() {
    let gateway = ScriptedGateway::new();
    let mut session = session(Role::Servant, 13);

    let vote = session.submit_vote(Vote::Yes, &gateway).await;
    assert!(matches!(
        vote,
        Err(GameError::WrongPhase {
            expected: Phase::AwaitingVote,
            actual: Phase::TeamBuilding
        })
    ));
    let card = session.submit_mission_card(None, &gateway).await;
    assert!(matches!(card, Err(GameError::WrongPhase { .. })));
    let target = session.submit_assassination_target(None, &gateway).await;
    assert!(matches!(target, Err(GameError::WrongPhase { .. })));

    propose(&mut session, &gateway).await.unwrap();
    let again = propose(&mut session, &gateway).await;
    assert!(matches!(again, Err(GameError::WrongPhase { .. })));
    assert_eq!(session.ledger().missions().len(), 1);
}

#[tokio::test]
async fn test_leader_ownership_is_enforced() {
    let gateway = ScriptedGateway::new();
    let mut session = session(Role::Servant, 14);
    let size = session.required_team_size().unwrap();
    let team = first_seats(&session, size);

    if session.leader().is_human() {
        let result = session.auto_team(&gateway).await;
        assert!(matches!(result, Err(GameError::HumanMustDecide { .. })));
    } else {
        let result = session.submit_team(team);
        assert!(matches!(result, Err(GameError::NotYourDecision { .. })));
    }
    assert!(session.ledger().missions().is_empty());
    assert_eq!(session.phase(), Phase::TeamBuilding);
}

#[tokio::test]
async fn test_human_team_is_validated() {
    // Find a seed where the human leads round one.
    let mut session = (0..200)
        .map(|seed| session(Role::Servant, seed))
        .find(|s| s.leader().is_human())
        .unwrap();

    let too_big = first_seats(&session, 3);
    assert!(matches!(
        session.submit_team(too_big),
        Err(GameError::WrongTeamSize {
            round: 1,
            expected: 2,
            actual: 3
        })
    ));
    let doubled = vec![ParticipantId::from("HUMAN"), ParticipantId::from("HUMAN")];
    assert!(matches!(
        session.submit_team(doubled),
        Err(GameError::DuplicateTeamMember(_))
    ));
    let ghost = vec![ParticipantId::from("HUMAN"), ParticipantId::from("GHOST")];
    assert!(matches!(
        session.submit_team(ghost),
        Err(GameError::UnknownParticipant(_))
    ));
    assert!(session.ledger().missions().is_empty());

    let outcome = session.submit_team(first_seats(&session, 2)).unwrap();
    assert_eq!(outcome.mission.team().len(), 2);
    assert_eq!(outcome.public_view.phase, Phase::AwaitingVote);
}

#[tokio::test]
async fn test_invalid_bot_team_falls_back_to_random() {
    let gateway = ScriptedGateway::new().proposing(Reply::Parsed(vec![
        ParticipantId::from("BOT_1"),
        ParticipantId::from("BOT_1"),
    ]));
    let mut session = (0..200)
        .map(|seed| session(Role::Servant, seed))
        .find(|s| !s.leader().is_human())
        .unwrap();

    let outcome = session.auto_team(&gateway).await.unwrap();
    let team = outcome.mission.team();
    assert_eq!(team.len(), 2);
    assert_ne!(team[0], team[1]);
}

#[tokio::test]
async fn test_gateway_failure_leaves_session_untouched() {
    let gateway = ScriptedGateway::new();
    let mut session = session(Role::Servant, 15);
    propose(&mut session, &gateway).await.unwrap();
    let before = session.view();

    let failing = ScriptedGateway::new().failing_on(DecisionKind::Vote);
    let result = session.submit_vote(Vote::Yes, &failing).await;
    assert!(matches!(result, Err(GameError::Gateway(_))));
    assert_eq!(session.view(), before);
    assert!(session.ledger().latest().unwrap().votes().is_empty());
}

#[tokio::test]
async fn test_unreadable_votes_follow_policy() {
    let gateway = ScriptedGateway::new().voting(Reply::Unparseable("hmm".to_string()));

    let mut lenient = session(Role::Servant, 16);
    propose(&mut lenient, &gateway).await.unwrap();
    let outcome = lenient.submit_vote(Vote::No, &gateway).await.unwrap();
    assert!(outcome.vote_result.approved);

    let strict_policy = FallbackPolicy {
        vote: VoteFallback::Error,
        ..Default::default()
    };
    let mut strict = session_with(Role::Servant, 16, strict_policy);
    propose(&mut strict, &gateway).await.unwrap();
    let result = strict.submit_vote(Vote::No, &gateway).await;
    assert!(matches!(result, Err(GameError::Gateway(_))));
    assert_eq!(strict.phase(), Phase::AwaitingVote);
}

#[tokio::test]
async fn test_invalid_assassination_target_is_gateway_error() {
    let gateway = ScriptedGateway::new().targeting(Reply::Parsed(ParticipantId::from("NOBODY")));
    let mut session = session(Role::Servant, 17);
    for _ in 0..3 {
        play_round(&mut session, &gateway, None).await;
    }

    let supplied = session
        .submit_assassination_target(Some(ParticipantId::from("BOT_1")), &gateway)
        .await;
    assert!(matches!(supplied, Err(GameError::NotYourDecision { .. })));

    let result = session.submit_assassination_target(None, &gateway).await;
    assert!(matches!(result, Err(GameError::Gateway(_))));
    assert_eq!(session.status(), GameStatus::AssassinPhase);
}

#[tokio::test]
async fn test_speech_round_in_roster_order() {
    let gateway = ScriptedGateway::new();
    let mut session = session(Role::Servant, 18);

    let view = session.speak("  I trust BOT_2  ", &gateway).await.unwrap();
    let speakers: Vec<&str> = view.speech_log.iter().map(|s| s.from.as_str()).collect();
    assert_eq!(speakers, ["HUMAN", "BOT_1", "BOT_2", "BOT_3", "BOT_4"]);
    assert_eq!(view.speech_log[0].text, "I trust BOT_2");
    let orders: Vec<usize> = view.speech_log.iter().map(|s| s.order).collect();
    assert_eq!(orders, [1, 2, 3, 4, 5]);
    assert_eq!(view.speech_log[3].text, "BOT_3 has heard 3 speeches");
    assert_eq!(session.phase(), Phase::TeamBuilding);

    let again = session.speak("and BOT_4", &gateway).await.unwrap();
    assert_eq!(again.speech_log.len(), 10);
    assert_eq!(again.speech_log[5].order, 6);
}

#[tokio::test]
async fn test_speech_failures_keep_no_partial_batch() {
    let mut session = session(Role::Servant, 19);
    let gateway = ScriptedGateway::new();

    assert!(matches!(
        session.speak("   ", &gateway).await,
        Err(GameError::EmptySpeech)
    ));

    let failing = ScriptedGateway::new().failing_on(DecisionKind::Speech);
    let result = session.speak("hello", &failing).await;
    assert!(matches!(result, Err(GameError::Gateway(_))));
    assert!(session.speech_log().is_empty());
}
