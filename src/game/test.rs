#![cfg(test)]

use super::events::GameEvent;
use super::{ChancellorChoice, Game, PolicyChoice, Team, Vote};
use crate::error::GameError;

fn new_five(hitler: usize, fascist: usize, seed: u64) -> Game {
    Game::new_for_test(5, hitler, &[fascist], seed)
}

#[test]
fn role_assignment_matches_table_across_sizes() {
    for n in 5..=10usize {
        let game = Game::new(vec![b"x".to_vec(); n], 42).unwrap();
        let fascists = (0..n).filter(|&i| game.player(i).unwrap().team == Team::Fascist).count();
        let expected = match n {
            5 | 6 => 2,
            7 | 8 => 3,
            9 | 10 => 4,
            _ => unreachable!(),
        };
        assert_eq!(fascists, expected);
    }
}

#[test]
fn rejects_out_of_range_player_counts() {
    assert_eq!(
        Game::new(vec![b"a".to_vec(); 4], 1).unwrap_err(),
        GameError::InvalidPlayerCount
    );
    assert_eq!(
        Game::new(vec![b"a".to_vec(); 11], 1).unwrap_err(),
        GameError::InvalidPlayerCount
    );
}

#[test]
fn start_is_the_only_valid_transition_from_not_started() {
    let mut game = Game::new(vec![b"a".to_vec(); 5], 1).unwrap();
    assert_eq!(game.nominate_chancellor(1).unwrap_err(), GameError::WrongState);
    let events = game.start().unwrap();
    assert!(matches!(events[0], GameEvent::ChancellorNominationRequested { .. }));
    assert_eq!(game.start().unwrap_err(), GameError::WrongState);
}

#[test]
fn nomination_rejects_president_and_previous_chancellor() {
    let mut game = new_five(4, 3, 7);
    assert_eq!(game.nominate_chancellor(0).unwrap_err(), GameError::NotEligible);
    game.nominate_chancellor(1).unwrap();
    // fail the vote to rotate, then make player 1 previous chancellor via a successful round.
    for (voter, vote) in [(0, Vote::Ja), (1, Vote::Ja), (2, Vote::Ja), (3, Vote::Ja), (4, Vote::Ja)] {
        game.cast_vote(voter, vote).unwrap();
    }
    // election succeeded: president=0, chancellor=1 is now the previous government.
    game.discard_president_policy(PolicyChoice::First).unwrap();
    game.enact_chancellor_policy(ChancellorChoice::EnactFirst).unwrap();
    // whoever is president now, player 1 (previous chancellor) must be ineligible.
    assert_eq!(game.nominate_chancellor(1).unwrap_err(), GameError::NotEligible);
}

#[test]
fn previous_president_eligible_only_at_five_alive() {
    let mut game = new_five(4, 3, 7);
    game.nominate_chancellor(1).unwrap();
    for (voter, vote) in [(0, Vote::Ja), (1, Vote::Ja), (2, Vote::Ja), (3, Vote::Ja), (4, Vote::Ja)] {
        game.cast_vote(voter, vote).unwrap();
    }
    game.discard_president_policy(PolicyChoice::First).unwrap();
    game.enact_chancellor_policy(ChancellorChoice::EnactFirst).unwrap();
    // president 0 is now previous_president_id; 5 players alive -> eligible again.
    game.nominate_chancellor(0).unwrap();
}

#[test]
fn duplicate_vote_is_a_no_op() {
    let mut game = new_five(4, 3, 7);
    game.nominate_chancellor(1).unwrap();
    game.cast_vote(0, Vote::Ja).unwrap();
    assert_eq!(game.cast_vote(0, Vote::Nein).unwrap_err(), GameError::NotEligible);
}

#[test]
fn failed_election_increments_tracker_and_advances_president() {
    let mut game = new_five(4, 3, 7);
    game.nominate_chancellor(1).unwrap();
    let president_before = game.president().unwrap();
    let mut events = Vec::new();
    for (voter, vote) in [(0, Vote::Nein), (1, Vote::Nein), (2, Vote::Ja), (3, Vote::Nein), (4, Vote::Nein)] {
        events = game.cast_vote(voter, vote).unwrap();
    }
    assert!(events.iter().any(|e| matches!(e, GameEvent::ElectionResult { success: false, .. })));
    assert_eq!(game.election_tracker(), 1);
    assert_ne!(game.president().unwrap(), president_before);
}

#[test]
fn three_failed_elections_trigger_chaos_and_clear_term_memory() {
    let mut game = new_five(4, 3, 7);
    game.stack_deck(&[Team::Fascist]);

    for _ in 0..3 {
        let chancellor = (0..5).find(|&c| game.nominate_chancellor(c).is_ok()).unwrap();
        let _ = chancellor;
        for voter in 0..5 {
            game.cast_vote(voter, Vote::Nein).unwrap();
        }
    }

    assert_eq!(game.election_tracker(), 0);
    assert_eq!(game.fascist_policies(), 1);
}

#[test]
fn veto_accepted_counts_as_a_failed_government() {
    let mut game = new_five(4, 3, 7);
    game.force_board(0, 5);
    game.nominate_chancellor(1).unwrap();
    for voter in 0..5 {
        game.cast_vote(voter, Vote::Ja).unwrap();
    }
    game.discard_president_policy(PolicyChoice::First).unwrap();
    let events = game.enact_chancellor_policy(ChancellorChoice::RequestVeto).unwrap();
    assert!(matches!(events[0], GameEvent::VetoRequested));
    game.accept_veto().unwrap();
    assert_eq!(game.election_tracker(), 1);
}

#[test]
fn veto_rejected_reprompts_without_veto_option() {
    let mut game = new_five(4, 3, 7);
    game.force_board(0, 5);
    game.nominate_chancellor(1).unwrap();
    for voter in 0..5 {
        game.cast_vote(voter, Vote::Ja).unwrap();
    }
    game.discard_president_policy(PolicyChoice::First).unwrap();
    game.enact_chancellor_policy(ChancellorChoice::RequestVeto).unwrap();
    let events = game.reject_veto().unwrap();
    assert!(matches!(
        events[0],
        GameEvent::ChancellorPolicyChoice { can_veto: false, .. }
    ));
    assert_eq!(
        game.enact_chancellor_policy(ChancellorChoice::RequestVeto).unwrap_err(),
        GameError::WrongState
    );
    game.enact_chancellor_policy(ChancellorChoice::EnactFirst).unwrap();
}

#[test]
fn hitler_executed_wins_immediately_regardless_of_board() {
    let mut game = new_five(4, 3, 7);
    game.force_board(0, 4);
    game.stack_deck(&[Team::Fascist, Team::Fascist, Team::Fascist]);
    game.nominate_chancellor(1).unwrap();
    for voter in 0..5 {
        game.cast_vote(voter, Vote::Ja).unwrap();
    }
    // fascist_policies=4 post-enactment -> Execute power for a 5-player table.
    game.discard_president_policy(PolicyChoice::Third).unwrap();
    let events = game.enact_chancellor_policy(ChancellorChoice::EnactFirst).unwrap();
    assert!(events.iter().any(|e| matches!(e, GameEvent::KillRequested { .. })));
    let events = game.kill_player(4).unwrap();
    assert!(events.iter().any(|e| matches!(e, GameEvent::LiberalHitlerWin)));
}

#[test]
fn reveal_loyalty_is_idempotent_once_investigated() {
    // Investigate only appears on the power table for 7+ player tables.
    let mut game = Game::new_for_test(7, 5, &[4, 3], 7);
    game.stack_deck(&[Team::Fascist, Team::Fascist, Team::Fascist]);
    game.nominate_chancellor(1).unwrap();
    for voter in 0..7 {
        game.cast_vote(voter, Vote::Ja).unwrap();
    }
    // fascist_policies=1 post-enactment -> Investigate for a 7-player table.
    game.discard_president_policy(PolicyChoice::Third).unwrap();
    let events = game.enact_chancellor_policy(ChancellorChoice::EnactFirst).unwrap();
    assert!(events.iter().any(|e| matches!(e, GameEvent::InvestigationRequested { .. })));
    game.reveal_loyalty(2).unwrap();
    assert_eq!(game.reveal_loyalty(2).unwrap_err(), GameError::NotEligible);
}

#[test]
fn fascist_hitler_win_when_chancellor_elected_after_three_fascist_policies() {
    let mut game = new_five(4, 3, 7);
    game.force_board(0, 3);
    game.nominate_chancellor(4).unwrap();
    let mut events = Vec::new();
    for voter in 0..5 {
        events = game.cast_vote(voter, Vote::Ja).unwrap();
    }
    assert!(events.iter().any(|e| matches!(e, GameEvent::FascistHitlerWin)));
}

#[test]
fn fascist_policy_track_win_at_six() {
    let mut game = new_five(4, 3, 7);
    game.force_board(0, 5);
    game.stack_deck(&[Team::Fascist, Team::Fascist, Team::Fascist]);
    game.nominate_chancellor(1).unwrap();
    for voter in 0..5 {
        game.cast_vote(voter, Vote::Ja).unwrap();
    }
    game.discard_president_policy(PolicyChoice::Third).unwrap();
    let events = game.enact_chancellor_policy(ChancellorChoice::EnactFirst).unwrap();
    assert!(events.iter().any(|e| matches!(e, GameEvent::FascistPolicyWin)));
}

#[test]
fn rotation_after_a_special_election_skips_the_seat_it_just_executed() {
    // 7 players so fascist_policies=3 triggers SpecialElection and
    // fascist_policies=4 triggers Execute (see power.rs's table).
    let mut game = Game::new_for_test(7, 6, &[5, 4], 7);
    game.force_board(0, 2);

    game.stack_deck(&[Team::Fascist, Team::Liberal, Team::Liberal]);
    game.nominate_chancellor(1).unwrap();
    for voter in 0..7 {
        game.cast_vote(voter, Vote::Ja).unwrap();
    }
    game.discard_president_policy(PolicyChoice::Second).unwrap();
    let events = game.enact_chancellor_policy(ChancellorChoice::EnactFirst).unwrap();
    assert!(events.iter().any(|e| matches!(e, GameEvent::SpecialElectionRequested { president: 0, .. })));

    // seat 0 (the regular president_counter) hands the term to seat 2, but
    // president_counter itself stays at 0 until this special term ends.
    game.choose_special_president(2).unwrap();

    game.stack_deck(&[Team::Fascist, Team::Liberal, Team::Liberal]);
    game.nominate_chancellor(3).unwrap();
    for voter in 0..7 {
        game.cast_vote(voter, Vote::Ja).unwrap();
    }
    game.discard_president_policy(PolicyChoice::Second).unwrap();
    let events = game.enact_chancellor_policy(ChancellorChoice::EnactFirst).unwrap();
    assert!(events.iter().any(|e| matches!(e, GameEvent::KillRequested { president: 2, .. })));

    // kill the player sitting in the seat the special election is about to
    // return to; the next rotation must not hand the presidency to a corpse.
    let events = game.kill_player(0).unwrap();
    let GameEvent::ChancellorNominationRequested { president, .. } =
        events.iter().find(|e| matches!(e, GameEvent::ChancellorNominationRequested { .. })).unwrap()
    else {
        unreachable!()
    };
    assert_ne!(*president, 0);
    assert!(game.player(*president).unwrap().alive);
}

#[test]
fn liberal_policy_track_win_at_five() {
    let mut game = new_five(4, 3, 7);
    game.force_board(4, 0);
    game.stack_deck(&[Team::Liberal, Team::Fascist, Team::Fascist]);
    game.nominate_chancellor(1).unwrap();
    for voter in 0..5 {
        game.cast_vote(voter, Vote::Ja).unwrap();
    }
    // discard the stacked Fascist in third position, keeping (Liberal, Fascist).
    game.discard_president_policy(PolicyChoice::Third).unwrap();
    let events = game.enact_chancellor_policy(ChancellorChoice::EnactFirst).unwrap();
    assert!(events.iter().any(|e| matches!(e, GameEvent::LiberalPolicyWin)));
    assert_eq!(game.liberal_policies(), 5);
}
