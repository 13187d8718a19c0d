//! Events emitted by [`super::Game`] mutators.
//!
//! Per the engine's callback discipline: every observable transition is
//! surfaced as an event rather than left for the coordinator to infer by
//! diffing state. A mutator returns its events in emission order; the
//! coordinator consumes them to drive outbound framing (see `wire`).

use super::eligible::EligiblePlayers;
use super::player::Team;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameEvent {
    ChancellorNominationRequested {
        president: usize,
        eligible: EligiblePlayers,
    },
    ElectionAnnounced {
        chancellor: usize,
    },
    VoteReceived {
        voter: usize,
    },
    ElectionResult {
        success: bool,
        ja_votes: u16,
    },
    PresidentPolicyChoice {
        president: usize,
        cards: (Team, Team, Team),
    },
    ChancellorPolicyChoice {
        chancellor: usize,
        first: Team,
        second: Team,
        can_veto: bool,
    },
    VetoRequested,
    PolicyEnacted {
        team: Team,
        chaotic: bool,
    },
    InvestigationRequested {
        president: usize,
        eligible: EligiblePlayers,
    },
    LoyaltyRevealed {
        president: usize,
        target: usize,
        team: Team,
    },
    TopCards {
        president: usize,
        cards: (Team, Team, Team),
    },
    SpecialElectionRequested {
        president: usize,
        eligible: EligiblePlayers,
    },
    SpecialPresidentChosen {
        target: usize,
    },
    KillRequested {
        president: usize,
        eligible: EligiblePlayers,
    },
    PlayerKilled {
        target: usize,
    },
    LiberalPolicyWin,
    LiberalHitlerWin,
    FascistPolicyWin,
    FascistHitlerWin,
}
