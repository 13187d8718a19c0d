use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use self::board::Board;
use self::deck::Deck;
use self::eligible::EligiblePlayers;
use self::player::{assign_roles, Player};
use self::power::{power_for, Power};
pub use self::events::GameEvent;
pub use self::player::{Team, Vote};

use crate::error::GameError;

mod board;
mod deck;
mod eligible;
mod events;
mod player;
mod power;
mod test;

/// A choice the president makes when discarding from the three drawn cards.
/// Names the card that is discarded; the remaining two keep their original
/// relative order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyChoice {
    First,
    Second,
    Third,
}

/// A choice the chancellor makes with the two cards handed down by the
/// president.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChancellorChoice {
    EnactFirst,
    EnactSecond,
    RequestVeto,
}

/// The engine's finite state machine. Only transient per-phase data lives in
/// the variants; persistent board state (§3) lives directly on [`Game`].
#[derive(Clone, Copy, Debug, PartialEq)]
enum GameState {
    NotStarted,
    AwaitingChancellorNomination,
    Voting,
    AwaitingPresidentPolicy { cards: (Team, Team, Team) },
    AwaitingChancellorPolicy { first: Team, second: Team, can_veto: bool },
    AwaitingChancellorPolicyNoVeto { first: Team, second: Team },
    AwaitingVeto { first: Team, second: Team },
    AwaitingAllegiancePeekChoice,
    AwaitingSpecialPresidentChoice,
    AwaitingKillChoice,
    LiberalPolicyWin,
    LiberalHitlerWin,
    FascistPolicyWin,
    FascistHitlerWin,
}

/// A single room's game of Secret Hitler. Parameterized only by player
/// count; the XL-variant roles and executive actions are out of scope.
#[derive(Clone, Debug)]
pub struct Game {
    players: Vec<Player>,
    board: Board,
    deck: Deck,
    state: GameState,
    president_counter: usize,
    president_id: Option<usize>,
    chancellor_id: Option<usize>,
    previous_president_id: Option<usize>,
    previous_chancellor_id: Option<usize>,
    special_election: bool,
    hitler_id: usize,
    rng: ChaCha8Rng,
}

impl Game {
    /// Assigns roles, shuffles the deck, and picks the first president.
    /// The game sits in `NotStarted` until [`Game::start`] is called.
    pub fn new(names: Vec<Vec<u8>>, seed: u64) -> Result<Self, GameError> {
        let num_players = names.len();
        if !(5..=10).contains(&num_players) {
            return Err(GameError::InvalidPlayerCount);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let (hitler_id, teams) = assign_roles(num_players, &mut rng);
        let players = names
            .into_iter()
            .zip(teams)
            .map(|(name, team)| Player::new(name, team))
            .collect();
        let deck = Deck::new(&mut rng);
        let president_counter = rng.gen_range(0..num_players);

        Ok(Self {
            players,
            board: Board::new(),
            deck,
            state: GameState::NotStarted,
            president_counter,
            president_id: Some(president_counter),
            chancellor_id: None,
            previous_president_id: None,
            previous_chancellor_id: None,
            special_election: false,
            hitler_id,
            rng,
        })
    }

    /// Moves the game from `NotStarted` into the first chancellor
    /// nomination. Called once the coordinator has sent team reveals.
    pub fn start(&mut self) -> Result<Vec<GameEvent>, GameError> {
        if self.state != GameState::NotStarted {
            return Err(GameError::WrongState);
        }
        self.state = GameState::AwaitingChancellorNomination;
        let eligible = self.eligible_chancellors();
        Ok(vec![GameEvent::ChancellorNominationRequested {
            president: self.president_counter,
            eligible,
        }])
    }

    pub fn num_players(&self) -> usize {
        self.players.len()
    }

    pub fn player(&self, idx: usize) -> Option<&Player> {
        self.players.get(idx)
    }

    pub fn president(&self) -> Option<usize> {
        self.president_id
    }

    pub fn chancellor(&self) -> Option<usize> {
        self.chancellor_id
    }

    pub fn hitler(&self) -> usize {
        self.hitler_id
    }

    pub fn liberal_policies(&self) -> usize {
        self.board.liberal_policies
    }

    pub fn fascist_policies(&self) -> usize {
        self.board.fascist_policies
    }

    pub fn election_tracker(&self) -> usize {
        self.board.election_tracker
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            GameState::LiberalPolicyWin
                | GameState::LiberalHitlerWin
                | GameState::FascistPolicyWin
                | GameState::FascistHitlerWin
        )
    }

    /// Called when a president nominates a chancellor candidate.
    pub fn nominate_chancellor(&mut self, candidate: usize) -> Result<Vec<GameEvent>, GameError> {
        self.check_player_index(candidate)?;
        if self.state != GameState::AwaitingChancellorNomination {
            return Err(GameError::WrongState);
        }
        if !self.eligible_chancellors().includes(candidate) {
            return Err(GameError::NotEligible);
        }

        for player in &mut self.players {
            player.reset_vote();
        }
        self.chancellor_id = Some(candidate);
        self.state = GameState::Voting;
        Ok(vec![GameEvent::ElectionAnnounced { chancellor: candidate }])
    }

    /// Called when a player casts a ballot on the current nomination.
    pub fn cast_vote(&mut self, voter: usize, vote: Vote) -> Result<Vec<GameEvent>, GameError> {
        self.check_player_index(voter)?;
        if self.state != GameState::Voting {
            return Err(GameError::WrongState);
        }
        let player = &mut self.players[voter];
        if !player.alive || player.voted {
            return Err(GameError::NotEligible);
        }
        player.voted = true;
        player.last_vote = Some(vote);

        let mut events = vec![GameEvent::VoteReceived { voter }];
        if !self.players.iter().filter(|p| p.alive).all(|p| p.voted) {
            return Ok(events);
        }

        let (mut ja, mut nein, mut ja_votes) = (0u32, 0u32, 0u16);
        for (idx, player) in self.players.iter().enumerate() {
            match (player.alive, player.last_vote) {
                (true, Some(Vote::Ja)) => {
                    ja += 1;
                    ja_votes |= 1 << idx;
                }
                (true, Some(Vote::Nein)) => nein += 1,
                _ => {}
            }
        }
        let success = ja > nein;
        events.push(GameEvent::ElectionResult { success, ja_votes });

        if success {
            if self.board.fascist_policies >= 3 && self.chancellor_id == Some(self.hitler_id) {
                self.state = GameState::FascistHitlerWin;
                events.push(GameEvent::FascistHitlerWin);
                return Ok(events);
            }
            self.previous_president_id = self.president_id;
            self.previous_chancellor_id = self.chancellor_id;
            self.deck
                .reshuffle_if_needed(self.board.liberal_policies, self.board.fascist_policies, &[], &mut self.rng);
            let cards = self.deck.draw_three();
            self.state = GameState::AwaitingPresidentPolicy { cards };
            events.push(GameEvent::PresidentPolicyChoice {
                president: self.president_id.expect("president set once game has started"),
                cards,
            });
        } else {
            events.extend(self.fail_government());
        }
        Ok(events)
    }

    /// Called when the president discards one of the three drawn cards.
    pub fn discard_president_policy(&mut self, choice: PolicyChoice) -> Result<Vec<GameEvent>, GameError> {
        let GameState::AwaitingPresidentPolicy { cards: (first, second, third) } = self.state else {
            return Err(GameError::WrongState);
        };
        let (first, second) = match choice {
            PolicyChoice::First => (second, third),
            PolicyChoice::Second => (first, third),
            PolicyChoice::Third => (first, second),
        };
        let can_veto = self.board.veto_unlocked();
        self.state = GameState::AwaitingChancellorPolicy { first, second, can_veto };
        Ok(vec![GameEvent::ChancellorPolicyChoice {
            chancellor: self.chancellor_id.expect("chancellor set during this legislative round"),
            first,
            second,
            can_veto,
        }])
    }

    /// Called when the chancellor enacts a policy or requests a veto.
    pub fn enact_chancellor_policy(&mut self, choice: ChancellorChoice) -> Result<Vec<GameEvent>, GameError> {
        use ChancellorChoice::*;
        match (self.state, choice) {
            (GameState::AwaitingChancellorPolicy { first, .. }, EnactFirst)
            | (GameState::AwaitingChancellorPolicyNoVeto { first, .. }, EnactFirst) => Ok(self.enact_policy(first, false)),
            (GameState::AwaitingChancellorPolicy { second, .. }, EnactSecond)
            | (GameState::AwaitingChancellorPolicyNoVeto { second, .. }, EnactSecond) => Ok(self.enact_policy(second, false)),
            (GameState::AwaitingChancellorPolicy { first, second, can_veto: true }, RequestVeto) => {
                self.state = GameState::AwaitingVeto { first, second };
                Ok(vec![GameEvent::VetoRequested])
            }
            _ => Err(GameError::WrongState),
        }
    }

    /// Called when the president accepts a pending veto.
    pub fn accept_veto(&mut self) -> Result<Vec<GameEvent>, GameError> {
        if !matches!(self.state, GameState::AwaitingVeto { .. }) {
            return Err(GameError::WrongState);
        }
        Ok(self.fail_government())
    }

    /// Called when the president rejects a pending veto.
    pub fn reject_veto(&mut self) -> Result<Vec<GameEvent>, GameError> {
        let GameState::AwaitingVeto { first, second } = self.state else {
            return Err(GameError::WrongState);
        };
        self.state = GameState::AwaitingChancellorPolicyNoVeto { first, second };
        Ok(vec![GameEvent::ChancellorPolicyChoice {
            chancellor: self.chancellor_id.expect("chancellor set during this legislative round"),
            first,
            second,
            can_veto: false,
        }])
    }

    /// Called by the president to investigate a player's loyalty.
    pub fn reveal_loyalty(&mut self, target: usize) -> Result<Vec<GameEvent>, GameError> {
        self.check_player_index(target)?;
        if self.state != GameState::AwaitingAllegiancePeekChoice {
            return Err(GameError::WrongState);
        }
        let president = self.president_id.expect("president set once game has started");
        let player = &self.players[target];
        if target == president || !player.alive || player.investigated {
            return Err(GameError::NotEligible);
        }
        self.players[target].investigated = true;
        let team = self.players[target].team;
        let mut events = vec![GameEvent::LoyaltyRevealed { president, target, team }];
        events.push(self.rotate_president());
        Ok(events)
    }

    /// Called by the president to hand the next term to a special election target.
    pub fn choose_special_president(&mut self, target: usize) -> Result<Vec<GameEvent>, GameError> {
        self.check_player_index(target)?;
        if self.state != GameState::AwaitingSpecialPresidentChoice {
            return Err(GameError::WrongState);
        }
        let current = self.president_id.expect("president set once game has started");
        if target == current || !self.players[target].alive {
            return Err(GameError::NotEligible);
        }
        self.president_id = Some(target);
        self.special_election = true;
        self.chancellor_id = None;
        self.state = GameState::AwaitingChancellorNomination;
        let eligible = self.eligible_chancellors();
        Ok(vec![
            GameEvent::SpecialPresidentChosen { target },
            GameEvent::ChancellorNominationRequested { president: target, eligible },
        ])
    }

    /// Called by the president to execute a player.
    pub fn kill_player(&mut self, target: usize) -> Result<Vec<GameEvent>, GameError> {
        self.check_player_index(target)?;
        if self.state != GameState::AwaitingKillChoice {
            return Err(GameError::WrongState);
        }
        if !self.players[target].alive {
            return Err(GameError::NotEligible);
        }
        self.players[target].alive = false;
        let mut events = vec![GameEvent::PlayerKilled { target }];
        if target == self.hitler_id {
            self.state = GameState::LiberalHitlerWin;
            events.push(GameEvent::LiberalHitlerWin);
        } else {
            events.push(self.rotate_president());
        }
        Ok(events)
    }

    /// Enacts a failed-government event: a failed vote or an accepted veto.
    /// Increments the election tracker and triggers chaos at 3.
    fn fail_government(&mut self) -> Vec<GameEvent> {
        self.board.election_tracker += 1;
        if self.board.election_tracker == 3 {
            self.deck
                .reshuffle_if_needed(self.board.liberal_policies, self.board.fascist_policies, &[], &mut self.rng);
            let card = self.deck.draw_one();
            self.previous_president_id = None;
            self.previous_chancellor_id = None;
            self.enact_policy(card, true)
        } else {
            vec![self.rotate_president()]
        }
    }

    /// Enacts a policy (regular or chaotic), checks for a policy-track win,
    /// and otherwise dispatches the presidential power or rotates.
    fn enact_policy(&mut self, team: Team, chaotic: bool) -> Vec<GameEvent> {
        match team {
            Team::Liberal => {
                self.board.play_liberal();
            }
            Team::Fascist => {
                self.board.play_fascist();
            }
        }
        self.board.election_tracker = 0;
        self.deck
            .reshuffle_if_needed(self.board.liberal_policies, self.board.fascist_policies, &[], &mut self.rng);

        let mut events = vec![GameEvent::PolicyEnacted { team, chaotic }];
        if let Some(win) = self.check_policy_win(team) {
            events.push(win);
            return events;
        }

        if chaotic || team == Team::Liberal {
            events.push(self.rotate_president());
            return events;
        }

        let president = self.president_id.expect("president set once game has started");
        match power_for(self.board.fascist_policies, self.players.len()) {
            Power::None => events.push(self.rotate_president()),
            Power::Investigate => {
                self.state = GameState::AwaitingAllegiancePeekChoice;
                let eligible = EligiblePlayers::from_predicate(&self.players, |idx, p| {
                    p.alive && !p.investigated && idx != president
                });
                events.push(GameEvent::InvestigationRequested { president, eligible });
            }
            Power::PeekThree => {
                let cards = self.deck.peek_three();
                events.push(GameEvent::TopCards { president, cards });
                events.push(self.rotate_president());
            }
            Power::SpecialElection => {
                self.state = GameState::AwaitingSpecialPresidentChoice;
                let eligible = EligiblePlayers::from_predicate(&self.players, |idx, p| p.alive && idx != president);
                events.push(GameEvent::SpecialElectionRequested { president, eligible });
            }
            Power::Execute => {
                self.state = GameState::AwaitingKillChoice;
                let eligible = EligiblePlayers::alive(&self.players);
                events.push(GameEvent::KillRequested { president, eligible });
            }
            Power::FascistPolicyWin => unreachable!("a 6th fascist policy is a win, handled before dispatch"),
        }
        events
    }

    fn check_policy_win(&mut self, team: Team) -> Option<GameEvent> {
        match team {
            Team::Liberal if self.board.liberal_policies == 5 => {
                self.state = GameState::LiberalPolicyWin;
                Some(GameEvent::LiberalPolicyWin)
            }
            Team::Fascist if self.board.fascist_policies == 6 => {
                self.state = GameState::FascistPolicyWin;
                Some(GameEvent::FascistPolicyWin)
            }
            _ => None,
        }
    }

    /// Advances the presidency by one seat (skipping dead players and, once,
    /// a pending special election) and opens the next nomination.
    fn rotate_president(&mut self) -> GameEvent {
        if self.special_election {
            self.special_election = false;
        } else {
            self.president_counter = self.next_alive(self.president_counter);
        }
        if !self.players[self.president_counter].alive {
            self.president_counter = self.next_alive(self.president_counter);
        }
        self.president_id = Some(self.president_counter);
        self.chancellor_id = None;
        self.state = GameState::AwaitingChancellorNomination;
        let eligible = self.eligible_chancellors();
        GameEvent::ChancellorNominationRequested {
            president: self.president_counter,
            eligible,
        }
    }

    fn eligible_chancellors(&self) -> EligiblePlayers {
        let president = self.president_id.expect("president set once game has started");
        let num_alive = self.players.iter().filter(|p| p.alive).count();
        EligiblePlayers::from_predicate(&self.players, |idx, p| {
            if !p.alive || idx == president {
                return false;
            }
            if Some(idx) == self.previous_chancellor_id {
                return false;
            }
            if num_alive > 5 && Some(idx) == self.previous_president_id {
                return false;
            }
            true
        })
    }

    fn next_alive(&self, from: usize) -> usize {
        let n = self.players.len();
        (from + 1..n)
            .chain(0..=from)
            .find(|idx| self.players[*idx].alive)
            .expect("at least one player is always alive while the game is in progress")
    }

    fn check_player_index(&self, idx: usize) -> Result<(), GameError> {
        if idx < self.players.len() {
            Ok(())
        } else {
            Err(GameError::InvalidPlayerIndex)
        }
    }
}

#[cfg(test)]
impl Game {
    /// Builds a game with explicit roles and a fixed first president,
    /// bypassing role-assignment randomness so tests can target exact
    /// scenarios (Hitler as chancellor, term-limit boundaries, etc).
    pub(crate) fn new_for_test(num_players: usize, hitler_id: usize, fascists: &[usize], seed: u64) -> Self {
        let mut teams = vec![Team::Liberal; num_players];
        teams[hitler_id] = Team::Fascist;
        for &idx in fascists {
            teams[idx] = Team::Fascist;
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let players = teams
            .into_iter()
            .enumerate()
            .map(|(idx, team)| Player::new(format!("player{idx}").into_bytes(), team))
            .collect();
        let deck = Deck::new(&mut rng);
        Self {
            players,
            board: Board::new(),
            deck,
            state: GameState::AwaitingChancellorNomination,
            president_counter: 0,
            president_id: Some(0),
            chancellor_id: None,
            previous_president_id: None,
            previous_chancellor_id: None,
            special_election: false,
            hitler_id,
            rng,
        }
    }

    pub(crate) fn force_board(&mut self, liberal_policies: usize, fascist_policies: usize) {
        self.board.liberal_policies = liberal_policies;
        self.board.fascist_policies = fascist_policies;
    }

    pub(crate) fn stack_deck(&mut self, cards: &[Team]) {
        self.deck.push_front_for_test(cards);
    }

    pub(crate) fn force_chancellor(&mut self, chancellor: usize) {
        self.chancellor_id = Some(chancellor);
    }
}
