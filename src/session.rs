//! The per-room session coordinator: socket ingress demux, state-based
//! authorization, roster management, outbound framing, and connection-loss
//! handling. Grounded in `examples/original_source/server/manager.h`'s
//! `Manager` class, expressed as a Tokio room actor rather than a uWebSockets
//! callback object (see spec.md §5 / SPEC_FULL.md §5).

use bytes::Bytes;
use rand::Rng;
use tokio::sync::{mpsc, oneshot};

use crate::game::{ChancellorChoice, Game, GameEvent, PolicyChoice, Team, Vote as GameVote};
use crate::registry::{Key, Registry};
use crate::wire::{self, Inbound, PlayerBitmap, Vote as WireVote};

const MAX_CLIENTS: usize = 10;
const MIN_PLAYERS_TO_START: usize = 5;

/// Normal server-initiated teardown close, sent to clients whose room is
/// torn down (spec.md §6). The specified lifecycle never actually has
/// connected sockets left over at that point (pregame/terminal teardown only
/// fires once `client_count` hits zero), so this code is carried for
/// completeness but never emitted by [`Coordinator`] itself.
pub const CLOSE_NORMAL_TEARDOWN: u16 = 4000;
/// Forced close on every remaining socket when a mid-game disconnect
/// destroys the room.
pub const CLOSE_MID_GAME_DESTROY: u16 = 4001;
/// Join refused: no such room.
pub const CLOSE_JOIN_REFUSED: u16 = 4500;

/// A message pushed to one connection's outbound sink: either a frame to
/// write, or an instruction to close the socket with a specific code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    Frame(Bytes),
    Close(u16),
}

/// Messages a room actor consumes. One is spawned per room; every connection
/// belonging to that room forwards its inbound traffic here.
pub enum RoomEvent {
    /// A socket wants to join. `outbound` is the per-connection sink this
    /// client's frames/closes are pushed to; `reply` carries the assigned
    /// client id, or `None` if the room is full.
    Join {
        outbound: mpsc::UnboundedSender<Outbound>,
        reply: oneshot::Sender<Option<usize>>,
    },
    Frame {
        client: usize,
        data: Vec<u8>,
    },
    /// `code` is the WebSocket close code the connection actually closed
    /// with; codes >= 4000 are the coordinator's own doing and are ignored
    /// per spec.md §4.2.
    Disconnect {
        client: usize,
        code: u16,
    },
}

struct Client {
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    name: Vec<u8>,
    ready: bool,
}

impl Client {
    fn connected(&self) -> bool {
        self.outbound.is_some()
    }
}

/// Mirrors just enough of the engine's current state for the coordinator to
/// gate authorization on targeted actions (spec.md §4.2(a)/(b)). Updated
/// exactly once per relevant `GameEvent`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Pregame,
    Nomination { president: usize },
    Voting,
    PresidentDiscard { president: usize },
    ChancellorEnact { chancellor: usize },
    ChancellorEnactNoVeto { chancellor: usize },
    Veto { president: usize },
    Investigate { president: usize },
    SpecialElection { president: usize },
    Kill { president: usize },
    Terminal,
}

/// Outcome of handling a `RoomEvent`: whether the room actor should keep
/// running or tear itself down.
pub enum Disposition {
    Continue,
    Destroy,
}

pub struct Coordinator {
    clients: Vec<Client>,
    client_count: usize,
    game: Option<Game>,
    phase: Phase,
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            clients: (0..MAX_CLIENTS)
                .map(|_| Client { outbound: None, name: Vec::new(), ready: false })
                .collect(),
            client_count: 0,
            game: None,
            phase: Phase::Pregame,
        }
    }

    pub fn handle(&mut self, event: RoomEvent) -> Disposition {
        match event {
            RoomEvent::Join { outbound, reply } => {
                let id = self.add_client(outbound);
                let _ = reply.send(id);
                Disposition::Continue
            }
            RoomEvent::Frame { client, data } => {
                self.handle_frame(client, &data);
                Disposition::Continue
            }
            RoomEvent::Disconnect { client, code } => self.on_disconnect(client, code),
        }
    }

    /// Picks the lowest free slot, installs `outbound`, and replays the join
    /// protocol: the joining client learns its own id first, then every
    /// other connected client's current name.
    fn add_client(&mut self, outbound: mpsc::UnboundedSender<Outbound>) -> Option<usize> {
        if self.client_count >= MAX_CLIENTS {
            return None;
        }
        let id = self.clients.iter().position(|c| !c.connected())?;

        Self::send_to(&outbound, wire::assign_id(id));
        for (other_id, other) in self.clients.iter().enumerate() {
            if other.connected() {
                Self::send_to(&outbound, wire::name(other_id, &other.name));
            }
        }

        self.clients[id] = Client { outbound: Some(outbound), name: Vec::new(), ready: false };
        self.client_count += 1;
        log::info!("client {id} joined room ({} total)", self.client_count);
        Some(id)
    }

    fn handle_frame(&mut self, id: usize, data: &[u8]) {
        let Some(inbound) = wire::decode_inbound(data) else {
            log::trace!("dropped unparseable frame from client {id}");
            return;
        };
        if id >= self.clients.len() || !self.clients[id].connected() {
            return;
        }

        match inbound {
            Inbound::SelectChancellor { candidate } => self.select_chancellor(id, candidate),
            Inbound::EliminatePolicy { choice } => self.eliminate_policy(id, choice),
            Inbound::Reveal { target } => self.reveal(id, target),
            Inbound::Kill { target } => self.kill(id, target),
            Inbound::SelectSpecialPresident { target } => self.select_special_president(id, target),
            Inbound::CastVote(vote) => self.cast_vote(id, vote),
            Inbound::AcceptVeto => self.respond_to_veto(id, true),
            Inbound::RejectVeto => self.respond_to_veto(id, false),
            Inbound::SetName { name } => self.set_name(id, name),
            Inbound::SetReady(ready) => self.set_ready(id, ready),
        }
    }

    fn select_chancellor(&mut self, id: usize, candidate: usize) {
        let Phase::Nomination { president } = self.phase else { return };
        if id != president {
            return;
        }
        let Some(game) = &mut self.game else { return };
        if let Ok(events) = game.nominate_chancellor(candidate) {
            self.apply(events);
        }
    }

    fn eliminate_policy(&mut self, id: usize, choice: usize) {
        let Some(game) = &mut self.game else { return };
        let result = match self.phase {
            Phase::PresidentDiscard { president } if id == president => match choice {
                0 => Some(game.discard_president_policy(PolicyChoice::First)),
                1 => Some(game.discard_president_policy(PolicyChoice::Second)),
                2 => Some(game.discard_president_policy(PolicyChoice::Third)),
                _ => None,
            },
            Phase::ChancellorEnact { chancellor } if id == chancellor => match choice {
                0 => Some(game.enact_chancellor_policy(ChancellorChoice::EnactFirst)),
                1 => Some(game.enact_chancellor_policy(ChancellorChoice::EnactSecond)),
                2 => Some(game.enact_chancellor_policy(ChancellorChoice::RequestVeto)),
                _ => None,
            },
            Phase::ChancellorEnactNoVeto { chancellor } if id == chancellor => match choice {
                0 => Some(game.enact_chancellor_policy(ChancellorChoice::EnactFirst)),
                1 => Some(game.enact_chancellor_policy(ChancellorChoice::EnactSecond)),
                _ => None,
            },
            _ => None,
        };
        if let Some(Ok(events)) = result {
            self.apply(events);
        }
    }

    fn reveal(&mut self, id: usize, target: usize) {
        let Phase::Investigate { president } = self.phase else { return };
        if id != president {
            return;
        }
        let Some(game) = &mut self.game else { return };
        if let Ok(events) = game.reveal_loyalty(target) {
            self.apply(events);
        }
    }

    fn kill(&mut self, id: usize, target: usize) {
        let Phase::Kill { president } = self.phase else { return };
        if id != president {
            return;
        }
        let Some(game) = &mut self.game else { return };
        if let Ok(events) = game.kill_player(target) {
            self.apply(events);
        }
    }

    fn select_special_president(&mut self, id: usize, target: usize) {
        let Phase::SpecialElection { president } = self.phase else { return };
        if id != president {
            return;
        }
        let Some(game) = &mut self.game else { return };
        if let Ok(events) = game.choose_special_president(target) {
            self.apply(events);
        }
    }

    fn cast_vote(&mut self, id: usize, vote: WireVote) {
        if self.phase != Phase::Voting {
            return;
        }
        let Some(game) = &mut self.game else { return };
        let vote = match vote {
            WireVote::Ja => GameVote::Ja,
            WireVote::Nein => GameVote::Nein,
        };
        if let Ok(events) = game.cast_vote(id, vote) {
            self.apply(events);
        }
    }

    fn respond_to_veto(&mut self, id: usize, accept: bool) {
        let Phase::Veto { president } = self.phase else { return };
        if id != president {
            return;
        }
        let Some(game) = &mut self.game else { return };
        let result = if accept { game.accept_veto() } else { game.reject_veto() };
        if let Ok(events) = result {
            self.apply(events);
        }
    }

    fn set_name(&mut self, id: usize, name: Vec<u8>) {
        if id >= self.clients.len() || name.len() > 255 {
            return;
        }
        self.clients[id].name = name.clone();
        self.broadcast(wire::name(id, &name));
    }

    fn set_ready(&mut self, id: usize, ready: bool) {
        if self.phase != Phase::Pregame || id >= self.clients.len() {
            return;
        }
        if self.clients[id].ready == ready {
            return;
        }
        self.clients[id].ready = ready;
        self.broadcast(if ready { wire::ready_to_start(id) } else { wire::not_ready(id) });
        if ready {
            self.try_start_game();
        }
    }

    /// Starts the game once every connected client (of at least 5) is ready.
    fn try_start_game(&mut self) {
        if self.client_count < MIN_PLAYERS_TO_START {
            return;
        }
        if self.clients.iter().any(|c| c.connected() && !c.ready) {
            return;
        }

        self.compact();
        for client in &mut self.clients[..self.client_count] {
            client.ready = false;
        }

        let names: Vec<Vec<u8>> = self.clients[..self.client_count].iter().map(|c| c.name.clone()).collect();
        let seed = rand::thread_rng().gen();
        let mut game = match Game::new(names, seed) {
            Ok(game) => game,
            Err(err) => {
                log::error!("failed to start game with {} players: {err}", self.client_count);
                return;
            }
        };
        self.send_teams(&game);
        let events = game.start().expect("game.start is always valid from NotStarted");
        self.game = Some(game);
        self.apply(events);
    }

    /// Two-pointer sweep that compacts the roster into a contiguous
    /// `[0, client_count)` range, announcing a REASSIGN for every slot moved.
    fn compact(&mut self) {
        let (mut i, mut j) = (0usize, MAX_CLIENTS - 1);
        loop {
            while i < j && self.clients[i].connected() {
                i += 1;
            }
            while i < j && !self.clients[j].connected() {
                j -= 1;
            }
            if i >= j {
                break;
            }
            self.clients.swap(i, j);
            self.broadcast(wire::reassign(j, i));
            i += 1;
        }
    }

    fn send_teams(&mut self, game: &Game) {
        let hitler = game.hitler();
        let n = self.client_count;
        let fascist_bitmap = {
            let mut bm = PlayerBitmap::empty();
            for idx in 0..n {
                bm.set(idx, game.player(idx).expect("player in range").team == Team::Fascist);
            }
            bm
        };
        let hitler_ordinal = (0..hitler).filter(|&idx| fascist_bitmap.get(idx)).count() as u8;

        for idx in 0..n {
            if idx == hitler {
                continue;
            }
            let frame = if fascist_bitmap.get(idx) {
                wire::team_fascist(hitler_ordinal, fascist_bitmap)
            } else {
                wire::team_liberal()
            };
            self.send(idx, frame);
        }

        let hitler_frame = if n <= 6 {
            match (0..n).find(|&idx| idx != hitler && fascist_bitmap.get(idx)) {
                Some(id) => wire::team_hitler_small(id),
                None => wire::team_hitler_large(),
            }
        } else {
            wire::team_hitler_large()
        };
        self.send(hitler, hitler_frame);
    }

    /// Applies engine events in emission order: updates the coordinator's
    /// phase mirror and fans out the corresponding wire frames.
    fn apply(&mut self, events: Vec<GameEvent>) {
        for event in events {
            match event {
                GameEvent::ChancellorNominationRequested { president, eligible } => {
                    self.phase = Phase::Nomination { president };
                    self.broadcast(wire::request_chancellor_nomination(president, PlayerBitmap(eligible.bitmap())));
                }
                GameEvent::ElectionAnnounced { chancellor } => {
                    self.phase = Phase::Voting;
                    self.broadcast(wire::announce_election(chancellor));
                }
                GameEvent::VoteReceived { voter } => {
                    self.broadcast(wire::vote_received(voter));
                }
                GameEvent::ElectionResult { success, ja_votes } => {
                    self.broadcast(wire::ballot(success, PlayerBitmap(ja_votes)));
                }
                GameEvent::PresidentPolicyChoice { president, cards } => {
                    self.phase = Phase::PresidentDiscard { president };
                    for idx in 0..self.client_count {
                        let frame = if idx == president {
                            wire::request_president_policy_choice(Some(cards))
                        } else {
                            wire::request_president_policy_choice(None)
                        };
                        self.send(idx, frame);
                    }
                }
                GameEvent::ChancellorPolicyChoice { chancellor, first, second, can_veto } => {
                    self.phase = if can_veto {
                        Phase::ChancellorEnact { chancellor }
                    } else {
                        Phase::ChancellorEnactNoVeto { chancellor }
                    };
                    for idx in 0..self.client_count {
                        let frame = if idx == chancellor {
                            wire::request_chancellor_policy_choice(Some((first, second, can_veto)))
                        } else {
                            wire::request_chancellor_policy_choice(None)
                        };
                        self.send(idx, frame);
                    }
                }
                GameEvent::VetoRequested => {
                    if let Some(president) = self.game.as_ref().and_then(Game::president) {
                        self.phase = Phase::Veto { president };
                    }
                    self.broadcast(wire::request_president_veto());
                }
                GameEvent::PolicyEnacted { team, chaotic } => {
                    let frame = match (team, chaotic) {
                        (Team::Fascist, false) => wire::regular_fascist_policy(),
                        (Team::Fascist, true) => wire::chaotic_fascist_policy(),
                        (Team::Liberal, false) => wire::regular_liberal_policy(),
                        (Team::Liberal, true) => wire::chaotic_liberal_policy(),
                    };
                    self.broadcast(frame);
                }
                GameEvent::InvestigationRequested { president, eligible } => {
                    self.phase = Phase::Investigate { president };
                    self.broadcast(wire::request_investigation(PlayerBitmap(eligible.bitmap())));
                }
                GameEvent::LoyaltyRevealed { president, target, team } => {
                    for idx in 0..self.client_count {
                        if idx == president {
                            continue;
                        }
                        self.send(idx, wire::send_loyalty_public(target));
                    }
                    self.send(president, wire::send_loyalty_president(target, team));
                }
                GameEvent::TopCards { president, cards } => {
                    for idx in 0..self.client_count {
                        if idx == president {
                            continue;
                        }
                        self.send(idx, wire::top_cards_public());
                    }
                    self.send(president, wire::top_cards_president(cards));
                }
                GameEvent::SpecialElectionRequested { president, .. } => {
                    self.phase = Phase::SpecialElection { president };
                    self.broadcast(wire::request_special_nomination());
                }
                GameEvent::SpecialPresidentChosen { .. } => {}
                GameEvent::KillRequested { president, eligible } => {
                    self.phase = Phase::Kill { president };
                    self.broadcast(wire::request_kill(PlayerBitmap(eligible.bitmap())));
                }
                GameEvent::PlayerKilled { target } => {
                    self.broadcast(wire::death(target));
                }
                GameEvent::LiberalPolicyWin => {
                    self.phase = Phase::Terminal;
                    self.broadcast(wire::liberal_policy_win());
                }
                GameEvent::LiberalHitlerWin => {
                    self.phase = Phase::Terminal;
                    self.broadcast(wire::liberal_hitler_win());
                }
                GameEvent::FascistPolicyWin => {
                    self.phase = Phase::Terminal;
                    self.broadcast(wire::fascist_policy_win());
                }
                GameEvent::FascistHitlerWin => {
                    self.phase = Phase::Terminal;
                    self.broadcast(wire::fascist_hitler_win());
                }
            }
        }
    }

    /// Connection loss. Server-initiated codes (>= 4000) are ignored — the
    /// coordinator has already handled that lifecycle itself.
    fn on_disconnect(&mut self, id: usize, code: u16) -> Disposition {
        if code >= 4000 {
            return Disposition::Continue;
        }
        if id >= self.clients.len() || !self.clients[id].connected() {
            return Disposition::Continue;
        }
        self.clients[id].outbound = None;

        let pregame_or_terminal = matches!(self.phase, Phase::Pregame | Phase::Terminal);
        self.broadcast(wire::disconnect(id));

        if pregame_or_terminal {
            self.client_count -= 1;
            if self.client_count == 0 {
                Disposition::Destroy
            } else {
                Disposition::Continue
            }
        } else {
            for idx in 0..self.clients.len() {
                if let Some(outbound) = self.clients[idx].outbound.take() {
                    let _ = outbound.send(Outbound::Close(CLOSE_MID_GAME_DESTROY));
                }
            }
            Disposition::Destroy
        }
    }

    fn send(&mut self, id: usize, frame: bytes::BytesMut) {
        let Some(client) = self.clients.get(id) else { return };
        let Some(outbound) = &client.outbound else { return };
        Self::send_to(outbound, frame);
    }

    fn send_to(outbound: &mpsc::UnboundedSender<Outbound>, mut frame: bytes::BytesMut) {
        frame.truncate(wire::MAX_FRAME_LEN);
        let _ = outbound.send(Outbound::Frame(frame.freeze()));
    }

    fn broadcast(&mut self, frame: bytes::BytesMut) {
        for idx in 0..self.clients.len() {
            if self.clients[idx].connected() {
                self.send(idx, frame.clone());
            }
        }
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns a room actor task and registers it, returning the key clients use
/// to join it.
pub fn spawn_room(registry: &'static Registry) -> Key {
    let (tx, mut rx) = mpsc::unbounded_channel::<RoomEvent>();
    let key = registry.insert(tx);
    tokio::spawn(async move {
        let mut coordinator = Coordinator::new();
        while let Some(event) = rx.recv().await {
            if let Disposition::Destroy = coordinator.handle(event) {
                break;
            }
        }
        registry.reclaim(key);
        log::info!("room {} torn down", key.to_u32());
    });
    key
}

#[cfg(test)]
mod test {
    use super::*;

    fn join(coordinator: &mut Coordinator) -> (usize, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = coordinator.add_client(tx).expect("room has room");
        (id, rx)
    }

    #[test]
    fn add_client_assigns_lowest_free_index_and_replays_names() {
        let mut coordinator = Coordinator::new();
        let (id0, mut rx0) = join(&mut coordinator);
        assert_eq!(id0, 0);
        assert_eq!(rx0.try_recv().unwrap(), Outbound::Frame(wire::assign_id(0).freeze()));

        coordinator.set_name(0, b"Alice".to_vec());
        let _ = rx0.try_recv(); // the broadcasted NAME frame for its own set_name

        let (id1, mut rx1) = join(&mut coordinator);
        assert_eq!(id1, 1);
        assert_eq!(rx1.try_recv().unwrap(), Outbound::Frame(wire::assign_id(1).freeze()));
        assert_eq!(rx1.try_recv().unwrap(), Outbound::Frame(wire::name(0, b"Alice").freeze()));
    }

    #[test]
    fn room_rejects_an_eleventh_client() {
        let mut coordinator = Coordinator::new();
        for _ in 0..MAX_CLIENTS {
            join(&mut coordinator);
        }
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(coordinator.add_client(tx).is_none());
    }

    #[test]
    fn pregame_disconnect_of_the_last_client_destroys_the_room() {
        let mut coordinator = Coordinator::new();
        let (id, _rx) = join(&mut coordinator);
        assert!(matches!(coordinator.on_disconnect(id, 1000), Disposition::Destroy));
    }

    #[test]
    fn server_initiated_close_codes_are_ignored() {
        let mut coordinator = Coordinator::new();
        let (id, _rx) = join(&mut coordinator);
        assert!(matches!(coordinator.on_disconnect(id, 4000), Disposition::Continue));
        assert!(coordinator.clients[id].connected());
    }

    #[test]
    fn five_ready_clients_start_the_game() {
        let mut coordinator = Coordinator::new();
        let mut receivers = Vec::new();
        for _ in 0..5 {
            let (id, rx) = join(&mut coordinator);
            receivers.push((id, rx));
        }
        for (id, _) in &receivers {
            coordinator.set_ready(*id, true);
        }
        assert!(coordinator.game.is_some());
        assert!(matches!(coordinator.phase, Phase::Nomination { .. }));
    }

    #[test]
    fn mid_game_disconnect_destroys_the_room_and_closes_every_socket() {
        let mut coordinator = Coordinator::new();
        let mut receivers = Vec::new();
        for _ in 0..5 {
            let (id, rx) = join(&mut coordinator);
            receivers.push((id, rx));
        }
        for (id, _) in &receivers {
            coordinator.set_ready(*id, true);
        }
        assert!(matches!(coordinator.on_disconnect(0, 1000), Disposition::Destroy));

        for (id, mut rx) in receivers.into_iter().skip(1) {
            let last = std::iter::from_fn(|| rx.try_recv().ok()).last();
            assert_eq!(last, Some(Outbound::Close(CLOSE_MID_GAME_DESTROY)), "client {id} was not force-closed");
        }
    }
}
