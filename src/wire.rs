//! Binary wire protocol: outbound message encoding and inbound frame demux.
//!
//! Every frame is a WebSocket binary frame. The low 4 bits of the first byte
//! select an outbound message code (§6); the high 4 bits (and any trailing
//! bytes) carry the payload. Inbound frames are demuxed on `firstByte % 8`
//! (§4.2). All layouts below are grounded in
//! `examples/original_source/server/manager.h`'s `MessageCode` /
//! `ExtendedMessageCodes` enums and `handleMessage`.

use bytes::{BufMut, BytesMut};

use crate::game::Team;

/// Maximum size of any single outbound frame (spec.md §6).
pub const MAX_FRAME_LEN: usize = 256;

fn team_bit(team: Team) -> u8 {
    match team {
        Team::Fascist => 0,
        Team::Liberal => 1,
    }
}

/// A 10-bit membership bitmap over player slots 0..9, as used by the
/// eligibility / alive-player wire payloads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlayerBitmap(pub u16);

impl PlayerBitmap {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn set(&mut self, idx: usize, value: bool) {
        if value {
            self.0 |= 1 << idx;
        } else {
            self.0 &= !(1 << idx);
        }
    }

    pub fn get(&self, idx: usize) -> bool {
        (self.0 >> idx) & 1 == 1
    }
}

/// Appends the low 2 bits of `bitmap` into bits 6..7 of `first_byte`, and the
/// remaining 8 bits as a trailing byte. This is the layout shared by
/// REQUEST_INVESTIGATION, REQUEST_KILL and REQUEST_CHANCELLOR_NOMINATION's
/// eligibility payload.
fn push_split_bitmap(buf: &mut BytesMut, first_byte: u8, bitmap: PlayerBitmap) {
    let v = bitmap.0;
    buf.put_u8(first_byte | (((v & 0b11) as u8) << 6));
    buf.put_u8(((v >> 2) & 0xFF) as u8);
}

/// Outbound message codes (low 4 bits of the first byte). See spec.md §6.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Code {
    AnnounceElection = 0,
    RequestPresidentPolicyChoice = 1,
    RequestChancellorPolicyChoice = 2,
    RequestInvestigation = 3,
    RequestKill = 4,
    SendLoyalty = 5,
    TopCards = 6,
    VoteReceived = 7,
    Ballot = 8,
    Disconnect = 9,
    ReadyToStart = 10,
    NotReady = 11,
    Team = 12,
    Name = 13,
    Death = 14,
    Extended = 15,
}

/// Extended sub-codes, carried in the high nibble when `Code::Extended` is used.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtendedCode {
    RequestPresidentVeto = 0,
    LiberalPolicyWin = 1,
    LiberalHitlerWin = 2,
    FascistPolicyWin = 3,
    FascistHitlerWin = 4,
    RequestSpecialNomination = 5,
    Reassign = 6,
    RegularFascistPolicy = 7,
    ChaoticFascistPolicy = 8,
    RegularLiberalPolicy = 9,
    ChaoticLiberalPolicy = 10,
    RequestChancellorNomination = 11,
    GameKey = 12,
}

fn extended(sub: ExtendedCode) -> u8 {
    ((sub as u8) << 4) | (Code::Extended as u8)
}

/// Builds a single-byte frame with the given code in the high nibble.
fn frame_with_nibble(code: Code, nibble: u8) -> BytesMut {
    let mut buf = BytesMut::with_capacity(1);
    buf.put_u8((code as u8) | (nibble << 4));
    buf
}

/// The join-reply frame: a bare byte naming the joining client's own slot
/// index. Not part of the outbound code table — `addClient` in the original
/// sends this ahead of any other traffic, before the joining client knows
/// enough about the protocol to interpret a coded message.
pub fn assign_id(id: usize) -> BytesMut {
    let mut buf = BytesMut::with_capacity(1);
    buf.put_u8(id as u8);
    buf
}

pub fn announce_election(chancellor: usize) -> BytesMut {
    frame_with_nibble(Code::AnnounceElection, chancellor as u8)
}

/// The president-policy-choice frame, distinct for the president (who sees
/// the three drawn cards) and everyone else (who sees a bare code).
pub fn request_president_policy_choice(cards: Option<(Team, Team, Team)>) -> BytesMut {
    let mut byte = Code::RequestPresidentPolicyChoice as u8;
    if let Some((a, b, c)) = cards {
        byte |= team_bit(a) << 5;
        byte |= team_bit(b) << 6;
        byte |= team_bit(c) << 7;
    }
    let mut buf = BytesMut::with_capacity(1);
    buf.put_u8(byte);
    buf
}

/// The chancellor-policy-choice frame. `chancellor_view` is `Some((first,
/// second, can_veto))` only for the chancellor.
pub fn request_chancellor_policy_choice(chancellor_view: Option<(Team, Team, bool)>) -> BytesMut {
    let mut byte = Code::RequestChancellorPolicyChoice as u8;
    if let Some((first, second, can_veto)) = chancellor_view {
        byte |= team_bit(first) << 5;
        byte |= team_bit(second) << 6;
        byte |= (can_veto as u8) << 7;
    }
    let mut buf = BytesMut::with_capacity(1);
    buf.put_u8(byte);
    buf
}

pub fn request_investigation(eligible: PlayerBitmap) -> BytesMut {
    let mut buf = BytesMut::with_capacity(2);
    push_split_bitmap(&mut buf, Code::RequestInvestigation as u8, eligible);
    buf
}

pub fn request_kill(alive: PlayerBitmap) -> BytesMut {
    let mut buf = BytesMut::with_capacity(2);
    push_split_bitmap(&mut buf, Code::RequestKill as u8, alive);
    buf
}

/// Public loyalty reveal (no team byte). Only the president gets the
/// follow-up byte; see `send_loyalty_president`.
pub fn send_loyalty_public(target: usize) -> BytesMut {
    frame_with_nibble(Code::SendLoyalty, target as u8)
}

pub fn send_loyalty_president(target: usize, team: Team) -> BytesMut {
    let mut buf = BytesMut::with_capacity(2);
    buf.put_u8((Code::SendLoyalty as u8) | ((target as u8) << 4));
    buf.put_u8(team_bit(team));
    buf
}

pub fn top_cards_public() -> BytesMut {
    let mut buf = BytesMut::with_capacity(1);
    buf.put_u8(Code::TopCards as u8);
    buf
}

pub fn top_cards_president(cards: (Team, Team, Team)) -> BytesMut {
    let mut byte = (Code::TopCards as u8) | (1 << 4);
    byte |= team_bit(cards.0) << 5;
    byte |= team_bit(cards.1) << 6;
    byte |= team_bit(cards.2) << 7;
    let mut buf = BytesMut::with_capacity(1);
    buf.put_u8(byte);
    buf
}

pub fn vote_received(voter: usize) -> BytesMut {
    frame_with_nibble(Code::VoteReceived, voter as u8)
}

pub fn ballot(success: bool, ja_votes: PlayerBitmap) -> BytesMut {
    let mut buf = BytesMut::with_capacity(2);
    let first = (Code::Ballot as u8) | ((success as u8) << 4);
    push_split_bitmap(&mut buf, first, ja_votes);
    buf
}

pub fn disconnect(id: usize) -> BytesMut {
    frame_with_nibble(Code::Disconnect, id as u8)
}

pub fn ready_to_start(id: usize) -> BytesMut {
    frame_with_nibble(Code::ReadyToStart, id as u8)
}

pub fn not_ready(id: usize) -> BytesMut {
    frame_with_nibble(Code::NotReady, id as u8)
}

/// Team reveal for a liberal: bare 1-byte frame, no payload.
pub fn team_liberal() -> BytesMut {
    let mut buf = BytesMut::with_capacity(1);
    buf.put_u8(Code::Team as u8);
    buf
}

/// Team reveal for a non-Hitler fascist: sees Hitler's ordinal and the full
/// fascist bitmap.
pub fn team_fascist(hitler_ordinal: u8, fascist_bitmap: PlayerBitmap) -> BytesMut {
    let mut buf = BytesMut::with_capacity(2);
    let first = (Code::Team as u8) | (hitler_ordinal << 4) | (((fascist_bitmap.0 & 0b11) as u8) << 6);
    buf.put_u8(first);
    buf.put_u8(((fascist_bitmap.0 >> 2) & 0xFF) as u8);
    buf
}

/// Team reveal for Hitler in a 5-6 player game: names the lone teammate.
pub fn team_hitler_small(fascist_id: usize) -> BytesMut {
    frame_with_nibble(Code::Team, (fascist_id + 1) as u8)
}

/// Team reveal for Hitler in a 7-10 player game: sentinel, no known teammates.
pub fn team_hitler_large() -> BytesMut {
    frame_with_nibble(Code::Team, 15)
}

pub fn name(id: usize, name: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(1 + name.len());
    buf.put_u8((Code::Name as u8) | ((id as u8) << 4));
    buf.put_slice(name);
    buf
}

pub fn death(id: usize) -> BytesMut {
    frame_with_nibble(Code::Death, id as u8)
}

pub fn request_president_veto() -> BytesMut {
    let mut buf = BytesMut::with_capacity(1);
    buf.put_u8(extended(ExtendedCode::RequestPresidentVeto));
    buf
}

pub fn liberal_policy_win() -> BytesMut {
    single_extended(ExtendedCode::LiberalPolicyWin)
}

pub fn liberal_hitler_win() -> BytesMut {
    single_extended(ExtendedCode::LiberalHitlerWin)
}

pub fn fascist_policy_win() -> BytesMut {
    single_extended(ExtendedCode::FascistPolicyWin)
}

pub fn fascist_hitler_win() -> BytesMut {
    single_extended(ExtendedCode::FascistHitlerWin)
}

fn single_extended(sub: ExtendedCode) -> BytesMut {
    let mut buf = BytesMut::with_capacity(1);
    buf.put_u8(extended(sub));
    buf
}

pub fn request_special_nomination() -> BytesMut {
    single_extended(ExtendedCode::RequestSpecialNomination)
}

pub fn reassign(old_id: usize, new_id: usize) -> BytesMut {
    let mut buf = BytesMut::with_capacity(2);
    buf.put_u8(extended(ExtendedCode::Reassign));
    buf.put_u8((((old_id as u8) & 0xF) << 4) | ((new_id as u8) & 0xF));
    buf
}

pub fn regular_fascist_policy() -> BytesMut {
    single_extended(ExtendedCode::RegularFascistPolicy)
}

pub fn chaotic_fascist_policy() -> BytesMut {
    single_extended(ExtendedCode::ChaoticFascistPolicy)
}

pub fn regular_liberal_policy() -> BytesMut {
    single_extended(ExtendedCode::RegularLiberalPolicy)
}

pub fn chaotic_liberal_policy() -> BytesMut {
    single_extended(ExtendedCode::ChaoticLiberalPolicy)
}

/// `president` must fit in 6 bits (player indices are always < 10).
pub fn request_chancellor_nomination(president: usize, eligible: PlayerBitmap) -> BytesMut {
    let mut buf = BytesMut::with_capacity(3);
    buf.put_u8(extended(ExtendedCode::RequestChancellorNomination));
    let v = eligible.0;
    buf.put_u8(((president as u8) & 0x3F) | (((v & 0b11) as u8) << 6));
    buf.put_u8(((v >> 2) & 0xFF) as u8);
    buf
}

pub fn game_key(key: u32) -> BytesMut {
    let mut buf = BytesMut::with_capacity(5);
    buf.put_u8(extended(ExtendedCode::GameKey));
    buf.put_u32(key);
    buf
}

/// A vote, as carried by the inbound `mod 8 == 7` sub-table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Vote {
    Ja,
    Nein,
}

/// A decoded inbound frame, per the demux table in spec.md §4.2.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    SelectChancellor { candidate: usize },
    EliminatePolicy { choice: usize },
    Reveal { target: usize },
    Kill { target: usize },
    SelectSpecialPresident { target: usize },
    CastVote(Vote),
    AcceptVeto,
    RejectVeto,
    SetName { name: Vec<u8> },
    SetReady(bool),
}

/// Demuxes a raw inbound binary frame. Returns `None` for empty frames,
/// frames whose `mod 8` selector is unused, or names over 255 bytes — all
/// silently dropped per spec.md §4.2 / §7(a).
pub fn decode_inbound(frame: &[u8]) -> Option<Inbound> {
    let first = *frame.first()? as usize;
    let arg = first / 8;
    match first % 8 {
        0 => Some(Inbound::SelectChancellor { candidate: arg }),
        1 => Some(Inbound::EliminatePolicy { choice: arg }),
        2 => Some(Inbound::Reveal { target: arg }),
        3 => Some(Inbound::Kill { target: arg }),
        4 => Some(Inbound::SelectSpecialPresident { target: arg }),
        7 => match arg {
            0 => Some(Inbound::CastVote(Vote::Ja)),
            1 => Some(Inbound::CastVote(Vote::Nein)),
            2 => Some(Inbound::AcceptVeto),
            3 => Some(Inbound::RejectVeto),
            4 => {
                let name = frame.get(1..)?.to_vec();
                if name.len() > 255 {
                    None
                } else {
                    Some(Inbound::SetName { name })
                }
            }
            5 => Some(Inbound::SetReady(true)),
            6 => Some(Inbound::SetReady(false)),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decodes_targeted_actions() {
        assert_eq!(
            decode_inbound(&[0]),
            Some(Inbound::SelectChancellor { candidate: 0 })
        );
        assert_eq!(
            decode_inbound(&[(3 * 8) | 0]),
            Some(Inbound::SelectChancellor { candidate: 3 })
        );
        assert_eq!(decode_inbound(&[(2 * 8) | 3]), Some(Inbound::Kill { target: 2 }));
    }

    #[test]
    fn decodes_extended_sub_table() {
        assert_eq!(decode_inbound(&[7]), Some(Inbound::CastVote(Vote::Ja)));
        assert_eq!(decode_inbound(&[8 | 7]), Some(Inbound::CastVote(Vote::Nein)));
        assert_eq!(decode_inbound(&[16 | 7]), Some(Inbound::AcceptVeto));
        assert_eq!(decode_inbound(&[24 | 7]), Some(Inbound::RejectVeto));
        assert_eq!(decode_inbound(&[40 | 7]), Some(Inbound::SetReady(true)));
        assert_eq!(decode_inbound(&[48 | 7]), Some(Inbound::SetReady(false)));
    }

    #[test]
    fn decodes_name() {
        let mut frame = vec![32 | 7];
        frame.extend_from_slice(b"Alice");
        assert_eq!(
            decode_inbound(&frame),
            Some(Inbound::SetName { name: b"Alice".to_vec() })
        );
    }

    #[test]
    fn rejects_oversized_name() {
        let mut frame = vec![32 | 7];
        frame.extend(std::iter::repeat(b'x').take(256));
        assert_eq!(decode_inbound(&frame), None);
    }

    #[test]
    fn drops_unused_selectors_and_empty_frames() {
        assert_eq!(decode_inbound(&[]), None);
        assert_eq!(decode_inbound(&[5]), None);
        assert_eq!(decode_inbound(&[6]), None);
        assert_eq!(decode_inbound(&[64 | 7]), None); // arg 8, unused
    }

    #[test]
    fn game_key_round_trip_layout() {
        let buf = game_key(0x01020304);
        assert_eq!(buf.len(), 5);
        assert_eq!(buf[0], extended(ExtendedCode::GameKey));
        assert_eq!(&buf[1..], &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn bitmap_split_matches_manual_layout() {
        let mut bm = PlayerBitmap::empty();
        bm.set(0, true);
        bm.set(9, true);
        let mut buf = BytesMut::new();
        push_split_bitmap(&mut buf, 0, bm);
        // bit0 -> low bits of byte0's top nibble; bit9 -> top bit of byte1
        assert_eq!(buf[0] & 0b1100_0000, 0b0100_0000);
        assert_eq!(buf[1], 0b1000_0000);
    }
}
