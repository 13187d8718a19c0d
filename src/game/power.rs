//! Presidential power dispatch table, keyed by (fascist policies enacted,
//! player count). See spec.md §4.1.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Power {
    None,
    Investigate,
    PeekThree,
    SpecialElection,
    Execute,
    FascistPolicyWin,
}

/// Looks up the power triggered by a fascist enactment. `fascist_policies`
/// is the count *after* the enactment; only called for non-chaotic
/// enactments.
pub fn power_for(fascist_policies: usize, num_players: usize) -> Power {
    use Power::*;
    let bracket = match num_players {
        5 | 6 => 0,
        7 | 8 => 1,
        9 | 10 => 2,
        _ => unreachable!("player count is constrained to 5..=10"),
    };
    match (fascist_policies, bracket) {
        (1, 0) => None,
        (1, _) => Investigate,
        (2, 0) => None,
        (2, _) => Investigate,
        (3, 0) => PeekThree,
        (3, _) => SpecialElection,
        (4, _) | (5, _) => Execute,
        (6, _) => FascistPolicyWin,
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn matches_spec_table() {
        assert_eq!(power_for(1, 5), Power::None);
        assert_eq!(power_for(1, 7), Power::Investigate);
        assert_eq!(power_for(1, 9), Power::Investigate);
        assert_eq!(power_for(2, 6), Power::None);
        assert_eq!(power_for(2, 8), Power::Investigate);
        assert_eq!(power_for(3, 5), Power::PeekThree);
        assert_eq!(power_for(3, 7), Power::SpecialElection);
        assert_eq!(power_for(3, 10), Power::SpecialElection);
        assert_eq!(power_for(4, 5), Power::Execute);
        assert_eq!(power_for(5, 9), Power::Execute);
        assert_eq!(power_for(6, 6), Power::FascistPolicyWin);
    }
}
