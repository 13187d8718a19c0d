/// One of the two political parties. Hitler is a [`Team::Fascist`] with no
/// further distinction at this layer — their special status lives in
/// `Game::hitler_id`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Team {
    Liberal,
    Fascist,
}

/// A single ballot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Vote {
    Ja,
    Nein,
}

/// A player slot. Flags are explicit fields — no pointer-tagging.
#[derive(Clone, Debug)]
pub struct Player {
    pub name: Vec<u8>,
    pub team: Team,
    pub alive: bool,
    pub investigated: bool,
    pub voted: bool,
    pub last_vote: Option<Vote>,
}

impl Player {
    pub fn new(name: Vec<u8>, team: Team) -> Self {
        Self {
            name,
            team,
            alive: true,
            investigated: false,
            voted: false,
            last_vote: None,
        }
    }

    /// Resets per-election vote state. Called at the start of every election.
    pub fn reset_vote(&mut self) {
        self.voted = false;
        self.last_vote = None;
    }
}

/// Assigns teams for a new game: one Hitler, `fascist_count - 1` ordinary
/// fascists chosen uniformly by a reservoir sweep over the remaining seats,
/// everyone else liberal.
///
/// Grounded in `game.h`'s `init()`: Hitler is picked first and uniformly: the
/// remaining fascists are then chosen via the "remaining needed / remaining
/// positions" reservoir rule over the other `N-1` seats.
pub fn assign_roles(num_players: usize, rng: &mut impl rand::Rng) -> (usize, Vec<Team>) {
    let fascist_count = fascist_count(num_players);
    let hitler_id = rng.gen_range(0..num_players);

    let mut teams = vec![Team::Liberal; num_players];
    teams[hitler_id] = Team::Fascist;

    let mut needed = fascist_count - 1;
    let mut remaining = num_players - 1;
    for idx in (0..num_players).filter(|&i| i != hitler_id) {
        if needed == 0 {
            break;
        }
        if rng.gen_ratio(needed as u32, remaining as u32) {
            teams[idx] = Team::Fascist;
            needed -= 1;
        }
        remaining -= 1;
    }

    (hitler_id, teams)
}

/// Number of fascist players (including Hitler) for a given table size.
pub fn fascist_count(num_players: usize) -> usize {
    match num_players {
        5 | 6 => 2,
        7 | 8 => 3,
        9 | 10 => 4,
        _ => unreachable!("player count is constrained to 5..=10"),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn fascist_counts_match_table() {
        assert_eq!(fascist_count(5), 2);
        assert_eq!(fascist_count(6), 2);
        assert_eq!(fascist_count(7), 3);
        assert_eq!(fascist_count(8), 3);
        assert_eq!(fascist_count(9), 4);
        assert_eq!(fascist_count(10), 4);
    }

    #[test]
    fn assigns_exactly_one_hitler_and_correct_fascist_total() {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(100);
        for n in 5..=10 {
            let (hitler_id, teams) = assign_roles(n, &mut rng);
            assert_eq!(teams[hitler_id], Team::Fascist);
            let fascists = teams.iter().filter(|t| **t == Team::Fascist).count();
            assert_eq!(fascists, fascist_count(n));
        }
    }
}
