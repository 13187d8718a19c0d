use rand::prelude::SliceRandom;
use std::iter::repeat;

use super::player::Team;

const TOTAL_LIBERAL: usize = 6;
const TOTAL_FASCIST: usize = 11;

/// The policy deck. Tracks only enacted counts plus cards currently drawn
/// into a hand; everything else is reconstructible supply.
#[derive(Clone, Debug)]
pub struct Deck {
    drawable: Vec<Team>,
}

impl Deck {
    pub fn new(rng: &mut impl rand::Rng) -> Self {
        let mut deck = Self { drawable: Vec::new() };
        deck.shuffle(0, 0, &[], rng);
        deck
    }

    /// Rebuilds the draw pile from the remaining supply: total minus enacted
    /// minus whatever is currently held in a hand.
    pub fn shuffle(
        &mut self,
        liberal_enacted: usize,
        fascist_enacted: usize,
        in_hand: &[Team],
        rng: &mut impl rand::Rng,
    ) {
        let liberal_in_hand = in_hand.iter().filter(|t| **t == Team::Liberal).count();
        let fascist_in_hand = in_hand.len() - liberal_in_hand;

        let liberal = TOTAL_LIBERAL - liberal_enacted - liberal_in_hand;
        let fascist = TOTAL_FASCIST - fascist_enacted - fascist_in_hand;

        self.drawable.clear();
        self.drawable.extend(repeat(Team::Liberal).take(liberal));
        self.drawable.extend(repeat(Team::Fascist).take(fascist));
        self.drawable.shuffle(rng);
    }

    /// Reshuffles only if fewer than 3 cards remain drawable.
    pub fn reshuffle_if_needed(
        &mut self,
        liberal_enacted: usize,
        fascist_enacted: usize,
        in_hand: &[Team],
        rng: &mut impl rand::Rng,
    ) {
        if self.drawable.len() < 3 {
            self.shuffle(liberal_enacted, fascist_enacted, in_hand, rng);
        }
    }

    pub fn draw_one(&mut self) -> Team {
        self.drawable.pop().expect("reshuffled before every draw")
    }

    pub fn draw_three(&mut self) -> (Team, Team, Team) {
        let a = self.draw_one();
        let b = self.draw_one();
        let c = self.draw_one();
        (a, b, c)
    }

    pub fn peek_three(&self) -> (Team, Team, Team) {
        let n = self.drawable.len();
        (self.drawable[n - 1], self.drawable[n - 2], self.drawable[n - 3])
    }

    pub fn count(&self) -> usize {
        self.drawable.len()
    }

    /// Test-only: stacks `cards` to be drawn next, in the given order, ahead
    /// of whatever is already in the draw pile.
    #[cfg(test)]
    pub(crate) fn push_front_for_test(&mut self, cards: &[Team]) {
        for &card in cards.iter().rev() {
            self.drawable.push(card);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn fresh_deck_has_seventeen_cards() {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(1);
        let deck = Deck::new(&mut rng);
        assert_eq!(deck.count(), 17);
    }

    #[test]
    fn shuffle_accounts_for_enacted_and_in_hand_cards() {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(1);
        let mut deck = Deck::new(&mut rng);
        let in_hand = [Team::Liberal, Team::Fascist, Team::Fascist];
        deck.shuffle(2, 3, &in_hand, &mut rng);
        // 6-2=4 liberal, 11-3=8 fascist remain as supply, minus 3 in hand.
        assert_eq!(deck.count(), 17 - 2 - 3 - 3);
    }

    #[test]
    fn reshuffles_only_below_three() {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(1);
        let mut deck = Deck::new(&mut rng);
        deck.draw_three();
        deck.draw_three();
        deck.draw_three();
        deck.draw_three();
        deck.draw_three();
        // 17 - 15 = 2 left, below 3.
        assert_eq!(deck.count(), 2);
        deck.reshuffle_if_needed(0, 0, &[], &mut rng);
        assert_eq!(deck.count(), 17);
    }
}
