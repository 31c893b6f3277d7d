//! Weighted selection among rule candidates.

use std::fmt;

use rand::SeedableRng;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;

/// Picks one candidate index given index-aligned, non-negative weights.
///
/// The rewriter only asks when a rule offers more than one candidate, and
/// never asks again for a decision it is merely confirming during replay.
pub trait ChoiceSource: fmt::Debug {
    fn pick(&mut self, weights: &[f64]) -> usize;
}

/// Draws proportionally to the weights from a seeded `StdRng`. Two runs with
/// the same seed, word and rules make the same choices.
#[derive(Debug, Clone)]
pub struct SeededChoice {
    rng: StdRng,
}

impl SeededChoice {
    pub fn new(seed: u64) -> Self {
        SeededChoice { rng: StdRng::seed_from_u64(seed) }
    }
}

impl ChoiceSource for SeededChoice {
    fn pick(&mut self, weights: &[f64]) -> usize {
        match WeightedIndex::new(weights) {
            Ok(dist) => dist.sample(&mut self.rng),
            // weights are validated at registration
            Err(_) => 0,
        }
    }
}

/// Always takes the first candidate with a positive weight.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstChoice;

impl ChoiceSource for FirstChoice {
    fn pick(&mut self, weights: &[f64]) -> usize {
        weights.iter().position(|w| *w > 0.0).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_choice_is_reproducible() {
        let weights = [1.0, 2.0, 3.0, 0.5];
        let mut a = SeededChoice::new(7);
        let mut b = SeededChoice::new(7);
        let xs: Vec<usize> = (0..32).map(|_| a.pick(&weights)).collect();
        let ys: Vec<usize> = (0..32).map(|_| b.pick(&weights)).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().all(|&i| i < weights.len()));
    }

    #[test]
    fn zero_weights_are_never_drawn() {
        let mut c = SeededChoice::new(1);
        for _ in 0..64 {
            assert_eq!(c.pick(&[0.0, 1.0, 0.0]), 1);
        }
        assert_eq!(FirstChoice.pick(&[0.0, 0.0, 2.0]), 2);
    }
}
