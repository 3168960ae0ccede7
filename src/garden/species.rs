//! Cosmetic species tags drawn for plants.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::garden::Polarity;

pub const GOOD_SPECIES: [&str; 6] = ["Sunflower", "Lavender", "Basil", "Aloe", "Fern", "Daisy"];

pub const BAD_SPECIES: [&str; 6] = [
    "Nightshade",
    "Hemlock",
    "Foxglove",
    "Oleander",
    "Thistle",
    "Ragweed",
];

pub fn species_for(polarity: Polarity) -> &'static [&'static str] {
    match polarity {
        Polarity::Good => &GOOD_SPECIES,
        Polarity::Bad => &BAD_SPECIES,
    }
}

/// Draw a species uniformly at random for `polarity`.
pub fn draw<R: Rng + ?Sized>(polarity: Polarity, rng: &mut R) -> &'static str {
    species_for(polarity)
        .choose(rng)
        .copied()
        .unwrap_or(GOOD_SPECIES[0])
}
