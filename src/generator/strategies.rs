//! Weighted candidate-term strategies.
//!
//! Each strategy is a pure draw from a static vocabulary. Weights favor
//! 4-6 character single-word tokens and the high-yield surname subsets;
//! multi-word composites are kept around for coverage but heavily
//! down-weighted, since most of them die in the deduplicator anyway.

use crate::generator::vocab::{
    BUSINESS_SUFFIXES, FIRST_NAMES, GEOGRAPHIC_TERMS, HIGH_YIELD_SURNAMES, NEIGHBORHOODS,
    PROPERTY_TYPES, STREET_NAMES, STREET_SUFFIXES, SURNAMES,
};
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand::seq::IndexedRandom;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Surname,
    HighYieldSurname,
    FirstName,
    StreetName,
    Geographic,
    Neighborhood,
    PropertyType,
    StreetCombo,
    BusinessComposite,
    FullNameCombo,
}

/// All strategies with their sampling weights. Tunable constants.
const WEIGHTED: &[(Strategy, u32)] = &[
    (Strategy::Surname, 30),
    (Strategy::HighYieldSurname, 25),
    (Strategy::FirstName, 15),
    (Strategy::StreetName, 12),
    (Strategy::Geographic, 8),
    (Strategy::Neighborhood, 5),
    (Strategy::PropertyType, 3),
    (Strategy::StreetCombo, 1),
    (Strategy::BusinessComposite, 1),
    (Strategy::FullNameCombo, 1),
];

static STRATEGY_INDEX: LazyLock<WeightedIndex<u32>> = LazyLock::new(|| {
    WeightedIndex::new(WEIGHTED.iter().map(|(_, weight)| *weight)).expect("static weights")
});

/// Draw one candidate term via weighted strategy selection.
pub fn draw<R: Rng>(rng: &mut R) -> String {
    let (strategy, _) = WEIGHTED[STRATEGY_INDEX.sample(rng)];
    generate(strategy, rng)
}

/// Produce a candidate for a specific strategy.
pub fn generate<R: Rng>(strategy: Strategy, rng: &mut R) -> String {
    let pick = |pool: &[&str], rng: &mut R| -> String {
        pool.choose(rng).copied().unwrap_or_default().to_string()
    };

    match strategy {
        Strategy::Surname => pick(SURNAMES, rng),
        Strategy::HighYieldSurname => pick(HIGH_YIELD_SURNAMES, rng),
        Strategy::FirstName => pick(FIRST_NAMES, rng),
        Strategy::StreetName => pick(STREET_NAMES, rng),
        Strategy::Geographic => pick(GEOGRAPHIC_TERMS, rng),
        Strategy::Neighborhood => pick(NEIGHBORHOODS, rng),
        Strategy::PropertyType => pick(PROPERTY_TYPES, rng),
        Strategy::StreetCombo => {
            format!("{} {}", pick(STREET_NAMES, rng), pick(STREET_SUFFIXES, rng))
        }
        Strategy::BusinessComposite => {
            format!("{} {}", pick(SURNAMES, rng), pick(BUSINESS_SUFFIXES, rng))
        }
        Strategy::FullNameCombo => {
            format!("{} {}", pick(FIRST_NAMES, rng), pick(SURNAMES, rng))
        }
    }
}
