#![cfg(test)]

// Small shared fixtures for unit tests.
use crate::Database;
use crate::synth::{self, SynthSpec};

pub const SMALL: SynthSpec = SynthSpec { rankings: 40, high_rank: 4, visits: 300 };

/// A database holding a small generated rankings/userVisits pair.
pub fn small_db(seed: u64) -> Database {
    let db = Database::new();
    let data = synth::generate(seed, &SMALL).expect("generate fixture");
    synth::load_into(&db, &data).expect("load fixture");
    db
}

/// A database holding the full tiny data set.
pub fn tiny_db(seed: u64) -> Database {
    let db = Database::new();
    let data = synth::generate(seed, &SynthSpec::tiny()).expect("generate fixture");
    synth::load_into(&db, &data).expect("load fixture");
    db
}
