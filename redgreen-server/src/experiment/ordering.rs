//! Per-slot trial ordering
//!
//! Familiarization trials are the `F*` folders in alphabetical order and are
//! shared by everyone. Experimental trials are the `E*` folders, permuted per
//! profile slot by one RNG seeded with a fixed value: slot 0 takes the first
//! permutation, slot 1 the next, and so on, so a restart reproduces every
//! slot's order.
//!
//! Paired variants `E{2k-1}` / `E{2k}` must not be adjacent. Shuffles are
//! retried up to `max_attempts`; when none satisfies the rule the last one is
//! kept and the result says so.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Trial names resolved for one profile slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotOrdering {
    pub familiarization: Vec<String>,
    pub experimental: Vec<String>,
    /// False when the shuffle budget ran out before the adjacency rule held
    pub constraint_met: bool,
}

/// Split folder names into sorted familiarization and experimental lists
pub fn partition_trial_names<I>(names: I) -> (Vec<String>, Vec<String>)
where
    I: IntoIterator<Item = String>,
{
    let mut familiarization = Vec::new();
    let mut experimental = Vec::new();
    for name in names {
        if name.starts_with('F') {
            familiarization.push(name);
        } else if name.starts_with('E') {
            experimental.push(name);
        }
    }
    familiarization.sort();
    experimental.sort();
    (familiarization, experimental)
}

/// Numeric part of an experimental trial name (`E12` -> 12)
fn trial_number(name: &str) -> Option<i64> {
    name.strip_prefix('E')?.parse().ok()
}

/// True when no paired variants sit next to each other
pub fn satisfies_adjacency(order: &[String]) -> bool {
    order.windows(2).all(|pair| {
        match (trial_number(&pair[0]), trial_number(&pair[1])) {
            (Some(a), Some(b)) if a % 2 != 0 => b != a + 1,
            (Some(a), Some(b)) => b != a - 1,
            _ => true,
        }
    })
}

/// Shuffle in place until the adjacency rule holds or attempts run out
fn constrained_shuffle(order: &mut [String], rng: &mut StdRng, max_attempts: u32) -> bool {
    for _ in 0..max_attempts {
        order.shuffle(rng);
        if satisfies_adjacency(order) {
            return true;
        }
    }
    false
}

/// Resolve the trial ordering for `slot`
pub fn order_for_slot(
    familiarization: &[String],
    experimental: &[String],
    slot: u32,
    seed: u64,
    max_attempts: u32,
) -> SlotOrdering {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut resolved = None;

    // Earlier slots consume the shared RNG stream first
    for _ in 0..=slot {
        let mut order = experimental.to_vec();
        let met = constrained_shuffle(&mut order, &mut rng, max_attempts);
        resolved = Some((order, met));
    }

    let (experimental, constraint_met) = resolved.unwrap_or_default();
    SlotOrdering {
        familiarization: familiarization.to_vec(),
        experimental,
        constraint_met,
    }
}
