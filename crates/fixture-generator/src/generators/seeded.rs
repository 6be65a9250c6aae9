//! Index-seeded random generators.
//!
//! Each row gets its own RNG derived from the table seed and the row index,
//! so any row can be regenerated in isolation and the output never depends
//! on generation order.

use fixture_core::FixtureValue;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// RNG for one row of a table.
pub fn rng_for_index(seed: u64, index: u64) -> StdRng {
    StdRng::seed_from_u64(seed.wrapping_add(index.wrapping_mul(0x9E3779B97F4A7C15)))
}

/// Pick one value from `values`.
pub fn generate_one_of(values: &[FixtureValue], seed: u64, index: u64) -> FixtureValue {
    if values.is_empty() {
        return FixtureValue::Null;
    }
    let mut rng = rng_for_index(seed, index);
    values[rng.gen_range(0..values.len())].clone()
}

/// Generate an integer in `min..=max`.
pub fn generate_int_range(min: i64, max: i64, seed: u64, index: u64) -> FixtureValue {
    if min >= max {
        return FixtureValue::Int64(min);
    }
    let mut rng = rng_for_index(seed, index);
    FixtureValue::Int64(rng.gen_range(min..=max))
}
