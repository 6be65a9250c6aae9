//! Default value generators.
//!
//! Each column's [`DefaultGenerator`] is evaluated here as a pure function
//! of the row index. Values come out uncoerced; the row pipeline converts
//! them to the column type after mutations have run.

pub mod pattern;
pub mod seeded;

use chrono::{Duration, NaiveDateTime};
use fixture_core::{DefaultGenerator, FixtureValue};

/// Generate the default value of one column for row `index`.
pub fn generate_default(config: &DefaultGenerator, seed: u64, index: u64) -> FixtureValue {
    match config {
        DefaultGenerator::Sequential { start, step } => {
            FixtureValue::Int64(start.wrapping_add((index as i64).wrapping_mul(*step)))
        }

        DefaultGenerator::Alternating { even, odd } => {
            if index % 2 == 0 {
                even.clone()
            } else {
                odd.clone()
            }
        }

        DefaultGenerator::Static { value } => value.clone(),

        DefaultGenerator::Pattern { pattern } => {
            FixtureValue::String(pattern::expand_pattern(pattern, index, None))
        }

        DefaultGenerator::Timestamp {
            start,
            step_seconds,
        } => FixtureValue::DateTime(offset_timestamp(*start, *step_seconds, index).unwrap_or(*start)),

        DefaultGenerator::OneOf { values } => seeded::generate_one_of(values, seed, index),

        DefaultGenerator::IntRange { min, max } => {
            seeded::generate_int_range(*min, *max, seed, index)
        }

        DefaultGenerator::Null => FixtureValue::Null,
    }
}

/// `start + index * step_seconds`, or `None` on overflow.
pub fn offset_timestamp(start: NaiveDateTime, step_seconds: i64, index: u64) -> Option<NaiveDateTime> {
    let index = i64::try_from(index).ok()?;
    let seconds = step_seconds.checked_mul(index)?;
    start.checked_add_signed(Duration::try_seconds(seconds)?)
}
