//! Value objects shared across the calculation and PSP cores.

pub mod ids;
pub mod money;

pub use ids::*;
pub use money::{cents_string, round_internal, round_to_cents, INTERNAL_SCALE, OUTPUT_SCALE};

