//! Discrete action space over control candidate lists.

use std::ops::Range;

use smol_str::SmolStr;

use crate::controls::{ControlAssignment, ControlValue};

/// Ordered assignments; an `ActionId` is an index into it.
pub type ActionMap = Vec<ControlAssignment>;

pub type ActionId = usize;

/// Cartesian product of the candidate lists in odometer order: the first control
/// varies slowest, the last one fastest.
#[must_use]
pub fn build_action_map<N: AsRef<str>>(candidates: &[(N, Vec<ControlValue>)]) -> ActionMap {
    let total = candidates
        .iter()
        .map(|(_, values)| values.len())
        .product::<usize>();
    let mut map = Vec::with_capacity(total);
    let mut digits = vec![0_usize; candidates.len()];
    for _ in 0..total {
        map.push(
            candidates
                .iter()
                .zip(&digits)
                .map(|((name, values), &digit)| (SmolStr::new(name.as_ref()), values[digit]))
                .collect::<ControlAssignment>(),
        );
        for (digit, (_, values)) in digits.iter_mut().zip(candidates).rev() {
            *digit += 1;
            if *digit < values.len() {
                break;
            }
            *digit = 0;
        }
    }
    map
}

#[must_use]
pub fn action_space(map: &ActionMap) -> Range<ActionId> {
    0..map.len()
}

#[must_use]
pub fn action_space_size(map: &ActionMap) -> usize {
    map.len()
}
