//! Weighted save-state selection for episode starts.

use std::path::{Path, PathBuf};

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::RuntimeError;

#[derive(Debug, Clone, PartialEq)]
pub struct SaveState {
    pub path: PathBuf,
    /// Relative; weights need not sum to one.
    pub weight: f64,
}

#[derive(Debug, Clone)]
pub struct SaveStates {
    entries: Vec<SaveState>,
    distribution: Option<WeightedIndex<f64>>,
    rng: StdRng,
}

impl SaveStates {
    pub fn new(entries: Vec<SaveState>, seed: Option<u64>) -> Result<Self, RuntimeError> {
        if let Some(bad) = entries
            .iter()
            .find(|entry| !entry.weight.is_finite() || entry.weight <= 0.0)
        {
            return Err(RuntimeError::InvalidConfig(
                format!(
                    "save state '{}' has invalid weight {}",
                    bad.path.display(),
                    bad.weight
                )
                .into(),
            ));
        }
        let distribution = if entries.is_empty() {
            None
        } else {
            Some(
                WeightedIndex::new(entries.iter().map(|entry| entry.weight)).map_err(|err| {
                    RuntimeError::InvalidConfig(format!("save state weights: {err}").into())
                })?,
            )
        };
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            entries,
            distribution,
            rng,
        })
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            distribution: None,
            rng: StdRng::seed_from_u64(0),
        }
    }

    /// Draws one path with probability proportional to its weight.
    pub fn pick(&mut self) -> Option<&Path> {
        let distribution = self.distribution.as_ref()?;
        let index = distribution.sample(&mut self.rng);
        self.entries.get(index).map(|entry| entry.path.as_path())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
