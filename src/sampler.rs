//! Sampling without replacement over catalog indices.
//!
//! A `SamplerState` remembers which item is on screen and which indices
//! have not been shown yet in the current cycle. `pick` never mutates; it
//! returns the next state, so callers can carry the state anywhere (a form
//! field, a JSON body) and feed it back in.

use std::collections::BTreeSet;

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerState {
    pub size: usize,
    pub current: Option<usize>,
    #[serde(default)]
    pub unseen: BTreeSet<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidState {
    #[error("state is for {0} items, catalog has {1}")]
    SizeMismatch(usize, usize),
    #[error("index {0} out of range for {1} items")]
    OutOfRange(usize, usize),
    #[error("current index {0} is also in the unseen pool")]
    CurrentUnseen(usize),
    #[error("no current index for a non-empty catalog")]
    MissingCurrent,
    #[error("current index set for an empty catalog")]
    UnexpectedCurrent,
}

impl SamplerState {
    /// Start a session over `size` items: a random first pick, everything
    /// else unseen.
    pub fn initialize<R: Rng>(size: usize, rng: &mut R) -> Self {
        if size == 0 {
            return Self {
                size,
                current: None,
                unseen: BTreeSet::new(),
            };
        }
        let current = rng.random_range(0..size);
        let unseen = (0..size).filter(|&i| i != current).collect();
        Self {
            size,
            current: Some(current),
            unseen,
        }
    }

    /// Choose the next item. When the unseen pool is exhausted a new cycle
    /// starts with every index except the current one.
    ///
    /// An empty state has nothing to pick and is returned unchanged.
    pub fn pick<R: Rng>(&self, rng: &mut R) -> Self {
        let current = match self.current {
            Some(current) if self.size > 0 => current,
            _ => return self.clone(),
        };

        let mut pool: Vec<usize> = if self.unseen.is_empty() {
            (0..self.size).filter(|&i| i != current).collect()
        } else {
            self.unseen.iter().copied().collect()
        };
        // Single item catalog: repeating it is the only option.
        if pool.is_empty() {
            pool.push(current);
        }

        let chosen = pool[rng.random_range(0..pool.len())];
        let unseen = pool.into_iter().filter(|&i| i != chosen).collect();

        Self {
            size: self.size,
            current: Some(chosen),
            unseen,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Check a state received from a client against the catalog it will be
    /// applied to.
    pub fn validate(&self, catalog_size: usize) -> Result<(), InvalidState> {
        if self.size != catalog_size {
            return Err(InvalidState::SizeMismatch(self.size, catalog_size));
        }
        match self.current {
            None if self.size > 0 => return Err(InvalidState::MissingCurrent),
            Some(_) if self.size == 0 => return Err(InvalidState::UnexpectedCurrent),
            Some(current) if current >= self.size => {
                return Err(InvalidState::OutOfRange(current, self.size))
            }
            Some(current) if self.unseen.contains(&current) => {
                return Err(InvalidState::CurrentUnseen(current))
            }
            _ => {}
        }
        if let Some(&max) = self.unseen.iter().next_back() {
            if max >= self.size {
                return Err(InvalidState::OutOfRange(max, self.size));
            }
        }
        Ok(())
    }
}
