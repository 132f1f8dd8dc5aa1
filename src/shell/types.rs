use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::catalog::Item;
use crate::sampler::SamplerState;

/// Sampler state as carried by the shuffle form:
/// `size=3&current=1&unseen=0,2`. Everything is optional text so a
/// mangled form starts a new visit instead of failing the request.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ShuffleForm {
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub current: Option<String>,
    #[serde(default)]
    pub unseen: Option<String>,
}

impl ShuffleForm {
    pub fn from_state(state: &SamplerState) -> Self {
        Self {
            size: Some(state.size.to_string()),
            current: state.current.map(|c| c.to_string()),
            unseen: Some(encode_indices(&state.unseen)),
        }
    }

    pub fn to_state(&self) -> Option<SamplerState> {
        let size = self.size.as_deref()?.trim().parse().ok()?;
        let current = match self.current.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(s.parse().ok()?),
        };
        let unseen = decode_indices(self.unseen.as_deref().unwrap_or(""))?;
        Some(SamplerState {
            size,
            current,
            unseen,
        })
    }
}

pub fn encode_indices(indices: &BTreeSet<usize>) -> String {
    indices
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn decode_indices(s: &str) -> Option<BTreeSet<usize>> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse().ok())
        .collect()
}

/// JSON view of a visit: the state to send back next time, and the item
/// it points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub state: SamplerState,
    pub movie: Option<Item>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageParams {
    pub url: String,
    #[serde(default)]
    pub w: Option<u32>,
    #[serde(default)]
    pub h: Option<u32>,
    #[serde(default)]
    pub q: Option<u32>,
}
