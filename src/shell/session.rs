use std::sync::Arc;

use rand::Rng;

use crate::catalog::{Catalog, Item};
use crate::sampler::{InvalidState, SamplerState};

/// One page visit: the catalog it loaded and where the shuffle stands.
#[derive(Debug, Clone)]
pub struct Session {
    pub catalog: Arc<Catalog>,
    pub state: SamplerState,
}

impl Session {
    pub fn start<R: Rng>(catalog: Arc<Catalog>, rng: &mut R) -> Self {
        let state = SamplerState::initialize(catalog.len(), rng);
        Self { catalog, state }
    }

    /// Continue a visit from state the client sent back.
    pub fn resume(catalog: Arc<Catalog>, state: SamplerState) -> Result<Self, InvalidState> {
        state.validate(catalog.len())?;
        Ok(Self { catalog, state })
    }

    /// Show the next item. With nothing to show the sampler is not
    /// consulted at all.
    pub fn shuffle<R: Rng>(&self, rng: &mut R) -> Self {
        if self.catalog.is_empty() {
            return self.clone();
        }
        Self {
            catalog: Arc::clone(&self.catalog),
            state: self.state.pick(rng),
        }
    }

    pub fn current_item(&self) -> Option<&Item> {
        self.state.current.and_then(|i| self.catalog.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::item::test_item;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_empty_catalog_shows_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        let session = Session::start(Arc::new(Catalog::empty()), &mut rng);
        assert!(session.current_item().is_none());
        let next = session.shuffle(&mut rng);
        assert_eq!(next.state, session.state);
        assert!(next.current_item().is_none());
    }

    #[test]
    fn test_resume_and_shuffle() {
        let catalog = Arc::new(Catalog::new(vec![
            test_item(1, "A"),
            test_item(2, "B"),
            test_item(3, "C"),
        ]));
        let carried = SamplerState {
            size: 3,
            current: Some(1),
            unseen: [0, 2].into_iter().collect(),
        };
        let session = Session::resume(Arc::clone(&catalog), carried).unwrap();
        assert_eq!(session.current_item().map(|i| i.title.as_str()), Some("B"));

        let mut rng = StdRng::seed_from_u64(5);
        let next = session.shuffle(&mut rng);
        let title = next.current_item().map(|i| i.title.clone()).unwrap();
        assert!(title == "A" || title == "C");
    }

    #[test]
    fn test_resume_rejects_stale_state() {
        let catalog = Arc::new(Catalog::new(vec![test_item(1, "A")]));
        let stale = SamplerState {
            size: 4,
            current: Some(3),
            unseen: Default::default(),
        };
        assert!(Session::resume(catalog, stale).is_err());
    }
}
