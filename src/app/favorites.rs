// src/app/favorites.rs — favorite character ids, mirrored to the store
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::store::{load_json, save_json, Hydrated, KeyValueStore};
use crate::config::FAVORITES_KEY;

/// Ordered set of character ids. Insertion order is kept for display.
pub struct Favorites {
    ids: Vec<u32>,
    store: Arc<dyn KeyValueStore>,
    hydrated: bool,
    revision: u64,
}

/// Accept only an array of non-negative integers that fit in `u32`.
fn validate_ids(value: serde_json::Value) -> Result<Vec<u32>, String> {
    let serde_json::Value::Array(items) = value else {
        return Err("expected a JSON array".into());
    };
    let mut out: Vec<u32> = Vec::with_capacity(items.len());
    for item in items {
        let id = item
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| format!("not a character id: {item}"))?;
        if !out.contains(&id) {
            out.push(id);
        }
    }
    Ok(out)
}

impl Favorites {
    /// Not hydrated yet; nothing is written until [`Favorites::hydrate`] runs.
    pub fn new(store: Arc<dyn KeyValueStore>, initial: Vec<u32>) -> Self {
        let mut ids = Vec::with_capacity(initial.len());
        for id in initial {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Self {
            ids,
            store,
            hydrated: false,
            revision: 0,
        }
    }

    pub fn open(store: Arc<dyn KeyValueStore>) -> Self {
        let mut fav = Self::new(store, Vec::new());
        fav.hydrate();
        fav
    }

    /// One-shot read from the store. Any failure keeps the current ids.
    /// Returns false if hydration already happened.
    pub fn hydrate(&mut self) -> bool {
        if self.hydrated {
            return false;
        }
        match load_json(self.store.as_ref(), FAVORITES_KEY, validate_ids) {
            Hydrated::Loaded(ids) => {
                info!("Loaded {} favorite(s)", ids.len());
                self.ids = ids;
                self.revision += 1;
            }
            Hydrated::Missing => debug!("No stored favorites"),
            Hydrated::Invalid(reason) => {
                warn!("Ignoring stored favorites ({reason}); starting from defaults")
            }
            Hydrated::Unavailable(reason) => {
                warn!("Favorites storage unavailable ({reason}); starting from defaults")
            }
        }
        self.hydrated = true;
        true
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    pub fn add(&mut self, id: u32) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        self.ids.push(id);
        self.changed();
        true
    }

    pub fn remove(&mut self, id: u32) -> bool {
        let before = self.ids.len();
        self.ids.retain(|&x| x != id);
        if self.ids.len() == before {
            return false;
        }
        self.changed();
        true
    }

    /// Returns whether `id` is a favorite afterwards.
    pub fn toggle(&mut self, id: u32) -> bool {
        if self.contains(id) {
            self.remove(id);
            false
        } else {
            self.add(id);
            true
        }
    }

    pub fn contains(&self, id: u32) -> bool {
        self.ids.contains(&id)
    }

    pub fn clear(&mut self) {
        if self.ids.is_empty() {
            return;
        }
        self.ids.clear();
        self.changed();
    }

    pub fn count(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    /// Bumped on every change; views compare it to know when to refresh.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn changed(&mut self) {
        self.revision += 1;
        self.persist();
    }

    fn persist(&self) {
        if !self.hydrated {
            debug!("Favorites not hydrated yet; skipping write");
            return;
        }
        if let Err(e) = save_json(self.store.as_ref(), FAVORITES_KEY, &self.ids) {
            warn!("Failed to save favorites: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::store::tests::BrokenStore;
    use crate::app::store::MemoryStore;

    fn store() -> Arc<dyn KeyValueStore> {
        Arc::new(MemoryStore::default())
    }

    #[test]
    fn add_is_idempotent() {
        let mut fav = Favorites::open(store());
        assert!(fav.add(42));
        assert!(fav.contains(42));
        assert_eq!(fav.count(), 1);
        assert!(!fav.add(42));
        assert_eq!(fav.count(), 1);
    }

    #[test]
    fn remove_missing_is_a_noop() {
        let mut fav = Favorites::open(store());
        let rev = fav.revision();
        assert!(!fav.remove(5));
        assert_eq!(fav.count(), 0);
        assert_eq!(fav.revision(), rev);

        fav.add(1);
        assert!(!fav.remove(5));
        assert_eq!(fav.count(), 1);
    }

    #[test]
    fn clear_empties_any_set() {
        let mut fav = Favorites::open(store());
        for id in 1..=10 {
            fav.add(id);
        }
        fav.clear();
        assert_eq!(fav.count(), 0);
        fav.clear();
        assert_eq!(fav.count(), 0);
    }

    #[test]
    fn round_trips_through_a_fresh_instance() {
        let shared = store();
        {
            let mut fav = Favorites::open(shared.clone());
            for id in [3, 1, 4, 1, 5] {
                fav.add(id);
            }
            assert_eq!(fav.ids(), &[3, 1, 4, 5]);
        }
        let fav = Favorites::open(shared.clone());
        for id in [1, 3, 4, 5] {
            assert!(fav.contains(id));
        }
        assert!(!fav.contains(2));
        assert_eq!(fav.count(), 4);
        assert_eq!(shared.get(FAVORITES_KEY).unwrap().as_deref(), Some("[3,1,4,5]"));
    }

    #[test]
    fn no_writes_before_hydration() {
        let shared = store();
        shared.set(FAVORITES_KEY, "[7,8]").unwrap();

        let mut fav = Favorites::new(shared.clone(), Vec::new());
        fav.add(99);
        assert_eq!(shared.get(FAVORITES_KEY).unwrap().as_deref(), Some("[7,8]"));

        assert!(fav.hydrate());
        assert!(!fav.hydrate());
        assert_eq!(fav.ids(), &[7, 8]);
    }

    #[test]
    fn bad_stored_shapes_fall_back_to_initial() {
        for raw in ["{not json", "{\"ids\":[1]}", "[1,\"two\"]", "[-1]"] {
            let shared = store();
            shared.set(FAVORITES_KEY, raw).unwrap();
            let mut fav = Favorites::new(shared, vec![10, 10, 11]);
            fav.hydrate();
            assert_eq!(fav.ids(), &[10, 11], "stored value {raw}");
        }
    }

    #[test]
    fn stored_duplicates_collapse() {
        let shared = store();
        shared.set(FAVORITES_KEY, "[2,2,9]").unwrap();
        let fav = Favorites::open(shared);
        assert_eq!(fav.ids(), &[2, 9]);
    }

    #[test]
    fn broken_storage_never_panics() {
        let mut fav = Favorites::new(Arc::new(BrokenStore), vec![1]);
        fav.hydrate();
        assert!(fav.is_hydrated());
        fav.add(2);
        fav.remove(1);
        assert_eq!(fav.ids(), &[2]);
    }
}
