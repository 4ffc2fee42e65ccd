// src/app/loader.rs — paged fetch-and-accumulate for one resource kind
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::api::{ApiError, CatalogClient, PageEnvelope, QueryFilters, Resource, ResourceKind};

/// Called from the worker thread after each completion (e.g. `ctx.request_repaint`).
pub type RepaintHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchMode {
    /// Page 1; replaces the item list.
    NewSearch,
    /// Next page; appends.
    LoadMore,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadPhase {
    Idle,
    Loading,
    Ready,
    LoadingMore,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoaderError {
    pub message: String,
    /// The source answered 404: the query matched nothing.
    pub not_found: bool,
    pub mode: FetchMode,
}

impl LoaderError {
    fn from_api(kind: ResourceKind, err: &ApiError, mode: FetchMode) -> Self {
        let not_found = err.is_not_found();
        let message = if not_found {
            kind.not_found_message().to_string()
        } else {
            err.to_string()
        };
        Self {
            message,
            not_found,
            mode,
        }
    }

    /// Items loaded before the failure are still valid.
    pub fn during_load_more(&self) -> bool {
        self.mode == FetchMode::LoadMore
    }
}

#[derive(Clone, Debug)]
pub struct LoaderState<T: Resource> {
    /// Page-arrival order. Not deduplicated by id.
    pub items: Vec<T>,
    pub loading: bool,
    pub loading_more: bool,
    pub error: Option<LoaderError>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total: u32,
    pub has_more: bool,
    pub active_filters: T::Filters,
}

impl<T: Resource> Default for LoaderState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            loading_more: false,
            error: None,
            current_page: 1,
            total_pages: 1,
            total: 0,
            has_more: false,
            active_filters: T::Filters::default(),
        }
    }
}

struct PageDone<T: Resource> {
    generation: u64,
    mode: FetchMode,
    page: u32,
    filters: T::Filters,
    result: Result<PageEnvelope<T>, ApiError>,
}

/// Fetches run on worker threads; results are applied on the owning thread
/// by [`IncrementalLoader::poll`]. Every request is stamped with the current
/// generation, and a new search or reset bumps it, so a late answer to an
/// older request is dropped instead of overwriting newer results.
pub struct IncrementalLoader<T: Resource> {
    client: CatalogClient,
    state: LoaderState<T>,
    generation: u64,
    in_flight: usize,
    did_init: bool,
    searched: bool,
    last_search: T::Filters,
    done_tx: Sender<PageDone<T>>,
    done_rx: Receiver<PageDone<T>>,
    on_complete: Option<RepaintHook>,
}

impl<T: Resource> IncrementalLoader<T> {
    pub fn new(client: CatalogClient) -> Self {
        let (done_tx, done_rx) = mpsc::channel();
        Self {
            client,
            state: LoaderState::default(),
            generation: 0,
            in_flight: 0,
            did_init: false,
            searched: false,
            last_search: T::Filters::default(),
            done_tx,
            done_rx,
            on_complete: None,
        }
    }

    pub fn with_repaint(mut self, hook: RepaintHook) -> Self {
        self.on_complete = Some(hook);
        self
    }

    pub fn state(&self) -> &LoaderState<T> {
        &self.state
    }

    pub fn items(&self) -> &[T] {
        &self.state.items
    }

    pub fn error(&self) -> Option<&LoaderError> {
        self.state.error.as_ref()
    }

    pub fn phase(&self) -> LoadPhase {
        let st = &self.state;
        if st.loading {
            LoadPhase::Loading
        } else if st.loading_more {
            LoadPhase::LoadingMore
        } else if st.error.is_some() {
            LoadPhase::Error
        } else if self.searched {
            LoadPhase::Ready
        } else {
            LoadPhase::Idle
        }
    }

    /// True while any request (current or stale) has not reported back.
    pub fn is_busy(&self) -> bool {
        self.in_flight > 0
    }

    /// First activation runs one unfiltered search; later calls do nothing.
    pub fn activate(&mut self) -> bool {
        if self.did_init {
            return false;
        }
        self.did_init = true;
        self.search_with_filters(T::Filters::default());
        true
    }

    /// Always a new search: page 1, results replace the current items.
    pub fn search_with_filters(&mut self, filters: T::Filters) {
        self.generation += 1;
        self.searched = true;
        self.last_search = filters.clone();
        self.state.loading = true;
        self.state.loading_more = false;
        self.state.error = None;
        self.spawn_fetch(FetchMode::NewSearch, 1, filters);
    }

    /// Next page with the active filters. Returns false (and fetches
    /// nothing) while another page is loading or when no pages remain.
    pub fn load_more(&mut self) -> bool {
        let st = &self.state;
        if st.loading_more || st.loading || !st.has_more {
            return false;
        }
        let page = st.current_page + 1;
        let filters = st.active_filters.clone();
        self.state.loading_more = true;
        self.state.error = None;
        self.spawn_fetch(FetchMode::LoadMore, page, filters);
        true
    }

    /// Re-run whatever failed last. Returns false if there is no error.
    pub fn retry(&mut self) -> bool {
        let Some(err) = self.state.error.clone() else {
            return false;
        };
        if err.during_load_more() {
            self.load_more()
        } else {
            let filters = self.last_search.clone();
            self.search_with_filters(filters);
            true
        }
    }

    /// Back to the empty initial state. Requests still in flight are ignored when they land.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.searched = false;
        self.last_search = T::Filters::default();
        self.state = LoaderState::default();
    }

    pub fn reset_and_reload(&mut self) {
        self.reset();
        self.search_with_filters(T::Filters::default());
    }

    /// Apply finished requests without blocking. Call once per frame.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0usize;
        while let Ok(done) = self.done_rx.try_recv() {
            self.apply(done);
            applied += 1;
        }
        applied
    }

    /// Block until nothing is in flight. Returns false on timeout.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight > 0 {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return false;
            }
            match self.done_rx.recv_timeout(left) {
                Ok(done) => self.apply(done),
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        true
    }

    fn spawn_fetch(&mut self, mode: FetchMode, page: u32, filters: T::Filters) {
        let client = self.client.clone();
        let tx = self.done_tx.clone();
        let hook = self.on_complete.clone();
        let generation = self.generation;
        self.in_flight += 1;

        debug!(
            "{} {:?} page {page} (generation {generation})",
            T::KIND.as_str(),
            mode
        );

        std::thread::spawn(move || {
            let request = filters.with_page(page);
            let result = client.list::<T>(&request);
            let _ = tx.send(PageDone {
                generation,
                mode,
                page,
                filters,
                result,
            });
            if let Some(hook) = hook {
                hook();
            }
        });
    }

    fn apply(&mut self, done: PageDone<T>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if done.generation != self.generation {
            debug!(
                "Discarding stale {} page {} (generation {} < {})",
                T::KIND.as_str(),
                done.page,
                done.generation,
                self.generation
            );
            return;
        }

        let st = &mut self.state;
        match done.result {
            Ok(envelope) => {
                st.has_more = !envelope.is_last();
                match done.mode {
                    FetchMode::NewSearch => st.items = envelope.results,
                    FetchMode::LoadMore => st.items.extend(envelope.results),
                }
                st.current_page = done.page;
                st.total_pages = envelope.info.pages;
                st.total = envelope.info.count;
                st.active_filters = done.filters;
                st.error = None;
            }
            Err(err) => {
                let e = LoaderError::from_api(T::KIND, &err, done.mode);
                if e.not_found {
                    debug!("{} query matched nothing: {err}", T::KIND.as_str());
                } else {
                    warn!("Loading {} page {} failed: {err}", T::KIND.as_str(), done.page);
                }
                if done.mode == FetchMode::NewSearch {
                    // never show stale rows next to a failed search
                    st.items.clear();
                    st.has_more = false;
                    st.total = 0;
                }
                st.error = Some(e);
            }
        }
        st.loading = false;
        st.loading_more = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{character_json, episode_json, location_json, page_json, MockTransport};
    use crate::api::{
        Character, CharacterFilters, CharacterStatus, Episode, EpisodeFilters, Location,
        LocationFilters,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BASE: &str = "https://api.test/api";
    const WAIT: Duration = Duration::from_secs(5);

    fn loader(mock: &Arc<MockTransport>) -> IncrementalLoader<Character> {
        IncrementalLoader::new(CatalogClient::new(BASE, mock.clone()))
    }

    fn chars(ids: std::ops::RangeInclusive<u32>) -> Vec<String> {
        ids.map(|id| character_json(id, &format!("Character {id}")))
            .collect()
    }

    fn ids(l: &IncrementalLoader<Character>) -> Vec<u32> {
        l.items().iter().map(|c| c.id).collect()
    }

    #[test]
    fn single_page_search_then_load_more_is_noop() {
        let mock = MockTransport::new();
        mock.respond(
            &format!("{BASE}/character?page=1"),
            200,
            page_json(&chars(1..=2), 2, 1, None),
        );

        let mut l = loader(&mock);
        assert_eq!(l.phase(), LoadPhase::Idle);
        l.search_with_filters(CharacterFilters::default());
        assert!(l.state().loading);
        assert!(l.wait_idle(WAIT));

        assert_eq!(ids(&l), vec![1, 2]);
        assert!(!l.state().has_more);
        assert_eq!(l.state().total, 2);
        assert_eq!(l.phase(), LoadPhase::Ready);

        assert!(!l.load_more());
        assert!(l.wait_idle(WAIT));
        assert_eq!(ids(&l), vec![1, 2]);
        assert_eq!(mock.requests().len(), 1);
    }

    #[test]
    fn load_more_walks_pages_in_order_until_the_last() {
        let mock = MockTransport::new();
        for page in 1..=3u32 {
            let first = (page - 1) * 2 + 1;
            let next = (page < 3).then(|| format!("{BASE}/character?page={}", page + 1));
            mock.respond(
                &format!("{BASE}/character?page={page}"),
                200,
                page_json(&chars(first..=first + 1), 6, 3, next.as_deref()),
            );
        }

        let mut l = loader(&mock);
        l.search_with_filters(CharacterFilters::default());
        assert!(l.wait_idle(WAIT));
        assert!(l.state().has_more);

        assert!(l.load_more());
        assert!(!l.load_more(), "second call while loading must be ignored");
        assert_eq!(l.phase(), LoadPhase::LoadingMore);
        assert!(l.wait_idle(WAIT));
        assert!(l.state().has_more);
        assert_eq!(l.state().current_page, 2);

        assert!(l.load_more());
        assert!(l.wait_idle(WAIT));
        assert!(!l.state().has_more);
        assert_eq!(l.state().current_page, 3);
        assert_eq!(l.state().total_pages, 3);
        assert_eq!(ids(&l), vec![1, 2, 3, 4, 5, 6]);

        assert!(!l.load_more());
        assert_eq!(mock.requests().len(), 3);
    }

    #[test]
    fn new_search_replaces_previous_items() {
        let mock = MockTransport::new();
        mock.respond(
            &format!("{BASE}/character?page=1"),
            200,
            page_json(&chars(1..=4), 4, 1, None),
        );
        mock.respond(
            &format!("{BASE}/character?status=Dead&page=1"),
            200,
            page_json(&chars(90..=91), 2, 1, None),
        );

        let mut l = loader(&mock);
        l.search_with_filters(CharacterFilters::default());
        assert!(l.wait_idle(WAIT));

        let dead = CharacterFilters {
            status: Some(CharacterStatus::Dead),
            ..Default::default()
        };
        l.search_with_filters(dead.clone());
        assert!(l.wait_idle(WAIT));
        assert_eq!(ids(&l), vec![90, 91]);
        assert_eq!(l.state().active_filters, dead);
    }

    #[test]
    fn not_found_search_clears_items_with_domain_wording() {
        let mock = MockTransport::new();
        mock.respond(
            &format!("{BASE}/character?page=1"),
            200,
            page_json(&chars(1..=2), 40, 2, Some("next")),
        );
        mock.respond(&format!("{BASE}/character?name=zzz&page=1"), 404, String::new());

        let mut l = loader(&mock);
        l.search_with_filters(CharacterFilters::default());
        assert!(l.wait_idle(WAIT));

        l.search_with_filters(CharacterFilters {
            name: Some("zzz".into()),
            ..Default::default()
        });
        assert!(l.wait_idle(WAIT));

        let st = l.state();
        assert!(st.items.is_empty());
        assert!(!st.loading);
        assert!(!st.has_more);
        let err = st.error.as_ref().unwrap();
        assert!(err.not_found);
        assert!(err.message.contains("does not exist in the Rick&Morty universe"));
        assert_eq!(l.phase(), LoadPhase::Error);
    }

    #[test]
    fn failed_load_more_keeps_items_and_retries_the_page() {
        let mock = MockTransport::new();
        mock.respond(
            &format!("{BASE}/character?page=1"),
            200,
            page_json(&chars(1..=2), 4, 2, Some("next")),
        );
        mock.respond(&format!("{BASE}/character?page=2"), 500, String::new());

        let mut l = loader(&mock);
        l.search_with_filters(CharacterFilters::default());
        assert!(l.wait_idle(WAIT));
        assert!(l.load_more());
        assert!(l.wait_idle(WAIT));

        assert_eq!(ids(&l), vec![1, 2]);
        let err = l.error().unwrap();
        assert!(err.during_load_more());
        assert!(!err.not_found);
        assert_eq!(err.message, "API Error: 500 Internal Server Error");
        assert!(l.state().has_more);

        mock.respond(
            &format!("{BASE}/character?page=2"),
            200,
            page_json(&chars(3..=4), 4, 2, None),
        );
        assert!(l.retry());
        assert!(l.wait_idle(WAIT));
        assert_eq!(ids(&l), vec![1, 2, 3, 4]);
        assert!(l.error().is_none());
    }

    #[test]
    fn retry_after_failed_search_repeats_the_search() {
        let mock = MockTransport::new();
        let url = format!("{BASE}/character?species=Alien&page=1");
        mock.respond(&url, 503, String::new());

        let mut l = loader(&mock);
        let aliens = CharacterFilters {
            species: Some("Alien".into()),
            ..Default::default()
        };
        l.search_with_filters(aliens);
        assert!(l.wait_idle(WAIT));
        assert!(l.error().is_some());

        mock.respond(&url, 200, page_json(&chars(5..=5), 1, 1, None));
        assert!(l.retry());
        assert!(l.wait_idle(WAIT));
        assert_eq!(ids(&l), vec![5]);
        assert_eq!(mock.requests(), vec![url.clone(), url]);
    }

    #[test]
    fn slow_stale_search_does_not_overwrite_newer_results() {
        let mock = MockTransport::new();
        let slow = format!("{BASE}/character?name=rick&page=1");
        let fast = format!("{BASE}/character?name=morty&page=1");
        mock.respond(&slow, 200, page_json(&chars(1..=1), 1, 1, None));
        mock.respond(&fast, 200, page_json(&chars(2..=2), 1, 1, None));
        let release = mock.gate(&slow);

        let mut l = loader(&mock);
        l.search_with_filters(CharacterFilters {
            name: Some("rick".into()),
            ..Default::default()
        });
        l.search_with_filters(CharacterFilters {
            name: Some("morty".into()),
            ..Default::default()
        });

        let deadline = Instant::now() + WAIT;
        while l.state().loading && Instant::now() < deadline {
            l.poll();
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(ids(&l), vec![2]);

        release.send(()).unwrap();
        assert!(l.wait_idle(WAIT));
        assert!(!l.is_busy());
        assert_eq!(ids(&l), vec![2]);
        assert_eq!(l.state().active_filters.name.as_deref(), Some("morty"));
    }

    #[test]
    fn duplicate_ids_across_pages_are_kept() {
        let mock = MockTransport::new();
        mock.respond(
            &format!("{BASE}/character?page=1"),
            200,
            page_json(&chars(1..=2), 4, 2, Some("next")),
        );
        mock.respond(
            &format!("{BASE}/character?page=2"),
            200,
            page_json(&chars(2..=3), 4, 2, None),
        );

        let mut l = loader(&mock);
        l.search_with_filters(CharacterFilters::default());
        assert!(l.wait_idle(WAIT));
        l.load_more();
        assert!(l.wait_idle(WAIT));
        assert_eq!(ids(&l), vec![1, 2, 2, 3]);
    }

    #[test]
    fn activate_fires_once_and_reset_is_synchronous() {
        let mock = MockTransport::new();
        mock.respond(
            &format!("{BASE}/character?page=1"),
            200,
            page_json(&chars(1..=3), 3, 1, None),
        );

        let mut l = loader(&mock);
        assert!(l.activate());
        assert!(!l.activate());
        assert!(l.wait_idle(WAIT));
        assert_eq!(mock.requests().len(), 1);

        l.reset();
        assert!(l.items().is_empty());
        assert_eq!(l.state().total, 0);
        assert_eq!(l.phase(), LoadPhase::Idle);
        assert_eq!(mock.requests().len(), 1);

        l.reset_and_reload();
        assert!(l.wait_idle(WAIT));
        assert_eq!(ids(&l), vec![1, 2, 3]);
        assert_eq!(mock.requests().len(), 2);
    }

    #[test]
    fn repaint_hook_runs_per_completion() {
        let mock = MockTransport::new();
        mock.respond(
            &format!("{BASE}/character?page=1"),
            200,
            page_json(&chars(1..=1), 1, 1, None),
        );
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let mut l = loader(&mock).with_repaint(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        l.search_with_filters(CharacterFilters::default());
        assert!(l.wait_idle(WAIT));
        // the hook runs right after the send; give the worker a moment
        let deadline = Instant::now() + WAIT;
        while hits.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn location_listing_decodes_and_pages() {
        let mock = MockTransport::new();
        mock.respond(
            &format!("{BASE}/location?dimension=Dimension%20C-137&page=1"),
            200,
            page_json(&[location_json(1, "Earth (C-137)")], 2, 2, Some("next")),
        );
        mock.respond(
            &format!("{BASE}/location?dimension=Dimension%20C-137&page=2"),
            200,
            page_json(&[location_json(3, "Citadel of Ricks")], 2, 2, None),
        );

        let mut l = IncrementalLoader::<Location>::new(CatalogClient::new(BASE, mock.clone()));
        l.search_with_filters(LocationFilters {
            dimension: Some("Dimension C-137".into()),
            ..Default::default()
        });
        assert!(l.wait_idle(WAIT));
        assert!(l.error().is_none());
        let earth = &l.items()[0];
        assert_eq!(earth.kind, "Planet");
        assert_eq!(earth.residents.len(), 1);

        assert!(l.load_more());
        assert!(l.wait_idle(WAIT));
        let names: Vec<&str> = l.items().iter().map(|loc| loc.name.as_str()).collect();
        assert_eq!(names, vec!["Earth (C-137)", "Citadel of Ricks"]);
        assert!(!l.state().has_more);
    }

    #[test]
    fn episode_and_location_misses_use_their_own_wording() {
        let mock = MockTransport::new();
        mock.respond(
            &format!("{BASE}/episode?page=1"),
            200,
            page_json(&[episode_json(1, "Pilot", "S01E01")], 1, 1, None),
        );
        mock.respond(&format!("{BASE}/episode?episode=S99&page=1"), 404, String::new());
        mock.respond(&format!("{BASE}/location?name=nowhere&page=1"), 404, String::new());

        let mut episodes = IncrementalLoader::<Episode>::new(CatalogClient::new(BASE, mock.clone()));
        assert!(episodes.activate());
        assert!(episodes.wait_idle(WAIT));
        assert_eq!(episodes.items()[0].episode, "S01E01");

        episodes.search_with_filters(EpisodeFilters {
            episode: Some("S99".into()),
            ..Default::default()
        });
        assert!(episodes.wait_idle(WAIT));
        let err = episodes.error().unwrap();
        assert!(err.not_found);
        assert_eq!(err.message, "The episode does not exist");
        assert!(episodes.items().is_empty());

        let mut locations = IncrementalLoader::<Location>::new(CatalogClient::new(BASE, mock.clone()));
        locations.search_with_filters(LocationFilters {
            name: Some("nowhere".into()),
            ..Default::default()
        });
        assert!(locations.wait_idle(WAIT));
        let err = locations.error().unwrap();
        assert!(err.not_found);
        assert_eq!(
            err.message,
            "That location does not exist in the Rick&Morty universe"
        );
    }
}
