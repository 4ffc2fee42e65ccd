// src/app/roster.rs — characters by id in one batch request
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use tracing::warn;

use super::loader::RepaintHook;
use crate::api::{ApiError, CatalogClient, Character};

/// What the roster was last asked for; kept so `refetch` can repeat it.
#[derive(Clone, Debug)]
enum RosterQuery {
    Ids(Vec<u32>),
    /// Cross-reference URLs, as found on episodes and locations.
    Urls(Vec<String>),
}

impl RosterQuery {
    fn is_empty(&self) -> bool {
        match self {
            Self::Ids(ids) => ids.is_empty(),
            Self::Urls(urls) => urls.is_empty(),
        }
    }

    fn fetch(&self, client: &CatalogClient) -> Result<Vec<Character>, ApiError> {
        match self {
            Self::Ids(ids) => client.get_many_by_ids(ids),
            Self::Urls(urls) => client.get_many_by_urls(urls),
        }
    }
}

struct RosterDone {
    generation: u64,
    result: Result<Vec<Character>, ApiError>,
}

/// Backs the favorites tab and the resident/cast lists.
pub struct CharacterRoster {
    client: CatalogClient,
    requested: Option<RosterQuery>,
    characters: Vec<Character>,
    loading: bool,
    error: Option<String>,
    generation: u64,
    in_flight: usize,
    done_tx: Sender<RosterDone>,
    done_rx: Receiver<RosterDone>,
    on_complete: Option<RepaintHook>,
}

impl CharacterRoster {
    pub fn new(client: CatalogClient) -> Self {
        let (done_tx, done_rx) = mpsc::channel();
        Self {
            client,
            requested: None,
            characters: Vec::new(),
            loading: false,
            error: None,
            generation: 0,
            in_flight: 0,
            done_tx,
            done_rx,
            on_complete: None,
        }
    }

    pub fn with_repaint(mut self, hook: RepaintHook) -> Self {
        self.on_complete = Some(hook);
        self
    }

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Replace the roster with `ids`. An empty list clears it without a request.
    pub fn load(&mut self, ids: Vec<u32>) {
        self.start(RosterQuery::Ids(ids));
    }

    /// Same as [`load`](Self::load) for character URLs; URLs that don't name
    /// a character are skipped.
    pub fn load_urls(&mut self, urls: &[String]) {
        self.start(RosterQuery::Urls(urls.to_vec()));
    }

    fn start(&mut self, query: RosterQuery) {
        self.generation += 1;
        self.error = None;
        self.requested = Some(query.clone());
        if query.is_empty() {
            self.characters.clear();
            self.loading = false;
            return;
        }
        self.loading = true;
        self.in_flight += 1;

        let client = self.client.clone();
        let tx = self.done_tx.clone();
        let hook = self.on_complete.clone();
        let generation = self.generation;
        std::thread::spawn(move || {
            let result = query.fetch(&client);
            let _ = tx.send(RosterDone { generation, result });
            if let Some(hook) = hook {
                hook();
            }
        });
    }

    pub fn refetch(&mut self) {
        if let Some(query) = self.requested.clone() {
            self.start(query);
        }
    }

    pub fn clear(&mut self) {
        self.generation += 1;
        self.requested = None;
        self.characters.clear();
        self.loading = false;
        self.error = None;
    }

    pub fn poll(&mut self) -> usize {
        let mut applied = 0usize;
        while let Ok(done) = self.done_rx.try_recv() {
            self.apply(done);
            applied += 1;
        }
        applied
    }

    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight > 0 {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.done_rx.recv_timeout(left) {
                Ok(done) => self.apply(done),
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        true
    }

    fn apply(&mut self, done: RosterDone) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if done.generation != self.generation {
            return;
        }
        match done.result {
            Ok(chars) => self.characters = chars,
            Err(e) => {
                warn!("Loading characters failed: {e}");
                self.error = Some(e.to_string());
                self.characters.clear();
            }
        }
        self.loading = false;
    }
}
