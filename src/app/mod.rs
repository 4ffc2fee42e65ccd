// src/app/mod.rs — tabbed catalog browser: three paged listings, favorites, details

// ---- Standard lib imports ----
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

// ---- Crates ----
use eframe::egui as eg;
use tracing::info;

// ---- Local modules ----
pub mod avatars;
pub mod cache;
pub mod detail;
pub mod favorites;
pub mod filters;
pub mod loader;
pub mod proximity;
pub mod roster;
pub mod store;
pub mod ui;

use crate::api::{CatalogClient, Character, Episode, Location, Resource, ResourceKind};
use crate::config::AppConfig;
use avatars::AvatarCache;
use detail::CharacterDetails;
use favorites::Favorites;
use filters::{FilterSlot, FilterState};
use loader::{IncrementalLoader, RepaintHook};
use proximity::{MarginValue, ProximityTrigger, RootMargin};
use roster::CharacterRoster;
use store::KeyValueStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tab {
    Characters,
    Episodes,
    Locations,
    Favorites,
}

impl Tab {
    pub const ALL: [Self; 4] = [
        Self::Characters,
        Self::Episodes,
        Self::Locations,
        Self::Favorites,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Characters => ResourceKind::Character.plural_title(),
            Self::Episodes => ResourceKind::Episode.plural_title(),
            Self::Locations => ResourceKind::Location.plural_title(),
            Self::Favorites => "Favorites",
        }
    }
}

/// Listings start the next page while the end is still 200px below the fold.
pub const LISTING_ROOT_MARGIN: RootMargin = RootMargin {
    bottom: MarginValue::Px(200.0),
    ..RootMargin::ZERO
};

/// One paged listing and the trigger that asks for its next page.
pub struct Listing<T: Resource> {
    pub loader: IncrementalLoader<T>,
    pub trigger: ProximityTrigger,
    wants_more: Rc<Cell<bool>>,
}

impl<T: Resource> Listing<T> {
    pub fn new(loader: IncrementalLoader<T>) -> Self {
        let wants_more = Rc::new(Cell::new(false));
        let flag = Rc::clone(&wants_more);
        Self {
            loader,
            trigger: ProximityTrigger::new(move || flag.set(true))
                .with_root_margin(LISTING_ROOT_MARGIN),
            wants_more,
        }
    }

    /// Fresh callback for a fresh result list: a fire that belonged to the
    /// old list is dropped, and the trigger starts a new observation.
    fn rearm(&mut self) {
        let flag = Rc::new(Cell::new(false));
        self.wants_more = Rc::clone(&flag);
        self.trigger.set_callback(move || flag.set(true));
    }

    pub(crate) fn search(&mut self, filters: T::Filters) {
        self.rearm();
        self.loader.search_with_filters(filters);
    }

    /// Drop this kind's filters (form and stored copy) and list everything again.
    pub(crate) fn show_all(&mut self, filters: &mut FilterState)
    where
        T::Filters: FilterSlot,
    {
        filters.clear::<T::Filters>();
        self.rearm();
        self.loader.reset_and_reload();
    }

    /// The trigger only runs while another page can be requested.
    /// A failed page pauses it until the user retries.
    pub(crate) fn sync_trigger(&mut self) {
        let st = self.loader.state();
        let enabled = st.has_more && !st.loading && !st.loading_more && st.error.is_none();
        self.trigger.set_enabled(enabled);
    }

    /// Act on a trigger fire from this frame, if any.
    pub(crate) fn take_request(&mut self) -> bool {
        if self.wants_more.replace(false) {
            self.loader.load_more()
        } else {
            false
        }
    }
}

/// A cast or resident list opened from an episode or location card.
pub(crate) struct CastView {
    pub title: String,
    pub owner: (ResourceKind, u32),
}

pub struct ExplorerApp {
    pub(crate) cfg: AppConfig,
    pub(crate) tab: Tab,

    pub(crate) characters: Listing<Character>,
    pub(crate) episodes: Listing<Episode>,
    pub(crate) locations: Listing<Location>,

    pub(crate) favorites: Favorites,
    pub(crate) filters: FilterState,

    pub(crate) details: CharacterDetails,
    pub(crate) favorite_roster: CharacterRoster,
    roster_revision: Option<u64>,
    pub(crate) cast: CharacterRoster,
    pub(crate) cast_view: Option<CastView>,

    pub(crate) avatars: AvatarCache,
    did_init: bool,
}

impl ExplorerApp {
    pub fn new(
        ctx: &eg::Context,
        cfg: AppConfig,
        client: CatalogClient,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let repaint: RepaintHook = {
            let ctx = ctx.clone();
            Arc::new(move || ctx.request_repaint())
        };

        let avatars = AvatarCache::new(
            cfg.avatar_dir(),
            cfg.avatar_max_w,
            cfg.avatar_workers,
            cfg.request_timeout,
        )
        .with_repaint(repaint.clone());

        Self {
            tab: Tab::Characters,
            characters: Listing::new(
                IncrementalLoader::new(client.clone()).with_repaint(repaint.clone()),
            ),
            episodes: Listing::new(
                IncrementalLoader::new(client.clone()).with_repaint(repaint.clone()),
            ),
            locations: Listing::new(
                IncrementalLoader::new(client.clone()).with_repaint(repaint.clone()),
            ),
            favorites: Favorites::new(Arc::clone(&store), Vec::new()),
            filters: FilterState::new(store),
            details: CharacterDetails::new(client.clone()).with_repaint(repaint.clone()),
            favorite_roster: CharacterRoster::new(client.clone()).with_repaint(repaint.clone()),
            roster_revision: None,
            cast: CharacterRoster::new(client).with_repaint(repaint),
            cast_view: None,
            avatars,
            cfg,
            did_init: false,
        }
    }

    /// Apply every worker completion that arrived since the last frame.
    fn poll_workers(&mut self) {
        self.characters.loader.poll();
        self.episodes.loader.poll();
        self.locations.loader.poll();
        self.details.poll();
        self.favorite_roster.poll();
        self.cast.poll();
        self.avatars.poll();
    }

    /// Listings load on first view, the way a mounted page would.
    fn activate_current_tab(&mut self) {
        let started = match self.tab {
            Tab::Characters => self.characters.loader.activate(),
            Tab::Episodes => self.episodes.loader.activate(),
            Tab::Locations => self.locations.loader.activate(),
            Tab::Favorites => {
                let rev = self.favorites.revision();
                if self.roster_revision != Some(rev) {
                    self.roster_revision = Some(rev);
                    self.favorite_roster.load(self.favorites.ids().to_vec());
                }
                false
            }
        };
        if started {
            info!("Loading {}", self.tab.label().to_lowercase());
        }
    }

    pub(crate) fn open_cast(&mut self, title: String, owner: (ResourceKind, u32), urls: &[String]) {
        if self.cast_view.as_ref().is_some_and(|v| v.owner == owner) {
            return;
        }
        self.cast.load_urls(urls);
        self.cast_view = Some(CastView { title, owner });
    }

    pub(crate) fn close_cast(&mut self) {
        self.cast_view = None;
        self.cast.clear();
    }
}

// ========== App impl ==========
impl eframe::App for ExplorerApp {
    fn update(&mut self, ctx: &eg::Context, _frame: &mut eframe::Frame) {
        // First frame
        if !self.did_init {
            self.did_init = true;
            self.favorites.hydrate();
            self.filters.hydrate();
            self.avatars.prune();
            info!("Catalog source: {}", self.cfg.api_base_url);
        }

        self.poll_workers();
        self.activate_current_tab();

        eg::TopBottomPanel::top("topbar").show(ctx, |ui| {
            self.ui_render_topbar(ui);
        });

        if self.details.is_open() {
            self.ui_render_detail_panel(ctx);
        }

        eg::CentralPanel::default().show(ctx, |ui| match self.tab {
            Tab::Characters => self.ui_render_characters(ui, ctx),
            Tab::Episodes => self.ui_render_episodes(ui, ctx),
            Tab::Locations => self.ui_render_locations(ui, ctx),
            Tab::Favorites => self.ui_render_favorites(ui, ctx),
        });

        if self.cast_view.is_some() {
            self.ui_render_cast_window(ctx);
        }

        // Next pages asked for by the proximity triggers during this frame
        self.characters.take_request();
        self.episodes.take_request();
        self.locations.take_request();
    }
}
