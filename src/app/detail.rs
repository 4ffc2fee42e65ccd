// src/app/detail.rs
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use eframe::egui as eg;
use egui_extras::{Column, TableBuilder};
use tracing::{debug, warn};

use super::loader::RepaintHook;
use crate::api::{ApiError, CatalogClient, Character, Episode, ResourceKind};

struct DetailDone {
    generation: u64,
    result: Result<(Character, Vec<Episode>), ApiError>,
}

/// One character plus every episode it appears in.
pub struct CharacterDetails {
    client: CatalogClient,
    selected: Option<u32>,
    character: Option<Character>,
    episodes: Vec<Episode>,
    loading: bool,
    error: Option<String>,
    generation: u64,
    in_flight: usize,
    done_tx: Sender<DetailDone>,
    done_rx: Receiver<DetailDone>,
    on_complete: Option<RepaintHook>,
}

/// Fetch every URL concurrently. Any failure fails the whole batch;
/// on success the order matches `urls`.
fn fetch_episodes(client: &CatalogClient, urls: &[String]) -> Result<Vec<Episode>, ApiError> {
    std::thread::scope(|s| {
        let handles: Vec<_> = urls
            .iter()
            .map(|url| s.spawn(move || client.get_by_url::<Episode>(url)))
            .collect();
        handles
            .into_iter()
            .zip(urls)
            .map(|(h, url)| {
                h.join().unwrap_or_else(|_| {
                    Err(ApiError::Transport {
                        url: url.clone(),
                        message: "episode worker panicked".into(),
                    })
                })
            })
            .collect()
    })
}

impl CharacterDetails {
    pub fn new(client: CatalogClient) -> Self {
        let (done_tx, done_rx) = mpsc::channel();
        Self {
            client,
            selected: None,
            character: None,
            episodes: Vec::new(),
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

    pub fn selected(&self) -> Option<u32> {
        self.selected
    }

    pub fn is_open(&self) -> bool {
        self.selected.is_some()
    }

    pub fn character(&self) -> Option<&Character> {
        self.character.as_ref()
    }

    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Selecting the already-shown character is a no-op.
    pub fn open(&mut self, id: u32) {
        if self.selected == Some(id) && (self.loading || self.character.is_some()) {
            return;
        }
        self.selected = Some(id);
        self.fetch(id);
    }

    pub fn refetch(&mut self) {
        if let Some(id) = self.selected {
            self.fetch(id);
        }
    }

    pub fn close(&mut self) {
        self.generation += 1;
        self.selected = None;
        self.character = None;
        self.episodes.clear();
        self.loading = false;
        self.error = None;
    }

    fn fetch(&mut self, id: u32) {
        self.generation += 1;
        self.loading = true;
        self.error = None;
        self.character = None;
        self.episodes.clear();
        self.in_flight += 1;

        let client = self.client.clone();
        let tx = self.done_tx.clone();
        let hook = self.on_complete.clone();
        let generation = self.generation;
        std::thread::spawn(move || {
            let result = client.get_by_id::<Character>(id).and_then(|c| {
                let eps = fetch_episodes(&client, &c.episode)?;
                Ok((c, eps))
            });
            let _ = tx.send(DetailDone { generation, result });
            if let Some(hook) = hook {
                hook();
            }
        });
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

    fn apply(&mut self, done: DetailDone) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if done.generation != self.generation {
            debug!("Dropping stale character details");
            return;
        }
        self.loading = false;
        match done.result {
            Ok((character, episodes)) => {
                self.character = Some(character);
                self.episodes = episodes;
            }
            Err(e) => {
                warn!("Character details failed: {e}");
                self.error = Some(if e.is_not_found() {
                    ResourceKind::Character.not_found_message().to_string()
                } else {
                    e.to_string()
                });
            }
        }
    }
}

impl crate::app::ExplorerApp {
    pub(crate) fn ui_render_detail_panel(&mut self, ctx: &eg::Context) {
        let screen_w: f32 = ctx.input(|i| i.screen_rect().width());
        let max_w: f32 = (screen_w * 0.45).clamp(320.0, 520.0);

        eg::SidePanel::right("detail_panel")
            .resizable(true)
            .default_width(360.0)
            .min_width(280.0)
            .max_width(max_w)
            .show(ctx, |ui| {
                ui.add_space(6.0);
                ui.horizontal(|ui| {
                    ui.heading("Character");
                    ui.with_layout(eg::Layout::right_to_left(eg::Align::Center), |ui| {
                        if ui.button("Close").clicked() {
                            self.details.close();
                        }
                    });
                });
                ui.separator();

                if self.details.is_loading() {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Loading character…");
                    });
                    return;
                }
                if let Some(err) = self.details.error().map(str::to_owned) {
                    ui.colored_label(eg::Color32::from_rgb(230, 110, 110), err);
                    if ui.button("Try Again").clicked() {
                        self.details.refetch();
                    }
                    return;
                }
                let Some(c) = self.details.character().cloned() else {
                    ui.label("Select a character to see details.");
                    return;
                };

                eg::ScrollArea::vertical()
                    .id_source("detail_scroll")
                    .auto_shrink([false; 2])
                    .show(ui, |ui| {
                        let side = ui.available_width().clamp(120.0, 300.0);
                        let mut uploads = 1usize;
                        self.avatars.request(&c.image);
                        match self.avatars.texture(ctx, &c.image, &mut uploads) {
                            Some(tex) => {
                                ui.image((tex.id(), eg::vec2(side, side)));
                            }
                            None => {
                                let (rect, _) =
                                    ui.allocate_exact_size(eg::vec2(side, side), eg::Sense::hover());
                                ui.painter().rect_filled(rect, 8.0, eg::Color32::from_gray(40));
                            }
                        }

                        ui.add_space(8.0);
                        ui.heading(&c.name);
                        ui.horizontal(|ui| {
                            ui.colored_label(super::ui::status_color(c.status), "●");
                            ui.label(format!("{} - {}", c.status.as_str(), c.species));
                        });

                        let fav = self.favorites.contains(c.id);
                        let label = if fav { "★ Remove from favorites" } else { "☆ Add to favorites" };
                        if ui.button(label).clicked() {
                            self.favorites.toggle(c.id);
                        }

                        ui.add_space(8.0);
                        ui.separator();
                        eg::Grid::new("detail_facts").num_columns(2).show(ui, |ui| {
                            ui.label(eg::RichText::new("Gender").weak());
                            ui.label(c.gender.as_str());
                            ui.end_row();
                            if !c.kind.is_empty() {
                                ui.label(eg::RichText::new("Type").weak());
                                ui.label(&c.kind);
                                ui.end_row();
                            }
                            ui.label(eg::RichText::new("Origin").weak());
                            ui.label(&c.origin.name);
                            ui.end_row();
                            ui.label(eg::RichText::new("Last seen").weak());
                            ui.label(&c.location.name);
                            ui.end_row();
                            if let Some(created) = c.created_at() {
                                ui.label(eg::RichText::new("Created").weak());
                                ui.label(created.format("%Y-%m-%d").to_string());
                                ui.end_row();
                            }
                        });

                        ui.add_space(8.0);
                        ui.label(
                            eg::RichText::new(format!("Episodes ({})", self.details.episodes().len()))
                                .strong(),
                        );
                        TableBuilder::new(ui)
                            .striped(true)
                            .vscroll(false)
                            .column(Column::auto())
                            .column(Column::remainder())
                            .column(Column::auto())
                            .header(20.0, |mut header| {
                                header.col(|ui| {
                                    ui.strong("Code");
                                });
                                header.col(|ui| {
                                    ui.strong("Name");
                                });
                                header.col(|ui| {
                                    ui.strong("Air date");
                                });
                            })
                            .body(|mut body| {
                                for ep in self.details.episodes() {
                                    body.row(18.0, |mut row| {
                                        row.col(|ui| {
                                            ui.label(&ep.episode);
                                        });
                                        row.col(|ui| {
                                            ui.label(&ep.name);
                                        });
                                        row.col(|ui| {
                                            ui.label(&ep.air_date);
                                        });
                                    });
                                }
                            });
                    });
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{character_json, episode_json, MockTransport};

    const BASE: &str = "https://api.test/api";
    const WAIT: Duration = Duration::from_secs(5);

    fn with_episodes(mock: &MockTransport) {
        mock.respond(
            "https://rickandmortyapi.com/api/episode/1",
            200,
            episode_json(1, "Pilot", "S01E01"),
        );
        mock.respond(
            "https://rickandmortyapi.com/api/episode/2",
            200,
            episode_json(2, "Lawnmower Dog", "S01E02"),
        );
    }

    #[test]
    fn loads_character_and_episodes_in_order() {
        let mock = MockTransport::new();
        mock.respond(&format!("{BASE}/character/1"), 200, character_json(1, "Rick Sanchez"));
        with_episodes(&mock);

        let mut d = CharacterDetails::new(CatalogClient::new(BASE, mock.clone()));
        d.open(1);
        assert!(d.is_loading());
        assert!(d.wait_idle(WAIT));

        assert_eq!(d.character().map(|c| c.name.as_str()), Some("Rick Sanchez"));
        let codes: Vec<&str> = d.episodes().iter().map(|e| e.episode.as_str()).collect();
        assert_eq!(codes, ["S01E01", "S01E02"]);
        assert!(d.error().is_none());
    }

    #[test]
    fn one_failed_episode_fails_everything() {
        let mock = MockTransport::new();
        mock.respond(&format!("{BASE}/character/1"), 200, character_json(1, "Rick Sanchez"));
        mock.respond(
            "https://rickandmortyapi.com/api/episode/1",
            200,
            episode_json(1, "Pilot", "S01E01"),
        );
        mock.respond("https://rickandmortyapi.com/api/episode/2", 503, String::new());

        let mut d = CharacterDetails::new(CatalogClient::new(BASE, mock.clone()));
        d.open(1);
        assert!(d.wait_idle(WAIT));
        assert!(d.character().is_none());
        assert!(d.episodes().is_empty());
        assert_eq!(d.error(), Some("API Error: 503 Service Unavailable"));

        with_episodes(&mock);
        d.refetch();
        assert!(d.wait_idle(WAIT));
        assert_eq!(d.episodes().len(), 2);
    }

    #[test]
    fn missing_character_gets_friendly_message() {
        let mock = MockTransport::new();
        mock.respond(&format!("{BASE}/character/9999"), 404, String::new());
        let mut d = CharacterDetails::new(CatalogClient::new(BASE, mock.clone()));
        d.open(9999);
        assert!(d.wait_idle(WAIT));
        assert_eq!(
            d.error(),
            Some("That character does not exist in the Rick&Morty universe")
        );
    }

    #[test]
    fn reopening_same_id_does_not_refetch_and_close_drops_late_result() {
        let mock = MockTransport::new();
        mock.respond(&format!("{BASE}/character/1"), 200, character_json(1, "Rick Sanchez"));
        with_episodes(&mock);

        let mut d = CharacterDetails::new(CatalogClient::new(BASE, mock.clone()));
        d.open(1);
        assert!(d.wait_idle(WAIT));
        let calls = mock.requests().len();
        d.open(1);
        assert_eq!(mock.requests().len(), calls);

        d.refetch();
        d.close();
        assert!(d.wait_idle(WAIT));
        assert!(!d.is_open());
        assert!(d.character().is_none());
    }
}
