// src/app/ui/grid.rs
use eframe::egui as eg;

use super::{render_error_panel, render_footer, status_color, ERROR_RED};
use crate::api::{Character, ResourceKind};
use crate::app::avatars::{AvatarCache, MAX_UPLOADS_PER_FRAME};
use crate::app::favorites::Favorites;

pub const H_SPACING: f32 = 8.0;
pub const V_SPACING: f32 = 10.0;
pub const CARD_W: f32 = 170.0;
const CARD_TEXT_H: f32 = 92.0;
const INFO_CARD_W: f32 = 260.0;
const INFO_CARD_H: f32 = 104.0;

/// A click on a card, applied once the grid is drawn.
enum CardAction {
    Open(u32),
    ToggleFavorite(u32),
    Cast {
        title: String,
        owner: (ResourceKind, u32),
        urls: Vec<String>,
    },
}

fn character_card(
    ui: &mut eg::Ui,
    ctx: &eg::Context,
    c: &Character,
    avatars: &mut AvatarCache,
    favorites: &Favorites,
    uploads_left: &mut usize,
) -> Option<CardAction> {
    let mut action = None;
    ui.allocate_ui_with_layout(
        eg::vec2(CARD_W, CARD_W + CARD_TEXT_H),
        eg::Layout::top_down(eg::Align::Min),
        |ui| {
            ui.set_min_size(eg::vec2(CARD_W, CARD_W + CARD_TEXT_H));
            let (img_rect, resp) =
                ui.allocate_exact_size(eg::vec2(CARD_W, CARD_W), eg::Sense::click());

            // only visible cards pull their image
            if ui.is_rect_visible(img_rect) {
                avatars.request(&c.image);
            }
            match avatars.texture(ctx, &c.image, uploads_left) {
                Some(tex) => {
                    ui.painter().image(
                        tex.id(),
                        img_rect,
                        eg::Rect::from_min_max(eg::pos2(0.0, 0.0), eg::pos2(1.0, 1.0)),
                        eg::Color32::WHITE,
                    );
                }
                None => {
                    ui.painter()
                        .rect_filled(img_rect, 6.0, eg::Color32::from_gray(40));
                }
            }
            if resp
                .on_hover_cursor(eg::CursorIcon::PointingHand)
                .clicked()
            {
                action = Some(CardAction::Open(c.id));
            }

            ui.add(eg::Label::new(eg::RichText::new(&c.name).strong()).truncate());
            ui.horizontal(|ui| {
                ui.colored_label(status_color(c.status), "●");
                ui.add(
                    eg::Label::new(format!("{} - {}", c.status.as_str(), c.species)).truncate(),
                );
            });
            ui.add(eg::Label::new(eg::RichText::new(&c.location.name).weak().small()).truncate());

            let fav = favorites.contains(c.id);
            let (star, hint) = if fav {
                ("★", "Remove from favorites")
            } else {
                ("☆", "Add to favorites")
            };
            if ui.button(star).on_hover_text(hint).clicked() {
                action = Some(CardAction::ToggleFavorite(c.id));
            }
        },
    );
    action
}

fn info_card(ui: &mut eg::Ui, add_contents: impl FnOnce(&mut eg::Ui)) {
    ui.allocate_ui_with_layout(
        eg::vec2(INFO_CARD_W, INFO_CARD_H),
        eg::Layout::top_down(eg::Align::Min),
        |ui| {
            eg::Frame::group(ui.style()).show(ui, |ui| {
                ui.set_min_size(eg::vec2(INFO_CARD_W - 14.0, INFO_CARD_H - 14.0));
                add_contents(ui);
            });
        },
    );
}

fn character_grid(
    ui: &mut eg::Ui,
    ctx: &eg::Context,
    items: &[Character],
    avatars: &mut AvatarCache,
    favorites: &Favorites,
) -> Option<CardAction> {
    let mut uploads_left = MAX_UPLOADS_PER_FRAME;
    let mut action = None;
    ui.horizontal_wrapped(|ui| {
        ui.spacing_mut().item_spacing = eg::vec2(H_SPACING, V_SPACING);
        for c in items {
            if let Some(a) = character_card(ui, ctx, c, avatars, favorites, &mut uploads_left) {
                action = Some(a);
            }
        }
    });
    action
}

impl crate::app::ExplorerApp {
    fn apply_card_action(&mut self, action: Option<CardAction>) {
        match action {
            Some(CardAction::Open(id)) => self.details.open(id),
            Some(CardAction::ToggleFavorite(id)) => {
                self.favorites.toggle(id);
            }
            Some(CardAction::Cast { title, owner, urls }) => self.open_cast(title, owner, &urls),
            None => {}
        }
    }

    pub(crate) fn ui_render_characters(&mut self, ui: &mut eg::Ui, ctx: &eg::Context) {
        if render_error_panel(ui, &mut self.characters, &mut self.filters) {
            return;
        }
        let mut action = None;
        let Self {
            characters,
            avatars,
            favorites,
            ..
        } = self;
        eg::ScrollArea::vertical()
            .id_source("characters_scroll")
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                let viewport = ui.clip_rect();
                action = character_grid(ui, ctx, characters.loader.items(), avatars, favorites);
                render_footer(ui, characters, viewport);
            });
        self.apply_card_action(action);
    }

    pub(crate) fn ui_render_episodes(&mut self, ui: &mut eg::Ui, _ctx: &eg::Context) {
        if render_error_panel(ui, &mut self.episodes, &mut self.filters) {
            return;
        }
        let mut action = None;
        let episodes = &mut self.episodes;
        eg::ScrollArea::vertical()
            .id_source("episodes_scroll")
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                let viewport = ui.clip_rect();
                ui.horizontal_wrapped(|ui| {
                    ui.spacing_mut().item_spacing = eg::vec2(H_SPACING, V_SPACING);
                    for ep in episodes.loader.items() {
                        info_card(ui, |ui| {
                            ui.label(eg::RichText::new(&ep.episode).monospace().weak());
                            ui.add(eg::Label::new(eg::RichText::new(&ep.name).strong()).truncate());
                            ui.label(&ep.air_date);
                            let cast = format!("Cast ({})", ep.characters.len());
                            if ui.small_button(cast).clicked() {
                                action = Some(CardAction::Cast {
                                    title: format!("{} · {}", ep.episode, ep.name),
                                    owner: (ResourceKind::Episode, ep.id),
                                    urls: ep.characters.clone(),
                                });
                            }
                        });
                    }
                });
                render_footer(ui, episodes, viewport);
            });
        self.apply_card_action(action);
    }

    pub(crate) fn ui_render_locations(&mut self, ui: &mut eg::Ui, _ctx: &eg::Context) {
        if render_error_panel(ui, &mut self.locations, &mut self.filters) {
            return;
        }
        let mut action = None;
        let locations = &mut self.locations;
        eg::ScrollArea::vertical()
            .id_source("locations_scroll")
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                let viewport = ui.clip_rect();
                ui.horizontal_wrapped(|ui| {
                    ui.spacing_mut().item_spacing = eg::vec2(H_SPACING, V_SPACING);
                    for loc in locations.loader.items() {
                        info_card(ui, |ui| {
                            ui.add(eg::Label::new(eg::RichText::new(&loc.name).strong()).truncate());
                            ui.label(eg::RichText::new(&loc.kind).weak());
                            ui.add(eg::Label::new(loc.dimension.as_str()).truncate());
                            let residents = format!("Residents ({})", loc.residents.len());
                            let btn = ui.add_enabled(
                                !loc.residents.is_empty(),
                                eg::Button::new(residents).small(),
                            );
                            if btn.clicked() {
                                action = Some(CardAction::Cast {
                                    title: format!("Residents of {}", loc.name),
                                    owner: (ResourceKind::Location, loc.id),
                                    urls: loc.residents.clone(),
                                });
                            }
                        });
                    }
                });
                render_footer(ui, locations, viewport);
            });
        self.apply_card_action(action);
    }

    pub(crate) fn ui_render_favorites(&mut self, ui: &mut eg::Ui, ctx: &eg::Context) {
        ui.horizontal(|ui| {
            ui.heading(format!("Favorites ({})", self.favorites.count()));
            ui.with_layout(eg::Layout::right_to_left(eg::Align::Center), |ui| {
                let btn = ui.add_enabled(self.favorites.count() > 0, eg::Button::new("Clear all"));
                if btn.clicked() {
                    self.favorites.clear();
                }
            });
        });
        ui.separator();

        if self.favorites.count() == 0 {
            ui.vertical_centered(|ui| {
                ui.add_space(40.0);
                ui.label("No favorites yet. Star a character to keep it here.");
            });
            return;
        }
        if self.favorite_roster.is_loading() {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Loading favorites…");
            });
            return;
        }
        if let Some(err) = self.favorite_roster.error().map(str::to_owned) {
            ui.colored_label(ERROR_RED, err);
            if ui.button("Try Again").clicked() {
                self.favorite_roster.refetch();
            }
            return;
        }

        let mut action = None;
        let Self {
            favorite_roster,
            avatars,
            favorites,
            ..
        } = self;
        eg::ScrollArea::vertical()
            .id_source("favorites_scroll")
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                action = character_grid(ui, ctx, favorite_roster.characters(), avatars, favorites);
            });
        self.apply_card_action(action);
    }

    pub(crate) fn ui_render_cast_window(&mut self, ctx: &eg::Context) {
        let Some(title) = self.cast_view.as_ref().map(|v| v.title.clone()) else {
            return;
        };
        let mut open = true;
        let mut picked = None;
        eg::Window::new(title)
            .id(eg::Id::new("cast_window"))
            .open(&mut open)
            .default_width(280.0)
            .resizable(true)
            .show(ctx, |ui| {
                if self.cast.is_loading() {
                    ui.spinner();
                    return;
                }
                if let Some(err) = self.cast.error() {
                    ui.colored_label(ERROR_RED, err);
                    return;
                }
                if self.cast.characters().is_empty() {
                    ui.label(eg::RichText::new("Nobody here.").weak());
                    return;
                }
                eg::ScrollArea::vertical().max_height(360.0).show(ui, |ui| {
                    for c in self.cast.characters() {
                        ui.horizontal(|ui| {
                            ui.colored_label(status_color(c.status), "●");
                            if ui.link(&c.name).clicked() {
                                picked = Some(c.id);
                            }
                            if self.favorites.contains(c.id) {
                                ui.label("★");
                            }
                        });
                    }
                });
            });
        if let Some(id) = picked {
            self.details.open(id);
        }
        if !open {
            self.close_cast();
        }
    }
}
