// src/app/ui/topbar.rs
use eframe::egui as eg;

use super::super::Tab;
use super::{non_empty, option_combo};
use crate::api::{
    CharacterFilters, CharacterStatus, EpisodeFilters, Gender, LocationFilters, QueryFilters,
};

/// What the filter row asked for this frame.
#[derive(Default)]
struct FormAction {
    submit: bool,
    clear: bool,
}

fn text_field(ui: &mut eg::Ui, value: &mut String, hint: &str, width: f32, action: &mut FormAction) {
    let resp = ui.add(
        eg::TextEdit::singleline(value)
            .hint_text(hint)
            .desired_width(width),
    );
    if resp.lost_focus() && ui.input(|i| i.key_pressed(eg::Key::Enter)) {
        action.submit = true;
    }
}

fn form_buttons(ui: &mut eg::Ui, action: &mut FormAction) {
    if ui.button("Search").clicked() {
        action.submit = true;
    }
    if ui
        .small_button("Clear")
        .on_hover_text("Reset these filters and reload everything")
        .clicked()
    {
        action.clear = true;
    }
}

impl crate::app::ExplorerApp {
    // ---------- TOP BAR ----------
    pub(crate) fn ui_render_topbar(&mut self, ui: &mut eg::Ui) {
        ui.add_space(4.0);
        ui.horizontal(|ui| {
            ui.heading("Rick & Morty Explorer");
            ui.separator();
            for tab in Tab::ALL {
                let label = if tab == Tab::Favorites {
                    format!("★ {} ({})", tab.label(), self.favorites.count())
                } else {
                    tab.label().to_string()
                };
                if ui.selectable_label(self.tab == tab, label).clicked() {
                    self.tab = tab;
                }
            }
            ui.with_layout(eg::Layout::right_to_left(eg::Align::Center), |ui| {
                ui.label(eg::RichText::new(self.status_line()).weak());
            });
        });

        match self.tab {
            Tab::Characters => self.ui_character_filters(ui),
            Tab::Episodes => self.ui_episode_filters(ui),
            Tab::Locations => self.ui_location_filters(ui),
            Tab::Favorites => {}
        }
        ui.add_space(4.0);
    }

    fn status_line(&self) -> String {
        let (shown, total) = match self.tab {
            Tab::Characters => {
                let st = self.characters.loader.state();
                (st.items.len(), st.total)
            }
            Tab::Episodes => {
                let st = self.episodes.loader.state();
                (st.items.len(), st.total)
            }
            Tab::Locations => {
                let st = self.locations.loader.state();
                (st.items.len(), st.total)
            }
            Tab::Favorites => return format!("{} saved", self.favorites.count()),
        };
        if total == 0 {
            String::new()
        } else {
            format!("{shown} of {total}")
        }
    }

    fn ui_character_filters(&mut self, ui: &mut eg::Ui) {
        let current = self.filters.get::<CharacterFilters>().clone();
        let mut name = current.name.clone().unwrap_or_default();
        let mut species = current.species.clone().unwrap_or_default();
        let mut kind = current.kind.clone().unwrap_or_default();
        let mut status = current.status;
        let mut gender = current.gender;
        let mut action = FormAction::default();

        ui.horizontal_wrapped(|ui| {
            text_field(ui, &mut name, "Name…", 140.0, &mut action);
            option_combo(
                ui,
                "status_combo",
                "Any status",
                &mut status,
                &CharacterStatus::ALL,
                CharacterStatus::as_str,
            );
            option_combo(
                ui,
                "gender_combo",
                "Any gender",
                &mut gender,
                &Gender::ALL,
                Gender::as_str,
            );
            text_field(ui, &mut species, "Species…", 100.0, &mut action);
            text_field(ui, &mut kind, "Type…", 100.0, &mut action);
            form_buttons(ui, &mut action);
        });

        let edited = CharacterFilters {
            name: non_empty(name),
            status,
            species: non_empty(species),
            kind: non_empty(kind),
            gender,
            page: current.page,
        };
        if edited != current {
            self.filters.update_with(|f: &mut CharacterFilters| *f = edited);
        }
        if action.clear {
            self.characters.show_all(&mut self.filters);
        } else if action.submit {
            let filters = self.filters.get::<CharacterFilters>().compact();
            self.characters.search(filters);
        }
    }

    fn ui_episode_filters(&mut self, ui: &mut eg::Ui) {
        let current = self.filters.get::<EpisodeFilters>().clone();
        let mut name = current.name.clone().unwrap_or_default();
        let mut code = current.episode.clone().unwrap_or_default();
        let mut action = FormAction::default();

        ui.horizontal_wrapped(|ui| {
            text_field(ui, &mut name, "Name…", 160.0, &mut action);
            text_field(ui, &mut code, "Code, e.g. S01 or S02E03", 170.0, &mut action);
            form_buttons(ui, &mut action);
        });

        let edited = EpisodeFilters {
            name: non_empty(name),
            episode: non_empty(code),
            page: current.page,
        };
        if edited != current {
            self.filters.update_with(|f: &mut EpisodeFilters| *f = edited);
        }
        if action.clear {
            self.episodes.show_all(&mut self.filters);
        } else if action.submit {
            let filters = self.filters.get::<EpisodeFilters>().compact();
            self.episodes.search(filters);
        }
    }

    fn ui_location_filters(&mut self, ui: &mut eg::Ui) {
        let current = self.filters.get::<LocationFilters>().clone();
        let mut name = current.name.clone().unwrap_or_default();
        let mut kind = current.kind.clone().unwrap_or_default();
        let mut dimension = current.dimension.clone().unwrap_or_default();
        let mut action = FormAction::default();

        ui.horizontal_wrapped(|ui| {
            text_field(ui, &mut name, "Name…", 140.0, &mut action);
            text_field(ui, &mut kind, "Type, e.g. Planet", 120.0, &mut action);
            text_field(ui, &mut dimension, "Dimension…", 140.0, &mut action);
            form_buttons(ui, &mut action);
        });

        let edited = LocationFilters {
            name: non_empty(name),
            kind: non_empty(kind),
            dimension: non_empty(dimension),
            page: current.page,
        };
        if edited != current {
            self.filters.update_with(|f: &mut LocationFilters| *f = edited);
        }
        if action.clear {
            self.locations.show_all(&mut self.filters);
        } else if action.submit {
            let filters = self.filters.get::<LocationFilters>().compact();
            self.locations.search(filters);
        }
    }
}
