// src/app/ui/mod.rs
pub mod grid;
pub mod topbar;

use eframe::egui as eg;

use super::filters::{FilterSlot, FilterState};
use super::Listing;
use crate::api::{CharacterStatus, Resource};

pub const ERROR_RED: eg::Color32 = eg::Color32::from_rgb(230, 110, 110);

pub fn status_color(status: CharacterStatus) -> eg::Color32 {
    match status {
        CharacterStatus::Alive => eg::Color32::from_rgb(85, 204, 68),
        CharacterStatus::Dead => eg::Color32::from_rgb(214, 61, 46),
        CharacterStatus::Unknown => eg::Color32::from_gray(158),
    }
}

/// `None` for an empty text box.
pub(crate) fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Combo box over an enum where `None` means "any".
pub(crate) fn option_combo<T: Copy + PartialEq>(
    ui: &mut eg::Ui,
    id: &str,
    any_label: &str,
    value: &mut Option<T>,
    choices: &[T],
    label: impl Fn(T) -> &'static str,
) -> bool {
    let mut changed = false;
    let selected: &str = match *value {
        Some(v) => label(v),
        None => any_label,
    };
    eg::ComboBox::from_id_source(id)
        .selected_text(selected)
        .show_ui(ui, |ui| {
            changed |= ui.selectable_value(value, None, any_label).clicked();
            for &choice in choices {
                changed |= ui
                    .selectable_value(value, Some(choice), label(choice))
                    .clicked();
            }
        });
    changed
}

/// Full-page error for a failed search. Returns true if it took the page.
/// A failed next page is not shown here; the footer handles it.
pub(crate) fn render_error_panel<T: Resource>(
    ui: &mut eg::Ui,
    listing: &mut Listing<T>,
    filters: &mut FilterState,
) -> bool
where
    T::Filters: FilterSlot,
{
    let Some(err) = listing.loader.error().cloned() else {
        return false;
    };
    if err.during_load_more() {
        return false;
    }
    let plural = T::KIND.plural_title();
    ui.vertical_centered(|ui| {
        ui.add_space(40.0);
        if err.not_found {
            ui.heading(format!("No {plural} Found"));
            ui.label(&err.message);
            ui.add_space(8.0);
            if ui.button(format!("Back to All {plural}")).clicked() {
                listing.show_all(filters);
            }
        } else {
            ui.heading(eg::RichText::new(format!("Error Loading {plural}")).color(ERROR_RED));
            ui.label(&err.message);
            ui.add_space(8.0);
            if ui.button("Try Again").clicked() {
                listing.loader.retry();
            }
        }
    });
    true
}

/// Everything under the last card: spinner, end marker, load-more
/// failure, and the sentinel the proximity trigger watches.
pub(crate) fn render_footer<T: Resource>(
    ui: &mut eg::Ui,
    listing: &mut Listing<T>,
    viewport: eg::Rect,
) {
    listing.sync_trigger();
    let st = listing.loader.state();
    let (loading, loading_more, has_more, count) =
        (st.loading, st.loading_more, st.has_more, st.items.len());
    let load_more_error = st
        .error
        .as_ref()
        .filter(|e| e.during_load_more())
        .map(|e| e.message.clone());

    ui.add_space(12.0);
    ui.vertical_centered(|ui| {
        if loading {
            ui.add(eg::Spinner::new().size(22.0));
            ui.label(format!("Loading {}…", T::KIND.plural_title().to_lowercase()));
        } else if let Some(message) = load_more_error {
            ui.colored_label(ERROR_RED, format!("Couldn't load more: {message}"));
            if ui.button("Try again").clicked() {
                listing.loader.retry();
            }
        } else if loading_more {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Loading more…");
            });
        } else if has_more {
            if ui.button("Load more").clicked() {
                listing.loader.load_more();
            }
        } else if count > 0 {
            ui.label(eg::RichText::new("You've reached the end").weak());
        }
    });

    let (sentinel, _) = ui.allocate_exact_size(eg::vec2(ui.available_width(), 1.0), eg::Sense::hover());
    listing.trigger.observe(sentinel, viewport);
    ui.add_space(12.0);
}
