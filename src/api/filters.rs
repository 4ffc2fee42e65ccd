// src/api/filters.rs
use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::types::{CharacterStatus, Gender};

/// Sparse listing predicates. `None` means "no constraint"; `Some("")` is a
/// real constraint and is sent as an empty parameter.
pub trait QueryFilters:
    Clone + Default + PartialEq + Debug + Send + Serialize + DeserializeOwned + 'static
{
    /// One `(name, value)` pair per field that is set, in declaration order.
    fn query_pairs(&self) -> Vec<(&'static str, String)>;

    fn page(&self) -> Option<u32>;

    fn with_page(&self, page: u32) -> Self;

    /// Shallow merge: every field set in `patch` overwrites ours.
    fn merge(&mut self, patch: &Self);

    /// Copy with blank text fields dropped, as submitted from a search form.
    fn compact(&self) -> Self;
}

fn set_text(out: &mut Vec<(&'static str, String)>, key: &'static str, v: &Option<String>) {
    if let Some(v) = v {
        out.push((key, v.clone()));
    }
}

fn non_blank(v: &Option<String>) -> Option<String> {
    v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CharacterStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl QueryFilters for CharacterFilters {
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        set_text(&mut out, "name", &self.name);
        if let Some(s) = self.status {
            out.push(("status", s.as_str().to_string()));
        }
        set_text(&mut out, "species", &self.species);
        set_text(&mut out, "type", &self.kind);
        if let Some(g) = self.gender {
            out.push(("gender", g.as_str().to_string()));
        }
        if let Some(p) = self.page {
            out.push(("page", p.to_string()));
        }
        out
    }

    fn page(&self) -> Option<u32> {
        self.page
    }

    fn with_page(&self, page: u32) -> Self {
        Self {
            page: Some(page),
            ..self.clone()
        }
    }

    fn merge(&mut self, patch: &Self) {
        if patch.name.is_some() {
            self.name = patch.name.clone();
        }
        if patch.status.is_some() {
            self.status = patch.status;
        }
        if patch.species.is_some() {
            self.species = patch.species.clone();
        }
        if patch.kind.is_some() {
            self.kind = patch.kind.clone();
        }
        if patch.gender.is_some() {
            self.gender = patch.gender;
        }
        if patch.page.is_some() {
            self.page = patch.page;
        }
    }

    fn compact(&self) -> Self {
        Self {
            name: non_blank(&self.name),
            status: self.status,
            species: non_blank(&self.species),
            kind: non_blank(&self.kind),
            gender: self.gender,
            page: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Episode code, e.g. `S01E01` or a prefix like `S02`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl QueryFilters for EpisodeFilters {
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        set_text(&mut out, "name", &self.name);
        set_text(&mut out, "episode", &self.episode);
        if let Some(p) = self.page {
            out.push(("page", p.to_string()));
        }
        out
    }

    fn page(&self) -> Option<u32> {
        self.page
    }

    fn with_page(&self, page: u32) -> Self {
        Self {
            page: Some(page),
            ..self.clone()
        }
    }

    fn merge(&mut self, patch: &Self) {
        if patch.name.is_some() {
            self.name = patch.name.clone();
        }
        if patch.episode.is_some() {
            self.episode = patch.episode.clone();
        }
        if patch.page.is_some() {
            self.page = patch.page;
        }
    }

    fn compact(&self) -> Self {
        Self {
            name: non_blank(&self.name),
            episode: non_blank(&self.episode),
            page: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl QueryFilters for LocationFilters {
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        set_text(&mut out, "name", &self.name);
        set_text(&mut out, "type", &self.kind);
        set_text(&mut out, "dimension", &self.dimension);
        if let Some(p) = self.page {
            out.push(("page", p.to_string()));
        }
        out
    }

    fn page(&self) -> Option<u32> {
        self.page
    }

    fn with_page(&self, page: u32) -> Self {
        Self {
            page: Some(page),
            ..self.clone()
        }
    }

    fn merge(&mut self, patch: &Self) {
        if patch.name.is_some() {
            self.name = patch.name.clone();
        }
        if patch.kind.is_some() {
            self.kind = patch.kind.clone();
        }
        if patch.dimension.is_some() {
            self.dimension = patch.dimension.clone();
        }
        if patch.page.is_some() {
            self.page = patch.page;
        }
    }

    fn compact(&self) -> Self {
        Self {
            name: non_blank(&self.name),
            kind: non_blank(&self.kind),
            dimension: non_blank(&self.dimension),
            page: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_fields_are_omitted_but_empty_strings_are_sent() {
        let f = CharacterFilters {
            name: Some(String::new()),
            status: Some(CharacterStatus::Dead),
            ..Default::default()
        };
        assert_eq!(
            f.query_pairs(),
            vec![("name", String::new()), ("status", "Dead".to_string())]
        );
        assert!(CharacterFilters::default().query_pairs().is_empty());
    }

    #[test]
    fn with_page_keeps_other_fields() {
        let f = EpisodeFilters {
            episode: Some("S01".into()),
            ..Default::default()
        };
        let p = f.with_page(3);
        assert_eq!(p.episode.as_deref(), Some("S01"));
        assert_eq!(p.page(), Some(3));
        assert_eq!(p.query_pairs().last(), Some(&("page", "3".to_string())));
    }

    #[test]
    fn merge_only_overwrites_set_fields() {
        let mut f = LocationFilters {
            name: Some("Earth".into()),
            dimension: Some("C-137".into()),
            page: Some(1),
            ..Default::default()
        };
        f.merge(&LocationFilters {
            dimension: Some("Replacement Dimension".into()),
            ..Default::default()
        });
        assert_eq!(f.name.as_deref(), Some("Earth"));
        assert_eq!(f.dimension.as_deref(), Some("Replacement Dimension"));
        assert_eq!(f.page, Some(1));
    }

    #[test]
    fn compact_drops_blank_text_and_page() {
        let f = CharacterFilters {
            name: Some("  rick ".into()),
            species: Some("   ".into()),
            gender: Some(Gender::Male),
            page: Some(4),
            ..Default::default()
        };
        let c = f.compact();
        assert_eq!(c.name.as_deref(), Some("rick"));
        assert_eq!(c.species, None);
        assert_eq!(c.gender, Some(Gender::Male));
        assert_eq!(c.page, None);
    }

    #[test]
    fn serialized_form_only_has_defined_fields() {
        let f = CharacterFilters {
            kind: Some("Parasite".into()),
            page: Some(1),
            ..Default::default()
        };
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json, serde_json::json!({"type": "Parasite", "page": 1}));
        let back: CharacterFilters = serde_json::from_value(json).unwrap();
        assert_eq!(back, f);
    }
}
