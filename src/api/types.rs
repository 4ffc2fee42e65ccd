// src/api/types.rs
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::filters::{CharacterFilters, EpisodeFilters, LocationFilters, QueryFilters};

// ---- resource kinds ----
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Character,
    Episode,
    Location,
}

impl ResourceKind {
    pub const ALL: [Self; 3] = [Self::Character, Self::Episode, Self::Location];

    /// Path segment under the API base; also the key used in persisted filters.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Episode => "episode",
            Self::Location => "location",
        }
    }

    pub const fn plural_title(self) -> &'static str {
        match self {
            Self::Character => "Characters",
            Self::Episode => "Episodes",
            Self::Location => "Locations",
        }
    }

    /// Wording used when a query matches nothing (the source answers 404).
    pub const fn not_found_message(self) -> &'static str {
        match self {
            Self::Character => "That character does not exist in the Rick&Morty universe",
            Self::Episode => "The episode does not exist",
            Self::Location => "That location does not exist in the Rick&Morty universe",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown resource kind `{0}` (expected character, episode or location)")]
pub struct UnknownKind(pub String);

/// Accepts the path segment or its plural, case-insensitively.
impl FromStr for ResourceKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "character" | "characters" => Ok(Self::Character),
            "episode" | "episodes" => Ok(Self::Episode),
            "location" | "locations" => Ok(Self::Location),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}

/// A record type served by one of the catalog endpoints.
pub trait Resource: DeserializeOwned + Clone + Send + 'static {
    type Filters: QueryFilters;
    const KIND: ResourceKind;

    fn id(&self) -> u32;
    fn name(&self) -> &str;
}

// ---- page envelope ----
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct PageInfo {
    pub count: u32,
    pub pages: u32,
    pub next: Option<String>,
    pub prev: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PageEnvelope<T> {
    pub info: PageInfo,
    pub results: Vec<T>,
}

impl<T> PageEnvelope<T> {
    pub fn is_last(&self) -> bool {
        self.info.next.is_none()
    }
}

// ---- enums that tolerate values we don't know about ----
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CharacterStatus {
    Alive,
    Dead,
    Unknown,
}

impl CharacterStatus {
    pub const ALL: [Self; 3] = [Self::Alive, Self::Dead, Self::Unknown];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alive => "Alive",
            Self::Dead => "Dead",
            Self::Unknown => "unknown",
        }
    }
}

impl From<String> for CharacterStatus {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "alive" => Self::Alive,
            "dead" => Self::Dead,
            _ => Self::Unknown,
        }
    }
}

impl From<CharacterStatus> for String {
    fn from(s: CharacterStatus) -> Self {
        s.as_str().to_string()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Gender {
    Female,
    Male,
    Genderless,
    Unknown,
}

impl Gender {
    pub const ALL: [Self; 4] = [Self::Female, Self::Male, Self::Genderless, Self::Unknown];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Female => "Female",
            Self::Male => "Male",
            Self::Genderless => "Genderless",
            Self::Unknown => "unknown",
        }
    }
}

impl From<String> for Gender {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "female" => Self::Female,
            "male" => Self::Male,
            "genderless" => Self::Genderless,
            _ => Self::Unknown,
        }
    }
}

impl From<Gender> for String {
    fn from(g: Gender) -> Self {
        g.as_str().to_string()
    }
}

// ---- records ----
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct LocationRef {
    pub name: String,
    pub url: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Character {
    pub id: u32,
    pub name: String,
    pub status: CharacterStatus,
    pub species: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub gender: Gender,
    pub origin: LocationRef,
    pub location: LocationRef,
    pub image: String,
    pub episode: Vec<String>,
    pub url: String,
    pub created: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Episode {
    pub id: u32,
    pub name: String,
    pub air_date: String,
    /// Season/episode code such as `S01E01`.
    pub episode: String,
    pub characters: Vec<String>,
    pub url: String,
    pub created: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Location {
    pub id: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub dimension: String,
    pub residents: Vec<String>,
    pub url: String,
    pub created: String,
}

fn parse_created(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl Character {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_created(&self.created)
    }
}

impl Episode {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_created(&self.created)
    }
}

impl Location {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_created(&self.created)
    }
}

impl Resource for Character {
    type Filters = CharacterFilters;
    const KIND: ResourceKind = ResourceKind::Character;

    fn id(&self) -> u32 {
        self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
}

impl Resource for Episode {
    type Filters = EpisodeFilters;
    const KIND: ResourceKind = ResourceKind::Episode;

    fn id(&self) -> u32 {
        self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
}

impl Resource for Location {
    type Filters = LocationFilters;
    const KIND: ResourceKind = ResourceKind::Location;

    fn id(&self) -> u32 {
        self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
}
