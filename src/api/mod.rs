// src/api/mod.rs — blocking client for the Rick and Morty REST catalog
use std::sync::Arc;
use std::time::Duration;

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

pub mod error;
pub mod filters;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ApiError, Result};
pub use filters::{CharacterFilters, EpisodeFilters, LocationFilters, QueryFilters};
pub use types::{
    Character, CharacterStatus, Episode, Gender, Location, LocationRef, PageEnvelope, PageInfo,
    Resource, ResourceKind, UnknownKind,
};

pub const DEFAULT_BASE_URL: &str = "https://rickandmortyapi.com/api";

static TRAILING_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/(character|episode|location)/(\d+)/?$").expect("trailing id pattern")
});

/// Pull the numeric id off a cross-reference such as `.../api/character/42`.
/// Returns `None` when the URL points at a different kind or has no id.
pub fn extract_id_from_url(kind: ResourceKind, url: &str) -> Option<u32> {
    let caps = TRAILING_ID.captures(url.trim())?;
    if &caps[1] != kind.as_str() {
        return None;
    }
    caps[2].parse().ok()
}

pub fn extract_ids_from_urls(kind: ResourceKind, urls: &[String]) -> Vec<u32> {
    urls.iter()
        .filter_map(|u| extract_id_from_url(kind, u))
        .collect()
}

fn query_string(pairs: &[(&'static str, String)]) -> String {
    if pairs.is_empty() {
        return String::new();
    }
    let joined = pairs
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .join("&");
    format!("?{joined}")
}

// ---- transport seam ----

/// Performs one GET and hands back the body of a successful response.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str) -> Result<String>;
}

pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("rmx/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .default_headers({
                use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
                let mut h = HeaderMap::new();
                h.insert(ACCEPT, HeaderValue::from_static("application/json"));
                h
            })
            .build()
            .map_err(|e| ApiError::Transport {
                url: String::new(),
                message: format!("http client: {e}"),
            })?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<String> {
        let resp = self.client.get(url).send().map_err(|e| ApiError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::fetch_failed(
                status.as_u16(),
                status.canonical_reason().unwrap_or_default(),
            ));
        }
        resp.text().map_err(|e| ApiError::Transport {
            url: url.to_string(),
            message: format!("read body: {e}"),
        })
    }
}

// ---- client ----

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct CatalogClient {
    base_url: String,
    transport: Arc<dyn Transport>,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            transport,
        }
    }

    pub fn with_http(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let transport = HttpTransport::new(timeout)?;
        Ok(Self::new(base_url, Arc::new(transport)))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/{kind}[/{suffix}][?query]`
    pub fn endpoint_url(
        &self,
        kind: ResourceKind,
        suffix: Option<&str>,
        pairs: &[(&'static str, String)],
    ) -> String {
        let mut url = format!("{}/{}", self.base_url, kind.as_str());
        if let Some(s) = suffix {
            url.push('/');
            url.push_str(s);
        }
        url.push_str(&query_string(pairs));
        url
    }

    fn get_json<D: DeserializeOwned>(&self, url: &str) -> Result<D> {
        debug!("GET {url}");
        let body = self.transport.get(url)?;
        serde_json::from_str(&body).map_err(|source| ApiError::DecodeFailed {
            url: url.to_string(),
            source,
        })
    }

    /// One page of a listing. The page number travels inside `filters`.
    pub fn list<T: Resource>(&self, filters: &T::Filters) -> Result<PageEnvelope<T>> {
        let url = self.endpoint_url(T::KIND, None, &filters.query_pairs());
        self.get_json(&url)
    }

    pub fn get_by_id<T: Resource>(&self, id: u32) -> Result<T> {
        let url = self.endpoint_url(T::KIND, Some(&id.to_string()), &[]);
        self.get_json(&url)
    }

    /// Batch lookup in a single request. The source answers a one-id batch
    /// with a bare object; that is normalized to a one-element vector.
    pub fn get_many_by_ids<T: Resource>(&self, ids: &[u32]) -> Result<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = ids.iter().join(",");
        let url = self.endpoint_url(T::KIND, Some(&joined), &[]);
        Ok(match self.get_json::<OneOrMany<T>>(&url)? {
            OneOrMany::Many(v) => v,
            OneOrMany::One(item) => vec![item],
        })
    }

    /// Follow an absolute cross-reference URL as-is.
    pub fn get_by_url<T: Resource>(&self, url: &str) -> Result<T> {
        self.get_json(url)
    }

    /// Batch lookup from cross-reference URLs; URLs without a matching id are skipped.
    pub fn get_many_by_urls<T: Resource>(&self, urls: &[String]) -> Result<Vec<T>> {
        let ids = extract_ids_from_urls(T::KIND, urls);
        self.get_many_by_ids(&ids)
    }

    /// First page of a name search; a query that matches nothing yields an empty list.
    pub fn search_by_name<T: Resource>(&self, name: &str) -> Result<Vec<T>> {
        let url = self.endpoint_url(T::KIND, None, &[("name", name.to_string())]);
        match self.get_json::<PageEnvelope<T>>(&url) {
            Ok(page) => Ok(page.results),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}
