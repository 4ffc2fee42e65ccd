// src/api/testing.rs — canned transport and JSON fixtures for unit tests
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use super::{ApiError, Result, Transport};

/// Serves canned responses keyed by exact URL and records every request.
/// A URL can be gated so its response is held until the test releases it.
#[derive(Default)]
pub(crate) struct MockTransport {
    routes: Mutex<HashMap<String, (u16, String)>>,
    gates: Mutex<HashMap<String, Receiver<()>>>,
    requests: Mutex<Vec<String>>,
}

impl MockTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn respond(&self, url: &str, status: u16, body: String) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, body));
    }

    /// Hold the next request for `url` until the returned sender fires (or is dropped).
    pub(crate) fn gate(&self, url: &str) -> Sender<()> {
        let (tx, rx) = mpsc::channel();
        self.gates.lock().unwrap().insert(url.to_string(), rx);
        tx
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    fn get(&self, url: &str) -> Result<String> {
        self.requests.lock().unwrap().push(url.to_string());

        let gate = self.gates.lock().unwrap().remove(url);
        if let Some(rx) = gate {
            let _ = rx.recv();
        }

        let route = self.routes.lock().unwrap().get(url).cloned();
        match route {
            Some((status, body)) if (200..300).contains(&status) => Ok(body),
            Some((status, _)) => {
                let text = reqwest::StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or_default();
                Err(ApiError::fetch_failed(status, text))
            }
            None => Err(ApiError::Transport {
                url: url.to_string(),
                message: "no canned response".into(),
            }),
        }
    }
}

pub(crate) fn character_json(id: u32, name: &str) -> String {
    serde_json::json!({
        "id": id,
        "name": name,
        "status": "Alive",
        "species": "Human",
        "type": "",
        "gender": "Male",
        "origin": {"name": "Earth (C-137)", "url": "https://rickandmortyapi.com/api/location/1"},
        "location": {"name": "Citadel of Ricks", "url": "https://rickandmortyapi.com/api/location/3"},
        "image": format!("https://rickandmortyapi.com/api/character/avatar/{id}.jpeg"),
        "episode": [
            "https://rickandmortyapi.com/api/episode/1",
            "https://rickandmortyapi.com/api/episode/2"
        ],
        "url": format!("https://rickandmortyapi.com/api/character/{id}"),
        "created": "2017-11-04T18:48:46.250Z"
    })
    .to_string()
}

pub(crate) fn episode_json(id: u32, name: &str, code: &str) -> String {
    serde_json::json!({
        "id": id,
        "name": name,
        "air_date": "December 2, 2013",
        "episode": code,
        "characters": ["https://rickandmortyapi.com/api/character/1"],
        "url": format!("https://rickandmortyapi.com/api/episode/{id}"),
        "created": "2017-11-10T12:56:33.798Z"
    })
    .to_string()
}

pub(crate) fn location_json(id: u32, name: &str) -> String {
    serde_json::json!({
        "id": id,
        "name": name,
        "type": "Planet",
        "dimension": "Dimension C-137",
        "residents": ["https://rickandmortyapi.com/api/character/38"],
        "url": format!("https://rickandmortyapi.com/api/location/{id}"),
        "created": "2017-11-10T12:42:04.162Z"
    })
    .to_string()
}

pub(crate) fn page_json(results: &[String], count: u32, pages: u32, next: Option<&str>) -> String {
    let next = next.map_or_else(|| "null".to_string(), |n| format!("\"{n}\""));
    format!(
        "{{\"info\":{{\"count\":{count},\"pages\":{pages},\"next\":{next},\"prev\":null}},\"results\":[{}]}}",
        results.join(",")
    )
}
