// src/app/avatars.rs
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use eframe::egui::{self as eg, ColorImage, TextureHandle};
use tracing::{info, warn};

use super::cache;
use super::loader::RepaintHook;

/// Completions applied per [`AvatarCache::poll`] call.
pub const MAX_DONE_PER_FRAME: usize = 64;
/// Texture uploads allowed per frame.
pub const MAX_UPLOADS_PER_FRAME: usize = 6;

enum Slot {
    Queued,
    OnDisk(PathBuf),
    Ready(TextureHandle),
    Failed,
}

struct AvatarJob {
    url: String,
    key: String,
}

struct AvatarDone {
    url: String,
    result: Result<PathBuf, String>,
}

/// Character images: disk cache first, then a small download pool.
/// Textures are created lazily on the UI thread.
pub struct AvatarCache {
    dir: PathBuf,
    max_w: u32,
    workers: usize,
    timeout: Duration,
    slots: HashMap<String, Slot>,
    work_tx: Option<Sender<AvatarJob>>,
    done_rx: Option<Receiver<AvatarDone>>,
    started: bool,
    disabled: bool,
    on_complete: Option<RepaintHook>,
}

impl AvatarCache {
    pub fn new(dir: PathBuf, max_w: u32, workers: usize, timeout: Duration) -> Self {
        Self {
            dir,
            max_w,
            workers: workers.max(1),
            timeout,
            slots: HashMap::new(),
            work_tx: None,
            done_rx: None,
            started: false,
            disabled: false,
            on_complete: None,
        }
    }

    pub fn with_repaint(mut self, hook: RepaintHook) -> Self {
        self.on_complete = Some(hook);
        self
    }

    /// Drop stale files. Called once at startup.
    pub fn prune(&self) {
        match cache::prune_expired(&self.dir) {
            Ok(0) => {}
            Ok(n) => info!("Pruned {n} cached avatar(s)"),
            Err(e) => warn!("avatar cache prune failed: {e}"),
        }
    }

    fn start_workers(&mut self) {
        self.started = true;
        let client = match reqwest::blocking::Client::builder()
            .user_agent(concat!("rmx/", env!("CARGO_PKG_VERSION"), " avatars"))
            .timeout(self.timeout)
            .pool_max_idle_per_host(self.workers)
            .default_headers({
                use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
                let mut h = HeaderMap::new();
                h.insert(
                    ACCEPT,
                    HeaderValue::from_static("image/avif,image/webp,image/*;q=0.8,*/*;q=0.5"),
                );
                h
            })
            .build()
        {
            Ok(c) => Arc::new(c),
            Err(e) => {
                warn!("avatar http client build failed: {e}; avatars disabled");
                self.disabled = true;
                return;
            }
        };

        let (work_tx, work_rx) = mpsc::channel::<AvatarJob>();
        let (done_tx, done_rx) = mpsc::channel::<AvatarDone>();
        self.work_tx = Some(work_tx);
        self.done_rx = Some(done_rx);
        let work_rx = Arc::new(Mutex::new(work_rx));

        for _ in 0..self.workers {
            let work_rx = Arc::clone(&work_rx);
            let done_tx = done_tx.clone();
            let client = Arc::clone(&client);
            let dir = self.dir.clone();
            let max_w = self.max_w;
            let hook = self.on_complete.clone();

            std::thread::spawn(move || loop {
                let job = match work_rx.lock() {
                    Ok(rx) => rx.recv(),
                    Err(_) => break,
                };
                let Ok(AvatarJob { url, key }) = job else {
                    break;
                };
                let result = cache::download_and_store_resized(&client, &dir, &url, &key, max_w);
                if done_tx.send(AvatarDone { url, result }).is_err() {
                    break;
                }
                if let Some(hook) = &hook {
                    hook();
                }
            });
        }
    }

    /// Make sure `url` is cached or on its way. Cheap to call every frame.
    pub fn request(&mut self, url: &str) {
        if url.is_empty() || self.slots.contains_key(url) {
            return;
        }
        let key = cache::url_to_cache_key(url);
        if let Some(path) = cache::find_cached(&self.dir, &key) {
            self.slots.insert(url.to_string(), Slot::OnDisk(path));
            return;
        }
        if !self.started {
            self.start_workers();
        }
        let sent = !self.disabled
            && self.work_tx.as_ref().is_some_and(|tx| {
                tx.send(AvatarJob {
                    url: url.to_string(),
                    key,
                })
                .is_ok()
            });
        let slot = if sent { Slot::Queued } else { Slot::Failed };
        self.slots.insert(url.to_string(), slot);
    }

    pub fn poll(&mut self) -> usize {
        let mut drained = 0usize;
        while drained < MAX_DONE_PER_FRAME {
            let Some(rx) = &self.done_rx else {
                break;
            };
            let Ok(msg) = rx.try_recv() else {
                break;
            };
            drained += 1;
            let slot = match msg.result {
                Ok(path) => Slot::OnDisk(path),
                Err(e) => {
                    warn!("avatar download failed: {e}");
                    Slot::Failed
                }
            };
            self.slots.insert(msg.url, slot);
        }
        drained
    }

    /// Texture for `url` if ready. Uploads from disk while `uploads_left` allows.
    pub fn texture(
        &mut self,
        ctx: &eg::Context,
        url: &str,
        uploads_left: &mut usize,
    ) -> Option<TextureHandle> {
        let slot = self.slots.get_mut(url)?;
        match slot {
            Slot::Ready(tex) => Some(tex.clone()),
            Slot::OnDisk(path) if *uploads_left > 0 => {
                *uploads_left -= 1;
                match cache::load_rgba(path) {
                    Ok((w, h, bytes)) => {
                        let img =
                            ColorImage::from_rgba_unmultiplied([w as usize, h as usize], &bytes);
                        let tex = ctx.load_texture(
                            format!("avatar:{url}"),
                            img,
                            eg::TextureOptions::LINEAR,
                        );
                        *slot = Slot::Ready(tex.clone());
                        Some(tex)
                    }
                    Err(e) => {
                        warn!("avatar load failed: {e}");
                        *slot = Slot::Failed;
                        None
                    }
                }
            }
            Slot::OnDisk(_) | Slot::Queued | Slot::Failed => None,
        }
    }

    pub fn pending(&self) -> usize {
        self.slots
            .values()
            .filter(|s| matches!(s, Slot::Queued))
            .count()
    }
}
