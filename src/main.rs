// src/main.rs
use std::env;
use std::sync::Arc;

use eframe::egui as eg;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rmx::api::CatalogClient;
use rmx::app::store::{KeyValueStore, MemoryStore, SqliteStore};
use rmx::app::ExplorerApp;
use rmx::config::{load_config, AppConfig};

fn pick_renderer() -> eframe::Renderer {
    match env::var("RMX_RENDERER").as_deref() {
        Ok("glow") => eframe::Renderer::Glow,
        Ok("wgpu") => eframe::Renderer::Wgpu,
        _ => {
            // Default: Windows = WGPU (DX12), Others = Glow (GL)
            #[cfg(target_os = "windows")]
            { eframe::Renderer::Wgpu }
            #[cfg(not(target_os = "windows"))]
            { eframe::Renderer::Glow }
        }
    }
}

/// Favorites and filters survive restarts only with a working database.
fn open_store(cfg: &AppConfig) -> Arc<dyn KeyValueStore> {
    let path = cfg.state_db_path();
    match SqliteStore::open(&path) {
        Ok(store) => {
            info!("State DB: {}", path.display());
            Arc::new(store)
        }
        Err(e) => {
            warn!("Cannot open {} ({e}); favorites and filters won't persist.", path.display());
            Arc::new(MemoryStore::default())
        }
    }
}

fn main() -> eframe::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();

    #[cfg(target_os = "linux")]
    {
        info!("XDG_SESSION_TYPE={:?}", env::var_os("XDG_SESSION_TYPE"));
        info!("WAYLAND_DISPLAY={:?}", env::var_os("WAYLAND_DISPLAY"));
        info!("DISPLAY={:?}", env::var_os("DISPLAY"));
    }

    let cfg = load_config();
    let store = open_store(&cfg);
    let client = match CatalogClient::with_http(cfg.api_base_url.clone(), cfg.request_timeout) {
        Ok(c) => c,
        Err(e) => {
            error!("HTTP client setup failed: {e}");
            std::process::exit(1);
        }
    };

    let options = eframe::NativeOptions {
        renderer: pick_renderer(),
        multisampling: 0,
        viewport: eg::ViewportBuilder::default()
            .with_title("Rick & Morty Explorer")
            .with_inner_size([1280.0, 820.0])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    };

    match eframe::run_native(
        "Rick & Morty Explorer",
        options,
        Box::new(move |cc| Ok(Box::new(ExplorerApp::new(&cc.egui_ctx, cfg, client, store)))),
    ) {
        Ok(_) => Ok(()),
        Err(e) => {
            error!("eframe failed to start: {e:?}");
            error!("Hint: try RMX_RENDERER=wgpu or RMX_RENDERER=glow.");
            Err(e)
        }
    }
}
