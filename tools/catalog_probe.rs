use std::env;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rmx::api::{
    CatalogClient, Character, CharacterFilters, Episode, EpisodeFilters, Location,
    LocationFilters, Resource, ResourceKind,
};
use rmx::app::favorites::Favorites;
use rmx::app::loader::IncrementalLoader;
use rmx::app::store::SqliteStore;
use rmx::config::load_config;

const USAGE: &str = "Usage: cargo run --bin catalog_probe <character|episode|location> [name] [--pages N]
       cargo run --bin catalog_probe <character|episode|location> --ids 1,2,3
       cargo run --bin catalog_probe <character|episode|location> --find NAME
       cargo run --bin catalog_probe favorites";

/// Page through a listing the same way the GUI does and print every row.
fn run_listing<T: Resource>(
    client: CatalogClient,
    filters: T::Filters,
    pages: u32,
    timeout: Duration,
) -> Result<(), String> {
    let mut loader = IncrementalLoader::<T>::new(client);
    loader.search_with_filters(filters);
    let mut printed = 0usize;

    for page in 1..=pages.max(1) {
        if page > 1 && !loader.load_more() {
            break;
        }
        if !loader.wait_idle(timeout) {
            return Err("timed out waiting for the catalog".into());
        }
        if let Some(err) = loader.error() {
            return Err(err.message.clone());
        }
        for item in &loader.items()[printed..] {
            println!("{:>5}  {}", item.id(), item.name());
        }
        printed = loader.items().len();
    }

    let st = loader.state();
    println!(
        "--- {} of {} {} (page {}/{}) ---",
        st.items.len(),
        st.total,
        T::KIND.plural_title().to_lowercase(),
        st.current_page,
        st.total_pages
    );
    Ok(())
}

fn run_ids<T: Resource>(client: &CatalogClient, ids: &[u32]) -> Result<(), String> {
    let items = client.get_many_by_ids::<T>(ids).map_err(|e| e.to_string())?;
    for item in &items {
        println!("{:>5}  {}", item.id(), item.name());
    }
    println!("--- {} of {} requested ---", items.len(), ids.len());
    Ok(())
}

/// First page of a name search; no match is an empty answer, not an error.
fn run_find<T: Resource>(client: &CatalogClient, name: &str) -> Result<(), String> {
    let items = client.search_by_name::<T>(name).map_err(|e| e.to_string())?;
    if items.is_empty() {
        println!("no {} named `{name}`", T::KIND.plural_title().to_lowercase());
    }
    for item in &items {
        println!("{:>5}  {}", item.id(), item.name());
    }
    Ok(())
}

fn parse_ids(raw: &str) -> Result<Vec<u32>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u32>().map_err(|_| format!("bad id `{s}`")))
        .collect()
}

fn run(args: &[String]) -> Result<(), String> {
    let cfg = load_config();

    if args.first().map(String::as_str) == Some("favorites") {
        let store = SqliteStore::open(&cfg.state_db_path()).map_err(|e| e.to_string())?;
        let favorites = Favorites::open(std::sync::Arc::new(store));
        println!("{} favorite(s): {:?}", favorites.count(), favorites.ids());
        return Ok(());
    }

    let kind = args
        .first()
        .and_then(|a| a.parse::<ResourceKind>().ok())
        .ok_or_else(|| USAGE.to_string())?;

    let name = args
        .get(1)
        .filter(|a| !a.starts_with("--"))
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty());
    let pages: u32 = match args.iter().position(|a| a == "--pages") {
        Some(i) => args
            .get(i + 1)
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| "--pages needs a number".to_string())?,
        None => 1,
    };
    let ids = match args.iter().position(|a| a == "--ids") {
        Some(i) => Some(parse_ids(args.get(i + 1).map_or("", String::as_str))?),
        None => None,
    };

    let find = match args.iter().position(|a| a == "--find") {
        Some(i) => Some(
            args.get(i + 1)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| "--find needs a name".to_string())?,
        ),
        None => None,
    };

    let client = CatalogClient::with_http(cfg.api_base_url.clone(), cfg.request_timeout)
        .map_err(|e| e.to_string())?;
    info!("Probing {} at {}", kind.as_str(), client.base_url());
    let timeout = cfg.request_timeout * 2;

    if let Some(name) = find {
        return match kind {
            ResourceKind::Character => run_find::<Character>(&client, &name),
            ResourceKind::Episode => run_find::<Episode>(&client, &name),
            ResourceKind::Location => run_find::<Location>(&client, &name),
        };
    }

    if let Some(ids) = ids {
        return match kind {
            ResourceKind::Character => run_ids::<Character>(&client, &ids),
            ResourceKind::Episode => run_ids::<Episode>(&client, &ids),
            ResourceKind::Location => run_ids::<Location>(&client, &ids),
        };
    }

    match kind {
        ResourceKind::Character => run_listing::<Character>(
            client,
            CharacterFilters {
                name,
                ..Default::default()
            },
            pages,
            timeout,
        ),
        ResourceKind::Episode => run_listing::<Episode>(
            client,
            EpisodeFilters {
                name,
                ..Default::default()
            },
            pages,
            timeout,
        ),
        ResourceKind::Location => run_listing::<Location>(
            client,
            LocationFilters {
                name,
                ..Default::default()
            },
            pages,
            timeout,
        ),
    }
}

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("{USAGE}");
        std::process::exit(1);
    }
    if let Err(e) = run(&args) {
        error!("{e}");
        eprintln!("{e}");
        std::process::exit(1);
    }
}
