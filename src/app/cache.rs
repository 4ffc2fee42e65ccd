use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageFormat};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub const AVATAR_RETENTION: Duration = Duration::from_secs(14 * 24 * 60 * 60);

pub fn url_to_cache_key(url: &str) -> String {
    format!("{:x}", md5::compute(url.as_bytes()))
}

pub fn avatar_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.png"))
}

pub fn find_cached(dir: &Path, key: &str) -> Option<PathBuf> {
    let p = avatar_path(dir, key);
    match fs::metadata(&p) {
        Ok(m) if m.len() > 0 => Some(p),
        _ => None,
    }
}

/// Delete cached images last modified before `cutoff`, plus leftover
/// `.part` files. Only the top level of `dir` is walked.
pub fn prune_avatar_cache(dir: &Path, cutoff: SystemTime) -> std::io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut removed = 0usize;
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_ascii_lowercase());
        let stale = match ext.as_deref() {
            Some("part") => true,
            Some("png" | "jpg" | "jpeg" | "webp") => {
                let modified = entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                modified < cutoff
            }
            _ => false,
        };
        if stale {
            if let Err(e) = fs::remove_file(path) {
                warn!("failed to prune {}: {e}", path.display());
                continue;
            }
            removed += 1;
        }
    }
    Ok(removed)
}

pub fn prune_expired(dir: &Path) -> std::io::Result<usize> {
    let cutoff = SystemTime::now()
        .checked_sub(AVATAR_RETENTION)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    prune_avatar_cache(dir, cutoff)
}

/// Shrink to `max_width` (keeping aspect) and write `<dir>/<key>.png`.
pub fn store_resized(
    dir: &Path,
    key: &str,
    img: &DynamicImage,
    max_width: u32,
) -> Result<PathBuf, String> {
    let (w, h) = img.dimensions();
    let out = if w > max_width {
        let new_h = ((h as f32) * (max_width as f32 / w as f32))
            .round()
            .max(1.0) as u32;
        img.resize_exact(max_width, new_h, FilterType::CatmullRom)
    } else {
        img.clone()
    };

    let mut png_bytes: Vec<u8> = Vec::new();
    out.write_to(&mut std::io::Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| format!("encode png: {e}"))?;

    fs::create_dir_all(dir).map_err(|e| format!("create {}: {e}", dir.display()))?;
    let dest = avatar_path(dir, key);
    let tmp = dest.with_extension("png.part");
    {
        let mut f = fs::File::create(&tmp).map_err(|e| format!("create tmp: {e}"))?;
        f.write_all(&png_bytes).map_err(|e| format!("write: {e}"))?;
    }
    fs::rename(&tmp, &dest).map_err(|e| format!("rename: {e}"))?;
    Ok(dest)
}

/// Download with a shared client and store a resized PNG.
/// Returns the existing file untouched if it is already cached.
pub fn download_and_store_resized(
    client: &reqwest::blocking::Client,
    dir: &Path,
    url: &str,
    key: &str,
    max_width: u32,
) -> Result<PathBuf, String> {
    if let Some(p) = find_cached(dir, key) {
        return Ok(p);
    }
    let bytes = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .and_then(|r| r.bytes())
        .map_err(|e| format!("download {url}: {e}"))?;
    let img = image::load_from_memory(&bytes).map_err(|e| format!("decode {url}: {e}"))?;
    let path = store_resized(dir, key, &img, max_width)?;
    debug!("cached avatar {}", path.display());
    Ok(path)
}

/// (width, height, RGBA8 bytes)
pub fn load_rgba(path: &Path) -> Result<(u32, u32, Vec<u8>), String> {
    let img = image::ImageReader::open(path)
        .map_err(|e| format!("open image {}: {e}", path.display()))?
        .with_guessed_format()
        .map_err(|e| format!("guess format {}: {e}", path.display()))?
        .decode()
        .map_err(|e| format!("decode {}: {e}", path.display()))?;
    let (w, h) = img.dimensions();
    Ok((w, h, img.to_rgba8().into_raw()))
}
