use std::fs;
use std::hash::Hasher;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use bincode::{Decode, Encode};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use twox_hash::XxHash64;

use crate::chart::Beatmap;
use crate::config;

/// What the library keeps per chart: enough for browsing and picking,
/// without holding every parsed object in memory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct MapSummary {
    pub path: String,
    pub title: String,
    pub artist: String,
    pub creator: String,
    pub version: String,
    pub audio_filename: String,
    pub n_circles: u32,
    pub n_drumrolls: u32,
    pub n_spinners: u32,
}

#[derive(Serialize, Deserialize, Encode, Decode)]
struct CachedMap {
    source_hash: u64,
    data: MapSummary,
}

/// One chart folder under `Songs`, usually one song with several
/// difficulties.
#[derive(Clone, Debug, Default)]
pub struct MapSet {
    pub name: String,
    pub folder: PathBuf,
    pub maps: Vec<MapSummary>,
}

#[derive(Debug, Default)]
pub struct MapLibrary {
    pub sets: Vec<MapSet>,
}

impl MapLibrary {
    pub fn chart_count(&self) -> usize {
        self.sets.iter().map(|set| set.maps.len()).sum()
    }
}

fn content_hash(path: &Path) -> io::Result<u64> {
    let mut file = fs::File::open(path)?;
    let mut hasher = XxHash64::with_seed(0);
    let mut buffer = [0; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.write(&buffer[..bytes_read]);
    }
    Ok(hasher.finish())
}

fn cache_path(chart_path: &Path) -> io::Result<PathBuf> {
    let canonical = chart_path.canonicalize()?;
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(canonical.to_string_lossy().as_bytes());
    let file_name = format!("{:x}.bin", hasher.finish());
    Ok(Path::new(config::MAP_CACHE_DIR).join(file_name))
}

fn summarize(map: &Beatmap, path: &Path) -> MapSummary {
    let objects = map.objects();
    MapSummary {
        path: path.to_string_lossy().into_owned(),
        title: map.metadata.title.clone(),
        artist: map.metadata.artist.clone(),
        creator: map.metadata.creator.clone(),
        version: map.metadata.version.clone(),
        audio_filename: map.audio_filename.clone(),
        n_circles: objects.iter().filter(|o| o.is_circle()).count() as u32,
        n_drumrolls: objects.iter().filter(|o| o.is_drumroll()).count() as u32,
        n_spinners: objects.iter().filter(|o| o.is_spinner()).count() as u32,
    }
}

fn read_cached(cache_file: &Path, source_hash: u64) -> Option<MapSummary> {
    let mut file = fs::File::open(cache_file).ok()?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer).ok()?;

    let (cached, _) =
        bincode::decode_from_slice::<CachedMap, _>(&buffer, bincode::config::standard()).ok()?;
    if cached.source_hash == source_hash {
        Some(cached.data)
    } else {
        debug!("Cache stale for {:?}", cache_file);
        None
    }
}

fn write_cached(cache_file: &Path, source_hash: u64, data: &MapSummary) {
    let cached = CachedMap {
        source_hash,
        data: data.clone(),
    };
    let Ok(encoded) = bincode::encode_to_vec(&cached, bincode::config::standard()) else {
        warn!("Failed to encode cache entry for {:?}", cache_file);
        return;
    };

    match fs::File::create(cache_file) {
        Ok(mut file) => {
            if file.write_all(&encoded).is_err() {
                warn!("Failed to write cache file {:?}", cache_file);
            }
        }
        Err(e) => warn!("Failed to create cache file {:?}: {}", cache_file, e),
    }
}

/// Parses one chart, going through the cache when allowed. Cache problems
/// only cost time, never a load.
fn load_summary(path: &Path, use_cache: bool) -> Result<MapSummary, crate::chart::ParseError> {
    let cache_file = match cache_path(path) {
        Ok(p) => Some(p),
        Err(e) => {
            warn!("No cache path for {:?}: {}. Caching disabled for this file.", path, e);
            None
        }
    };
    let source_hash = match content_hash(path) {
        Ok(h) => Some(h),
        Err(e) => {
            warn!("Could not hash {:?}: {}. Caching disabled for this file.", path, e);
            None
        }
    };

    if use_cache {
        if let (Some(cache_file), Some(source_hash)) = (cache_file.as_deref(), source_hash) {
            if let Some(summary) = read_cached(cache_file, source_hash) {
                debug!("Cache hit for {:?}", path.file_name().unwrap_or_default());
                return Ok(summary);
            }
        }
    }

    let map = Beatmap::load(path)?;
    let summary = summarize(&map, path);

    if use_cache {
        if let (Some(cache_file), Some(source_hash)) = (cache_file, source_hash) {
            write_cached(&cache_file, source_hash, &summary);
        }
    }

    Ok(summary)
}

/// Scans `songs_dir` for chart folders and loads every chart in them.
/// A chart that fails to load is reported and skipped; the scan always
/// returns whatever could be loaded.
pub fn scan_songs(songs_dir: &Path) -> MapLibrary {
    info!("Scanning chart library in {:?}", songs_dir);

    let mut use_cache = true;
    if let Err(e) = fs::create_dir_all(config::MAP_CACHE_DIR) {
        warn!(
            "Could not create cache directory {}: {}. Caching disabled.",
            config::MAP_CACHE_DIR,
            e
        );
        use_cache = false;
    }

    let mut library = MapLibrary::default();
    let entries = match fs::read_dir(songs_dir) {
        Ok(entries) => entries,
        Err(e) => {
            error!("Failed to read songs directory {:?}: {}", songs_dir, e);
            return library;
        }
    };

    for entry in entries.flatten() {
        let folder = entry.path();
        if !folder.is_dir() {
            continue;
        }

        let mut set = MapSet {
            name: folder
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .into_owned(),
            folder: folder.clone(),
            maps: Vec::new(),
        };

        let Ok(files) = fs::read_dir(&folder) else {
            warn!("Could not read map set folder {:?}", folder);
            continue;
        };
        for file in files.flatten() {
            let path = file.path();
            let is_chart = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("osu"));
            if !is_chart {
                continue;
            }

            match load_summary(&path, use_cache) {
                Ok(summary) => set.maps.push(summary),
                Err(e) => error!("Failed to load chart {:?}: {}", path, e),
            }
        }

        if set.maps.is_empty() {
            debug!("Map set folder {:?} has no loadable charts, skipping", folder);
            continue;
        }
        set.maps.sort_by(|a, b| a.version.cmp(&b.version));
        library.sets.push(set);
    }

    library.sets.sort_by(|a, b| a.name.cmp(&b.name));
    info!(
        "Finished scanning. {} map sets, {} charts.",
        library.sets.len(),
        library.chart_count()
    );
    library
}
