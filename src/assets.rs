use std::collections::{HashMap, HashSet};
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::ImageReader;
use log::{debug, error, info, warn};
use serde::Deserialize;

/// Opaque reference to a loaded texture. Copy it around freely; the
/// asset manager keeps the actual resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u32);

#[derive(Debug)]
pub enum AssetError {
    Io(io::Error),
    Manifest(serde_json::Error),
    UnknownList(String),
    UnknownAsset(String),
    UnknownType { name: String, kind: String },
    Image { file: PathBuf, source: image::ImageError },
    BadRegion { name: String, params: String },
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Manifest(e) => write!(f, "malformed asset manifest: {}", e),
            Self::UnknownList(name) => write!(f, "asset list not found: {}", name),
            Self::UnknownAsset(key) => write!(f, "asset not loaded: {}", key),
            Self::UnknownType { name, kind } => {
                write!(f, "asset {} has unknown type `{}`", name, kind)
            }
            Self::Image { file, source } => {
                write!(f, "unreadable image {:?}: {}", file, source)
            }
            Self::BadRegion { name, params } => {
                write!(f, "region {} has bad params `{}`", name, params)
            }
        }
    }
}

impl StdError for AssetError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Manifest(e) => Some(e),
            Self::Image { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for AssetError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for AssetError {
    fn from(err: serde_json::Error) -> Self {
        Self::Manifest(err)
    }
}

/// One manifest entry: a named asset, its loader type, the file it comes
/// from and optional loader parameters.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AssetInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub file: String,
    #[serde(default)]
    pub params: Option<String>,
}

/// The manifest: list name to entries. Lists load and unload as units.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct AssetLists {
    #[serde(flatten)]
    lists: HashMap<String, Vec<AssetInfo>>,
}

impl AssetLists {
    pub fn count(&self) -> usize {
        self.lists.len()
    }
}

/// A texture as this layer knows it: probed, validated, and addressable.
/// The GPU upload belongs to the renderer collaborator.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub name: String,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Sub-rectangle (x, y, w, h) when the asset is an atlas region.
    pub region: Option<(u32, u32, u32, u32)>,
    pub mipmaps: bool,
}

#[derive(Default)]
pub struct AssetManager {
    lists: AssetLists,
    loaded_lists: HashSet<String>,
    keys: HashMap<String, TextureHandle>,
    textures: Vec<Option<Texture>>,
}

impl AssetManager {
    pub fn from_manifest(path: &Path) -> Result<Self, AssetError> {
        info!("Reading asset manifest {:?}", path);
        let text = fs::read_to_string(path)?;
        let lists: AssetLists = serde_json::from_str(&text)?;
        debug!("Manifest defines {} asset lists", lists.count());

        Ok(Self {
            lists,
            ..Self::default()
        })
    }

    pub fn add_lists(&mut self, additional: AssetLists) {
        self.lists.lists.extend(additional.lists);
    }

    /// Loads every entry of one list. A bad entry is logged and skipped;
    /// it never takes the rest of the list down with it. Loading a list
    /// twice is a no-op.
    pub fn load_list(&mut self, name: &str) -> Result<(), AssetError> {
        let Some(entries) = self.lists.lists.get(name).cloned() else {
            error!("Asset list not found: {}", name);
            return Err(AssetError::UnknownList(name.to_string()));
        };
        if self.loaded_lists.contains(name) {
            return Ok(());
        }

        info!("Loading asset list \"{}\"", name);
        for info in &entries {
            match load_entry(info) {
                Ok(texture) => {
                    let handle = TextureHandle(self.textures.len() as u32);
                    self.textures.push(Some(texture));
                    self.keys.insert(format!("{}:{}", name, info.name), handle);
                }
                Err(e) => {
                    error!(
                        "Failed to load asset {} of type {} with file {}: {}",
                        info.name, info.kind, info.file, e
                    );
                }
            }
        }

        self.loaded_lists.insert(name.to_string());
        Ok(())
    }

    pub fn unload_list(&mut self, name: &str) {
        if !self.loaded_lists.remove(name) {
            return;
        }
        info!("Unloading asset list \"{}\"", name);

        let prefix = format!("{}:", name);
        self.keys.retain(|key, handle| {
            if key.starts_with(&prefix) {
                self.textures[handle.0 as usize] = None;
                false
            } else {
                true
            }
        });
    }

    /// Looks up a loaded asset by its `list:name` key.
    pub fn texture_handle(&self, key: &str) -> Result<TextureHandle, AssetError> {
        self.keys
            .get(key)
            .copied()
            .ok_or_else(|| AssetError::UnknownAsset(key.to_string()))
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&Texture> {
        self.textures.get(handle.0 as usize)?.as_ref()
    }

    pub fn loaded_count(&self) -> usize {
        self.textures.iter().filter(|t| t.is_some()).count()
    }
}

fn probe_dimensions(file: &str) -> Result<(u32, u32), AssetError> {
    let path = Path::new(file);
    let reader = ImageReader::open(path)?;
    reader.into_dimensions().map_err(|source| AssetError::Image {
        file: path.to_path_buf(),
        source,
    })
}

fn load_entry(info: &AssetInfo) -> Result<Texture, AssetError> {
    let (width, height) = probe_dimensions(&info.file)?;

    match info.kind.as_str() {
        "texture" | "largetexture" => Ok(Texture {
            name: info.name.clone(),
            path: PathBuf::from(&info.file),
            width,
            height,
            region: None,
            // atlases and other large images get mipmapped by the renderer
            mipmaps: info.kind == "largetexture",
        }),
        "region" => {
            let params = info.params.as_deref().unwrap_or("");
            let bad_region = || AssetError::BadRegion {
                name: info.name.clone(),
                params: params.to_string(),
            };

            let values: Vec<u32> = params
                .split_whitespace()
                .map(|v| v.parse().ok())
                .collect::<Option<_>>()
                .ok_or_else(bad_region)?;
            let &[x, y, w, h] = values.as_slice() else {
                return Err(bad_region());
            };
            if w == 0 || h == 0 || x.saturating_add(w) > width || y.saturating_add(h) > height {
                warn!(
                    "Region {} ({} {} {} {}) does not fit in {}x{} sheet {}",
                    info.name, x, y, w, h, width, height, info.file
                );
                return Err(bad_region());
            }

            Ok(Texture {
                name: info.name.clone(),
                path: PathBuf::from(&info.file),
                width,
                height,
                region: Some((x, y, w, h)),
                mipmaps: true,
            })
        }
        _ => Err(AssetError::UnknownType {
            name: info.name.clone(),
            kind: info.kind.clone(),
        }),
    }
}
