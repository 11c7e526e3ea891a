use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use configparser::ini::Ini;
use log::{info, warn};

use crate::config;

#[derive(Debug)]
pub enum SettingsError {
    Io(io::Error),
    Format(String),
    InvalidDimension { what: &'static str, value: u32 },
    BadSongsFolder(PathBuf),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Format(e) => write!(f, "malformed settings file: {}", e),
            Self::InvalidDimension { what, value } => {
                write!(f, "window {} must be positive, got {}", what, value)
            }
            Self::BadSongsFolder(path) => write!(
                f,
                "{:?} is not an osu! folder (no `{}` subdirectory)",
                path,
                config::SONGS_DIR_NAME
            ),
        }
    }
}

impl StdError for SettingsError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SettingsError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// True when `folder` exists and contains an immediate subdirectory
/// literally named `Songs`. This is the whole test for "is this an osu!
/// installation"; nothing else about the folder is inspected.
pub fn songs_folder_valid(folder: &Path) -> bool {
    folder.is_dir() && folder.join(config::SONGS_DIR_NAME).is_dir()
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProgramConfig {
    pub fullscreen: bool,
    pub width: u32,
    pub height: u32,
    pub osu_folder: PathBuf,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            fullscreen: false,
            width: config::DEFAULT_WINDOW_WIDTH,
            height: config::DEFAULT_WINDOW_HEIGHT,
            osu_folder: PathBuf::new(),
        }
    }
}

impl ProgramConfig {
    /// Reads the settings file. A missing file means first run and yields
    /// defaults; a value that does not parse falls back to its default
    /// with a warning rather than blocking startup.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            info!("Settings file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let mut ini = Ini::new();
        ini.load(path).map_err(SettingsError::Format)?;

        let mut settings = Self::default();

        match ini.getbool("graphics", "fullscreen") {
            Ok(Some(value)) => settings.fullscreen = value,
            Ok(None) => {}
            Err(e) => warn!("Ignoring bad fullscreen setting: {}", e),
        }
        match ini.getuint("graphics", "width") {
            Ok(Some(value)) => settings.width = value as u32,
            Ok(None) => {}
            Err(e) => warn!("Ignoring bad width setting: {}", e),
        }
        match ini.getuint("graphics", "height") {
            Ok(Some(value)) => settings.height = value as u32,
            Ok(None) => {}
            Err(e) => warn!("Ignoring bad height setting: {}", e),
        }
        if let Some(folder) = ini.get("paths", "osu_folder") {
            settings.osu_folder = PathBuf::from(folder);
        }

        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let mut ini = Ini::new();
        ini.set("graphics", "fullscreen", Some(self.fullscreen.to_string()));
        ini.set("graphics", "width", Some(self.width.to_string()));
        ini.set("graphics", "height", Some(self.height.to_string()));
        ini.set(
            "paths",
            "osu_folder",
            Some(self.osu_folder.display().to_string()),
        );

        ini.write(path)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Rejects settings that must never reach persisted state: window
    /// dimensions only matter in windowed mode, and the osu! folder must
    /// pass [`songs_folder_valid`].
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.fullscreen {
            if self.width == 0 {
                return Err(SettingsError::InvalidDimension {
                    what: "width",
                    value: self.width,
                });
            }
            if self.height == 0 {
                return Err(SettingsError::InvalidDimension {
                    what: "height",
                    value: self.height,
                });
            }
        }

        if !songs_folder_valid(&self.osu_folder) {
            return Err(SettingsError::BadSongsFolder(self.osu_folder.clone()));
        }

        Ok(())
    }

    pub fn songs_dir(&self) -> PathBuf {
        self.osu_folder.join(config::SONGS_DIR_NAME)
    }
}
