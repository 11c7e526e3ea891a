use log::{error, info, warn, LevelFilter};
use std::error::Error;
use std::path::Path;

use taikoedit::assets::AssetManager;
use taikoedit::config;
use taikoedit::library;
use taikoedit::settings::ProgramConfig;

// Headless startup pipeline: settings, assets, chart library. The window
// shell and renderer attach on top of what this loads.
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Info)
        .filter_module("taikoedit::chart", LevelFilter::Debug)
        .filter_module("taikoedit::library", LevelFilter::Debug)
        .init();

    info!("TaikoEdit starting...");

    let settings_path = Path::new(config::SETTINGS_PATH);
    let first_run = !settings_path.exists();
    let settings = match ProgramConfig::load(settings_path) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to read settings: {}", e);
            return Err(Box::new(e));
        }
    };
    if first_run {
        if let Err(e) = settings.save(settings_path) {
            warn!("Could not write initial settings file: {}", e);
        }
    }

    if let Err(e) = settings.validate() {
        error!("Settings rejected: {}", e);
        error!(
            "Point `osu_folder` in {} at a directory containing a `{}` subdirectory.",
            config::SETTINGS_PATH,
            config::SONGS_DIR_NAME
        );
        return Err(Box::new(e));
    }

    match AssetManager::from_manifest(Path::new(config::ASSET_MANIFEST_PATH)) {
        Ok(mut assets) => {
            if assets.load_list("editor").is_ok() {
                info!("{} editor assets loaded.", assets.loaded_count());
            }
        }
        Err(e) => warn!("Continuing without assets: {}", e),
    }

    let library = library::scan_songs(&settings.songs_dir());
    info!(
        "Loaded {} map sets ({} charts).",
        library.sets.len(),
        library.chart_count()
    );

    Ok(())
}
