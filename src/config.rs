// Window
pub const WINDOW_TITLE: &str = "TaikoEdit";
pub const DEFAULT_WINDOW_WIDTH: u32 = 1280;
pub const DEFAULT_WINDOW_HEIGHT: u32 = 720;

// File locations
pub const SETTINGS_PATH: &str = "settings.ini";
pub const ASSET_MANIFEST_PATH: &str = "assets/assets.json";
pub const MAP_CACHE_DIR: &str = "cache/maps";
pub const SONGS_DIR_NAME: &str = "Songs";

// Chart file format
pub const FILE_HEADER: &str = "osu file format v";
pub const FORMAT_VERSION: u8 = 14;
pub const TAIKO_MODE: u32 = 1;

// Hit-object sprite geometry. Glyph textures are square; the draw origin
// sits at the sprite center so anchors line up on the timeline row.
pub const CIRCLE_SIZE: f32 = 128.0;
pub const CIRCLE_OFFSET: f32 = CIRCLE_SIZE / 2.0;
pub const NORMAL_SCALE: f32 = 0.6;
pub const LARGE_SCALE: f32 = 0.9;

// Object tints
pub const DON_COLOR: [f32; 4] = [235.0 / 255.0, 69.0 / 255.0, 44.0 / 255.0, 1.0];
pub const KAT_COLOR: [f32; 4] = [67.0 / 255.0, 142.0 / 255.0, 172.0 / 255.0, 1.0];
pub const DRUMROLL_COLOR: [f32; 4] = [252.0 / 255.0, 184.0 / 255.0, 6.0 / 255.0, 1.0];
pub const SPINNER_COLOR: [f32; 4] = [0.75, 0.75, 0.75, 1.0];

// Timing fallbacks
pub const DEFAULT_BEAT_LENGTH: f64 = 500.0;
