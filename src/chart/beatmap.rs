use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

use chrono::Local;
use log::{debug, info, warn};

use crate::config;

use super::error::{ParseError, ParseResult};
use super::hitobject::{HitObject, HitObjectKind};
use super::timing::{self, TimingPoint};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    pub title: String,
    pub artist: String,
    pub creator: String,
    pub version: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Difficulty {
    pub hp_drain: f32,
    pub circle_size: f32,
    pub overall_difficulty: f32,
    pub approach_rate: f32,
    pub slider_multiplier: f64,
    pub slider_tick_rate: f64,
}

impl Default for Difficulty {
    fn default() -> Self {
        Self {
            hp_drain: 5.0,
            circle_size: 5.0,
            overall_difficulty: 5.0,
            approach_rate: 5.0,
            slider_multiplier: 1.4,
            slider_tick_rate: 1.0,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    General,
    Metadata,
    Difficulty,
    TimingPoints,
    HitObjects,
    Other,
}

impl Section {
    fn from_name(name: &str) -> Self {
        match name {
            "General" => Self::General,
            "Metadata" => Self::Metadata,
            "Difficulty" => Self::Difficulty,
            "TimingPoints" => Self::TimingPoints,
            "HitObjects" => Self::HitObjects,
            _ => Self::Other,
        }
    }
}

/// One chart: file-level settings, timing, and the hit objects it owns
/// exclusively, kept in start-time order.
#[derive(Clone, Debug, PartialEq)]
pub struct Beatmap {
    pub format_version: u8,
    pub audio_filename: String,
    pub preview_time: i32,
    pub mode: u32,
    pub metadata: Metadata,
    pub difficulty: Difficulty,
    pub timing_points: Vec<TimingPoint>,
    objects: Vec<HitObject>,
}

impl Default for Beatmap {
    fn default() -> Self {
        Self {
            format_version: config::FORMAT_VERSION,
            audio_filename: String::new(),
            preview_time: -1,
            mode: config::TAIKO_MODE,
            metadata: Metadata::default(),
            difficulty: Difficulty::default(),
            timing_points: Vec::new(),
            objects: Vec::new(),
        }
    }
}

fn clean_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control() && *c != '\u{200b}')
        .collect::<String>()
        .trim()
        .to_string()
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str, origin: &Path) -> Option<T> {
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("Ignoring unparsable {} value `{}` in {:?}", key, value, origin);
            None
        }
    }
}

impl Beatmap {
    pub fn load(path: &Path) -> ParseResult<Self> {
        info!("Loading chart: {:?}", path);
        let bytes = fs::read(path)?;

        match std::str::from_utf8(&bytes) {
            Ok(content) => Self::parse(content, path),
            Err(e) => {
                warn!("UTF-8 decoding failed for {:?}, trying latin1: {}", path, e);
                let content: String = bytes.iter().map(|&b| b as char).collect();
                Self::parse(&content, path)
            }
        }
    }

    /// Parses a whole chart file. IO and header problems abort; a
    /// malformed record inside a section is logged and skipped so one bad
    /// line cannot take the rest of the chart down with it.
    pub fn parse(content: &str, origin: &Path) -> ParseResult<Self> {
        let mut map = Self::default();
        let mut section = Section::Preamble;
        let mut header_seen = false;

        for raw_line in content.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }

            if !header_seen {
                match line.find(config::FILE_HEADER) {
                    Some(idx) => {
                        let version = line[idx + config::FILE_HEADER.len()..].trim_end();
                        map.format_version =
                            version.parse().map_err(|_| ParseError::IncorrectHeader)?;
                        header_seen = true;
                        continue;
                    }
                    None => return Err(ParseError::IncorrectHeader),
                }
            }

            if line.starts_with('[') && line.ends_with(']') {
                section = Section::from_name(&line[1..line.len() - 1]);
                continue;
            }

            match section {
                Section::General => {
                    if let Some((key, value)) = line.split_once(':') {
                        map.apply_general(key.trim(), value.trim(), origin);
                    }
                }
                Section::Metadata => {
                    if let Some((key, value)) = line.split_once(':') {
                        map.apply_metadata(key.trim(), value);
                    }
                }
                Section::Difficulty => {
                    if let Some((key, value)) = line.split_once(':') {
                        map.apply_difficulty(key.trim(), value.trim(), origin);
                    }
                }
                Section::TimingPoints => match TimingPoint::decode(line) {
                    Ok(point) => map.timing_points.push(point),
                    Err(e) => warn!("Skipping timing point in {:?}: {}", origin, e),
                },
                Section::HitObjects => match HitObject::decode(line) {
                    Ok(object) => map.objects.push(object),
                    Err(e) => warn!("Skipping hit object in {:?}: {}", origin, e),
                },
                Section::Preamble | Section::Other => {}
            }
        }

        if !header_seen {
            return Err(ParseError::IncorrectHeader);
        }

        map.timing_points
            .sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));
        map.objects.sort_by_key(|o| o.time);
        map.finalize_drumrolls();

        debug!(
            "Parsed {:?}: {} objects, {} timing points",
            origin,
            map.objects.len(),
            map.timing_points.len()
        );

        Ok(map)
    }

    fn apply_general(&mut self, key: &str, value: &str, origin: &Path) {
        match key {
            "AudioFilename" => self.audio_filename = clean_value(value),
            "PreviewTime" => {
                if let Some(v) = parse_number(key, value, origin) {
                    self.preview_time = v;
                }
            }
            "Mode" => {
                if let Some(v) = parse_number(key, value, origin) {
                    self.mode = v;
                }
            }
            _ => {}
        }
    }

    fn apply_metadata(&mut self, key: &str, value: &str) {
        match key {
            "Title" => self.metadata.title = clean_value(value),
            "Artist" => self.metadata.artist = clean_value(value),
            "Creator" => self.metadata.creator = clean_value(value),
            "Version" => self.metadata.version = clean_value(value),
            _ => {}
        }
    }

    fn apply_difficulty(&mut self, key: &str, value: &str, origin: &Path) {
        match key {
            "HPDrainRate" => {
                if let Some(v) = parse_number(key, value, origin) {
                    self.difficulty.hp_drain = v;
                }
            }
            "CircleSize" => {
                if let Some(v) = parse_number(key, value, origin) {
                    self.difficulty.circle_size = v;
                }
            }
            "OverallDifficulty" => {
                if let Some(v) = parse_number(key, value, origin) {
                    self.difficulty.overall_difficulty = v;
                }
            }
            "ApproachRate" => {
                if let Some(v) = parse_number(key, value, origin) {
                    self.difficulty.approach_rate = v;
                }
            }
            "SliderMultiplier" => {
                if let Some(v) = parse_number(key, value, origin) {
                    self.difficulty.slider_multiplier = v;
                }
            }
            "SliderTickRate" => {
                if let Some(v) = parse_number(key, value, origin) {
                    self.difficulty.slider_tick_rate = v;
                }
            }
            _ => {}
        }
    }

    // Drumroll lengths are wire-encoded in pixels; milliseconds only exist
    // once the timing section is known.
    fn finalize_drumrolls(&mut self) {
        let slider_multiplier = self.difficulty.slider_multiplier;
        for object in &mut self.objects {
            let time = object.time;
            if let HitObjectKind::Drumroll {
                pixel_length,
                repeats,
                duration,
                ..
            } = &mut object.kind
            {
                *duration = timing::drumroll_duration(
                    &self.timing_points,
                    slider_multiplier,
                    time,
                    *pixel_length,
                    *repeats,
                );
            }
        }
    }

    pub fn objects(&self) -> &[HitObject] {
        &self.objects
    }

    /// Inserts an object at its position in start-time order and returns
    /// the index it landed at.
    pub fn insert(&mut self, object: HitObject) -> usize {
        let index = self.objects.partition_point(|o| o.time <= object.time);
        self.objects.insert(index, object);
        index
    }

    /// Removes and returns the object at `index`, dropping its ownership
    /// out of the chart.
    pub fn remove(&mut self, index: usize) -> HitObject {
        self.objects.remove(index)
    }

    /// Objects whose active interval touches `[start, end)`. Rendering
    /// never culls on its own; callers use this to decide what to draw.
    pub fn objects_between(&self, start: i32, end: i32) -> impl Iterator<Item = &HitObject> + '_ {
        self.objects
            .iter()
            .filter(move |o| o.end_time() >= start && o.time < end)
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}{}", config::FILE_HEADER, self.format_version);

        let _ = writeln!(out, "\n[General]");
        let _ = writeln!(out, "AudioFilename: {}", self.audio_filename);
        let _ = writeln!(out, "PreviewTime: {}", self.preview_time);
        let _ = writeln!(out, "Mode: {}", self.mode);

        let _ = writeln!(out, "\n[Metadata]");
        let _ = writeln!(out, "Title:{}", self.metadata.title);
        let _ = writeln!(out, "Artist:{}", self.metadata.artist);
        let _ = writeln!(out, "Creator:{}", self.metadata.creator);
        let _ = writeln!(out, "Version:{}", self.metadata.version);

        let _ = writeln!(out, "\n[Difficulty]");
        let _ = writeln!(out, "HPDrainRate:{}", self.difficulty.hp_drain);
        let _ = writeln!(out, "CircleSize:{}", self.difficulty.circle_size);
        let _ = writeln!(out, "OverallDifficulty:{}", self.difficulty.overall_difficulty);
        let _ = writeln!(out, "ApproachRate:{}", self.difficulty.approach_rate);
        let _ = writeln!(out, "SliderMultiplier:{}", self.difficulty.slider_multiplier);
        let _ = writeln!(out, "SliderTickRate:{}", self.difficulty.slider_tick_rate);

        let _ = writeln!(out, "\n[TimingPoints]");
        for point in &self.timing_points {
            let _ = writeln!(out, "{}", point.encode());
        }

        let _ = writeln!(out, "\n[HitObjects]");
        for object in &self.objects {
            let _ = writeln!(out, "{}", object.encode());
        }

        out
    }

    /// Writes the chart back to disk: the previous file (if any) is kept
    /// as a timestamped backup, and the new content goes through a temp
    /// file rename so a failed write cannot clobber the chart.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "chart path has no file name")
            })?;

        if path.exists() {
            let stamp = Local::now().format("%Y%m%d-%H%M%S");
            let backup = path.with_file_name(format!("{}.{}.bak", file_name, stamp));
            match fs::copy(path, &backup) {
                Ok(_) => debug!("Backed up {:?} to {:?}", path, backup),
                Err(e) => warn!("Could not back up {:?}: {}", path, e),
            }
        }

        let tmp = path.with_file_name(format!("{}.tmp", file_name));
        fs::write(&tmp, self.encode())?;
        fs::rename(&tmp, path)?;
        info!("Saved chart: {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fixture() -> String {
        [
            "osu file format v14",
            "",
            "[General]",
            "AudioFilename: audio.mp3",
            "PreviewTime: 1200",
            "Mode: 1",
            "",
            "[Metadata]",
            "Title:Test Song",
            "Artist:Someone",
            "Creator:Somebody",
            "Version:Oni",
            "",
            "[Difficulty]",
            "HPDrainRate:6",
            "OverallDifficulty:5.5",
            "SliderMultiplier:1.4",
            "",
            "[TimingPoints]",
            "0,500,4,1,0,70,1,0",
            "",
            "[HitObjects]",
            "64,192,500,1,0",
            "96,192,1000,2,0,L|236:192,1,140",
            "256,192,2000,12,0,3000,0:0:0:0",
        ]
        .join("\n")
    }

    #[test]
    fn parses_all_sections() {
        let map = Beatmap::parse(&fixture(), Path::new("test.osu")).unwrap();

        assert_eq!(map.format_version, 14);
        assert_eq!(map.audio_filename, "audio.mp3");
        assert_eq!(map.metadata.title, "Test Song");
        assert_eq!(map.difficulty.hp_drain, 6.0);
        assert_eq!(map.timing_points.len(), 1);
        assert_eq!(map.objects().len(), 3);
    }

    #[test]
    fn drumroll_duration_is_derived_from_timing() {
        let map = Beatmap::parse(&fixture(), Path::new("test.osu")).unwrap();
        let drumroll = &map.objects()[1];
        // 140 px at 1.4x multiplier and 500ms beats: exactly one beat
        assert_eq!(drumroll.end_time(), 1500);
    }

    #[test]
    fn malformed_record_is_skipped_not_fatal() {
        let content = fixture().replace("64,192,500,1,0", "64,192,oops,1,0");
        let map = Beatmap::parse(&content, Path::new("test.osu")).unwrap();
        assert_eq!(map.objects().len(), 2);
        assert!(map.objects().iter().all(|o| o.time != 500));
    }

    #[test]
    fn missing_header_is_fatal() {
        assert!(matches!(
            Beatmap::parse("[General]\nMode: 1", Path::new("test.osu")),
            Err(ParseError::IncorrectHeader)
        ));
    }

    #[test]
    fn unknown_sections_are_ignored() {
        let content = fixture().replace("[TimingPoints]", "[Colours]\nCombo1: 1,2,3\n\n[TimingPoints]");
        let map = Beatmap::parse(&content, Path::new("test.osu")).unwrap();
        assert_eq!(map.timing_points.len(), 1);
    }

    #[test]
    fn insert_keeps_objects_in_time_order() {
        let mut map = Beatmap::parse(&fixture(), Path::new("test.osu")).unwrap();
        let object = HitObject::decode("0,0,1500,1,0").unwrap();

        let index = map.insert(object);
        assert_eq!(index, 2);
        let times: Vec<i32> = map.objects().iter().map(|o| o.time).collect();
        assert_eq!(times, vec![500, 1000, 1500, 2000]);
    }

    #[test]
    fn remove_drops_the_object() {
        let mut map = Beatmap::parse(&fixture(), Path::new("test.osu")).unwrap();
        let removed = map.remove(0);
        assert_eq!(removed.time, 500);
        assert_eq!(map.objects().len(), 2);
    }

    #[test]
    fn objects_between_matches_active_intervals() {
        let map = Beatmap::parse(&fixture(), Path::new("test.osu")).unwrap();

        // spinner [2000, 5000] still overlaps a window starting at 4000
        let visible: Vec<i32> = map.objects_between(4000, 6000).map(|o| o.time).collect();
        assert_eq!(visible, vec![2000]);

        let visible: Vec<i32> = map.objects_between(0, 600).map(|o| o.time).collect();
        assert_eq!(visible, vec![500]);
    }

    #[test]
    fn encode_round_trips() {
        let map = Beatmap::parse(&fixture(), Path::new("test.osu")).unwrap();
        let reparsed = Beatmap::parse(&map.encode(), Path::new("test.osu")).unwrap();
        assert_eq!(map, reparsed);
    }
}
