use crate::config;

use super::error::FormatError;
use super::hitobject::RECORD_DELIMITER;
use super::record::Record;

const EFFECT_KIAI: u32 = 1;

/// One line of the timing section. Uninherited ("red") points carry an
/// actual beat length in milliseconds; inherited ("green") points store a
/// negative value that encodes a slider-velocity multiplier instead.
#[derive(Clone, Debug, PartialEq)]
pub struct TimingPoint {
    pub time: f64,
    pub beat_length: f64,
    pub meter: u32,
    pub sample_set: u32,
    pub sample_index: u32,
    pub volume: u32,
    pub uninherited: bool,
    pub kiai: bool,
}

impl Default for TimingPoint {
    fn default() -> Self {
        Self {
            time: 0.0,
            beat_length: config::DEFAULT_BEAT_LENGTH,
            meter: 4,
            sample_set: 0,
            sample_index: 0,
            volume: 100,
            uninherited: true,
            kiai: false,
        }
    }
}

impl TimingPoint {
    /// Decodes one timing record with the same positional, truncation
    /// tolerant contract as hit objects.
    pub fn decode(line: &str) -> Result<Self, FormatError> {
        let mut record = Record::new(line, RECORD_DELIMITER);
        let defaults = Self::default();

        Ok(Self {
            time: record.next_float("time")?.unwrap_or(defaults.time),
            beat_length: record
                .next_float("beatlength")?
                .unwrap_or(defaults.beat_length),
            meter: record.next_int("meter")?.unwrap_or(4).max(1) as u32,
            sample_set: record.next_int("sampleset")?.unwrap_or(0).max(0) as u32,
            sample_index: record.next_int("sampleindex")?.unwrap_or(0).max(0) as u32,
            volume: record.next_int("volume")?.unwrap_or(100).clamp(0, 100) as u32,
            uninherited: record.next_int("uninherited")?.map_or(true, |v| v != 0),
            kiai: record
                .next_int("effects")?
                .is_some_and(|v| v as u32 & EFFECT_KIAI > 0),
        })
    }

    pub fn encode(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{}",
            self.time,
            self.beat_length,
            self.meter,
            self.sample_set,
            self.sample_index,
            self.volume,
            self.uninherited as u32,
            self.kiai as u32
        )
    }

    /// Slider-velocity multiplier encoded by an inherited point.
    pub fn velocity(&self) -> f64 {
        if self.uninherited || self.beat_length >= 0.0 {
            1.0
        } else {
            -100.0 / self.beat_length
        }
    }
}

/// Beat length in effect at `time`: the last uninherited point at or
/// before it, or the first point in the chart before any has applied.
pub fn beat_length_at(points: &[TimingPoint], time: f64) -> f64 {
    let mut governing = None;
    for point in points.iter().filter(|p| p.uninherited) {
        if governing.is_none() || point.time <= time {
            governing = Some(point.beat_length);
        }
        if point.time > time {
            break;
        }
    }
    governing.unwrap_or(config::DEFAULT_BEAT_LENGTH)
}

/// Slider velocity in effect at `time`: the last inherited point between
/// the governing uninherited point and `time`, defaulting to 1.0.
pub fn velocity_at(points: &[TimingPoint], time: f64) -> f64 {
    let red_time = points
        .iter()
        .filter(|p| p.uninherited && p.time <= time)
        .next_back()
        .map_or(f64::MIN, |p| p.time);

    points
        .iter()
        .filter(|p| !p.uninherited && p.time >= red_time && p.time <= time)
        .next_back()
        .map_or(1.0, TimingPoint::velocity)
}

/// Milliseconds a drumroll of `pixel_length` pixels lasts, given the
/// timing in effect at its start.
pub fn drumroll_duration(
    points: &[TimingPoint],
    slider_multiplier: f64,
    time: i32,
    pixel_length: f64,
    repeats: u32,
) -> i32 {
    let time = f64::from(time);
    let beat_length = beat_length_at(points, time);
    let velocity = velocity_at(points, time);
    let px_per_beat = slider_multiplier * 100.0 * velocity;
    if px_per_beat <= 0.0 {
        return 0;
    }
    (pixel_length / px_per_beat * beat_length * f64::from(repeats)).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn red(time: f64, beat_length: f64) -> TimingPoint {
        TimingPoint {
            time,
            beat_length,
            ..TimingPoint::default()
        }
    }

    fn green(time: f64, beat_length: f64) -> TimingPoint {
        TimingPoint {
            time,
            beat_length,
            uninherited: false,
            ..TimingPoint::default()
        }
    }

    #[test]
    fn record_round_trips() {
        let line = "1000,344.25,4,1,0,70,1,0";
        let point = TimingPoint::decode(line).unwrap();
        assert!(point.uninherited);
        assert!(!point.kiai);
        assert_eq!(point.encode(), line);
    }

    #[test]
    fn truncated_record_uses_defaults() {
        let point = TimingPoint::decode("2000,500").unwrap();
        assert_eq!(point.meter, 4);
        assert_eq!(point.volume, 100);
        assert!(point.uninherited);
    }

    #[test]
    fn malformed_beat_length_is_rejected() {
        let err = TimingPoint::decode("1000,fast").unwrap_err();
        assert_eq!(err.field, 1);
    }

    #[test]
    fn inherited_point_encodes_a_velocity() {
        let point = TimingPoint::decode("3000,-50,4,1,0,70,0,0").unwrap();
        assert!(!point.uninherited);
        assert_eq!(point.velocity(), 2.0);
    }

    #[test]
    fn beat_length_tracks_the_governing_red_line() {
        let points = vec![red(0.0, 500.0), red(4000.0, 250.0)];
        assert_eq!(beat_length_at(&points, 1000.0), 500.0);
        assert_eq!(beat_length_at(&points, 4000.0), 250.0);
        assert_eq!(beat_length_at(&points, 9000.0), 250.0);
        // before any point has applied, the first one governs
        assert_eq!(beat_length_at(&points, -100.0), 500.0);
    }

    #[test]
    fn velocity_resets_at_red_lines() {
        let points = vec![red(0.0, 500.0), green(1000.0, -50.0), red(4000.0, 500.0)];
        assert_eq!(velocity_at(&points, 2000.0), 2.0);
        assert_eq!(velocity_at(&points, 5000.0), 1.0);
    }

    #[test]
    fn drumroll_duration_scales_with_length_and_repeats() {
        let points = vec![red(0.0, 500.0)];
        // 140 px at 1.4x multiplier: one beat per repeat
        assert_eq!(drumroll_duration(&points, 1.4, 0, 140.0, 1), 500);
        assert_eq!(drumroll_duration(&points, 1.4, 0, 140.0, 2), 1000);
    }
}
