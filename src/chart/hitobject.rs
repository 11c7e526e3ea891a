use std::fmt::Write as _;

use super::error::FormatError;
use super::record::Record;

// Object-type mask layout (wire contract).
const TYPE_CIRCLE: u32 = 1;
const TYPE_SLIDER: u32 = 1 << 1;
const TYPE_NEW_COMBO: u32 = 1 << 2;
const TYPE_SPINNER: u32 = 1 << 3;
const TYPE_HOLD: u32 = 1 << 7;
const COLOR_SKIP_SHIFT: u32 = 4;
const COLOR_SKIP_MASK: u32 = 0b111;

// Hit-sound mask layout. Each flag is an independent bit.
const SOUND_NORMAL: u32 = 1;
const SOUND_WHISTLE: u32 = 1 << 1;
const SOUND_FINISH: u32 = 1 << 2;
const SOUND_CLAP: u32 = 1 << 3;

pub const RECORD_DELIMITER: char = ',';
pub const SAMPLE_DELIMITER: char = ':';
pub const CURVE_DELIMITER: char = '|';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CurveKind {
    Bezier,
    Catmull,
    Linear,
    Perfect,
}

impl CurveKind {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "B" => Some(Self::Bezier),
            "C" => Some(Self::Catmull),
            "L" => Some(Self::Linear),
            "P" => Some(Self::Perfect),
            _ => None,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::Bezier => "B",
            Self::Catmull => "C",
            Self::Linear => "L",
            Self::Perfect => "P",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum HitObjectKind {
    Circle,
    Drumroll {
        curve: CurveKind,
        points: Vec<(i32, i32)>,
        repeats: u32,
        pixel_length: f64,
        /// Milliseconds, derived from the timing section once the whole
        /// file is parsed. Zero until then.
        duration: i32,
    },
    Spinner {
        /// Milliseconds. The end of the spin is always `time + duration`.
        duration: i32,
    },
}

/// One timed playable element of a chart. Shared fields live here; the
/// per-type payload is in [`HitObjectKind`].
#[derive(Clone, Debug, PartialEq)]
pub struct HitObject {
    pub x: i32,
    pub y: i32,
    /// Start time in milliseconds.
    pub time: i32,
    pub new_combo: bool,
    /// Combo-color advances applied when this object starts a new combo.
    pub color_skip: u32,
    pub normal: bool,
    pub whistle: bool,
    pub finish: bool,
    pub clap: bool,
    /// Custom sample indices, empty when the record carries none.
    pub hit_sample: Vec<i32>,
    pub kind: HitObjectKind,
}

// Shared leading fields of every record schema.
struct Head {
    x: i32,
    y: i32,
    time: i32,
    type_mask: u32,
    sound_mask: u32,
}

impl Head {
    fn decode(record: &mut Record<'_>) -> Result<Self, FormatError> {
        Ok(Self {
            x: record.next_int("x")?.unwrap_or(0),
            y: record.next_int("y")?.unwrap_or(0),
            time: record.next_int("time")?.unwrap_or(0),
            type_mask: record.next_int("type")?.unwrap_or(0) as u32,
            sound_mask: record.next_int("hitsound")?.unwrap_or(0) as u32,
        })
    }
}

impl HitObject {
    /// Decodes one record line, picking the variant schema from the kind
    /// bits of the type mask. Records with no kind bit decode as circles;
    /// the hold bit is not a taiko object and rejects the record.
    pub fn decode(line: &str) -> Result<Self, FormatError> {
        let mut record = Record::new(line, RECORD_DELIMITER);
        record.skip(3);
        let type_mask = match record.next_raw() {
            Some(raw) => raw
                .parse::<i32>()
                .map_err(|_| FormatError::new(3, "type", raw, "an integer"))?
                as u32,
            None => 0,
        };

        if type_mask & TYPE_HOLD > 0 {
            Err(FormatError::new(3, "type", line, "a supported object type"))
        } else if type_mask & TYPE_SPINNER > 0 {
            Self::decode_spinner(line)
        } else if type_mask & TYPE_SLIDER > 0 {
            Self::decode_drumroll(line)
        } else {
            Self::decode_circle(line)
        }
    }

    /// Decodes a record already known to describe a circle. Fields are
    /// positional and truncation falls back to defaults; a field that is
    /// present but malformed rejects the whole record, so a partially
    /// applied object never comes out of any of the decoders.
    pub fn decode_circle(line: &str) -> Result<Self, FormatError> {
        let mut record = Record::new(line, RECORD_DELIMITER);
        let head = Head::decode(&mut record)?;
        let hit_sample = record.next_int_list("hitsample", SAMPLE_DELIMITER)?;
        Ok(Self::assemble(head, HitObjectKind::Circle, hit_sample))
    }

    /// Decodes a record already known to describe a spinner. The sixth
    /// field is the spin duration; the end time is derived from it and is
    /// never read from the record itself.
    pub fn decode_spinner(line: &str) -> Result<Self, FormatError> {
        let mut record = Record::new(line, RECORD_DELIMITER);
        let head = Head::decode(&mut record)?;
        let duration = record.next_int("duration")?.unwrap_or(0);
        let hit_sample = record.next_int_list("hitsample", SAMPLE_DELIMITER)?;
        Ok(Self::assemble(
            head,
            HitObjectKind::Spinner { duration },
            hit_sample,
        ))
    }

    /// Decodes a record already known to describe a drumroll: a curve
    /// descriptor (`TYPE|x:y|x:y...`), a repeat count and a pixel length.
    pub fn decode_drumroll(line: &str) -> Result<Self, FormatError> {
        let mut record = Record::new(line, RECORD_DELIMITER);
        let head = Head::decode(&mut record)?;

        let curve_index = record.position();
        let (curve, points) = match record.next_raw() {
            Some(raw) => {
                let mut segments = raw.split(CURVE_DELIMITER);
                let curve = segments
                    .next()
                    .and_then(CurveKind::from_tag)
                    .ok_or_else(|| {
                        FormatError::new(curve_index, "curve", raw, "a curve descriptor")
                    })?;

                let mut points = Vec::new();
                for segment in segments {
                    let point = segment
                        .split_once(SAMPLE_DELIMITER)
                        .and_then(|(px, py)| Some((px.parse().ok()?, py.parse().ok()?)));
                    match point {
                        Some(point) => points.push(point),
                        None => {
                            return Err(FormatError::new(
                                curve_index,
                                "curve",
                                raw,
                                "`x:y` curve points",
                            ));
                        }
                    }
                }
                (curve, points)
            }
            None => (CurveKind::Linear, Vec::new()),
        };

        let repeats = record.next_int("repeats")?.unwrap_or(1).max(1) as u32;
        let pixel_length = record.next_float("length")?.unwrap_or(0.0);

        // Per-edge sound and sample-set fields are not modeled; step over
        // them so the sample list lands on the right field.
        record.skip(2);
        let hit_sample = record.next_int_list("hitsample", SAMPLE_DELIMITER)?;

        Ok(Self::assemble(
            head,
            HitObjectKind::Drumroll {
                curve,
                points,
                repeats,
                pixel_length,
                duration: 0,
            },
            hit_sample,
        ))
    }

    fn assemble(head: Head, kind: HitObjectKind, hit_sample: Vec<i32>) -> Self {
        Self {
            x: head.x,
            y: head.y,
            time: head.time,
            new_combo: head.type_mask & TYPE_NEW_COMBO > 0,
            color_skip: (head.type_mask >> COLOR_SKIP_SHIFT) & COLOR_SKIP_MASK,
            normal: head.sound_mask & SOUND_NORMAL > 0,
            whistle: head.sound_mask & SOUND_WHISTLE > 0,
            finish: head.sound_mask & SOUND_FINISH > 0,
            clap: head.sound_mask & SOUND_CLAP > 0,
            hit_sample,
            kind,
        }
    }

    /// End of the object's active interval. Always recomputed from `time`
    /// plus the variant duration; never stored on its own.
    pub fn end_time(&self) -> i32 {
        match self.kind {
            HitObjectKind::Circle => self.time,
            HitObjectKind::Drumroll { duration, .. } => self.time + duration,
            HitObjectKind::Spinner { duration } => self.time + duration,
        }
    }

    pub fn is_circle(&self) -> bool {
        matches!(self.kind, HitObjectKind::Circle)
    }

    pub fn is_drumroll(&self) -> bool {
        matches!(self.kind, HitObjectKind::Drumroll { .. })
    }

    pub fn is_spinner(&self) -> bool {
        matches!(self.kind, HitObjectKind::Spinner { .. })
    }

    pub fn type_mask(&self) -> u32 {
        let kind_bit = match self.kind {
            HitObjectKind::Circle => TYPE_CIRCLE,
            HitObjectKind::Drumroll { .. } => TYPE_SLIDER,
            HitObjectKind::Spinner { .. } => TYPE_SPINNER,
        };

        let mut mask = kind_bit | ((self.color_skip & COLOR_SKIP_MASK) << COLOR_SKIP_SHIFT);
        if self.new_combo {
            mask |= TYPE_NEW_COMBO;
        }
        mask
    }

    pub fn sound_mask(&self) -> u32 {
        let mut mask = 0;
        if self.normal {
            mask |= SOUND_NORMAL;
        }
        if self.whistle {
            mask |= SOUND_WHISTLE;
        }
        if self.finish {
            mask |= SOUND_FINISH;
        }
        if self.clap {
            mask |= SOUND_CLAP;
        }
        mask
    }

    /// Serializes back to a record line. Field-for-field inverse of the
    /// decoders for everything the model keeps.
    pub fn encode(&self) -> String {
        let mut line = format!(
            "{},{},{},{},{}",
            self.x,
            self.y,
            self.time,
            self.type_mask(),
            self.sound_mask()
        );

        match &self.kind {
            HitObjectKind::Circle => {}
            HitObjectKind::Drumroll {
                curve,
                points,
                repeats,
                pixel_length,
                ..
            } => {
                let _ = write!(line, ",{}", curve.tag());
                for (px, py) in points {
                    let _ = write!(line, "{}{}:{}", CURVE_DELIMITER, px, py);
                }
                let _ = write!(line, ",{},{}", repeats, pixel_length);
            }
            HitObjectKind::Spinner { duration } => {
                let _ = write!(line, ",{}", duration);
            }
        }

        if !self.hit_sample.is_empty() {
            line.push(RECORD_DELIMITER);
            let samples: Vec<String> = self.hit_sample.iter().map(i32::to_string).collect();
            line.push_str(&samples.join(&SAMPLE_DELIMITER.to_string()));
        }

        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn spinner_decoder_reads_every_field() {
        let object = HitObject::decode_spinner("256,192,1000,5,0,5000,0:0:0:0:").unwrap();

        assert_eq!(object.x, 256);
        assert_eq!(object.y, 192);
        assert_eq!(object.time, 1000);
        assert!(object.new_combo);
        assert_eq!(object.color_skip, 0);
        assert!(!object.normal && !object.whistle && !object.finish && !object.clap);
        assert_eq!(object.kind, HitObjectKind::Spinner { duration: 5000 });
        assert_eq!(object.end_time(), 6000);
        assert_eq!(object.hit_sample, vec![0, 0, 0, 0]);
    }

    #[test]
    fn decode_dispatches_on_kind_bits() {
        assert!(HitObject::decode("256,192,1000,12,0,5000").unwrap().is_spinner());
        assert!(HitObject::decode("96,192,2500,2,0,L|256:192,1,140").unwrap().is_drumroll());
        assert!(HitObject::decode("64,64,100,5,0").unwrap().is_circle());
    }

    #[test]
    fn truncated_spinner_uses_defaults() {
        let object = HitObject::decode("256,192,1000,8,0,500").unwrap();
        assert_eq!(object.kind, HitObjectKind::Spinner { duration: 500 });
        assert!(object.hit_sample.is_empty());
        assert!(!object.normal && !object.whistle && !object.finish && !object.clap);
    }

    #[test]
    fn very_short_record_decodes_as_default_circle() {
        let object = HitObject::decode("64").unwrap();
        assert_eq!(object.x, 64);
        assert_eq!(object.y, 0);
        assert_eq!(object.time, 0);
        assert!(object.is_circle());
        assert!(!object.new_combo);
    }

    #[test]
    fn malformed_time_field_rejects_the_record() {
        let err = HitObject::decode("256,192,abc,0,0,500").unwrap_err();
        assert_eq!(err.field, 2);
        assert_eq!(err.raw, "abc");
    }

    #[test]
    fn hold_type_is_rejected() {
        assert!(HitObject::decode("256,192,1000,128,0").is_err());
    }

    #[test_case(0, 1000, 1000; "zero duration")]
    #[test_case(5000, -200, 4800; "negative start")]
    #[test_case(250, 0, 250; "zero start")]
    fn end_time_is_start_plus_duration(duration: i32, time: i32, end: i32) {
        let mut object = HitObject::decode_spinner("256,192,0,8,0,0").unwrap();
        object.time = time;
        object.kind = HitObjectKind::Spinner { duration };
        assert_eq!(object.end_time(), end);
    }

    #[test_case(0)]
    #[test_case(1)]
    #[test_case(3)]
    #[test_case(5)]
    #[test_case(7)]
    fn color_skip_round_trips_through_the_mask(skip: u32) {
        let mut object = HitObject::decode("0,0,0,4,0").unwrap();
        object.new_combo = true;
        object.color_skip = skip;

        let decoded = HitObject::decode(&object.encode()).unwrap();
        assert!(decoded.new_combo);
        assert_eq!(decoded.color_skip, skip);
    }

    #[test]
    fn hitsound_flags_are_independent_bits() {
        let object = HitObject::decode("0,0,0,1,10").unwrap();
        assert!(!object.normal);
        assert!(object.whistle);
        assert!(!object.finish);
        assert!(object.clap);
        assert_eq!(object.sound_mask(), 10);
    }

    #[test]
    fn full_spinner_record_round_trips() {
        let line = "256,192,1000,12,6,5000,0:0:0:0";
        let object = HitObject::decode(line).unwrap();
        assert_eq!(object.encode(), line);
    }

    #[test]
    fn circle_record_round_trips() {
        let line = "64,320,12345,5,4,1:2:3";
        let object = HitObject::decode(line).unwrap();
        assert_eq!(object.encode(), line);
    }

    #[test]
    fn drumroll_record_round_trips() {
        let line = "96,192,2500,2,8,L|256:192|320:192,2,140.5";
        let object = HitObject::decode(line).unwrap();
        assert_eq!(
            object.kind,
            HitObjectKind::Drumroll {
                curve: CurveKind::Linear,
                points: vec![(256, 192), (320, 192)],
                repeats: 2,
                pixel_length: 140.5,
                duration: 0,
            }
        );
        assert_eq!(object.encode(), line);
    }

    #[test]
    fn drumroll_with_bad_curve_is_rejected() {
        assert!(HitObject::decode("96,192,2500,2,0,Q|1:2,1,100").is_err());
        assert!(HitObject::decode("96,192,2500,2,0,L|1:x,1,100").is_err());
    }
}
