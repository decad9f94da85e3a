//! Pitch classes, note names, chord qualities and diatonic chord generation

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FretloopError;

/// Chromatic pitch as 0-11 (C = 0)
pub type PitchClass = u8;

// ============================================================================
// Note names
// ============================================================================

/// Note name without octave, including enharmonic spellings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteName {
    C,
    #[serde(rename = "C#")]
    CSharp,
    #[serde(rename = "Db")]
    DFlat,
    D,
    #[serde(rename = "D#")]
    DSharp,
    #[serde(rename = "Eb")]
    EFlat,
    E,
    F,
    #[serde(rename = "F#")]
    FSharp,
    #[serde(rename = "Gb")]
    GFlat,
    G,
    #[serde(rename = "G#")]
    GSharp,
    #[serde(rename = "Ab")]
    AFlat,
    A,
    #[serde(rename = "A#")]
    ASharp,
    #[serde(rename = "Bb")]
    BFlat,
    B,
    #[serde(rename = "Cb")]
    CFlat,
}

const SHARP_NAMES: [NoteName; 12] = [
    NoteName::C, NoteName::CSharp, NoteName::D, NoteName::DSharp, NoteName::E, NoteName::F,
    NoteName::FSharp, NoteName::G, NoteName::GSharp, NoteName::A, NoteName::ASharp, NoteName::B,
];

const FLAT_NAMES: [NoteName; 12] = [
    NoteName::C, NoteName::DFlat, NoteName::D, NoteName::EFlat, NoteName::E, NoteName::F,
    NoteName::GFlat, NoteName::G, NoteName::AFlat, NoteName::A, NoteName::BFlat, NoteName::B,
];

impl NoteName {
    pub fn pitch_class(&self) -> PitchClass {
        match self {
            Self::C => 0,
            Self::CSharp | Self::DFlat => 1,
            Self::D => 2,
            Self::DSharp | Self::EFlat => 3,
            Self::E => 4,
            Self::F => 5,
            Self::FSharp | Self::GFlat => 6,
            Self::G => 7,
            Self::GSharp | Self::AFlat => 8,
            Self::A => 9,
            Self::ASharp | Self::BFlat => 10,
            Self::B | Self::CFlat => 11,
        }
    }

    pub fn from_pitch_class(pc: PitchClass, prefer_sharps: bool) -> Self {
        let idx = (pc % 12) as usize;
        if prefer_sharps { SHARP_NAMES[idx] } else { FLAT_NAMES[idx] }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::C => "C",
            Self::CSharp => "C#",
            Self::DFlat => "Db",
            Self::D => "D",
            Self::DSharp => "D#",
            Self::EFlat => "Eb",
            Self::E => "E",
            Self::F => "F",
            Self::FSharp => "F#",
            Self::GFlat => "Gb",
            Self::G => "G",
            Self::GSharp => "G#",
            Self::AFlat => "Ab",
            Self::A => "A",
            Self::ASharp => "A#",
            Self::BFlat => "Bb",
            Self::B => "B",
            Self::CFlat => "Cb",
        }
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteName {
    type Err = FretloopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SHARP_NAMES
            .iter()
            .chain(FLAT_NAMES.iter())
            .chain(std::iter::once(&NoteName::CFlat))
            .find(|n| n.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| FretloopError::UnknownNote(s.to_string()))
    }
}

// ============================================================================
// Mode
// ============================================================================

/// Key mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Major,
    Minor,
}

impl Mode {
    /// Scale intervals (semitones from root)
    pub fn intervals(&self) -> &'static [u8; 7] {
        match self {
            Self::Major => &[0, 2, 4, 5, 7, 9, 11],
            Self::Minor => &[0, 2, 3, 5, 7, 8, 10],
        }
    }

    fn qualities(&self) -> [ChordQuality; 7] {
        use ChordQuality::*;
        match self {
            Self::Major => [Major, Minor, Minor, Major, Major, Minor, Diminished],
            Self::Minor => [Minor, Diminished, Major, Minor, Minor, Major, Major],
        }
    }

    fn roman_numerals(&self) -> [&'static str; 7] {
        match self {
            Self::Major => ["I", "ii", "iii", "IV", "V", "vi", "vii°"],
            Self::Minor => ["i", "ii°", "III", "iv", "v", "VI", "VII"],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Major => "Major",
            Self::Minor => "Minor",
        }
    }
}

const SHARP_MAJOR_KEYS: [PitchClass; 7] = [7, 2, 9, 4, 11, 6, 1];
const SHARP_MINOR_KEYS: [PitchClass; 7] = [4, 11, 6, 1, 8, 3, 10];
const FLAT_MAJOR_SPELLINGS: [NoteName; 7] = [
    NoteName::F, NoteName::BFlat, NoteName::EFlat, NoteName::AFlat,
    NoteName::DFlat, NoteName::GFlat, NoteName::CFlat,
];

/// Whether a key is conventionally spelled with sharps
pub fn prefers_sharps(key_root: NoteName, mode: Mode) -> bool {
    match mode {
        Mode::Major => {
            if FLAT_MAJOR_SPELLINGS.contains(&key_root) {
                return false;
            }
            SHARP_MAJOR_KEYS.contains(&key_root.pitch_class()) || key_root == NoteName::C
        }
        Mode::Minor => {
            let pc = key_root.pitch_class();
            let flat_spelled = matches!(
                key_root,
                NoteName::BFlat | NoteName::EFlat | NoteName::AFlat
            );
            // D, G, C, F minor live on the flat side of the circle
            if flat_spelled || matches!(pc, 2 | 7 | 0 | 5) {
                return false;
            }
            SHARP_MINOR_KEYS.contains(&pc) || pc == 9
        }
    }
}

// ============================================================================
// Chord qualities
// ============================================================================

/// Chord quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChordQuality {
    #[serde(rename = "major")]
    Major,
    #[serde(rename = "minor")]
    Minor,
    #[serde(rename = "dim")]
    Diminished,
    #[serde(rename = "aug")]
    Augmented,
    #[serde(rename = "7")]
    Dominant7,
    #[serde(rename = "maj7")]
    Major7,
    #[serde(rename = "m7")]
    Minor7,
    #[serde(rename = "m7b5")]
    HalfDiminished7,
    #[serde(rename = "sus2")]
    Sus2,
    #[serde(rename = "sus4")]
    Sus4,
    #[serde(rename = "add9")]
    Add9,
    #[serde(rename = "maj9")]
    Major9,
    #[serde(rename = "m9")]
    Minor9,
    #[serde(rename = "9")]
    Dominant9,
    #[serde(rename = "11")]
    Eleven,
    #[serde(rename = "m11")]
    Minor11,
}

impl ChordQuality {
    pub const ALL: [ChordQuality; 16] = [
        Self::Major, Self::Minor, Self::Diminished, Self::Augmented,
        Self::Dominant7, Self::Major7, Self::Minor7, Self::HalfDiminished7,
        Self::Sus2, Self::Sus4, Self::Add9, Self::Major9,
        Self::Minor9, Self::Dominant9, Self::Eleven, Self::Minor11,
    ];

    /// Get chord intervals from root
    pub fn intervals(&self) -> &'static [u8] {
        match self {
            Self::Major => &[0, 4, 7],
            Self::Minor => &[0, 3, 7],
            Self::Diminished => &[0, 3, 6],
            Self::Augmented => &[0, 4, 8],
            Self::Dominant7 => &[0, 4, 7, 10],
            Self::Major7 => &[0, 4, 7, 11],
            Self::Minor7 => &[0, 3, 7, 10],
            Self::HalfDiminished7 => &[0, 3, 6, 10],
            Self::Sus2 => &[0, 2, 7],
            Self::Sus4 => &[0, 5, 7],
            Self::Add9 => &[0, 4, 7, 14],
            Self::Major9 => &[0, 4, 7, 11, 14],
            Self::Minor9 => &[0, 3, 7, 10, 14],
            Self::Dominant9 => &[0, 4, 7, 10, 14],
            Self::Eleven => &[0, 4, 7, 10, 14, 17],
            Self::Minor11 => &[0, 3, 7, 10, 14, 17],
        }
    }

    /// Key used in voicing data (`major`, `m7`, ...)
    pub fn key(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Diminished => "dim",
            Self::Augmented => "aug",
            Self::Dominant7 => "7",
            Self::Major7 => "maj7",
            Self::Minor7 => "m7",
            Self::HalfDiminished7 => "m7b5",
            Self::Sus2 => "sus2",
            Self::Sus4 => "sus4",
            Self::Add9 => "add9",
            Self::Major9 => "maj9",
            Self::Minor9 => "m9",
            Self::Dominant9 => "9",
            Self::Eleven => "11",
            Self::Minor11 => "m11",
        }
    }

    /// Suffix appended to the root in chord symbols
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Major => "",
            Self::Minor => "m",
            other => other.key(),
        }
    }

    /// Qualities that borrow a minor voicing when no exact one exists
    pub fn is_minor_family(&self) -> bool {
        matches!(
            self,
            Self::Minor | Self::Minor7 | Self::Minor9 | Self::Minor11 | Self::HalfDiminished7 | Self::Diminished
        )
    }
}

impl FromStr for ChordQuality {
    type Err = FretloopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "" | "M" | "maj" => return Ok(Self::Major),
            "m" | "min" => return Ok(Self::Minor),
            _ => {}
        }
        Self::ALL
            .iter()
            .find(|q| q.key() == s)
            .copied()
            .ok_or_else(|| FretloopError::UnknownQuality(s.to_string()))
    }
}

// ============================================================================
// Diatonic chords
// ============================================================================

/// A triad built on one degree of a major or natural minor key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiatonicChord {
    pub degree: u8,
    pub roman_numeral: String,
    pub root: PitchClass,
    pub quality: ChordQuality,
}

/// Get the diatonic chord on a scale degree (1-7)
pub fn diatonic_chord(key_root: PitchClass, mode: Mode, degree: u8) -> Option<DiatonicChord> {
    if !(1..=7).contains(&degree) {
        return None;
    }
    let idx = (degree - 1) as usize;
    Some(DiatonicChord {
        degree,
        roman_numeral: mode.roman_numerals()[idx].to_string(),
        root: (key_root + mode.intervals()[idx]) % 12,
        quality: mode.qualities()[idx],
    })
}

/// All seven diatonic chords of a key
pub fn diatonic_chords(key_root: PitchClass, mode: Mode) -> Vec<DiatonicChord> {
    (1..=7).filter_map(|d| diatonic_chord(key_root, mode, d)).collect()
}

/// Chord symbol such as `F#m7`
pub fn chord_symbol(root: PitchClass, quality: ChordQuality, prefer_sharps: bool) -> String {
    format!("{}{}", NoteName::from_pitch_class(root, prefer_sharps), quality.suffix())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_major_diatonic_chords() {
        let chords = diatonic_chords(0, Mode::Major);
        let roots: Vec<u8> = chords.iter().map(|c| c.root).collect();
        assert_eq!(roots, vec![0, 2, 4, 5, 7, 9, 11]);
        assert_eq!(chords[0].quality, ChordQuality::Major);
        assert_eq!(chords[1].quality, ChordQuality::Minor);
        assert_eq!(chords[6].quality, ChordQuality::Diminished);
        assert_eq!(chords[5].roman_numeral, "vi");
    }

    #[test]
    fn test_a_minor_diatonic_chords() {
        let chords = diatonic_chords(9, Mode::Minor);
        assert_eq!(chords[0].root, 9);
        assert_eq!(chords[0].quality, ChordQuality::Minor);
        assert_eq!(chords[2].root, 0); // C major
        assert_eq!(chords[2].quality, ChordQuality::Major);
    }

    #[test]
    fn test_degree_out_of_range() {
        assert!(diatonic_chord(0, Mode::Major, 0).is_none());
        assert!(diatonic_chord(0, Mode::Major, 8).is_none());
    }

    #[test]
    fn test_note_parsing() {
        assert_eq!("F#".parse::<NoteName>().unwrap().pitch_class(), 6);
        assert_eq!("bb".parse::<NoteName>().unwrap(), NoteName::BFlat);
        assert!("H".parse::<NoteName>().is_err());
    }

    #[test]
    fn test_quality_parsing_and_family() {
        assert_eq!("m7b5".parse::<ChordQuality>().unwrap(), ChordQuality::HalfDiminished7);
        assert_eq!("".parse::<ChordQuality>().unwrap(), ChordQuality::Major);
        assert!(ChordQuality::Diminished.is_minor_family());
        assert!(!ChordQuality::Dominant7.is_minor_family());
    }

    #[test]
    fn test_accidental_preference() {
        assert!(prefers_sharps(NoteName::G, Mode::Major));
        assert!(!prefers_sharps(NoteName::F, Mode::Major));
        assert!(!prefers_sharps(NoteName::D, Mode::Minor));
        assert!(prefers_sharps(NoteName::E, Mode::Minor));
        assert_eq!(chord_symbol(10, ChordQuality::Major, false), "Bb");
        assert_eq!(chord_symbol(6, ChordQuality::Minor7, true), "F#m7");
    }
}
