//! Guitar voicing lookup and the exact -> family -> open-shape fallback chain

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::progression::{ChordVoicing, MUTED, STRING_COUNT};
use crate::theory::{ChordQuality, NoteName, PitchClass};

/// A chord diagram: frets, fingering and barres, low E first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoicingPosition {
    pub frets: [i8; STRING_COUNT],
    pub fingers: [u8; STRING_COUNT],
    #[serde(default)]
    pub barres: Vec<u8>,
    pub base_fret: u8,
}

impl VoicingPosition {
    pub fn voicing(&self) -> ChordVoicing {
        ChordVoicing { frets: self.frets, base_fret: self.base_fret }
    }
}

/// Source of chord diagrams
pub trait VoicingLookup {
    /// All known positions for a chord, preferred first
    fn positions(&self, root: PitchClass, quality: ChordQuality) -> &[VoicingPosition];

    /// Preferred position, if any
    fn default_position(&self, root: PitchClass, quality: ChordQuality) -> Option<&VoicingPosition> {
        self.positions(root, quality).first()
    }
}

// ============================================================================
// Fallback chain
// ============================================================================

/// One step of the voicing fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoicingStrategy {
    /// Exact root + quality match
    Exact,
    /// Plain major or minor voicing of the same root
    Family,
    /// Hardcoded open E / Em shape
    OpenShape,
}

/// Strategies tried in order until one yields a voicing
pub const FALLBACK_CHAIN: [VoicingStrategy; 3] =
    [VoicingStrategy::Exact, VoicingStrategy::Family, VoicingStrategy::OpenShape];

const OPEN_E_MAJOR: [i8; STRING_COUNT] = [0, 0, 1, 2, 2, 0];
const OPEN_E_MINOR: [i8; STRING_COUNT] = [0, 2, 2, 0, 0, 0];

impl VoicingStrategy {
    pub fn attempt(
        &self,
        lookup: &dyn VoicingLookup,
        root: PitchClass,
        quality: ChordQuality,
    ) -> Option<ChordVoicing> {
        match self {
            Self::Exact => lookup.default_position(root, quality).map(VoicingPosition::voicing),
            Self::Family => {
                let family = if quality.is_minor_family() { ChordQuality::Minor } else { ChordQuality::Major };
                lookup.default_position(root, family).map(VoicingPosition::voicing)
            }
            Self::OpenShape => {
                // Always succeeds; the chain never comes back empty
                let frets = if quality.is_minor_family() { OPEN_E_MINOR } else { OPEN_E_MAJOR };
                Some(ChordVoicing::new(frets, 1))
            }
        }
    }
}

/// Resolve a voicing through the fallback chain, reporting which strategy matched
pub fn resolve_voicing(
    lookup: &dyn VoicingLookup,
    root: PitchClass,
    quality: ChordQuality,
) -> (ChordVoicing, VoicingStrategy) {
    for strategy in FALLBACK_CHAIN {
        if let Some(voicing) = strategy.attempt(lookup, root, quality) {
            if strategy != VoicingStrategy::Exact {
                debug!(root, quality = quality.key(), ?strategy, "Voicing fallback used");
            }
            return (voicing, strategy);
        }
    }
    unreachable!("open-shape strategy always yields a voicing")
}

// ============================================================================
// Library
// ============================================================================

/// Serialized form of one chord's positions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoicingEntry {
    pub root: NoteName,
    pub quality: ChordQuality,
    pub positions: Vec<VoicingPosition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct VoicingFile {
    chords: Vec<VoicingEntry>,
}

/// In-memory voicing table keyed by root pitch class and quality
#[derive(Debug, Clone, Default)]
pub struct VoicingLibrary {
    chords: HashMap<(PitchClass, ChordQuality), Vec<VoicingPosition>>,
}

impl VoicingLookup for VoicingLibrary {
    fn positions(&self, root: PitchClass, quality: ChordQuality) -> &[VoicingPosition] {
        self.chords.get(&(root % 12, quality)).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl VoicingLibrary {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Open-position shapes where they exist, E/A-shape barres for everything else
    pub fn builtin() -> Self {
        let mut lib = Self::empty();

        for (root, quality, frets, fingers) in OPEN_SHAPES {
            lib.insert(root.pitch_class(), *quality, VoicingPosition {
                frets: *frets,
                fingers: *fingers,
                barres: Vec::new(),
                base_fret: 1,
            });
        }

        for root in 0..12u8 {
            for quality in BARRE_QUALITIES {
                if let Some(position) = barre_position(root, quality) {
                    lib.insert(root, quality, position);
                }
            }
        }
        lib
    }

    /// Parse a JSON voicing file (`{"chords": [{"root", "quality", "positions"}]}`)
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: VoicingFile = serde_json::from_str(json)?;
        let mut lib = Self::empty();
        for entry in file.chords {
            let pc = entry.root.pitch_class();
            for position in entry.positions {
                position.voicing().validate()?;
                lib.insert(pc, entry.quality, position);
            }
        }
        Ok(lib)
    }

    /// Built-in library with a JSON file's positions taking precedence
    pub fn load_with_overrides(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let overrides = Self::from_json_str(&json)?;
        let mut lib = Self::builtin();
        for (key, positions) in overrides.chords {
            lib.chords.insert(key, positions);
        }
        Ok(lib)
    }

    pub fn insert(&mut self, root: PitchClass, quality: ChordQuality, position: VoicingPosition) {
        self.chords.entry((root % 12, quality)).or_default().push(position);
    }

    pub fn len(&self) -> usize {
        self.chords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }
}

type OpenShape = (NoteName, ChordQuality, [i8; STRING_COUNT], [u8; STRING_COUNT]);

const X: i8 = MUTED;

#[rustfmt::skip]
const OPEN_SHAPES: &[OpenShape] = &[
    (NoteName::C, ChordQuality::Major, [X, 3, 2, 0, 1, 0], [0, 3, 2, 0, 1, 0]),
    (NoteName::A, ChordQuality::Major, [X, 0, 2, 2, 2, 0], [0, 0, 1, 2, 3, 0]),
    (NoteName::G, ChordQuality::Major, [3, 2, 0, 0, 0, 3], [2, 1, 0, 0, 0, 3]),
    (NoteName::E, ChordQuality::Major, [0, 2, 2, 1, 0, 0], [0, 2, 3, 1, 0, 0]),
    (NoteName::D, ChordQuality::Major, [X, X, 0, 2, 3, 2], [0, 0, 0, 1, 3, 2]),
    (NoteName::A, ChordQuality::Minor, [X, 0, 2, 2, 1, 0], [0, 0, 2, 3, 1, 0]),
    (NoteName::E, ChordQuality::Minor, [0, 2, 2, 0, 0, 0], [0, 2, 3, 0, 0, 0]),
    (NoteName::D, ChordQuality::Minor, [X, X, 0, 2, 3, 1], [0, 0, 0, 2, 3, 1]),
    (NoteName::C, ChordQuality::Dominant7, [X, 3, 2, 3, 1, 0], [0, 3, 2, 4, 1, 0]),
    (NoteName::A, ChordQuality::Dominant7, [X, 0, 2, 0, 2, 0], [0, 0, 2, 0, 3, 0]),
    (NoteName::G, ChordQuality::Dominant7, [3, 2, 0, 0, 0, 1], [3, 2, 0, 0, 0, 1]),
    (NoteName::E, ChordQuality::Dominant7, [0, 2, 0, 1, 0, 0], [0, 2, 0, 1, 0, 0]),
    (NoteName::D, ChordQuality::Dominant7, [X, X, 0, 2, 1, 2], [0, 0, 0, 2, 1, 3]),
    (NoteName::B, ChordQuality::Dominant7, [X, 2, 1, 2, 0, 2], [0, 2, 1, 3, 0, 4]),
    (NoteName::C, ChordQuality::Major7, [X, 3, 2, 0, 0, 0], [0, 3, 2, 0, 0, 0]),
    (NoteName::A, ChordQuality::Major7, [X, 0, 2, 1, 2, 0], [0, 0, 2, 1, 3, 0]),
    (NoteName::G, ChordQuality::Major7, [3, 2, 0, 0, 0, 2], [3, 2, 0, 0, 0, 1]),
    (NoteName::E, ChordQuality::Major7, [0, 2, 1, 1, 0, 0], [0, 3, 1, 2, 0, 0]),
    (NoteName::D, ChordQuality::Major7, [X, X, 0, 2, 2, 2], [0, 0, 0, 1, 1, 1]),
    (NoteName::F, ChordQuality::Major7, [X, X, 3, 2, 1, 0], [0, 0, 3, 2, 1, 0]),
    (NoteName::A, ChordQuality::Minor7, [X, 0, 2, 0, 1, 0], [0, 0, 2, 0, 1, 0]),
    (NoteName::E, ChordQuality::Minor7, [0, 2, 0, 0, 0, 0], [0, 2, 0, 0, 0, 0]),
    (NoteName::D, ChordQuality::Minor7, [X, X, 0, 2, 1, 1], [0, 0, 0, 2, 1, 1]),
    (NoteName::A, ChordQuality::Sus2, [X, 0, 2, 2, 0, 0], [0, 0, 1, 2, 0, 0]),
    (NoteName::D, ChordQuality::Sus2, [X, X, 0, 2, 3, 0], [0, 0, 0, 1, 3, 0]),
    (NoteName::A, ChordQuality::Sus4, [X, 0, 2, 2, 3, 0], [0, 0, 1, 2, 3, 0]),
    (NoteName::D, ChordQuality::Sus4, [X, X, 0, 2, 3, 3], [0, 0, 0, 1, 2, 3]),
    (NoteName::E, ChordQuality::Sus4, [0, 2, 2, 2, 0, 0], [0, 2, 3, 4, 0, 0]),
    (NoteName::B, ChordQuality::HalfDiminished7, [X, 2, 3, 2, 3, X], [0, 1, 3, 2, 4, 0]),
];

const BARRE_QUALITIES: [ChordQuality; 8] = [
    ChordQuality::Major,
    ChordQuality::Minor,
    ChordQuality::Dominant7,
    ChordQuality::Minor7,
    ChordQuality::Major7,
    ChordQuality::Sus2,
    ChordQuality::Sus4,
    ChordQuality::HalfDiminished7,
];

/// Movable shape rooted on the low E string (frets relative to the barre)
fn e_shape(quality: ChordQuality) -> Option<([i8; STRING_COUNT], [u8; STRING_COUNT])> {
    match quality {
        ChordQuality::Major => Some(([1, 3, 3, 2, 1, 1], [1, 3, 4, 2, 1, 1])),
        ChordQuality::Minor => Some(([1, 3, 3, 1, 1, 1], [1, 3, 4, 1, 1, 1])),
        ChordQuality::Dominant7 => Some(([1, 3, 1, 2, 1, 1], [1, 3, 1, 2, 1, 1])),
        ChordQuality::Minor7 => Some(([1, 3, 1, 1, 1, 1], [1, 3, 1, 1, 1, 1])),
        _ => None,
    }
}

/// Movable shape rooted on the A string
fn a_shape(quality: ChordQuality) -> Option<([i8; STRING_COUNT], [u8; STRING_COUNT])> {
    match quality {
        ChordQuality::Major => Some(([X, 1, 3, 3, 3, 1], [0, 1, 2, 3, 4, 1])),
        ChordQuality::Minor => Some(([X, 1, 3, 3, 2, 1], [0, 1, 3, 4, 2, 1])),
        ChordQuality::Dominant7 => Some(([X, 1, 3, 1, 3, 1], [0, 1, 3, 1, 4, 1])),
        ChordQuality::Minor7 => Some(([X, 1, 3, 1, 2, 1], [0, 1, 3, 1, 2, 1])),
        ChordQuality::Major7 => Some(([X, 1, 3, 2, 3, 1], [0, 1, 3, 2, 4, 1])),
        ChordQuality::Sus2 => Some(([X, 1, 3, 3, 1, 1], [0, 1, 3, 4, 1, 1])),
        ChordQuality::Sus4 => Some(([X, 1, 3, 3, 4, 1], [0, 1, 2, 3, 4, 1])),
        ChordQuality::HalfDiminished7 => Some(([X, 1, 2, 1, 2, X], [0, 1, 3, 2, 4, 0])),
        _ => None,
    }
}

fn barre_position(root: PitchClass, quality: ChordQuality) -> Option<VoicingPosition> {
    // Fret of the root on the low E (pc 4) and A (pc 9) strings; 0 means "use 12th fret"
    let on_e = match (root + 12 - 4) % 12 { 0 => 12, n => n };
    let on_a = match (root + 12 - 9) % 12 { 0 => 12, n => n };

    let candidates = [(on_e, e_shape(quality)), (on_a, a_shape(quality))];
    let (fret, (frets, fingers)) = candidates
        .into_iter()
        .filter_map(|(fret, shape)| shape.map(|s| (fret, s)))
        .min_by_key(|(fret, _)| *fret)?;

    Some(VoicingPosition {
        frets,
        fingers,
        barres: vec![1],
        base_fret: fret,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FretloopError;

    fn sounded_pitch_classes(position: &VoicingPosition) -> Vec<u8> {
        let voicing = position.voicing();
        (0..STRING_COUNT)
            .filter_map(|s| voicing.string_pitch(s))
            .map(|p| p % 12)
            .collect()
    }

    #[test]
    fn test_builtin_positions_only_sound_chord_tones() {
        let lib = VoicingLibrary::builtin();
        for root in 0..12u8 {
            for quality in ChordQuality::ALL {
                let tones: Vec<u8> = quality.intervals().iter().map(|i| (root + i) % 12).collect();
                for position in lib.positions(root, quality) {
                    let sounded = sounded_pitch_classes(position);
                    assert!(sounded.contains(&root), "{root} {quality:?} misses its root");
                    for pc in sounded {
                        assert!(tones.contains(&pc), "{root} {quality:?} sounds {pc}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_open_shape_preferred_over_barre() {
        let lib = VoicingLibrary::builtin();
        let c = lib.default_position(0, ChordQuality::Major).unwrap();
        assert_eq!(c.frets, [X, 3, 2, 0, 1, 0]);
        assert_eq!(c.base_fret, 1);
    }

    #[test]
    fn test_every_root_has_major_and_minor() {
        let lib = VoicingLibrary::builtin();
        for root in 0..12u8 {
            assert!(lib.default_position(root, ChordQuality::Major).is_some());
            assert!(lib.default_position(root, ChordQuality::Minor).is_some());
        }
    }

    #[test]
    fn test_fallback_chain_order() {
        let lib = VoicingLibrary::builtin();

        let (_, strategy) = resolve_voicing(&lib, 0, ChordQuality::Major);
        assert_eq!(strategy, VoicingStrategy::Exact);

        // No diminished shapes are built in: B dim borrows B minor
        let (voicing, strategy) = resolve_voicing(&lib, 11, ChordQuality::Diminished);
        assert_eq!(strategy, VoicingStrategy::Family);
        assert_eq!(voicing, lib.default_position(11, ChordQuality::Minor).unwrap().voicing());

        let empty = VoicingLibrary::empty();
        let (voicing, strategy) = resolve_voicing(&empty, 2, ChordQuality::Minor7);
        assert_eq!(strategy, VoicingStrategy::OpenShape);
        assert_eq!(voicing.frets, OPEN_E_MINOR);
        let (voicing, _) = resolve_voicing(&empty, 2, ChordQuality::Add9);
        assert_eq!(voicing.frets, OPEN_E_MAJOR);
    }

    #[test]
    fn test_json_overrides() {
        let json = r#"{"chords": [{
            "root": "C", "quality": "major",
            "positions": [{"frets": [-1, 3, 5, 5, 5, 3], "fingers": [0, 1, 2, 3, 4, 1], "barres": [3], "base_fret": 1}]
        }]}"#;
        let lib = VoicingLibrary::from_json_str(json).unwrap();
        assert_eq!(lib.len(), 1);
        let c = lib.default_position(0, ChordQuality::Major).unwrap();
        assert_eq!(c.barres, vec![3]);
        assert!(VoicingLibrary::from_json_str("{").is_err());
    }

    #[test]
    fn test_json_positions_off_the_neck_are_rejected() {
        let position = |frets: &str, base_fret: u32| {
            format!(
                r#"{{"chords": [{{"root": "G", "quality": "major",
                    "positions": [{{"frets": {frets}, "fingers": [1, 3, 4, 2, 1, 1], "base_fret": {base_fret}}}]}}]}}"#
            )
        };
        assert!(matches!(
            VoicingLibrary::from_json_str(&position("[1, 3, 3, 2, 1, 1]", 250)),
            Err(FretloopError::InvalidBaseFret(250))
        ));
        assert!(matches!(
            VoicingLibrary::from_json_str(&position("[1, 3, 3, 2, 1, 1]", 0)),
            Err(FretloopError::InvalidBaseFret(0))
        ));
        assert!(matches!(
            VoicingLibrary::from_json_str(&position("[1, 3, 3, 2, 1, 90]", 3)),
            Err(FretloopError::InvalidFret { string: 5, fret: 90 })
        ));
        assert!(VoicingLibrary::from_json_str(&position("[1, 3, 3, 2, 1, 1]", 3)).is_ok());
    }
}
