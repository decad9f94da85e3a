//! Fretboard note map, box shapes and text diagrams

use std::fmt::Write as _;

use crate::progression::{STANDARD_TUNING_MIDI, STRING_COUNT};
use crate::scales::{interval_label, ScaleType};
use crate::theory::PitchClass;

/// Highest fret on the neck
pub const FRET_COUNT: u8 = 22;

/// Frets drawn by `render_diagram` when the caller has no preference
pub const DIAGRAM_FRETS: u8 = 15;

/// Low E first, matching `STANDARD_TUNING_MIDI`
pub const STRING_NAMES: [&str; STRING_COUNT] = ["E", "A", "D", "G", "B", "e"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FretPosition {
    pub string: usize,
    pub fret: u8,
    pub midi: u8,
    pub pitch_class: PitchClass,
}

pub fn note_midi(string: usize, fret: u8) -> Option<u8> {
    if fret > FRET_COUNT {
        return None;
    }
    STANDARD_TUNING_MIDI.get(string).map(|open| open + fret)
}

/// Every position on the neck, string by string from low E
pub fn fretboard() -> Vec<FretPosition> {
    (0..STRING_COUNT)
        .flat_map(|string| (0..=FRET_COUNT).map(move |fret| (string, fret)))
        .filter_map(|(string, fret)| {
            let midi = note_midi(string, fret)?;
            Some(FretPosition { string, fret, midi, pitch_class: midi % 12 })
        })
        .collect()
}

// ============================================================================
// Box shapes
// ============================================================================

/// A movable fingering. Offsets are frets relative to the first root
/// position, which anchors the shape on the neck.
#[derive(Debug, Clone, Copy)]
pub struct ScaleShape {
    pub id: &'static str,
    pub name: &'static str,
    pub scale_type: ScaleType,
    /// `(string, fret offset)`
    pub notes: &'static [(usize, i8)],
    pub roots: &'static [(usize, i8)],
}

const MINOR_PENT_BOX: &[(usize, i8)] = &[
    (0, 0), (0, 3), (1, 0), (1, 2), (2, 0), (2, 2),
    (3, 0), (3, 2), (4, 0), (4, 3), (5, 0), (5, 3),
];

pub const SCALE_SHAPES: &[ScaleShape] = &[
    ScaleShape {
        id: "pentatonic-minor-box1",
        name: "Minor Pentatonic Box 1",
        scale_type: ScaleType::PentatonicMinor,
        notes: MINOR_PENT_BOX,
        roots: &[(0, 0), (2, 2), (5, 0)],
    },
    ScaleShape {
        id: "blues-box1",
        name: "Blues Box 1",
        scale_type: ScaleType::Blues,
        notes: &[
            (0, 0), (0, 3), (1, 0), (1, 1), (1, 2), (2, 0), (2, 2),
            (3, 0), (3, 2), (3, 3), (4, 0), (4, 3), (5, 0), (5, 3),
        ],
        roots: &[(0, 0), (2, 2), (5, 0)],
    },
    ScaleShape {
        id: "pentatonic-major-box1",
        name: "Major Pentatonic Box 1",
        scale_type: ScaleType::PentatonicMajor,
        notes: &[
            (0, 0), (0, 2), (1, -1), (1, 2), (2, -1), (2, 2),
            (3, -1), (3, 1), (4, 0), (4, 2), (5, 0), (5, 2),
        ],
        roots: &[(0, 0), (2, 2), (5, 0)],
    },
    ScaleShape {
        id: "major-3nps",
        name: "Major 3 Notes Per String",
        scale_type: ScaleType::Major,
        notes: &[
            (0, 0), (0, 2), (0, 4), (1, 0), (1, 2), (1, 4),
            (2, 1), (2, 2), (2, 4), (3, 1), (3, 2), (3, 4),
            (4, 2), (4, 4), (4, 5), (5, 2), (5, 4), (5, 5),
        ],
        roots: &[(0, 0), (2, 2), (4, 5)],
    },
    ScaleShape {
        id: "natural-minor-3nps",
        name: "Natural Minor 3 Notes Per String",
        scale_type: ScaleType::NaturalMinor,
        notes: &[
            (0, 0), (0, 2), (0, 3), (1, 0), (1, 2), (1, 3),
            (2, 0), (2, 2), (2, 4), (3, 0), (3, 2), (3, 4),
            (4, 1), (4, 3), (4, 5), (5, 2), (5, 3), (5, 5),
        ],
        roots: &[(0, 0), (2, 2), (4, 5)],
    },
];

pub fn shape_for(scale_type: ScaleType) -> Option<&'static ScaleShape> {
    SCALE_SHAPES.iter().find(|s| s.scale_type == scale_type)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxNoteKind {
    Root,
    /// The b5 of the blues scale
    BlueNote,
    Scale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxNote {
    pub string: usize,
    pub fret: u8,
    pub kind: BoxNoteKind,
    /// Interval from the root, `R`, `b3`, `5`, ...
    pub label: &'static str,
}

/// Place a shape for `root` at the lowest position where its anchor root
/// falls on the neck. Notes that would land behind the nut or past the
/// last fret are dropped.
pub fn box_notes(shape: &ScaleShape, root: PitchClass) -> Vec<BoxNote> {
    let Some(&(anchor_string, anchor_offset)) = shape.roots.first() else {
        return Vec::new();
    };
    let Some(&anchor_open) = STANDARD_TUNING_MIDI.get(anchor_string) else {
        return Vec::new();
    };
    let root = root % 12;
    let root_fret = (i16::from(root) + 12 - i16::from(anchor_open % 12)) % 12;
    let base = root_fret - i16::from(anchor_offset);

    shape
        .notes
        .iter()
        .filter_map(|&(string, offset)| {
            let fret = u8::try_from(base + i16::from(offset)).ok()?;
            let midi = note_midi(string, fret)?;
            let interval = (midi + 12 - root) % 12;
            let kind = match interval {
                0 => BoxNoteKind::Root,
                6 if shape.scale_type == ScaleType::Blues => BoxNoteKind::BlueNote,
                _ => BoxNoteKind::Scale,
            };
            Some(BoxNote { string, fret, kind, label: interval_label(interval) })
        })
        .collect()
}

// ============================================================================
// Diagrams
// ============================================================================

/// Draw frets `0..=frets` as text, high e on top. `mark` returns the label
/// for a position or `None` to leave it blank; labels longer than three
/// characters are cut.
pub fn render_diagram<S: AsRef<str>>(
    frets: u8,
    mut mark: impl FnMut(&FretPosition) -> Option<S>,
) -> String {
    let frets = frets.min(FRET_COUNT);
    let mut out = String::from("  ");
    for fret in 0..=frets {
        let _ = write!(out, "{fret:^4}");
    }
    out.push('\n');

    for string in (0..STRING_COUNT).rev() {
        out.push_str(STRING_NAMES[string]);
        out.push(' ');
        for fret in 0..=frets {
            let cell = note_midi(string, fret)
                .map(|midi| FretPosition { string, fret, midi, pitch_class: midi % 12 })
                .and_then(|pos| mark(&pos))
                .map(|s| s.as_ref().chars().take(3).collect::<String>())
                .unwrap_or_default();
            let _ = write!(out, "{cell:-^3}");
            out.push(if fret == 0 { '‖' } else { '|' });
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scales::Scale;

    #[test]
    fn test_fretboard_covers_the_neck() {
        let board = fretboard();
        assert_eq!(board.len(), STRING_COUNT * (FRET_COUNT as usize + 1));
        assert_eq!(note_midi(0, 0), Some(40));
        assert_eq!(note_midi(5, 12), Some(76));
        assert_eq!(note_midi(5, FRET_COUNT + 1), None);
        assert_eq!(note_midi(6, 0), None);
        let a_on_low_e = board.iter().find(|p| p.string == 0 && p.fret == 5).unwrap();
        assert_eq!(a_on_low_e.pitch_class, 9);
    }

    #[test]
    fn test_every_shape_stays_in_its_scale() {
        for shape in SCALE_SHAPES {
            for root in 0..12 {
                let scale = Scale::new(root, shape.scale_type);
                let notes = box_notes(shape, root);
                assert!(!notes.is_empty(), "{} on {root}", shape.id);
                for note in &notes {
                    let pc = STANDARD_TUNING_MIDI[note.string] + note.fret;
                    assert!(scale.contains(pc), "{} on {root}: string {} fret {}", shape.id, note.string, note.fret);
                }
            }
        }
    }

    #[test]
    fn test_roots_land_on_root_positions() {
        for shape in SCALE_SHAPES {
            let root = 7;
            let notes = box_notes(shape, root);
            let roots: Vec<(usize, u8)> = notes
                .iter()
                .filter(|n| n.kind == BoxNoteKind::Root)
                .map(|n| (n.string, n.fret))
                .collect();
            let expected: Vec<(usize, u8)> = shape.roots.iter().map(|&(s, o)| (s, (3 + o) as u8)).collect();
            assert_eq!(roots.len(), expected.len(), "{}", shape.id);
            assert!(expected.iter().all(|r| roots.contains(r)), "{}", shape.id);
        }
    }

    #[test]
    fn test_a_minor_pentatonic_box_at_fifth_fret() {
        let shape = shape_for(ScaleType::PentatonicMinor).unwrap();
        let notes = box_notes(shape, 9);
        assert_eq!(notes[0], BoxNote { string: 0, fret: 5, kind: BoxNoteKind::Root, label: "R" });
        assert_eq!(notes[1].fret, 8);
        assert_eq!(notes[1].label, "b3");
    }

    #[test]
    fn test_blue_notes_marked_only_in_blues() {
        let blues = box_notes(shape_for(ScaleType::Blues).unwrap(), 9);
        let blue: Vec<(usize, u8)> = blues
            .iter()
            .filter(|n| n.kind == BoxNoteKind::BlueNote)
            .map(|n| (n.string, n.fret))
            .collect();
        assert_eq!(blue, vec![(1, 6), (3, 8)]);

        let lydian_like = box_notes(shape_for(ScaleType::Major).unwrap(), 0);
        assert!(lydian_like.iter().all(|n| n.kind != BoxNoteKind::BlueNote));
    }

    #[test]
    fn test_shapes_below_the_nut_are_clipped() {
        // E major pentatonic anchors at the open string; the -1 offsets drop
        let shape = shape_for(ScaleType::PentatonicMajor).unwrap();
        let notes = box_notes(shape, 4);
        assert_eq!(notes.len(), shape.notes.len() - 3);
        assert!(notes.iter().all(|n| n.fret <= 2));
    }

    #[test]
    fn test_render_diagram_marks_positions() {
        let text = render_diagram(DIAGRAM_FRETS, |p| (p.pitch_class == 9).then_some("R"));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), STRING_COUNT + 1);
        assert!(lines[1].starts_with("e "));
        assert!(lines[6].starts_with("E "));
        // A on the open A string and the fifth fret of both E strings
        assert!(lines[5].contains("-R-‖"));
        assert_eq!(lines[6].matches('R').count(), 1);
        assert!(lines.iter().skip(1).all(|l| l.chars().filter(|&c| c == '|').count() == DIAGRAM_FRETS as usize));
    }
}
