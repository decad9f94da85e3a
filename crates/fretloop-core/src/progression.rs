//! Concrete, schedulable chord progressions

use serde::{Deserialize, Serialize};

use crate::error::{FretloopError, Result};

/// Number of guitar strings
pub const STRING_COUNT: usize = 6;

/// Open-string MIDI pitches in standard tuning, low E first
pub const STANDARD_TUNING_MIDI: [u8; STRING_COUNT] = [40, 45, 50, 55, 59, 64];

/// Fret value for a string that is not played
pub const MUTED: i8 = -1;

/// Highest fret (and base fret) a voicing may use
pub const MAX_FRET: u8 = 24;

/// Highest MIDI note number
const MAX_MIDI: u8 = 127;

/// A fingering as played: fret per string (low E first) relative to `base_fret`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordVoicing {
    pub frets: [i8; STRING_COUNT],
    pub base_fret: u8,
}

impl ChordVoicing {
    pub fn new(frets: [i8; STRING_COUNT], base_fret: u8) -> Self {
        Self { frets, base_fret: base_fret.max(1) }
    }

    /// Build from an untyped fret list, rejecting anything but six valid entries
    pub fn from_slice(frets: &[i32], base_fret: u8) -> Result<Self> {
        if frets.len() != STRING_COUNT {
            return Err(FretloopError::StringCount(frets.len()));
        }
        let mut out = [MUTED; STRING_COUNT];
        for (string, (&fret, slot)) in frets.iter().zip(out.iter_mut()).enumerate() {
            if !(-1..=MAX_FRET as i32).contains(&fret) {
                return Err(FretloopError::InvalidFret { string, fret });
            }
            *slot = fret as i8;
        }
        let voicing = Self { frets: out, base_fret };
        voicing.validate()?;
        Ok(voicing)
    }

    /// Check frets and base fret are on the neck
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_FRET).contains(&self.base_fret) {
            return Err(FretloopError::InvalidBaseFret(self.base_fret));
        }
        for (string, &fret) in self.frets.iter().enumerate() {
            if !(MUTED..=MAX_FRET as i8).contains(&fret) {
                return Err(FretloopError::InvalidFret { string, fret: fret as i32 });
            }
        }
        Ok(())
    }

    /// MIDI pitch sounded by a string, or None when muted or off the MIDI range
    pub fn string_pitch(&self, string: usize) -> Option<u8> {
        let fret = *self.frets.get(string)?;
        let open = *STANDARD_TUNING_MIDI.get(string)?;
        let pitch = match fret {
            f if f < 0 => return None,
            0 => open,
            f => open
                .checked_add(self.base_fret.checked_sub(1)?)?
                .checked_add(u8::try_from(f).ok()?)?,
        };
        (pitch <= MAX_MIDI).then_some(pitch)
    }

    /// Number of strings that sound
    pub fn sounding_strings(&self) -> usize {
        self.frets.iter().filter(|&&f| f >= 0).count()
    }
}

/// One chord of a progression with its length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledChord {
    pub voicing: ChordVoicing,
    pub duration_beats: u32,
}

/// Chords ready for the transport. Rebuilt whenever key, progression or loop changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledProgression {
    chords: Vec<ScheduledChord>,
    total_beats: u32,
    beats_per_chord: u32,
}

impl ScheduledProgression {
    pub fn new(chords: Vec<ScheduledChord>, beats_per_chord: u32) -> Result<Self> {
        if chords.is_empty() {
            return Err(FretloopError::EmptyProgression);
        }
        if let Some(idx) = chords.iter().position(|c| c.duration_beats == 0) {
            return Err(FretloopError::ZeroDuration(idx));
        }
        let total_beats = chords
            .iter()
            .try_fold(0u32, |sum, c| sum.checked_add(c.duration_beats))
            .ok_or(FretloopError::ProgressionTooLong)?;
        Ok(Self { chords, total_beats, beats_per_chord })
    }

    pub fn chords(&self) -> &[ScheduledChord] {
        &self.chords
    }

    pub fn total_beats(&self) -> u32 {
        self.total_beats
    }

    pub fn beats_per_chord(&self) -> u32 {
        self.beats_per_chord
    }

    /// Eighth notes in one pass through the progression
    pub fn total_eighths(&self) -> u64 {
        self.total_beats as u64 * 2
    }

    /// Find the chord that owns `beat` (wrapped into the progression).
    ///
    /// Returns `(chord_index, beat_within_chord)`. Progressions are a handful
    /// of chords, so a linear walk over cumulative durations is enough.
    pub fn locate(&self, beat: u32) -> (usize, u32) {
        let beat = beat % self.total_beats;
        let mut beats_accum = 0;
        for (idx, chord) in self.chords.iter().enumerate() {
            if beat < beats_accum + chord.duration_beats {
                return (idx, beat - beats_accum);
            }
            beats_accum += chord.duration_beats;
        }
        // total_beats is the sum of durations, so the walk always returns above
        (self.chords.len() - 1, beat - beats_accum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chord(frets: [i8; 6], beats: u32) -> ScheduledChord {
        ScheduledChord { voicing: ChordVoicing::new(frets, 1), duration_beats: beats }
    }

    #[test]
    fn test_total_beats_is_sum_of_durations() {
        let prog = ScheduledProgression::new(
            vec![chord([-1, 3, 2, 0, 1, 0], 4), chord([3, 2, 0, 0, 0, 3], 2)],
            4,
        )
        .unwrap();
        assert_eq!(prog.total_beats(), 6);
        assert_eq!(prog.total_eighths(), 12);
    }

    #[test]
    fn test_rejects_empty_and_zero_duration() {
        assert!(matches!(ScheduledProgression::new(vec![], 4), Err(FretloopError::EmptyProgression)));
        assert!(matches!(
            ScheduledProgression::new(vec![chord([0; 6], 4), chord([0; 6], 0)], 4),
            Err(FretloopError::ZeroDuration(1))
        ));
    }

    #[test]
    fn test_locate_walks_cumulative_durations() {
        let prog = ScheduledProgression::new(
            vec![chord([0; 6], 2), chord([0; 6], 3), chord([0; 6], 1)],
            2,
        )
        .unwrap();
        assert_eq!(prog.locate(0), (0, 0));
        assert_eq!(prog.locate(1), (0, 1));
        assert_eq!(prog.locate(2), (1, 0));
        assert_eq!(prog.locate(4), (1, 2));
        assert_eq!(prog.locate(5), (2, 0));
        assert_eq!(prog.locate(6), (0, 0)); // wraps
    }

    #[test]
    fn test_string_pitch() {
        let c_major = ChordVoicing::new([-1, 3, 2, 0, 1, 0], 1);
        assert_eq!(c_major.string_pitch(0), None);
        assert_eq!(c_major.string_pitch(1), Some(48)); // C3
        assert_eq!(c_major.string_pitch(3), Some(55)); // open G
        assert_eq!(c_major.sounding_strings(), 5);

        let barre = ChordVoicing::new([1, 3, 3, 2, 1, 1], 3); // G barre at 3rd fret
        assert_eq!(barre.string_pitch(0), Some(43));
    }

    #[test]
    fn test_out_of_range_pitches_are_none() {
        let high = ChordVoicing { frets: [0, 24, 24, 24, 24, 24], base_fret: 200 };
        assert_eq!(high.string_pitch(0), Some(40));
        assert_eq!(high.string_pitch(5), None);
        let zero_base = ChordVoicing { frets: [3, 3, 3, 3, 3, 3], base_fret: 0 };
        assert_eq!(zero_base.string_pitch(1), None);
        assert_eq!(high.string_pitch(6), None);
    }

    #[test]
    fn test_from_slice_rejects_base_fret_off_the_neck() {
        assert!(matches!(
            ChordVoicing::from_slice(&[0, 24, 24, 24, 24, 24], 200),
            Err(FretloopError::InvalidBaseFret(200))
        ));
        assert!(matches!(ChordVoicing::from_slice(&[0; 6], 0), Err(FretloopError::InvalidBaseFret(0))));
        assert!(ChordVoicing::from_slice(&[1, 3, 3, 2, 1, 1], 24).is_ok());
        assert!(ChordVoicing { frets: [0, 0, 0, 0, 0, 25], base_fret: 1 }.validate().is_err());
    }

    #[test]
    fn test_total_beats_overflow_is_an_error() {
        let result = ScheduledProgression::new(vec![chord([0; 6], u32::MAX), chord([0; 6], 2)], 4);
        assert!(matches!(result, Err(FretloopError::ProgressionTooLong)));
    }

    #[test]
    fn test_from_slice_fails_fast_on_bad_length() {
        assert!(matches!(
            ChordVoicing::from_slice(&[0, 2, 2], 1),
            Err(FretloopError::StringCount(3))
        ));
        assert!(ChordVoicing::from_slice(&[0, 2, 2, 1, 0, 0], 1).is_ok());
    }
}
