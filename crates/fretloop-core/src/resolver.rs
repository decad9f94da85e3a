//! Turns the user's selection (preset or custom loop) into a schedulable progression

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{FretloopError, Result};
use crate::presets::{find_preset, ProgressionChord};
use crate::progression::{ScheduledChord, ScheduledProgression};
use crate::theory::{chord_symbol, diatonic_chord, ChordQuality, Mode, NoteName};
use crate::voicing::{resolve_voicing, VoicingLookup};

/// A progression built in the loop builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomLoop {
    pub chords: Vec<ProgressionChord>,
    pub beats_per_chord: u32,
    pub strum_genre: String,
}

impl CustomLoop {
    /// Parse a loop such as `1,5,6m,4` or `2m7@2,5:7,1maj7`.
    ///
    /// Each entry is a degree, an optional quality (`:` separator optional),
    /// and an optional `@beats` override.
    pub fn parse(spec: &str, beats_per_chord: u32, strum_genre: &str) -> Result<Self> {
        check_beats(beats_per_chord)?;
        let chords = spec
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(parse_loop_chord)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { chords, beats_per_chord, strum_genre: strum_genre.to_string() })
    }
}

const ROMAN: [&str; 7] = ["I", "II", "III", "IV", "V", "VI", "VII"];

/// Longest a single loop chord may ring, in beats
pub const MAX_CHORD_BEATS: u32 = 64;

fn check_beats(beats: u32) -> Result<u32> {
    if (1..=MAX_CHORD_BEATS).contains(&beats) {
        Ok(beats)
    } else {
        Err(FretloopError::InvalidBeats { beats, max: MAX_CHORD_BEATS })
    }
}

fn parse_loop_chord(token: &str) -> Result<ProgressionChord> {
    let (body, beats) = match token.split_once('@') {
        Some((body, beats)) => {
            let beats: u32 = beats
                .trim()
                .parse()
                .map_err(|_| FretloopError::InvalidDegree(token.to_string()))?;
            (body, Some(check_beats(beats)?))
        }
        None => (token, None),
    };

    let digits = body.chars().take_while(char::is_ascii_digit).count();
    let degree: u8 = body[..digits]
        .parse()
        .map_err(|_| FretloopError::InvalidDegree(token.to_string()))?;
    if !(1..=7).contains(&degree) {
        return Err(FretloopError::InvalidDegree(token.to_string()));
    }

    let suffix = body[digits..].trim_start_matches(':');
    let quality = if suffix.is_empty() { None } else { Some(ChordQuality::from_str(suffix)?) };

    let numeral = ROMAN[(degree - 1) as usize];
    let roman_numeral = match quality {
        None => numeral.to_string(),
        Some(ChordQuality::Minor) => numeral.to_lowercase(),
        Some(q) if q.is_minor_family() => format!("{}{}", numeral.to_lowercase(), q.key()),
        Some(q) => format!("{numeral}{}", q.suffix()),
    };

    Ok(ProgressionChord { degree, quality, roman_numeral, beats })
}

/// Where a resolved progression came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressionSource {
    Preset,
    Loop,
}

/// Preset or loop flattened to what playback needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedProgression {
    pub pattern: Vec<ProgressionChord>,
    pub beats_per_chord: u32,
    pub genre: String,
    pub source: ProgressionSource,
}

/// A selected preset wins over the active loop. An unknown preset id or an
/// empty loop resolves to nothing.
pub fn resolve_active_progression(
    selected_preset_id: Option<&str>,
    active_loop: Option<&CustomLoop>,
) -> Option<ResolvedProgression> {
    if let Some(id) = selected_preset_id {
        let Some(preset) = find_preset(id) else {
            debug!(id, "Unknown preset id");
            return None;
        };
        return Some(ResolvedProgression {
            pattern: preset.pattern.clone(),
            beats_per_chord: preset.beats_per_chord,
            genre: preset.genre.clone(),
            source: ProgressionSource::Preset,
        });
    }

    active_loop.filter(|l| !l.chords.is_empty()).map(|l| ResolvedProgression {
        pattern: l.chords.clone(),
        beats_per_chord: l.beats_per_chord,
        genre: l.strum_genre.clone(),
        source: ProgressionSource::Loop,
    })
}

/// Map each chord to a concrete voicing in the given key.
///
/// Chords whose degree has no diatonic chord are skipped. Returns None when
/// nothing playable is left.
pub fn build_scheduled_progression(
    resolved: &ResolvedProgression,
    key_root: NoteName,
    mode: Mode,
    library: &dyn VoicingLookup,
) -> Option<ScheduledProgression> {
    let key_pc = key_root.pitch_class();

    let chords: Vec<ScheduledChord> = resolved
        .pattern
        .iter()
        .filter_map(|chord| {
            let Some(diatonic) = diatonic_chord(key_pc, mode, chord.degree) else {
                warn!(degree = chord.degree, numeral = %chord.roman_numeral, "Skipping chord with invalid degree");
                return None;
            };
            let quality = chord.quality.unwrap_or(diatonic.quality);
            let (voicing, _) = resolve_voicing(library, diatonic.root, quality);
            Some(ScheduledChord {
                voicing,
                duration_beats: chord.beats.unwrap_or(resolved.beats_per_chord),
            })
        })
        .collect();

    match ScheduledProgression::new(chords, resolved.beats_per_chord) {
        Ok(progression) => Some(progression),
        Err(e) => {
            warn!(error = %e, "Progression not playable");
            None
        }
    }
}

/// Chord symbol for the "now playing" readout; falls back to the roman
/// numeral when the degree is outside the key, empty when out of range.
pub fn chord_display_name(
    resolved: &ResolvedProgression,
    chord_index: usize,
    key_root: NoteName,
    mode: Mode,
) -> String {
    let Some(chord) = resolved.pattern.get(chord_index) else {
        return String::new();
    };
    match diatonic_chord(key_root.pitch_class(), mode, chord.degree) {
        Some(diatonic) => chord_symbol(diatonic.root, chord.quality.unwrap_or(diatonic.quality), true),
        None => chord.roman_numeral.clone(),
    }
}
