//! Scales, chord tones and scale recommendation for a progression

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FretloopError;
use crate::presets::ProgressionChord;
use crate::theory::{diatonic_chord, ChordQuality, Mode, NoteName, PitchClass};

// ============================================================================
// Scale types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScaleType {
    Major,
    NaturalMinor,
    HarmonicMinor,
    PentatonicMajor,
    PentatonicMinor,
    Blues,
    Dorian,
    Mixolydian,
    Phrygian,
    Lydian,
}

impl ScaleType {
    /// Candidates the recommender ranks
    pub const ALL: [ScaleType; 10] = [
        Self::Major, Self::NaturalMinor, Self::Dorian, Self::Mixolydian, Self::Phrygian,
        Self::Lydian, Self::HarmonicMinor, Self::PentatonicMajor, Self::PentatonicMinor, Self::Blues,
    ];

    /// Semitones from the root
    pub fn formula(&self) -> &'static [u8] {
        match self {
            Self::Major => &[0, 2, 4, 5, 7, 9, 11],
            Self::NaturalMinor => &[0, 2, 3, 5, 7, 8, 10],
            Self::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            Self::PentatonicMajor => &[0, 2, 4, 7, 9],
            Self::PentatonicMinor => &[0, 3, 5, 7, 10],
            Self::Blues => &[0, 3, 5, 6, 7, 10],
            Self::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Self::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            Self::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            Self::Lydian => &[0, 2, 4, 6, 7, 9, 11],
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Major => "Major",
            Self::NaturalMinor => "Natural Minor",
            Self::HarmonicMinor => "Harmonic Minor",
            Self::PentatonicMajor => "Major Pentatonic",
            Self::PentatonicMinor => "Minor Pentatonic",
            Self::Blues => "Blues",
            Self::Dorian => "Dorian",
            Self::Mixolydian => "Mixolydian",
            Self::Phrygian => "Phrygian",
            Self::Lydian => "Lydian",
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::NaturalMinor => "natural-minor",
            Self::HarmonicMinor => "harmonic-minor",
            Self::PentatonicMajor => "pentatonic-major",
            Self::PentatonicMinor => "pentatonic-minor",
            Self::Blues => "blues",
            Self::Dorian => "dorian",
            Self::Mixolydian => "mixolydian",
            Self::Phrygian => "phrygian",
            Self::Lydian => "lydian",
        }
    }

    /// Five- and six-note shapes with no avoid notes
    pub fn is_pentatonic(&self) -> bool {
        matches!(self, Self::PentatonicMajor | Self::PentatonicMinor | Self::Blues)
    }
}

impl fmt::Display for ScaleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ScaleType {
    type Err = FretloopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .iter()
            .find(|t| t.key().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| FretloopError::UnknownScale(s.to_string()))
    }
}

/// A scale rooted on a pitch class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scale {
    pub root: PitchClass,
    pub scale_type: ScaleType,
    pub degrees: Vec<PitchClass>,
}

impl Scale {
    pub fn new(root: PitchClass, scale_type: ScaleType) -> Self {
        let root = root % 12;
        let degrees = scale_type.formula().iter().map(|i| (root + i) % 12).collect();
        Self { root, scale_type, degrees }
    }

    pub fn contains(&self, pc: PitchClass) -> bool {
        self.degrees.contains(&(pc % 12))
    }

    pub fn note_names(&self, prefer_sharps: bool) -> Vec<NoteName> {
        self.degrees.iter().map(|&pc| NoteName::from_pitch_class(pc, prefer_sharps)).collect()
    }
}

// ============================================================================
// Chord tones
// ============================================================================

/// Short label for a semitone interval within an octave
pub fn interval_label(semitones: u8) -> &'static str {
    const LABELS: [&str; 12] = ["R", "b2", "2", "b3", "3", "4", "b5", "5", "b6", "6", "b7", "7"];
    LABELS[(semitones % 12) as usize]
}

/// One pitch of a chord and its distance from the chord root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordTone {
    pub pitch_class: PitchClass,
    /// Semitones above the root, folded into one octave
    pub interval: u8,
}

impl ChordTone {
    pub fn label(&self) -> &'static str {
        interval_label(self.interval)
    }
}

pub fn chord_tones(root: PitchClass, quality: ChordQuality) -> Vec<ChordTone> {
    quality
        .intervals()
        .iter()
        .map(|&i| ChordTone { pitch_class: (root + i) % 12, interval: i % 12 })
        .collect()
}

/// How a fretboard note relates to the current chord and scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteRole {
    Root,
    Third,
    Fifth,
    Seventh,
    Ninth,
    Scale,
    NonScale,
}

pub fn classify_note(pc: PitchClass, tones: &[ChordTone], scale: &Scale) -> NoteRole {
    let pc = pc % 12;
    let in_scale = || if scale.contains(pc) { NoteRole::Scale } else { NoteRole::NonScale };
    let Some(tone) = tones.iter().find(|t| t.pitch_class == pc) else {
        return in_scale();
    };
    match tone.interval {
        0 => NoteRole::Root,
        3 | 4 => NoteRole::Third,
        6..=8 => NoteRole::Fifth,
        10 | 11 => NoteRole::Seventh,
        1 | 2 => NoteRole::Ninth,
        _ => in_scale(),
    }
}

// ============================================================================
// Recommendation
// ============================================================================

const W_COVERAGE: f64 = 0.60;
const W_CLASH: f64 = 0.25;
const W_PRACTICAL: f64 = 0.15;

/// How one chord sits in a candidate scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChordFit {
    pub degree: u8,
    /// Share of chord tones inside the scale
    pub coverage: f64,
    /// Chord tones outside the scale a half step from a scale note
    pub clashes: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScaleScore {
    pub scale_type: ScaleType,
    pub coverage: f64,
    /// 0 (no clashes) to 1
    pub clash_penalty: f64,
    pub per_chord: Vec<ChordFit>,
}

/// Score a scale on the key root against every chord of a progression.
///
/// Chords whose degree is outside the key contribute nothing, but still
/// count toward the average.
pub fn score_scale(
    scale_type: ScaleType,
    key_root: PitchClass,
    mode: Mode,
    progression: &[ProgressionChord],
) -> ScaleScore {
    let scale = Scale::new(key_root, scale_type);
    let mut per_chord = Vec::with_capacity(progression.len());
    let mut total_tones = 0usize;

    for chord in progression {
        let Some(diatonic) = diatonic_chord(key_root, mode, chord.degree) else {
            continue;
        };
        let tones = chord_tones(diatonic.root, chord.quality.unwrap_or(diatonic.quality));
        let covered = tones.iter().filter(|t| scale.contains(t.pitch_class)).count();
        let clashes = tones
            .iter()
            .filter(|t| !scale.contains(t.pitch_class))
            .filter(|t| scale.contains(t.pitch_class + 1) || scale.contains(t.pitch_class + 11))
            .count();

        per_chord.push(ChordFit {
            degree: chord.degree,
            coverage: if tones.is_empty() { 1.0 } else { covered as f64 / tones.len() as f64 },
            clashes,
        });
        total_tones += tones.len();
    }

    let coverage = if progression.is_empty() {
        0.0
    } else {
        per_chord.iter().map(|c| c.coverage).sum::<f64>() / progression.len() as f64
    };
    let clashes: usize = per_chord.iter().map(|c| c.clashes).sum();
    let max_clashes = (total_tones as f64 * 0.5).max(1.0);

    ScaleScore {
        scale_type,
        coverage,
        clash_penalty: (clashes as f64 / max_clashes).min(1.0),
        per_chord,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaleRecommendation {
    pub scale_type: ScaleType,
    pub root: NoteName,
    pub display_name: String,
    /// 0-100
    pub score: u8,
    pub reason: String,
    pub tags: Vec<&'static str>,
}

fn has_quality(progression: &[ProgressionChord], quality: ChordQuality) -> bool {
    progression.iter().any(|c| c.quality == Some(quality))
}

fn describe(
    scale_type: ScaleType,
    score: &ScaleScore,
    mode: Mode,
    progression: &[ProgressionChord],
) -> (String, Vec<&'static str>) {
    let mut tags = Vec::new();
    let mut reasons: Vec<&str> = Vec::new();
    let dominant = has_quality(progression, ChordQuality::Dominant7);

    if scale_type.is_pentatonic() {
        tags.push("safe-choice");
        reasons.push("No avoid notes, safe over any chord.");
    }

    match (scale_type, mode) {
        (ScaleType::Blues, _) => {
            tags.push("bluesy");
            if dominant {
                reasons.push("Classic choice over dominant 7th chords.");
            }
        }
        (ScaleType::Mixolydian, _) => {
            tags.push("modal");
            reasons.push(if dominant {
                "Idiomatic over dominant 7th chords."
            } else {
                "Major sound with a b7 for a bluesy color."
            });
        }
        (ScaleType::Dorian, Mode::Minor) => {
            tags.push("modal");
            reasons.push("Brighter than natural minor; the raised 6th sits well against dominant chords.");
        }
        (ScaleType::Dorian, Mode::Major) => {
            tags.push("modal");
            reasons.push("Works well over the minor chords in the progression.");
        }
        (ScaleType::Phrygian, _) => {
            tags.push("modal");
            reasons.push("Dark, Spanish-flavored sound.");
        }
        (ScaleType::Lydian, _) => {
            tags.push("modal");
            reasons.push("Bright, dreamy quality from the raised 4th.");
        }
        (ScaleType::HarmonicMinor, _) => {
            tags.push("classical");
            reasons.push("Strong leading tone for minor key resolution.");
        }
        (ScaleType::Major, Mode::Major) | (ScaleType::NaturalMinor, Mode::Minor) => {
            reasons.push("The parent scale of the key; covers all diatonic chord tones.");
        }
        _ => {}
    }

    if score.coverage > 0.95 && score.clash_penalty < 0.1 {
        tags.push("perfect-fit");
    }

    let reason = if reasons.is_empty() {
        format!("Covers {:.0}% of chord tones.", score.coverage * 100.0)
    } else {
        reasons.join(" ")
    };
    (reason, tags)
}

/// Rank every candidate scale on the key root for a progression, best first
pub fn recommend_scales(
    key_root: NoteName,
    mode: Mode,
    progression: &[ProgressionChord],
    top_n: usize,
) -> Vec<ScaleRecommendation> {
    if progression.is_empty() {
        return Vec::new();
    }

    let mut ranked: Vec<ScaleRecommendation> = ScaleType::ALL
        .iter()
        .map(|&scale_type| {
            let fit = score_scale(scale_type, key_root.pitch_class(), mode, progression);
            let practical = if scale_type.is_pentatonic() { W_PRACTICAL } else { 0.0 };
            let raw = fit.coverage * W_COVERAGE - fit.clash_penalty * W_CLASH + practical;
            let (reason, tags) = describe(scale_type, &fit, mode, progression);
            ScaleRecommendation {
                scale_type,
                root: key_root,
                display_name: format!("{key_root} {scale_type}"),
                score: (raw * 100.0).round().clamp(0.0, 100.0) as u8,
                reason,
                tags,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.display_name.cmp(&b.display_name)));
    ranked.truncate(top_n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chords(spec: &[(u8, Option<ChordQuality>)]) -> Vec<ProgressionChord> {
        spec.iter()
            .map(|&(degree, quality)| ProgressionChord { quality, ..ProgressionChord::new(degree, "") })
            .collect()
    }

    fn types(recs: &[ScaleRecommendation]) -> Vec<ScaleType> {
        recs.iter().map(|r| r.scale_type).collect()
    }

    #[test]
    fn test_scale_degrees() {
        let a_minor_pent = Scale::new(9, ScaleType::PentatonicMinor);
        assert_eq!(a_minor_pent.degrees, vec![9, 0, 2, 4, 7]);
        assert!(a_minor_pent.contains(21));
        let names: Vec<&str> = Scale::new(2, ScaleType::Major).note_names(true).iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["D", "E", "F#", "G", "A", "B", "C#"]);
        assert_eq!("Harmonic-Minor".parse::<ScaleType>().unwrap(), ScaleType::HarmonicMinor);
        assert!("klezmer".parse::<ScaleType>().is_err());
    }

    #[test]
    fn test_chord_tones_fold_extensions() {
        let dm9 = chord_tones(2, ChordQuality::Minor9);
        let labels: Vec<&str> = dm9.iter().map(ChordTone::label).collect();
        assert_eq!(labels, vec!["R", "b3", "5", "b7", "2"]);
        assert_eq!(dm9[4].pitch_class, 4);
    }

    #[test]
    fn test_note_roles_against_g7_in_c_major() {
        let g7 = chord_tones(7, ChordQuality::Dominant7);
        let c_major = Scale::new(0, ScaleType::Major);
        assert_eq!(classify_note(7, &g7, &c_major), NoteRole::Root);
        assert_eq!(classify_note(11, &g7, &c_major), NoteRole::Third);
        assert_eq!(classify_note(2, &g7, &c_major), NoteRole::Fifth);
        assert_eq!(classify_note(5, &g7, &c_major), NoteRole::Seventh);
        assert_eq!(classify_note(0, &g7, &c_major), NoteRole::Scale);
        assert_eq!(classify_note(6, &g7, &c_major), NoteRole::NonScale);

        let csus4 = chord_tones(0, ChordQuality::Sus4);
        assert_eq!(classify_note(5, &csus4, &c_major), NoteRole::Scale);
        let cadd9 = chord_tones(0, ChordQuality::Add9);
        assert_eq!(classify_note(2, &cadd9, &c_major), NoteRole::Ninth);
    }

    #[test]
    fn test_empty_progression_has_no_recommendations() {
        assert!(recommend_scales(NoteName::C, Mode::Major, &[], 5).is_empty());
    }

    #[test]
    fn test_major_leads_for_pop_progression() {
        let pop = chords(&[(1, None), (5, None), (6, None), (4, None)]);
        let recs = recommend_scales(NoteName::C, Mode::Major, &pop, 5);
        assert_eq!(recs[0].scale_type, ScaleType::Major);
        assert_eq!(recs[0].score, 60);
        assert_eq!(recs[0].display_name, "C Major");
        assert!(recs[0].tags.contains(&"perfect-fit"));
    }

    #[test]
    fn test_dominant_blues_favors_mixolydian_and_blues() {
        let blues = chords(&[
            (1, Some(ChordQuality::Dominant7)),
            (4, Some(ChordQuality::Dominant7)),
            (5, Some(ChordQuality::Dominant7)),
        ]);
        let recs = recommend_scales(NoteName::C, Mode::Major, &blues, 5);
        let ranked = types(&recs);
        assert_eq!(ranked[0], ScaleType::Mixolydian);
        assert!(ranked.contains(&ScaleType::Blues) || ranked.contains(&ScaleType::PentatonicMinor));
        assert!(recs[0].reason.contains("dominant 7th"));
        assert!(recs.iter().all(|r| r.score <= 100));
    }

    #[test]
    fn test_jazz_ii_v_i_keeps_major_in_top_two() {
        let jazz = chords(&[
            (2, Some(ChordQuality::Minor7)),
            (5, Some(ChordQuality::Dominant7)),
            (1, Some(ChordQuality::Major7)),
        ]);
        let recs = recommend_scales(NoteName::C, Mode::Major, &jazz, 5);
        assert!(types(&recs)[..2].contains(&ScaleType::Major));
    }

    #[test]
    fn test_minor_key_prefers_natural_minor() {
        let minor = chords(&[(1, None), (4, None), (5, None)]);
        let recs = recommend_scales(NoteName::A, Mode::Minor, &minor, 5);
        assert_eq!(recs[0].scale_type, ScaleType::NaturalMinor);
        assert_eq!(recs[0].display_name, "A Natural Minor");
    }

    #[test]
    fn test_top_n_limits_results() {
        let two = chords(&[(1, None), (4, None)]);
        assert_eq!(recommend_scales(NoteName::C, Mode::Major, &two, 3).len(), 3);
        assert_eq!(recommend_scales(NoteName::C, Mode::Major, &two, 50).len(), ScaleType::ALL.len());
    }

    #[test]
    fn test_scores_for_diatonic_triads() {
        let triads = chords(&[(1, None), (4, None), (5, None)]);
        let major = score_scale(ScaleType::Major, 0, Mode::Major, &triads);
        assert_eq!(major.coverage, 1.0);
        assert_eq!(major.clash_penalty, 0.0);

        // The raised 4th rubs against the IV chord's root
        let four = chords(&[(4, None)]);
        let lydian = score_scale(ScaleType::Lydian, 0, Mode::Major, &four);
        assert!(lydian.coverage < 1.0);
        assert_eq!(lydian.per_chord[0].clashes, 1);
    }

    #[test]
    fn test_out_of_key_degree_counts_as_empty() {
        let odd = chords(&[(1, None), (9, None)]);
        let fit = score_scale(ScaleType::Major, 0, Mode::Major, &odd);
        assert_eq!(fit.per_chord.len(), 1);
        assert_eq!(fit.coverage, 0.5);
    }
}
