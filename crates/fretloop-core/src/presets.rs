//! Built-in progression library

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::theory::ChordQuality;

/// One chord of a progression, relative to the key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionChord {
    /// Scale degree 1-7
    pub degree: u8,
    /// Overrides the diatonic quality when set
    #[serde(default)]
    pub quality: Option<ChordQuality>,
    pub roman_numeral: String,
    /// Overrides the progression's beats per chord when set
    #[serde(default)]
    pub beats: Option<u32>,
}

impl ProgressionChord {
    pub fn new(degree: u8, roman_numeral: &str) -> Self {
        Self { degree, quality: None, roman_numeral: roman_numeral.to_string(), beats: None }
    }

    pub fn with_quality(mut self, quality: ChordQuality) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_beats(mut self, beats: u32) -> Self {
        self.beats = Some(beats);
        self
    }
}

/// A named progression from the built-in library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetProgression {
    pub id: String,
    pub name: String,
    pub genre: String,
    pub feel: String,
    pub pattern: Vec<ProgressionChord>,
    pub beats_per_chord: u32,
    pub examples: Vec<String>,
}

fn preset(
    id: &str,
    name: &str,
    genre: &str,
    feel: &str,
    beats_per_chord: u32,
    pattern: Vec<ProgressionChord>,
    examples: &[&str],
) -> PresetProgression {
    PresetProgression {
        id: id.to_string(),
        name: name.to_string(),
        genre: genre.to_string(),
        feel: feel.to_string(),
        pattern,
        beats_per_chord,
        examples: examples.iter().map(|s| s.to_string()).collect(),
    }
}

fn chords(degrees: &[(u8, &str)]) -> Vec<ProgressionChord> {
    degrees.iter().map(|&(d, rn)| ProgressionChord::new(d, rn)).collect()
}

fn chords_with(degrees: &[(u8, ChordQuality, &str)]) -> Vec<ProgressionChord> {
    degrees
        .iter()
        .map(|&(d, q, rn)| ProgressionChord::new(d, rn).with_quality(q))
        .collect()
}

/// All built-in presets, in display order
pub fn preset_progressions() -> &'static [PresetProgression] {
    static PRESETS: OnceLock<Vec<PresetProgression>> = OnceLock::new();
    PRESETS.get_or_init(build_presets)
}

pub fn find_preset(id: &str) -> Option<&'static PresetProgression> {
    preset_progressions().iter().find(|p| p.id == id)
}

fn build_presets() -> Vec<PresetProgression> {
    use ChordQuality::{Dominant7 as Dom7, HalfDiminished7, Major7, Minor7};

    vec![
        preset(
            "pop-I-V-vi-IV", "I-V-vi-IV", "Pop/Rock", "Uplifting, anthemic", 2,
            chords(&[(1, "I"), (5, "V"), (6, "vi"), (4, "IV")]),
            &["Let It Be - The Beatles", "Don't Stop Believin' - Journey", "Someone Like You - Adele"],
        ),
        preset(
            "pop-I-IV-V", "I-IV-V", "Pop/Rock", "Classic, upbeat", 2,
            chords(&[(1, "I"), (4, "IV"), (5, "V")]),
            &["La Bamba - Ritchie Valens", "Twist and Shout - The Beatles", "Wild Thing - The Troggs"],
        ),
        preset(
            "pop-vi-IV-I-V", "vi-IV-I-V", "Pop/Rock", "Emotional, melancholic", 2,
            chords(&[(6, "vi"), (4, "IV"), (1, "I"), (5, "V")]),
            &["Grenade - Bruno Mars", "Apologize - OneRepublic", "Africa - Toto"],
        ),
        preset(
            "pop-I-vi-IV-V", "I-vi-IV-V", "Pop/Rock", "Classic doo-wop", 2,
            chords(&[(1, "I"), (6, "vi"), (4, "IV"), (5, "V")]),
            &["Stand By Me - Ben E. King", "Every Breath You Take - The Police", "Blue Moon - The Marcels"],
        ),
        preset(
            "blues-12bar", "12-Bar Blues", "Blues", "Classic blues form", 4,
            chords_with(&[
                (1, Dom7, "I7"), (1, Dom7, "I7"), (1, Dom7, "I7"), (1, Dom7, "I7"),
                (4, Dom7, "IV7"), (4, Dom7, "IV7"), (1, Dom7, "I7"), (1, Dom7, "I7"),
                (5, Dom7, "V7"), (4, Dom7, "IV7"), (1, Dom7, "I7"), (5, Dom7, "V7"),
            ]),
            &["Sweet Home Chicago - Robert Johnson", "Hound Dog - Elvis Presley", "Johnny B. Goode - Chuck Berry"],
        ),
        preset(
            "blues-I7-IV7-V7", "I7-IV7-V7 Blues Shuffle", "Blues", "Driving shuffle rhythm", 4,
            chords_with(&[(1, Dom7, "I7"), (4, Dom7, "IV7"), (5, Dom7, "V7")]),
            &["Pride and Joy - Stevie Ray Vaughan", "Crossroads - Cream", "The Thrill Is Gone - B.B. King"],
        ),
        preset(
            "jazz-ii-V-I", "ii-V-I", "Jazz", "Classic jazz cadence", 4,
            chords_with(&[(2, Minor7, "iim7"), (5, Dom7, "V7"), (1, Major7, "Imaj7")]),
            &["Autumn Leaves - Joseph Kosma", "Satin Doll - Duke Ellington", "Blue Bossa - Kenny Dorham"],
        ),
        preset(
            "jazz-I-vi-ii-V", "I-vi-ii-V (Rhythm Changes)", "Jazz", "Bebop standard form", 2,
            chords_with(&[(1, Major7, "Imaj7"), (6, Minor7, "vim7"), (2, Minor7, "iim7"), (5, Dom7, "V7")]),
            &["I Got Rhythm - George Gershwin", "Oleo - Sonny Rollins", "Anthropology - Charlie Parker"],
        ),
        preset(
            "jazz-iihd7-V7-imaj7", "iiø7-V7-imaj7 (Minor ii-V-i)", "Jazz", "Minor key jazz progression", 4,
            chords_with(&[(2, HalfDiminished7, "iiø7"), (5, Dom7, "V7"), (1, Major7, "imaj7")]),
            &["Beautiful Love - Victor Young", "Black Orpheus - Luiz Bonfá", "Softly As In A Morning Sunrise - Sigmund Romberg"],
        ),
        preset(
            "pop-punk-I-V-vi-IV", "I-V-vi-IV (Power Chords)", "Pop-Punk", "Energetic, driving", 2,
            chords(&[(1, "I"), (5, "V"), (6, "vi"), (4, "IV")]),
            &["Fat Lip - Sum 41", "Ocean Avenue - Yellowcard", "The Anthem - Good Charlotte"],
        ),
        preset(
            "pop-punk-vi-IV-I-V", "vi-IV-I-V", "Pop-Punk", "Angsty, emotional", 2,
            chords(&[(6, "vi"), (4, "IV"), (1, "I"), (5, "V")]),
            &["Dear Maria Count Me In - All Time Low", "Check Yes Juliet - We The Kings", "MakeDamnSure - Taking Back Sunday"],
        ),
        preset(
            "folk-I-IV-I-V", "I-IV-I-V", "Folk/Country", "Simple, folk tradition", 4,
            chords(&[(1, "I"), (4, "IV"), (1, "I"), (5, "V")]),
            &["This Land Is Your Land - Woody Guthrie", "Ring of Fire - Johnny Cash", "Jambalaya - Hank Williams"],
        ),
        preset(
            "folk-I-iii-IV-V", "I-iii-IV-V", "Folk/Country", "Gentle, melodic", 4,
            chords(&[(1, "I"), (3, "iii"), (4, "IV"), (5, "V")]),
            &["Take Me Home, Country Roads - John Denver", "I Walk The Line - Johnny Cash", "Can't Help Falling In Love - Elvis Presley"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strum::GENRE_STRUM_PATTERNS;

    #[test]
    fn test_preset_ids_unique() {
        let presets = preset_progressions();
        assert_eq!(presets.len(), 13);
        for (i, p) in presets.iter().enumerate() {
            assert!(presets[i + 1..].iter().all(|q| q.id != p.id), "duplicate {}", p.id);
        }
    }

    #[test]
    fn test_every_genre_has_a_strum_pattern() {
        for p in preset_progressions() {
            assert!(GENRE_STRUM_PATTERNS.iter().any(|(g, _)| *g == p.genre), "{}", p.genre);
        }
    }

    #[test]
    fn test_twelve_bar_blues_shape() {
        let blues = find_preset("blues-12bar").unwrap();
        assert_eq!(blues.pattern.len(), 12);
        assert_eq!(blues.beats_per_chord, 4);
        let degrees: Vec<u8> = blues.pattern.iter().map(|c| c.degree).collect();
        assert_eq!(degrees, vec![1, 1, 1, 1, 4, 4, 1, 1, 5, 4, 1, 5]);
        assert!(blues.pattern.iter().all(|c| c.quality == Some(ChordQuality::Dominant7)));
    }

    #[test]
    fn test_find_unknown() {
        assert!(find_preset("nope").is_none());
    }
}
