//! Eighth-note strum patterns and the genre table

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FretloopError, Result};

/// Eighth-note slots per 4/4 bar
pub const SLOTS_PER_BAR: usize = 8;

/// Pick direction across the strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StrumDirection {
    /// Low E to high E
    #[default]
    Down,
    /// High E to low E
    Up,
}

/// One eighth-note position of a strum pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrumSlot {
    #[serde(rename = "D")]
    Down,
    #[serde(rename = "U")]
    Up,
    #[serde(rename = "A")]
    Accent,
    #[serde(rename = "x")]
    Ghost,
    #[serde(rename = "-")]
    Rest,
}

impl StrumSlot {
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Rest)
    }

    /// Strum velocity for active slots
    pub fn velocity(&self) -> Option<f64> {
        match self {
            Self::Accent => Some(1.2),
            Self::Down => Some(0.85),
            Self::Up => Some(0.75),
            Self::Ghost => Some(0.3),
            Self::Rest => None,
        }
    }

    pub fn direction(&self) -> StrumDirection {
        match self {
            Self::Up => StrumDirection::Up,
            _ => StrumDirection::Down,
        }
    }

    /// Ghost strokes are muted, percussive hits
    pub fn is_muted(&self) -> bool {
        matches!(self, Self::Ghost)
    }

    pub fn as_char(&self) -> char {
        match self {
            Self::Down => 'D',
            Self::Up => 'U',
            Self::Accent => 'A',
            Self::Ghost => 'x',
            Self::Rest => '-',
        }
    }
}

impl TryFrom<char> for StrumSlot {
    type Error = FretloopError;

    fn try_from(c: char) -> Result<Self> {
        match c {
            'D' => Ok(Self::Down),
            'U' => Ok(Self::Up),
            'A' => Ok(Self::Accent),
            'x' | 'X' => Ok(Self::Ghost),
            '-' => Ok(Self::Rest),
            other => Err(FretloopError::UnknownSlot(other)),
        }
    }
}

/// Eight slots, one bar at eighth-note resolution: `[1, &, 2, &, 3, &, 4, &]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrumPattern([StrumSlot; SLOTS_PER_BAR]);

impl StrumPattern {
    pub const fn new(slots: [StrumSlot; SLOTS_PER_BAR]) -> Self {
        Self(slots)
    }

    /// Slot at a bar position; the index wraps modulo 8
    pub fn slot(&self, slot_in_bar: usize) -> StrumSlot {
        self.0[slot_in_bar % SLOTS_PER_BAR]
    }

    pub fn slots(&self) -> &[StrumSlot; SLOTS_PER_BAR] {
        &self.0
    }

    pub fn active_count(&self) -> usize {
        self.0.iter().filter(|s| s.is_active()).count()
    }
}

impl FromStr for StrumPattern {
    type Err = FretloopError;

    fn from_str(s: &str) -> Result<Self> {
        let chars: Vec<char> = s.chars().filter(|c| !c.is_whitespace()).collect();
        if chars.len() != SLOTS_PER_BAR {
            return Err(FretloopError::PatternLength(chars.len()));
        }
        let mut slots = [StrumSlot::Rest; SLOTS_PER_BAR];
        for (slot, c) in slots.iter_mut().zip(chars) {
            *slot = StrumSlot::try_from(c)?;
        }
        Ok(Self(slots))
    }
}

impl fmt::Display for StrumPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for slot in &self.0 {
            write!(f, "{}", slot.as_char())?;
        }
        Ok(())
    }
}

// ============================================================================
// Genre table
// ============================================================================

use StrumSlot::{Accent as A, Down as D, Ghost as G, Rest as R, Up as U};

/// Genre name -> pattern. Genre strings match `PresetProgression::genre`.
pub const GENRE_STRUM_PATTERNS: [(&str, StrumPattern); 5] = [
    // Missing downstroke on 3 gives the campfire syncopation
    ("Pop/Rock", StrumPattern::new([D, R, D, U, R, U, D, U])),
    ("Blues", StrumPattern::new([A, R, D, G, A, R, D, U])),
    ("Jazz", StrumPattern::new([D, R, G, U, R, R, D, R])),
    ("Pop-Punk", StrumPattern::new([A, D, A, D, A, D, A, D])),
    ("Folk/Country", StrumPattern::new([A, R, D, U, D, R, D, U])),
];

/// Quarter-note downstrokes for genres without their own pattern
pub const DEFAULT_STRUM_PATTERN: StrumPattern = StrumPattern::new([D, R, D, R, D, R, D, R]);

pub fn strum_pattern_for_genre(genre: &str) -> StrumPattern {
    GENRE_STRUM_PATTERNS
        .iter()
        .find(|(name, _)| *name == genre)
        .map(|(_, pattern)| *pattern)
        .unwrap_or(DEFAULT_STRUM_PATTERN)
}
