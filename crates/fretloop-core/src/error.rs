//! Error types for fretloop

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FretloopError {
    #[error("Voicing must have exactly 6 strings, got {0}")]
    StringCount(usize),
    #[error("Invalid fret {fret} on string {string}")]
    InvalidFret { string: usize, fret: i32 },
    #[error("Base fret must be 1-24, got {0}")]
    InvalidBaseFret(u8),
    #[error("Strum pattern must have exactly 8 slots, got {0}")]
    PatternLength(usize),
    #[error("Unknown strum slot '{0}'")]
    UnknownSlot(char),
    #[error("Unknown note name: {0}")]
    UnknownNote(String),
    #[error("Unknown chord quality: {0}")]
    UnknownQuality(String),
    #[error("Unknown scale: {0}")]
    UnknownScale(String),
    #[error("Invalid chord degree: {0}")]
    InvalidDegree(String),
    #[error("Progression has no chords")]
    EmptyProgression,
    #[error("Chord {0} has zero duration")]
    ZeroDuration(usize),
    #[error("Beats per chord must be 1-{max}, got {beats}")]
    InvalidBeats { beats: u32, max: u32 },
    #[error("Progression is too long")]
    ProgressionTooLong,
    #[error("Tempo out of range: {0} BPM")]
    TempoOutOfRange(f64),
    #[error("Voicing library error: {0}")]
    Library(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FretloopError>;
