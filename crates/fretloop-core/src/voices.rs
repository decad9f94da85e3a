//! Voice interfaces the transport triggers.
//!
//! Implementations must return immediately: they receive the exact audio
//! time an event sounds at and defer the actual synthesis to the audio path.

use std::sync::Arc;

use crate::humanize::StrumOptions;
use crate::progression::ChordVoicing;

pub trait GuitarVoice: Send + Sync {
    fn strum(&self, voicing: &ChordVoicing, time: f64, options: StrumOptions);

    /// Single-note audition on the preview string
    fn pluck_note(&self, midi: u8, time: f64);
}

pub trait DrumVoice: Send + Sync {
    /// No-op while muted
    fn trigger_kick(&self, time: f64);
    /// No-op while muted
    fn trigger_snare(&self, time: f64);
    fn is_muted(&self) -> bool;
}

pub trait MetronomeVoice: Send + Sync {
    fn click(&self, time: f64, is_downbeat: bool);
    /// Gates main-loop clicks only; count-in always clicks
    fn is_enabled(&self) -> bool;
}

/// The three voices one playback session drives
#[derive(Clone)]
pub struct RhythmSection {
    pub guitar: Arc<dyn GuitarVoice>,
    pub drums: Arc<dyn DrumVoice>,
    pub metronome: Arc<dyn MetronomeVoice>,
}

impl RhythmSection {
    pub fn new(
        guitar: Arc<dyn GuitarVoice>,
        drums: Arc<dyn DrumVoice>,
        metronome: Arc<dyn MetronomeVoice>,
    ) -> Self {
        Self { guitar, drums, metronome }
    }
}
