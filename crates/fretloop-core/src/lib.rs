//! fretloop-core: Domain types and the rhythm scheduler for fretloop

pub mod clock;
pub mod draw;
mod error;
pub mod fretboard;
pub mod humanize;
pub mod notation;
pub mod presets;
mod progression;
pub mod resolver;
pub mod scales;
pub mod strum;
pub mod theory;
mod transport;
pub mod voices;
pub mod voicing;

pub use clock::{Clock, ClockState, EventId, SharedClock, Tick, TickClock, PPQ};
pub use draw::{draw_channel, DrawQueue, DrawScheduler};
pub use error::{FretloopError, Result};
pub use fretboard::{box_notes, render_diagram, shape_for, BoxNote, BoxNoteKind, ScaleShape, DIAGRAM_FRETS, FRET_COUNT};
pub use humanize::{plan_strum, HumanizeParams, Pluck, StrumOptions};
pub use notation::{compute_beat_groups, BeatGroup, SlotRender};
pub use presets::{find_preset, preset_progressions, PresetProgression, ProgressionChord};
pub use progression::{ChordVoicing, ScheduledChord, ScheduledProgression, STANDARD_TUNING_MIDI, STRING_COUNT};
pub use resolver::{
    build_scheduled_progression, chord_display_name, resolve_active_progression,
    CustomLoop, ProgressionSource, ResolvedProgression,
};
pub use scales::{
    chord_tones, classify_note, recommend_scales, score_scale, ChordTone, NoteRole, Scale,
    ScaleRecommendation, ScaleType,
};
pub use strum::{strum_pattern_for_genre, StrumDirection, StrumPattern, StrumSlot};
pub use theory::{ChordQuality, Mode, NoteName};
pub use transport::{LoopPosition, PlaybackCallbacks, Transport, TransportState, COUNT_IN_BEATS};
pub use voices::{DrumVoice, GuitarVoice, MetronomeVoice, RhythmSection};
pub use voicing::{VoicingLibrary, VoicingLookup};
