//! fretloop-services: Synthesis, audio output and offline rendering

pub mod audio_engine;
pub mod audio_io;
pub mod native_instruments;
pub mod offline;
pub mod renderer;
pub mod synths;

pub use audio_engine::{audio_engine, AudioEngine, AudioEngineError, EngineState, LOOKAHEAD};
pub use audio_io::{default_output_device_info, AudioOutputError, OutputDeviceInfo, RealtimeOutputStream};
pub use native_instruments::{ClickVoice, DrumKit, Instrument, PluckGuitar, Trigger};
pub use offline::{render_progression, render_progression_to_wav, RenderError, RenderSettings, RenderSummary};
pub use renderer::{db_to_gain, RhythmRenderer, TimedTrigger};
pub use synths::{DrumSynth, GuitarSynth, Metronome};
