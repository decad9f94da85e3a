//! Offline rendering of a progression to a WAV file.
//!
//! Runs the same transport, synths and renderer as live playback, but
//! drives the clock from the render loop instead of a device, with seeded
//! humanization so a render is reproducible.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fretloop_core::{
    draw_channel, FretloopError, HumanizeParams, PlaybackCallbacks, RhythmSection,
    ScheduledProgression, SharedClock, StrumPattern, TickClock, Transport, COUNT_IN_BEATS,
};
use hound::{SampleFormat, WavSpec, WavWriter};
use thiserror::Error;
use tracing::info;

use crate::renderer::{trigger_channel, RhythmRenderer};
use crate::synths::{DrumSynth, GuitarSynth, Metronome};

/// Silence after the last bar so the final strum rings out
const TAIL_SECONDS: f64 = 1.5;
const BLOCK_SIZE: usize = 512;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Core(#[from] FretloopError),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("Nothing to render: bar count is zero")]
    NoBars,
}

pub type Result<T> = std::result::Result<T, RenderError>;

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub bpm: f64,
    pub sample_rate: u32,
    pub metronome_enabled: bool,
    pub drums_muted: bool,
    pub master_volume_db: f64,
    /// Seed for strum humanization and instrument noise
    pub seed: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            sample_rate: 48_000,
            metronome_enabled: false,
            drums_muted: false,
            master_volume_db: 0.0,
            seed: 0x5eed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderSummary {
    pub path: PathBuf,
    pub frames: usize,
    pub seconds: f64,
    pub peak: f32,
}

/// Render the count-in plus `bars` bars of the looped progression, then a
/// short tail, as mono samples
pub fn render_progression(
    progression: ScheduledProgression,
    pattern: StrumPattern,
    settings: &RenderSettings,
    bars: u32,
) -> Result<Vec<f32>> {
    if bars == 0 {
        return Err(RenderError::NoBars);
    }

    // No UI in an offline render: the draw queue is dropped and jobs are discarded
    let (draw, _) = draw_channel();
    let clock = SharedClock::new(TickClock::new(settings.bpm, draw));
    let mut transport = Transport::new(clock.clone());
    transport.set_tempo(settings.bpm)?;

    let (tx, rx) = trigger_channel();
    let mut renderer = RhythmRenderer::new(settings.sample_rate, rx, settings.seed);
    renderer.set_master_db(settings.master_volume_db);

    let guitar = Arc::new(GuitarSynth::with_humanize(
        tx.clone(),
        HumanizeParams::default(),
        settings.seed,
    ));
    let drums = Arc::new(DrumSynth::new(tx.clone()));
    drums.set_muted(settings.drums_muted);
    let metronome = Arc::new(Metronome::new(tx));
    metronome.set_enabled(settings.metronome_enabled);

    transport.schedule_progression(
        progression,
        pattern,
        PlaybackCallbacks::new(),
        RhythmSection::new(guitar, drums, metronome),
    );
    transport.resume();

    let sr = settings.sample_rate as f64;
    let seconds_per_beat = 60.0 / settings.bpm;
    let music_end = (COUNT_IN_BEATS as f64 + bars as f64 * 4.0) * seconds_per_beat;
    let total_frames = ((music_end + TAIL_SECONDS) * sr).ceil() as usize;

    let mut samples = vec![0.0f32; total_frames];
    let mut rendered = 0;
    for block in samples.chunks_mut(BLOCK_SIZE) {
        let block_start = rendered as f64 / sr;
        let block_end = (rendered + block.len()) as f64 / sr;

        // Events exactly at music_end belong to the next, unrendered bar
        clock.advance_to(block_end.min(music_end));
        if block_end >= music_end && transport.has_schedule() {
            transport.clear();
        }

        renderer.render(block, block_start);
        rendered += block.len();
    }

    Ok(samples)
}

/// Render and write a 32-bit float mono WAV
pub fn render_progression_to_wav(
    path: impl AsRef<Path>,
    progression: ScheduledProgression,
    pattern: StrumPattern,
    settings: &RenderSettings,
    bars: u32,
) -> Result<RenderSummary> {
    let path = path.as_ref();
    let samples = render_progression(progression, pattern, settings, bars)?;

    let spec = WavSpec {
        channels: 1,
        sample_rate: settings.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &sample in &samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    let summary = RenderSummary {
        path: path.to_path_buf(),
        frames: samples.len(),
        seconds: samples.len() as f64 / settings.sample_rate as f64,
        peak,
    };
    info!(
        path = %path.display(),
        frames = summary.frames,
        seconds = summary.seconds,
        peak,
        "Rendered progression"
    );
    Ok(summary)
}
