//! Kick and snare backing kit

use super::{Instrument, PendingTriggers, Trigger, MAX_BLOCK_SIZE};

const SILENCE: f64 = 1.0e-4;
/// Envelope "decay" is the time to fall roughly 60 dB
const DECAY_TIME_CONSTANTS: f64 = 7.0;

#[derive(Debug, Clone, Copy)]
pub struct DrumKitParams {
    /// Kick resting pitch, Hz (C2)
    pub kick_freq: f64,
    /// Kick start pitch as a multiple of `kick_freq`
    pub kick_octaves: f64,
    pub kick_pitch_decay: f64,
    pub kick_decay: f64,
    pub snare_decay: f64,
    /// Tone body vs. noise, 0..1
    pub snare_tone: f64,
}

impl Default for DrumKitParams {
    fn default() -> Self {
        Self {
            kick_freq: 65.406,
            kick_octaves: 6.0,
            kick_pitch_decay: 0.05,
            kick_decay: 0.4,
            snare_decay: 0.2,
            snare_tone: 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct KickVoice {
    phase: f64,
    pitch_env: f64,
    amp_env: f64,
}

impl KickVoice {
    fn trigger(&mut self) {
        self.phase = 0.0;
        self.pitch_env = 1.0;
        self.amp_env = 1.0;
    }

    fn active(&self) -> bool {
        self.amp_env > SILENCE
    }

    fn tick(&mut self, dt: f64, params: &DrumKitParams) -> f64 {
        if !self.active() {
            return 0.0;
        }
        self.pitch_env *= (-dt * DECAY_TIME_CONSTANTS / params.kick_pitch_decay).exp();
        let freq = params.kick_freq * (1.0 + self.pitch_env * (params.kick_octaves - 1.0));

        self.phase += freq * dt;
        let osc = (self.phase * std::f64::consts::TAU).sin();

        self.amp_env *= (-dt * DECAY_TIME_CONSTANTS / params.kick_decay).exp();
        osc * self.amp_env
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SnareVoice {
    phase: f64,
    phase2: f64,
    tone_env: f64,
    noise_env: f64,
    filter_state: f64,
    filter_state2: f64,
}

impl SnareVoice {
    fn trigger(&mut self) {
        self.tone_env = 1.0;
        self.noise_env = 1.0;
    }

    fn active(&self) -> bool {
        self.noise_env > SILENCE
    }

    fn tick(&mut self, dt: f64, params: &DrumKitParams, rng: &mut fastrand::Rng) -> f64 {
        if !self.active() {
            return 0.0;
        }
        self.phase += 180.0 * dt;
        let tone1 = (self.phase * std::f64::consts::TAU).sin();
        self.phase2 += 330.0 * dt;
        let tone2 = (self.phase2 * std::f64::consts::TAU).sin();
        self.tone_env *= (-dt * DECAY_TIME_CONSTANTS / (params.snare_decay * 0.25)).exp();

        // Two-pole bandpass over white noise
        let noise = rng.f64() * 2.0 - 1.0;
        self.filter_state += 0.3 * (noise - self.filter_state);
        self.filter_state2 += 0.3 * 0.7 * (self.filter_state - self.filter_state2);
        let filtered = self.filter_state - self.filter_state2;
        self.noise_env *= (-dt * DECAY_TIME_CONSTANTS / params.snare_decay).exp();

        let tones = (tone1 * 0.6 + tone2 * 0.4) * self.tone_env * params.snare_tone;
        let snares = (filtered * 1.5 + noise * 0.5) * self.noise_env * (1.0 - params.snare_tone);
        tones + snares
    }
}

pub struct DrumKit {
    sample_rate: f32,
    kick: KickVoice,
    snare: SnareVoice,
    pending: PendingTriggers,
    output: Vec<f32>,
    params: DrumKitParams,
    rng: fastrand::Rng,
}

impl std::fmt::Debug for DrumKit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrumKit")
            .field("sample_rate", &self.sample_rate)
            .field("params", &self.params)
            .finish()
    }
}

impl DrumKit {
    pub fn new(sample_rate: f32, seed: u64) -> Self {
        Self {
            sample_rate,
            kick: KickVoice::default(),
            snare: SnareVoice::default(),
            pending: PendingTriggers::default(),
            output: vec![0.0; MAX_BLOCK_SIZE],
            params: DrumKitParams::default(),
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    pub fn params(&self) -> &DrumKitParams {
        &self.params
    }

    pub fn set_params(&mut self, params: DrumKitParams) {
        self.params = params;
    }
}

impl Instrument for DrumKit {
    fn name(&self) -> &str {
        "Drum Kit"
    }

    fn queue(&mut self, trigger: Trigger, sample_offset: u32) {
        if matches!(trigger, Trigger::Kick | Trigger::Snare) {
            self.pending.push(trigger, sample_offset);
        }
    }

    fn all_notes_off(&mut self) {
        self.pending.clear();
        self.kick = KickVoice::default();
        self.snare = SnareVoice::default();
    }

    fn process(&mut self, num_frames: usize) -> &[f32] {
        let frames = num_frames.min(MAX_BLOCK_SIZE);
        let dt = 1.0 / self.sample_rate as f64;
        self.pending.sort();

        for frame_idx in 0..frames {
            while let Some(trigger) = self.pending.pop_due(frame_idx) {
                match trigger {
                    Trigger::Kick => self.kick.trigger(),
                    Trigger::Snare => self.snare.trigger(),
                    _ => {}
                }
            }
            let sample = self.kick.tick(dt, &self.params)
                + self.snare.tick(dt, &self.params, &mut self.rng);
            self.output[frame_idx] = sample.clamp(-1.0, 1.0) as f32;
        }

        self.pending.advance(frames);
        &self.output[..frames]
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    fn is_idle(&self) -> bool {
        self.pending.is_empty() && !self.kick.active() && !self.snare.active()
    }
}
