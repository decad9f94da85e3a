//! Six-string plucked guitar (Karplus-Strong)

use super::{midi_to_freq, Instrument, PendingTriggers, Trigger, MAX_BLOCK_SIZE};

const STRINGS: usize = 6;
/// Longest delay line; covers pitches down to ~12 Hz at 48 kHz
const MAX_DELAY: usize = 4096;
const SILENCE: f32 = 1.0e-4;

/// Pluck model parameters
#[derive(Debug, Clone, Copy)]
pub struct PluckParams {
    /// Excitation noise amount
    pub attack_noise: f32,
    /// Lowpass cutoff in the feedback loop, Hz
    pub dampening: f32,
    /// Feedback gain per period
    pub resonance: f32,
    pub muted_dampening: f32,
    pub muted_resonance: f32,
}

impl Default for PluckParams {
    fn default() -> Self {
        Self {
            attack_noise: 1.0,
            dampening: 4000.0,
            resonance: 0.97,
            muted_dampening: 1200.0,
            muted_resonance: 0.8,
        }
    }
}

#[derive(Debug, Clone)]
struct StringVoice {
    delay: Vec<f32>,
    len: usize,
    idx: usize,
    lowpass: f32,
    lowpass_coeff: f32,
    feedback: f32,
    /// Peak level over the current period, for silence detection
    period_peak: f32,
    active: bool,
}

impl StringVoice {
    fn new() -> Self {
        Self {
            delay: vec![0.0; MAX_DELAY],
            len: 2,
            idx: 0,
            lowpass: 0.0,
            lowpass_coeff: 1.0,
            feedback: 0.0,
            period_peak: 0.0,
            active: false,
        }
    }

    fn trigger(
        &mut self,
        midi: u8,
        gain: f32,
        muted: bool,
        sample_rate: f32,
        params: &PluckParams,
        rng: &mut fastrand::Rng,
    ) {
        let freq = midi_to_freq(midi) as f32;
        self.len = ((sample_rate / freq).round() as usize).clamp(2, MAX_DELAY);
        self.idx = 0;
        self.lowpass = 0.0;
        self.period_peak = 0.0;

        let (cutoff, feedback) = if muted {
            (params.muted_dampening, params.muted_resonance)
        } else {
            (params.dampening, params.resonance)
        };
        self.lowpass_coeff = 1.0 - (-std::f32::consts::TAU * cutoff / sample_rate).exp();
        self.feedback = feedback;

        let amplitude = gain * params.attack_noise;
        for sample in &mut self.delay[..self.len] {
            *sample = (rng.f32() * 2.0 - 1.0) * amplitude;
        }
        self.active = true;
    }

    fn tick(&mut self) -> f32 {
        if !self.active {
            return 0.0;
        }
        let out = self.delay[self.idx];
        self.lowpass += self.lowpass_coeff * (out - self.lowpass);
        self.delay[self.idx] = self.lowpass * self.feedback;

        self.period_peak = self.period_peak.max(out.abs());
        self.idx += 1;
        if self.idx >= self.len {
            self.idx = 0;
            if self.period_peak < SILENCE {
                self.active = false;
            }
            self.period_peak = 0.0;
        }
        out
    }
}

/// One monophonic string voice per guitar string; re-plucking a string cuts it off
pub struct PluckGuitar {
    sample_rate: f32,
    strings: Vec<StringVoice>,
    pending: PendingTriggers,
    output: Vec<f32>,
    params: PluckParams,
    rng: fastrand::Rng,
}

impl std::fmt::Debug for PluckGuitar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluckGuitar")
            .field("sample_rate", &self.sample_rate)
            .field("ringing", &self.strings.iter().filter(|s| s.active).count())
            .finish()
    }
}

impl PluckGuitar {
    pub fn new(sample_rate: f32, seed: u64) -> Self {
        Self {
            sample_rate,
            strings: (0..STRINGS).map(|_| StringVoice::new()).collect(),
            pending: PendingTriggers::default(),
            output: vec![0.0; MAX_BLOCK_SIZE],
            params: PluckParams::default(),
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    pub fn with_params(mut self, params: PluckParams) -> Self {
        self.params = params;
        self
    }

    fn pluck(&mut self, string: usize, midi: u8, gain: f32, muted: bool) {
        let Some(voice) = self.strings.get_mut(string) else {
            tracing::warn!(string, "Pluck on unknown string");
            return;
        };
        voice.trigger(midi, gain, muted, self.sample_rate, &self.params, &mut self.rng);
    }
}

impl Instrument for PluckGuitar {
    fn name(&self) -> &str {
        "Pluck Guitar"
    }

    fn queue(&mut self, trigger: Trigger, sample_offset: u32) {
        if matches!(trigger, Trigger::Pluck { .. }) {
            self.pending.push(trigger, sample_offset);
        }
    }

    fn all_notes_off(&mut self) {
        self.pending.clear();
        for voice in &mut self.strings {
            voice.active = false;
        }
    }

    fn process(&mut self, num_frames: usize) -> &[f32] {
        let frames = num_frames.min(MAX_BLOCK_SIZE);
        self.pending.sort();

        for frame_idx in 0..frames {
            while let Some(trigger) = self.pending.pop_due(frame_idx) {
                if let Trigger::Pluck { string, midi, gain, muted } = trigger {
                    self.pluck(string, midi, gain, muted);
                }
            }
            self.output[frame_idx] = self.strings.iter_mut().map(StringVoice::tick).sum();
        }

        self.pending.advance(frames);
        &self.output[..frames]
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.strings.iter().all(|s| !s.active)
    }
}
