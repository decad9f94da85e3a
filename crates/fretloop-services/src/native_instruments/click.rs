//! Metronome click: short triangle blip

use super::{midi_to_freq, Instrument, PendingTriggers, Trigger, MAX_BLOCK_SIZE};

/// G5 accents the bar
const DOWNBEAT_MIDI: u8 = 79;
/// C5
const BEAT_MIDI: u8 = 72;
const ATTACK: f64 = 0.001;
const DECAY: f64 = 0.1;

#[derive(Debug)]
pub struct ClickVoice {
    sample_rate: f32,
    phase: f64,
    freq: f64,
    /// Seconds since the last click; `None` when silent
    elapsed: Option<f64>,
    pending: PendingTriggers,
    output: Vec<f32>,
}

impl ClickVoice {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            phase: 0.0,
            freq: midi_to_freq(BEAT_MIDI),
            elapsed: None,
            pending: PendingTriggers::default(),
            output: vec![0.0; MAX_BLOCK_SIZE],
        }
    }

    fn envelope(t: f64) -> f64 {
        if t < ATTACK {
            t / ATTACK
        } else {
            (1.0 - (t - ATTACK) / DECAY).max(0.0)
        }
    }

    fn tick(&mut self, dt: f64) -> f64 {
        let Some(t) = self.elapsed else {
            return 0.0;
        };
        if t >= ATTACK + DECAY {
            self.elapsed = None;
            return 0.0;
        }
        self.phase = (self.phase + self.freq * dt).fract();
        let tri = 1.0 - 4.0 * (self.phase - 0.5).abs();
        self.elapsed = Some(t + dt);
        tri * Self::envelope(t)
    }
}

impl Instrument for ClickVoice {
    fn name(&self) -> &str {
        "Click"
    }

    fn queue(&mut self, trigger: Trigger, sample_offset: u32) {
        if matches!(trigger, Trigger::Click { .. }) {
            self.pending.push(trigger, sample_offset);
        }
    }

    fn all_notes_off(&mut self) {
        self.pending.clear();
        self.elapsed = None;
    }

    fn process(&mut self, num_frames: usize) -> &[f32] {
        let frames = num_frames.min(MAX_BLOCK_SIZE);
        let dt = 1.0 / self.sample_rate as f64;
        self.pending.sort();

        for frame_idx in 0..frames {
            while let Some(trigger) = self.pending.pop_due(frame_idx) {
                if let Trigger::Click { downbeat } = trigger {
                    let midi = if downbeat { DOWNBEAT_MIDI } else { BEAT_MIDI };
                    self.freq = midi_to_freq(midi);
                    self.phase = 0.0;
                    self.elapsed = Some(0.0);
                }
            }
            self.output[frame_idx] = self.tick(dt) as f32;
        }

        self.pending.advance(frames);
        &self.output[..frames]
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.elapsed.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_crossings(samples: &[f32]) -> usize {
        samples.windows(2).filter(|w| w[0] < 0.0 && w[1] >= 0.0).count()
    }

    #[test]
    fn test_click_length() {
        let mut click = ClickVoice::new(48_000.0);
        click.queue(Trigger::Click { downbeat: false }, 0);
        let out = click.process(4096).to_vec();
        assert!(out.iter().any(|s| s.abs() > 0.5));
        assert!(!click.is_idle());

        // 101 ms is 4848 frames at 48 kHz
        let tail = click.process(1024).to_vec();
        assert!(tail[800..].iter().all(|&s| s == 0.0));
        assert!(click.is_idle());
    }

    #[test]
    fn test_downbeat_is_higher() {
        let mut down = ClickVoice::new(48_000.0);
        down.queue(Trigger::Click { downbeat: true }, 0);
        let mut up = ClickVoice::new(48_000.0);
        up.queue(Trigger::Click { downbeat: false }, 0);
        assert!(zero_crossings(down.process(2400)) > zero_crossings(up.process(2400)));
    }
}
