//! Mixes the rhythm section's instruments from timestamped triggers

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::trace;

use crate::native_instruments::{
    ClickVoice, DrumKit, Instrument, PluckGuitar, Trigger, MAX_BLOCK_SIZE,
};

/// A trigger stamped with the audio time it should sound at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedTrigger {
    pub time: f64,
    pub trigger: Trigger,
}

/// Create the channel synth front-ends post triggers on
pub fn trigger_channel() -> (Sender<TimedTrigger>, Receiver<TimedTrigger>) {
    unbounded()
}

pub fn db_to_gain(db: f64) -> f32 {
    10f64.powf(db / 20.0) as f32
}

/// Per-instrument levels in dB
#[derive(Debug, Clone, Copy, PartialEq)]
struct MixLevels {
    guitar_db: f64,
    drums_db: f64,
    click_db: f64,
    master_db: f64,
}

impl Default for MixLevels {
    fn default() -> Self {
        Self { guitar_db: 0.0, drums_db: -6.0, click_db: -3.0, master_db: 0.0 }
    }
}

/// Owns the instruments; turns triggers into mono sample blocks.
///
/// Triggers later than the current block wait; triggers already in the
/// past sound at the start of the block.
pub struct RhythmRenderer {
    sample_rate: u32,
    rx: Receiver<TimedTrigger>,
    waiting: Vec<TimedTrigger>,
    guitar: PluckGuitar,
    drums: DrumKit,
    click: ClickVoice,
    levels: MixLevels,
}

impl RhythmRenderer {
    pub fn new(sample_rate: u32, rx: Receiver<TimedTrigger>, seed: u64) -> Self {
        let sr = sample_rate as f32;
        Self {
            sample_rate,
            rx,
            waiting: Vec::new(),
            guitar: PluckGuitar::new(sr, seed),
            drums: DrumKit::new(sr, seed.wrapping_add(1)),
            click: ClickVoice::new(sr),
            levels: MixLevels::default(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        if sample_rate == self.sample_rate {
            return;
        }
        self.sample_rate = sample_rate;
        for instrument in self.instruments_mut() {
            instrument.set_sample_rate(sample_rate as f32);
        }
    }

    pub fn set_master_db(&mut self, db: f64) {
        self.levels.master_db = db;
    }

    fn instruments_mut(&mut self) -> [&mut dyn Instrument; 3] {
        [&mut self.guitar, &mut self.drums, &mut self.click]
    }

    /// Forget triggers not yet rendered; sounding voices ring out
    pub fn drop_pending(&mut self) {
        self.rx.try_iter().for_each(drop);
        self.waiting.clear();
    }

    /// Drop pending triggers and cut every sounding voice
    pub fn all_notes_off(&mut self) {
        self.drop_pending();
        for instrument in self.instruments_mut() {
            instrument.all_notes_off();
        }
    }

    /// True when nothing is sounding, queued or waiting
    pub fn is_idle(&self) -> bool {
        self.waiting.is_empty()
            && self.rx.is_empty()
            && self.guitar.is_idle()
            && self.drums.is_idle()
            && self.click.is_idle()
    }

    /// Triggers received but not yet due
    pub fn waiting(&self) -> usize {
        self.waiting.len() + self.rx.len()
    }

    /// Render `out.len()` mono frames; `out[0]` sounds at `block_start` seconds
    pub fn render(&mut self, out: &mut [f32], block_start: f64) {
        self.waiting.extend(self.rx.try_iter());

        let sr = self.sample_rate as f64;
        let mut done = 0;
        for chunk in out.chunks_mut(MAX_BLOCK_SIZE) {
            let chunk_start = block_start + done as f64 / sr;
            self.render_chunk(chunk, chunk_start);
            done += chunk.len();
        }
    }

    fn render_chunk(&mut self, out: &mut [f32], chunk_start: f64) {
        let frames = out.len();
        let sr = self.sample_rate as f64;
        let chunk_end = chunk_start + frames as f64 / sr;

        let mut queued = 0;
        let mut i = 0;
        while i < self.waiting.len() {
            let timed = self.waiting[i];
            if timed.time >= chunk_end {
                i += 1;
                continue;
            }
            self.waiting.swap_remove(i);
            let offset = (((timed.time - chunk_start) * sr).round().max(0.0) as usize)
                .min(frames.saturating_sub(1)) as u32;
            match timed.trigger {
                Trigger::Pluck { .. } => self.guitar.queue(timed.trigger, offset),
                Trigger::Kick | Trigger::Snare => self.drums.queue(timed.trigger, offset),
                Trigger::Click { .. } => self.click.queue(timed.trigger, offset),
            }
            queued += 1;
        }
        if queued > 0 {
            trace!(queued, at = chunk_start, "Queued triggers");
        }

        let master = db_to_gain(self.levels.master_db);
        let guitar_gain = db_to_gain(self.levels.guitar_db) * master;
        let drums_gain = db_to_gain(self.levels.drums_db) * master;
        let click_gain = db_to_gain(self.levels.click_db) * master;

        out.fill(0.0);
        mix_into(out, self.guitar.process(frames), guitar_gain);
        mix_into(out, self.drums.process(frames), drums_gain);
        mix_into(out, self.click.process(frames), click_gain);
    }
}

fn mix_into(out: &mut [f32], src: &[f32], gain: f32) {
    for (o, s) in out.iter_mut().zip(src) {
        *o += s * gain;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 48_000;

    fn first_sound(samples: &[f32]) -> Option<usize> {
        samples.iter().position(|s| s.abs() > 0.0)
    }

    #[test]
    fn test_db_to_gain() {
        assert!((db_to_gain(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_gain(-6.0) - 0.501).abs() < 1e-3);
    }

    #[test]
    fn test_trigger_placed_at_its_time() {
        let (tx, rx) = trigger_channel();
        let mut renderer = RhythmRenderer::new(SR, rx, 1);
        tx.send(TimedTrigger { time: 1.01, trigger: Trigger::Kick }).unwrap();

        let mut out = vec![0.0; 960];
        renderer.render(&mut out, 1.0);
        assert_eq!(first_sound(&out), Some(480));
    }

    #[test]
    fn test_future_trigger_waits() {
        let (tx, rx) = trigger_channel();
        let mut renderer = RhythmRenderer::new(SR, rx, 1);
        tx.send(TimedTrigger { time: 0.5, trigger: Trigger::Snare }).unwrap();

        let mut out = vec![0.0; 4800];
        renderer.render(&mut out, 0.0);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(renderer.waiting(), 1);

        let mut block = vec![0.0; 4800];
        renderer.render(&mut block, 0.5 - 0.05);
        assert_eq!(first_sound(&block), Some(2400));
    }

    #[test]
    fn test_late_trigger_sounds_at_block_start() {
        let (tx, rx) = trigger_channel();
        let mut renderer = RhythmRenderer::new(SR, rx, 1);
        tx.send(TimedTrigger { time: 0.2, trigger: Trigger::Kick }).unwrap();

        let mut out = vec![0.0; 512];
        renderer.render(&mut out, 0.3);
        assert_eq!(first_sound(&out), Some(0));
    }

    #[test]
    fn test_master_gain_scales_mix() {
        let render_peak = |master_db: f64| {
            let (tx, rx) = trigger_channel();
            let mut renderer = RhythmRenderer::new(SR, rx, 9);
            renderer.set_master_db(master_db);
            tx.send(TimedTrigger { time: 0.0, trigger: Trigger::Kick }).unwrap();
            let mut out = vec![0.0; 2048];
            renderer.render(&mut out, 0.0);
            out.iter().fold(0.0f32, |m, s| m.max(s.abs()))
        };
        let full = render_peak(0.0);
        let quiet = render_peak(-20.0);
        assert!((quiet / full - 0.1).abs() < 1e-3);
    }

    #[test]
    fn test_all_notes_off_drops_everything() {
        let (tx, rx) = trigger_channel();
        let mut renderer = RhythmRenderer::new(SR, rx, 1);
        tx.send(TimedTrigger { time: 0.0, trigger: Trigger::Kick }).unwrap();
        tx.send(TimedTrigger { time: 5.0, trigger: Trigger::Snare }).unwrap();

        let mut out = vec![0.0; 256];
        renderer.render(&mut out, 0.0);
        renderer.all_notes_off();
        assert!(renderer.is_idle());
    }
}
