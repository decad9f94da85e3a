//! Built-in sample-accurate instruments for the rhythm section

pub mod click;
pub mod drum_kit;
pub mod pluck_guitar;

pub use click::ClickVoice;
pub use drum_kit::{DrumKit, DrumKitParams};
pub use pluck_guitar::{PluckGuitar, PluckParams};

/// A sound event, positioned in the audio stream by the renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trigger {
    Pluck { string: usize, midi: u8, gain: f32, muted: bool },
    Kick,
    Snare,
    Click { downbeat: bool },
}

/// Instrument that renders queued triggers into a mono block
pub trait Instrument: Send {
    fn name(&self) -> &str;
    /// Queue a trigger to start `sample_offset` frames into the next block
    fn queue(&mut self, trigger: Trigger, sample_offset: u32);
    /// Silence every voice immediately and drop queued triggers
    fn all_notes_off(&mut self);
    fn process(&mut self, num_frames: usize) -> &[f32];
    fn set_sample_rate(&mut self, sample_rate: f32);
    /// True when nothing is sounding or queued
    fn is_idle(&self) -> bool;
}

pub(crate) const MAX_BLOCK_SIZE: usize = 4096;

/// Triggers waiting for their frame within the current block
#[derive(Debug, Default)]
pub(crate) struct PendingTriggers {
    events: Vec<(Trigger, u32)>,
}

impl PendingTriggers {
    pub fn push(&mut self, trigger: Trigger, offset: u32) {
        self.events.push((trigger, offset));
    }

    /// Sort by offset; call once per block before popping
    pub fn sort(&mut self) {
        self.events.sort_by_key(|e| e.1);
    }

    /// Next trigger due at or before `frame`
    pub fn pop_due(&mut self, frame: usize) -> Option<Trigger> {
        let &(trigger, offset) = self.events.first()?;
        if offset as usize > frame {
            return None;
        }
        self.events.remove(0);
        Some(trigger)
    }

    /// Shift remaining triggers into the next block
    pub fn advance(&mut self, frames: usize) {
        self.events.retain(|e| e.1 as usize >= frames);
        for event in &mut self.events {
            event.1 -= frames as u32;
        }
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

pub(crate) fn midi_to_freq(midi: u8) -> f64 {
    440.0 * 2f64.powf((midi as f64 - 69.0) / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_triggers_carry_over() {
        let mut pending = PendingTriggers::default();
        pending.push(Trigger::Snare, 600);
        pending.push(Trigger::Kick, 10);
        pending.sort();
        assert_eq!(pending.pop_due(5), None);
        assert_eq!(pending.pop_due(10), Some(Trigger::Kick));
        pending.advance(512);
        pending.sort();
        assert_eq!(pending.pop_due(87), None);
        assert_eq!(pending.pop_due(88), Some(Trigger::Snare));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_midi_to_freq() {
        assert!((midi_to_freq(69) - 440.0).abs() < 1e-9);
        assert!((midi_to_freq(79) - 783.99).abs() < 0.01);
    }
}
