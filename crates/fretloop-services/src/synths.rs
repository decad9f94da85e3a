//! Voice front-ends: plan the hits and post them to the renderer.
//!
//! Every call returns immediately; the renderer places each trigger at its
//! audio time. After `dispose` the front-ends ignore calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crossbeam_channel::Sender;
use fretloop_core::humanize::REFERENCE_VELOCITY;
use fretloop_core::{
    plan_strum, ChordVoicing, DrumVoice, GuitarVoice, HumanizeParams, MetronomeVoice, StrumOptions,
};
use tracing::{debug, trace};

use crate::native_instruments::Trigger;
use crate::renderer::TimedTrigger;

/// Shared lifecycle for the three front-ends
#[derive(Debug)]
struct Outlet {
    name: &'static str,
    tx: Sender<TimedTrigger>,
    disposed: AtomicBool,
}

impl Outlet {
    fn new(name: &'static str, tx: Sender<TimedTrigger>) -> Self {
        Self { name, tx, disposed: AtomicBool::new(false) }
    }

    fn send(&self, time: f64, trigger: Trigger) {
        if self.disposed.load(Ordering::Acquire) {
            trace!(synth = self.name, "Ignoring trigger after dispose");
            return;
        }
        // Renderer gone means the engine is shutting down
        let _ = self.tx.send(TimedTrigger { time, trigger });
    }

    fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            debug!(synth = self.name, "Disposed");
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

// ============================================================================
// Guitar
// ============================================================================

/// String used for single-note auditions
const PREVIEW_STRING: usize = 0;

pub struct GuitarSynth {
    outlet: Outlet,
    humanize: HumanizeParams,
    rng: Mutex<fastrand::Rng>,
}

impl GuitarSynth {
    pub fn new(tx: Sender<TimedTrigger>) -> Self {
        Self::with_humanize(tx, HumanizeParams::default(), fastrand::u64(..))
    }

    /// Deterministic jitter for offline renders and tests
    pub fn with_humanize(tx: Sender<TimedTrigger>, humanize: HumanizeParams, seed: u64) -> Self {
        Self {
            outlet: Outlet::new("guitar", tx),
            humanize,
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }

    pub fn dispose(&self) {
        self.outlet.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.outlet.is_disposed()
    }
}

impl GuitarVoice for GuitarSynth {
    fn strum(&self, voicing: &ChordVoicing, time: f64, options: StrumOptions) {
        if self.is_disposed() {
            return;
        }
        let Ok(mut rng) = self.rng.lock() else {
            return;
        };
        let plucks = plan_strum(voicing, time, &options, &self.humanize, &mut rng);
        drop(rng);

        for pluck in plucks {
            self.outlet.send(
                pluck.time,
                Trigger::Pluck {
                    string: pluck.string,
                    midi: pluck.midi,
                    gain: pluck.gain as f32,
                    muted: pluck.muted,
                },
            );
        }
    }

    fn pluck_note(&self, midi: u8, time: f64) {
        self.outlet.send(
            time,
            Trigger::Pluck {
                string: PREVIEW_STRING,
                midi,
                gain: REFERENCE_VELOCITY as f32,
                muted: false,
            },
        );
    }
}

// ============================================================================
// Drums
// ============================================================================

pub struct DrumSynth {
    outlet: Outlet,
    muted: AtomicBool,
}

impl DrumSynth {
    pub fn new(tx: Sender<TimedTrigger>) -> Self {
        Self { outlet: Outlet::new("drums", tx), muted: AtomicBool::new(false) }
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Release);
        debug!(muted, "Drums mute changed");
    }

    pub fn dispose(&self) {
        self.outlet.dispose();
    }
}

impl DrumVoice for DrumSynth {
    fn trigger_kick(&self, time: f64) {
        if !self.is_muted() {
            self.outlet.send(time, Trigger::Kick);
        }
    }

    fn trigger_snare(&self, time: f64) {
        if !self.is_muted() {
            self.outlet.send(time, Trigger::Snare);
        }
    }

    fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }
}

// ============================================================================
// Metronome
// ============================================================================

pub struct Metronome {
    outlet: Outlet,
    enabled: AtomicBool,
}

impl Metronome {
    /// Starts disabled
    pub fn new(tx: Sender<TimedTrigger>) -> Self {
        Self { outlet: Outlet::new("metronome", tx), enabled: AtomicBool::new(false) }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
        debug!(enabled, "Metronome toggled");
    }

    pub fn dispose(&self) {
        self.outlet.dispose();
    }
}

impl MetronomeVoice for Metronome {
    fn click(&self, time: f64, is_downbeat: bool) {
        self.outlet.send(time, Trigger::Click { downbeat: is_downbeat });
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::trigger_channel;
    use fretloop_core::{StrumDirection, STRING_COUNT};

    fn c_major() -> ChordVoicing {
        ChordVoicing::new([-1, 3, 2, 0, 1, 0], 1)
    }

    #[test]
    fn test_strum_posts_one_pluck_per_sounding_string() {
        let (tx, rx) = trigger_channel();
        let guitar = GuitarSynth::with_humanize(tx, HumanizeParams::exact(), 1);
        guitar.strum(&c_major(), 2.0, StrumOptions::default());

        let hits: Vec<TimedTrigger> = rx.try_iter().collect();
        assert_eq!(hits.len(), 5);
        assert!(hits.iter().all(|h| h.time >= 2.0));
        let strings: Vec<usize> = hits
            .iter()
            .filter_map(|h| match h.trigger {
                Trigger::Pluck { string, .. } => Some(string),
                _ => None,
            })
            .collect();
        assert_eq!(strings, vec![1, 2, 3, 4, 5]);
        assert!(strings.iter().all(|&s| s < STRING_COUNT));
    }

    #[test]
    fn test_upstroke_reverses_order() {
        let (tx, rx) = trigger_channel();
        let guitar = GuitarSynth::with_humanize(tx, HumanizeParams::exact(), 1);
        let options = StrumOptions { direction: StrumDirection::Up, ..StrumOptions::default() };
        guitar.strum(&c_major(), 0.0, options);

        let first = rx.try_iter().next().map(|h| h.trigger);
        assert!(matches!(first, Some(Trigger::Pluck { string: 5, .. })));
    }

    #[test]
    fn test_pluck_note_uses_preview_string() {
        let (tx, rx) = trigger_channel();
        let guitar = GuitarSynth::new(tx);
        guitar.pluck_note(64, 1.5);
        let hit = rx.try_recv().unwrap();
        assert_eq!(hit.time, 1.5);
        assert!(matches!(hit.trigger, Trigger::Pluck { string: 0, midi: 64, muted: false, .. }));
    }

    #[test]
    fn test_muted_drums_post_nothing() {
        let (tx, rx) = trigger_channel();
        let drums = DrumSynth::new(tx);
        drums.set_muted(true);
        drums.trigger_kick(0.0);
        drums.trigger_snare(0.5);
        assert!(rx.is_empty());

        drums.set_muted(false);
        drums.trigger_kick(1.0);
        assert_eq!(rx.try_recv().unwrap().trigger, Trigger::Kick);
    }

    #[test]
    fn test_metronome_defaults_off_but_still_clicks() {
        let (tx, rx) = trigger_channel();
        let metronome = Metronome::new(tx);
        assert!(!metronome.is_enabled());
        metronome.click(0.0, true);
        assert_eq!(rx.try_recv().unwrap().trigger, Trigger::Click { downbeat: true });
    }

    #[test]
    fn test_disposed_synths_ignore_calls() {
        let (tx, rx) = trigger_channel();
        let guitar = GuitarSynth::new(tx.clone());
        let drums = DrumSynth::new(tx.clone());
        let metronome = Metronome::new(tx);

        guitar.dispose();
        drums.dispose();
        metronome.dispose();
        guitar.dispose();

        guitar.strum(&c_major(), 0.0, StrumOptions::default());
        guitar.pluck_note(60, 0.0);
        drums.trigger_kick(0.0);
        metronome.click(0.0, false);
        assert!(rx.is_empty());
    }
}
