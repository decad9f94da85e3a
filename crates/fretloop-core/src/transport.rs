//! Transport: count-in, the eighth-note scheduling loop, and playback controls

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::{validate_bpm, Clock, ClockCallback, EventId, EIGHTH, PPQ};
use crate::error::Result;
use crate::humanize::StrumOptions;
use crate::progression::ScheduledProgression;
use crate::strum::StrumPattern;
use crate::voices::RhythmSection;

/// Quarter-note clicks before the progression starts
pub const COUNT_IN_BEATS: u64 = 4;

/// Beats per bar for drum and metronome gating
const BAR_BEATS: u32 = 4;

/// Transport playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransportState {
    #[default]
    Idle,
    CountingIn,
    Playing,
    Paused,
}

impl TransportState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::CountingIn,
            2 => Self::Playing,
            3 => Self::Paused,
            _ => Self::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::CountingIn => 1,
            Self::Playing => 2,
            Self::Paused => 3,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::CountingIn | Self::Playing)
    }
}

type IndexCallback = Box<dyn FnMut(usize) + Send>;
type BeatCallback = Box<dyn FnMut(u32) + Send>;

/// UI notifications, delivered through the clock's draw queue
#[derive(Default)]
pub struct PlaybackCallbacks {
    on_chord_change: Option<IndexCallback>,
    on_beat: Option<BeatCallback>,
    on_eighth_note: Option<IndexCallback>,
}

impl PlaybackCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index into the progression's chords, once per chord entry
    pub fn on_chord_change(mut self, f: impl FnMut(usize) + Send + 'static) -> Self {
        self.on_chord_change = Some(Box::new(f));
        self
    }

    /// Count-in beats 0-3, then the beat within the progression
    pub fn on_beat(mut self, f: impl FnMut(u32) + Send + 'static) -> Self {
        self.on_beat = Some(Box::new(f));
        self
    }

    /// Slot in bar, 0-7, every eighth note
    pub fn on_eighth_note(mut self, f: impl FnMut(usize) + Send + 'static) -> Self {
        self.on_eighth_note = Some(Box::new(f));
        self
    }

    fn chord_change(&mut self, index: usize) {
        if let Some(f) = self.on_chord_change.as_mut() {
            f(index);
        }
    }

    fn beat(&mut self, beat: u32) {
        if let Some(f) = self.on_beat.as_mut() {
            f(beat);
        }
    }

    fn eighth_note(&mut self, slot: usize) {
        if let Some(f) = self.on_eighth_note.as_mut() {
            f(slot);
        }
    }
}

/// What one main-loop tick resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopPosition {
    pub eighth_index: u64,
    pub upbeat: bool,
    /// Quarter-note beat within the progression
    pub beat: u32,
    pub chord_index: usize,
    pub beat_within_chord: u32,
    /// Beat within a notional 4/4 bar
    pub global_beat: u32,
    pub slot_in_bar: usize,
}

impl LoopPosition {
    pub fn resolve(progression: &ScheduledProgression, eighth_index: u64) -> Self {
        let upbeat = eighth_index % 2 == 1;
        let beat = (eighth_index / 2) as u32;
        let (chord_index, beat_within_chord) = progression.locate(beat);
        let global_beat = beat % BAR_BEATS;
        Self {
            eighth_index,
            upbeat,
            beat,
            chord_index,
            beat_within_chord,
            global_beat,
            slot_in_bar: global_beat as usize * 2 + upbeat as usize,
        }
    }

    pub fn is_chord_start(&self) -> bool {
        !self.upbeat && self.beat_within_chord == 0
    }
}

/// Session-scoped state shared with clock callbacks
struct Session {
    callbacks: Mutex<PlaybackCallbacks>,
    /// Generation this session was scheduled under
    generation: u64,
    current_generation: Arc<AtomicU64>,
}

impl Session {
    fn is_live(&self) -> bool {
        self.current_generation.load(Ordering::Acquire) == self.generation
    }

    fn with_callbacks(&self, f: impl FnOnce(&mut PlaybackCallbacks)) {
        if !self.is_live() {
            return;
        }
        if let Ok(mut callbacks) = self.callbacks.lock() {
            f(&mut callbacks);
        }
    }
}

/// Translates musical time into voice triggers and UI notifications.
///
/// Only one session is live at a time: scheduling always clears first.
pub struct Transport<C: Clock> {
    clock: C,
    scheduled_event_ids: Vec<EventId>,
    loop_id: Option<EventId>,
    eighth_counter: Arc<AtomicU64>,
    state: Arc<AtomicU8>,
    loop_started: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
}

impl<C: Clock> Transport<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            scheduled_event_ids: Vec::new(),
            loop_id: None,
            eighth_counter: Arc::new(AtomicU64::new(0)),
            state: Arc::new(AtomicU8::new(TransportState::Idle.as_u8())),
            loop_started: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn state(&self) -> TransportState {
        TransportState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: TransportState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Index of the next eighth note the loop will play
    pub fn eighth_counter(&self) -> u64 {
        self.eighth_counter.load(Ordering::Acquire)
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn has_schedule(&self) -> bool {
        self.loop_id.is_some()
    }

    /// Register the count-in and the main loop for a progression.
    ///
    /// Does not start the clock; call [`Transport::resume`].
    pub fn schedule_progression(
        &mut self,
        progression: ScheduledProgression,
        pattern: StrumPattern,
        callbacks: PlaybackCallbacks,
        voices: RhythmSection,
    ) {
        self.clear();

        let session = Arc::new(Session {
            callbacks: Mutex::new(callbacks),
            generation: self.generation.load(Ordering::Acquire),
            current_generation: self.generation.clone(),
        });

        for beat in 0..COUNT_IN_BEATS {
            let metronome = voices.metronome.clone();
            let session = session.clone();
            let callback: ClockCallback = Box::new(move |tick| {
                metronome.click(tick.time, beat == 0);
                let session = session.clone();
                tick.draw.schedule(tick.time, move || {
                    session.with_callbacks(|cb| cb.beat(beat as u32));
                });
            });
            let id = self.clock.schedule_once(beat * PPQ, callback);
            self.scheduled_event_ids.push(id);
        }

        let counter = self.eighth_counter.clone();
        let state = self.state.clone();
        let loop_started = self.loop_started.clone();
        let total_eighths = progression.total_eighths();
        let chord_count = progression.chords().len();
        let total_beats = progression.total_beats();

        let main_loop: ClockCallback = Box::new(move |tick| {
            if !loop_started.swap(true, Ordering::AcqRel) {
                let _ = state.compare_exchange(
                    TransportState::CountingIn.as_u8(),
                    TransportState::Playing.as_u8(),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
            }

            let index = counter.load(Ordering::Acquire);
            counter.store((index + 1) % total_eighths, Ordering::Release);
            let pos = LoopPosition::resolve(&progression, index);

            let slot = pattern.slot(pos.slot_in_bar);
            if let Some(velocity) = slot.velocity() {
                let chord = &progression.chords()[pos.chord_index];
                let options = StrumOptions {
                    direction: slot.direction(),
                    velocity,
                    muted: slot.is_muted(),
                    ..StrumOptions::default()
                };
                voices.guitar.strum(&chord.voicing, tick.time, options);
            }

            if !pos.upbeat {
                match pos.global_beat {
                    0 | 2 => voices.drums.trigger_kick(tick.time),
                    _ => voices.drums.trigger_snare(tick.time),
                }
                if voices.metronome.is_enabled() {
                    voices.metronome.click(tick.time, pos.global_beat == 0);
                }
            }

            let session = session.clone();
            tick.draw.schedule(tick.time, move || {
                session.with_callbacks(|cb| {
                    if pos.is_chord_start() {
                        cb.chord_change(pos.chord_index);
                    }
                    if !pos.upbeat {
                        cb.beat(pos.beat);
                    }
                    cb.eighth_note(pos.slot_in_bar);
                });
            });
        });

        self.loop_id = Some(self.clock.schedule_repeat(EIGHTH, COUNT_IN_BEATS * PPQ, main_loop));
        info!(chords = chord_count, total_beats, pattern = %pattern, "Progression scheduled");
    }

    /// Change tempo; affects only events after the current position
    pub fn set_tempo(&mut self, bpm: f64) -> Result<()> {
        let bpm = validate_bpm(bpm)?;
        self.clock.set_bpm(bpm);
        debug!(bpm, "Tempo set");
        Ok(())
    }

    pub fn bpm(&self) -> f64 {
        self.clock.bpm()
    }

    /// Suspend the clock, keeping the schedule and the eighth-note counter
    pub fn pause(&mut self) {
        self.clock.pause();
        if self.state().is_active() {
            self.set_state(TransportState::Paused);
        }
    }

    /// Start or continue the clock
    pub fn resume(&mut self) {
        self.clock.start();
        let state = if self.loop_id.is_none() {
            TransportState::Idle
        } else if self.loop_started.load(Ordering::Acquire) {
            TransportState::Playing
        } else {
            TransportState::CountingIn
        };
        self.set_state(state);
    }

    /// Halt and rewind to zero. Registrations survive, so the next resume
    /// replays the count-in.
    pub fn stop(&mut self) {
        self.clock.stop();
        self.loop_started.store(false, Ordering::Release);
        self.set_state(TransportState::Idle);
    }

    /// Cancel every registration, rewind and reset the counter.
    ///
    /// UI jobs already posted by the cleared session are dropped when they
    /// come due. Safe to call with nothing scheduled.
    pub fn clear(&mut self) {
        for id in self.scheduled_event_ids.drain(..) {
            self.clock.clear(id);
        }
        if let Some(id) = self.loop_id.take() {
            self.clock.clear(id);
        }
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.stop();
        self.eighth_counter.store(0, Ordering::Release);
    }
}
