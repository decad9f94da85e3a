//! Musical clock: tick-addressed callbacks fired with exact audio timestamps

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::draw::DrawScheduler;
use crate::error::{FretloopError, Result};

/// Ticks per quarter note
pub const PPQ: u64 = 192;

/// Ticks per eighth note
pub const EIGHTH: u64 = PPQ / 2;

pub const MIN_BPM: f64 = 20.0;
pub const MAX_BPM: f64 = 300.0;

pub type EventId = u64;

/// Run state of the clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClockState {
    Started,
    #[default]
    Stopped,
    Paused,
}

/// Context handed to a firing callback
pub struct Tick<'a> {
    /// Audio-context time in seconds this event sounds at
    pub time: f64,
    /// Musical position of the event
    pub ticks: u64,
    /// Queue for UI work belonging to this event
    pub draw: &'a DrawScheduler,
}

pub type ClockCallback = Box<dyn FnMut(&Tick<'_>) + Send>;

/// Scheduling surface the transport is written against
pub trait Clock {
    /// Fire `callback` once when the position reaches `at_ticks`
    fn schedule_once(&mut self, at_ticks: u64, callback: ClockCallback) -> EventId;
    /// Fire `callback` at `start + n * interval` for every n >= 0
    fn schedule_repeat(&mut self, interval: u64, start: u64, callback: ClockCallback) -> EventId;
    /// Remove a registration; unknown ids are ignored
    fn clear(&mut self, id: EventId);
    fn start(&mut self);
    /// Halt and rewind to zero. Registrations are kept.
    fn stop(&mut self);
    /// Halt, keeping the position
    fn pause(&mut self);
    fn state(&self) -> ClockState;
    fn bpm(&self) -> f64;
    fn set_bpm(&mut self, bpm: f64);
    /// Current position in ticks
    fn position(&self) -> u64;
}

/// Reject tempos outside the supported range
pub fn validate_bpm(bpm: f64) -> Result<f64> {
    if bpm.is_finite() && (MIN_BPM..=MAX_BPM).contains(&bpm) {
        Ok(bpm)
    } else {
        Err(FretloopError::TempoOutOfRange(bpm))
    }
}

struct ClockEvent {
    start: u64,
    interval: Option<u64>,
    /// Next tick this event fires at; None once a one-shot has fired
    next: Option<u64>,
    callback: ClockCallback,
}

impl ClockEvent {
    /// First occurrence at or after `position`
    fn first_at_or_after(&self, position: f64) -> Option<u64> {
        if self.start as f64 >= position {
            return Some(self.start);
        }
        let interval = self.interval?;
        let elapsed = position - self.start as f64;
        let n = (elapsed / interval as f64).ceil() as u64;
        Some(self.start + n * interval)
    }
}

// ============================================================================
// Tick clock
// ============================================================================

/// Clock driven by an external time source through [`TickClock::advance_to`].
///
/// The tick/seconds mapping is anchored at the last start or tempo change,
/// so a tempo change affects only events after the current position.
pub struct TickClock {
    state: ClockState,
    bpm: f64,
    /// Ticks processed so far
    position: f64,
    /// Time the processed position corresponds to
    context_time: f64,
    anchor_time: f64,
    anchor_ticks: f64,
    events: BTreeMap<EventId, ClockEvent>,
    next_id: EventId,
    draw: DrawScheduler,
}

impl TickClock {
    pub fn new(bpm: f64, draw: DrawScheduler) -> Self {
        Self {
            state: ClockState::Stopped,
            bpm,
            position: 0.0,
            context_time: 0.0,
            anchor_time: 0.0,
            anchor_ticks: 0.0,
            events: BTreeMap::new(),
            next_id: 1,
            draw,
        }
    }

    /// Seconds per tick at the current tempo
    pub fn seconds_per_tick(&self) -> f64 {
        60.0 / (self.bpm * PPQ as f64)
    }

    /// Time horizon the clock has processed up to
    pub fn context_time(&self) -> f64 {
        self.context_time
    }

    /// Audio time of a musical position, valid while running
    pub fn time_of(&self, ticks: f64) -> f64 {
        self.anchor_time + (ticks - self.anchor_ticks) * self.seconds_per_tick()
    }

    fn ticks_at(&self, time: f64) -> f64 {
        self.anchor_ticks + (time - self.anchor_time) / self.seconds_per_tick()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Position as `bar.beat.tick` (1-based bar and beat, 4/4)
    pub fn format_position(&self) -> String {
        let ticks = self.position as u64;
        let bar = ticks / (PPQ * 4);
        let beat = (ticks / PPQ) % 4;
        format!("{}.{}.{:03}", bar + 1, beat + 1, ticks % PPQ)
    }

    /// Fire every event that falls before `time`, in (tick, id) order.
    ///
    /// Returns the number of callbacks run. Does nothing but track time
    /// unless the clock is started.
    pub fn advance_to(&mut self, time: f64) -> usize {
        if time <= self.context_time {
            return 0;
        }
        if self.state != ClockState::Started {
            self.context_time = time;
            return 0;
        }

        let end = self.ticks_at(time);
        let mut fired = 0;

        loop {
            let due = self
                .events
                .iter()
                .filter_map(|(&id, ev)| ev.next.map(|tick| (tick, id)))
                .filter(|&(tick, _)| (tick as f64) < end)
                .min();
            let Some((tick, id)) = due else { break };

            let tick_time = self.time_of(tick as f64);
            let draw = &self.draw;
            if let Some(ev) = self.events.get_mut(&id) {
                ev.next = ev.interval.map(|interval| tick + interval.max(1));
                (ev.callback)(&Tick { time: tick_time, ticks: tick, draw });
                fired += 1;
            }
        }

        self.position = end;
        self.context_time = time;
        fired
    }

    fn register(&mut self, start: u64, interval: Option<u64>, callback: ClockCallback) -> EventId {
        let id = self.next_id;
        self.next_id += 1;
        let mut ev = ClockEvent { start, interval, next: None, callback };
        ev.next = ev.first_at_or_after(self.position);
        self.events.insert(id, ev);
        id
    }

    fn reanchor(&mut self) {
        self.anchor_time = self.context_time;
        self.anchor_ticks = self.position;
    }
}

impl Clock for TickClock {
    fn schedule_once(&mut self, at_ticks: u64, callback: ClockCallback) -> EventId {
        self.register(at_ticks, None, callback)
    }

    fn schedule_repeat(&mut self, interval: u64, start: u64, callback: ClockCallback) -> EventId {
        self.register(start, Some(interval.max(1)), callback)
    }

    fn clear(&mut self, id: EventId) {
        self.events.remove(&id);
    }

    fn start(&mut self) {
        if self.state == ClockState::Started {
            return;
        }
        self.reanchor();
        self.state = ClockState::Started;
        debug!(position = %self.format_position(), at = self.context_time, "Clock started");
    }

    fn stop(&mut self) {
        self.state = ClockState::Stopped;
        self.position = 0.0;
        self.reanchor();
        for ev in self.events.values_mut() {
            ev.next = Some(ev.start);
        }
        debug!("Clock stopped");
    }

    fn pause(&mut self) {
        if self.state == ClockState::Started {
            self.state = ClockState::Paused;
            debug!(position = %self.format_position(), "Clock paused");
        }
    }

    fn state(&self) -> ClockState {
        self.state
    }

    fn bpm(&self) -> f64 {
        self.bpm
    }

    fn set_bpm(&mut self, bpm: f64) {
        self.reanchor();
        self.bpm = bpm;
    }

    fn position(&self) -> u64 {
        self.position as u64
    }
}

// ============================================================================
// Shared handle
// ============================================================================

/// Cloneable handle shared by the control thread and the audio callback
#[derive(Clone)]
pub struct SharedClock {
    inner: Arc<Mutex<TickClock>>,
}

impl SharedClock {
    pub fn new(clock: TickClock) -> Self {
        Self { inner: Arc::new(Mutex::new(clock)) }
    }

    // A callback that panicked mid-fire leaves the event table consistent,
    // so a poisoned lock is still usable.
    fn guard(&self) -> MutexGuard<'_, TickClock> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn advance_to(&self, time: f64) -> usize {
        self.guard().advance_to(time)
    }

    pub fn context_time(&self) -> f64 {
        self.guard().context_time()
    }
}

impl Clock for SharedClock {
    fn schedule_once(&mut self, at_ticks: u64, callback: ClockCallback) -> EventId {
        self.guard().schedule_once(at_ticks, callback)
    }

    fn schedule_repeat(&mut self, interval: u64, start: u64, callback: ClockCallback) -> EventId {
        self.guard().schedule_repeat(interval, start, callback)
    }

    fn clear(&mut self, id: EventId) {
        self.guard().clear(id)
    }

    fn start(&mut self) {
        self.guard().start()
    }

    fn stop(&mut self) {
        self.guard().stop()
    }

    fn pause(&mut self) {
        self.guard().pause()
    }

    fn state(&self) -> ClockState {
        self.guard().state()
    }

    fn bpm(&self) -> f64 {
        self.guard().bpm()
    }

    fn set_bpm(&mut self, bpm: f64) {
        self.guard().set_bpm(bpm)
    }

    fn position(&self) -> u64 {
        self.guard().position()
    }
}
