//! Playback control for one selection: what to play, in which key, and the
//! UI-facing state driven by transport callbacks

use std::sync::{Arc, Mutex};

use anyhow::Result;
use fretloop_core::{
    build_scheduled_progression, chord_display_name, resolve_active_progression,
    strum_pattern_for_genre, CustomLoop, Mode, NoteName, PlaybackCallbacks, ResolvedProgression,
    TransportState, VoicingLookup, COUNT_IN_BEATS,
};
use fretloop_services::AudioEngine;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    CountIn,
    Playing,
    Paused,
}

/// What the listener picked
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub preset_id: Option<String>,
    pub custom_loop: Option<CustomLoop>,
    pub key_root: NoteName,
    pub mode: Mode,
}

/// Mixer and tempo settings pushed to the engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSettings {
    pub tempo: f64,
    pub master_volume_db: f64,
    pub drums_muted: bool,
    pub metronome_enabled: bool,
}

#[derive(Debug, Default)]
struct UiState {
    playback: PlaybackState,
    chord_index: usize,
    eighth_in_bar: usize,
    beats_heard: u64,
}

pub struct PlaybackController<'a> {
    engine: &'a AudioEngine,
    voicings: Arc<dyn VoicingLookup + Send + Sync>,
    selection: Selection,
    resolved: Option<ResolvedProgression>,
    settings: PlaybackSettings,
    ui: Arc<Mutex<UiState>>,
    scheduled: bool,
}

impl<'a> PlaybackController<'a> {
    pub fn new(
        engine: &'a AudioEngine,
        voicings: Arc<dyn VoicingLookup + Send + Sync>,
        selection: Selection,
        settings: PlaybackSettings,
    ) -> Self {
        let resolved = resolve(&selection);
        Self {
            engine,
            voicings,
            selection,
            resolved,
            settings,
            ui: Arc::new(Mutex::new(UiState::default())),
            scheduled: false,
        }
    }

    pub fn resolved(&self) -> Option<&ResolvedProgression> {
        self.resolved.as_ref()
    }

    pub fn state(&self) -> PlaybackState {
        self.ui.lock().map(|ui| ui.playback).unwrap_or_default()
    }

    pub fn chord_index(&self) -> usize {
        self.ui.lock().map(|ui| ui.chord_index).unwrap_or(0)
    }

    pub fn eighth_in_bar(&self) -> usize {
        self.ui.lock().map(|ui| ui.eighth_in_bar).unwrap_or(0)
    }

    fn set_state(&self, state: PlaybackState) {
        if let Ok(mut ui) = self.ui.lock() {
            ui.playback = state;
        }
    }

    /// Name of the chord under the playhead, empty with nothing selected
    pub fn current_chord_name(&self) -> String {
        self.resolved
            .as_ref()
            .map(|r| chord_display_name(r, self.chord_index(), self.selection.key_root, self.selection.mode))
            .unwrap_or_default()
    }

    /// Start playback, or resume when paused.
    ///
    /// Returns false when nothing is selected, the selection has no
    /// playable chords, or audio output is unavailable.
    pub fn play(&mut self) -> Result<bool> {
        let Some(resolved) = self.resolved.clone() else {
            return Ok(false);
        };
        if !self.engine.ensure_running() {
            return Ok(false);
        }

        if self.state() == PlaybackState::Paused {
            let transport = self.engine.with_transport(|t| {
                t.resume();
                t.state()
            });
            if let Ok(mut ui) = self.ui.lock() {
                let heard = ui.beats_heard;
                ui.playback = resumed_state(transport.unwrap_or_default(), heard);
            }
            return Ok(true);
        }

        let Some(progression) = build_scheduled_progression(
            &resolved,
            self.selection.key_root,
            self.selection.mode,
            self.voicings.as_ref(),
        ) else {
            return Ok(false);
        };

        self.apply_settings()?;
        if let Ok(mut ui) = self.ui.lock() {
            *ui = UiState { playback: PlaybackState::CountIn, ..UiState::default() };
        }

        let pattern = strum_pattern_for_genre(&resolved.genre);
        let chord_ui = self.ui.clone();
        let beat_ui = self.ui.clone();
        let eighth_ui = self.ui.clone();
        let callbacks = PlaybackCallbacks::new()
            .on_chord_change(move |index| {
                if let Ok(mut ui) = chord_ui.lock() {
                    ui.chord_index = index;
                }
            })
            .on_beat(move |_| {
                let Ok(mut ui) = beat_ui.lock() else { return };
                ui.beats_heard += 1;
                // Count-in beats also arrive here; the loop starts after them
                if ui.beats_heard > COUNT_IN_BEATS && ui.playback == PlaybackState::CountIn {
                    ui.playback = PlaybackState::Playing;
                }
            })
            .on_eighth_note(move |slot| {
                if let Ok(mut ui) = eighth_ui.lock() {
                    ui.eighth_in_bar = slot;
                }
            });

        let voices = self.engine.rhythm_section();
        self.engine.with_transport(|t| {
            t.schedule_progression(progression, pattern, callbacks, voices);
            t.resume();
        });
        self.scheduled = true;
        info!(genre = %resolved.genre, key = self.selection.key_root.as_str(), "Playback started");
        Ok(true)
    }

    pub fn pause(&mut self) {
        self.engine.with_transport(|t| t.pause());
        self.set_state(PlaybackState::Paused);
    }

    pub fn stop(&mut self) {
        self.engine.with_transport(|t| t.clear());
        self.engine.discard_pending();
        self.scheduled = false;
        if let Ok(mut ui) = self.ui.lock() {
            *ui = UiState::default();
        }
        debug!("Playback stopped");
    }

    /// Change what is selected; stops playback that was scheduled
    pub fn set_selection(&mut self, selection: Selection) {
        if selection == self.selection {
            return;
        }
        if self.scheduled {
            self.stop();
        }
        self.resolved = resolve(&selection);
        self.selection = selection;
    }

    pub fn settings(&self) -> PlaybackSettings {
        self.settings
    }

    /// Apply new settings; an invalid tempo leaves the old settings in place
    pub fn set_settings(&mut self, settings: PlaybackSettings) -> Result<()> {
        let previous = std::mem::replace(&mut self.settings, settings);
        if let Err(e) = self.apply_settings() {
            self.settings = previous;
            return Err(e);
        }
        Ok(())
    }

    fn apply_settings(&self) -> Result<()> {
        let settings = self.settings;
        if let Some(result) = self.engine.with_transport(|t| t.set_tempo(settings.tempo)) {
            result?;
        }
        self.engine.set_master_volume(settings.master_volume_db);
        self.engine.drums().set_muted(settings.drums_muted);
        self.engine.metronome().set_enabled(settings.metronome_enabled);
        Ok(())
    }

    /// Run due UI jobs; call regularly from the main loop
    pub fn poll(&self) -> usize {
        self.engine.run_ui_jobs()
    }
}

/// UI state after a resume. The loop may already be scheduled ahead of what
/// the listener has heard, so the count-in lasts until its beats are delivered.
fn resumed_state(transport: TransportState, beats_heard: u64) -> PlaybackState {
    match transport {
        TransportState::Playing if beats_heard > COUNT_IN_BEATS => PlaybackState::Playing,
        TransportState::Playing | TransportState::CountingIn => PlaybackState::CountIn,
        TransportState::Idle | TransportState::Paused => PlaybackState::Stopped,
    }
}

fn resolve(selection: &Selection) -> Option<ResolvedProgression> {
    resolve_active_progression(selection.preset_id.as_deref(), selection.custom_loop.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fretloop_core::VoicingLibrary;
    use fretloop_services::audio_engine;

    fn selection(preset: Option<&str>) -> Selection {
        Selection {
            preset_id: preset.map(str::to_string),
            custom_loop: None,
            key_root: NoteName::C,
            mode: Mode::Major,
        }
    }

    fn settings() -> PlaybackSettings {
        PlaybackSettings { tempo: 100.0, master_volume_db: -6.0, drums_muted: false, metronome_enabled: false }
    }

    fn controller(preset: Option<&str>) -> PlaybackController<'static> {
        PlaybackController::new(audio_engine(), Arc::new(VoicingLibrary::builtin()), selection(preset), settings())
    }

    #[test]
    fn test_nothing_selected_cannot_play() {
        let mut ctl = controller(None);
        assert!(ctl.resolved().is_none());
        assert_eq!(ctl.current_chord_name(), "");
        assert!(!ctl.play().unwrap());
        assert_eq!(ctl.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_chord_name_follows_key() {
        let mut ctl = controller(Some("pop-I-V-vi-IV"));
        assert_eq!(ctl.current_chord_name(), "C");

        let mut in_g = selection(Some("pop-I-V-vi-IV"));
        in_g.key_root = NoteName::G;
        ctl.set_selection(in_g);
        assert_eq!(ctl.current_chord_name(), "G");
    }

    #[test]
    fn test_stop_resets_position() {
        let mut ctl = controller(Some("pop-I-V-vi-IV"));
        if let Ok(mut ui) = ctl.ui.lock() {
            ui.chord_index = 2;
            ui.eighth_in_bar = 5;
            ui.playback = PlaybackState::Playing;
        }
        ctl.stop();
        assert_eq!(ctl.chord_index(), 0);
        assert_eq!(ctl.eighth_in_bar(), 0);
        assert_eq!(ctl.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_invalid_tempo_keeps_previous_settings() {
        let mut ctl = controller(Some("pop-I-V-vi-IV"));
        let bad = PlaybackSettings { tempo: 500.0, ..settings() };
        assert!(ctl.set_settings(bad).is_err());
        assert_eq!(ctl.settings(), settings());
    }

    #[test]
    fn test_resume_during_count_in_stays_in_count_in() {
        assert_eq!(resumed_state(TransportState::CountingIn, 2), PlaybackState::CountIn);
        assert_eq!(resumed_state(TransportState::Playing, COUNT_IN_BEATS), PlaybackState::CountIn);
        assert_eq!(resumed_state(TransportState::Playing, COUNT_IN_BEATS + 1), PlaybackState::Playing);
        assert_eq!(resumed_state(TransportState::Idle, 0), PlaybackState::Stopped);
    }

    #[test]
    fn test_selection_change_stops_scheduled_playback() {
        let mut ctl = controller(Some("pop-I-V-vi-IV"));
        ctl.scheduled = true;
        ctl.set_state(PlaybackState::Playing);

        let mut minor = selection(Some("pop-I-V-vi-IV"));
        minor.mode = Mode::Minor;
        ctl.set_selection(minor);
        assert_eq!(ctl.state(), PlaybackState::Stopped);
        assert!(!ctl.scheduled);
    }
}
