//! Process-wide audio engine: synths, transport and the output stream

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};
use fretloop_core::{
    draw_channel, DrawQueue, RhythmSection, SharedClock, TickClock, Transport,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::audio_io::{AudioOutputError, RealtimeOutputStream};
use crate::renderer::{trigger_channel, RhythmRenderer};
use crate::synths::{DrumSynth, GuitarSynth, Metronome};

/// How far ahead of the audible position the clock fires events
pub const LOOKAHEAD: f64 = 0.1;
pub const DEFAULT_BPM: f64 = 120.0;
const DEFAULT_SAMPLE_RATE: u32 = 48_000;

#[derive(Debug, Error)]
pub enum AudioEngineError {
    #[error("Audio output error: {0}")]
    Output(#[from] AudioOutputError),
    #[error("Audio thread exited before the stream opened")]
    StreamThread,
}

/// State shared between the control side and the audio callback
pub struct EngineState {
    pub clock: SharedClock,
    pub renderer: Mutex<RhythmRenderer>,
    /// Frames handed to the device so far; defines audio time
    pub frames_rendered: AtomicU64,
    pub sample_rate: AtomicU32,
    master_volume_db: AtomicU64,
}

impl EngineState {
    fn new(clock: SharedClock, renderer: RhythmRenderer) -> Self {
        Self {
            clock,
            renderer: Mutex::new(renderer),
            frames_rendered: AtomicU64::new(0),
            sample_rate: AtomicU32::new(DEFAULT_SAMPLE_RATE),
            master_volume_db: AtomicU64::new(0f64.to_bits()),
        }
    }

    /// Audio time of the next frame to be rendered
    pub fn now(&self) -> f64 {
        let frames = self.frames_rendered.load(Ordering::Acquire);
        frames as f64 / self.sample_rate.load(Ordering::Acquire).max(1) as f64
    }

    pub fn master_volume_db(&self) -> f64 {
        f64::from_bits(self.master_volume_db.load(Ordering::Acquire))
    }
}

/// Audio thread owning the cpal stream; dropping `stop_tx` closes it
struct StreamThread {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl StreamThread {
    fn shutdown(self) {
        drop(self.stop_tx);
        if self.handle.join().is_err() {
            warn!("Audio thread panicked");
        }
    }
}

pub struct AudioEngine {
    state: Arc<EngineState>,
    guitar: Arc<GuitarSynth>,
    drums: Arc<DrumSynth>,
    metronome: Arc<Metronome>,
    transport: Mutex<Transport<SharedClock>>,
    draw_queue: Mutex<DrawQueue>,
    stream: Mutex<Option<StreamThread>>,
    disposed: AtomicBool,
}

static ENGINE: OnceLock<AudioEngine> = OnceLock::new();

/// The shared engine, created on first use
pub fn audio_engine() -> &'static AudioEngine {
    ENGINE.get_or_init(AudioEngine::new)
}

impl AudioEngine {
    fn new() -> Self {
        let (draw, draw_queue) = draw_channel();
        let clock = SharedClock::new(TickClock::new(DEFAULT_BPM, draw));
        let (tx, rx) = trigger_channel();
        let renderer = RhythmRenderer::new(DEFAULT_SAMPLE_RATE, rx, fastrand::u64(..));

        Self {
            state: Arc::new(EngineState::new(clock.clone(), renderer)),
            guitar: Arc::new(GuitarSynth::new(tx.clone())),
            drums: Arc::new(DrumSynth::new(tx.clone())),
            metronome: Arc::new(Metronome::new(tx)),
            transport: Mutex::new(Transport::new(clock)),
            draw_queue: Mutex::new(draw_queue),
            stream: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> Arc<EngineState> {
        self.state.clone()
    }

    pub fn guitar(&self) -> &Arc<GuitarSynth> {
        &self.guitar
    }

    pub fn drums(&self) -> &Arc<DrumSynth> {
        &self.drums
    }

    pub fn metronome(&self) -> &Arc<Metronome> {
        &self.metronome
    }

    /// Voices for a transport session
    pub fn rhythm_section(&self) -> RhythmSection {
        RhythmSection::new(self.guitar.clone(), self.drums.clone(), self.metronome.clone())
    }

    /// Access the transport under its lock
    pub fn with_transport<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut Transport<SharedClock>) -> R,
    {
        self.transport.lock().ok().map(|mut t| f(&mut t))
    }

    /// Current audible audio time in seconds
    pub fn now(&self) -> f64 {
        self.state.now()
    }

    /// Open the output stream if it is not already running.
    ///
    /// Returns false when no output is available or the engine was disposed.
    pub fn ensure_running(&self) -> bool {
        if self.disposed.load(Ordering::Acquire) {
            return false;
        }
        let Ok(mut stream) = self.stream.lock() else {
            return false;
        };
        if stream.is_some() {
            return true;
        }
        match self.start_stream() {
            Ok(thread) => {
                *stream = Some(thread);
                true
            }
            Err(e) => {
                warn!(error = %e, "Audio output unavailable");
                false
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.stream.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    fn start_stream(&self) -> Result<StreamThread, AudioEngineError> {
        let (ready_tx, ready_rx) = bounded(1);
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let state = self.state.clone();

        // cpal streams are not Send; the stream lives and dies on this thread
        let handle = thread::Builder::new()
            .name("fretloop-audio".into())
            .spawn(move || {
                let stream = RealtimeOutputStream::start(move |buffer, sample_rate, channels| {
                    Self::render_audio(&state, buffer, sample_rate, channels);
                });
                match stream {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        // Blocks until the engine drops the sender
                        let _ = stop_rx.recv();
                        stream.stop();
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| AudioOutputError::StreamError(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("Audio engine started");
                Ok(StreamThread { stop_tx, handle })
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e.into())
            }
            Err(_) => Err(AudioEngineError::StreamThread),
        }
    }

    /// Render one interleaved buffer (audio thread)
    fn render_audio(state: &EngineState, buffer: &mut [f32], sample_rate: u32, channels: u16) {
        let channels = channels.max(1) as usize;
        let num_frames = buffer.len() / channels;
        state.sample_rate.store(sample_rate, Ordering::Release);

        let block_start = state.now();
        let block_end = block_start + num_frames as f64 / sample_rate as f64;
        state.clock.advance_to(block_end + LOOKAHEAD);

        let mut mono = vec![0.0f32; num_frames];
        if let Ok(mut renderer) = state.renderer.lock() {
            renderer.set_sample_rate(sample_rate);
            renderer.set_master_db(state.master_volume_db());
            renderer.render(&mut mono, block_start);
        }

        for (frame, sample) in buffer.chunks_mut(channels).zip(&mono) {
            frame.fill(*sample);
        }
        state.frames_rendered.fetch_add(num_frames as u64, Ordering::AcqRel);
    }

    pub fn set_master_volume(&self, db: f64) {
        self.state.master_volume_db.store(db.to_bits(), Ordering::Release);
        info!(db, "Master volume set");
    }

    pub fn master_volume(&self) -> f64 {
        self.state.master_volume_db()
    }

    /// Run UI jobs whose audio time has been reached. Call from the UI loop.
    pub fn run_ui_jobs(&self) -> usize {
        let now = self.now();
        self.draw_queue.lock().map(|mut q| q.run_due(now)).unwrap_or(0)
    }

    /// Drop UI jobs and triggers that have not happened yet
    pub fn discard_pending(&self) {
        if let Ok(mut queue) = self.draw_queue.lock() {
            queue.clear();
        }
        if let Ok(mut renderer) = self.state.renderer.lock() {
            renderer.drop_pending();
        }
    }

    /// Tear everything down. Further calls are no-ops.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.with_transport(|t| t.clear());
        if let Some(thread) = self.stream.lock().ok().and_then(|mut s| s.take()) {
            thread.shutdown();
        }
        self.guitar.dispose();
        self.drums.dispose();
        self.metronome.dispose();
        if let Ok(mut renderer) = self.state.renderer.lock() {
            renderer.all_notes_off();
        }
        if let Ok(mut queue) = self.draw_queue.lock() {
            queue.clear();
        }
        info!("Audio engine disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}
