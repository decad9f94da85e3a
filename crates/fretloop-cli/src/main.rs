//! fretloop: chord-progression practice player

mod args;
mod config;
mod controller;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use args::{parse_args, parse_live_command, Command, LiveCommand, PlayArgs, USAGE};
use config::{config_path, load_config, save_config, AppConfig};
use controller::{PlaybackController, PlaybackSettings, PlaybackState, Selection};
use crossbeam_channel::{unbounded, Receiver, TryRecvError};
use fretloop_core::notation::render_text;
use fretloop_core::strum::GENRE_STRUM_PATTERNS;
use fretloop_core::theory::{diatonic_chord, prefers_sharps};
use fretloop_core::{
    box_notes, build_scheduled_progression, chord_display_name, chord_tones, classify_note,
    preset_progressions, recommend_scales, render_diagram, resolve_active_progression, shape_for,
    strum_pattern_for_genre, CustomLoop, NoteName, NoteRole, Scale, VoicingLibrary, VoicingLookup,
    COUNT_IN_BEATS, DIAGRAM_FRETS,
};
use fretloop_services::{
    audio_engine, default_output_device_info, render_progression_to_wav, RenderSettings, LOOKAHEAD,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_BEATS_PER_CHORD: u32 = 4;
const DEFAULT_LOOP_GENRE: &str = "Pop/Rock";
const DEFAULT_RENDER_BARS: u32 = 4;
const DEFAULT_TOP_SCALES: usize = 5;
const POLL_INTERVAL: Duration = Duration::from_millis(10);

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("fretloop=info".parse()?)
            .add_directive("fretloop_core=info".parse()?)
            .add_directive("fretloop_services=info".parse()?))
        .init();

    let command = parse_args(std::env::args().skip(1))?;
    let config = load_config();

    match command {
        Command::Play(args) => play(&config, &args),
        Command::Render { out, args } => render(&config, &out, &args),
        Command::Presets => {
            list_presets();
            Ok(())
        }
        Command::Patterns => {
            list_patterns();
            Ok(())
        }
        Command::Scales(args) => scales(&config, &args),
        Command::Config { init } => show_config(&config, init),
        Command::Help => {
            print!("{USAGE}");
            Ok(())
        }
    }
}

fn load_voicings(config: &AppConfig) -> Result<VoicingLibrary> {
    match &config.voicings.library {
        Some(path) => VoicingLibrary::load_with_overrides(path)
            .with_context(|| format!("loading voicings from {}", path.display())),
        None => Ok(VoicingLibrary::builtin()),
    }
}

fn selection(config: &AppConfig, args: &PlayArgs) -> Result<Selection> {
    let custom_loop = args
        .loop_spec
        .as_deref()
        .map(|spec| {
            CustomLoop::parse(
                spec,
                args.beats_per_chord.unwrap_or(DEFAULT_BEATS_PER_CHORD),
                args.genre.as_deref().unwrap_or(DEFAULT_LOOP_GENRE),
            )
        })
        .transpose()?;

    if args.preset.is_none() && custom_loop.is_none() {
        bail!("choose a progression with --preset <id> or --loop <chords>");
    }

    Ok(Selection {
        preset_id: args.preset.clone(),
        custom_loop,
        key_root: args.key.unwrap_or(config.playback.key_root),
        mode: args.mode.unwrap_or(config.playback.mode),
    })
}

fn settings(config: &AppConfig, args: &PlayArgs) -> PlaybackSettings {
    let playback = &config.playback;
    PlaybackSettings {
        tempo: args.bpm.unwrap_or(playback.tempo),
        master_volume_db: args.volume_db.unwrap_or(playback.master_volume_db),
        drums_muted: args.no_drums || playback.drums_muted,
        metronome_enabled: args.metronome || playback.metronome_enabled,
    }
}

// ============================================================================
// play
// ============================================================================

fn play(config: &AppConfig, args: &PlayArgs) -> Result<()> {
    let voicings: Arc<dyn VoicingLookup + Send + Sync> = Arc::new(load_voicings(config)?);
    let mut selection = selection(config, args)?;
    let engine = audio_engine();

    let mut controller = PlaybackController::new(engine, voicings, selection.clone(), settings(config, args));
    let Some(resolved) = controller.resolved().cloned() else {
        bail!("unknown preset '{}'", args.preset.as_deref().unwrap_or_default());
    };
    if !controller.play()? {
        bail!("could not start playback (no audio output or nothing playable)");
    }

    println!(
        "{} {} at {} BPM, {} feel",
        selection.key_root.as_str(),
        selection.mode.name(),
        controller.settings().tempo,
        resolved.genre
    );
    if let Ok(device) = default_output_device_info() {
        println!("output: {} ({} Hz, {} ch)", device.name, device.sample_rate, device.channels);
    }
    println!("{}", render_text(&strum_pattern_for_genre(&resolved.genre)));

    let deadline = args.bars.map(|bars| {
        let beats = COUNT_IN_BEATS as f64 + bars as f64 * 4.0;
        engine.now() + LOOKAHEAD + beats * 60.0 / controller.settings().tempo
    });
    let commands = spawn_stdin_reader();

    let mut shown = None;
    loop {
        controller.poll();
        print_status(&controller, &mut shown)?;

        match commands.try_recv() {
            Ok(line) => match parse_live_command(&line) {
                Ok(LiveCommand::Quit) => break,
                Ok(cmd) => apply_live_command(&mut controller, &mut selection, cmd)?,
                Err(e) => eprintln!("{e}"),
            },
            Err(TryRecvError::Disconnected) if args.bars.is_none() => break,
            Err(_) => {}
        }

        if deadline.is_some_and(|end| engine.now() >= end) {
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    println!();
    controller.stop();
    engine.dispose();
    Ok(())
}

fn apply_live_command(
    controller: &mut PlaybackController<'_>,
    selection: &mut Selection,
    cmd: LiveCommand,
) -> Result<()> {
    match cmd {
        LiveCommand::TogglePause => match controller.state() {
            PlaybackState::Playing | PlaybackState::CountIn => controller.pause(),
            PlaybackState::Paused | PlaybackState::Stopped => {
                controller.play()?;
            }
        },
        LiveCommand::Stop => controller.stop(),
        LiveCommand::Restart => {
            controller.stop();
            controller.play()?;
        }
        LiveCommand::Key(root, mode) => {
            selection.key_root = root;
            selection.mode = mode;
            controller.set_selection(selection.clone());
            controller.play()?;
        }
        LiveCommand::Tempo(delta) => {
            let mut settings = controller.settings();
            settings.tempo += delta;
            if let Err(e) = controller.set_settings(settings) {
                eprintln!("{e}");
            }
        }
        LiveCommand::Quit => {}
    }
    Ok(())
}

/// Lines typed on stdin; the channel closes at end of input
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// One live status line: state, chord and a cursor over the bar's eighths
fn print_status(controller: &PlaybackController<'_>, shown: &mut Option<String>) -> Result<()> {
    let label = match controller.state() {
        PlaybackState::CountIn => "count in".to_string(),
        PlaybackState::Playing => controller.current_chord_name(),
        PlaybackState::Paused => format!("{} (paused)", controller.current_chord_name()),
        PlaybackState::Stopped => "stopped".to_string(),
    };
    let line = format!(
        "{label:<16} {} {:>5.0} BPM",
        bar_cursor(controller.eighth_in_bar()),
        controller.settings().tempo
    );
    if shown.as_deref() != Some(line.as_str()) {
        let mut out = std::io::stdout().lock();
        write!(out, "\r{line}")?;
        out.flush()?;
        *shown = Some(line);
    }
    Ok(())
}

fn bar_cursor(slot: usize) -> String {
    const COUNTS: [&str; 8] = ["1", "&", "2", "&", "3", "&", "4", "&"];
    COUNTS
        .iter()
        .enumerate()
        .map(|(i, c)| if i == slot { format!("[{c}]") } else { format!(" {c} ") })
        .collect()
}

// ============================================================================
// render
// ============================================================================

fn render(config: &AppConfig, out: &std::path::Path, args: &PlayArgs) -> Result<()> {
    let voicings = load_voicings(config)?;
    let selection = selection(config, args)?;
    let settings = settings(config, args);

    let resolved = resolve_active_progression(selection.preset_id.as_deref(), selection.custom_loop.as_ref())
        .with_context(|| format!("unknown preset '{}'", args.preset.as_deref().unwrap_or_default()))?;
    let progression = build_scheduled_progression(&resolved, selection.key_root, selection.mode, &voicings)
        .context("progression has no playable chords in this key")?;

    let defaults = RenderSettings::default();
    let render_settings = RenderSettings {
        bpm: settings.tempo,
        sample_rate: args.sample_rate.unwrap_or(defaults.sample_rate),
        metronome_enabled: settings.metronome_enabled,
        drums_muted: settings.drums_muted,
        master_volume_db: settings.master_volume_db,
        seed: args.seed.unwrap_or(defaults.seed),
    };

    let summary = render_progression_to_wav(
        out,
        progression,
        strum_pattern_for_genre(&resolved.genre),
        &render_settings,
        args.bars.unwrap_or(DEFAULT_RENDER_BARS),
    )?;
    println!(
        "wrote {} ({:.2} s, peak {:.2})",
        summary.path.display(),
        summary.seconds,
        summary.peak
    );
    Ok(())
}

// ============================================================================
// scales
// ============================================================================

fn scales(config: &AppConfig, args: &PlayArgs) -> Result<()> {
    let selection = selection(config, args)?;
    let (key, mode) = (selection.key_root, selection.mode);
    let resolved = resolve_active_progression(selection.preset_id.as_deref(), selection.custom_loop.as_ref())
        .with_context(|| format!("unknown preset '{}'", args.preset.as_deref().unwrap_or_default()))?;

    let names: Vec<String> = (0..resolved.pattern.len())
        .map(|i| chord_display_name(&resolved, i, key, mode))
        .collect();
    println!("{} {}: {}\n", key.as_str(), mode.name(), names.join(" "));

    let ranked = recommend_scales(key, mode, &resolved.pattern, args.top.unwrap_or(DEFAULT_TOP_SCALES));
    let Some(best) = ranked.first() else {
        bail!("nothing to rank");
    };
    for (rank, rec) in ranked.iter().enumerate() {
        println!("{:>2}. {:<26} {:>3}  {}", rank + 1, rec.display_name, rec.score, rec.reason);
        if !rec.tags.is_empty() {
            println!("    [{}]", rec.tags.join(", "));
        }
    }

    let sharps = prefers_sharps(key, mode);
    let scale = Scale::new(key.pitch_class(), best.scale_type);
    let mut tones_by_chord = Vec::new();
    println!("\nchord tones");
    for (name, chord) in names.iter().zip(&resolved.pattern) {
        let Some(diatonic) = diatonic_chord(key.pitch_class(), mode, chord.degree) else {
            continue;
        };
        let tones = chord_tones(diatonic.root, chord.quality.unwrap_or(diatonic.quality));
        let spelled: Vec<String> = tones
            .iter()
            .map(|t| format!("{}({})", NoteName::from_pitch_class(t.pitch_class, sharps), t.label()))
            .collect();
        println!("  {name:<8} {}", spelled.join(" "));
        tones_by_chord.push((name, tones));
    }

    if let Some((name, tones)) = tones_by_chord.first() {
        println!("\n{} over {name} (R 3 5 7 9 chord tones, o scale)", best.display_name);
        print!(
            "{}",
            render_diagram(DIAGRAM_FRETS, |pos| role_mark(classify_note(pos.pitch_class, tones, &scale)))
        );
    }

    if let Some(shape) = shape_for(best.scale_type) {
        let notes = box_notes(shape, key.pitch_class());
        let frets = notes.iter().map(|n| n.fret).max().unwrap_or(0).max(DIAGRAM_FRETS);
        println!("\n{} {}", key.as_str(), shape.name);
        print!(
            "{}",
            render_diagram(frets, |pos| notes
                .iter()
                .find(|n| n.string == pos.string && n.fret == pos.fret)
                .map(|n| n.label))
        );
    }
    Ok(())
}

fn role_mark(role: NoteRole) -> Option<&'static str> {
    match role {
        NoteRole::Root => Some("R"),
        NoteRole::Third => Some("3"),
        NoteRole::Fifth => Some("5"),
        NoteRole::Seventh => Some("7"),
        NoteRole::Ninth => Some("9"),
        NoteRole::Scale => Some("o"),
        NoteRole::NonScale => None,
    }
}

// ============================================================================
// listings
// ============================================================================

fn list_presets() {
    for preset in preset_progressions() {
        let numerals: Vec<&str> = preset.pattern.iter().map(|c| c.roman_numeral.as_str()).collect();
        println!("{:<24} {:<30} {:<13} {}", preset.id, preset.name, preset.genre, numerals.join(" "));
    }
}

fn list_patterns() {
    for (genre, pattern) in GENRE_STRUM_PATTERNS.iter() {
        println!("{genre} ({pattern})");
        println!("{}\n", render_text(pattern));
    }
}

fn show_config(config: &AppConfig, init: bool) -> Result<()> {
    let path = config_path();
    if init {
        if path.exists() {
            bail!("{} already exists", path.display());
        }
        let written = save_config(config)?;
        println!("wrote {}", written.display());
        return Ok(());
    }
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
