use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use fretloop_core::{Mode, NoteName};

pub const USAGE: &str = "\
usage: fretloop <command> [options]

commands:
  play                 play a progression through the default output
  render <out.wav>     render a progression to a WAV file
  presets              list preset progressions
  patterns             show the strum pattern of each genre
  scales               rank scales to solo over a progression
  config [--init]      show (or write) the config file

selection:
  --preset <id>        preset progression id (see `presets`)
  --loop <chords>      custom loop, e.g. \"1,5,6m,4\" or \"2m7@2,5:7,1maj7\"
  --beats <n>          beats per chord for --loop (default 4)
  --genre <name>       strum genre for --loop (default Pop/Rock)
  --key <note>         key root, e.g. C, F#, Bb
  --minor | --major    key mode

playback:
  --bpm <n>            tempo, 20-300
  --bars <n>           stop after n bars (render default 4)
  --volume <db>        master volume in dB
  --metronome          click on every beat
  --no-drums           mute the backing drums

render:
  --sample-rate <hz>   output sample rate (default 48000)
  --seed <n>           humanization seed

scales:
  --top <n>            how many scales to list (default 5)

while playing (type, then enter):
  <enter> | p          pause / resume
  s                    stop
  r                    play from the top
  k <note> [minor]     change key (stops, then restarts)
  + | -                tempo up / down 5 BPM
  q                    quit
";

/// Flags shared by `play`, `render` and `scales`; unset fields fall back to config
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayArgs {
    pub preset: Option<String>,
    pub loop_spec: Option<String>,
    pub beats_per_chord: Option<u32>,
    pub genre: Option<String>,
    pub key: Option<NoteName>,
    pub mode: Option<Mode>,
    pub bpm: Option<f64>,
    pub bars: Option<u32>,
    pub volume_db: Option<f64>,
    pub metronome: bool,
    pub no_drums: bool,
    pub sample_rate: Option<u32>,
    pub seed: Option<u64>,
    pub top: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play(PlayArgs),
    Render { out: PathBuf, args: PlayArgs },
    Presets,
    Patterns,
    Scales(PlayArgs),
    Config { init: bool },
    Help,
}

pub fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Command> {
    let mut args = args.into_iter();
    let Some(command) = args.next() else {
        return Ok(Command::Help);
    };
    let rest: Vec<String> = args.collect();

    match command.as_str() {
        "play" => Ok(Command::Play(parse_play_args(&rest)?)),
        "render" => {
            let Some((out, flags)) = rest.split_first() else {
                bail!("render needs an output path");
            };
            if out.starts_with("--") {
                bail!("render needs an output path before {out}");
            }
            Ok(Command::Render { out: PathBuf::from(out), args: parse_play_args(flags)? })
        }
        "presets" => Ok(Command::Presets),
        "patterns" => Ok(Command::Patterns),
        "scales" => Ok(Command::Scales(parse_play_args(&rest)?)),
        "config" => Ok(Command::Config { init: rest.iter().any(|a| a == "--init") }),
        "help" | "-h" | "--help" => Ok(Command::Help),
        other => bail!("unknown command '{other}'"),
    }
}

fn parse_play_args(flags: &[String]) -> Result<PlayArgs> {
    let mut out = PlayArgs::default();
    let mut iter = flags.iter();

    while let Some(flag) = iter.next() {
        let mut value = || {
            iter.next()
                .map(String::as_str)
                .with_context(|| format!("{flag} needs a value"))
        };
        match flag.as_str() {
            "--preset" => out.preset = Some(value()?.to_string()),
            "--loop" => out.loop_spec = Some(value()?.to_string()),
            "--beats" => out.beats_per_chord = Some(parse_number(flag, value()?)?),
            "--genre" => out.genre = Some(value()?.to_string()),
            "--key" => out.key = Some(value()?.parse()?),
            "--minor" => out.mode = Some(Mode::Minor),
            "--major" => out.mode = Some(Mode::Major),
            "--bpm" => out.bpm = Some(parse_number(flag, value()?)?),
            "--bars" => out.bars = Some(parse_number(flag, value()?)?),
            "--volume" => out.volume_db = Some(parse_number(flag, value()?)?),
            "--metronome" => out.metronome = true,
            "--no-drums" => out.no_drums = true,
            "--sample-rate" => out.sample_rate = Some(parse_number(flag, value()?)?),
            "--seed" => out.seed = Some(parse_number(flag, value()?)?),
            "--top" => out.top = Some(parse_number(flag, value()?)?),
            other => bail!("unknown option '{other}'"),
        }
    }

    if out.preset.is_some() && out.loop_spec.is_some() {
        bail!("--preset and --loop are mutually exclusive");
    }
    Ok(out)
}

/// Keyboard commands during `play`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LiveCommand {
    TogglePause,
    Stop,
    Restart,
    Key(NoteName, Mode),
    Tempo(f64),
    Quit,
}

pub const TEMPO_STEP: f64 = 5.0;

pub fn parse_live_command(line: &str) -> Result<LiveCommand> {
    let mut words = line.split_whitespace();
    let cmd = match words.next() {
        None | Some("p") => LiveCommand::TogglePause,
        Some("s") => LiveCommand::Stop,
        Some("r") => LiveCommand::Restart,
        Some("q") => LiveCommand::Quit,
        Some("+") => LiveCommand::Tempo(TEMPO_STEP),
        Some("-") => LiveCommand::Tempo(-TEMPO_STEP),
        Some("k") => {
            let note: NoteName = words.next().context("k needs a note")?.parse()?;
            let mode = match words.next() {
                Some("minor" | "m") => Mode::Minor,
                None | Some("major") => Mode::Major,
                Some(other) => bail!("unknown mode '{other}'"),
            };
            LiveCommand::Key(note, mode)
        }
        Some(other) => bail!("unknown command '{other}'"),
    };
    Ok(cmd)
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T> {
    value
        .parse()
        .ok()
        .with_context(|| format!("invalid value '{value}' for {flag}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Command> {
        parse_args(line.split_whitespace().map(str::to_string))
    }

    #[test]
    fn test_play_with_preset_and_key() {
        let Command::Play(args) = parse("play --preset jazz-ii-V-I --key Bb --minor --bpm 90").unwrap() else {
            panic!("expected play");
        };
        assert_eq!(args.preset.as_deref(), Some("jazz-ii-V-I"));
        assert_eq!(args.key, Some(NoteName::BFlat));
        assert_eq!(args.mode, Some(Mode::Minor));
        assert_eq!(args.bpm, Some(90.0));
        assert!(!args.metronome);
    }

    #[test]
    fn test_render_takes_path_first() {
        let cmd = parse("render out.wav --loop 1,5,6m,4 --bars 2 --seed 7").unwrap();
        let Command::Render { out, args } = cmd else {
            panic!("expected render");
        };
        assert_eq!(out, PathBuf::from("out.wav"));
        assert_eq!(args.loop_spec.as_deref(), Some("1,5,6m,4"));
        assert_eq!(args.bars, Some(2));
        assert_eq!(args.seed, Some(7));

        assert!(parse("render --bars 2").is_err());
        assert!(parse("render").is_err());
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(parse("play --bpm fast").is_err());
        assert!(parse("play --key H").is_err());
        assert!(parse("play --bars").is_err());
        assert!(parse("play --wat").is_err());
        assert!(parse("dance").is_err());
        assert!(parse("play --preset x --loop 1,4").is_err());
    }

    #[test]
    fn test_scales_takes_selection_and_top() {
        let Command::Scales(args) = parse("scales --loop 1:7,4:7,5:7 --key A --top 3").unwrap() else {
            panic!("expected scales");
        };
        assert_eq!(args.loop_spec.as_deref(), Some("1:7,4:7,5:7"));
        assert_eq!(args.key, Some(NoteName::A));
        assert_eq!(args.top, Some(3));
        assert!(parse("scales --top many").is_err());
        assert!(parse("scales --top -1").is_err());
    }

    #[test]
    fn test_live_commands() {
        assert_eq!(parse_live_command("").unwrap(), LiveCommand::TogglePause);
        assert_eq!(parse_live_command(" q ").unwrap(), LiveCommand::Quit);
        assert_eq!(parse_live_command("-").unwrap(), LiveCommand::Tempo(-TEMPO_STEP));
        assert_eq!(
            parse_live_command("k F# minor").unwrap(),
            LiveCommand::Key(NoteName::FSharp, Mode::Minor)
        );
        assert_eq!(parse_live_command("k Eb").unwrap(), LiveCommand::Key(NoteName::EFlat, Mode::Major));
        assert!(parse_live_command("k").is_err());
        assert!(parse_live_command("k C dorian").is_err());
        assert!(parse_live_command("x").is_err());
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse("").unwrap(), Command::Help);
        assert_eq!(parse("presets").unwrap(), Command::Presets);
        assert_eq!(parse("patterns").unwrap(), Command::Patterns);
        assert_eq!(parse("config --init").unwrap(), Command::Config { init: true });
    }
}
