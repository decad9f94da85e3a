//! Strum planning: string order, inter-string delay and humanizing jitter

use serde::{Deserialize, Serialize};

use crate::progression::{ChordVoicing, STRING_COUNT};
use crate::strum::StrumDirection;

/// Velocity at which the strum delay equals `strum_delay_base`
pub const REFERENCE_VELOCITY: f64 = 0.85;

/// Per-strum options supplied by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrumOptions {
    /// Seconds between adjacent strings before velocity scaling
    pub strum_delay_base: f64,
    pub direction: StrumDirection,
    pub velocity: f64,
    /// Palm-muted / ghost stroke
    pub muted: bool,
}

impl Default for StrumOptions {
    fn default() -> Self {
        Self {
            strum_delay_base: 0.01,
            direction: StrumDirection::Down,
            velocity: REFERENCE_VELOCITY,
            muted: false,
        }
    }
}

/// Humanization bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HumanizeParams {
    pub min_delay: f64,
    /// How strongly velocity speeds up (or slows) the strum
    pub speed_scale: f64,
    pub delay_jitter: f64,
    pub timing_jitter: f64,
    pub velocity_jitter: f64,
    pub min_gain: f64,
}

impl Default for HumanizeParams {
    fn default() -> Self {
        Self {
            min_delay: 0.004,
            speed_scale: 0.5,
            delay_jitter: 0.002,
            timing_jitter: 0.0015,
            velocity_jitter: 0.08,
            min_gain: 0.05,
        }
    }
}

impl HumanizeParams {
    /// No randomness at all; used for previews and deterministic renders
    pub fn exact() -> Self {
        Self { delay_jitter: 0.0, timing_jitter: 0.0, velocity_jitter: 0.0, ..Self::default() }
    }
}

/// One string excitation produced by a strum
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pluck {
    pub string: usize,
    pub midi: u8,
    pub time: f64,
    pub gain: f64,
    pub muted: bool,
}

/// Uniform sample in `[-amount, amount]`
fn jitter(rng: &mut fastrand::Rng, amount: f64) -> f64 {
    if amount <= 0.0 {
        return 0.0;
    }
    (rng.f64() * 2.0 - 1.0) * amount
}

/// Plan the string onsets of a strum.
///
/// Muted strings are skipped. The `k`-th sounding string in stroke order
/// starts at `time + k * delay` plus timing jitter, never before `time`.
/// The delay is drawn once per strum; because `2 * timing_jitter < min_delay`
/// onsets stay in stroke order.
pub fn plan_strum(
    voicing: &ChordVoicing,
    time: f64,
    options: &StrumOptions,
    params: &HumanizeParams,
    rng: &mut fastrand::Rng,
) -> Vec<Pluck> {
    let order: [usize; STRING_COUNT] = match options.direction {
        StrumDirection::Down => [0, 1, 2, 3, 4, 5],
        StrumDirection::Up => [5, 4, 3, 2, 1, 0],
    };

    let speed = 1.0 - params.speed_scale * (options.velocity - REFERENCE_VELOCITY) / REFERENCE_VELOCITY;
    let delay = (options.strum_delay_base * speed + jitter(rng, params.delay_jitter)).max(params.min_delay);

    order
        .iter()
        .filter_map(|&string| voicing.string_pitch(string).map(|midi| (string, midi)))
        .enumerate()
        .map(|(k, (string, midi))| {
            let onset = time + k as f64 * delay + jitter(rng, params.timing_jitter);
            let gain = (options.velocity + jitter(rng, params.velocity_jitter)).max(params.min_gain);
            Pluck { string, midi, time: onset.max(time), gain, muted: options.muted }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const C_MAJOR: ChordVoicing = ChordVoicing { frets: [-1, 3, 2, 0, 1, 0], base_fret: 1 };

    fn strum(options: StrumOptions, seed: u64) -> Vec<Pluck> {
        let mut rng = fastrand::Rng::with_seed(seed);
        plan_strum(&C_MAJOR, 1.0, &options, &HumanizeParams::default(), &mut rng)
    }

    #[test]
    fn test_c_major_pitches_low_to_high() {
        let plucks = strum(StrumOptions::default(), 7);
        let midi: Vec<u8> = plucks.iter().map(|p| p.midi).collect();
        assert_eq!(midi, vec![48, 52, 55, 60, 64]);
        let strings: Vec<usize> = plucks.iter().map(|p| p.string).collect();
        assert_eq!(strings, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_up_strum_reverses_order() {
        let down = strum(StrumOptions::default(), 1);
        let up = strum(StrumOptions { direction: StrumDirection::Up, ..Default::default() }, 1);
        let down_midi: Vec<u8> = down.iter().map(|p| p.midi).collect();
        let mut up_midi: Vec<u8> = up.iter().map(|p| p.midi).collect();
        up_midi.reverse();
        assert_eq!(down_midi, up_midi);
    }

    #[test]
    fn test_onsets_follow_stroke_order_and_never_precede_time() {
        for seed in 0..200 {
            for direction in [StrumDirection::Down, StrumDirection::Up] {
                for velocity in [0.3, 0.75, 0.85, 1.2] {
                    let plucks = strum(StrumOptions { direction, velocity, ..Default::default() }, seed);
                    assert!(plucks.iter().all(|p| p.time >= 1.0));
                    for pair in plucks.windows(2) {
                        assert!(pair[1].time > pair[0].time, "seed {seed}: {pair:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_gain_bounds() {
        let params = HumanizeParams::default();
        for seed in 0..200 {
            for velocity in [0.0, 0.3, 0.85, 1.2] {
                let plucks = strum(StrumOptions { velocity, ..Default::default() }, seed);
                let lo = (velocity - params.velocity_jitter).max(params.min_gain);
                let hi = (velocity + params.velocity_jitter).max(params.min_gain);
                for p in &plucks {
                    assert!(p.gain >= lo - 1e-12 && p.gain <= hi + 1e-12, "{velocity}: {}", p.gain);
                }
            }
        }
    }

    #[test]
    fn test_harder_strums_are_faster() {
        let exact = HumanizeParams::exact();
        let span = |velocity: f64| {
            let mut rng = fastrand::Rng::with_seed(0);
            let opts = StrumOptions { velocity, ..Default::default() };
            let plucks = plan_strum(&C_MAJOR, 0.0, &opts, &exact, &mut rng);
            plucks.last().unwrap().time - plucks[0].time
        };
        // Four gaps at the 10ms base delay
        assert!((span(REFERENCE_VELOCITY) - 0.04).abs() < 1e-9);
        assert!(span(1.2) < span(0.85));
        assert!(span(0.3) > span(0.85));
    }

    #[test]
    fn test_delay_floor() {
        let exact = HumanizeParams::exact();
        let mut rng = fastrand::Rng::with_seed(0);
        let opts = StrumOptions { strum_delay_base: 0.0, ..Default::default() };
        let plucks = plan_strum(&C_MAJOR, 0.0, &opts, &exact, &mut rng);
        assert!((plucks[1].time - plucks[0].time - exact.min_delay).abs() < 1e-12);
    }

    #[test]
    fn test_pitches_and_counts_for_all_shapes() {
        use crate::progression::{MAX_FRET, STANDARD_TUNING_MIDI};

        let mut shapes = fastrand::Rng::with_seed(42);
        let mut rng = fastrand::Rng::with_seed(9);
        let params = HumanizeParams::default();
        for base_fret in 1..=MAX_FRET {
            for _ in 0..500 {
                let frets: [i8; STRING_COUNT] = std::array::from_fn(|_| shapes.i8(-1..=5));
                let voicing = ChordVoicing { frets, base_fret };
                for direction in [StrumDirection::Down, StrumDirection::Up] {
                    let options = StrumOptions { direction, ..Default::default() };
                    let plucks = plan_strum(&voicing, 0.0, &options, &params, &mut rng);
                    assert_eq!(plucks.len(), voicing.sounding_strings());
                    for p in &plucks {
                        let fret = frets[p.string];
                        let expected = match fret {
                            0 => STANDARD_TUNING_MIDI[p.string],
                            f => STANDARD_TUNING_MIDI[p.string] + (base_fret - 1) + f as u8,
                        };
                        assert_eq!(p.midi, expected, "{frets:?} at {base_fret}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_muted_flag_propagates() {
        let plucks = strum(StrumOptions { muted: true, velocity: 0.3, ..Default::default() }, 3);
        assert!(plucks.iter().all(|p| p.muted));
    }
}
