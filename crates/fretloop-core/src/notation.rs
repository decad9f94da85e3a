//! Projection of a strum pattern onto quarter-note beat groups for notation

use serde::{Deserialize, Serialize};

use crate::strum::{StrumPattern, StrumSlot, SLOTS_PER_BAR};

/// One eighth position inside a beamed pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotRender {
    Note(StrumSlot),
    Rest,
}

/// Visual shape of one quarter-note beat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeatGroup {
    /// Downbeat sounds, upbeat rests
    QuarterNote(StrumSlot),
    /// Both eighths silent
    QuarterRest,
    /// Anything else: note+note or rest+note
    BeamedEighths { down: SlotRender, up: SlotRender },
}

fn render(slot: StrumSlot) -> SlotRender {
    if slot.is_active() { SlotRender::Note(slot) } else { SlotRender::Rest }
}

/// Group an 8-slot pattern into the four beats of a 4/4 bar
pub fn compute_beat_groups(pattern: &StrumPattern) -> [BeatGroup; 4] {
    std::array::from_fn(|beat| {
        let down = pattern.slot(beat * 2);
        let up = pattern.slot(beat * 2 + 1);
        match (down.is_active(), up.is_active()) {
            (true, false) => BeatGroup::QuarterNote(down),
            (false, false) => BeatGroup::QuarterRest,
            _ => BeatGroup::BeamedEighths { down: render(down), up: render(up) },
        }
    })
}

/// Active/rest mask recovered from beat groups
pub fn slots_from_beat_groups(groups: &[BeatGroup; 4]) -> [bool; SLOTS_PER_BAR] {
    let mut mask = [false; SLOTS_PER_BAR];
    for (beat, group) in groups.iter().enumerate() {
        let (down, up) = match group {
            BeatGroup::QuarterNote(_) => (true, false),
            BeatGroup::QuarterRest => (false, false),
            BeatGroup::BeamedEighths { down, up } => {
                (matches!(down, SlotRender::Note(_)), matches!(up, SlotRender::Note(_)))
            }
        };
        mask[beat * 2] = down;
        mask[beat * 2 + 1] = up;
    }
    mask
}

/// Two-line text rendering: counts on top, strokes below
///
/// ```text
/// 1 & 2 & 3 & 4 &
/// ↓   ↓ ↑   ↑ ↓ ↑
/// ```
pub fn render_text(pattern: &StrumPattern) -> String {
    let counts = "1 & 2 & 3 & 4 &";
    let strokes: Vec<&str> = pattern
        .slots()
        .iter()
        .map(|slot| match slot {
            StrumSlot::Down => "↓",
            StrumSlot::Up => "↑",
            StrumSlot::Accent => ">",
            StrumSlot::Ghost => "x",
            StrumSlot::Rest => " ",
        })
        .collect();
    format!("{counts}\n{}", strokes.join(" ").trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strum::{DEFAULT_STRUM_PATTERN, GENRE_STRUM_PATTERNS};

    fn groups(s: &str) -> [BeatGroup; 4] {
        compute_beat_groups(&s.parse().unwrap())
    }

    #[test]
    fn test_pop_rock_groups() {
        let g = groups("D-DU-UDU");
        assert_eq!(g[0], BeatGroup::QuarterNote(StrumSlot::Down));
        assert_eq!(
            g[1],
            BeatGroup::BeamedEighths {
                down: SlotRender::Note(StrumSlot::Down),
                up: SlotRender::Note(StrumSlot::Up)
            }
        );
        assert_eq!(
            g[2],
            BeatGroup::BeamedEighths { down: SlotRender::Rest, up: SlotRender::Note(StrumSlot::Up) }
        );
    }

    #[test]
    fn test_all_rest_and_all_quarter() {
        assert_eq!(groups("--------"), [BeatGroup::QuarterRest; 4]);
        assert_eq!(compute_beat_groups(&DEFAULT_STRUM_PATTERN), [BeatGroup::QuarterNote(StrumSlot::Down); 4]);
    }

    #[test]
    fn test_ghost_counts_as_note() {
        let g = groups("x-------");
        assert_eq!(g[0], BeatGroup::QuarterNote(StrumSlot::Ghost));
    }

    #[test]
    fn test_mask_recovered_for_every_genre() {
        for (_, pattern) in GENRE_STRUM_PATTERNS {
            let mask = slots_from_beat_groups(&compute_beat_groups(&pattern));
            let expected: Vec<bool> = pattern.slots().iter().map(|s| s.is_active()).collect();
            assert_eq!(mask.to_vec(), expected);
        }
    }

    #[test]
    fn test_mask_recovered_for_every_pattern() {
        const KINDS: [StrumSlot; 5] =
            [StrumSlot::Down, StrumSlot::Up, StrumSlot::Accent, StrumSlot::Ghost, StrumSlot::Rest];
        let total = KINDS.len().pow(SLOTS_PER_BAR as u32);
        for n in 0..total {
            // Base-5 digits of n pick each slot
            let slots: [StrumSlot; SLOTS_PER_BAR] =
                std::array::from_fn(|i| KINDS[n / KINDS.len().pow(i as u32) % KINDS.len()]);
            let pattern = StrumPattern::new(slots);
            let mask = slots_from_beat_groups(&compute_beat_groups(&pattern));
            assert_eq!(mask, slots.map(|s| s.is_active()), "{pattern}");
        }
    }

    #[test]
    fn test_render_text() {
        let text = render_text(&DEFAULT_STRUM_PATTERN);
        assert_eq!(text, "1 & 2 & 3 & 4 &\n↓   ↓   ↓   ↓");
    }
}
