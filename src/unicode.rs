//! Codepoint properties: terminal column width and grapheme boundary
//! class, plus the boundary state machine built on them.
//!
//! The lookup table is generated at build time (see `build.rs`) into a
//! three-stage compressed form: stage 1 bins the high bits of a codepoint
//! to a stage-2 block, stage 2 bins the low byte to a stage-3 slot, and
//! stage 3 holds the packed property value. Three dependent loads resolve
//! any codepoint; the arrays are small enough to stay cache-resident.
//!
//! Codepoints above the Unicode maximum resolve to width 0 with the
//! `Invalid` class.

/// Grapheme boundary class of a codepoint. `Invalid` covers everything
/// that does not participate in a boundary decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryClass {
    Invalid = 0,
    L = 1,
    V = 2,
    T = 3,
    Lv = 4,
    Lvt = 5,
    Prepend = 6,
    Extend = 7,
    Zwj = 8,
    SpacingMark = 9,
    RegionalIndicator = 10,
    ExtendedPictographic = 11,
    /// Extended_Pictographic that also accepts an emoji modifier.
    ExtendedPictographicBase = 12,
    EmojiModifier = 13,
}

impl BoundaryClass {
    fn from_bits(bits: u16) -> BoundaryClass {
        match bits {
            1 => BoundaryClass::L,
            2 => BoundaryClass::V,
            3 => BoundaryClass::T,
            4 => BoundaryClass::Lv,
            5 => BoundaryClass::Lvt,
            6 => BoundaryClass::Prepend,
            7 => BoundaryClass::Extend,
            8 => BoundaryClass::Zwj,
            9 => BoundaryClass::SpacingMark,
            10 => BoundaryClass::RegionalIndicator,
            11 => BoundaryClass::ExtendedPictographic,
            12 => BoundaryClass::ExtendedPictographicBase,
            13 => BoundaryClass::EmojiModifier,
            _ => BoundaryClass::Invalid,
        }
    }
}

/// Packed per-codepoint properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Properties {
    /// Terminal column width: 0, 1, or 2.
    pub width: u8,
    pub boundary_class: BoundaryClass,
}

mod tables {
    // STAGE1 / STAGE2 / STAGE3, generated by build.rs.
    include!(concat!(env!("OUT_DIR"), "/unicode_tables.rs"));
}

/// Look up the properties of a codepoint.
pub fn properties(cp: u32) -> Properties {
    if cp > 0x10FFFF {
        return Properties {
            width: 0,
            boundary_class: BoundaryClass::Invalid,
        };
    }
    let block = tables::STAGE1[(cp >> 8) as usize] as usize;
    let slot = tables::STAGE2[block * 256 + (cp & 0xFF) as usize] as usize;
    let packed = tables::STAGE3[slot];
    Properties {
        width: (packed & 0b11) as u8,
        boundary_class: BoundaryClass::from_bits((packed >> 2) & 0xF),
    }
}

/// Terminal column width of a codepoint.
pub fn width(cp: u32) -> usize {
    properties(cp).width as usize
}

/// Carry-over state for [`grapheme_break`]: whether an
/// Extended_Pictographic sequence is in progress (GB11) and the regional
/// indicator pairing parity (GB12/13).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BreakState {
    extended_pictographic: bool,
    regional_indicator: bool,
}

/// Decide whether an extended grapheme cluster boundary exists between two
/// adjacent codepoints, given their boundary classes. `state` must be
/// threaded through consecutive calls over the same text run.
///
/// Implements the UAX #29 rules that matter inside a terminal cell stream;
/// controls never reach cell storage, so GB3..GB5 are out of scope.
pub fn grapheme_break(before: BoundaryClass, after: BoundaryClass, state: &mut BreakState) -> bool {
    use BoundaryClass as C;

    let breaks = 'rules: {
        // GB6/GB7/GB8: Hangul syllable composition.
        match (before, after) {
            (C::L, C::L | C::V | C::Lv | C::Lvt) => break 'rules false,
            (C::Lv | C::V, C::V | C::T) => break 'rules false,
            (C::Lvt | C::T, C::T) => break 'rules false,
            _ => {}
        }
        // GB9/GB9a: extenders, ZWJ, and spacing marks attach to the left.
        // Emoji modifiers carry GCB=Extend semantics.
        if matches!(after, C::Extend | C::Zwj | C::EmojiModifier | C::SpacingMark) {
            break 'rules false;
        }
        // GB9b: prepend attaches to the right.
        if before == C::Prepend {
            break 'rules false;
        }
        // GB11: Extended_Pictographic Extend* ZWJ x Extended_Pictographic.
        if before == C::Zwj
            && matches!(after, C::ExtendedPictographic | C::ExtendedPictographicBase)
            && state.extended_pictographic
        {
            break 'rules false;
        }
        // GB12/GB13: pair regional indicators two by two.
        if before == C::RegionalIndicator && after == C::RegionalIndicator {
            if state.regional_indicator {
                state.regional_indicator = false;
                break 'rules true;
            }
            state.regional_indicator = true;
            break 'rules false;
        }
        true
    };

    // Maintain the GB11 chain: armed by a pictograph (including one seen
    // only as `before`, the first call of a run), survives extenders and a
    // trailing ZWJ, dies on anything else.
    let before_pictographic =
        matches!(before, C::ExtendedPictographic | C::ExtendedPictographicBase);
    state.extended_pictographic = match after {
        C::ExtendedPictographic | C::ExtendedPictographicBase => true,
        C::Extend | C::EmojiModifier | C::Zwj if !breaks => {
            state.extended_pictographic || before_pictographic
        }
        _ => false,
    };
    if breaks && !(before == C::RegionalIndicator && after == C::RegionalIndicator) {
        state.regional_indicator = false;
    }

    breaks
}

/// Whether a codepoint can continue the cluster in the previous cell when
/// grapheme clustering mode is active.
pub fn can_extend_cluster(class: BoundaryClass) -> bool {
    use BoundaryClass as C;
    matches!(
        class,
        C::Extend
            | C::Zwj
            | C::EmojiModifier
            | C::SpacingMark
            | C::V
            | C::T
            | C::RegionalIndicator
            | C::ExtendedPictographic
            | C::ExtendedPictographicBase
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_properties() {
        let p = properties('a' as u32);
        assert_eq!(p.width, 1);
        assert_eq!(p.boundary_class, BoundaryClass::Invalid);
        assert_eq!(width(' ' as u32), 1);
        assert_eq!(width('~' as u32), 1);
    }

    #[test]
    fn test_control_is_zero_width() {
        assert_eq!(width(0x00), 0);
        assert_eq!(width(0x1B), 0);
        assert_eq!(width(0x7F), 0);
        assert_eq!(width(0x9B), 0);
    }

    #[test]
    fn test_wide_characters() {
        assert_eq!(width('你' as u32), 2);
        assert_eq!(width('ア' as u32), 2);
        assert_eq!(width('가' as u32), 2);
    }

    #[test]
    fn test_combining_marks() {
        let p = properties(0x0301); // combining acute accent
        assert_eq!(p.width, 0);
        assert_eq!(p.boundary_class, BoundaryClass::Extend);
    }

    #[test]
    fn test_zwj() {
        let p = properties(0x200D);
        assert_eq!(p.width, 0);
        assert_eq!(p.boundary_class, BoundaryClass::Zwj);
    }

    #[test]
    fn test_emoji_classes() {
        let smiley = properties(0x1F600);
        assert_eq!(smiley.width, 2);
        assert!(matches!(
            smiley.boundary_class,
            BoundaryClass::ExtendedPictographic | BoundaryClass::ExtendedPictographicBase
        ));

        // Thumbs up accepts a skin tone.
        let thumbs = properties(0x1F44D);
        assert_eq!(thumbs.boundary_class, BoundaryClass::ExtendedPictographicBase);

        // Fitzpatrick modifier.
        let tone = properties(0x1F3FD);
        assert_eq!(tone.boundary_class, BoundaryClass::EmojiModifier);
    }

    #[test]
    fn test_regional_indicator() {
        let p = properties(0x1F1FA); // 'U'
        assert_eq!(p.boundary_class, BoundaryClass::RegionalIndicator);
    }

    #[test]
    fn test_hangul_jamo_classes() {
        assert_eq!(properties(0x1100).boundary_class, BoundaryClass::L);
        assert_eq!(properties(0x1161).boundary_class, BoundaryClass::V);
        assert_eq!(properties(0x11A8).boundary_class, BoundaryClass::T);
        assert_eq!(properties(0xAC00).boundary_class, BoundaryClass::Lv); // 가
        assert_eq!(properties(0xAC01).boundary_class, BoundaryClass::Lvt); // 각
    }

    #[test]
    fn test_surrogates_and_out_of_range() {
        let p = properties(0xD800);
        assert_eq!(p.width, 0);
        assert_eq!(p.boundary_class, BoundaryClass::Invalid);

        let p = properties(0x110000);
        assert_eq!(p.width, 0);
        assert_eq!(p.boundary_class, BoundaryClass::Invalid);

        let p = properties(u32::MAX);
        assert_eq!(p.width, 0);
        assert_eq!(p.boundary_class, BoundaryClass::Invalid);
    }

    fn break_between(cps: &[u32]) -> Vec<bool> {
        let mut state = BreakState::default();
        cps.windows(2)
            .map(|w| {
                grapheme_break(
                    properties(w[0]).boundary_class,
                    properties(w[1]).boundary_class,
                    &mut state,
                )
            })
            .collect()
    }

    #[test]
    fn test_break_letter_sequences() {
        assert_eq!(break_between(&['a' as u32, 'b' as u32]), vec![true]);
        assert_eq!(break_between(&['a' as u32, 0x0301]), vec![false]);
        assert_eq!(break_between(&['a' as u32, 0x0301, 'b' as u32]), vec![false, true]);
    }

    #[test]
    fn test_break_hangul_composition() {
        // L + V + T forms one cluster.
        assert_eq!(break_between(&[0x1100, 0x1161, 0x11A8]), vec![false, false]);
        // LV + T continues; LVT + V breaks.
        assert_eq!(break_between(&[0xAC00, 0x11A8]), vec![false]);
        assert_eq!(break_between(&[0xAC01, 0x1161]), vec![true]);
    }

    #[test]
    fn test_break_emoji_zwj_sequence() {
        // woman + ZWJ + rocket: one cluster.
        assert_eq!(
            break_between(&[0x1F469, 0x200D, 0x1F680]),
            vec![false, false]
        );
        // ZWJ chain without a leading pictograph does not join.
        assert_eq!(break_between(&['a' as u32, 0x200D, 0x1F680]), vec![false, true]);
    }

    #[test]
    fn test_break_emoji_modifier() {
        // thumbs up + skin tone: one cluster.
        assert_eq!(break_between(&[0x1F44D, 0x1F3FD]), vec![false]);
    }

    #[test]
    fn test_break_regional_indicator_pairs() {
        let ri = 0x1F1FA; // any RI works for pairing
        // Two RIs join, the third starts a new flag.
        assert_eq!(break_between(&[ri, ri, ri]), vec![false, true]);
        assert_eq!(break_between(&[ri, ri, ri, ri]), vec![false, true, false]);
    }

    #[test]
    fn test_state_resets_between_runs() {
        let mut state = BreakState::default();
        let ep = properties(0x1F600).boundary_class;
        let zwj = BoundaryClass::Zwj;
        // Arm the pictographic chain, then break it with a letter.
        assert!(!grapheme_break(ep, zwj, &mut state));
        assert!(grapheme_break(zwj, BoundaryClass::Invalid, &mut state));
        // A ZWJ joint is no longer armed.
        assert!(grapheme_break(zwj, ep, &mut state));
    }
}
