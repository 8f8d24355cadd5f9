//! Build script: generates the three-stage Unicode property table.
//!
//! For every codepoint we bake two properties into one u16: the terminal
//! column width (0, 1, or 2) and the grapheme boundary class. The dense
//! 0x110000-entry table compresses into three small arrays: stage 1 maps
//! the high bits of a codepoint to a 256-entry stage-2 block, stage 2 maps
//! the low byte to a stage-3 slot, and stage 3 holds the distinct packed
//! values. The property crates used here are build-time only.

use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use icu_properties::props::{
    EmojiModifier, EmojiModifierBase, ExtendedPictographic, GraphemeClusterBreak,
};
use icu_properties::{CodePointMapData, CodePointSetData};
use unicode_width::UnicodeWidthChar;

// Boundary class encoding; must match `BoundaryClass` in src/unicode.rs.
const CLASS_INVALID: u16 = 0;
const CLASS_L: u16 = 1;
const CLASS_V: u16 = 2;
const CLASS_T: u16 = 3;
const CLASS_LV: u16 = 4;
const CLASS_LVT: u16 = 5;
const CLASS_PREPEND: u16 = 6;
const CLASS_EXTEND: u16 = 7;
const CLASS_ZWJ: u16 = 8;
const CLASS_SPACING_MARK: u16 = 9;
const CLASS_REGIONAL_INDICATOR: u16 = 10;
const CLASS_EXTENDED_PICTOGRAPHIC: u16 = 11;
const CLASS_EXTENDED_PICTOGRAPHIC_BASE: u16 = 12;
const CLASS_EMOJI_MODIFIER: u16 = 13;

const MAX_CODEPOINT: u32 = 0x10FFFF;

fn main() {
    println!("cargo::rerun-if-changed=build.rs");

    let properties = compute_properties();
    let (stage1, stage2, stage3) = compress(&properties);

    let mut out = String::new();
    writeln!(out, "// Generated by build.rs; do not edit.").unwrap();
    emit_array(&mut out, "STAGE1", &stage1);
    emit_array(&mut out, "STAGE2", &stage2);
    emit_array(&mut out, "STAGE3", &stage3);

    let out_dir = PathBuf::from(env::var_os("OUT_DIR").expect("OUT_DIR is set by cargo"));
    fs::write(out_dir.join("unicode_tables.rs"), out).expect("write unicode tables");
}

/// Dense packed properties for every codepoint.
fn compute_properties() -> Vec<u16> {
    let gcb = CodePointMapData::<GraphemeClusterBreak>::new();
    let extended_pictographic = CodePointSetData::new::<ExtendedPictographic>();
    let emoji_modifier = CodePointSetData::new::<EmojiModifier>();
    let emoji_modifier_base = CodePointSetData::new::<EmojiModifierBase>();

    (0..=MAX_CODEPOINT)
        .map(|cp| {
            // Surrogates and other non-characters: width 0, invalid class.
            let Some(c) = char::from_u32(cp) else {
                return 0u16;
            };

            // C0/C1 controls never occupy a cell.
            let width: u16 = if cp < 0x20 || (0x7F..=0x9F).contains(&cp) {
                0
            } else {
                c.width().unwrap_or(0).min(2) as u16
            };

            // Emoji modifiers carry GCB=Extend; give them their own class
            // so the boundary machine can still tell them apart.
            let class = if emoji_modifier.contains(c) {
                CLASS_EMOJI_MODIFIER
            } else {
                let break_class = gcb.get(c);
                if break_class == GraphemeClusterBreak::L {
                    CLASS_L
                } else if break_class == GraphemeClusterBreak::V {
                    CLASS_V
                } else if break_class == GraphemeClusterBreak::T {
                    CLASS_T
                } else if break_class == GraphemeClusterBreak::LV {
                    CLASS_LV
                } else if break_class == GraphemeClusterBreak::LVT {
                    CLASS_LVT
                } else if break_class == GraphemeClusterBreak::Prepend {
                    CLASS_PREPEND
                } else if break_class == GraphemeClusterBreak::Extend {
                    CLASS_EXTEND
                } else if break_class == GraphemeClusterBreak::ZWJ {
                    CLASS_ZWJ
                } else if break_class == GraphemeClusterBreak::SpacingMark {
                    CLASS_SPACING_MARK
                } else if break_class == GraphemeClusterBreak::RegionalIndicator {
                    CLASS_REGIONAL_INDICATOR
                } else if extended_pictographic.contains(c) {
                    if emoji_modifier_base.contains(c) {
                        CLASS_EXTENDED_PICTOGRAPHIC_BASE
                    } else {
                        CLASS_EXTENDED_PICTOGRAPHIC
                    }
                } else {
                    CLASS_INVALID
                }
            };

            width | (class << 2)
        })
        .collect()
}

/// Compress the dense table into the three stages by deduplicating first
/// distinct values, then distinct 256-entry blocks.
fn compress(properties: &[u16]) -> (Vec<u16>, Vec<u16>, Vec<u16>) {
    use std::collections::HashMap;

    let mut stage3: Vec<u16> = Vec::new();
    let mut value_slots: HashMap<u16, u16> = HashMap::new();
    let mut stage2: Vec<u16> = Vec::new();
    let mut block_ids: HashMap<Vec<u16>, u16> = HashMap::new();
    let mut stage1: Vec<u16> = Vec::new();

    debug_assert_eq!(properties.len() % 256, 0);
    for block_start in (0..properties.len()).step_by(256) {
        let block: Vec<u16> = properties[block_start..block_start + 256]
            .iter()
            .map(|&value| {
                *value_slots.entry(value).or_insert_with(|| {
                    stage3.push(value);
                    u16::try_from(stage3.len() - 1).expect("stage3 overflow")
                })
            })
            .collect();

        let id = *block_ids.entry(block.clone()).or_insert_with(|| {
            let id = u16::try_from(stage2.len() / 256).expect("stage2 overflow");
            stage2.extend_from_slice(&block);
            id
        });
        stage1.push(id);
    }

    (stage1, stage2, stage3)
}

fn emit_array(out: &mut String, name: &str, data: &[u16]) {
    writeln!(out, "pub const {}: [u16; {}] = [", name, data.len()).unwrap();
    for chunk in data.chunks(16) {
        let line: Vec<String> = chunk.iter().map(|v| v.to_string()).collect();
        writeln!(out, "    {},", line.join(", ")).unwrap();
    }
    writeln!(out, "];").unwrap();
}
