// Concrete end-to-end scenarios against the documented contract, plus a
// cross-check of the grapheme boundary machine against an independent
// segmentation implementation.

use termgrid::pagelist::Scroll;
use termgrid::sgr::Attribute;
use termgrid::unicode;
use termgrid::{ModeKind, Point, Terminal};
use unicode_segmentation::UnicodeSegmentation;

fn dump(t: &Terminal) -> String {
    t.dump_string_alloc(Point::screen(0, 0))
}

// Plain text on a default screen.
#[test]
fn test_hello_world() {
    let mut t = Terminal::new(80, 24).unwrap();
    t.input("hello, world").unwrap();
    assert_eq!((t.screen().cursor().x, t.screen().cursor().y), (12, 0));
    insta::assert_snapshot!(dump(&t), @"hello, world");
}

// An explicit newline starts the next row at column zero.
#[test]
fn test_explicit_newline() {
    let mut t = Terminal::new(80, 24).unwrap();
    t.input("hello\nworld").unwrap();
    insta::assert_snapshot!(dump(&t), @r"
    hello
    world
    ");
}

// Soft wrap on a narrow screen.
#[test]
fn test_soft_wrap_narrow_screen() {
    let mut t = Terminal::new(5, 40).unwrap();
    t.input("helloworldabc12").unwrap();
    assert!(t.screen().cursor().pending_wrap);
    assert_eq!((t.screen().cursor().x, t.screen().cursor().y), (4, 2));
    insta::assert_snapshot!(dump(&t), @r"
    hello
    world
    abc12
    ");
}

// Style interning and release across print and erase.
#[test]
fn test_style_intern_release() {
    let mut t = Terminal::new(80, 24).unwrap();
    assert_eq!(t.screen().cursor_page_style_count(), 0);

    t.set_attribute(Attribute::Bold).unwrap();
    assert_eq!(t.screen().cursor_page_style_count(), 1);

    t.input("hello world").unwrap();
    assert_eq!(t.screen().cursor_page_style_count(), 1);

    t.set_attribute(Attribute::Unset).unwrap();
    assert_eq!(t.screen().cursor_page_style_count(), 1, "cells still hold the style");

    t.erase_display(termgrid::EraseDisplay::Complete, false);
    assert_eq!(t.screen().cursor_page_style_count(), 0);
    assert_eq!(t.screen().cursor_page_style_refs(), 0);
}

// Scrollback navigation clamps at the top of history.
#[test]
fn test_scrollback_clamp_at_top() {
    let mut t = Terminal::new(80, 24).unwrap();
    t.input("first").unwrap();
    // Grow history by ten rows.
    for _ in 0..10 {
        t.input("\n").unwrap();
    }
    // Push the cursor to the bottom so further newlines scroll.
    for _ in 0..13 {
        t.input("\n").unwrap();
    }
    for _ in 0..10 {
        t.input("\n").unwrap();
    }
    assert_eq!(t.screen().pages().history_rows(), 10);

    t.scroll_viewport(Scroll::Top);
    t.scroll_viewport(Scroll::Delta(-100));
    let pages = t.screen().pages();
    assert_eq!(pages.screen_row_of(pages.viewport_top()), 0, "clamped at the first row");
    assert_eq!(
        t.screen().get_cell(Point::viewport(0, 0)),
        t.screen().get_cell(Point::screen(0, 0))
    );
    // The very first printed row is visible at the viewport top.
    let cell = t.screen().get_cell(Point::viewport(0, 0)).unwrap();
    assert_eq!(cell.codepoint(), 'f' as u32);
}

// A zero-width joiner at column 0 of an empty row is dropped.
#[test]
fn test_zwj_at_origin_dropped() {
    let mut t = Terminal::new(80, 24).unwrap();
    t.print('\u{200D}').unwrap();
    assert_eq!((t.screen().cursor().x, t.screen().cursor().y), (0, 0));
    assert_eq!(
        t.screen().get_cell(Point::active(0, 0)),
        Some(termgrid::Cell::EMPTY)
    );
    insta::assert_snapshot!(dump(&t), @"");
}

#[test]
fn test_styled_dump_with_wrap_and_erase() {
    let mut t = Terminal::new(10, 5).unwrap();
    t.set_attribute(Attribute::Fg(termgrid::Color::Palette(1))).unwrap();
    t.input("0123456789ABCDE").unwrap();
    t.set_attribute(Attribute::Unset).unwrap();
    t.cursor_position(2, 1);
    t.erase_line(termgrid::EraseLine::Right, false);
    insta::assert_snapshot!(dump(&t), @r"
    0123456789
    AB
    ");
}

/// Segment a string with the crate's boundary machine: returns the
/// clusters as strings.
fn clusters_via_core(s: &str) -> Vec<String> {
    let mut clusters: Vec<String> = Vec::new();
    let mut state = unicode::BreakState::default();
    let mut prev: Option<char> = None;
    for c in s.chars() {
        let breaks = match prev {
            None => true,
            Some(p) => unicode::grapheme_break(
                unicode::properties(p as u32).boundary_class,
                unicode::properties(c as u32).boundary_class,
                &mut state,
            ),
        };
        if breaks {
            clusters.push(String::new());
        }
        clusters.last_mut().unwrap().push(c);
        prev = Some(c);
    }
    clusters
}

#[test]
fn test_grapheme_breaks_match_unicode_segmentation() {
    // Samples chosen to exercise Extend, ZWJ sequences, flags, Hangul,
    // and emoji modifiers; all are stable across recent Unicode versions.
    let samples = [
        "hello world",
        "he\u{301}llo",
        "e\u{301}\u{302}x",
        "\u{1F469}\u{200D}\u{1F680} crew",
        "\u{1F1FA}\u{1F1F8}\u{1F1E9}\u{1F1EA}!",
        "\u{1F44D}\u{1F3FD} ok",
        "\u{1100}\u{1161}\u{11A8}\u{AC00}\u{11A8}",
        "mixed 你好 text",
    ];
    for sample in samples {
        let reference: Vec<&str> = sample.graphemes(true).collect();
        let ours = clusters_via_core(sample);
        assert_eq!(ours, reference, "segmentation diverged for {:?}", sample);
    }
}

#[test]
fn test_wide_and_cluster_printing_end_to_end() {
    let mut t = Terminal::new(20, 4).unwrap();
    t.set_mode(ModeKind::GraphemeCluster, true);
    t.input("ok ").unwrap();
    t.print('\u{1F469}').unwrap();
    t.print('\u{200D}').unwrap();
    t.print('\u{1F680}').unwrap();
    t.input(" end").unwrap();
    assert_eq!(dump(&t), "ok \u{1F469}\u{200D}\u{1F680} end");
}
