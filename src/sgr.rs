//! SGR (Select Graphic Rendition) parameter parsing.
//!
//! The parser is a pull iterator: callers feed it the parameter list of
//! one CSI `m` sequence and drain typed [`Attribute`]s out of it. Each
//! parameter records whether it was attached to its predecessor with a
//! colon, which is what disambiguates `38:2:r:g:b` (one parameter with
//! sub-parameters) from the legacy `38;2;r;g;b` (five parameters).
//!
//! Unrecognized parameters come out as [`Attribute::Unknown`] carrying the
//! consumed values; the parser always advances, so a malformed sequence
//! can never wedge the caller.

use crate::color::Rgb;
use crate::style::{Color, Underline};

/// One SGR parameter. `sub` marks a parameter that followed a colon, i.e.
/// a sub-parameter of the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    pub value: u16,
    pub sub: bool,
}

impl Param {
    pub fn new(value: u16) -> Param {
        Param { value, sub: false }
    }

    pub fn sub(value: u16) -> Param {
        Param { value, sub: true }
    }
}

/// Build a plain (semicolon-separated) parameter list.
pub fn params(values: &[u16]) -> Vec<Param> {
    values.iter().map(|&v| Param::new(v)).collect()
}

/// A single typed SGR attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    /// SGR 0: reset everything.
    Unset,
    Bold,
    ResetBold,
    Faint,
    Italic,
    ResetItalic,
    Underline(Underline),
    ResetUnderline,
    UnderlineColor(Color),
    ResetUnderlineColor,
    Blink,
    ResetBlink,
    Inverse,
    ResetInverse,
    Invisible,
    ResetInvisible,
    Strikethrough,
    ResetStrikethrough,
    Fg(Color),
    ResetFg,
    Bg(Color),
    ResetBg,
    /// Parameters the terminal does not understand. Dropped by callers;
    /// kept here so diagnostics can log them.
    Unknown { params: Vec<u16> },
}

impl Attribute {
    /// Re-emit this attribute as a parameter list that parses back to an
    /// equivalent attribute.
    pub fn encode(&self) -> Vec<Param> {
        fn color(code: u16, c: &Color) -> Vec<Param> {
            match c {
                Color::None => vec![Param::new(code + 1)],
                Color::Palette(i) => vec![Param::new(code), Param::new(5), Param::new(*i as u16)],
                Color::Rgb(rgb) => vec![
                    Param::new(code),
                    Param::new(2),
                    Param::new(rgb.r as u16),
                    Param::new(rgb.g as u16),
                    Param::new(rgb.b as u16),
                ],
            }
        }

        match self {
            Attribute::Unset => vec![Param::new(0)],
            Attribute::Bold => vec![Param::new(1)],
            Attribute::Faint => vec![Param::new(2)],
            Attribute::Italic => vec![Param::new(3)],
            Attribute::Underline(kind) => match kind {
                Underline::None => vec![Param::new(24)],
                Underline::Single => vec![Param::new(4)],
                other => vec![Param::new(4), Param::sub(*other as u16)],
            },
            Attribute::Blink => vec![Param::new(5)],
            Attribute::Inverse => vec![Param::new(7)],
            Attribute::Invisible => vec![Param::new(8)],
            Attribute::Strikethrough => vec![Param::new(9)],
            Attribute::ResetBold => vec![Param::new(22)],
            Attribute::ResetItalic => vec![Param::new(23)],
            Attribute::ResetUnderline => vec![Param::new(24)],
            Attribute::ResetBlink => vec![Param::new(25)],
            Attribute::ResetInverse => vec![Param::new(27)],
            Attribute::ResetInvisible => vec![Param::new(28)],
            Attribute::ResetStrikethrough => vec![Param::new(29)],
            Attribute::Fg(c) => match c {
                Color::Palette(i) if *i < 8 => vec![Param::new(30 + *i as u16)],
                Color::Palette(i) if *i < 16 => vec![Param::new(90 + (*i - 8) as u16)],
                _ => color(38, c),
            },
            Attribute::ResetFg => vec![Param::new(39)],
            Attribute::Bg(c) => match c {
                Color::Palette(i) if *i < 8 => vec![Param::new(40 + *i as u16)],
                Color::Palette(i) if *i < 16 => vec![Param::new(100 + (*i - 8) as u16)],
                _ => color(48, c),
            },
            Attribute::ResetBg => vec![Param::new(49)],
            Attribute::UnderlineColor(c) => color(58, c),
            Attribute::ResetUnderlineColor => vec![Param::new(59)],
            Attribute::Unknown { params } => params.iter().map(|&v| Param::new(v)).collect(),
        }
    }
}

/// Pull parser over one SGR parameter list.
pub struct Parser<'a> {
    params: &'a [Param],
    idx: usize,
}

impl<'a> Parser<'a> {
    pub fn new(params: &'a [Param]) -> Parser<'a> {
        Parser { params, idx: 0 }
    }

    /// Consume the sub-parameters attached to the parameter at `idx - 1`.
    fn take_subs(&mut self) -> Vec<u16> {
        let start = self.idx;
        while self.idx < self.params.len() && self.params[self.idx].sub {
            self.idx += 1;
        }
        self.params[start..self.idx].iter().map(|p| p.value).collect()
    }

    /// Parse an extended color introduced by 38/48/58, in either the
    /// colon sub-parameter form or the legacy semicolon form.
    fn extended_color(&mut self, code: u16) -> Attribute {
        let wrap = |color: Color| match code {
            38 => Attribute::Fg(color),
            48 => Attribute::Bg(color),
            _ => Attribute::UnderlineColor(color),
        };

        let colon = self.idx < self.params.len() && self.params[self.idx].sub;
        if colon {
            let subs = self.take_subs();
            return match subs.split_first() {
                // 38:2:r:g:b, or 38:2:<colorspace>:r:g:b.
                Some((2, rest)) if rest.len() == 3 || rest.len() == 4 => {
                    let rgb = &rest[rest.len() - 3..];
                    wrap(Color::Rgb(Rgb::new(
                        rgb[0].min(255) as u8,
                        rgb[1].min(255) as u8,
                        rgb[2].min(255) as u8,
                    )))
                }
                // 38:5:idx.
                Some((5, rest)) if rest.len() == 1 => {
                    wrap(Color::Palette(rest[0].min(255) as u8))
                }
                _ => {
                    let mut all = vec![code];
                    all.extend(subs);
                    Attribute::Unknown { params: all }
                }
            };
        }

        // Legacy form: look at the mode parameter.
        match self.peek() {
            Some(2) if self.remaining() >= 4 => {
                self.idx += 1;
                let r = self.next_value().min(255) as u8;
                let g = self.next_value().min(255) as u8;
                let b = self.next_value().min(255) as u8;
                wrap(Color::Rgb(Rgb::new(r, g, b)))
            }
            Some(5) if self.remaining() >= 2 => {
                self.idx += 1;
                let index = self.next_value().min(255) as u8;
                wrap(Color::Palette(index))
            }
            _ => Attribute::Unknown { params: vec![code] },
        }
    }

    fn peek(&self) -> Option<u16> {
        self.params.get(self.idx).map(|p| p.value)
    }

    fn remaining(&self) -> usize {
        self.params.len() - self.idx
    }

    fn next_value(&mut self) -> u16 {
        let value = self.params[self.idx].value;
        self.idx += 1;
        value
    }
}

impl Iterator for Parser<'_> {
    type Item = Attribute;

    fn next(&mut self) -> Option<Attribute> {
        if self.idx >= self.params.len() {
            return None;
        }
        let value = self.next_value();

        let attr = match value {
            0 => Attribute::Unset,
            1 => Attribute::Bold,
            2 => Attribute::Faint,
            3 => Attribute::Italic,
            4 => {
                let subs = self.take_subs();
                match subs.first() {
                    None => Attribute::Underline(Underline::Single),
                    Some(0) => Attribute::ResetUnderline,
                    Some(1) => Attribute::Underline(Underline::Single),
                    Some(2) => Attribute::Underline(Underline::Double),
                    Some(3) => Attribute::Underline(Underline::Curly),
                    Some(4) => Attribute::Underline(Underline::Dotted),
                    Some(5) => Attribute::Underline(Underline::Dashed),
                    Some(_) => {
                        let mut all = vec![4];
                        all.extend(subs);
                        Attribute::Unknown { params: all }
                    }
                }
            }
            5 | 6 => Attribute::Blink,
            7 => Attribute::Inverse,
            8 => Attribute::Invisible,
            9 => Attribute::Strikethrough,
            21 => Attribute::Underline(Underline::Double),
            22 => Attribute::ResetBold,
            23 => Attribute::ResetItalic,
            24 => Attribute::ResetUnderline,
            25 => Attribute::ResetBlink,
            27 => Attribute::ResetInverse,
            28 => Attribute::ResetInvisible,
            29 => Attribute::ResetStrikethrough,
            30..=37 => Attribute::Fg(Color::Palette((value - 30) as u8)),
            38 => self.extended_color(38),
            39 => Attribute::ResetFg,
            40..=47 => Attribute::Bg(Color::Palette((value - 40) as u8)),
            48 => self.extended_color(48),
            49 => Attribute::ResetBg,
            58 => self.extended_color(58),
            59 => Attribute::ResetUnderlineColor,
            90..=97 => Attribute::Fg(Color::Palette((value - 90 + 8) as u8)),
            100..=107 => Attribute::Bg(Color::Palette((value - 100 + 8) as u8)),
            _ => {
                // Unknown: swallow any sub-parameters so the next pull
                // starts at a real parameter.
                let mut all = vec![value];
                all.extend(self.take_subs());
                Attribute::Unknown { params: all }
            }
        };
        Some(attr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(values: &[u16]) -> Vec<Attribute> {
        let list = params(values);
        Parser::new(&list).collect()
    }

    #[test]
    fn test_simple_attributes() {
        assert_eq!(parse(&[0]), vec![Attribute::Unset]);
        assert_eq!(parse(&[1]), vec![Attribute::Bold]);
        assert_eq!(
            parse(&[1, 3, 7]),
            vec![Attribute::Bold, Attribute::Italic, Attribute::Inverse]
        );
        assert_eq!(parse(&[22]), vec![Attribute::ResetBold]);
    }

    #[test]
    fn test_basic_colors() {
        assert_eq!(parse(&[31]), vec![Attribute::Fg(Color::Palette(1))]);
        assert_eq!(parse(&[44]), vec![Attribute::Bg(Color::Palette(4))]);
        assert_eq!(parse(&[95]), vec![Attribute::Fg(Color::Palette(13))]);
        assert_eq!(parse(&[104]), vec![Attribute::Bg(Color::Palette(12))]);
        assert_eq!(parse(&[39, 49]), vec![Attribute::ResetFg, Attribute::ResetBg]);
    }

    #[test]
    fn test_legacy_extended_colors() {
        assert_eq!(
            parse(&[38, 2, 10, 20, 30]),
            vec![Attribute::Fg(Color::Rgb(Rgb::new(10, 20, 30)))]
        );
        assert_eq!(
            parse(&[48, 5, 196]),
            vec![Attribute::Bg(Color::Palette(196))]
        );
        assert_eq!(
            parse(&[58, 2, 1, 2, 3]),
            vec![Attribute::UnderlineColor(Color::Rgb(Rgb::new(1, 2, 3)))]
        );
        // Attributes continue after the color form.
        assert_eq!(
            parse(&[38, 5, 7, 1]),
            vec![Attribute::Fg(Color::Palette(7)), Attribute::Bold]
        );
    }

    #[test]
    fn test_colon_extended_colors() {
        let list = vec![
            Param::new(38),
            Param::sub(2),
            Param::sub(10),
            Param::sub(20),
            Param::sub(30),
            Param::new(1),
        ];
        let attrs: Vec<_> = Parser::new(&list).collect();
        assert_eq!(
            attrs,
            vec![
                Attribute::Fg(Color::Rgb(Rgb::new(10, 20, 30))),
                Attribute::Bold
            ]
        );
    }

    #[test]
    fn test_colon_extended_color_with_colorspace() {
        let list = vec![
            Param::new(38),
            Param::sub(2),
            Param::sub(0),
            Param::sub(10),
            Param::sub(20),
            Param::sub(30),
        ];
        let attrs: Vec<_> = Parser::new(&list).collect();
        assert_eq!(attrs, vec![Attribute::Fg(Color::Rgb(Rgb::new(10, 20, 30)))]);
    }

    #[test]
    fn test_colon_indexed_color() {
        let list = vec![Param::new(48), Param::sub(5), Param::sub(100)];
        let attrs: Vec<_> = Parser::new(&list).collect();
        assert_eq!(attrs, vec![Attribute::Bg(Color::Palette(100))]);
    }

    #[test]
    fn test_underline_kinds() {
        assert_eq!(parse(&[4]), vec![Attribute::Underline(Underline::Single)]);
        assert_eq!(parse(&[21]), vec![Attribute::Underline(Underline::Double)]);
        let list = vec![Param::new(4), Param::sub(3)];
        let attrs: Vec<_> = Parser::new(&list).collect();
        assert_eq!(attrs, vec![Attribute::Underline(Underline::Curly)]);
        let list = vec![Param::new(4), Param::sub(0)];
        let attrs: Vec<_> = Parser::new(&list).collect();
        assert_eq!(attrs, vec![Attribute::ResetUnderline]);
    }

    #[test]
    fn test_unknown_parameters_advance() {
        assert_eq!(
            parse(&[99, 1]),
            vec![Attribute::Unknown { params: vec![99] }, Attribute::Bold]
        );
        // Truncated extended color does not consume what follows.
        assert_eq!(
            parse(&[38, 1]),
            vec![Attribute::Unknown { params: vec![38] }, Attribute::Bold]
        );
        // Malformed colon form swallows its sub-parameters only.
        let list = vec![Param::new(38), Param::sub(9), Param::sub(9), Param::new(1)];
        let attrs: Vec<_> = Parser::new(&list).collect();
        assert_eq!(
            attrs,
            vec![
                Attribute::Unknown {
                    params: vec![38, 9, 9]
                },
                Attribute::Bold
            ]
        );
    }

    #[test]
    fn test_empty_parameter_list() {
        assert_eq!(parse(&[]), Vec::<Attribute>::new());
    }

    #[test]
    fn test_encode_parse_roundtrip() {
        let attrs = vec![
            Attribute::Unset,
            Attribute::Bold,
            Attribute::Faint,
            Attribute::Italic,
            Attribute::Underline(Underline::Single),
            Attribute::Underline(Underline::Curly),
            Attribute::ResetUnderline,
            Attribute::UnderlineColor(Color::Rgb(Rgb::new(7, 8, 9))),
            Attribute::ResetUnderlineColor,
            Attribute::Blink,
            Attribute::Inverse,
            Attribute::Invisible,
            Attribute::Strikethrough,
            Attribute::ResetBold,
            Attribute::ResetItalic,
            Attribute::ResetBlink,
            Attribute::ResetInverse,
            Attribute::ResetInvisible,
            Attribute::ResetStrikethrough,
            Attribute::Fg(Color::Palette(3)),
            Attribute::Fg(Color::Palette(12)),
            Attribute::Fg(Color::Palette(200)),
            Attribute::Fg(Color::Rgb(Rgb::new(1, 2, 3))),
            Attribute::ResetFg,
            Attribute::Bg(Color::Palette(5)),
            Attribute::Bg(Color::Palette(14)),
            Attribute::Bg(Color::Palette(240)),
            Attribute::Bg(Color::Rgb(Rgb::new(200, 100, 50))),
            Attribute::ResetBg,
            Attribute::Unknown { params: vec![77] },
        ];
        for attr in attrs {
            let encoded = attr.encode();
            let parsed: Vec<_> = Parser::new(&encoded).collect();
            assert_eq!(parsed, vec![attr.clone()], "roundtrip of {:?}", attr);
        }
    }
}
