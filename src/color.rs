//! RGB color math and the 256-entry palette.
//!
//! The luminance/contrast helpers implement the W3C relative-luminance and
//! contrast-ratio formulas; `contrasted` is the iterative minimum-contrast
//! foreground adjustment used by renderers. They live here because they
//! ride on the color model, even though the core itself never renders.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A direct 24-bit color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };
    pub const WHITE: Rgb = Rgb { r: 255, g: 255, b: 255 };

    pub const fn new(r: u8, g: u8, b: u8) -> Rgb {
        Rgb { r, g, b }
    }

    /// W3C relative luminance.
    /// <https://www.w3.org/TR/WCAG20/#relativeluminancedef>
    pub fn luminance(self) -> f64 {
        fn linearize(channel: u8) -> f64 {
            let c = channel as f64 / 255.0;
            if c <= 0.03928 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        }
        0.2126 * linearize(self.r) + 0.7152 * linearize(self.g) + 0.0722 * linearize(self.b)
    }

    /// W3C contrast ratio, in `1.0..=21.0`.
    /// <https://www.w3.org/TR/WCAG20/#contrast-ratiodef>
    pub fn contrast(self, other: Rgb) -> f64 {
        let l1 = self.luminance();
        let l2 = other.luminance();
        let (lighter, darker) = if l1 > l2 { (l1, l2) } else { (l2, l1) };
        (lighter + 0.05) / (darker + 0.05)
    }

    /// Return a foreground color with at least `min` contrast against `bg`,
    /// starting from `self`.
    ///
    /// When `self` already satisfies the ratio it is returned unchanged.
    /// Otherwise the result is found by binary-searching along the grey
    /// axis between `self` and whichever of black/white contrasts better
    /// with `bg`. If even the endpoint cannot reach `min`, the endpoint is
    /// returned.
    pub fn contrasted(self, bg: Rgb, min: f64) -> Rgb {
        if self.contrast(bg) >= min {
            return self;
        }

        let target = if Rgb::WHITE.contrast(bg) >= Rgb::BLACK.contrast(bg) {
            Rgb::WHITE
        } else {
            Rgb::BLACK
        };
        if target.contrast(bg) < min {
            return target;
        }

        // Invariant across iterations: blend(hi) satisfies min, blend(lo)
        // does not. 16 halvings puts the channel error below one step.
        let blend = |t: f64| -> Rgb {
            let mix = |a: u8, b: u8| -> u8 {
                (a as f64 + (b as f64 - a as f64) * t).round().clamp(0.0, 255.0) as u8
            };
            Rgb::new(mix(self.r, target.r), mix(self.g, target.g), mix(self.b, target.b))
        };

        let mut lo = 0.0_f64;
        let mut hi = 1.0_f64;
        let mut best = target;
        for _ in 0..16 {
            let mid = (lo + hi) / 2.0;
            let candidate = blend(mid);
            if candidate.contrast(bg) >= min {
                best = candidate;
                hi = mid;
            } else {
                lo = mid;
            }
        }
        best
    }

    /// Parse `#rgb`, `#rrggbb`, or X11 `rgb:rr/gg/bb` forms.
    pub fn parse(s: &str) -> Result<Rgb, Error> {
        fn hex(s: &str) -> Result<u8, Error> {
            u8::from_str_radix(s, 16).map_err(|_| Error::InvalidFormat)
        }

        if let Some(hexstr) = s.strip_prefix('#') {
            return match hexstr.len() {
                3 => {
                    let channel = |i: usize| -> Result<u8, Error> {
                        let v = hex(&hexstr[i..i + 1])?;
                        Ok(v << 4 | v)
                    };
                    Ok(Rgb::new(channel(0)?, channel(1)?, channel(2)?))
                }
                6 => Ok(Rgb::new(
                    hex(&hexstr[0..2])?,
                    hex(&hexstr[2..4])?,
                    hex(&hexstr[4..6])?,
                )),
                _ => Err(Error::InvalidFormat),
            };
        }

        if let Some(spec) = s.strip_prefix("rgb:") {
            let mut parts = spec.split('/');
            let mut channel = || -> Result<u8, Error> {
                let part = parts.next().ok_or(Error::InvalidFormat)?;
                // X11 allows 1-4 hex digits per channel, scaled to 8 bits.
                match part.len() {
                    1 => {
                        let v = hex(part)?;
                        Ok(v << 4 | v)
                    }
                    2 => hex(part),
                    3 | 4 => {
                        let wide = u16::from_str_radix(part, 16).map_err(|_| Error::InvalidFormat)?;
                        let max = (1u32 << (4 * part.len() as u32)) - 1;
                        Ok(((wide as u32 * 255 + max / 2) / max) as u8)
                    }
                    _ => Err(Error::InvalidFormat),
                }
            };
            let r = channel()?;
            let g = channel()?;
            let b = channel()?;
            if parts.next().is_some() {
                return Err(Error::InvalidFormat);
            }
            return Ok(Rgb::new(r, g, b));
        }

        Err(Error::InvalidFormat)
    }
}

/// The 256-entry terminal palette.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette(pub [Rgb; 256]);

impl Default for Palette {
    fn default() -> Self {
        let mut colors = [Rgb::BLACK; 256];

        // Standard and bright ANSI colors (xterm defaults).
        const BASE: [Rgb; 16] = [
            Rgb::new(0x00, 0x00, 0x00),
            Rgb::new(0xcd, 0x00, 0x00),
            Rgb::new(0x00, 0xcd, 0x00),
            Rgb::new(0xcd, 0xcd, 0x00),
            Rgb::new(0x00, 0x00, 0xee),
            Rgb::new(0xcd, 0x00, 0xcd),
            Rgb::new(0x00, 0xcd, 0xcd),
            Rgb::new(0xe5, 0xe5, 0xe5),
            Rgb::new(0x7f, 0x7f, 0x7f),
            Rgb::new(0xff, 0x00, 0x00),
            Rgb::new(0x00, 0xff, 0x00),
            Rgb::new(0xff, 0xff, 0x00),
            Rgb::new(0x5c, 0x5c, 0xff),
            Rgb::new(0xff, 0x00, 0xff),
            Rgb::new(0x00, 0xff, 0xff),
            Rgb::new(0xff, 0xff, 0xff),
        ];
        colors[..16].copy_from_slice(&BASE);

        // 6x6x6 color cube.
        const LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];
        for i in 0..216 {
            colors[16 + i] = Rgb::new(LEVELS[i / 36], LEVELS[i / 6 % 6], LEVELS[i % 6]);
        }

        // 24-step greyscale ramp.
        for i in 0..24 {
            let level = 8 + 10 * i as u8;
            colors[232 + i] = Rgb::new(level, level, level);
        }

        Palette(colors)
    }
}

impl std::ops::Index<u8> for Palette {
    type Output = Rgb;

    fn index(&self, index: u8) -> &Rgb {
        &self.0[index as usize]
    }
}

impl std::ops::IndexMut<u8> for Palette {
    fn index_mut(&mut self, index: u8) -> &mut Rgb {
        &mut self.0[index as usize]
    }
}
