//! Terminal mode state.
//!
//! Modes are plain data: setting or clearing one never mutates cells. The
//! mouse-reporting modes collapse into a tracker (which events to report)
//! and a format (how to encode them), matching how the escape sequences
//! actually compose.

use serde::{Deserialize, Serialize};

/// Which mouse events are reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MouseEvents {
    #[default]
    None,
    /// X10 compatibility: button presses only.
    X10,
    /// Press and release.
    Normal,
    /// Press, release, and drag while a button is held.
    Button,
    /// All motion.
    Any,
}

/// How mouse reports are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MouseFormat {
    #[default]
    X10,
    Utf8,
    Sgr,
    Urxvt,
    SgrPixels,
}

/// The toggleable modes a host can set, numbered here by meaning rather
/// than by escape-sequence parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModeKind {
    Wraparound,
    Origin,
    Insert,
    GraphemeCluster,
    ReverseVideo,
    AlternateScreen,
    MouseX10,
    MouseNormal,
    MouseButtonEvent,
    MouseAnyEvent,
    MouseUtf8,
    MouseSgr,
    MouseSgrPixels,
    MouseUrxvt,
}

/// The packed mode record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modes {
    pub wraparound: bool,
    pub origin: bool,
    pub insert: bool,
    pub grapheme_cluster: bool,
    pub reverse_video: bool,
    pub mouse_events: MouseEvents,
    pub mouse_format: MouseFormat,
}

impl Default for Modes {
    fn default() -> Self {
        Modes {
            // Wraparound is on by default; everything else starts off.
            wraparound: true,
            origin: false,
            insert: false,
            grapheme_cluster: false,
            reverse_video: false,
            mouse_events: MouseEvents::default(),
            mouse_format: MouseFormat::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_modes() {
        let modes = Modes::default();
        assert!(modes.wraparound);
        assert!(!modes.insert);
        assert!(!modes.origin);
        assert_eq!(modes.mouse_events, MouseEvents::None);
        assert_eq!(modes.mouse_format, MouseFormat::X10);
    }
}
