//! Keyboard input types for element interaction.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// WebDriver "Null" key: releases all held modifiers.
const NULL: char = '\u{E000}';

/// Keyboard key sent to a focused element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    /// Printable character, sent as-is
    Char(char),

    /// Submits forms
    Enter,
    /// Moves focus
    Tab,
    /// Closes dialogs and menus
    Escape,
    /// Deletes before the caret
    Backspace,
    /// Deletes after the caret
    Delete,
    /// Space bar
    Space,

    /// Arrow up
    Up,
    /// Arrow down
    Down,
    /// Arrow left
    Left,
    /// Arrow right
    Right,
    /// Start of line or page
    Home,
    /// End of line or page
    End,
    /// Scroll one page up
    PageUp,
    /// Scroll one page down
    PageDown,

    /// F1 through F12
    F(u8),

    /// Control chord, e.g. Ctrl+a to select all
    Ctrl(char),
    /// Alt chord
    Alt(char),
    /// Shift held around another key
    Shift(Box<Key>),
}

impl Key {
    /// Parse an operator-typed key name.
    ///
    /// Names are case-insensitive:
    /// - "a" -> Key::Char('a') (single characters keep their case)
    /// - "ENTER", "Return" -> Key::Enter
    /// - "Ctrl+a" -> Key::Ctrl('a')
    /// - "Shift+Tab" -> Key::Shift(Tab)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let lower = s.to_ascii_lowercase();

        if let Some(rest) = lower.strip_prefix("ctrl+") {
            return single_char(rest)
                .map(Key::Ctrl)
                .ok_or_else(|| Error::InvalidInput(format!("Invalid Ctrl+ key: {s}")));
        }

        if lower.starts_with("alt+") {
            return single_char(&s[4..])
                .map(Key::Alt)
                .ok_or_else(|| Error::InvalidInput(format!("Invalid Alt+ key: {s}")));
        }

        if lower.starts_with("shift+") {
            let inner = Key::parse(&s[6..])?;
            return Ok(Key::Shift(Box::new(inner)));
        }

        match lower.as_str() {
            "enter" | "return" => Ok(Key::Enter),
            "tab" => Ok(Key::Tab),
            "escape" | "esc" => Ok(Key::Escape),
            "backspace" => Ok(Key::Backspace),
            "delete" | "del" => Ok(Key::Delete),
            "space" => Ok(Key::Space),
            "up" => Ok(Key::Up),
            "down" => Ok(Key::Down),
            "left" => Ok(Key::Left),
            "right" => Ok(Key::Right),
            "home" => Ok(Key::Home),
            "end" => Ok(Key::End),
            "pageup" | "pgup" => Ok(Key::PageUp),
            "pagedown" | "pgdn" => Ok(Key::PageDown),
            _ => {
                if let Some(n) = lower
                    .strip_prefix('f')
                    .and_then(|n| n.parse::<u8>().ok())
                    .filter(|n| (1..=12).contains(n))
                {
                    return Ok(Key::F(n));
                }
                single_char(s)
                    .map(Key::Char)
                    .ok_or_else(|| Error::InvalidInput(format!("Unknown key: {s}")))
            }
        }
    }

    /// Text payload for the WebDriver "Element Send Keys" command.
    ///
    /// Special keys map to the W3C WebDriver private-use code points;
    /// modifier chords end with the Null key.
    pub fn to_webdriver_text(&self) -> String {
        match self {
            Key::Char(c) => c.to_string(),
            Key::Backspace => '\u{E003}'.to_string(),
            Key::Tab => '\u{E004}'.to_string(),
            Key::Enter => '\u{E007}'.to_string(),
            Key::Escape => '\u{E00C}'.to_string(),
            Key::Space => '\u{E00D}'.to_string(),
            Key::PageUp => '\u{E00E}'.to_string(),
            Key::PageDown => '\u{E00F}'.to_string(),
            Key::End => '\u{E010}'.to_string(),
            Key::Home => '\u{E011}'.to_string(),
            Key::Left => '\u{E012}'.to_string(),
            Key::Up => '\u{E013}'.to_string(),
            Key::Right => '\u{E014}'.to_string(),
            Key::Down => '\u{E015}'.to_string(),
            Key::Delete => '\u{E017}'.to_string(),
            Key::F(n) => char::from_u32(0xE030 + u32::from(*n))
                .map(String::from)
                .unwrap_or_default(),
            Key::Ctrl(c) => format!("\u{E009}{c}{NULL}"),
            Key::Alt(c) => format!("\u{E00A}{c}{NULL}"),
            Key::Shift(inner) => format!("\u{E008}{}{NULL}", inner.to_webdriver_text()),
        }
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Key::Char(c) => return write!(f, "{c}"),
            Key::F(n) => return write!(f, "F{n}"),
            Key::Ctrl(c) => return write!(f, "Ctrl+{c}"),
            Key::Alt(c) => return write!(f, "Alt+{c}"),
            Key::Shift(inner) => return write!(f, "Shift+{inner}"),
            Key::Enter => "Enter",
            Key::Tab => "Tab",
            Key::Escape => "Escape",
            Key::Backspace => "Backspace",
            Key::Delete => "Delete",
            Key::Space => "Space",
            Key::Up => "Up",
            Key::Down => "Down",
            Key::Left => "Left",
            Key::Right => "Right",
            Key::Home => "Home",
            Key::End => "End",
            Key::PageUp => "PageUp",
            Key::PageDown => "PageDown",
        };
        f.write_str(name)
    }
}
