//! Translation from raw key presses to viewer commands.

use crate::gate::GateKey;
use crate::image_set::TraversalMode;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

/// Symbolic key, independent of the windowing toolkit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyName {
    /// Printable key, lower-cased base character.
    Char(char),
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
    Home,
    End,
    Delete,
    Backspace,
    Escape,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub code: u32,
    pub name: KeyName,
    /// Character the key produced, with shift applied.
    pub text: Option<char>,
    pub modifiers: Modifiers,
}

impl KeyPress {
    pub fn char(c: char) -> Self {
        Self {
            code: c as u32,
            name: KeyName::Char(c.to_ascii_lowercase()),
            text: Some(c),
            modifiers: Modifiers::default(),
        }
    }

    pub fn named(name: KeyName) -> Self {
        Self {
            code: 0,
            name,
            text: None,
            modifiers: Modifiers::default(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanDirection {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Pan(PanDirection),
    Advance { mode: TraversalMode, count: usize },
    Retreat { mode: TraversalMode, count: usize },
    First,
    Last,
    /// Start the slideshow, or change its pace when running.
    Slideshow { slower: bool },
    ZoomIn,
    ZoomOut,
    ZoomTo(f32),
    ZoomActual,
    ZoomFit,
    WindowGrow,
    WindowShrink,
    RotateCcw,
    RotateCw,
    ShowMetadata,
    ToggleFullscreen,
    ToggleHelp,
}

/// The gate's view of a key. Letters, digits and punctuation qualify, as do
/// Delete and meta+Backspace.
pub fn gate_key(key: &KeyPress) -> Option<GateKey> {
    match key.name {
        KeyName::Char(c) if c.is_ascii_alphanumeric() || c.is_ascii_punctuation() => {
            Some(GateKey::Char(c))
        }
        KeyName::Delete => Some(GateKey::Delete),
        KeyName::Backspace if key.modifiers.meta => Some(GateKey::Delete),
        _ => None,
    }
}

fn step(modifiers: Modifiers) -> usize {
    if modifiers.ctrl {
        50
    } else if modifiers.shift {
        10
    } else {
        1
    }
}

pub fn translate(key: &KeyPress) -> Option<Command> {
    let m = key.modifiers;
    let ordered = TraversalMode::Ordered;

    match key.name {
        KeyName::Up => return Some(Command::Pan(PanDirection::Up)),
        KeyName::Down => return Some(Command::Pan(PanDirection::Down)),
        KeyName::Left => return Some(Command::Pan(PanDirection::Left)),
        KeyName::Right => return Some(Command::Pan(PanDirection::Right)),
        KeyName::PageDown => return Some(Command::Advance { mode: ordered, count: 1 }),
        KeyName::PageUp => return Some(Command::Retreat { mode: ordered, count: 1 }),
        KeyName::Home => return Some(Command::First),
        KeyName::End => return Some(Command::Last),
        KeyName::Char(_) => {}
        _ => return None,
    }

    let text = key.text?;
    let cmd = match text {
        '\'' | '"' => Command::Advance { mode: ordered, count: step(m) },
        ';' | ':' => Command::Retreat { mode: ordered, count: step(m) },
        ']' => Command::Advance { mode: TraversalMode::Shuffled, count: 1 },
        '[' => Command::Retreat { mode: TraversalMode::Shuffled, count: 1 },
        '.' => Command::Advance { mode: TraversalMode::Random, count: 1 },
        ',' => Command::Retreat { mode: TraversalMode::Random, count: 1 },
        's' | 'S' => Command::Slideshow { slower: m.shift || text == 'S' },
        '-' | '_' if m.shift => Command::WindowShrink,
        '=' | '+' if m.shift => Command::WindowGrow,
        '-' | '_' => Command::ZoomOut,
        '=' | '+' => Command::ZoomIn,
        '2' => Command::ZoomTo(2.0),
        '3' => Command::ZoomTo(3.0),
        '4' => Command::ZoomTo(4.0),
        'z' | '1' => Command::ZoomActual,
        'x' => Command::ZoomFit,
        'r' => Command::RotateCcw,
        'R' => Command::RotateCw,
        'i' => Command::ShowMetadata,
        'f' => Command::ToggleFullscreen,
        '?' => Command::ToggleHelp,
        _ => return None,
    };
    Some(cmd)
}
