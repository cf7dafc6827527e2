//! Keyboard shortcuts

/// Modifier keys held with a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    /// Cmd on macOS, Super/Win elsewhere
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

/// A key press together with its modifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChord {
    pub key: String,
    pub modifiers: Modifiers,
}

impl KeyChord {
    pub fn new(key: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            key: key.into(),
            modifiers,
        }
    }

    pub fn ctrl(key: impl Into<String>) -> Self {
        Self::new(
            key,
            Modifiers {
                ctrl: true,
                ..Modifiers::default()
            },
        )
    }

    pub fn cmd(key: impl Into<String>) -> Self {
        Self::new(
            key,
            Modifiers {
                meta: true,
                ..Modifiers::default()
            },
        )
    }

    pub fn plain(key: impl Into<String>) -> Self {
        Self::new(key, Modifiers::default())
    }

    /// Ctrl or Cmd is held
    fn primary(&self) -> bool {
        self.modifiers.ctrl || self.modifiers.meta
    }
}

/// Workbench commands bound to shortcuts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Save the active tab
    Save,
    /// Show or hide the file tree
    ToggleSidebar,
}

/// Map a chord to a command, regardless of which element has focus.
///
/// Letters match case-insensitively so Shift or Caps Lock do not matter.
pub fn resolve(chord: &KeyChord) -> Option<Command> {
    if !chord.primary() || chord.modifiers.alt {
        return None;
    }
    match chord.key.to_ascii_lowercase().as_str() {
        "s" => Some(Command::Save),
        "b" => Some(Command::ToggleSidebar),
        _ => None,
    }
}
