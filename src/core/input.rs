/// Terminal key events → wire input events.
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers, ModifierKeyCode};

use crate::core::protocol::{InputEvent, KeyAction};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    Forward(InputEvent),
    NewGame,
    Quit,
    Ignore,
}

/// Maps one terminal key event. Control+R is consumed locally on press,
/// repeat and release; only press and repeat start a new game.
pub fn map_key(event: &KeyEvent) -> InputAction {
    let ctrl = event.modifiers.contains(KeyModifiers::CONTROL);
    let released = event.kind == KeyEventKind::Release;

    if ctrl {
        match event.code {
            KeyCode::Char('r') | KeyCode::Char('R') => {
                return if released {
                    InputAction::Ignore
                } else {
                    InputAction::NewGame
                };
            }
            KeyCode::Char('c') | KeyCode::Char('C') => {
                return if released {
                    InputAction::Ignore
                } else {
                    InputAction::Quit
                };
            }
            _ => {}
        }
    }

    let Some(key) = key_name(event.code) else {
        return InputAction::Ignore;
    };
    let action = if released {
        KeyAction::Keyup
    } else {
        KeyAction::Keydown
    };
    InputAction::Forward(InputEvent { action, key })
}

/// DOM `KeyboardEvent.key` name for a terminal key code.
pub fn key_name(code: KeyCode) -> Option<String> {
    let name = match code {
        KeyCode::Char(c) => return Some(c.to_string()),
        KeyCode::Up => "ArrowUp",
        KeyCode::Down => "ArrowDown",
        KeyCode::Left => "ArrowLeft",
        KeyCode::Right => "ArrowRight",
        KeyCode::Enter => "Enter",
        KeyCode::Esc => "Escape",
        KeyCode::Backspace => "Backspace",
        KeyCode::Tab | KeyCode::BackTab => "Tab",
        KeyCode::Delete => "Delete",
        KeyCode::Insert => "Insert",
        KeyCode::Home => "Home",
        KeyCode::End => "End",
        KeyCode::PageUp => "PageUp",
        KeyCode::PageDown => "PageDown",
        KeyCode::CapsLock => "CapsLock",
        KeyCode::ScrollLock => "ScrollLock",
        KeyCode::NumLock => "NumLock",
        KeyCode::PrintScreen => "PrintScreen",
        KeyCode::Pause => "Pause",
        KeyCode::Menu => "ContextMenu",
        KeyCode::F(n) => return Some(format!("F{n}")),
        KeyCode::Modifier(m) => match m {
            ModifierKeyCode::LeftShift | ModifierKeyCode::RightShift => "Shift",
            ModifierKeyCode::LeftControl | ModifierKeyCode::RightControl => "Control",
            ModifierKeyCode::LeftAlt | ModifierKeyCode::RightAlt => "Alt",
            ModifierKeyCode::LeftSuper
            | ModifierKeyCode::RightSuper
            | ModifierKeyCode::LeftMeta
            | ModifierKeyCode::RightMeta => "Meta",
            ModifierKeyCode::LeftHyper | ModifierKeyCode::RightHyper => "Hyper",
            ModifierKeyCode::IsoLevel3Shift => "AltGraph",
            ModifierKeyCode::IsoLevel5Shift => "Level5Shift",
        },
        _ => return None,
    };
    Some(name.to_owned())
}

/// Synthesises `keyup` for terminals that only report presses.
///
/// A key counts as held from its last press or repeat; once it has been
/// quiet for `timeout` a release is emitted for it.
#[derive(Debug)]
pub struct KeyReleaseEmulator {
    timeout: Duration,
    held: HashMap<String, Instant>,
}

impl KeyReleaseEmulator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            held: HashMap::new(),
        }
    }

    pub fn observe(&mut self, event: &InputEvent, now: Instant) {
        match event.action {
            KeyAction::Keydown => {
                self.held.insert(event.key.clone(), now);
            }
            KeyAction::Keyup => {
                self.held.remove(&event.key);
            }
        }
    }

    pub fn expire(&mut self, now: Instant) -> Vec<InputEvent> {
        let timeout = self.timeout;
        let mut released: Vec<InputEvent> = Vec::new();
        self.held.retain(|key, last| {
            let stale = now.saturating_duration_since(*last) >= timeout;
            if stale {
                released.push(InputEvent::keyup(key.clone()));
            }
            !stale
        });
        released.sort_by(|a, b| a.key.cmp(&b.key));
        released
    }

    pub fn release_all(&mut self) -> Vec<InputEvent> {
        let mut released: Vec<InputEvent> = self.held.drain().map(|(key, _)| InputEvent::keyup(key)).collect();
        released.sort_by(|a, b| a.key.cmp(&b.key));
        released
    }

    /// Forgets held keys without producing releases.
    pub fn clear(&mut self) {
        self.held.clear();
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }
}
