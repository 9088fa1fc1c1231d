use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyEvent},
    terminal,
};

/// Process exit status after an interactive interrupt (`Ctrl+C`).
pub const INTERRUPT_STATUS: i32 = 130;

/// Similar to [`crossterm::event::KeyCode`] but only contains relevant information.
#[derive(Debug)]
pub enum Key {
    Enter,
    Char(char),
}

/// Must only be called if terminal is NOT in raw mode.
pub fn enable_raw_mode() {
    debug_assert!(
        !terminal::is_raw_mode_enabled().is_ok_and(|is| is),
        "terminal should not be in raw mode to enable raw mode",
    );
    terminal::enable_raw_mode().expect("failed to enable raw terminal");
}

/// Must only be called if terminal is in raw mode.
pub fn disable_raw_mode() {
    debug_assert!(
        terminal::is_raw_mode_enabled().is_ok_and(|is| is),
        "terminal should already be in raw mode to disable raw mode",
    );
    terminal::disable_raw_mode().expect("failed to disable raw terminal");
}

/// Read one input byte from the interactive terminal.
///
/// Raw mode is held only for the duration of the read, so program output
/// keeps normal line discipline.
///
/// `Ctrl+C` will always return the terminal to normal state and exit.
///
/// Caller must ensure terminal is NOT in raw mode.
pub fn read_byte() -> u8 {
    enable_raw_mode();
    let byte = match read_key() {
        Key::Char(ch) => ch as u8,
        Key::Enter => b'\n',
    };
    disable_raw_mode();
    byte
}

/// Check for a pending input byte without blocking, consuming it if present.
///
/// The caller is responsible for delivering a returned byte.
///
/// Caller must ensure terminal is NOT in raw mode.
pub fn poll_byte() -> Option<u8> {
    enable_raw_mode();
    let mut byte = None;
    while byte.is_none() {
        match event::poll(Duration::ZERO) {
            Ok(true) => {
                let event = event::read().expect("failed to read terminal event");
                if let Ok(key) = Key::try_from(event) {
                    byte = Some(match key {
                        Key::Char(ch) => ch as u8,
                        Key::Enter => b'\n',
                    });
                }
            }
            _ => break,
        }
    }
    disable_raw_mode();
    byte
}

/// Read next key from interactive terminal.
///
/// Events are consumed until a key event is read as a valid [`Key`].
///
/// Caller must ensure terminal is in raw mode.
fn read_key() -> Key {
    debug_assert!(
        terminal::is_raw_mode_enabled().is_ok_and(|is| is),
        "terminal must be in raw mode to read key",
    );
    loop {
        let event = event::read().expect("failed to read terminal event");
        if let Ok(key) = event.try_into() {
            break key;
        }
    }
}

impl TryFrom<Event> for Key {
    type Error = ();
    fn try_from(event: Event) -> Result<Self, Self::Error> {
        if let Event::Key(event) = event {
            if let Ok(key) = event.try_into() {
                return Ok(key);
            }
        }
        Err(())
    }
}

impl TryFrom<KeyEvent> for Key {
    type Error = ();
    fn try_from(event: KeyEvent) -> Result<Self, Self::Error> {
        use event::{KeyCode, KeyEventKind, KeyModifiers as Mod};

        if matches!(event.kind, KeyEventKind::Release) {
            return Err(());
        }

        let key = match (event.modifiers, event.code) {
            // Ctrl+C: restore the borrowed terminal state, then exit with a
            // status distinguishable from both HALT and runtime faults
            (Mod::CONTROL, KeyCode::Char('c')) => {
                disable_raw_mode();
                println!();
                std::process::exit(INTERRUPT_STATUS);
            }

            (_, KeyCode::Enter) | (_, KeyCode::Char('\n')) => Key::Enter,

            // Normal character
            (Mod::NONE | Mod::SHIFT, KeyCode::Char(ch)) => Key::Char(ch),

            _ => return Err(()),
        };

        Ok(key)
    }
}
