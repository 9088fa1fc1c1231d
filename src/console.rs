use std::io::{stdin, stdout, IsTerminal, Read, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use crate::term;

/// Input/output collaborator consumed by the traps and the keyboard-mapped
/// registers.
///
/// Reads are unbuffered and unechoed. `poll_input` must not block.
pub trait Console {
    /// Non-blocking check for pending input.
    fn poll_input(&mut self) -> bool;
    /// Blocking read of one input byte.
    fn read_char(&mut self) -> u8;
    fn write_char(&mut self, byte: u8);
    fn flush(&mut self);
}

/// Console backed by the process's terminal.
///
/// Interactive input is read through raw-mode key events; piped input is
/// drained by a reader thread so polls return immediately, with EOF reading
/// as NUL. A byte consumed by a successful poll is held until the next
/// `read_char`.
pub struct TermConsole {
    pending: Option<u8>,
    piped: Option<PipedInput>,
}

impl TermConsole {
    pub fn new() -> Self {
        Self {
            pending: None,
            piped: None,
        }
    }

    fn piped(&mut self) -> &mut PipedInput {
        self.piped.get_or_insert_with(PipedInput::spawn)
    }
}

impl Default for TermConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for TermConsole {
    fn poll_input(&mut self) -> bool {
        if self.pending.is_some() {
            return true;
        }
        self.pending = if stdin().is_terminal() {
            term::poll_byte()
        } else {
            self.piped().poll()
        };
        self.pending.is_some()
    }

    fn read_char(&mut self) -> u8 {
        if let Some(byte) = self.pending.take() {
            return byte;
        }
        if stdin().is_terminal() {
            term::read_byte()
        } else {
            self.piped().read()
        }
    }

    fn write_char(&mut self, byte: u8) {
        // Raw byte, not a `char` encoding
        let _ = stdout().write_all(&[byte]);
    }

    fn flush(&mut self) {
        let _ = stdout().flush();
    }
}

/// Non-terminal input source (a pipe or file on fd 0).
///
/// A plain `read` on a pipe blocks while the pipe is open but empty, so a
/// reader thread drains it into a channel; `try_recv` then makes polling
/// immediate either way.
struct PipedInput {
    rx: Receiver<u8>,
}

impl PipedInput {
    fn spawn() -> Self {
        Self::spawn_from(stdin())
    }

    fn spawn_from<R>(mut reader: R) -> Self
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let _ = thread::spawn(move || {
            let mut buf = [0; 1];
            loop {
                match reader.read(&mut buf) {
                    // EOF hangs up the channel
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(buf[0]).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        Self { rx }
    }

    /// Non-blocking check, consuming the byte if one arrived.
    ///
    /// A source at EOF counts as ready: it reads as NUL without waiting,
    /// like a zero-timeout `select` on a closed pipe.
    fn poll(&mut self) -> Option<u8> {
        match self.rx.try_recv() {
            Ok(byte) => Some(byte),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(0),
        }
    }

    /// Blocking read; EOF reads as NUL.
    fn read(&mut self) -> u8 {
        self.rx.recv().unwrap_or(0)
    }
}

/// Console with scripted input and captured output, for exercising traps and
/// the keyboard-mapped registers without a terminal.
#[cfg(test)]
pub(crate) struct ScriptedConsole {
    input: std::collections::VecDeque<u8>,
    pub(crate) output: Vec<u8>,
    pub(crate) flushes: usize,
}

#[cfg(test)]
impl ScriptedConsole {
    pub(crate) fn new(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            output: Vec::new(),
            flushes: 0,
        }
    }

    pub(crate) fn output_str(&self) -> &str {
        std::str::from_utf8(&self.output).expect("scripted output is ASCII")
    }
}

#[cfg(test)]
impl Console for ScriptedConsole {
    fn poll_input(&mut self) -> bool {
        !self.input.is_empty()
    }

    fn read_char(&mut self) -> u8 {
        self.input.pop_front().unwrap_or(0)
    }

    fn write_char(&mut self, byte: u8) {
        self.output.push(byte);
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}
