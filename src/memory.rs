use crate::console::Console;

/// LC3 can address 128KB of memory.
pub const MEMORY_MAX: usize = 0x10000;

/// Keyboard status register: bit 15 is set while a key is pending.
pub const KBSR: u16 = 0xFE00;
/// Keyboard data register: filled by a status read that found a key.
pub const KBDR: u16 = 0xFE02;

/// Flat addressable storage with the keyboard device mapped into it.
///
/// Addresses always fit the array (`u16` indices), so no access can be out
/// of bounds; effective-address arithmetic wraps modulo the address space.
pub struct Memory {
    cells: Box<[u16; MEMORY_MAX]>,
}

impl Memory {
    pub fn new() -> Self {
        Self {
            cells: Box::new([0; MEMORY_MAX]),
        }
    }

    /// Read one word.
    ///
    /// Reading [`KBSR`] first polls the console: a pending key sets bit 15
    /// of the status cell and lands in [`KBDR`]; otherwise the status cell
    /// is cleared. The poll is a side effect of reading, never of writing.
    pub fn read<C: Console>(&mut self, addr: u16, console: &mut C) -> u16 {
        if addr == KBSR {
            if console.poll_input() {
                self.cells[KBSR as usize] = 1 << 15;
                self.cells[KBDR as usize] = console.read_char() as u16;
            } else {
                self.cells[KBSR as usize] = 0;
            }
        }
        self.cells[addr as usize]
    }

    /// Unconditional store.
    pub fn write(&mut self, addr: u16, val: u16) {
        self.cells[addr as usize] = val;
    }

    /// Place `words` contiguously from `origin`, truncating at the end of
    /// the address space.
    pub fn load(&mut self, origin: u16, words: &[u16]) {
        let origin = origin as usize;
        let len = words.len().min(MEMORY_MAX - origin);
        self.cells[origin..origin + len].copy_from_slice(&words[..len]);
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}
