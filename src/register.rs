use std::cmp::Ordering;

/// Condition code, recomputed from the result of every register-defining
/// instruction. Exactly one flag holds at any time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flag {
    N = 0b100,
    Z = 0b010,
    P = 0b001,
}

/// 8x 16-bit general registers, the program counter, and the condition code.
pub struct RegisterFile {
    reg: [u16; 8],
    pc: u16,
    flag: Flag,
}

impl RegisterFile {
    /// Default LC-3 entry address.
    pub const PC_START: u16 = 0x3000;

    pub fn new() -> Self {
        Self {
            reg: [0; 8],
            pc: Self::PC_START,
            flag: Flag::Z,
        }
    }

    /// Register indices are taken modulo 8, mirroring the 3-bit operand field.
    #[inline]
    pub fn get(&self, reg: u16) -> u16 {
        self.reg[(reg & 0b111) as usize]
    }

    /// Plain register write; does not touch the condition code.
    #[inline]
    pub fn set(&mut self, reg: u16, val: u16) {
        self.reg[(reg & 0b111) as usize] = val;
    }

    /// Register-defining write: stores `val` and recomputes the condition
    /// code from it, unconditionally.
    #[inline]
    pub fn set_with_flags(&mut self, reg: u16, val: u16) {
        self.set(reg, val);
        self.flag = match (val as i16).cmp(&0) {
            Ordering::Less => Flag::N,
            Ordering::Equal => Flag::Z,
            Ordering::Greater => Flag::P,
        };
    }

    pub fn flag(&self) -> Flag {
        self.flag
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state() {
        let reg = RegisterFile::new();
        for i in 0..8 {
            assert_eq!(reg.get(i), 0);
        }
        assert_eq!(reg.pc(), 0x3000);
        assert_eq!(reg.flag(), Flag::Z);
    }

    #[test]
    fn flag_rule() {
        let mut reg = RegisterFile::new();
        reg.set_with_flags(0, 1);
        assert_eq!(reg.flag(), Flag::P);
        reg.set_with_flags(0, 0x8000);
        assert_eq!(reg.flag(), Flag::N);
        reg.set_with_flags(0, 0);
        assert_eq!(reg.flag(), Flag::Z);
        // Recomputed even when the value is unchanged
        reg.set_with_flags(1, 0x7FFF);
        assert_eq!(reg.flag(), Flag::P);
        reg.set_with_flags(2, 0x7FFF);
        assert_eq!(reg.flag(), Flag::P);
    }

    #[test]
    fn plain_set_keeps_flag() {
        let mut reg = RegisterFile::new();
        reg.set_with_flags(0, 0x8000);
        reg.set(1, 5);
        assert_eq!(reg.flag(), Flag::N);
        assert_eq!(reg.get(1), 5);
    }

    #[test]
    fn index_wraps_modulo_8() {
        let mut reg = RegisterFile::new();
        reg.set(0b1010, 7);
        assert_eq!(reg.get(2), 7);
    }
}
