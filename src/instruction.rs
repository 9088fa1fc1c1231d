/// 4-bit instruction tag, extracted from bits [15:12] of a fetched word.
///
/// All 16 architectural values are enumerated, including the two reserved
/// ones ([`Opcode::Rti`] and [`Opcode::Reserved`]), so dispatch is closed:
/// there is no fallthrough case for an "unknown" opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    Br,
    Add,
    Ld,
    St,
    Jsr,
    And,
    Ldr,
    Str,
    /// Return from interrupt. Unused by the architecture subset; faults.
    Rti,
    Not,
    Ldi,
    Sti,
    Jmp,
    /// Reserved encoding 0xD; faults.
    Reserved,
    Lea,
    Trap,
}

impl Opcode {
    pub fn decode(instr: u16) -> Self {
        match instr >> 12 {
            0x0 => Self::Br,
            0x1 => Self::Add,
            0x2 => Self::Ld,
            0x3 => Self::St,
            0x4 => Self::Jsr,
            0x5 => Self::And,
            0x6 => Self::Ldr,
            0x7 => Self::Str,
            0x8 => Self::Rti,
            0x9 => Self::Not,
            0xA => Self::Ldi,
            0xB => Self::Sti,
            0xC => Self::Jmp,
            0xD => Self::Reserved,
            0xE => Self::Lea,
            0xF => Self::Trap,
            // Opcode field is 4 bits
            _ => unreachable!(),
        }
    }
}

/// 8-bit trap selector from the low byte of a TRAP instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrapVect {
    /// Read a character, no echo.
    Getc,
    /// Write the low byte of R0.
    Out,
    /// Write a one-character-per-word string.
    Puts,
    /// Prompt, read a character, echo.
    In,
    /// Write a two-characters-per-word string.
    Putsp,
    /// Terminate the run loop.
    Halt,
}

impl TrapVect {
    pub fn decode(instr: u16) -> Option<Self> {
        let vect = match instr & 0xFF {
            0x20 => Self::Getc,
            0x21 => Self::Out,
            0x22 => Self::Puts,
            0x23 => Self::In,
            0x24 => Self::Putsp,
            0x25 => Self::Halt,
            _ => return None,
        };
        Some(vect)
    }
}

/// Sign-extend the low `bits` bits of `val` to 16 bits.
#[inline]
pub fn sign_extend(val: u16, bits: u32) -> u16 {
    debug_assert!(bits > 0 && bits < 16);
    // Sign bit
    let sign = val & (1u16 << (bits - 1));
    // Bits lower than sign bit
    let magnitude = val & ((1u16 << bits) - 1);
    // Positive input: all bits unset; 0x0000
    // Negative input: sign bit and above will be set, lower bits will be reset
    //      Eg. bits=14 -> 0xE000
    let sign_extension = (!sign).wrapping_add(1); // sign * -1
    magnitude | sign_extension
}
