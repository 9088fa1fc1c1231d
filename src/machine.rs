use crate::console::Console;
use crate::error::RuntimeError;
use crate::image::Image;
use crate::instruction::{sign_extend, Opcode, TrapVect};
use crate::memory::Memory;
use crate::register::RegisterFile;

/// Run-loop state. The HALT trap is the only transition to `Halted`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Running,
    Halted,
}

/// A complete LC-3 machine: memory, register file, and the console it
/// performs I/O through.
///
/// Machines own their storage outright, so any number can run side by side
/// without aliasing.
pub struct Machine<C: Console> {
    mem: Memory,
    reg: RegisterFile,
    console: C,
    state: State,
}

impl<C: Console> Machine<C> {
    pub fn new(console: C) -> Self {
        Self {
            mem: Memory::new(),
            reg: RegisterFile::new(),
            console,
            state: State::Running,
        }
    }

    /// Place an image at its own origin. Later images overwrite earlier
    /// ones where they overlap.
    pub fn load_image(&mut self, image: &Image) {
        self.mem.load(image.origin(), image.words());
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Fetch, decode, and execute instructions until HALT or a fault.
    ///
    /// A program that never halts runs forever, as it would on hardware.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        while self.state == State::Running {
            self.step()?;
        }
        Ok(())
    }

    /// Execute a single instruction.
    ///
    /// PC is incremented as part of the fetch; PC-relative operands are
    /// based on the incremented value.
    pub fn step(&mut self) -> Result<(), RuntimeError> {
        let fetch_addr = self.reg.pc();
        let instr = self.mem.read(fetch_addr, &mut self.console);
        self.reg.set_pc(fetch_addr.wrapping_add(1));

        match Opcode::decode(instr) {
            Opcode::Add => self.add(instr),
            Opcode::And => self.and(instr),
            Opcode::Not => self.not(instr),
            Opcode::Br => self.br(instr),
            Opcode::Jmp => self.jmp(instr),
            Opcode::Jsr => self.jsr(instr),
            Opcode::Ld => self.ld(instr),
            Opcode::Ldi => self.ldi(instr),
            Opcode::Ldr => self.ldr(instr),
            Opcode::Lea => self.lea(instr),
            Opcode::St => self.st(instr),
            Opcode::Sti => self.sti(instr),
            Opcode::Str => self.str(instr),
            Opcode::Trap => self.trap(instr)?,
            // Undefined behavior in the encoding; abort, don't recover
            Opcode::Rti | Opcode::Reserved => {
                return Err(RuntimeError::ReservedOpcode {
                    opcode: (instr >> 12) as u8,
                    addr: fetch_addr,
                })
            }
        }
        Ok(())
    }

    fn read_mem(&mut self, addr: u16) -> u16 {
        self.mem.read(addr, &mut self.console)
    }

    fn add(&mut self, instr: u16) {
        let dr = (instr >> 9) & 0b111;
        let sr = (instr >> 6) & 0b111;

        let val1 = self.reg.get(sr);
        // Check if imm
        let val2 = if instr & 0b10_0000 == 0 {
            self.reg.get(instr & 0b111)
        } else {
            sign_extend(instr, 5)
        };
        self.reg.set_with_flags(dr, val1.wrapping_add(val2));
    }

    fn and(&mut self, instr: u16) {
        let dr = (instr >> 9) & 0b111;
        let sr = (instr >> 6) & 0b111;

        let val1 = self.reg.get(sr);
        // Check if imm
        let val2 = if instr & 0b10_0000 == 0 {
            self.reg.get(instr & 0b111)
        } else {
            sign_extend(instr, 5)
        };
        self.reg.set_with_flags(dr, val1 & val2);
    }

    fn not(&mut self, instr: u16) {
        let dr = (instr >> 9) & 0b111;
        let sr = (instr >> 6) & 0b111;
        let val = !self.reg.get(sr);
        self.reg.set_with_flags(dr, val);
    }

    fn br(&mut self, instr: u16) {
        let nzp = (instr >> 9) & 0b111;
        if self.reg.flag() as u16 & nzp != 0 {
            let pc = self.reg.pc().wrapping_add(sign_extend(instr, 9));
            self.reg.set_pc(pc);
        }
    }

    fn jmp(&mut self, instr: u16) {
        // RET is JMP through R7
        let base = (instr >> 6) & 0b111;
        self.reg.set_pc(self.reg.get(base));
    }

    fn jsr(&mut self, instr: u16) {
        self.reg.set(7, self.reg.pc());
        if instr & 0x800 == 0 {
            // reg
            let base = (instr >> 6) & 0b111;
            self.reg.set_pc(self.reg.get(base));
        } else {
            // offs
            let pc = self.reg.pc().wrapping_add(sign_extend(instr, 11));
            self.reg.set_pc(pc);
        }
    }

    fn ld(&mut self, instr: u16) {
        let dr = (instr >> 9) & 0b111;
        let addr = self.reg.pc().wrapping_add(sign_extend(instr, 9));
        let val = self.read_mem(addr);
        self.reg.set_with_flags(dr, val);
    }

    fn ldi(&mut self, instr: u16) {
        let dr = (instr >> 9) & 0b111;
        let ptr_addr = self.reg.pc().wrapping_add(sign_extend(instr, 9));
        let ptr = self.read_mem(ptr_addr);
        let val = self.read_mem(ptr);
        self.reg.set_with_flags(dr, val);
    }

    fn ldr(&mut self, instr: u16) {
        let dr = (instr >> 9) & 0b111;
        let base = (instr >> 6) & 0b111;
        let addr = self.reg.get(base).wrapping_add(sign_extend(instr, 6));
        let val = self.read_mem(addr);
        self.reg.set_with_flags(dr, val);
    }

    fn lea(&mut self, instr: u16) {
        let dr = (instr >> 9) & 0b111;
        // Computes an address, does not dereference it
        let val = self.reg.pc().wrapping_add(sign_extend(instr, 9));
        self.reg.set_with_flags(dr, val);
    }

    fn st(&mut self, instr: u16) {
        let sr = (instr >> 9) & 0b111;
        let addr = self.reg.pc().wrapping_add(sign_extend(instr, 9));
        self.mem.write(addr, self.reg.get(sr));
    }

    fn sti(&mut self, instr: u16) {
        let sr = (instr >> 9) & 0b111;
        let ptr_addr = self.reg.pc().wrapping_add(sign_extend(instr, 9));
        let ptr = self.read_mem(ptr_addr);
        self.mem.write(ptr, self.reg.get(sr));
    }

    fn str(&mut self, instr: u16) {
        let sr = (instr >> 9) & 0b111;
        let base = (instr >> 6) & 0b111;
        let addr = self.reg.get(base).wrapping_add(sign_extend(instr, 6));
        self.mem.write(addr, self.reg.get(sr));
    }

    fn trap(&mut self, instr: u16) -> Result<(), RuntimeError> {
        self.reg.set(7, self.reg.pc());

        let Some(vect) = TrapVect::decode(instr) else {
            return Err(RuntimeError::UnknownTrap {
                vect: (instr & 0xFF) as u8,
                addr: self.reg.pc().wrapping_sub(1),
            });
        };

        match vect {
            TrapVect::Getc => {
                let ch = self.console.read_char();
                self.reg.set_with_flags(0, ch as u16);
            }
            TrapVect::Out => {
                let ch = (self.reg.get(0) & 0xFF) as u8;
                self.console.write_char(ch);
                self.console.flush();
            }
            TrapVect::Puts => {
                let mut addr = self.reg.get(0);
                loop {
                    let word = self.read_mem(addr);
                    if word == 0 {
                        break;
                    }
                    self.console.write_char((word & 0xFF) as u8);
                    addr = addr.wrapping_add(1);
                }
                self.console.flush();
            }
            TrapVect::In => {
                self.write_str("Input a character: ");
                let ch = self.console.read_char();
                self.console.write_char(ch);
                self.console.flush();
                self.reg.set_with_flags(0, ch as u16);
            }
            TrapVect::Putsp => {
                let mut addr = self.reg.get(0);
                loop {
                    let word = self.read_mem(addr);
                    if word == 0 {
                        break;
                    }
                    // Low byte first; high byte only when non-zero
                    self.console.write_char((word & 0xFF) as u8);
                    let high = (word >> 8) as u8;
                    if high != 0 {
                        self.console.write_char(high);
                    }
                    addr = addr.wrapping_add(1);
                }
                self.console.flush();
            }
            TrapVect::Halt => {
                self.write_str("\nHALT\n");
                self.console.flush();
                self.state = State::Halted;
            }
        }
        Ok(())
    }

    fn write_str(&mut self, string: &str) {
        for byte in string.bytes() {
            self.console.write_char(byte);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::ScriptedConsole;
    use crate::register::Flag;

    /// Machine with `words` placed and PC set at the default entry address.
    fn machine_with(words: &[u16]) -> Machine<ScriptedConsole> {
        machine_with_input(words, b"")
    }

    fn machine_with_input(words: &[u16], input: &[u8]) -> Machine<ScriptedConsole> {
        let mut machine = Machine::new(ScriptedConsole::new(input));
        machine.mem.load(0x3000, words);
        machine
    }

    #[test]
    fn add_immediate() {
        // ADD R0, R1, #3
        let mut machine = machine_with(&[0x1000 | (1 << 6) | 0b10_0000 | 3]);
        machine.reg.set(1, 5);
        machine.step().unwrap();
        assert_eq!(machine.reg.get(0), 8);
        assert_eq!(machine.reg.flag(), Flag::P);
    }

    #[test]
    fn add_register() {
        // ADD R2, R0, R1
        let mut machine = machine_with(&[0x1000 | (2 << 9) | (0 << 6) | 1]);
        machine.reg.set(0, 10);
        machine.reg.set(1, 20);
        machine.step().unwrap();
        assert_eq!(machine.reg.get(2), 30);
    }

    #[test]
    fn add_negative_immediate() {
        // ADD R0, R1, #-1 (imm5 = 0x1F)
        let mut machine = machine_with(&[0x1000 | (1 << 6) | 0b10_0000 | 0x1F]);
        machine.reg.set(1, 5);
        machine.step().unwrap();
        assert_eq!(machine.reg.get(0), 4);
    }

    #[test]
    fn add_overflow_wraps() {
        // ADD R0, R1, #1
        let mut machine = machine_with(&[0x1000 | (1 << 6) | 0b10_0000 | 1]);
        machine.reg.set(1, 0xFFFF);
        machine.step().unwrap();
        assert_eq!(machine.reg.get(0), 0);
        assert_eq!(machine.reg.flag(), Flag::Z);
    }

    #[test]
    fn and_immediate_clears() {
        // AND R0, R0, #0
        let mut machine = machine_with(&[0x5000 | 0b10_0000]);
        machine.reg.set(0, 0xBEEF);
        machine.step().unwrap();
        assert_eq!(machine.reg.get(0), 0);
        assert_eq!(machine.reg.flag(), Flag::Z);
    }

    #[test]
    fn not_complements() {
        // NOT R0, R1
        let mut machine = machine_with(&[0x9000 | (1 << 6) | 0b11_1111]);
        machine.reg.set(1, 0x00FF);
        machine.step().unwrap();
        assert_eq!(machine.reg.get(0), 0xFF00);
        assert_eq!(machine.reg.flag(), Flag::N);
    }

    #[test]
    fn br_not_taken() {
        // Flag is Z after init; BRp +5
        let mut machine = machine_with(&[(0b001 << 9) | 5]);
        machine.step().unwrap();
        assert_eq!(machine.reg.pc(), 0x3001);
    }

    #[test]
    fn br_taken() {
        // BRz +5
        let mut machine = machine_with(&[(0b010 << 9) | 5]);
        machine.step().unwrap();
        assert_eq!(machine.reg.pc(), 0x3006);
    }

    #[test]
    fn br_backwards() {
        // BRnzp #-2 (offset9 = 0x1FE)
        let mut machine = machine_with(&[(0b111 << 9) | 0x1FE]);
        machine.step().unwrap();
        assert_eq!(machine.reg.pc(), 0x2FFF);
    }

    #[test]
    fn jmp_and_ret() {
        // JMP R3
        let mut machine = machine_with(&[0xC000 | (3 << 6)]);
        machine.reg.set(3, 0x4000);
        machine.step().unwrap();
        assert_eq!(machine.reg.pc(), 0x4000);
    }

    #[test]
    fn jsr_long_call_saves_return() {
        // JSR +0x10
        let mut machine = machine_with(&[0x4800 | 0x10]);
        machine.step().unwrap();
        assert_eq!(machine.reg.get(7), 0x3001);
        assert_eq!(machine.reg.pc(), 0x3011);
    }

    #[test]
    fn jsrr_jumps_through_base() {
        // JSRR R2
        let mut machine = machine_with(&[0x4000 | (2 << 6)]);
        machine.reg.set(2, 0x5000);
        machine.step().unwrap();
        assert_eq!(machine.reg.get(7), 0x3001);
        assert_eq!(machine.reg.pc(), 0x5000);
    }

    #[test]
    fn ld_is_pc_relative() {
        // LD R0, +1: effective address is 0x3001 + 1
        let mut machine = machine_with(&[0x2000 | 1, 0, 0xABCD]);
        machine.step().unwrap();
        assert_eq!(machine.reg.get(0), 0xABCD);
        assert_eq!(machine.reg.flag(), Flag::N);
    }

    #[test]
    fn ldi_round_trip() {
        // Value at A, pointer to A at B, LDI through B
        let mut machine = machine_with(&[0xA000 | 1, 0, 0x4000]);
        machine.mem.write(0x4000, 0x1234);
        machine.step().unwrap();
        assert_eq!(machine.reg.get(0), 0x1234);
    }

    #[test]
    fn ldr_base_plus_offset() {
        // LDR R0, R1, #2
        let mut machine = machine_with(&[0x6000 | (1 << 6) | 2]);
        machine.reg.set(1, 0x4000);
        machine.mem.write(0x4002, 77);
        machine.step().unwrap();
        assert_eq!(machine.reg.get(0), 77);
    }

    #[test]
    fn lea_does_not_dereference() {
        // LEA R0, #-3
        let mut machine = machine_with(&[0xE000 | 0x1FD]);
        machine.step().unwrap();
        assert_eq!(machine.reg.get(0), 0x2FFE);
        assert_eq!(machine.reg.flag(), Flag::P);
    }

    #[test]
    fn st_sti_str() {
        let mut machine = machine_with(&[
            0x3000 | 2,            // ST R0, +2
            0xB000 | 2,            // STI R0, +2 (pointer at 0x3004)
            0x7000 | (1 << 6) | 1, // STR R0, R1, #1
            0x0000,
            0x5000, // pointer for STI
        ]);
        machine.reg.set(0, 0xCAFE);
        machine.reg.set(1, 0x6000);
        machine.step().unwrap();
        machine.step().unwrap();
        machine.step().unwrap();
        let mut console = ScriptedConsole::new(b"");
        assert_eq!(machine.mem.read(0x3003, &mut console), 0xCAFE);
        assert_eq!(machine.mem.read(0x5000, &mut console), 0xCAFE);
        assert_eq!(machine.mem.read(0x6001, &mut console), 0xCAFE);
        // Stores never touch the condition code
        assert_eq!(machine.reg.flag(), Flag::Z);
    }

    #[test]
    fn getc_stores_and_sets_flags() {
        let mut machine = machine_with_input(&[0xF020], b"A");
        machine.step().unwrap();
        assert_eq!(machine.reg.get(0), b'A' as u16);
        assert_eq!(machine.reg.flag(), Flag::P);
        // No echo
        assert!(machine.console.output.is_empty());
    }

    #[test]
    fn out_writes_low_byte() {
        let mut machine = machine_with(&[0xF021]);
        machine.reg.set(0, 0x1F41); // High byte must be dropped
        machine.step().unwrap();
        assert_eq!(machine.console.output_str(), "A");
        assert_eq!(machine.console.flushes, 1);
    }

    #[test]
    fn in_prompts_and_echoes() {
        let mut machine = machine_with_input(&[0xF023], b"q");
        machine.step().unwrap();
        assert_eq!(machine.console.output_str(), "Input a character: q");
        assert_eq!(machine.reg.get(0), b'q' as u16);
        assert_eq!(machine.reg.flag(), Flag::P);
    }

    #[test]
    fn puts_stops_at_zero_word() {
        let mut machine = machine_with(&[0xF022]);
        machine.mem.load(0x4000, &[b'H' as u16, b'i' as u16, 0, b'!' as u16]);
        machine.reg.set(0, 0x4000);
        machine.step().unwrap();
        assert_eq!(machine.console.output_str(), "Hi");
    }

    #[test]
    fn putsp_packs_two_chars_per_word() {
        let mut machine = machine_with(&[0xF024]);
        // "ab" packed, then "c" alone (high byte zero), then terminator
        machine
            .mem
            .load(0x4000, &[u16::from_le_bytes([b'a', b'b']), b'c' as u16, 0]);
        machine.reg.set(0, 0x4000);
        machine.step().unwrap();
        assert_eq!(machine.console.output_str(), "abc");
    }

    #[test]
    fn trap_saves_return_address() {
        let mut machine = machine_with(&[0xF021]);
        machine.step().unwrap();
        assert_eq!(machine.reg.get(7), 0x3001);
    }

    #[test]
    fn halt_terminates_run() {
        // ADD R0, R0, #1 then HALT
        let mut machine = machine_with(&[0x1000 | 0b10_0000 | 1, 0xF025]);
        machine.run().unwrap();
        assert_eq!(machine.state(), State::Halted);
        assert_eq!(machine.reg.get(0), 1);
        assert!(machine.console.output_str().contains("HALT"));
    }

    #[test]
    fn reserved_opcodes_fault() {
        let mut machine = machine_with(&[0xD000]);
        match machine.run() {
            Err(RuntimeError::ReservedOpcode { opcode, addr }) => {
                assert_eq!(opcode, 0xD);
                assert_eq!(addr, 0x3000);
            }
            other => panic!("expected reserved-opcode fault, got {other:?}"),
        }

        let mut machine = machine_with(&[0x8000]);
        assert!(matches!(
            machine.run(),
            Err(RuntimeError::ReservedOpcode { opcode: 0x8, .. })
        ));
    }

    #[test]
    fn unknown_trap_vector_faults() {
        let mut machine = machine_with(&[0xF026]);
        assert!(matches!(
            machine.run(),
            Err(RuntimeError::UnknownTrap { vect: 0x26, addr: 0x3000 })
        ));
    }

    #[test]
    fn keyboard_polling_program() {
        // Busy-wait on KBSR, load KBDR, halt
        let mut machine = machine_with_input(
            &[
                0xA000 | 3, // LDI R0, KBSR pointer
                (0b011 << 9) | 0x1FE, // BRzp #-2 (ready bit makes the status negative)
                0xA000 | 2, // LDI R0, KBDR pointer
                0xF025,     // HALT
                crate::memory::KBSR,
                crate::memory::KBDR,
            ],
            b"k",
        );
        machine.run().unwrap();
        assert_eq!(machine.reg.get(0), b'k' as u16);
    }

    #[test]
    fn machines_are_independent() {
        let mut a = machine_with(&[0xF025]);
        let mut b = machine_with(&[0xF025]);
        a.mem.write(0x2000, 9);
        let mut console = ScriptedConsole::new(b"");
        assert_eq!(a.mem.read(0x2000, &mut console), 9);
        assert_eq!(b.mem.read(0x2000, &mut console), 0);
    }
}
