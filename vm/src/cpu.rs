//! Register file and instruction word decoding.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Condition codes, in the bit order of a BR instruction's nzp field.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct Cond: u16 {
        const P = 1 << 0;
        const Z = 1 << 1;
        const N = 1 << 2;
    }
}

impl Cond {
    pub fn of(value: u16) -> Cond {
        if value == 0 {
            Cond::Z
        } else if value >> 15 == 1 {
            Cond::N
        } else {
            Cond::P
        }
    }
}

/// The register set of whichever process is running. Only `pc` and `ptbr`
/// are saved in a PCB.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Registers {
    pub gpr: [u16; 8],
    pub pc: u16,
    pub cond: Cond,
    pub ptbr: u16,
}

impl Registers {
    pub fn get(&self, r: u16) -> u16 {
        self.gpr[(r & 0x7) as usize]
    }

    pub fn set(&mut self, r: u16, value: u16) {
        self.gpr[(r & 0x7) as usize] = value;
    }

    /// Writes `value` to `r` and updates the condition codes from it.
    pub fn set_cc(&mut self, r: u16, value: u16) {
        self.set(r, value);
        self.cond = Cond::of(value);
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Opcode {
    Br,
    Add,
    Ld,
    St,
    Jsr,
    And,
    Ldr,
    Str,
    Rti,
    Not,
    Ldi,
    Sti,
    Jmp,
    Res,
    Lea,
    Trap,
}

const OPCODES: [Opcode; 16] = [
    Opcode::Br,
    Opcode::Add,
    Opcode::Ld,
    Opcode::St,
    Opcode::Jsr,
    Opcode::And,
    Opcode::Ldr,
    Opcode::Str,
    Opcode::Rti,
    Opcode::Not,
    Opcode::Ldi,
    Opcode::Sti,
    Opcode::Jmp,
    Opcode::Res,
    Opcode::Lea,
    Opcode::Trap,
];

pub fn sign_extend(value: u16, bits: u32) -> u16 {
    let shift = 16 - bits;

    (((value << shift) as i16) >> shift) as u16
}

/// One instruction word.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Instruction(pub u16);

impl Instruction {
    pub fn opcode(self) -> Opcode {
        OPCODES[(self.0 >> 12) as usize]
    }

    pub fn dr(self) -> u16 {
        (self.0 >> 9) & 0x7
    }

    pub fn sr1(self) -> u16 {
        (self.0 >> 6) & 0x7
    }

    pub fn sr2(self) -> u16 {
        self.0 & 0x7
    }

    pub fn base_r(self) -> u16 {
        self.sr1()
    }

    pub fn is_immediate(self) -> bool {
        (self.0 >> 5) & 1 == 1
    }

    pub fn imm5(self) -> u16 {
        sign_extend(self.0 & 0x1F, 5)
    }

    pub fn offset6(self) -> u16 {
        sign_extend(self.0 & 0x3F, 6)
    }

    pub fn offset9(self) -> u16 {
        sign_extend(self.0 & 0x1FF, 9)
    }

    pub fn offset11(self) -> u16 {
        sign_extend(self.0 & 0x7FF, 11)
    }

    /// JSR with a PC-relative target rather than JSRR through a register.
    pub fn is_long(self) -> bool {
        (self.0 >> 11) & 1 == 1
    }

    pub fn nzp(self) -> Cond {
        Cond::from_bits_truncate(self.dr())
    }

    pub fn trap_vector(self) -> u16 {
        self.0 & 0xFF
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:#06X})", self.opcode(), self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_extension() {
        assert_eq!(sign_extend(0b01111, 5), 15);
        assert_eq!(sign_extend(0b10000, 5), 0xFFF0);
        assert_eq!(sign_extend(0x1FF, 9), 0xFFFF);
        assert_eq!(sign_extend(0x400, 11), 0xFC00);
    }

    #[test]
    fn field_decoding() {
        // ADD R3, R1, #-2
        let add = Instruction(0b0001_011_001_1_11110);
        assert_eq!(add.opcode(), Opcode::Add);
        assert_eq!((add.dr(), add.sr1()), (3, 1));
        assert!(add.is_immediate());
        assert_eq!(add.imm5(), 0xFFFE);

        // BRnz #-1
        let br = Instruction(0b0000_110_111111111);
        assert_eq!(br.opcode(), Opcode::Br);
        assert_eq!(br.nzp(), Cond::N | Cond::Z);
        assert_eq!(br.offset9(), 0xFFFF);

        let trap = Instruction(0xF025);
        assert_eq!(trap.opcode(), Opcode::Trap);
        assert_eq!(trap.trap_vector(), 0x25);
    }

    #[test]
    fn condition_codes() {
        let mut regs = Registers::default();

        regs.set_cc(2, 0x8000);
        assert_eq!(regs.cond, Cond::N);
        regs.set_cc(2, 0);
        assert_eq!(regs.cond, Cond::Z);
        regs.set_cc(2, 7);
        assert_eq!((regs.cond, regs.get(2)), (Cond::P, 7));
    }
}
