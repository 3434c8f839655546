use std::fmt;

/// A raw two-byte instruction word, fetched big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode(pub u16);

impl Opcode {
    pub fn from_bytes(hi: u8, lo: u8) -> Self {
        Opcode(u16::from_be_bytes([hi, lo]))
    }

    /// High nibble, selects the instruction family.
    pub fn class(self) -> u8 {
        (self.0 >> 12) as u8
    }

    pub fn x(self) -> u8 {
        ((self.0 >> 8) & 0x0F) as u8
    }

    pub fn y(self) -> u8 {
        ((self.0 >> 4) & 0x0F) as u8
    }

    pub fn n(self) -> u8 {
        (self.0 & 0x0F) as u8
    }

    pub fn nn(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    pub fn nnn(self) -> u16 {
        self.0 & 0x0FFF
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

/// A decoded instruction.
///
/// Register operands are indexes `0..16`; `addr` operands are 12-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// 00E0
    Clear,
    /// 00EE
    Return,
    /// 1NNN
    Jump { addr: u16 },
    /// 2NNN
    Call { addr: u16 },
    /// 3XNN
    SkipEqImm { x: u8, nn: u8 },
    /// 4XNN
    SkipNeImm { x: u8, nn: u8 },
    /// 5XY0
    SkipEqReg { x: u8, y: u8 },
    /// 6XNN
    LoadImm { x: u8, nn: u8 },
    /// 7XNN
    AddImm { x: u8, nn: u8 },
    /// 8XY0
    Copy { x: u8, y: u8 },
    /// 8XY1
    Or { x: u8, y: u8 },
    /// 8XY2
    And { x: u8, y: u8 },
    /// 8XY3
    Xor { x: u8, y: u8 },
    /// 8XY4
    AddReg { x: u8, y: u8 },
    /// 8XY5
    SubReg { x: u8, y: u8 },
    /// 8XY6
    ShiftRight { x: u8, y: u8 },
    /// 8XY7
    SubNeg { x: u8, y: u8 },
    /// 8XYE
    ShiftLeft { x: u8, y: u8 },
    /// 9XY0
    SkipNeReg { x: u8, y: u8 },
    /// ANNN
    LoadIndex { addr: u16 },
    /// BNNN
    JumpOffset { addr: u16 },
    /// CXNN
    Random { x: u8, nn: u8 },
    /// DXYN
    Draw { x: u8, y: u8, n: u8 },
    /// EX9E
    SkipKey { x: u8 },
    /// EXA1
    SkipNotKey { x: u8 },
    /// FX07
    LoadDelay { x: u8 },
    /// FX0A
    WaitKey { x: u8 },
    /// FX15
    SetDelay { x: u8 },
    /// FX18
    SetSound { x: u8 },
    /// FX1E
    AddIndex { x: u8 },
    /// FX29
    LoadGlyph { x: u8 },
    /// FX33
    StoreBcd { x: u8 },
    /// FX55
    StoreRegs { x: u8 },
    /// FX65
    LoadRegs { x: u8 },
}

impl Instruction {
    /// Decodes an opcode, or returns `None` when the word isn't an instruction.
    pub fn decode(op: Opcode) -> Option<Self> {
        use Instruction::*;

        let (x, y, n, nn, addr) = (op.x(), op.y(), op.n(), op.nn(), op.nnn());
        let instr = match op.class() {
            0x0 => match op.0 {
                0x00E0 => Clear,
                0x00EE => Return,
                _ => return None,
            },
            0x1 => Jump { addr },
            0x2 => Call { addr },
            0x3 => SkipEqImm { x, nn },
            0x4 => SkipNeImm { x, nn },
            0x5 => SkipEqReg { x, y },
            0x6 => LoadImm { x, nn },
            0x7 => AddImm { x, nn },
            0x8 => match n {
                0x0 => Copy { x, y },
                0x1 => Or { x, y },
                0x2 => And { x, y },
                0x3 => Xor { x, y },
                0x4 => AddReg { x, y },
                0x5 => SubReg { x, y },
                0x6 => ShiftRight { x, y },
                0x7 => SubNeg { x, y },
                0xE => ShiftLeft { x, y },
                _ => return None,
            },
            0x9 => SkipNeReg { x, y },
            0xA => LoadIndex { addr },
            0xB => JumpOffset { addr },
            0xC => Random { x, nn },
            0xD => Draw { x, y, n },
            0xE => match nn {
                0x9E => SkipKey { x },
                0xA1 => SkipNotKey { x },
                _ => return None,
            },
            0xF => match nn {
                0x07 => LoadDelay { x },
                0x0A => WaitKey { x },
                0x15 => SetDelay { x },
                0x18 => SetSound { x },
                0x1E => AddIndex { x },
                0x29 => LoadGlyph { x },
                0x33 => StoreBcd { x },
                0x55 => StoreRegs { x },
                0x65 => LoadRegs { x },
                _ => return None,
            },
            _ => unreachable!("opcode class is a nibble"),
        };
        Some(instr)
    }

    /// True for instructions that set `pc` themselves instead of falling through.
    pub fn transfers_control(&self) -> bool {
        use Instruction::*;

        matches!(self, Return | Jump { .. } | Call { .. } | JumpOffset { .. })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;

        match *self {
            Clear => write!(f, "CLS"),
            Return => write!(f, "RET"),
            Jump { addr } => write!(f, "JP {addr:#05X}"),
            Call { addr } => write!(f, "CALL {addr:#05X}"),
            SkipEqImm { x, nn } => write!(f, "SE V{x:X}, {nn:#04X}"),
            SkipNeImm { x, nn } => write!(f, "SNE V{x:X}, {nn:#04X}"),
            SkipEqReg { x, y } => write!(f, "SE V{x:X}, V{y:X}"),
            LoadImm { x, nn } => write!(f, "LD V{x:X}, {nn:#04X}"),
            AddImm { x, nn } => write!(f, "ADD V{x:X}, {nn:#04X}"),
            Copy { x, y } => write!(f, "LD V{x:X}, V{y:X}"),
            Or { x, y } => write!(f, "OR V{x:X}, V{y:X}"),
            And { x, y } => write!(f, "AND V{x:X}, V{y:X}"),
            Xor { x, y } => write!(f, "XOR V{x:X}, V{y:X}"),
            AddReg { x, y } => write!(f, "ADD V{x:X}, V{y:X}"),
            SubReg { x, y } => write!(f, "SUB V{x:X}, V{y:X}"),
            ShiftRight { x, y } => write!(f, "SHR V{x:X}, V{y:X}"),
            SubNeg { x, y } => write!(f, "SUBN V{x:X}, V{y:X}"),
            ShiftLeft { x, y } => write!(f, "SHL V{x:X}, V{y:X}"),
            SkipNeReg { x, y } => write!(f, "SNE V{x:X}, V{y:X}"),
            LoadIndex { addr } => write!(f, "LD I, {addr:#05X}"),
            JumpOffset { addr } => write!(f, "JP V0, {addr:#05X}"),
            Random { x, nn } => write!(f, "RND V{x:X}, {nn:#04X}"),
            Draw { x, y, n } => write!(f, "DRW V{x:X}, V{y:X}, {n}"),
            SkipKey { x } => write!(f, "SKP V{x:X}"),
            SkipNotKey { x } => write!(f, "SKNP V{x:X}"),
            LoadDelay { x } => write!(f, "LD V{x:X}, DT"),
            WaitKey { x } => write!(f, "LD V{x:X}, K"),
            SetDelay { x } => write!(f, "LD DT, V{x:X}"),
            SetSound { x } => write!(f, "LD ST, V{x:X}"),
            AddIndex { x } => write!(f, "ADD I, V{x:X}"),
            LoadGlyph { x } => write!(f, "LD F, V{x:X}"),
            StoreBcd { x } => write!(f, "LD B, V{x:X}"),
            StoreRegs { x } => write!(f, "LD [I], V{x:X}"),
            LoadRegs { x } => write!(f, "LD V{x:X}, [I]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(word: u16) -> Option<Instruction> {
        Instruction::decode(Opcode(word))
    }

    #[test]
    fn opcode_fields_are_extracted() {
        let op = Opcode::from_bytes(0xD1, 0x2F);
        assert_eq!(op.0, 0xD12F);
        assert_eq!(op.class(), 0xD);
        assert_eq!(op.x(), 0x1);
        assert_eq!(op.y(), 0x2);
        assert_eq!(op.n(), 0xF);
        assert_eq!(op.nn(), 0x2F);
        assert_eq!(op.nnn(), 0x12F);
    }

    #[test]
    fn decodes_system_forms() {
        assert_eq!(decode(0x00E0), Some(Instruction::Clear));
        assert_eq!(decode(0x00EE), Some(Instruction::Return));
        assert_eq!(decode(0x0123), None);
        assert_eq!(decode(0x0000), None);
    }

    #[test]
    fn decodes_address_forms() {
        assert_eq!(decode(0x1ABC), Some(Instruction::Jump { addr: 0xABC }));
        assert_eq!(decode(0x2ABC), Some(Instruction::Call { addr: 0xABC }));
        assert_eq!(decode(0xAFFF), Some(Instruction::LoadIndex { addr: 0xFFF }));
        assert_eq!(decode(0xB200), Some(Instruction::JumpOffset { addr: 0x200 }));
    }

    #[test]
    fn decodes_alu_family() {
        assert_eq!(decode(0x8120), Some(Instruction::Copy { x: 1, y: 2 }));
        assert_eq!(decode(0x8124), Some(Instruction::AddReg { x: 1, y: 2 }));
        assert_eq!(decode(0x8127), Some(Instruction::SubNeg { x: 1, y: 2 }));
        assert_eq!(decode(0x812E), Some(Instruction::ShiftLeft { x: 1, y: 2 }));
        for bad in [0x8, 0x9, 0xA, 0xB, 0xC, 0xD, 0xF] {
            assert_eq!(decode(0x8120 | bad), None, "8XY{bad:X} should not decode");
        }
    }

    #[test]
    fn decodes_key_and_misc_families() {
        assert_eq!(decode(0xE39E), Some(Instruction::SkipKey { x: 3 }));
        assert_eq!(decode(0xE3A1), Some(Instruction::SkipNotKey { x: 3 }));
        assert_eq!(decode(0xE3A2), None);
        assert_eq!(decode(0xF40A), Some(Instruction::WaitKey { x: 4 }));
        assert_eq!(decode(0xF433), Some(Instruction::StoreBcd { x: 4 }));
        assert_eq!(decode(0xFF55), Some(Instruction::StoreRegs { x: 0xF }));
        assert_eq!(decode(0xF065), Some(Instruction::LoadRegs { x: 0 }));
        assert_eq!(decode(0xF0FF), None);
    }

    #[test]
    fn register_skips_ignore_low_nibble() {
        assert_eq!(decode(0x5AB3), Some(Instruction::SkipEqReg { x: 0xA, y: 0xB }));
        assert_eq!(decode(0x9AB7), Some(Instruction::SkipNeReg { x: 0xA, y: 0xB }));
    }

    #[test]
    fn only_jumps_calls_and_returns_transfer_control() {
        for word in [0x00EE, 0x1200, 0x2200, 0xB200] {
            assert!(decode(word).unwrap().transfers_control(), "{word:04X}");
        }
        // skips fall through too, just further
        for word in [0x00E0, 0x3000, 0x9010, 0x6001, 0xD015, 0xF00A] {
            assert!(!decode(word).unwrap().transfers_control(), "{word:04X}");
        }
    }

    #[test]
    fn disassembles_to_mnemonics() {
        let lines: Vec<String> = [0x00E0, 0x2208, 0x6AFF, 0x8AB4, 0xDAB5, 0xF20A, 0xF155]
            .into_iter()
            .map(|w| decode(w).unwrap().to_string())
            .collect();
        assert_eq!(lines, vec![
            "CLS",
            "CALL 0x208",
            "LD VA, 0xFF",
            "ADD VA, VB",
            "DRW VA, VB, 5",
            "LD V2, K",
            "LD [I], V1",
        ]);
    }
}
