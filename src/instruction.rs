//! # instruction
//!
//! Every CHIP-8 instruction is two bytes, big-endian. The high nibble of the
//! first byte selects the family and the remaining nibbles are operands:
//!
//! ```text
//!   b0        b1
//!   op  x     y   n
//!       |---- nnn ---|
//!             |- nn -|
//! ```
//!
//! Decoding is kept separate from execution so the interpreter's match is
//! exhaustive and the disassembler shares the same table.
use std::fmt;

/// a register index, 0x0-0xf
pub type Reg = u8;

/// Raw operand fields of one instruction word
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fields {
    pub op: u8,
    pub x: u8,
    pub y: u8,
    pub n: u8,
    pub nn: u8,
    pub nnn: u16,
}

impl From<[u8; 2]> for Fields {
    fn from(bytes: [u8; 2]) -> Self {
        let [b0, b1] = bytes;
        Fields {
            op: b0 >> 4,
            x: b0 & 0xf,
            y: b1 >> 4,
            n: b1 & 0xf,
            nn: b1,
            nnn: ((b0 as u16 & 0xf) << 8) | b1 as u16,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// 00E0
    ClearScreen,
    /// 00EE
    Return,
    /// 1nnn
    Jump(u16),
    /// 2nnn
    Call(u16),
    /// 3xnn
    SkipIfEqualsConstant(Reg, u8),
    /// 4xnn
    SkipIfNotEqualsConstant(Reg, u8),
    /// 5xy0
    SkipIfEquals(Reg, Reg),
    /// 6xnn
    SetConstant(Reg, u8),
    /// 7xnn
    AddConstant(Reg, u8),
    /// 8xy0
    Set(Reg, Reg),
    /// 8xy1
    Or(Reg, Reg),
    /// 8xy2
    And(Reg, Reg),
    /// 8xy3
    Xor(Reg, Reg),
    /// 8xy4
    Add(Reg, Reg),
    /// 8xy5
    Sub(Reg, Reg),
    /// 8xy6
    ShiftRight(Reg, Reg),
    /// 8xy7
    SubN(Reg, Reg),
    /// 8xyE
    ShiftLeft(Reg, Reg),
    /// 9xy0
    SkipIfNotEquals(Reg, Reg),
    /// Annn
    SetIndex(u16),
    /// Bnnn
    JumpWithOffset(u16),
    /// Cxnn
    Random(Reg, u8),
    /// Dxyn
    Draw(Reg, Reg, u8),
    /// Ex9E
    SkipIfKeyDown(Reg),
    /// ExA1
    SkipIfKeyUp(Reg),
    /// Fx07
    GetDelayTimer(Reg),
    /// Fx0A
    WaitForKey(Reg),
    /// Fx15
    SetDelayTimer(Reg),
    /// Fx18
    SetSoundTimer(Reg),
    /// Fx1E
    AddToIndex(Reg),
    /// Fx29
    FontGlyph(Reg),
    /// Fx33
    StoreBcd(Reg),
    /// Fx55
    StoreRegisters(Reg),
    /// Fx65
    LoadRegisters(Reg),
}

/// The word doesn't match any known instruction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnknownInstruction(pub u16);

impl Instruction {
    pub fn decode(bytes: [u8; 2]) -> Result<Instruction, UnknownInstruction> {
        let Fields {
            op,
            x,
            y,
            n,
            nn,
            nnn,
        } = Fields::from(bytes);

        let instruction = match (op, x, y, n) {
            (0x0, 0x0, 0xE, 0x0) => Instruction::ClearScreen,
            (0x0, 0x0, 0xE, 0xE) => Instruction::Return,
            (0x1, _, _, _) => Instruction::Jump(nnn),
            (0x2, _, _, _) => Instruction::Call(nnn),
            (0x3, _, _, _) => Instruction::SkipIfEqualsConstant(x, nn),
            (0x4, _, _, _) => Instruction::SkipIfNotEqualsConstant(x, nn),
            (0x5, _, _, 0x0) => Instruction::SkipIfEquals(x, y),
            (0x6, _, _, _) => Instruction::SetConstant(x, nn),
            (0x7, _, _, _) => Instruction::AddConstant(x, nn),
            (0x8, _, _, 0x0) => Instruction::Set(x, y),
            (0x8, _, _, 0x1) => Instruction::Or(x, y),
            (0x8, _, _, 0x2) => Instruction::And(x, y),
            (0x8, _, _, 0x3) => Instruction::Xor(x, y),
            (0x8, _, _, 0x4) => Instruction::Add(x, y),
            (0x8, _, _, 0x5) => Instruction::Sub(x, y),
            (0x8, _, _, 0x6) => Instruction::ShiftRight(x, y),
            (0x8, _, _, 0x7) => Instruction::SubN(x, y),
            (0x8, _, _, 0xE) => Instruction::ShiftLeft(x, y),
            (0x9, _, _, 0x0) => Instruction::SkipIfNotEquals(x, y),
            (0xA, _, _, _) => Instruction::SetIndex(nnn),
            (0xB, _, _, _) => Instruction::JumpWithOffset(nnn),
            (0xC, _, _, _) => Instruction::Random(x, nn),
            (0xD, _, _, _) => Instruction::Draw(x, y, n),
            (0xE, _, 0x9, 0xE) => Instruction::SkipIfKeyDown(x),
            (0xE, _, 0xA, 0x1) => Instruction::SkipIfKeyUp(x),
            (0xF, _, 0x0, 0x7) => Instruction::GetDelayTimer(x),
            (0xF, _, 0x0, 0xA) => Instruction::WaitForKey(x),
            (0xF, _, 0x1, 0x5) => Instruction::SetDelayTimer(x),
            (0xF, _, 0x1, 0x8) => Instruction::SetSoundTimer(x),
            (0xF, _, 0x1, 0xE) => Instruction::AddToIndex(x),
            (0xF, _, 0x2, 0x9) => Instruction::FontGlyph(x),
            (0xF, _, 0x3, 0x3) => Instruction::StoreBcd(x),
            (0xF, _, 0x5, 0x5) => Instruction::StoreRegisters(x),
            (0xF, _, 0x6, 0x5) => Instruction::LoadRegisters(x),
            _ => return Err(UnknownInstruction(u16::from_be_bytes(bytes))),
        };
        Ok(instruction)
    }
}

/// assembly-ish rendering used by the disassembler and the trace log
impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        match *self {
            ClearScreen => write!(f, "{:<10}", "CLS"),
            Return => write!(f, "{:<10}", "RET"),
            Jump(nnn) => write!(f, "{:<10} {:03x}", "JP", nnn),
            Call(nnn) => write!(f, "{:<10} {:03x}", "CALL", nnn),
            SkipIfEqualsConstant(x, nn) => write!(f, "{:<10} V{:x}, {:02x}", "SE", x, nn),
            SkipIfNotEqualsConstant(x, nn) => write!(f, "{:<10} V{:x}, {:02x}", "SNE", x, nn),
            SkipIfEquals(x, y) => write!(f, "{:<10} V{:x}, V{:x}", "SE", x, y),
            SetConstant(x, nn) => write!(f, "{:<10} V{:x}, {:02x}", "LD", x, nn),
            AddConstant(x, nn) => write!(f, "{:<10} V{:x}, {:02x}", "ADD", x, nn),
            Set(x, y) => write!(f, "{:<10} V{:x}, V{:x}", "LD", x, y),
            Or(x, y) => write!(f, "{:<10} V{:x}, V{:x}", "OR", x, y),
            And(x, y) => write!(f, "{:<10} V{:x}, V{:x}", "AND", x, y),
            Xor(x, y) => write!(f, "{:<10} V{:x}, V{:x}", "XOR", x, y),
            Add(x, y) => write!(f, "{:<10} V{:x}, V{:x}", "ADD", x, y),
            Sub(x, y) => write!(f, "{:<10} V{:x}, V{:x}", "SUB", x, y),
            ShiftRight(x, y) => write!(f, "{:<10} V{:x}, V{:x}", "SHR", x, y),
            SubN(x, y) => write!(f, "{:<10} V{:x}, V{:x}", "SUBN", x, y),
            ShiftLeft(x, y) => write!(f, "{:<10} V{:x}, V{:x}", "SHL", x, y),
            SkipIfNotEquals(x, y) => write!(f, "{:<10} V{:x}, V{:x}", "SNE", x, y),
            SetIndex(nnn) => write!(f, "{:<10} I, {:03x}", "LD", nnn),
            JumpWithOffset(nnn) => write!(f, "{:<10} V0, {:03x}", "JP", nnn),
            Random(x, nn) => write!(f, "{:<10} V{:x}, {:02x}", "RND", x, nn),
            Draw(x, y, n) => write!(f, "{:<10} V{:x}, V{:x}, {:x}", "DRW", x, y, n),
            SkipIfKeyDown(x) => write!(f, "{:<10} V{:x}", "SKP", x),
            SkipIfKeyUp(x) => write!(f, "{:<10} V{:x}", "SKNP", x),
            GetDelayTimer(x) => write!(f, "{:<10} V{:x}, DT", "LD", x),
            WaitForKey(x) => write!(f, "{:<10} V{:x}, K", "LD", x),
            SetDelayTimer(x) => write!(f, "{:<10} DT, V{:x}", "LD", x),
            SetSoundTimer(x) => write!(f, "{:<10} ST, V{:x}", "LD", x),
            AddToIndex(x) => write!(f, "{:<10} I, V{:x}", "ADD", x),
            FontGlyph(x) => write!(f, "{:<10} F, V{:x}", "LD", x),
            StoreBcd(x) => write!(f, "{:<10} B, V{:x}", "LD", x),
            StoreRegisters(x) => write!(f, "{:<10} [I], V{:x}", "LD", x),
            LoadRegisters(x) => write!(f, "{:<10} V{:x}, [I]", "LD", x),
        }
    }
}
