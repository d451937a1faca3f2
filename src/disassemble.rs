use crate::instruction::{Instruction, UnknownInstruction};
use crate::memory::PROGRAM_ADDR;
use std::io;

/// write one line per instruction word of `program`, as loaded at 0x200:
/// `aaaa b0 b1 MNEMONIC  operands`
///
/// Data mixed in with code gets decoded too; anything that isn't an
/// instruction shows as UNKNOWN. Machine-code calls are listed as SYS even
/// though the interpreter refuses to run them.
pub fn disassemble(program: &[u8], out: &mut impl io::Write) -> Result<(), io::Error> {
    for (n, word) in program.chunks(2).enumerate() {
        let addr = PROGRAM_ADDR as usize + 2 * n;
        // odd-length programs get a zero pad byte
        let bytes = [word[0], word.get(1).copied().unwrap_or(0)];
        match Instruction::decode(bytes) {
            Ok(instruction) => writeln!(
                out,
                "{:04x} {:02x} {:02x} {}",
                addr, bytes[0], bytes[1], instruction
            )?,
            Err(UnknownInstruction(word)) if word & 0xf000 == 0 => writeln!(
                out,
                "{:04x} {:02x} {:02x} {:<10} {:03x}",
                addr,
                bytes[0],
                bytes[1],
                "SYS",
                word & 0x0fff
            )?,
            Err(_) => writeln!(out, "{:04x} {:02x} {:02x} UNKNOWN", addr, bytes[0], bytes[1])?,
        }
    }
    Ok(())
}
