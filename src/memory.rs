use std::io;
use thiserror::Error;

// NB. addresses are u16 as per the chip-8; lengths are usize to stop endless casting

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryError {
    #[error("{len} byte(s) at {addr:#05x} fall outside the {size} byte address space")]
    OutOfRange { addr: u16, len: usize, size: usize },
}

/// Represents the flat address space the interpreter runs against
pub trait MemoryMap {
    /// write a chunk of bytes into "RAM"
    fn write(&mut self, data: &[u8], addr: u16) -> Result<(), MemoryError> {
        self.get_rw_slice(addr, data.len())?.copy_from_slice(data);
        Ok(())
    }

    /// get a two-byte big-endian word (instruction fetch)
    fn get_word(&self, addr: u16) -> Result<u16, MemoryError> {
        let word = self.get_ro_slice(addr, 2)?;
        Ok(((word[0] as u16) << 8) | (word[1] as u16))
    }

    /// get a single byte
    fn get_byte(&self, addr: u16) -> Result<u8, MemoryError> {
        Ok(self.get_ro_slice(addr, 1)?[0])
    }

    /// get a r/w slice of the underlying memory
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> Result<&mut [u8], MemoryError>;

    /// get a r/o slice of the underlying memory
    fn get_ro_slice(&self, addr: u16, len: usize) -> Result<&[u8], MemoryError>;
}

/// Loading a program image failed; the run never starts
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unable to read program image: {0}")]
    Io(#[from] io::Error),
    #[error("program is {size} bytes but only {max} fit above 0x200")]
    TooLarge { size: usize, max: usize },
}

/// how much RAM we have
pub const RAM_SIZE_BYTES: usize = 4096;

/// where the program is loaded
pub const PROGRAM_ADDR: u16 = 0x0200;

/// where the hex digit glyphs live; Fx29 relies on this being zero
pub const FONT_ADDR: u16 = 0x000;

/// each glyph is 5 rows of 8 pixels (only the high nibble is lit)
pub const FONT_GLYPH_BYTES: u16 = 5;

/// CHIP-8 memory map:
///   0x0000-0x004f  hex font
///   0x0050-0x01ff  unused (interpreter area on the COSMAC VIP)
///   0x0200-0x0fff  program
pub struct Chip8MemoryMap {
    bytes: Box<[u8]>,
    program_len: usize,
}

impl MemoryMap for Chip8MemoryMap {
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> Result<&mut [u8], MemoryError> {
        let a = addr as usize;
        let size = self.bytes.len();
        self.bytes
            .get_mut(a..a + len)
            .ok_or(MemoryError::OutOfRange { addr, len, size })
    }

    fn get_ro_slice(&self, addr: u16, len: usize) -> Result<&[u8], MemoryError> {
        let a = addr as usize;
        self.bytes.get(a..a + len).ok_or(MemoryError::OutOfRange {
            addr,
            len,
            size: self.bytes.len(),
        })
    }
}

impl Chip8MemoryMap {
    /// zeroed memory with the font baked in at 0x000
    pub fn new() -> Self {
        let mut bytes = vec![0u8; RAM_SIZE_BYTES].into_boxed_slice();
        let font = FONT_ADDR as usize;
        bytes[font..font + CHIP8_FONT.len()].copy_from_slice(&CHIP8_FONT);
        Chip8MemoryMap {
            bytes,
            program_len: 0,
        }
    }

    /// load a CHIP-8 program at 0x200
    pub fn load_program(&mut self, reader: &mut impl io::Read) -> Result<(), LoadError> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        let max = RAM_SIZE_BYTES - PROGRAM_ADDR as usize;
        if buf.len() > max {
            return Err(LoadError::TooLarge {
                size: buf.len(),
                max,
            });
        }
        let p = PROGRAM_ADDR as usize;
        self.bytes[p..p + buf.len()].copy_from_slice(&buf);
        self.program_len = buf.len();
        tracing::debug!(bytes = buf.len(), "loaded program at {:#05x}", PROGRAM_ADDR);
        Ok(())
    }

    /// the bytes of the most recently loaded program
    pub fn program(&self) -> &[u8] {
        let p = PROGRAM_ADDR as usize;
        &self.bytes[p..p + self.program_len]
    }
}

impl Default for Chip8MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

const CHIP8_FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];
