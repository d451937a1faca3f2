//! # interpreter
//!
//! The CHIP-8 machine state, as the COSMAC VIP interpreter kept it:
//!  * V0-VF     8bit general registers; VF doubles as carry/borrow/collision
//!  * I         16bit index register, mostly pointing at sprites
//!  * PC        starts at 0x200 where the program is loaded
//!  * stack     16 return addresses
//!  * timers    delay and sound, both counting down at 60Hz
//!
//! `step()` runs exactly one instruction and `frame()` does the 60Hz
//! housekeeping; the scheduler decides how those interleave.
use crate::config::Config;
use crate::display::Display;
use crate::input::{Key, Keyboard};
use crate::instruction::{Instruction, Reg, UnknownInstruction};
use crate::memory::{self, Chip8MemoryMap, MemoryError, MemoryMap};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io;
use std::sync::mpsc::{Receiver, TryRecvError};
use thiserror::Error;

/// how many nested calls the stack can hold
pub const STACK_DEPTH: usize = 16;

const VF: usize = 0xf;

/// Fatal interpreter conditions. Anything that stops a program carries the
/// address and raw word of the instruction that caused it.
#[derive(Debug, Error)]
pub enum Chip8Error {
    #[error("unknown instruction {opcode:04x} at {addr:#05x}")]
    UnknownInstruction { addr: u16, opcode: u16 },
    #[error("stack overflow: {opcode:04x} at {addr:#05x} called with a full stack")]
    StackOverflow { addr: u16, opcode: u16 },
    #[error("stack underflow: {opcode:04x} at {addr:#05x} returned with an empty stack")]
    StackUnderflow { addr: u16, opcode: u16 },
    #[error("instruction {opcode:04x} at {addr:#05x}: {source}")]
    Memory {
        addr: u16,
        opcode: u16,
        source: MemoryError,
    },
    #[error("unable to fetch instruction: {source}")]
    Fetch { addr: u16, source: MemoryError },
    #[error("display failed: {0}")]
    Display(#[from] io::Error),
    #[error("keyboard failed: {0}")]
    Input(#[source] io::Error),
}

/// what went wrong executing an instruction, before we know where it was
#[derive(Debug)]
enum Fault {
    StackOverflow,
    StackUnderflow,
    Memory(MemoryError),
}

impl From<MemoryError> for Fault {
    fn from(e: MemoryError) -> Self {
        Fault::Memory(e)
    }
}

impl Fault {
    fn at(self, addr: u16, opcode: u16) -> Chip8Error {
        match self {
            Fault::StackOverflow => Chip8Error::StackOverflow { addr, opcode },
            Fault::StackUnderflow => Chip8Error::StackUnderflow { addr, opcode },
            Fault::Memory(source) => Chip8Error::Memory {
                addr,
                opcode,
                source,
            },
        }
    }
}

/// where the program counter goes after an instruction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Next,
    Skip,
    Jump(u16),
    /// run the same instruction again next tick
    Stall,
}

impl Flow {
    fn skip_if(cond: bool) -> Flow {
        if cond {
            Flow::Skip
        } else {
            Flow::Next
        }
    }
}

pub struct Chip8Interpreter<'a> {
    memory: Chip8MemoryMap,
    display: &'a mut dyn Display,
    keyboard: &'a dyn Keyboard,
    program_counter: u16,
    v: [u8; 16],
    i: u16,
    stack: [u16; STACK_DEPTH],
    stack_pointer: usize,
    delay_timer: u8,
    sound_timer: u8,
    rng: StdRng,
    key_wait: Option<Receiver<Key>>,
}

impl<'a> Chip8Interpreter<'a> {
    pub fn new(
        memory: Chip8MemoryMap,
        display: &'a mut dyn Display,
        keyboard: &'a dyn Keyboard,
        config: &Config,
    ) -> Chip8Interpreter<'a> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Chip8Interpreter {
            memory,
            display,
            keyboard,
            program_counter: memory::PROGRAM_ADDR,
            v: [0; 16],
            i: 0,
            stack: [0; STACK_DEPTH],
            stack_pointer: 0,
            delay_timer: 0,
            sound_timer: 0,
            rng,
            key_wait: None,
        }
    }

    pub fn program_counter(&self) -> u16 {
        self.program_counter
    }

    /// Vx; only the low nibble of `x` selects the register
    pub fn register(&self, x: Reg) -> u8 {
        self.v[(x & 0xf) as usize]
    }

    pub fn index(&self) -> u16 {
        self.i
    }

    pub fn stack_depth(&self) -> usize {
        self.stack_pointer
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    /// fetch, decode and execute the instruction at PC
    pub fn step(&mut self) -> Result<(), Chip8Error> {
        let addr = self.program_counter;
        let opcode = self
            .memory
            .get_word(addr)
            .map_err(|source| Chip8Error::Fetch { addr, source })?;
        let instruction = Instruction::decode(opcode.to_be_bytes())
            .map_err(|UnknownInstruction(opcode)| Chip8Error::UnknownInstruction { addr, opcode })?;

        let flow = self
            .execute(instruction)
            .map_err(|fault| fault.at(addr, opcode))?;
        self.program_counter = match flow {
            Flow::Next => addr.wrapping_add(2),
            Flow::Skip => addr.wrapping_add(4),
            Flow::Jump(target) => target,
            Flow::Stall => addr,
        };

        tracing::trace!(
            "{:04x} {:04x} {:<24} pc={:03x} i={:03x} v={:02x?}",
            addr,
            opcode,
            instruction.to_string(),
            self.program_counter,
            self.i,
            self.v
        );
        Ok(())
    }

    /// the 60Hz side of the machine: count the timers down, age key presses
    /// and put the picture on screen
    pub fn frame(&mut self) -> Result<(), Chip8Error> {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
        self.keyboard.check().map_err(Chip8Error::Input)?;
        self.keyboard.tick();
        self.display.flush()?;
        Ok(())
    }

    /// has the operator asked to stop
    pub fn exit_requested(&self) -> bool {
        self.keyboard.is_pressed(Key::Exit)
    }

    fn execute(&mut self, instruction: Instruction) -> Result<Flow, Fault> {
        use Instruction::*;

        let flow = match instruction {
            ClearScreen => {
                self.display.clear();
                Flow::Next
            }
            Return => {
                if self.stack_pointer == 0 {
                    return Err(Fault::StackUnderflow);
                }
                self.stack_pointer -= 1;
                let caller = self.stack[self.stack_pointer];
                tracing::debug!(depth = self.stack_pointer, "return to {:03x}", caller);
                Flow::Jump(caller.wrapping_add(2))
            }
            Jump(nnn) => Flow::Jump(nnn),
            Call(nnn) => {
                if self.stack_pointer == STACK_DEPTH {
                    return Err(Fault::StackOverflow);
                }
                self.stack[self.stack_pointer] = self.program_counter;
                self.stack_pointer += 1;
                tracing::debug!(depth = self.stack_pointer, "call {:03x}", nnn);
                Flow::Jump(nnn)
            }
            SkipIfEqualsConstant(x, nn) => Flow::skip_if(self.v[x as usize] == nn),
            SkipIfNotEqualsConstant(x, nn) => Flow::skip_if(self.v[x as usize] != nn),
            SkipIfEquals(x, y) => Flow::skip_if(self.v[x as usize] == self.v[y as usize]),
            SkipIfNotEquals(x, y) => Flow::skip_if(self.v[x as usize] != self.v[y as usize]),
            SetConstant(x, nn) => {
                self.v[x as usize] = nn;
                Flow::Next
            }
            AddConstant(x, nn) => {
                self.v[x as usize] = self.v[x as usize].wrapping_add(nn);
                Flow::Next
            }
            Set(x, y) => self.alu(x, y, |_, b| (b, None)),
            Or(x, y) => self.alu(x, y, |a, b| (a | b, None)),
            And(x, y) => self.alu(x, y, |a, b| (a & b, None)),
            Xor(x, y) => self.alu(x, y, |a, b| (a ^ b, None)),
            Add(x, y) => self.alu(x, y, |a, b| {
                let (sum, carry) = a.overflowing_add(b);
                (sum, Some(carry as u8))
            }),
            Sub(x, y) => self.alu(x, y, |a, b| (a.wrapping_sub(b), Some((a > b) as u8))),
            ShiftRight(x, y) => self.alu(x, y, |a, _| (a >> 1, Some(a & 0x1))),
            SubN(x, y) => self.alu(x, y, |a, b| (b.wrapping_sub(a), Some((b > a) as u8))),
            ShiftLeft(x, y) => self.alu(x, y, |a, _| (a << 1, Some(a >> 7))),
            SetIndex(nnn) => {
                self.i = nnn;
                Flow::Next
            }
            JumpWithOffset(nnn) => Flow::Jump(nnn.wrapping_add(self.v[0] as u16)),
            Random(x, nn) => {
                self.v[x as usize] = self.rng.gen::<u8>() & nn;
                Flow::Next
            }
            Draw(x, y, n) => {
                let sprite = self.memory.get_ro_slice(self.i, n as usize)?;
                let collision = self.display.draw(
                    self.v[x as usize] as usize,
                    self.v[y as usize] as usize,
                    sprite,
                );
                self.v[VF] = collision as u8;
                Flow::Next
            }
            SkipIfKeyDown(x) => Flow::skip_if(self.key_down(x)),
            SkipIfKeyUp(x) => Flow::skip_if(!self.key_down(x)),
            GetDelayTimer(x) => {
                self.v[x as usize] = self.delay_timer;
                Flow::Next
            }
            WaitForKey(x) => match self.next_key() {
                Some(value) => {
                    self.v[x as usize] = value;
                    Flow::Next
                }
                None => Flow::Stall,
            },
            SetDelayTimer(x) => {
                self.delay_timer = self.v[x as usize];
                Flow::Next
            }
            SetSoundTimer(x) => {
                self.sound_timer = self.v[x as usize];
                Flow::Next
            }
            AddToIndex(x) => {
                self.i = self.i.wrapping_add(self.v[x as usize] as u16);
                Flow::Next
            }
            FontGlyph(x) => {
                self.i = memory::FONT_ADDR + self.v[x as usize] as u16 * memory::FONT_GLYPH_BYTES;
                Flow::Next
            }
            StoreBcd(x) => {
                let value = self.v[x as usize];
                self.memory
                    .write(&[value / 100, (value / 10) % 10, value % 10], self.i)?;
                Flow::Next
            }
            StoreRegisters(x) => {
                self.memory.write(&self.v[..=x as usize], self.i)?;
                Flow::Next
            }
            LoadRegisters(x) => {
                let src = self.memory.get_ro_slice(self.i, x as usize + 1)?;
                self.v[..=x as usize].copy_from_slice(src);
                Flow::Next
            }
        };
        Ok(flow)
    }

    /// register-register arithmetic; the result lands in Vx before the flag
    /// lands in VF, so VF as a destination ends up holding the flag
    fn alu(&mut self, x: u8, y: u8, op: impl Fn(u8, u8) -> (u8, Option<u8>)) -> Flow {
        let (result, flag) = op(self.v[x as usize], self.v[y as usize]);
        self.v[x as usize] = result;
        if let Some(flag) = flag {
            self.v[VF] = flag;
        }
        Flow::Next
    }

    fn key_down(&self, x: u8) -> bool {
        Key::hex(self.v[x as usize]).map_or(false, |key| self.keyboard.is_pressed(key))
    }

    /// a key for Fx0A: either one that arrived on our subscription since the
    /// last attempt, or one being held now. Subscribes if neither.
    fn next_key(&mut self) -> Option<u8> {
        let delivered = match self.key_wait.as_ref().map(Receiver::try_recv) {
            Some(Ok(key)) => Some(key),
            Some(Err(TryRecvError::Disconnected)) => {
                self.key_wait = None;
                None
            }
            Some(Err(TryRecvError::Empty)) | None => None,
        };
        match delivered.or_else(|| self.keyboard.pressed_button()) {
            Some(Key::Hex(value)) => {
                self.key_wait = None;
                Some(value)
            }
            _ => {
                if self.key_wait.is_none() {
                    self.key_wait = Some(self.keyboard.subscribe());
                }
                None
            }
        }
    }
}
