//! ## Design
//!
//! * instruction-level emulation of CHIP-8, not of the RCA 1802 underneath
//! * two clocks: instructions at 540Hz, frames (display, timers, key ageing)
//!   at 60Hz; they interleave on one thread and never overlap
//! * abstract display so can plug alternatives; starting with TUI in-console
//! * input device behind a trait too; the terminal one reads keys on its own
//!   thread so the key state is the only thing shared across threads
//!
//! Model
//!
//! ```text
//! main
//!  |-- memory (font + program image)
//!  |-- display, keyboard
//!  |-- interpreter(memory, display, keyboard, config)
//!  |    |-- instruction decode -> Instruction
//!  |    `-- execute -> where PC goes next
//!  `-- scheduler(config)
//!       |-- loop {
//!       |     earliest of (instruction clock, frame clock) is due?
//!       |       instruction: interpreter.step(); stop if exit key held
//!       |       frame:       interpreter.frame()
//!       |     otherwise sleep until it is
//!       |   }
//!       `-- stop on exit key or fatal error; backends drop and restore the
//!           terminal
//! ```
pub mod config;
pub mod disassemble;
pub mod display;
pub mod input;
pub mod instruction;
pub mod interpreter;
pub mod memory;
pub mod scheduler;
