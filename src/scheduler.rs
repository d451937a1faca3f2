//! # scheduler
//!
//! Two clocks share one thread:
//!  * the instruction clock runs one `step()` per tick and then checks the
//!    exit key
//!  * the frame clock flushes the display and ages timers and key presses
//!
//! Each clock keeps an absolute deadline and moves it on by exactly one period
//! when it fires, so neither drifts against wall time. Whichever deadline is
//! earliest gets serviced next; when nothing is due we sleep until it is.
use crate::config::Config;
use crate::interpreter::{Chip8Error, Chip8Interpreter};
use std::time::{Duration, Instant};

/// a fixed-rate deadline
#[derive(Clone, Copy, Debug)]
pub struct Clock {
    period: Duration,
    next: Instant,
}

impl Clock {
    /// first tick is one period after `start`
    pub fn new(hz: u32, start: Instant) -> Self {
        let period = Duration::from_secs(1) / hz.max(1);
        Clock {
            period,
            next: start + period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn deadline(&self) -> Instant {
        self.next
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next <= now
    }

    /// the clock fired; schedule the next tick one period on. If we've
    /// fallen more than a period behind (e.g. the process was suspended),
    /// restart from now rather than firing a burst to catch up.
    pub fn advance(&mut self, now: Instant) {
        self.next += self.period;
        if now.saturating_duration_since(self.next) > self.period {
            self.next = now;
        }
    }
}

/// what happened on one call to `Scheduler::tick`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    /// one instruction ran
    Instruction,
    /// one frame was serviced
    Frame,
    /// nothing is due before this instant
    Idle(Instant),
    /// the operator pressed the exit key
    Exit,
}

pub struct Scheduler {
    instructions: Clock,
    frames: Clock,
    instruction_count: u64,
    frame_count: u64,
}

impl Scheduler {
    pub fn new(config: &Config, start: Instant) -> Self {
        Scheduler {
            instructions: Clock::new(config.clock_rate, start),
            frames: Clock::new(config.frame_rate, start),
            instruction_count: 0,
            frame_count: 0,
        }
    }

    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// service the earliest clock if it's due at `now`; a frame wins a tie
    pub fn tick(
        &mut self,
        interpreter: &mut Chip8Interpreter<'_>,
        now: Instant,
    ) -> Result<Tick, Chip8Error> {
        if self.frames.deadline() <= self.instructions.deadline() {
            if self.frames.is_due(now) {
                interpreter.frame()?;
                self.frames.advance(now);
                self.frame_count += 1;
                return Ok(Tick::Frame);
            }
        } else if self.instructions.is_due(now) {
            interpreter.step()?;
            self.instructions.advance(now);
            self.instruction_count += 1;
            if interpreter.exit_requested() {
                return Ok(Tick::Exit);
            }
            return Ok(Tick::Instruction);
        }
        Ok(Tick::Idle(self.frames.deadline().min(self.instructions.deadline())))
    }

    /// run until the exit key is pressed or the interpreter fails
    pub fn run(&mut self, interpreter: &mut Chip8Interpreter<'_>) -> Result<(), Chip8Error> {
        tracing::info!(
            instruction_period = ?self.instructions.period(),
            frame_period = ?self.frames.period(),
            "starting run"
        );
        loop {
            let now = Instant::now();
            match self.tick(interpreter, now) {
                Ok(Tick::Idle(until)) => spin_sleep::sleep(until.saturating_duration_since(now)),
                Ok(Tick::Instruction) | Ok(Tick::Frame) => {}
                Ok(Tick::Exit) => {
                    tracing::info!(
                        instructions = self.instruction_count,
                        frames = self.frame_count,
                        "exit key pressed; stopping"
                    );
                    return Ok(());
                }
                Err(e) => {
                    tracing::error!(
                        instructions = self.instruction_count,
                        frames = self.frame_count,
                        "halted: {}",
                        e
                    );
                    return Err(e);
                }
            }
        }
    }
}
