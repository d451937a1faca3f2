use anyhow::Context;
use clap::Parser;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use chip8::config::{Config, DEFAULT_CLOCK_RATE, DEFAULT_FRAME_RATE};
use chip8::disassemble::disassemble;
use chip8::display::{MonoTermDisplay, DISPLAY_HEIGHT, DISPLAY_WIDTH};
use chip8::input::TermKeyboard;
use chip8::interpreter::Chip8Interpreter;
use chip8::memory::Chip8MemoryMap;
use chip8::scheduler::Scheduler;

/// Run a CHIP-8 program in the terminal. Keypad is the left-hand block of
/// the keyboard (1234 / QWER / ASDF / ZXCV); Esc quits.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// ROM image to load at 0x200
    #[arg(short, long)]
    rom: PathBuf,

    /// Print the disassembly of the ROM and exit
    #[arg(short, long)]
    disassemble: bool,

    /// Write trace output to this file
    #[arg(short, long)]
    log_file: Option<PathBuf>,

    /// Instructions per second
    #[arg(long, default_value_t = DEFAULT_CLOCK_RATE, value_parser = clap::value_parser!(u32).range(1..))]
    clock_rate: u32,

    /// Display refreshes per second
    #[arg(long, default_value_t = DEFAULT_FRAME_RATE, value_parser = clap::value_parser!(u32).range(1..))]
    frame_rate: u32,

    /// Seed for the random number instruction
    #[arg(long)]
    seed: Option<u64>,
}

/// a log file gets every instruction as it runs
const FILE_LOG_FILTER: &str = "chip8=trace";
/// the terminal belongs to the display, so keep quiet by default
const STDERR_LOG_FILTER: &str = "warn";

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("unable to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(env_filter(FILE_LOG_FILTER))
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter(STDERR_LOG_FILTER))
                .with_writer(io::stderr)
                .init();
        }
    }
    Ok(())
}

fn run(memory: Chip8MemoryMap, config: &Config) -> anyhow::Result<()> {
    // initialise; both restore the terminal when dropped
    let keyboard = TermKeyboard::new().context("unable to initialise keyboard")?;
    let mut display =
        MonoTermDisplay::new(DISPLAY_WIDTH, DISPLAY_HEIGHT).context("unable to initialise display")?;

    let mut interpreter = Chip8Interpreter::new(memory, &mut display, &keyboard, config);
    Scheduler::new(config, Instant::now())
        .run(&mut interpreter)
        .context("program failed to run")
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;

    let config = Config {
        clock_rate: args.clock_rate,
        frame_rate: args.frame_rate,
        seed: args.seed,
    };

    // load a program
    let mut memory = Chip8MemoryMap::new();
    let mut f = File::open(&args.rom)
        .with_context(|| format!("unable to open ROM {}", args.rom.display()))?;
    memory
        .load_program(&mut f)
        .with_context(|| format!("unable to load ROM {}", args.rom.display()))?;

    if args.disassemble {
        let stdout = io::stdout();
        disassemble(memory.program(), &mut stdout.lock())?;
        return Ok(());
    }

    run(memory, &config)
}
