/// instructions per second on the reference machine
pub const DEFAULT_CLOCK_RATE: u32 = 540;

/// display refreshes (and timer/key ticks) per second
pub const DEFAULT_FRAME_RATE: u32 = 60;

/// Knobs for a single run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// instruction clock, in Hz
    pub clock_rate: u32,
    /// frame clock, in Hz
    pub frame_rate: u32,
    /// fixed seed for Cxnn; taken from the OS when absent
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            clock_rate: DEFAULT_CLOCK_RATE,
            frame_rate: DEFAULT_FRAME_RATE,
            seed: None,
        }
    }
}
