use crossterm::event::{poll, read, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// a key on the COSMAC VIP hex keypad, or the emulator's own exit key
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Hex(u8),
    Exit,
}

impl Key {
    /// the keypad key for a register value, if there is one
    pub fn hex(value: u8) -> Option<Key> {
        (value < 0x10).then_some(Key::Hex(value))
    }
}

/// how many frame ticks a single key-down keeps a key pressed for
pub const PRESS_DURATION_TICKS: u8 = 1;

/// how often the polling thread checks whether it should stop
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// using left-hand side of qwerty keyboard; maps the keypad
/// 1 2 3 C
/// 4 5 6 D
/// 7 8 9 E
/// A 0 B F
const CHIP8_CONVENTIONAL_KEYMAP: [(char, u8); 16] = [
    ('x', 0x00), // x
    ('1', 0x01), // 1
    ('2', 0x02), // 2
    ('3', 0x03), // 3
    ('q', 0x04), // q
    ('w', 0x05), // w
    ('e', 0x06), // e
    ('a', 0x07), // a
    ('s', 0x08), // s
    ('d', 0x09), // d
    ('z', 0x0a), // z
    ('c', 0x0b), // c
    ('4', 0x0c), // 4
    ('r', 0x0d), // r
    ('f', 0x0e), // f
    ('v', 0x0f), // v
];

/// what the interpreter and scheduler are allowed to ask of the keyboard
pub trait Keyboard {
    /// is the key held right now
    fn is_pressed(&self, key: Key) -> bool;

    /// some hex key that is held right now; never the exit key
    fn pressed_button(&self) -> Option<Key>;

    /// age every press by one frame
    fn tick(&self);

    /// receive exactly the next hex key press
    fn subscribe(&self) -> Receiver<Key>;

    /// has the device stopped delivering keys
    fn check(&self) -> Result<(), io::Error>;
}

#[derive(Default)]
struct KeyStateInner {
    // ordered so pressed_button is deterministic
    pressed: BTreeMap<Key, u8>,
    waiting: Option<Sender<Key>>,
    failure: Option<io::Error>,
}

/// Debounced set of held keys. Shared between whatever is reading the real
/// keyboard and the scheduler, so every operation takes the lock.
#[derive(Default)]
pub struct KeyState {
    inner: Mutex<KeyStateInner>,
}

impl KeyState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, KeyStateInner> {
        // the map is always left consistent, so a panic elsewhere doesn't
        // invalidate it
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// a physical key went down (or auto-repeated)
    pub fn register_press(&self, key: Key) {
        let mut inner = self.lock();
        inner.pressed.insert(key, PRESS_DURATION_TICKS);
        if let Key::Hex(_) = key {
            if let Some(tx) = inner.waiting.take() {
                // the receiver may have been dropped; that subscription is
                // spent either way
                let _ = tx.send(key);
            }
        }
        tracing::debug!(?key, "key press");
    }

    /// the device feeding this state has died; every later `check` fails
    pub fn register_failure(&self, e: io::Error) {
        tracing::error!("keyboard failed: {}", e);
        let mut inner = self.lock();
        if inner.failure.is_none() {
            inner.failure = Some(e);
        }
    }
}

impl Keyboard for KeyState {
    fn is_pressed(&self, key: Key) -> bool {
        self.lock().pressed.contains_key(&key)
    }

    fn pressed_button(&self) -> Option<Key> {
        self.lock()
            .pressed
            .keys()
            .find(|k| matches!(k, Key::Hex(_)))
            .copied()
    }

    fn tick(&self) {
        let mut inner = self.lock();
        inner.pressed.retain(|_, remaining| {
            *remaining = remaining.saturating_sub(1);
            *remaining > 0
        });
    }

    fn subscribe(&self) -> Receiver<Key> {
        let (tx, rx) = mpsc::channel();
        // a newer subscription replaces an older one
        self.lock().waiting = Some(tx);
        rx
    }

    fn check(&self) -> Result<(), io::Error> {
        match &self.lock().failure {
            Some(e) => Err(io::Error::new(e.kind(), e.to_string())),
            None => Ok(()),
        }
    }
}

/// reads the terminal keyboard on its own thread via crossterm, feeding a
/// shared KeyState
pub struct TermKeyboard {
    state: Arc<KeyState>,
    stop: Arc<AtomicBool>,
    poller: Option<JoinHandle<()>>,
}

impl TermKeyboard {
    pub fn new() -> Result<Self, io::Error> {
        terminal::enable_raw_mode()?;
        let state = Arc::new(KeyState::new());
        let stop = Arc::new(AtomicBool::new(false));
        let keymap = HashMap::from(CHIP8_CONVENTIONAL_KEYMAP);

        let poller = {
            let state = Arc::clone(&state);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("keyboard".into())
                .spawn(move || poll_keys(&state, &stop, &keymap))?
        };

        Ok(TermKeyboard {
            state,
            stop,
            poller: Some(poller),
        })
    }
}

fn poll_keys(state: &KeyState, stop: &AtomicBool, keymap: &HashMap<char, u8>) {
    while !stop.load(Ordering::Relaxed) {
        match next_event() {
            Ok(Some(Event::Key(evt))) => {
                if let Some(key) = map_key(evt, keymap) {
                    state.register_press(key);
                }
            }
            Ok(_) => {}
            Err(e) => {
                state.register_failure(e);
                break;
            }
        }
    }
}

/// wait up to POLL_INTERVAL for a terminal event
fn next_event() -> Result<Option<Event>, io::Error> {
    if poll(POLL_INTERVAL)? {
        read().map(Some)
    } else {
        Ok(None)
    }
}

/// Esc and Ctrl+C quit; other control chords are ignored since raw mode
/// hands them to us instead of the shell
fn map_key(evt: KeyEvent, keymap: &HashMap<char, u8>) -> Option<Key> {
    match evt.code {
        KeyCode::Esc => Some(Key::Exit),
        KeyCode::Char(c) if evt.modifiers.contains(KeyModifiers::CONTROL) => {
            (c.to_ascii_lowercase() == 'c').then_some(Key::Exit)
        }
        KeyCode::Char(c) => {
            let key = keymap.get(&c.to_ascii_lowercase()).map(|&v| Key::Hex(v));
            if key.is_none() {
                tracing::debug!("can't map {:?} to a COSMAC key", c);
            }
            key
        }
        other => {
            tracing::debug!("ignoring key {:?}", other);
            None
        }
    }
}

impl Keyboard for TermKeyboard {
    fn is_pressed(&self, key: Key) -> bool {
        self.state.is_pressed(key)
    }

    fn pressed_button(&self) -> Option<Key> {
        self.state.pressed_button()
    }

    fn tick(&self) {
        self.state.tick()
    }

    fn subscribe(&self) -> Receiver<Key> {
        self.state.subscribe()
    }

    fn check(&self) -> Result<(), io::Error> {
        self.state.check()
    }
}

impl Drop for TermKeyboard {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(poller) = self.poller.take() {
            if poller.join().is_err() {
                tracing::warn!("keyboard thread panicked");
            }
        }
        if let Err(e) = terminal::disable_raw_mode() {
            tracing::warn!("unable to leave raw mode: {}", e);
        }
    }
}
