use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use std::io::{self, Write};
use tui::backend::CrosstermBackend;
use tui::layout::Rect;
use tui::style::{Color, Style};
use tui::symbols::Marker;
use tui::widgets::canvas::{Canvas, Points};
use tui::widgets::{Block, Borders};
use tui::terminal::{TerminalOptions, Viewport};
use tui::Terminal;

pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;

/// Display is used by the interpreter to draw things on the screen. It should
/// abstract the implementation details, so a variety of kinds of screen would
/// work. The interpreter never reads pixels back; all it learns is whether a
/// draw collided.
pub trait Display {
    /// turn every pixel off
    fn clear(&mut self);

    /// XOR a sprite onto the display at (x, y), one byte per row, MSB on the
    /// left; returns true if any lit pixel was turned off
    fn draw(&mut self, x: usize, y: usize, sprite: &[u8]) -> bool;

    /// push the current picture out to whatever is showing it
    fn flush(&mut self) -> Result<(), io::Error>;
}

// store useful metadata about the screen
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution(pub usize, pub usize);

impl Resolution {
    pub fn pixel_count(&self) -> usize {
        self.0 * self.1
    }

    fn x_bounds(&self) -> [f64; 2] {
        [0.0, (self.0 - 1) as f64]
    }

    fn y_bounds(&self) -> [f64; 2] {
        [-1.0 * (self.1 - 1) as f64, 0.0]
    }
}

/// monochrome pixel grid holding the XOR/collision logic shared by every
/// Display implementation
#[derive(Clone, Debug)]
pub struct Framebuffer {
    resolution: Resolution,
    pixels: Vec<bool>,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        let resolution = Resolution(width, height);
        Framebuffer {
            resolution,
            pixels: vec![false; resolution.pixel_count()],
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn clear(&mut self) {
        self.pixels.iter_mut().for_each(|p| *p = false);
    }

    /// wraps at both edges: columns past the right edge continue at x=0 of
    /// the same row, rows past the bottom continue at y=0
    pub fn draw(&mut self, x: usize, y: usize, sprite: &[u8]) -> bool {
        let Resolution(w, h) = self.resolution;
        let mut collision = false;
        for (dy, line) in sprite.iter().enumerate() {
            let row = (y + dy) % h;
            for dx in 0..8 {
                if line & (0x80 >> dx) == 0 {
                    continue;
                }
                let p = row * w + (x + dx) % w;
                collision |= self.pixels[p];
                self.pixels[p] = !self.pixels[p];
            }
        }
        collision
    }

    pub fn is_lit(&self, x: usize, y: usize) -> bool {
        let Resolution(w, h) = self.resolution;
        self.pixels[(y % h) * w + x % w]
    }

    pub fn is_blank(&self) -> bool {
        !self.pixels.iter().any(|&p| p)
    }

    /// coordinates of every pixel in the given state, in canvas space
    /// (y grows downward on the chip-8, upward on the canvas)
    fn bitplane(&self, lit: bool) -> impl Iterator<Item = (f64, f64)> + '_ {
        let w = self.resolution.0;
        self.pixels
            .iter()
            .enumerate()
            .filter(move |(_, &p)| p == lit)
            .map(move |(i, _)| ((i % w) as f64, -1.0 * (i / w) as f64))
    }
}

impl Default for Framebuffer {
    fn default() -> Self {
        Framebuffer::new(DISPLAY_WIDTH, DISPLAY_HEIGHT)
    }
}

/// monochrome display in a terminal, rendered using TUI and Crossterm
pub struct MonoTermDisplay<W: Write = io::Stdout> {
    terminal: Terminal<CrosstermBackend<W>>,
    framebuffer: Framebuffer,
}

impl MonoTermDisplay {
    pub fn new(x: usize, y: usize) -> Result<MonoTermDisplay, io::Error> {
        MonoTermDisplay::with_writer(io::stdout(), x, y)
    }
}

impl<W: Write> MonoTermDisplay<W> {
    /// Takes over the terminal behind `out`. The viewport is exactly the
    /// bordered canvas, so the real terminal size never matters.
    pub fn with_writer(out: W, x: usize, y: usize) -> Result<MonoTermDisplay<W>, io::Error> {
        let viewport = Viewport::fixed(Rect::new(0, 0, 2 + x as u16, 2 + y as u16));
        let terminal = Terminal::with_options(CrosstermBackend::new(out), TerminalOptions { viewport })?;
        // from here on Drop puts the terminal back, whichever step fails
        let mut display = MonoTermDisplay {
            terminal,
            framebuffer: Framebuffer::new(x, y),
        };
        execute!(display.terminal.backend_mut(), EnterAlternateScreen)?;
        display.terminal.hide_cursor()?;
        display.terminal.clear()?;
        Ok(display)
    }
}

impl<W: Write> Drop for MonoTermDisplay<W> {
    fn drop(&mut self) {
        if let Err(e) = self.terminal.show_cursor() {
            tracing::warn!("unable to show cursor: {}", e);
        }
        if let Err(e) = execute!(self.terminal.backend_mut(), LeaveAlternateScreen) {
            tracing::warn!("unable to leave alternate screen: {}", e);
        }
    }
}

impl<W: Write> Display for MonoTermDisplay<W> {
    fn clear(&mut self) {
        self.framebuffer.clear();
    }

    fn draw(&mut self, x: usize, y: usize, sprite: &[u8]) -> bool {
        self.framebuffer.draw(x, y, sprite)
    }

    fn flush(&mut self) -> Result<(), io::Error> {
        let framebuffer = &self.framebuffer;
        let resolution = framebuffer.resolution();

        // for now this assumes a 1:1 ratio between terminal, chip8 and the
        // internal TUI canvas
        self.terminal.draw(|f| {
            let size = Rect::new(0, 0, 2 + resolution.0 as u16, 2 + resolution.1 as u16);

            let canvas = Canvas::default()
                .block(
                    Block::default()
                        .title("CHIP-8")
                        .borders(Borders::ALL)
                        .style(Style::default().bg(Color::Black)),
                )
                .x_bounds(resolution.x_bounds())
                .y_bounds(resolution.y_bounds())
                .marker(Marker::Block)
                .paint(|ctx| {
                    ctx.draw(&Points {
                        coords: &framebuffer.bitplane(false).collect::<Vec<_>>(),
                        color: Color::Black,
                    });
                    ctx.draw(&Points {
                        coords: &framebuffer.bitplane(true).collect::<Vec<_>>(),
                        color: Color::White,
                    });
                });
            f.render_widget(canvas, size);
        })?;
        Ok(())
    }
}

/// framebuffer-only display; useful for testing and for running without a
/// terminal
pub struct HeadlessDisplay {
    framebuffer: Framebuffer,
    flushes: usize,
}

impl HeadlessDisplay {
    pub fn new(x: usize, y: usize) -> Self {
        HeadlessDisplay {
            framebuffer: Framebuffer::new(x, y),
            flushes: 0,
        }
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    /// how many times the display has been flushed
    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

impl Default for HeadlessDisplay {
    fn default() -> Self {
        HeadlessDisplay::new(DISPLAY_WIDTH, DISPLAY_HEIGHT)
    }
}

impl Display for HeadlessDisplay {
    fn clear(&mut self) {
        self.framebuffer.clear();
    }

    fn draw(&mut self, x: usize, y: usize, sprite: &[u8]) -> bool {
        self.framebuffer.draw(x, y, sprite)
    }

    fn flush(&mut self) -> Result<(), io::Error> {
        self.flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    const ENTER_ALTERNATE: &[u8] = b"\x1b[?1049h";
    const LEAVE_ALTERNATE: &[u8] = b"\x1b[?1049l";
    const HIDE_CURSOR: &[u8] = b"\x1b[?25l";

    /// terminal stand-in that records output and can refuse one escape
    #[derive(Clone, Default)]
    struct Recorder {
        written: Arc<Mutex<Vec<u8>>>,
        refuse: Option<&'static [u8]>,
    }

    impl Recorder {
        fn position(&self, needle: &[u8]) -> Option<usize> {
            let written = self.written.lock().unwrap();
            written.windows(needle.len()).position(|w| w == needle)
        }
    }

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.refuse.map_or(false, |r| buf.windows(r.len()).any(|w| w == r)) {
                return Err(io::Error::new(io::ErrorKind::Other, "refused"));
            }
            self.written.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_term_display_restores_on_drop() {
        let out = Recorder::default();
        let display = MonoTermDisplay::with_writer(out.clone(), 64, 32).unwrap();
        assert!(out.position(ENTER_ALTERNATE).is_some());
        assert!(out.position(LEAVE_ALTERNATE).is_none());
        drop(display);
        assert!(out.position(LEAVE_ALTERNATE) > out.position(ENTER_ALTERNATE));
    }

    #[test]
    fn test_term_display_setup_failure_leaves_alternate_screen() {
        let out = Recorder {
            refuse: Some(HIDE_CURSOR),
            ..Recorder::default()
        };
        assert!(MonoTermDisplay::with_writer(out.clone(), 64, 32).is_err());
        let entered = out.position(ENTER_ALTERNATE);
        assert!(entered.is_some());
        assert!(out.position(LEAVE_ALTERNATE) > entered);
    }

    #[test]
    fn test_term_display_flush_renders() {
        let out = Recorder::default();
        let mut display = MonoTermDisplay::with_writer(out.clone(), 64, 32).unwrap();
        let before = out.written.lock().unwrap().len();
        display.draw(0, 0, &[0xff]);
        display.flush().unwrap();
        assert!(out.written.lock().unwrap().len() > before);
    }

    // Resolution tests
    #[test]
    fn test_pixel_count() {
        let r = Resolution(64, 32);
        assert_eq!(r.pixel_count(), 2048)
    }

    #[test]
    fn test_x_bounds() {
        let r = Resolution(64, 32);
        assert_eq!(r.x_bounds(), [0.0, 63.0]);
    }

    #[test]
    fn test_y_bounds() {
        let r = Resolution(64, 32);
        assert_eq!(r.y_bounds(), [-31.0, 0.0]);
    }

    // Framebuffer tests
    #[test]
    fn test_draw_on_blank_no_collision() {
        let mut fb = Framebuffer::default();
        assert!(!fb.draw(3, 4, &[0b1010_0000]));
        assert!(fb.is_lit(3, 4));
        assert!(!fb.is_lit(4, 4));
        assert!(fb.is_lit(5, 4));
    }

    #[test]
    fn test_draw_twice_erases() {
        let mut fb = Framebuffer::default();
        let glyph = [0xF0, 0x90, 0xF0, 0x90, 0x90];
        assert!(!fb.draw(10, 10, &glyph));
        assert!(!fb.is_blank());
        assert!(fb.draw(10, 10, &glyph));
        assert!(fb.is_blank());
    }

    #[test]
    fn test_full_row_twice_at_origin() {
        let mut fb = Framebuffer::default();
        assert!(!fb.draw(0, 0, &[0xff]));
        assert!(fb.draw(0, 0, &[0xff]));
        assert!(fb.is_blank());
    }

    #[test]
    fn test_partial_overlap_collides() {
        let mut fb = Framebuffer::default();
        fb.draw(0, 0, &[0b1000_0000]);
        // the overlapping pixel goes dark, the new one lights up
        assert!(fb.draw(0, 0, &[0b1100_0000]));
        assert!(!fb.is_lit(0, 0));
        assert!(fb.is_lit(1, 0));
    }

    #[test]
    fn test_no_collision_when_unlit_bits_overlap() {
        let mut fb = Framebuffer::default();
        fb.draw(0, 0, &[0b1000_0000]);
        assert!(!fb.draw(0, 0, &[0b0100_0000]));
    }

    #[test]
    fn test_draw_wraps_right_edge_same_row() {
        let mut fb = Framebuffer::default();
        fb.draw(DISPLAY_WIDTH - 1, 5, &[0b1110_0000]);
        assert!(fb.is_lit(DISPLAY_WIDTH - 1, 5));
        assert!(fb.is_lit(0, 5));
        assert!(fb.is_lit(1, 5));
        assert!(!fb.is_lit(0, 6));
    }

    #[test]
    fn test_draw_wraps_bottom_edge() {
        let mut fb = Framebuffer::default();
        fb.draw(0, DISPLAY_HEIGHT - 1, &[0x80, 0x80]);
        assert!(fb.is_lit(0, DISPLAY_HEIGHT - 1));
        assert!(fb.is_lit(0, 0));
    }

    #[test]
    fn test_clear() {
        let mut fb = Framebuffer::default();
        fb.draw(0, 0, &[0xff; 15]);
        fb.clear();
        assert!(fb.is_blank());
    }

    #[test]
    fn test_bitplanes_cover_screen() {
        let mut fb = Framebuffer::default();
        fb.draw(0, 1, &[0x80]);
        let lit: Vec<_> = fb.bitplane(true).collect();
        assert_eq!(lit, vec![(0.0, -1.0)]);
        assert_eq!(fb.bitplane(false).count(), 2047);
    }

    // HeadlessDisplay tests
    #[test]
    fn test_headless_flush_keeps_picture() -> Result<(), io::Error> {
        let mut d = HeadlessDisplay::default();
        d.draw(0, 0, &[0x80]);
        d.flush()?;
        assert!(d.framebuffer().is_lit(0, 0));
        assert_eq!(d.flushes(), 1);
        Ok(())
    }
}
