//! Terminal renderer — blits the reconstructed 1-bpp framebuffer into
//! the terminal using half-block glyphs, two pixel rows per text row.

use std::io::{self, Stdout, Write};

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::style::Print;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
    LeaveAlternateScreen,
};
use crossterm::{execute, queue};

use monocast_core::DisplayDims;

/// Renders packed framebuffers into the alternate screen.
///
/// Raw mode and the alternate screen are entered on construction and
/// restored on drop, so a panic or early return leaves the terminal
/// usable.
pub struct TerminalDisplay {
    out: Stdout,
    dims: DisplayDims,
}

impl TerminalDisplay {
    /// Take over the terminal.
    pub fn new(dims: DisplayDims) -> io::Result<Self> {
        let mut out = io::stdout();
        enable_raw_mode()?;
        execute!(out, EnterAlternateScreen, Hide, Clear(ClearType::All))?;
        Ok(Self { out, dims })
    }

    /// Draw the framebuffer plus a one-line status footer.
    pub fn render(&mut self, framebuffer: &[u8], status: &str) -> io::Result<()> {
        let width = self.dims.width as usize;
        let height = self.dims.height as usize;

        let mut line = String::with_capacity(width);
        for row in 0..height / 2 {
            line.clear();
            let top = row * 2;
            for x in 0..width {
                let upper = pixel(framebuffer, self.dims, x, top);
                let lower = pixel(framebuffer, self.dims, x, top + 1);
                line.push(match (upper, lower) {
                    (true, true) => '█',
                    (true, false) => '▀',
                    (false, true) => '▄',
                    (false, false) => ' ',
                });
            }
            queue!(self.out, MoveTo(0, row as u16), Print(&line))?;
        }

        queue!(
            self.out,
            MoveTo(0, (height / 2) as u16 + 1),
            Clear(ClearType::CurrentLine),
            Print(status)
        )?;
        self.out.flush()
    }
}

impl Drop for TerminalDisplay {
    fn drop(&mut self) {
        let _ = execute!(self.out, Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

/// Read one pixel from a packed page-layout framebuffer.
fn pixel(framebuffer: &[u8], dims: DisplayDims, x: usize, y: usize) -> bool {
    let index = (y / 8) * dims.width as usize + x;
    framebuffer[index] & (1 << (y % 8)) != 0
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_lookup_matches_page_layout() {
        let dims = DisplayDims::new(128, 64).unwrap();
        let mut fb = vec![0u8; dims.buffer_len()];

        // Pixel (5, 10): byte (10/8)*128 + 5 = 133, bit 10 % 8 = 2.
        fb[133] = 0b0000_0100;

        assert!(pixel(&fb, dims, 5, 10));
        assert!(!pixel(&fb, dims, 5, 9));
        assert!(!pixel(&fb, dims, 4, 10));
    }
}
