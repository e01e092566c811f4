//! Demo scene — a stand-in for the device application.
//!
//! The streaming engine only borrows a packed 1-bpp framebuffer each
//! tick; what draws into it is out of scope. This scene gives the
//! daemon something real to mirror: a bouncing ball inside a border,
//! reacting to the button events viewers synthesize over the control
//! channel.

use monocast_core::{ButtonAction, ButtonEvent, DisplayDims};

/// Virtual OK button (pause/resume).
pub const BTN_OK: u32 = 0;
/// Virtual left button (nudge ball left).
pub const BTN_LEFT: u32 = 1;
/// Virtual right button (nudge ball right).
pub const BTN_RIGHT: u32 = 2;

/// Bouncing-ball scene drawing into a packed page-layout framebuffer.
pub struct DemoScene {
    dims: DisplayDims,
    framebuffer: Vec<u8>,
    ball_x: i32,
    ball_y: i32,
    vel_x: i32,
    vel_y: i32,
    paused: bool,
    inverted: bool,
}

impl DemoScene {
    /// Create a scene for the given panel.
    pub fn new(dims: DisplayDims) -> Self {
        let mut scene = Self {
            dims,
            framebuffer: vec![0; dims.buffer_len()],
            ball_x: dims.width as i32 / 2,
            ball_y: dims.height as i32 / 2,
            vel_x: 2,
            vel_y: 1,
            paused: false,
            inverted: false,
        };
        scene.draw();
        scene
    }

    /// The current packed framebuffer.
    pub fn framebuffer(&self) -> &[u8] {
        &self.framebuffer
    }

    /// Advance the animation by one tick and redraw.
    pub fn advance(&mut self) {
        if !self.paused {
            self.ball_x += self.vel_x;
            self.ball_y += self.vel_y;

            let (w, h) = (self.dims.width as i32, self.dims.height as i32);
            if self.ball_x <= 2 || self.ball_x >= w - 3 {
                self.vel_x = -self.vel_x;
                self.ball_x = self.ball_x.clamp(2, w - 3);
            }
            if self.ball_y <= 2 || self.ball_y >= h - 3 {
                self.vel_y = -self.vel_y;
                self.ball_y = self.ball_y.clamp(2, h - 3);
            }
        }
        self.draw();
    }

    /// React to a button event from the input bus.
    pub fn handle_button(&mut self, event: ButtonEvent) {
        match (event.pin, event.action) {
            (BTN_OK, ButtonAction::Click) => self.paused = !self.paused,
            (BTN_OK, ButtonAction::LongPress) => self.inverted = !self.inverted,
            (BTN_LEFT, ButtonAction::Click | ButtonAction::Press) => {
                self.vel_x = -self.vel_x.abs();
            }
            (BTN_RIGHT, ButtonAction::Click | ButtonAction::Press) => {
                self.vel_x = self.vel_x.abs();
            }
            _ => {}
        }
    }

    // ── Drawing ──────────────────────────────────────────────────

    fn draw(&mut self) {
        let fill = if self.inverted { 0xFF } else { 0x00 };
        self.framebuffer.fill(fill);

        let (w, h) = (self.dims.width as i32, self.dims.height as i32);

        // Border.
        for x in 0..w {
            self.set_pixel(x, 0);
            self.set_pixel(x, h - 1);
        }
        for y in 0..h {
            self.set_pixel(0, y);
            self.set_pixel(w - 1, y);
        }

        // 3×3 ball.
        for dy in -1..=1 {
            for dx in -1..=1 {
                self.set_pixel(self.ball_x + dx, self.ball_y + dy);
            }
        }
    }

    fn set_pixel(&mut self, x: i32, y: i32) {
        if x < 0 || y < 0 || x >= self.dims.width as i32 || y >= self.dims.height as i32 {
            return;
        }
        let index = (y as usize / 8) * self.dims.width as usize + x as usize;
        let mask = 1u8 << (y as usize % 8);
        if self.inverted {
            self.framebuffer[index] &= !mask;
        } else {
            self.framebuffer[index] |= mask;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
