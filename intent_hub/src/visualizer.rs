//! Software-rendered simulation window using `minifb`.
//!
//! Layout:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │ LCD line 1 (16 chars)                              │  │
//! │  │ LCD line 2                                         │  │
//! │  └────────────────────────────────────────────────────┘  │
//! │                                                          │
//! │  [lamp]  Light: ON     Claps: 1/2     Gesture: OK        │
//! │  [hold progress bar ──────────────]  EMERGENCY: 1.2s     │
//! │                                                          │
//! │  key legend                                              │
//! └──────────────────────────────────────────────────────────┘
//! ```

use std::sync::mpsc::Sender;
use std::time::Duration;

use minifb::{Key, KeyRepeat, Window, WindowOptions};

use intent_core::{HoldStatus, Shape, TickReport};

use crate::display::LcdMirror;
use crate::sim::{SimInput, SimKey};

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

pub const WIN_W:     usize = 640;
pub const WIN_H:     usize = 320;
const LCD_X:         usize = 40;
const LCD_Y:         usize = 30;
const LCD_W:         usize = WIN_W - 2 * LCD_X;
const LCD_H:         usize = 130;
const LCD_COLS:      usize = 16;
const LCD_SCALE:     usize = 5;
const LCD_PAD_X:     usize = 40;
const LCD_PAD_Y:     usize = 22;
const LCD_ROW_PITCH: usize = GLYPH_H * LCD_SCALE + 16;
const STATUS_Y:      usize = 190;
const HOLD_Y:        usize = 235;
const HOLD_W:        usize = 300;
const BG_COLOR:      u32   = 0xFF1A1A2E;
const LCD_BEZEL:     u32   = 0xFF0F3460;
const LCD_GREEN:     u32   = 0xFF9BBC0F;
const LCD_CELL:      u32   = 0xFF8BAC0F;
const LCD_INK:       u32   = 0xFF0F380F;
const LAMP_ON:       u32   = 0xFFFFD700;
const LAMP_OFF:      u32   = 0xFF444455;
const ALERT_RED:     u32   = 0xFFE94560;
const TEXT_COLOR:    u32   = 0xFFEEEEEE;
const LEGEND_COLOR:  u32   = 0xFF888888;

/// Held shape keys and the simulated shape each one shows.
const HAND_KEYS: [(Key, SimKey); 3] = [
    (Key::F, SimKey::Fist),
    (Key::P, SimKey::Palm),
    (Key::O, SimKey::OkSign),
];

// ════════════════════════════════════════════════════════════════════════════
// Overlay
// ════════════════════════════════════════════════════════════════════════════

/// What the status bar shows, folded from engine reports.
#[derive(Clone, Debug, PartialEq)]
pub struct Overlay {
    pub lights_on:      bool,
    pub pending_claps:  usize,
    pub shape:          Shape,
    pub hold_remaining: Option<Duration>,
    pub hold_total:     Duration,
}

impl Overlay {
    pub fn new(hold_total: Duration) -> Self {
        Overlay {
            lights_on:      false,
            pending_claps:  0,
            shape:          Shape::None,
            hold_remaining: None,
            hold_total,
        }
    }

    /// Fold one tick.  The last seen shape stays until a new frame arrives.
    pub fn update(&mut self, report: &TickReport, lights_on: bool, pending_claps: usize) {
        self.lights_on = lights_on;
        self.pending_claps = pending_claps;
        if let Some(out) = &report.gesture {
            self.shape = out.shape;
            self.hold_remaining = match out.hold {
                HoldStatus::Holding { remaining } => Some(remaining),
                HoldStatus::Idle | HoldStatus::Confirmed => None,
            };
        }
    }

    pub fn status_line(&self) -> String {
        format!(
            "Light: {}   Claps: {}/2   Gesture: {}",
            if self.lights_on { "ON" } else { "OFF" },
            self.pending_claps,
            self.shape.as_str().to_uppercase(),
        )
    }

    pub fn hold_line(&self) -> Option<String> {
        self.hold_remaining
            .map(|r| format!("EMERGENCY: {:.1}s", r.as_secs_f32()))
    }

    /// Fraction of the hold completed, 0.0–1.0.
    pub fn hold_progress(&self) -> f32 {
        match self.hold_remaining {
            Some(r) if !self.hold_total.is_zero() => {
                1.0 - (r.as_secs_f32() / self.hold_total.as_secs_f32()).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Visualizer
// ════════════════════════════════════════════════════════════════════════════

pub struct Visualizer {
    window:   Window,
    canvas:   Canvas,
    lcd:      LcdMirror,
    audio_tx: Option<Sender<SimInput>>,
    pose_tx:  Option<Sender<SimInput>>,
}

impl Visualizer {
    /// `audio_tx` / `pose_tx` are `None` when that modality comes from real
    /// hardware; the corresponding keys then do nothing.
    pub fn new(
        lcd:      LcdMirror,
        audio_tx: Option<Sender<SimInput>>,
        pose_tx:  Option<Sender<SimInput>>,
        frame:    Duration,
    ) -> Result<Self, String> {
        let mut window = Window::new(
            "Intent Hub — clap & gesture assistant",
            WIN_W, WIN_H,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        ).map_err(|e| e.to_string())?;

        window.limit_update_rate(Some(frame));

        Ok(Visualizer {
            window,
            canvas: Canvas::new(WIN_W, WIN_H, BG_COLOR),
            lcd,
            audio_tx,
            pose_tx,
        })
    }

    /// Poll keyboard inputs and translate to SimInput events.  Returns false
    /// on quit.
    pub fn poll_input(&mut self) -> bool {
        if !self.window.is_open() { return false; }

        if self.window.is_key_pressed(Key::Q, KeyRepeat::No) {
            return false;
        }

        if let Some(tx) = &self.audio_tx {
            if self.window.is_key_pressed(Key::C, KeyRepeat::No) {
                let _ = tx.send(SimInput::KeyDown(SimKey::Clap));
            }
        }

        if let Some(tx) = &self.pose_tx {
            for (key, sim) in HAND_KEYS {
                if self.window.is_key_pressed(key, KeyRepeat::No) {
                    let _ = tx.send(SimInput::KeyDown(sim));
                }
                if self.window.is_key_released(key) {
                    let _ = tx.send(SimInput::KeyUp(sim));
                }
            }
        }

        true
    }

    /// Render one frame.
    pub fn render(&mut self, overlay: &Overlay) {
        let c = &mut self.canvas;
        c.clear(BG_COLOR);

        // ── LCD panel: bezel, glass, unlit cells, characters ──────────────
        c.rect(LCD_X - 8, LCD_Y - 8, LCD_W + 16, LCD_H + 16, LCD_BEZEL);
        c.rect(LCD_X, LCD_Y, LCD_W, LCD_H, LCD_GREEN);
        let lines = self.lcd.lines();
        for (i, line) in lines.iter().enumerate() {
            let y = LCD_Y + LCD_PAD_Y + i * LCD_ROW_PITCH;
            for col in 0..LCD_COLS {
                let x = LCD_X + LCD_PAD_X + col * CELL_W * LCD_SCALE;
                c.rect(x, y, GLYPH_W * LCD_SCALE, GLYPH_H * LCD_SCALE, LCD_CELL);
            }
            c.text(line, LCD_X + LCD_PAD_X, y, LCD_SCALE, LCD_INK);
        }

        // ── Lamp + status ─────────────────────────────────────────────────
        let lamp = if overlay.lights_on { LAMP_ON } else { LAMP_OFF };
        c.rect(LCD_X, STATUS_Y, 24, 24, lamp);
        c.outline(LCD_X, STATUS_Y, 24, 24, TEXT_COLOR);
        c.text(&overlay.status_line(), LCD_X + 40, STATUS_Y + 5, 2, TEXT_COLOR);

        // ── Hold countdown ────────────────────────────────────────────────
        if let Some(text) = overlay.hold_line() {
            let done = (HOLD_W as f32 * overlay.hold_progress()) as usize;
            c.outline(LCD_X, HOLD_Y, HOLD_W, 16, ALERT_RED);
            c.rect(LCD_X, HOLD_Y, done, 16, ALERT_RED);
            c.text(&text, LCD_X + HOLD_W + 16, HOLD_Y + 1, 2, ALERT_RED);
        }

        // ── Key legend ────────────────────────────────────────────────────
        c.text("C=clap  hold F=fist  P=palm  O=ok sign  Q=quit", LCD_X, WIN_H - 24, 2, LEGEND_COLOR);

        self.window.update_with_buffer(&c.px, WIN_W, WIN_H).ok();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Canvas
// ════════════════════════════════════════════════════════════════════════════

/// Row-major ARGB pixels.  Everything drawn is clipped to the buffer.
struct Canvas {
    px: Vec<u32>,
    w:  usize,
    h:  usize,
}

impl Canvas {
    fn new(w: usize, h: usize, color: u32) -> Self {
        Canvas { px: vec![color; w * h], w, h }
    }

    fn clear(&mut self, color: u32) { self.px.fill(color); }

    fn rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        let right = x.saturating_add(w).min(self.w);
        if x >= right || y >= self.h {
            return;
        }
        for row in self.px.chunks_exact_mut(self.w).skip(y).take(h) {
            row[x..right].fill(color);
        }
    }

    fn outline(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        if w == 0 || h == 0 { return; }
        self.rect(x, y, w, 1, color);
        self.rect(x, y + h - 1, w, 1, color);
        self.rect(x, y, 1, h, color);
        self.rect(x + w - 1, y, 1, h, color);
    }

    /// Dot-matrix text; each dot is a `scale`-sized square.  Characters that
    /// would cross the right edge are dropped.
    fn text(&mut self, text: &str, x: usize, y: usize, scale: usize, color: u32) {
        for (i, ch) in text.chars().enumerate() {
            let cx = x + i * CELL_W * scale;
            if cx + GLYPH_W * scale > self.w {
                break;
            }
            for (row, &bits) in glyph(ch).iter().enumerate() {
                for col in 0..GLYPH_W {
                    if bits >> (GLYPH_W - 1 - col) & 1 == 1 {
                        self.rect(cx + col * scale, y + row * scale, scale, scale, color);
                    }
                }
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// 5×7 character ROM
// ────────────────────────────────────────────────────────────────────────────

const GLYPH_W: usize = 5;
const GLYPH_H: usize = 7;
/// Glyph plus one column of spacing.
const CELL_W:  usize = GLYPH_W + 1;

/// Rows top to bottom, bit 4 is the leftmost dot.  Letters are shown in
/// upper case; anything unknown is a solid block, as on the panel.
fn glyph(c: char) -> [u8; GLYPH_H] {
    match c.to_ascii_uppercase() {
        ' ' => [0; GLYPH_H],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        'A' => [0b01110, 0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '!' => [0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00000, 0b00100],
        '?' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b00000, 0b00100],
        '%' => [0b11000, 0b11001, 0b00010, 0b00100, 0b01000, 0b10011, 0b00011],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        ',' => [0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b00100, 0b01000],
        ':' => [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000],
        '/' => [0b00000, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b00000],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        '=' => [0b00000, 0b00000, 0b11111, 0b00000, 0b11111, 0b00000, 0b00000],
        _   => [0b11111; GLYPH_H],
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
