//! Display collaborators for the status reporter.
//!
//! | Display | Used when | Output |
//! |---|---|---|
//! | [`LcdMirror`] | simulation window | shared 16×2 buffer drawn by the visualizer |
//! | [`ConsoleDisplay`] | `--headless` | one `info!` event per changed screen |

use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

use intent_core::error::DeviceError;
use intent_core::Display;

pub const LCD_LINES: usize = 2;

// ════════════════════════════════════════════════════════════════════════════
// LcdMirror
// ════════════════════════════════════════════════════════════════════════════

/// Character panel shared between the reporter thread (writer) and the
/// window (reader).
#[derive(Clone, Debug, Default)]
pub struct LcdMirror {
    lines: Arc<Mutex<[String; LCD_LINES]>>,
}

impl LcdMirror {
    pub fn new() -> Self { Self::default() }

    pub fn lines(&self) -> [String; LCD_LINES] {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Display for LcdMirror {
    fn render_line(&mut self, text: &str, line: usize) -> Result<(), DeviceError> {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = lines
            .get_mut(line)
            .ok_or_else(|| DeviceError::Io(format!("no display line {}", line)))?;
        *slot = text.to_string();
        Ok(())
    }

    fn clear(&mut self) -> Result<(), DeviceError> {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        for line in lines.iter_mut() {
            line.clear();
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ConsoleDisplay
// ════════════════════════════════════════════════════════════════════════════

/// Logs the screen once its last line has been written.
#[derive(Debug, Default)]
pub struct ConsoleDisplay {
    lines: [String; LCD_LINES],
}

impl Display for ConsoleDisplay {
    fn render_line(&mut self, text: &str, line: usize) -> Result<(), DeviceError> {
        let slot = self.lines
            .get_mut(line)
            .ok_or_else(|| DeviceError::Io(format!("no display line {}", line)))?;
        *slot = text.to_string();
        if line == LCD_LINES - 1 {
            info!(target: "lcd", "[{:<16}] [{:<16}]", self.lines[0], self.lines[1]);
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<(), DeviceError> {
        self.lines = Default::default();
        info!(target: "lcd", "cleared");
        Ok(())
    }
}
