//! One-line text gauge for watching pressure values on a console.
//!
//! Handy when tuning thresholds: a marker moves along a fixed-width bar as
//! the value changes, followed by the value itself.
//!
//! ```text
//! ----------------------------------------|--------------------------------------- 12.500000
//! ```

use core::fmt::{self, Write};

use heapless::String;

/// Widest bar that fits into a rendered line.
pub const MAX_WIDTH: usize = 96;
/// Capacity of a rendered line: bar, marker and formatted value.
pub const LINE_CAPACITY: usize = 160;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureBar {
    width: usize,
    center: f64,
    range: f64,
}

impl PressureBar {
    /// `width` is clamped to [`MAX_WIDTH`]; `range` is the span of values
    /// covered by the whole bar, centred on `center`.
    pub fn new(width: usize, center: f64, range: f64) -> Self {
        Self {
            width: width.min(MAX_WIDTH),
            center,
            range,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn set_center(&mut self, center: f64) {
        self.center = center;
    }

    /// Marker position for `value`, from 0 to `width` inclusive.
    pub fn position(&self, value: f64) -> usize {
        let relative = (value - self.center) / self.range + 0.5;
        let relative = libm::fmax(0.0, libm::fmin(1.0, relative));
        libm::round(self.width as f64 * relative) as usize
    }

    pub fn render(&self, value: f64) -> Result<String<LINE_CAPACITY>, fmt::Error> {
        let position = self.position(value);
        let mut line = String::new();

        for _ in 0..position {
            line.write_char('-')?;
        }
        line.write_char('|')?;
        for _ in position..self.width {
            line.write_char('-')?;
        }
        write!(line, " {:.6}", value)?;
        Ok(line)
    }
}

impl Default for PressureBar {
    /// 80 columns spanning ±500 Pa around zero: sized for differentials.
    fn default() -> Self {
        Self::new(80, 0.0, 1_000.0)
    }
}
