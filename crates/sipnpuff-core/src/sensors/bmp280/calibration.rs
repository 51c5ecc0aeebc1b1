//! Factory trimming parameters and the datasheet compensation formulas.
//!
//! The formulas are the floating-point variants from the BMP280 datasheet
//! (section 8.1), evaluated in `f64`. They are pure: identical raw values and
//! calibration always produce bit-identical results.

use crate::sensors::SensorError;

/// Length of the `dig_T1..dig_T3` block starting at 0x88.
pub const TEMPERATURE_BLOCK_LEN: usize = 6;
/// Length of the `dig_P1..dig_P9` block starting at 0x8E.
pub const PRESSURE_BLOCK_LEN: usize = 18;

/// Factory calibration constants of one BMP280.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationSet {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
}

/// Calibrated output of one temperature/pressure conversion pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompensatedReading {
    pub temperature_celsius: f64,
    pub pressure_pascal: f64,
}

/// Word `index` of a little-endian block, as an unsigned value.
fn word_u16(block: &[u8], index: usize) -> u16 {
    u16::from_le_bytes([block[index * 2], block[index * 2 + 1]])
}

/// Word `index` of a little-endian block, as a two's-complement value.
fn word_i16(block: &[u8], index: usize) -> i16 {
    i16::from_le_bytes([block[index * 2], block[index * 2 + 1]])
}

impl CalibrationSet {
    /// Parse the two raw calibration blocks as read from the chip.
    ///
    /// The first word of each block is unsigned, the rest are signed.
    pub fn from_blocks(temperature: &[u8], pressure: &[u8]) -> Result<Self, SensorError> {
        if temperature.len() != TEMPERATURE_BLOCK_LEN {
            return Err(SensorError::InvalidCalibration {
                expected: TEMPERATURE_BLOCK_LEN,
                found: temperature.len(),
            });
        }
        if pressure.len() != PRESSURE_BLOCK_LEN {
            return Err(SensorError::InvalidCalibration {
                expected: PRESSURE_BLOCK_LEN,
                found: pressure.len(),
            });
        }

        Ok(Self {
            t1: word_u16(temperature, 0),
            t2: word_i16(temperature, 1),
            t3: word_i16(temperature, 2),
            p1: word_u16(pressure, 0),
            p2: word_i16(pressure, 1),
            p3: word_i16(pressure, 2),
            p4: word_i16(pressure, 3),
            p5: word_i16(pressure, 4),
            p6: word_i16(pressure, 5),
            p7: word_i16(pressure, 6),
            p8: word_i16(pressure, 7),
            p9: word_i16(pressure, 8),
        })
    }

    /// Fine temperature (`t_fine`) for a raw 20-bit temperature sample.
    ///
    /// Divide by 5120 for degrees Celsius; pass unchanged to
    /// [`compensate_pressure`](Self::compensate_pressure).
    pub fn compensate_temperature(&self, raw_temperature: u32) -> f64 {
        let raw = raw_temperature as f64;
        let t1 = self.t1 as f64;

        let var1 = (raw / 16384.0 - t1 / 1024.0) * self.t2 as f64;
        let delta = raw / 131072.0 - t1 / 8192.0;
        let var2 = delta * delta * self.t3 as f64;
        var1 + var2
    }

    /// Pressure in pascal for a raw 20-bit pressure sample.
    ///
    /// `t_fine` must come from a temperature conversion taken together with
    /// this pressure sample. Returns 0.0 when the scaling term is zero.
    pub fn compensate_pressure(&self, raw_pressure: u32, t_fine: f64) -> f64 {
        let mut var1 = t_fine / 2.0 - 64000.0;
        let mut var2 = var1 * var1 * self.p6 as f64 / 32768.0 + var1 * self.p5 as f64 * 2.0;
        var2 = var2 / 4.0 + self.p4 as f64 * 65536.0;
        var1 = (self.p3 as f64 * var1 * var1 / 524288.0 + self.p2 as f64 * var1) / 524288.0;
        var1 = (1.0 + var1 / 32768.0) * self.p1 as f64;
        if var1 == 0.0 {
            return 0.0;
        }

        let mut p = 1048576.0 - raw_pressure as f64;
        p = (p - var2 / 4096.0) * 6250.0 / var1;
        var1 = self.p9 as f64 * p * p / 2147483648.0;
        var2 = p * self.p8 as f64 / 32768.0;
        p + (var1 + var2 + self.p7 as f64) / 16.0
    }

    /// Temperature and pressure from one raw conversion pair.
    pub fn compensate(&self, raw_temperature: u32, raw_pressure: u32) -> CompensatedReading {
        let t_fine = self.compensate_temperature(raw_temperature);
        CompensatedReading {
            temperature_celsius: t_fine / 5120.0,
            pressure_pascal: self.compensate_pressure(raw_pressure, t_fine),
        }
    }
}
