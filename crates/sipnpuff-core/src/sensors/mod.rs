//! Pressure sensing: bus transports, the BMP280 driver and the
//! [`PressureSource`] capability consumed by the gesture classifier.

pub mod bmp280;
pub mod bus;

pub use bmp280::{Bmp280, CalibrationSet, CompensatedReading};
pub use bus::{BusTransport, I2cTransport, SpiTransport};

use thiserror_no_std::Error;

/// Errors raised while talking to a pressure sensor.
///
/// Only [`SensorError::Transport`] is expected at runtime; the poll loop logs
/// it and tries again on the next cycle. Everything else is a start-up or
/// programming error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SensorError {
    /// The identity register did not hold the expected chip id.
    /// Usually a wiring or bus-address problem; start-up must abort.
    #[error("Chip identity mismatch (expected {expected:#04x}, found {found:#04x})")]
    IdentityMismatch { expected: u8, found: u8 },

    /// A compensated reading was requested before `configure` ran.
    #[error("Sensor has not been configured")]
    NotConfigured,

    /// `configure` was called on an already configured driver.
    #[error("Sensor is already configured")]
    AlreadyConfigured,

    /// A bus read or write failed.
    #[error("Bus transfer failed during {operation} (register {register:#04x})")]
    Transport {
        operation: &'static str,
        register: u8,
    },

    /// A calibration block had the wrong number of bytes.
    #[error("Calibration block has {found} bytes, expected {expected}")]
    InvalidCalibration { expected: usize, found: usize },
}

/// Anything that can produce absolute pressure readings in pascal.
///
/// The classifier depends on this trait only, so scripted sources can stand
/// in for real hardware.
pub trait PressureSource {
    /// Take one pressure reading.
    fn read_pressure_pascal(&mut self) -> Result<f64, SensorError>;
}

impl<S: PressureSource + ?Sized> PressureSource for &mut S {
    fn read_pressure_pascal(&mut self) -> Result<f64, SensorError> {
        (**self).read_pressure_pascal()
    }
}
