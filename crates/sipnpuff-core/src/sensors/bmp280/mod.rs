//! Bosch BMP280 absolute pressure sensor.
//!
//! The driver owns a [`BusTransport`] and the chip's [`CalibrationSet`].
//! Bring-up is `check_identity` followed by `configure`, which writes the
//! measurement settings and reads the factory calibration exactly once:
//!
//! ```rust,ignore
//! let bus = I2cTransport::primary(i2c);
//! let mut sensor = Bmp280::init(bus, &SensorSettings::default())?;
//! let pascal = sensor.read_pressure_pascal()?;
//! ```

mod calibration;
pub mod registers;

pub use calibration::{
    CalibrationSet, CompensatedReading, PRESSURE_BLOCK_LEN, TEMPERATURE_BLOCK_LEN,
};
pub use registers::SensorSettings;

use log::{error, info};

use super::bus::BusTransport;
use super::{PressureSource, SensorError};
use registers::*;

/// Assemble a 20-bit sample from its msb, lsb and xlsb registers.
/// Only the upper nibble of xlsb carries data.
pub const fn raw_sample_from_bytes(bytes: [u8; 3]) -> u32 {
    ((bytes[2] as u32) >> 4) | ((bytes[1] as u32) << 4) | ((bytes[0] as u32) << 12)
}

pub struct Bmp280<B> {
    bus: B,
    calibration: Option<CalibrationSet>,
}

impl<B: BusTransport> Bmp280<B> {
    /// Wrap a bus without touching the chip.
    pub const fn new(bus: B) -> Self {
        Self {
            bus,
            calibration: None,
        }
    }

    /// Verify the chip identity and configure it.
    ///
    /// Fails with [`SensorError::IdentityMismatch`] when something other than
    /// a BMP280 answers, which almost always means a wiring problem.
    pub fn init(bus: B, settings: &SensorSettings) -> Result<Self, SensorError> {
        let mut sensor = Self::new(bus);

        let found = sensor.chip_id()?;
        if found != CHIP_ID {
            error!("BMP280: unexpected chip id {:#04x}", found);
            return Err(SensorError::IdentityMismatch {
                expected: CHIP_ID,
                found,
            });
        }

        sensor.configure(settings)?;
        Ok(sensor)
    }

    /// Raw contents of the identity register.
    pub fn chip_id(&mut self) -> Result<u8, SensorError> {
        self.bus.read_byte(REG_CHIP_ID).map_err(|e| {
            error!("BMP280 chip id read failed: {:?}", e);
            SensorError::Transport {
                operation: "read chip id",
                register: REG_CHIP_ID,
            }
        })
    }

    /// `true` when the identity register holds the BMP280 id.
    pub fn check_identity(&mut self) -> Result<bool, SensorError> {
        Ok(self.chip_id()? == CHIP_ID)
    }

    /// Write the measurement settings and read the factory calibration.
    ///
    /// Runs once per driver instance; a second call returns
    /// [`SensorError::AlreadyConfigured`] without touching the chip.
    pub fn configure(&mut self, settings: &SensorSettings) -> Result<(), SensorError> {
        if self.calibration.is_some() {
            return Err(SensorError::AlreadyConfigured);
        }

        // config first: writes to it are only guaranteed to stick in sleep mode,
        // and ctrl_meas is what leaves sleep mode.
        self.write_register(REG_CONFIG, settings.config_byte(), "write config")?;
        self.write_register(REG_CTRL_MEAS, settings.control_byte(), "write ctrl_meas")?;

        let calibration = self.read_calibration()?;
        info!(
            "BMP280 configured (ctrl_meas={:#04x}, config={:#04x})",
            settings.control_byte(),
            settings.config_byte()
        );
        self.calibration = Some(calibration);
        Ok(())
    }

    /// Read and parse both calibration blocks from the chip.
    pub fn read_calibration(&mut self) -> Result<CalibrationSet, SensorError> {
        let mut temperature = [0u8; TEMPERATURE_BLOCK_LEN];
        let mut pressure = [0u8; PRESSURE_BLOCK_LEN];

        self.read_block(
            REG_CALIB_TEMPERATURE,
            &mut temperature,
            "read temperature calibration",
        )?;
        self.read_block(REG_CALIB_PRESSURE, &mut pressure, "read pressure calibration")?;

        CalibrationSet::from_blocks(&temperature, &pressure)
    }

    /// Calibration read during [`configure`](Self::configure), if it ran.
    pub fn calibration(&self) -> Option<&CalibrationSet> {
        self.calibration.as_ref()
    }

    pub fn read_raw_temperature(&mut self) -> Result<u32, SensorError> {
        self.read_raw_sample(REG_TEMPERATURE_MSB, "read raw temperature")
    }

    pub fn read_raw_pressure(&mut self) -> Result<u32, SensorError> {
        self.read_raw_sample(REG_PRESSURE_MSB, "read raw pressure")
    }

    pub fn read_temperature_celsius(&mut self) -> Result<f64, SensorError> {
        let calibration = self.configured()?;
        let raw = self.read_raw_temperature()?;
        Ok(calibration.compensate_temperature(raw) / 5120.0)
    }

    /// Pressure in pascal.
    ///
    /// Pressure compensation depends on the current temperature, so every
    /// call takes a fresh temperature sample first.
    pub fn read_pressure_pascal(&mut self) -> Result<f64, SensorError> {
        Ok(self.read_compensated()?.pressure_pascal)
    }

    /// Temperature and pressure from one pair of raw samples.
    pub fn read_compensated(&mut self) -> Result<CompensatedReading, SensorError> {
        let calibration = self.configured()?;
        let raw_temperature = self.read_raw_temperature()?;
        let raw_pressure = self.read_raw_pressure()?;
        Ok(calibration.compensate(raw_temperature, raw_pressure))
    }

    /// Give the bus back.
    pub fn release(self) -> B {
        self.bus
    }

    fn configured(&self) -> Result<CalibrationSet, SensorError> {
        self.calibration.ok_or(SensorError::NotConfigured)
    }

    fn read_raw_sample(
        &mut self,
        register: u8,
        operation: &'static str,
    ) -> Result<u32, SensorError> {
        let mut bytes = [0u8; 3];
        self.read_block(register, &mut bytes, operation)?;
        Ok(raw_sample_from_bytes(bytes))
    }

    fn read_block(
        &mut self,
        register: u8,
        buffer: &mut [u8],
        operation: &'static str,
    ) -> Result<(), SensorError> {
        self.bus.read_block(register, buffer).map_err(|e| {
            error!("BMP280 {} failed: {:?}", operation, e);
            SensorError::Transport {
                operation,
                register,
            }
        })
    }

    fn write_register(
        &mut self,
        register: u8,
        value: u8,
        operation: &'static str,
    ) -> Result<(), SensorError> {
        self.bus.write_byte(register, value).map_err(|e| {
            error!("BMP280 {} failed: {:?}", operation, e);
            SensorError::Transport {
                operation,
                register,
            }
        })
    }
}

impl<B: BusTransport> PressureSource for Bmp280<B> {
    fn read_pressure_pascal(&mut self) -> Result<f64, SensorError> {
        Bmp280::read_pressure_pascal(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    /// In-memory register file standing in for the chip.
    struct RegisterBus {
        registers: [u8; 256],
        block_reads: Vec<(u8, usize)>,
        writes: Vec<(u8, u8)>,
        fail_reads: bool,
    }

    #[derive(Debug)]
    struct BusFault;

    impl RegisterBus {
        fn datasheet_chip() -> Self {
            let mut registers = [0u8; 256];
            registers[REG_CHIP_ID as usize] = CHIP_ID;
            registers[0x88..0x8E].copy_from_slice(&[0x70, 0x6B, 0x43, 0x67, 0x18, 0xFC]);
            registers[0x8E..0xA0].copy_from_slice(&[
                0x7D, 0x8E, 0x43, 0xD6, 0xD0, 0x0B, 0x27, 0x0B, 0x8C, 0x00, 0xF9, 0xFF, 0x8C,
                0x3C, 0xF8, 0xC6, 0x70, 0x17,
            ]);
            // raw pressure 415148 = 0x655AC, raw temperature 519888 = 0x7EED0
            registers[0xF7..0xFA].copy_from_slice(&[0x65, 0x5A, 0xC0]);
            registers[0xFA..0xFD].copy_from_slice(&[0x7E, 0xED, 0x00]);
            Self {
                registers,
                block_reads: Vec::new(),
                writes: Vec::new(),
                fail_reads: false,
            }
        }
    }

    impl BusTransport for RegisterBus {
        type Error = BusFault;

        fn read_byte(&mut self, register: u8) -> Result<u8, BusFault> {
            if self.fail_reads {
                return Err(BusFault);
            }
            Ok(self.registers[register as usize])
        }

        fn read_block(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), BusFault> {
            if self.fail_reads {
                return Err(BusFault);
            }
            self.block_reads.push((register, buffer.len()));
            let start = register as usize;
            buffer.copy_from_slice(&self.registers[start..start + buffer.len()]);
            Ok(())
        }

        fn write_byte(&mut self, register: u8, value: u8) -> Result<(), BusFault> {
            self.writes.push((register, value));
            self.registers[register as usize] = value;
            Ok(())
        }
    }

    #[test]
    fn test_raw_sample_assembly() {
        assert_eq!(raw_sample_from_bytes([0x65, 0x5A, 0xC0]), 415148);
        assert_eq!(raw_sample_from_bytes([0xFF, 0xFF, 0xFF]), 0xFFFFF);
        // Lower nibble of xlsb is ignored.
        assert_eq!(raw_sample_from_bytes([0x00, 0x00, 0x1F]), 1);
    }

    #[test]
    fn test_init_configures_and_reads_calibration() {
        let sensor = Bmp280::init(RegisterBus::datasheet_chip(), &SensorSettings::default())
            .unwrap();
        assert_eq!(sensor.calibration().map(|c| c.t1), Some(27504));

        let bus = sensor.release();
        assert_eq!(bus.writes, [(REG_CONFIG, 0x04), (REG_CTRL_MEAS, 0x27)]);
        assert_eq!(bus.block_reads, [(0x88, 6), (0x8E, 18)]);
    }

    #[test]
    fn test_identity_mismatch_is_fatal() {
        let mut bus = RegisterBus::datasheet_chip();
        bus.registers[REG_CHIP_ID as usize] = 0x60;

        let result = Bmp280::init(bus, &SensorSettings::default());
        assert!(matches!(
            result,
            Err(SensorError::IdentityMismatch {
                expected: 0x58,
                found: 0x60
            })
        ));
    }

    #[test]
    fn test_check_identity() {
        let mut sensor = Bmp280::new(RegisterBus::datasheet_chip());
        assert_eq!(sensor.check_identity(), Ok(true));
    }

    #[test]
    fn test_reading_before_configure_is_an_error() {
        let mut sensor = Bmp280::new(RegisterBus::datasheet_chip());
        assert_eq!(sensor.read_pressure_pascal(), Err(SensorError::NotConfigured));
        assert_eq!(sensor.read_temperature_celsius(), Err(SensorError::NotConfigured));
    }

    #[test]
    fn test_configure_runs_once() {
        let mut sensor = Bmp280::new(RegisterBus::datasheet_chip());
        sensor.configure(&SensorSettings::default()).unwrap();
        assert_eq!(
            sensor.configure(&SensorSettings::default()),
            Err(SensorError::AlreadyConfigured)
        );
        assert_eq!(sensor.release().writes.len(), 2);
    }

    #[test]
    fn test_compensated_readings() {
        let mut sensor =
            Bmp280::init(RegisterBus::datasheet_chip(), &SensorSettings::default()).unwrap();

        assert_eq!(sensor.read_raw_temperature(), Ok(519888));
        assert_eq!(sensor.read_raw_pressure(), Ok(415148));

        let celsius = sensor.read_temperature_celsius().unwrap();
        assert!((celsius - 25.08).abs() < 0.01);

        let pascal = sensor.read_pressure_pascal().unwrap();
        assert!((pascal - 100653.27).abs() < 0.1);
    }

    #[test]
    fn test_pressure_read_refreshes_temperature() {
        let mut sensor =
            Bmp280::init(RegisterBus::datasheet_chip(), &SensorSettings::default()).unwrap();
        sensor.bus.block_reads.clear();

        sensor.read_pressure_pascal().unwrap();
        assert_eq!(
            sensor.bus.block_reads,
            [(REG_TEMPERATURE_MSB, 3), (REG_PRESSURE_MSB, 3)]
        );
    }

    #[test]
    fn test_transport_errors_propagate() {
        let mut sensor =
            Bmp280::init(RegisterBus::datasheet_chip(), &SensorSettings::default()).unwrap();
        sensor.bus.fail_reads = true;

        assert_eq!(
            sensor.read_pressure_pascal(),
            Err(SensorError::Transport {
                operation: "read raw temperature",
                register: REG_TEMPERATURE_MSB,
            })
        );
    }
}
