//! BMP280 register map and measurement settings.

use serde::{Deserialize, Serialize};

/// Value of the identity register on a genuine BMP280.
pub const CHIP_ID: u8 = 0x58;

pub const REG_CHIP_ID: u8 = 0xD0;
pub const REG_CTRL_MEAS: u8 = 0xF4;
pub const REG_CONFIG: u8 = 0xF5;
/// First of three pressure data registers (msb, lsb, xlsb).
pub const REG_PRESSURE_MSB: u8 = 0xF7;
/// First of three temperature data registers (msb, lsb, xlsb).
pub const REG_TEMPERATURE_MSB: u8 = 0xFA;
/// `dig_T1` low byte; the temperature calibration block is 6 bytes long.
pub const REG_CALIB_TEMPERATURE: u8 = 0x88;
/// `dig_P1` low byte; the pressure calibration block is 18 bytes long.
pub const REG_CALIB_PRESSURE: u8 = 0x8E;

/// Oversampling for a single measurement channel (`osrs_t` / `osrs_p`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Oversampling {
    /// Channel is skipped; its data registers hold 0x80000.
    Skipped = 0b000,
    #[default]
    X1 = 0b001,
    X2 = 0b010,
    X4 = 0b011,
    X8 = 0b100,
    X16 = 0b101,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum PowerMode {
    Sleep = 0b00,
    Forced = 0b01,
    /// Continuous conversions separated by the standby time.
    #[default]
    Normal = 0b11,
}

/// IIR filter coefficient applied by the chip to pressure and temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum FilterCoefficient {
    Off = 0b000,
    #[default]
    X2 = 0b001,
    X4 = 0b010,
    X8 = 0b011,
    X16 = 0b100,
}

/// Inactive time between conversions in normal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum StandbyTime {
    #[default]
    Ms0_5 = 0b000,
    Ms62_5 = 0b001,
    Ms125 = 0b010,
    Ms250 = 0b011,
    Ms500 = 0b100,
    Ms1000 = 0b101,
    Ms2000 = 0b110,
    Ms4000 = 0b111,
}

/// Everything written to the chip during configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSettings {
    pub temperature_oversampling: Oversampling,
    pub pressure_oversampling: Oversampling,
    pub power_mode: PowerMode,
    pub filter: FilterCoefficient,
    pub standby: StandbyTime,
}

impl SensorSettings {
    /// `config` register: `t_sb[7:5] | filter[4:2]`, 3-wire SPI disabled.
    ///
    /// These are the datasheet field positions. The shorter packing
    /// `filter << 1 | standby << 4` seen in some ports yields the same byte
    /// (0x04) for the default settings only, and corrupts `spi3w_en` and
    /// neighbouring fields for others.
    pub const fn config_byte(&self) -> u8 {
        ((self.standby as u8) << 5) | ((self.filter as u8) << 2)
    }

    /// `ctrl_meas` register: `osrs_t[7:5] | osrs_p[4:2] | mode[1:0]`.
    pub const fn control_byte(&self) -> u8 {
        (self.power_mode as u8)
            | ((self.pressure_oversampling as u8) << 2)
            | ((self.temperature_oversampling as u8) << 5)
    }
}
