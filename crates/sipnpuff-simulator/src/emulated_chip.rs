//! Register-level stand-in for a BMP280 on the bus.
//!
//! Serves the identity and calibration registers of a real part and encodes
//! the breath script's pressure into raw ADC values, so the core driver
//! runs its full protocol and compensation path unchanged.

use std::time::Duration;

use log::{debug, trace};
use sipnpuff_core::sensors::bmp280::{PRESSURE_BLOCK_LEN, TEMPERATURE_BLOCK_LEN};
use sipnpuff_core::sensors::bmp280::registers::{
    CHIP_ID, REG_CALIB_PRESSURE, REG_CALIB_TEMPERATURE, REG_CHIP_ID, REG_CONFIG, REG_CTRL_MEAS,
    REG_PRESSURE_MSB, REG_TEMPERATURE_MSB,
};
use sipnpuff_core::sensors::{BusTransport, CalibrationSet, SensorError};
use thiserror_no_std::Error;

use crate::breath::BreathScript;

// ---------------------------------------------------------------------------
// Factory data
// ---------------------------------------------------------------------------

/// Trimming parameters of the datasheet's worked example.
const TEMPERATURE_CALIBRATION: [u8; TEMPERATURE_BLOCK_LEN] = [0x70, 0x6B, 0x43, 0x67, 0x18, 0xFC];
const PRESSURE_CALIBRATION: [u8; PRESSURE_BLOCK_LEN] = [
    0x7D, 0x8E, 0x43, 0xD6, 0xD0, 0x0B, 0x27, 0x0B, 0x8C, 0x00, 0xF9, 0xFF, 0x8C, 0x3C, 0xF8,
    0xC6, 0x70, 0x17,
];

/// Raw temperature held constant at 25.08 °C.
const RAW_TEMPERATURE: u32 = 519888;

/// Raw pressure close to 100 kPa; starting point for encoding.
const RAW_PRESSURE_SEED: u32 = 415148;

/// Largest value of the 20-bit ADC.
const RAW_MAX: u32 = 0xF_FFFF;

// ---------------------------------------------------------------------------
// Bus errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmulatedBusError {
    /// Scripted fault on a pressure read.
    #[error("Injected glitch")]
    Glitch,
    /// Register outside the BMP280 map.
    #[error("Unknown register {0:#04x}")]
    UnknownRegister(u8),
}

// ---------------------------------------------------------------------------
// Chip
// ---------------------------------------------------------------------------

pub struct EmulatedChip {
    script: BreathScript,
    step: Duration,
    calibration: CalibrationSet,
    t_fine: f64,
    config: u8,
    control: u8,
    pressure_reads: u64,
    glitch_every: Option<u64>,
    last_raw: u32,
}

impl EmulatedChip {
    /// Each pressure read advances `script` by `step`. With `glitch_every`
    /// set, every n-th pressure read fails instead.
    pub fn new(
        script: BreathScript,
        step: Duration,
        glitch_every: Option<u64>,
    ) -> Result<Self, SensorError> {
        let calibration =
            CalibrationSet::from_blocks(&TEMPERATURE_CALIBRATION, &PRESSURE_CALIBRATION)?;
        Ok(Self {
            script,
            step,
            t_fine: calibration.compensate_temperature(RAW_TEMPERATURE),
            calibration,
            config: 0,
            control: 0,
            pressure_reads: 0,
            glitch_every: glitch_every.filter(|n| *n > 0),
            last_raw: RAW_PRESSURE_SEED,
        })
    }

    /// Last values written to CONFIG and CTRL_MEAS.
    pub fn settings(&self) -> (u8, u8) {
        (self.config, self.control)
    }

    /// Raw ADC value that compensates to `pascal`, found by secant steps
    /// from the previous sample.
    fn encode_pressure(&self, pascal: f64) -> u32 {
        let compensate = |raw: f64| {
            let raw = raw.clamp(0.0, RAW_MAX as f64) as u32;
            self.calibration.compensate_pressure(raw, self.t_fine)
        };

        let mut x0 = self.last_raw as f64;
        let mut x1 = x0 + 64.0;
        let mut f0 = compensate(x0) - pascal;
        for _ in 0..8 {
            let f1 = compensate(x1) - pascal;
            if f1 == f0 {
                break;
            }
            let next = x1 - f1 * (x1 - x0) / (f1 - f0);
            x0 = x1;
            f0 = f1;
            x1 = next;
            if (x1 - x0).abs() < 0.5 {
                break;
            }
        }
        x1.round().clamp(0.0, RAW_MAX as f64) as u32
    }

    fn next_raw_pressure(&mut self) -> Result<u32, EmulatedBusError> {
        self.pressure_reads += 1;
        let pascal = self.script.next_pressure(self.step);

        if let Some(n) = self.glitch_every {
            if self.pressure_reads % n == 0 {
                let fault = EmulatedBusError::Glitch;
                debug!("{} on pressure read {}", fault, self.pressure_reads);
                return Err(fault);
            }
        }

        let raw = self.encode_pressure(pascal);
        trace!("Emulated pressure {:.2} Pa -> raw {}", pascal, raw);
        self.last_raw = raw;
        Ok(raw)
    }
}

fn sample_bytes(raw: u32) -> [u8; 3] {
    [(raw >> 12) as u8, (raw >> 4) as u8, ((raw & 0x0F) << 4) as u8]
}

fn copy_block(buffer: &mut [u8], block: &[u8]) -> Result<(), EmulatedBusError> {
    let len = buffer.len().min(block.len());
    buffer[..len].copy_from_slice(&block[..len]);
    Ok(())
}

impl BusTransport for EmulatedChip {
    type Error = EmulatedBusError;

    fn read_byte(&mut self, register: u8) -> Result<u8, Self::Error> {
        match register {
            REG_CHIP_ID => Ok(CHIP_ID),
            REG_CONFIG => Ok(self.config),
            REG_CTRL_MEAS => Ok(self.control),
            other => Err(EmulatedBusError::UnknownRegister(other)),
        }
    }

    fn read_block(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), Self::Error> {
        match register {
            REG_CALIB_TEMPERATURE => copy_block(buffer, &TEMPERATURE_CALIBRATION),
            REG_CALIB_PRESSURE => copy_block(buffer, &PRESSURE_CALIBRATION),
            REG_TEMPERATURE_MSB => copy_block(buffer, &sample_bytes(RAW_TEMPERATURE)),
            REG_PRESSURE_MSB => {
                let raw = self.next_raw_pressure()?;
                copy_block(buffer, &sample_bytes(raw))
            }
            other => Err(EmulatedBusError::UnknownRegister(other)),
        }
    }

    fn write_byte(&mut self, register: u8, value: u8) -> Result<(), Self::Error> {
        match register {
            REG_CONFIG => self.config = value,
            REG_CTRL_MEAS => self.control = value,
            other => return Err(EmulatedBusError::UnknownRegister(other)),
        }
        Ok(())
    }
}
