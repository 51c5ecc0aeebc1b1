//! Register-level bus access for the pressure sensor.
//!
//! The driver never talks to a bus peripheral directly. It goes through
//! [`BusTransport`], which two adapters implement on top of the blocking
//! `embedded-hal` 1.0 traits: [`I2cTransport`] and [`SpiTransport`].
//!
//! # Atomic block reads
//!
//! The BMP280 shadows its data registers only for the duration of a single
//! burst read. Reading the three bytes of a sample (or a calibration block)
//! in separate transactions can mix bytes from two conversions, so
//! [`BusTransport::read_block`] implementations must issue exactly one bus
//! transaction for the whole buffer.

use embedded_hal::i2c::I2c;
use embedded_hal::spi::{Operation, SpiDevice};

/// Byte-addressed register access on the sensor.
pub trait BusTransport {
    /// Error reported by the underlying bus.
    type Error: core::fmt::Debug;

    /// Read a single register.
    fn read_byte(&mut self, register: u8) -> Result<u8, Self::Error>;

    /// Fill `buffer` with consecutive registers starting at `register`,
    /// using one atomic bus transaction.
    fn read_block(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Write a single register.
    fn write_byte(&mut self, register: u8, value: u8) -> Result<(), Self::Error>;
}

impl<T: BusTransport + ?Sized> BusTransport for &mut T {
    type Error = T::Error;

    #[inline]
    fn read_byte(&mut self, register: u8) -> Result<u8, Self::Error> {
        (**self).read_byte(register)
    }

    #[inline]
    fn read_block(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read_block(register, buffer)
    }

    #[inline]
    fn write_byte(&mut self, register: u8, value: u8) -> Result<(), Self::Error> {
        (**self).write_byte(register, value)
    }
}

/// BMP280 on I2C.
///
/// Reads are a register-pointer write followed by a repeated-start read
/// (`write_read`), which keeps block reads inside one transaction.
pub struct I2cTransport<I> {
    i2c: I,
    address: u8,
}

impl<I> I2cTransport<I> {
    /// Address with SDO tied to ground.
    pub const PRIMARY_ADDRESS: u8 = 0x76;
    /// Address with SDO tied to VDDIO.
    pub const SECONDARY_ADDRESS: u8 = 0x77;

    #[inline]
    pub const fn new(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Use the primary address (0x76), the wiring of the reference board.
    #[inline]
    pub const fn primary(i2c: I) -> Self {
        Self::new(i2c, Self::PRIMARY_ADDRESS)
    }

    pub const fn address(&self) -> u8 {
        self.address
    }

    /// Give the bus back.
    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I: I2c> BusTransport for I2cTransport<I> {
    type Error = I::Error;

    #[inline]
    fn read_byte(&mut self, register: u8) -> Result<u8, Self::Error> {
        let mut value = [0u8; 1];
        self.i2c.write_read(self.address, &[register], &mut value)?;
        Ok(value[0])
    }

    #[inline]
    fn read_block(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.i2c.write_read(self.address, &[register], buffer)
    }

    #[inline]
    fn write_byte(&mut self, register: u8, value: u8) -> Result<(), Self::Error> {
        self.i2c.write(self.address, &[register, value])
    }
}

/// BMP280 on 4-wire SPI.
///
/// The top bit of the control byte selects the direction: set for reads,
/// cleared for writes. Chip select stays asserted for the whole
/// [`SpiDevice::transaction`], so block reads are atomic.
pub struct SpiTransport<S> {
    spi: S,
}

impl<S> SpiTransport<S> {
    const READ_BIT: u8 = 0x80;
    const WRITE_MASK: u8 = 0x7F;

    #[inline]
    pub const fn new(spi: S) -> Self {
        Self { spi }
    }

    pub fn release(self) -> S {
        self.spi
    }
}

impl<S: SpiDevice<u8>> BusTransport for SpiTransport<S> {
    type Error = S::Error;

    fn read_byte(&mut self, register: u8) -> Result<u8, Self::Error> {
        let mut value = [0u8; 1];
        self.read_block(register, &mut value)?;
        Ok(value[0])
    }

    fn read_block(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.spi.transaction(&mut [
            Operation::Write(&[register | Self::READ_BIT]),
            Operation::Read(buffer),
        ])
    }

    fn write_byte(&mut self, register: u8, value: u8) -> Result<(), Self::Error> {
        self.spi.write(&[register & Self::WRITE_MASK, value])
    }
}
