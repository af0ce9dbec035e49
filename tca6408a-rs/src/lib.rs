#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

/*! # TCA6408A
 *
 * Driver for the Texas Instruments TCA6408A 8-bit I2C GPIO expander.
 *
 * Pins are driven through the expander ([`Tca6408a::digital_write`],
 * [`Tca6408a::pin_mode`], ...) or through a borrowed [`Pin`] handle that
 * implements the `embedded-hal` digital traits.
 */

use embedded_hal::{
    digital::{self, ErrorType, InputPin, OutputPin},
    i2c::{I2c, SevenBitAddress},
};

/// Address with the ADDR pin tied low.
pub const TCA6408A_ADDRESS_LOW: u8 = 0x20;
/// Address with the ADDR pin tied high.
pub const TCA6408A_ADDRESS_HIGH: u8 = 0x21;

const INPUT_REG: u8 = 0x00; // Input port, read only
const OUTPUT_REG: u8 = 0x01; // Output port
const POLARITY_REG: u8 = 0x02; // Polarity inversion of the input port
const CONFIG_REG: u8 = 0x03; // Direction, 1 = input

/// Errors of the GPIO expander.
#[derive(Debug, PartialEq, Eq)]
pub enum Error<E> {
    /// The I2C transfer failed.
    DeviceUnavailable(E),
    /// The pin number is above 7.
    InvalidPin(u8),
}

impl<E> From<E> for Error<E> {
    fn from(err: E) -> Self {
        Error::DeviceUnavailable(err)
    }
}

impl<E: core::fmt::Debug> digital::Error for Error<E> {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

/// Pin direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// High impedance input.
    Input,
    /// Push-pull output.
    Output,
}

/// A TCA6408A on an I2C bus.
pub struct Tca6408a<I> {
    i2c: I,
    addr: u8,
    output: u8,
}

impl<I: I2c<SevenBitAddress>> Tca6408a<I> {
    /// Creates a driver for the expander at `addr`, without touching the bus.
    ///
    /// The output latch is assumed at its power-on value (all high) until
    /// [`probe`](Tca6408a::probe) reads it back.
    pub fn new(i2c: I, addr: u8) -> Self {
        Tca6408a {
            i2c,
            addr,
            output: 0xff,
        }
    }

    /// Checks that the expander answers and synchronises the output latch.
    ///
    /// # Returns
    /// The input port.
    pub fn probe(&mut self) -> Result<u8, Error<I::Error>> {
        let input = self.read_register(INPUT_REG).inspect_err(|_| {
            log::error!("TCA6408A not available under {:#04x}", self.addr);
        })?;
        self.output = self.read_register(OUTPUT_REG)?;
        log::debug!(
            "TCA6408A at {:#04x}: input {input:#04x}, output {:#04x}",
            self.addr,
            self.output
        );
        Ok(input)
    }

    /// Reads the level of `pin`.
    pub fn digital_read(&mut self, pin: u8) -> Result<bool, Error<I::Error>> {
        let mask = Self::mask(pin)?;
        Ok(self.read_register(INPUT_REG)? & mask != 0)
    }

    /// Drives `pin` to `value`.
    ///
    /// Nothing is written if the pin is already latched at `value`. Otherwise
    /// the output register is read back and only `pin` is changed.
    pub fn digital_write(&mut self, pin: u8, value: bool) -> Result<(), Error<I::Error>> {
        let mask = Self::mask(pin)?;
        if (self.output & mask != 0) == value {
            return Ok(());
        }
        let output = self.read_register(OUTPUT_REG)?;
        let output = if value { output | mask } else { output & !mask };
        self.write_register(OUTPUT_REG, output)?;
        self.output = output;
        Ok(())
    }

    /// Configures `pin` as input or output.
    pub fn pin_mode(&mut self, pin: u8, direction: Direction) -> Result<(), Error<I::Error>> {
        let mask = Self::mask(pin)?;
        let config = self.read_register(CONFIG_REG)?;
        let config = match direction {
            Direction::Input => config | mask,
            Direction::Output => config & !mask,
        };
        self.write_register(CONFIG_REG, config)
    }

    /// Inverts the level reported for input pins whose bit is set in `mask`.
    pub fn set_polarity(&mut self, mask: u8) -> Result<(), Error<I::Error>> {
        self.write_register(POLARITY_REG, mask)
    }

    /// Borrows `pin` as an `embedded-hal` digital pin.
    ///
    /// With `inverted`, high on the handle is low on the pin and vice versa.
    pub fn pin(&mut self, pin: u8, inverted: bool) -> Result<Pin<'_, I>, Error<I::Error>> {
        Self::mask(pin)?;
        Ok(Pin {
            dev: self,
            pin,
            inverted,
        })
    }

    /// Gives back the I2C bus.
    pub fn release(self) -> I {
        self.i2c
    }

    fn mask(pin: u8) -> Result<u8, Error<I::Error>> {
        if pin > 7 {
            return Err(Error::InvalidPin(pin));
        }
        Ok(1 << pin)
    }

    fn read_register(&mut self, reg: u8) -> Result<u8, Error<I::Error>> {
        let mut buf = [0; 1];
        self.i2c.write_read(self.addr, &[reg], &mut buf)?;
        Ok(buf[0])
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Error<I::Error>> {
        self.i2c.write(self.addr, &[reg, value])?;
        Ok(())
    }
}

/// One pin of a [`Tca6408a`].
pub struct Pin<'a, I> {
    dev: &'a mut Tca6408a<I>,
    pin: u8,
    inverted: bool,
}

impl<I: I2c<SevenBitAddress>> Pin<'_, I> {
    /// Configures the pin as input or output.
    pub fn set_direction(&mut self, direction: Direction) -> Result<(), Error<I::Error>> {
        self.dev.pin_mode(self.pin, direction)
    }
}

impl<I: I2c<SevenBitAddress>> ErrorType for Pin<'_, I> {
    type Error = Error<I::Error>;
}

impl<I: I2c<SevenBitAddress>> InputPin for Pin<'_, I> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.dev.digital_read(self.pin)? != self.inverted)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.is_high()?)
    }
}

impl<I: I2c<SevenBitAddress>> OutputPin for Pin<'_, I> {
    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.dev.digital_write(self.pin, !self.inverted)
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.dev.digital_write(self.pin, self.inverted)
    }
}
