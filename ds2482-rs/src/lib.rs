#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

/*! # DS2482
 *
 * Driver for the Maxim DS2482-100 (one channel) and DS2482-800 (eight channels)
 * I2C to 1-Wire bridges.
 *
 * The bridge is driven through its register interface ([`Ds2482::read_status`],
 * [`Ds2482::write_config`], ...) and the 1-Wire transaction layer built on top of it
 * ([`Ds2482::wire_reset`], [`Ds2482::wire_triplet`], ...). [`Ds2482`] implements
 * [`OneWire`], so the ROM search and session helpers of `embedded-onewire` run on it.
 *
 * Timeouts, shorts and read-back mismatches do not abort an operation. They are
 * recorded as sticky [`ErrorFlags`] which callers inspect with [`Ds2482::errors`] and
 * clear with [`Ds2482::clear_errors`]. Only a failing I2C transfer is returned as an
 * error ([`Ds2482Error::DeviceUnavailable`]).
 */

pub use embedded_onewire::{OneWire, OneWireError, OneWireResult};
mod error;
mod onewire;
mod registers;
#[cfg(test)]
mod sim;
mod traits;

pub use error::Ds2482Error;
pub use registers::{DeviceConfiguration, DeviceStatus, Ds2482Builder, ErrorFlags};
pub use traits::{Addressing, Interact};

/// Results of DS2482-specific function calls.
pub type Ds2482Result<T, E> = Result<T, Ds2482Error<E>>;

/// Default I2C address, with AD0 and AD1 (and AD2 on the DS2482-800) tied low.
pub const DS2482_DEFAULT_ADDRESS: u8 = 0x18;

/// Bridge variants, differing in the number of 1-Wire channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    /// DS2482-100, a single 1-Wire channel.
    #[default]
    Single,
    /// DS2482-800, eight 1-Wire channels selected with [`Ds2482::set_channel`].
    Octal,
}

impl Variant {
    /// Number of 1-Wire channels.
    pub const fn channels(&self) -> u8 {
        match self {
            Variant::Single => 1,
            Variant::Octal => 8,
        }
    }
}

/// A DS2482 I2C to 1-Wire bridge device.
///
/// Takes ownership of an I2C bus (implementing [`I2c`](embedded_hal::i2c::I2c) trait)
/// and a timer object implementing the [`DelayNs`](embedded_hal::delay::DelayNs) trait.
pub struct Ds2482<I, D> {
    pub(crate) i2c: I,
    pub(crate) addr: u8,
    pub(crate) delay: D,
    pub(crate) variant: Variant,
    pub(crate) poll_limit: u16,
    pub(crate) poll_interval_us: u32,
    pub(crate) errors: ErrorFlags,
}

impl<I, D> Ds2482<I, D> {
    /// Creates a new instance of `Ds2482` at the default address, without touching the bus.
    ///
    /// Use [`Ds2482Builder`] to reset and configure the bridge as part of construction.
    pub fn new(i2c: I, delay: D) -> Self {
        Ds2482 {
            i2c,
            addr: DS2482_DEFAULT_ADDRESS,
            delay,
            variant: Variant::Single,
            poll_limit: 1000,
            poll_interval_us: 20,
            errors: ErrorFlags::new(),
        }
    }

    /// Bridge variant this driver was configured for.
    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Sticky error flags accumulated since the last [`clear_errors`](Ds2482::clear_errors).
    pub fn errors(&self) -> ErrorFlags {
        self.errors
    }

    /// Clear the sticky error flags.
    pub fn clear_errors(&mut self) {
        self.errors = ErrorFlags::new();
    }

    /// Turn the sticky error flags into a result.
    ///
    /// Reports the first of timeout, short circuit, configuration mismatch and channel
    /// mismatch that is set. The flags are left untouched.
    pub fn check_errors<E>(&self) -> Ds2482Result<(), E> {
        let errors = self.errors;
        if errors.timeout() {
            Err(Ds2482Error::Timeout)
        } else if errors.short_circuit() {
            Err(Ds2482Error::ShortCircuit)
        } else if errors.config_mismatch() {
            Err(Ds2482Error::ConfigMismatch)
        } else if errors.channel_mismatch() {
            Err(Ds2482Error::ChannelSelectMismatch)
        } else {
            Ok(())
        }
    }

    /// Give back the I2C bus and the timer.
    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }
}
