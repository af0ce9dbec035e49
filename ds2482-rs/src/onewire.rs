use crate::{
    Ds2482, Ds2482Error, Ds2482Result, Variant,
    registers::DeviceStatus,
};
use embedded_hal::{
    delay::DelayNs,
    i2c::{I2c, SevenBitAddress},
};
use embedded_onewire::{
    OneWire, OneWireResult,
    consts::{ONEWIRE_MATCH_ROM_CMD, ONEWIRE_SKIP_ROM_CMD},
};

pub(crate) const ONEWIRE_RESET_CMD: u8 = 0xb4;
pub(crate) const ONEWIRE_WRITE_BYTE: u8 = 0xa5;
pub(crate) const ONEWIRE_READ_BYTE: u8 = 0x96;
pub(crate) const ONEWIRE_SINGLE_BIT: u8 = 0x87;
pub(crate) const ONEWIRE_TRIPLET: u8 = 0x78;
pub(crate) const CHANNEL_SELECT_CMD: u8 = 0xc3;

/// Channel selection codes written to the DS2482-800, by channel.
pub(crate) const CHANNEL_WRITE_CODES: [u8; 8] = [0xf0, 0xe1, 0xd2, 0xc3, 0xb4, 0xa5, 0x96, 0x87];
/// Channel selection register contents after selecting each channel.
pub(crate) const CHANNEL_READ_CODES: [u8; 8] = [0xb8, 0xb1, 0xaa, 0xa3, 0x9c, 0x95, 0x8e, 0x87];

#[inline]
const fn bit_byte(bit: bool) -> u8 {
    if bit { 0x80 } else { 0x0 }
}

impl<I2C: I2c<SevenBitAddress>, D: DelayNs> Ds2482<I2C, D> {
    /// Engage the strong pullup for the next 1-Wire byte or bit command.
    pub fn set_strong_pullup(&mut self) -> Ds2482Result<(), I2C::Error> {
        let config = self.read_config()?;
        self.write_config(config.with_strong_pullup(true))
    }

    /// Release the strong pullup.
    pub fn clear_strong_pullup(&mut self) -> Ds2482Result<(), I2C::Error> {
        let config = self.read_config()?;
        self.write_config(config.with_strong_pullup(false))
    }

    /// Generates a 1-Wire reset/presence-detect cycle and returns the resulting status.
    ///
    /// The strong pullup is released first: a reset issued while it is active
    /// can exceed the bridge's ratings. A detected short sets
    /// [`ErrorFlags::short_circuit`](crate::ErrorFlags::short_circuit).
    pub fn wire_reset_status(&mut self) -> Ds2482Result<DeviceStatus, I2C::Error> {
        self.wait_on_busy()?;
        self.clear_strong_pullup()?;
        self.wait_on_busy()?;
        self.write_i2c_byte(ONEWIRE_RESET_CMD)?;
        let status = self.wait_on_busy()?;
        if status.short_detect() {
            log::warn!("DS2482 detected a short on the 1-Wire line");
            self.errors.set_short_circuit(true);
        }
        Ok(status)
    }

    /// Generates a 1-Wire reset/presence-detect cycle.
    ///
    /// # Returns
    /// Whether a presence pulse was detected.
    pub fn wire_reset(&mut self) -> Ds2482Result<bool, I2C::Error> {
        Ok(self.wire_reset_status()?.present_pulse_detect())
    }

    /// Writes a single data byte to the 1-Wire line, optionally followed by the strong pullup.
    pub fn wire_write_byte(&mut self, byte: u8, power: bool) -> Ds2482Result<(), I2C::Error> {
        self.wait_on_busy()?;
        if power {
            self.set_strong_pullup()?;
        }
        self.write_i2c_byte2(ONEWIRE_WRITE_BYTE, byte)
    }

    /// Generates eight read-data time slots on the 1-Wire line and returns the byte read.
    pub fn wire_read_byte(&mut self) -> Ds2482Result<u8, I2C::Error> {
        self.wait_on_busy()?;
        self.write_i2c_byte(ONEWIRE_READ_BYTE)?;
        self.wait_on_busy()?;
        self.read_data()
    }

    /// Generates a single 1-Wire time slot, optionally followed by the strong pullup.
    ///
    /// A 0 generates a write-zero time slot; a 1 generates a write-one time slot,
    /// which also functions as a read-data time slot. In either case the line is
    /// sampled into [`DeviceStatus::single_bit_result`].
    pub fn wire_write_bit(&mut self, bit: bool, power: bool) -> Ds2482Result<(), I2C::Error> {
        self.wait_on_busy()?;
        if power {
            self.set_strong_pullup()?;
        }
        self.write_i2c_byte2(ONEWIRE_SINGLE_BIT, bit_byte(bit))
    }

    /// Reads a single bit from the 1-Wire line with a write-one time slot.
    pub fn wire_read_bit(&mut self) -> Ds2482Result<bool, I2C::Error> {
        self.wire_write_bit(true, false)?;
        Ok(self.wait_on_busy()?.single_bit_result())
    }

    /// Runs one search triplet: reads the id bit and its complement, then writes the
    /// branch direction, which is `direction` if both reads were 0.
    ///
    /// # Returns
    /// The id bit, the complement bit and the direction taken.
    pub fn wire_triplet(&mut self, direction: bool) -> Ds2482Result<(bool, bool, bool), I2C::Error> {
        self.wait_on_busy()?;
        self.write_i2c_byte2(ONEWIRE_TRIPLET, bit_byte(direction))?;
        let status = self.wait_on_busy()?;
        Ok((
            status.single_bit_result(),
            status.triplet_second_bit(),
            status.branch_dir_taken(),
        ))
    }

    /// Addresses every device on the 1-Wire line (Skip ROM).
    pub fn wire_skip(&mut self) -> Ds2482Result<(), I2C::Error> {
        self.wire_write_byte(ONEWIRE_SKIP_ROM_CMD, false)
    }

    /// Addresses one device (Match ROM), sending the ROM least significant byte first.
    pub fn wire_select(&mut self, rom: u64) -> Ds2482Result<(), I2C::Error> {
        self.wire_write_byte(ONEWIRE_MATCH_ROM_CMD, false)?;
        for b in rom.to_le_bytes() {
            self.wire_write_byte(b, false)?;
        }
        Ok(())
    }

    /// Routes the bridge to 1-Wire channel `ch`.
    ///
    /// On the DS2482-800 the channel selection code is written and the code the
    /// bridge answers with is compared to the one expected for `ch`; a mismatch
    /// sets [`ErrorFlags::channel_mismatch`](crate::ErrorFlags::channel_mismatch).
    /// The DS2482-100 only has channel 0, which is always selected.
    ///
    /// # Returns
    /// Whether the bridge confirmed the selection.
    ///
    /// # Errors
    /// [`Ds2482Error::InvalidChannel`] if `ch` does not exist on this bridge variant.
    pub fn set_channel(&mut self, ch: u8) -> Ds2482Result<bool, I2C::Error> {
        if ch >= self.variant.channels() {
            return Err(Ds2482Error::InvalidChannel(ch));
        }
        if self.variant == Variant::Single {
            return Ok(true);
        }
        let ch = ch as usize;
        self.wait_on_busy()?;
        self.write_i2c_byte2(CHANNEL_SELECT_CMD, CHANNEL_WRITE_CODES[ch])?;
        // The read pointer now sits on the channel selection register
        let code = self.read_i2c_byte()?;
        if code != CHANNEL_READ_CODES[ch] {
            log::warn!("DS2482 channel {ch} not selected, read back {code:#04x}");
            self.errors.set_channel_mismatch(true);
            return Ok(false);
        }
        log::debug!("DS2482 channel set: {ch}");
        Ok(true)
    }
}

impl<I2C: I2c<SevenBitAddress>, D: DelayNs> OneWire for Ds2482<I2C, D> {
    type Status = DeviceStatus;

    type BusError = Ds2482Error<I2C::Error>;

    fn reset(&mut self) -> OneWireResult<Self::Status, Self::BusError> {
        Ok(self.wire_reset_status()?)
    }

    fn write_byte(&mut self, byte: u8) -> OneWireResult<(), Self::BusError> {
        Ok(self.wire_write_byte(byte, false)?)
    }

    fn write_byte_powered(&mut self, byte: u8) -> OneWireResult<(), Self::BusError> {
        Ok(self.wire_write_byte(byte, true)?)
    }

    fn read_byte(&mut self) -> OneWireResult<u8, Self::BusError> {
        Ok(self.wire_read_byte()?)
    }

    fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Self::BusError> {
        Ok(self.wire_write_bit(bit, false)?)
    }

    fn read_bit(&mut self) -> OneWireResult<bool, Self::BusError> {
        Ok(self.wire_read_bit()?)
    }

    fn read_triplet(&mut self, direction: bool) -> OneWireResult<(bool, bool, bool), Self::BusError> {
        Ok(self.wire_triplet(direction)?)
    }
}
