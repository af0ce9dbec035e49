use crate::{
    OneWireError, OneWireResult,
    consts::{ONEWIRE_MATCH_ROM_CMD, ONEWIRE_SKIP_ROM_CMD},
};

/// Status of the 1-Wire bus as reported after a reset.
pub trait OneWireStatus {
    /// A presence pulse was detected during the last reset.
    fn presence(&self) -> bool;

    /// The bus was found shorted during the last reset.
    fn shortcircuit(&self) -> bool;

    /// Logic level of the 1-Wire line, if the master can sample it.
    fn logic_level(&self) -> Option<bool> {
        None
    }

    /// Branch direction taken by the last search triplet, if the master reports it.
    fn direction(&self) -> Option<bool> {
        None
    }
}

/// A 1-Wire bus master.
///
/// Implementors provide the bus reset and bit and byte time slots; ROM search,
/// addressing and sessions are built on top of these.
pub trait OneWire {
    /// Bus status reported by [`OneWire::reset`].
    type Status: OneWireStatus;
    /// Failure of the transport driving the bus, e.g. an I2C error of a bridge.
    type BusError;

    /// Generates a reset/presence-detect cycle on the 1-Wire bus.
    ///
    /// An absent presence pulse is not an error at this level: inspect
    /// [`OneWireStatus::presence`] on the returned status.
    ///
    /// # Errors
    /// This method returns an error if the underlying transport fails.
    fn reset(&mut self) -> OneWireResult<Self::Status, Self::BusError>;

    /// Writes a byte, least significant bit first.
    fn write_byte(&mut self, byte: u8) -> OneWireResult<(), Self::BusError>;

    /// Writes a byte and engages the strong pullup once the last bit has been sent.
    ///
    /// Parasite-powered devices draw their conversion current through the
    /// strong pullup. The pullup is released by the next bus reset.
    fn write_byte_powered(&mut self, _byte: u8) -> OneWireResult<(), Self::BusError> {
        Err(OneWireError::Unimplemented)
    }

    /// Generates eight read time slots and returns the byte read.
    fn read_byte(&mut self) -> OneWireResult<u8, Self::BusError>;

    /// Generates a write-zero or write-one time slot.
    fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Self::BusError>;

    /// Generates a read time slot and samples the line.
    fn read_bit(&mut self) -> OneWireResult<bool, Self::BusError>;

    /// One bit of the [ROM search](https://www.analog.com/en/resources/app-notes/1wire-search-algorithm.html):
    /// read the id bit, read its complement, then write the branch taken.
    ///
    /// Devices disagreeing on the bit read 0 and 0, and `direction` picks the branch.
    /// Otherwise the branch is the id bit, which is also what is written when both
    /// reads are 1 and no device answered.
    ///
    /// Masters without a native triplet fall back to this default, built from
    /// two [`OneWire::read_bit`] calls and one [`OneWire::write_bit`].
    ///
    /// # Returns
    /// A tuple of the id bit, its complement and the direction that was written.
    fn read_triplet(&mut self, direction: bool) -> OneWireResult<(bool, bool, bool), Self::BusError> {
        let id_bit = self.read_bit()?;
        let complement_bit = self.read_bit()?;
        let taken = match (id_bit, complement_bit) {
            (false, false) => direction,
            (id, _) => id,
        };
        self.write_bit(taken)?;
        Ok((id_bit, complement_bit, taken))
    }

    /// Writes Match ROM followed by the 8 ROM bytes, least significant first, or Skip ROM
    /// when `rom` is [`None`]. The bus must have been reset immediately before.
    ///
    /// Reading after Skip ROM only makes sense with a single device on the bus.
    fn address(&mut self, rom: Option<u64>) -> OneWireResult<(), Self::BusError> {
        match rom {
            Some(rom) => {
                self.write_byte(ONEWIRE_MATCH_ROM_CMD)?;
                for &b in rom.to_le_bytes().iter() {
                    self.write_byte(b)?;
                }
            }
            None => self.write_byte(ONEWIRE_SKIP_ROM_CMD)?,
        }
        Ok(())
    }
}

impl<T: OneWire + ?Sized> OneWire for &mut T {
    type Status = T::Status;
    type BusError = T::BusError;

    fn reset(&mut self) -> OneWireResult<Self::Status, Self::BusError> {
        T::reset(self)
    }

    fn write_byte(&mut self, byte: u8) -> OneWireResult<(), Self::BusError> {
        T::write_byte(self, byte)
    }

    fn write_byte_powered(&mut self, byte: u8) -> OneWireResult<(), Self::BusError> {
        T::write_byte_powered(self, byte)
    }

    fn read_byte(&mut self) -> OneWireResult<u8, Self::BusError> {
        T::read_byte(self)
    }

    fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Self::BusError> {
        T::write_bit(self, bit)
    }

    fn read_bit(&mut self) -> OneWireResult<bool, Self::BusError> {
        T::read_bit(self)
    }

    fn read_triplet(&mut self, direction: bool) -> OneWireResult<(bool, bool, bool), Self::BusError> {
        T::read_triplet(self, direction)
    }
}
