use crate::{
    OneWire, OneWireStatus,
    consts::{ONEWIRE_CONDITIONAL_SEARCH_CMD, ONEWIRE_SEARCH_CMD},
    crc::rom_is_valid,
    error::OneWireError,
};

/// A structure for searching devices on a 1-Wire bus.
/// This structure implements the search algorithm for discovering devices on the 1-Wire bus.
/// It maintains the state of the search.
///
/// Each bus (or each channel of a multiplexing bridge) needs its own instance; the
/// search state describes the device tree of exactly one bus segment.
pub struct OneWireSearch<'a, T> {
    onewire: &'a mut T,
    cmd: u8,
    family: u8,
    last_device: bool,
    /// Bit position (0..64) of the last branch where the 0 path was taken,
    /// `None` before the first pass and after the last device.
    last_discrepancy: Option<u8>,
    rom: [u8; 8],
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Type of search performed using [`OneWireSearch`].
pub enum OneWireSearchKind {
    /// Normal search
    Normal = ONEWIRE_SEARCH_CMD,
    /// Search only for devices with alarm
    Alarmed = ONEWIRE_CONDITIONAL_SEARCH_CMD,
}

impl<'a, T> OneWireSearch<'a, T> {
    /// Creates a new [`OneWireSearch`] instance.
    ///
    /// # Arguments
    /// * `onewire` - A mutable reference to a type that implements the `OneWire` trait.
    /// * `cmd` - The kind of search to perform.
    pub fn new(onewire: &'a mut T, cmd: OneWireSearchKind) -> Self {
        Self::with_family(onewire, cmd, 0)
    }

    /// Creates a new [`OneWireSearch`] instance restricted to a family code.
    ///
    /// A family code of `0` searches all families.
    pub fn with_family(onewire: &'a mut T, cmd: OneWireSearchKind, family: u8) -> Self {
        let mut search = Self {
            onewire,
            cmd: cmd as _,
            family,
            last_device: false,
            last_discrepancy: None,
            rom: [0; 8],
        };
        search.reset();
        search
    }

    /// Resets the search state, so that the next call to [`next`](OneWireSearch::next)
    /// starts a new enumeration.
    pub fn reset(&mut self) {
        self.last_device = false;
        self.rom = [0; 8];
        if self.family != 0 {
            // Steer the first pass into the requested family: replay the family
            // byte and take the 1 branch at the final bit.
            self.rom[0] = self.family;
            self.last_discrepancy = Some(63);
        } else {
            self.last_discrepancy = None;
        }
    }

    /// Whether the last device of the bus has been returned.
    pub fn is_exhausted(&self) -> bool {
        self.last_device
    }

    /// Bit position of the branch the next pass will take the 1 path at.
    pub fn last_discrepancy(&self) -> Option<u8> {
        self.last_discrepancy
    }
}

impl<T: OneWire> OneWireSearch<'_, T> {
    /// Searches for the next device on the 1-Wire bus.
    /// This method implements the [1-Wire search algorithm](https://www.analog.com/en/resources/app-notes/1wire-search-algorithm.html) to discover devices connected to the bus.
    /// The [next](OneWireSearch::next) method can be called repeatedly to find all devices on the bus,
    /// in ascending order of their ROM codes read least significant bit first.
    /// Once the last device has been returned, every further call returns `None`
    /// until the search is [reset](OneWireSearch::reset).
    /// An empty bus also returns `None`, without issuing the search command,
    /// as does a search no device answers, such as an alarm search with no device in alarm.
    ///
    /// # Returns
    /// A result containing the ROM code of the found device as a `u64` value.
    ///
    /// | Bit | Description |
    /// |-----|-------------|
    /// | 0-7 | Family code (e.g., 0x28 for DS18B20) |
    /// | 8-55 | Serial number |
    /// | 56-63 | CRC-8 (`0b1_0011_0001` poly) |
    ///
    /// The ROM code is returned as read; its CRC is not checked here.
    ///
    /// # Errors
    /// [`OneWireError::ShortCircuit`] if the bus reset reports a short, checked before presence.
    ///
    /// [`OneWireError::SearchInconsistent`] if no device answered a bit slot past the first,
    /// which happens when devices leave the bus mid-search. The search state is not modified.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<u64>, OneWireError<T::BusError>> {
        if self.last_device {
            return Ok(None);
        }
        let status = self.onewire.reset()?;
        if status.shortcircuit() {
            return Err(OneWireError::ShortCircuit);
        }
        if !status.presence() {
            return Ok(None);
        }
        self.onewire.write_byte(self.cmd)?;

        let mut rom = self.rom;
        let mut last_zero = None;
        for bit in 0..64u8 {
            let idx = (bit / 8) as usize;
            let mask = 1u8 << (bit % 8);
            // Replay the previous path below the last discrepancy, take the 1 branch
            // at it and the 0 branch at every new discrepancy past it.
            let dir = match self.last_discrepancy {
                Some(last) if bit < last => rom[idx] & mask != 0,
                Some(last) => bit == last,
                None => false,
            };
            let (id_bit, complement_bit, taken) = self.onewire.read_triplet(dir)?;
            if id_bit && complement_bit {
                if bit == 0 {
                    // Nobody answered the search command, e.g. no device in alarm
                    self.last_discrepancy = None;
                    self.last_device = true;
                    return Ok(None);
                }
                return Err(OneWireError::SearchInconsistent);
            }
            if !id_bit && !complement_bit && !taken {
                last_zero = Some(bit);
            }
            if taken {
                rom[idx] |= mask;
            } else {
                rom[idx] &= !mask;
            }
        }

        self.rom = rom;
        self.last_discrepancy = last_zero;
        self.last_device = last_zero.is_none();

        if self.family != 0 && rom[0] != self.family {
            // Walked past the requested family, nothing more to find
            self.last_device = true;
            return Ok(None);
        }
        Ok(Some(u64::from_le_bytes(rom)))
    }

    /// Enumerates every device on the bus.
    ///
    /// Resets the search state, then collects ROM codes in discovery order until the bus is
    /// exhausted or `roms` is full. ROM codes failing their CRC are logged and skipped.
    /// If the bus changes under the search, enumeration stops with a warning and the
    /// devices found so far are kept.
    ///
    /// # Returns
    /// The number of ROM codes stored at the start of `roms`.
    pub fn search_all(&mut self, roms: &mut [u64]) -> Result<usize, OneWireError<T::BusError>> {
        self.reset();
        let mut found = 0;
        while found < roms.len() {
            let rom = match self.next() {
                Ok(Some(rom)) => rom,
                Ok(None) => break,
                Err(OneWireError::SearchInconsistent) => {
                    log::warn!("1-Wire search lost track of the bus after {found} devices");
                    break;
                }
                Err(e) => return Err(e),
            };
            if !rom_is_valid(rom) {
                log::warn!("Skipping 1-Wire ROM {rom:016x}: invalid CRC");
                continue;
            }
            log::info!("Found 1-Wire device {rom:016x}");
            roms[found] = rom;
            found += 1;
        }
        Ok(found)
    }

    /// Verifies if the device with the given ROM code is present on the 1-Wire bus.
    ///
    /// This functions resets the search state, and calling [next](OneWireSearch::next) after this call will start a new search.
    pub fn verify(&mut self, rom: u64) -> Result<bool, OneWireError<T::BusError>> {
        let family = core::mem::take(&mut self.family);
        self.reset();
        self.rom = rom.to_le_bytes();
        self.last_discrepancy = Some(64); // replay every bit of the target
        let res = self.next();
        self.family = family;
        self.reset();
        Ok(res? == Some(rom))
    }
}
