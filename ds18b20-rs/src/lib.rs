#![cfg_attr(not(test), no_std)]
//! # DS18B20
//!
//! Temperature readout from Maxim DS18B20 sensors on any bus implementing
//! [`OneWire`]. Every operation is a self-contained transaction (reset, ROM
//! addressing, function command), so sensors on different buses or bridge
//! channels can be driven in any order.
//!
//! A typical cycle is [`start_conversion_all`] on a bus, a wait of
//! [`Resolution::conversion_time_ms`], then [`Ds18b20::read_scratchpad`] for every
//! sensor on that bus.
use embedded_hal::delay::DelayNs;
use embedded_onewire::{OneWire, OneWireError, OneWireResult, rom_is_valid, session};
use fixed::types::I12F4;

/// Family code of the DS18B20.
pub const DS18B20_FAMILY: u8 = 0x28;

const DS18B20_START_CONV: u8 = 0x44;
const DS18B20_READ_SCRATCH: u8 = 0xbe;
const DS18B20_WRITE_SCRATCH: u8 = 0x4e;

/// Temperature in degrees Celsius, as the sensor encodes it.
pub type Temperature = I12F4;

/// Conversion resolution, encoded as the sensor's configuration register.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Resolution {
    /// 0.5 °C steps.
    Resolution9bit = 0x1f,
    /// 0.25 °C steps.
    Resolution10bit = 0x3f,
    /// 0.125 °C steps.
    Resolution11bit = 0x5f,
    /// 0.0625 °C steps, the power-on default.
    #[default]
    Resolution12bit = 0x7f,
}

impl Resolution {
    /// Maximum conversion time in milliseconds.
    pub const fn conversion_time_ms(&self) -> u32 {
        use Resolution::*;
        match self {
            Resolution9bit => 94,
            Resolution10bit => 188,
            Resolution11bit => 375,
            Resolution12bit => 750,
        }
    }

    /// Resolution for a bit count in `9..=12`.
    pub const fn from_bits(bits: u8) -> Option<Self> {
        use Resolution::*;
        match bits {
            9 => Some(Resolution9bit),
            10 => Some(Resolution10bit),
            11 => Some(Resolution11bit),
            12 => Some(Resolution12bit),
            _ => None,
        }
    }

    // Temperature bits left undefined at this resolution
    const fn mask(&self) -> i16 {
        use Resolution::*;
        match self {
            Resolution9bit => !0b111,
            Resolution10bit => !0b11,
            Resolution11bit => !0b1,
            Resolution12bit => !0,
        }
    }
}

impl From<u8> for Resolution {
    /// Decodes the configuration register; only bits 5 and 6 are significant.
    fn from(config: u8) -> Self {
        use Resolution::*;
        match (config >> 5) & 0b11 {
            0 => Resolution9bit,
            1 => Resolution10bit,
            2 => Resolution11bit,
            _ => Resolution12bit,
        }
    }
}

/// A validated copy of the sensor's nine byte scratchpad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scratchpad([u8; 9]);

impl Scratchpad {
    /// Raw scratchpad bytes, the CRC last.
    pub fn as_bytes(&self) -> &[u8; 9] {
        &self.0
    }

    /// Upper alarm threshold (TH register).
    pub fn alarm_high(&self) -> i8 {
        self.0[2] as i8
    }

    /// Lower alarm threshold (TL register).
    pub fn alarm_low(&self) -> i8 {
        self.0[3] as i8
    }

    /// Resolution the last conversion ran at.
    pub fn resolution(&self) -> Resolution {
        Resolution::from(self.0[4])
    }

    /// Last converted temperature.
    ///
    /// Below 12 bit resolution the low bits of the register are undefined and
    /// are cleared.
    pub fn raw_temperature(&self) -> Temperature {
        let raw = i16::from_le_bytes([self.0[0], self.0[1]]);
        I12F4::from_bits(raw & self.resolution().mask())
    }
}

/// One DS18B20 on a 1-Wire bus, identified by its ROM code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ds18b20 {
    rom: u64,
    resolution: Resolution,
}

impl Ds18b20 {
    /// Wraps a ROM code found on the bus.
    ///
    /// # Errors
    /// [`OneWireError::WrongFamily`] if the ROM does not belong to a DS18B20,
    /// [`OneWireError::InvalidCrc`] if its CRC byte does not match.
    pub fn new<E>(rom: u64) -> OneWireResult<Self, E> {
        let family = rom as u8;
        if family != DS18B20_FAMILY {
            return Err(OneWireError::WrongFamily(family));
        }
        if !rom_is_valid(rom) {
            return Err(OneWireError::InvalidCrc);
        }
        Ok(Self {
            rom,
            resolution: Resolution::default(),
        })
    }

    /// ROM code of the sensor.
    pub fn rom(&self) -> u64 {
        self.rom
    }

    /// Resolution last configured or read back from the sensor.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Starts a temperature conversion on this sensor.
    ///
    /// Parasite-powered sensors need `powered`, which keeps the strong pullup
    /// on until the next bus reset.
    pub fn start_conversion<O: OneWire>(
        &self,
        bus: &mut O,
        powered: bool,
    ) -> OneWireResult<(), O::BusError> {
        session::select_and_write(bus, Some(self.rom), DS18B20_START_CONV, powered)
    }

    /// Reads and validates the scratchpad.
    pub fn read_scratchpad<O: OneWire>(
        &mut self,
        bus: &mut O,
    ) -> OneWireResult<Scratchpad, O::BusError> {
        let frame = session::select_and_read(bus, Some(self.rom), DS18B20_READ_SCRATCH)
            .inspect_err(|_| log::warn!("DS18B20 {:016x}: scratchpad read failed", self.rom))?;
        let pad = Scratchpad(frame);
        self.resolution = pad.resolution();
        Ok(pad)
    }

    /// Writes the alarm thresholds and the resolution to the scratchpad.
    ///
    /// The values are volatile; the sensor reverts to its EEPROM settings on
    /// power-up.
    pub fn set_resolution<O: OneWire>(
        &mut self,
        bus: &mut O,
        alarm_high: i8,
        alarm_low: i8,
        resolution: Resolution,
    ) -> OneWireResult<(), O::BusError> {
        session::select_and_write(bus, Some(self.rom), DS18B20_WRITE_SCRATCH, false)?;
        bus.write_byte(alarm_high as u8)?;
        bus.write_byte(alarm_low as u8)?;
        bus.write_byte(resolution as u8)?;
        self.resolution = resolution;
        log::debug!("DS18B20 {:016x}: resolution {resolution:?}", self.rom);
        Ok(())
    }

    /// Converts, waits for the conversion to finish and reads the temperature.
    pub fn measure<O: OneWire, D: DelayNs>(
        &mut self,
        bus: &mut O,
        delay: &mut D,
        powered: bool,
    ) -> OneWireResult<Temperature, O::BusError> {
        self.start_conversion(bus, powered)?;
        delay.delay_ms(self.resolution.conversion_time_ms());
        Ok(self.read_scratchpad(bus)?.raw_temperature())
    }
}

/// Starts a temperature conversion on every sensor of the bus at once (Skip ROM).
pub fn start_conversion_all<O: OneWire>(bus: &mut O, powered: bool) -> OneWireResult<(), O::BusError> {
    session::select_and_write(bus, None, DS18B20_START_CONV, powered)
}
