use crate::{Ds2482, Ds2482Result, Variant, traits::{Addressing, Interact}};
use bitfield_struct::bitfield;
use embedded_hal::{
    delay::DelayNs,
    i2c::{I2c, SevenBitAddress},
};
use embedded_onewire::OneWireStatus;

pub(crate) const READ_PTR_CMD: u8 = 0xe1; // Set the read pointer
pub(crate) const DEVICE_RST_CMD: u8 = 0xf0; // Reset the device
pub(crate) const WRITE_CONFIG_CMD: u8 = 0xd2; // Write the device configuration
pub(crate) const DEVICE_STATUS_PTR: u8 = 0xf0; // Device status register
pub(crate) const READ_DATA_PTR: u8 = 0xe1; // Read data register
pub(crate) const DEVICE_CONFIG_PTR: u8 = 0xc3; // Device configuration register

/// Builder for creating a [`Ds2482`] instance with custom configuration.
pub struct Ds2482Builder {
    pub(crate) addr: u8,
    pub(crate) variant: Variant,
    pub(crate) poll_limit: u16,
    pub(crate) poll_interval_us: u32,
    pub(crate) config: DeviceConfiguration,
}

impl Default for Ds2482Builder {
    fn default() -> Self {
        Ds2482Builder {
            addr: crate::DS2482_DEFAULT_ADDRESS,
            variant: Variant::Single,
            poll_limit: 1000,
            poll_interval_us: 20,
            config: DeviceConfiguration::new().with_active_pullup(true),
        }
    }
}

impl Ds2482Builder {
    /// Sets the 7-bit I2C address of the bridge.
    ///
    /// The address is `0x18` plus the levels of the AD pins (AD0 to AD1 on the
    /// DS2482-100, AD0 to AD2 on the DS2482-800).
    pub fn with_address(mut self, addr: u8) -> Self {
        self.addr = addr;
        self
    }

    /// Sets the bridge variant.
    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    /// Sets how many times the status register is polled before a busy
    /// 1-Wire line is flagged as timed out.
    pub fn with_poll_limit(mut self, poll_limit: u16) -> Self {
        self.poll_limit = poll_limit.max(1);
        self
    }

    /// Sets the delay between two polls of the status register, in microseconds.
    pub fn with_poll_interval_us(mut self, poll_interval_us: u32) -> Self {
        self.poll_interval_us = poll_interval_us;
        self
    }

    /// Sets the device configuration written after the reset.
    pub fn with_config(mut self, config: DeviceConfiguration) -> Self {
        self.config = config;
        self
    }

    /// Builds a new `Ds2482` instance: resets the bridge and writes the configuration.
    ///
    /// # Errors
    /// Fails if the bridge does not answer, or if the reset timed out or the
    /// configuration did not read back.
    pub fn build<I: I2c<SevenBitAddress>, D: DelayNs>(
        mut self,
        i2c: I,
        delay: D,
    ) -> Ds2482Result<Ds2482<I, D>, I::Error> {
        let mut dev = Ds2482::new(i2c, delay);
        dev.addr = self.addr;
        dev.variant = self.variant;
        dev.poll_limit = self.poll_limit;
        dev.poll_interval_us = self.poll_interval_us;
        dev.device_reset()?;
        self.config.write(&mut dev)?;
        dev.check_errors()?;
        Ok(dev)
    }
}

impl<I2C: I2c<SevenBitAddress>, D: DelayNs> Ds2482<I2C, D> {
    /// Write a single byte to the bridge.
    pub fn write_i2c_byte(&mut self, byte: u8) -> Ds2482Result<(), I2C::Error> {
        self.i2c.write(self.addr, &[byte])?;
        Ok(())
    }

    /// Write a command byte followed by its parameter byte.
    pub fn write_i2c_byte2(&mut self, byte0: u8, byte1: u8) -> Ds2482Result<(), I2C::Error> {
        self.i2c.write(self.addr, &[byte0, byte1])?;
        Ok(())
    }

    /// Read a single byte from the register the read pointer selects.
    pub fn read_i2c_byte(&mut self) -> Ds2482Result<u8, I2C::Error> {
        let mut buf = [0; 1];
        self.i2c.read(self.addr, &mut buf)?;
        Ok(buf[0])
    }

    /// Set the read pointer to the specified register.
    ///
    /// Overwrites the read pointer position of any 1-Wire communication command in progress.
    pub fn set_read_pointer(&mut self, ptr: u8) -> Ds2482Result<(), I2C::Error> {
        self.write_i2c_byte2(READ_PTR_CMD, ptr)
    }

    /// Read the status register.
    pub fn read_status(&mut self) -> Ds2482Result<DeviceStatus, I2C::Error> {
        let mut stat = DeviceStatus::new();
        stat.read(self)?;
        Ok(stat)
    }

    /// Read the data register, holding the result of the last 1-Wire read byte.
    pub fn read_data(&mut self) -> Ds2482Result<u8, I2C::Error> {
        self.set_read_pointer(READ_DATA_PTR)?;
        self.read_i2c_byte()
    }

    /// Read the configuration register.
    pub fn read_config(&mut self) -> Ds2482Result<DeviceConfiguration, I2C::Error> {
        let mut config = DeviceConfiguration::new();
        config.read(self)?;
        Ok(config)
    }

    /// Write the configuration register.
    ///
    /// The bridge expects the four configuration bits in the low nibble and
    /// their complement in the high nibble, and answers with the configuration
    /// without the complement. A different answer sets
    /// [`ErrorFlags::config_mismatch`].
    pub fn write_config(&mut self, config: DeviceConfiguration) -> Ds2482Result<(), I2C::Error> {
        self.wait_on_busy()?;
        let bits = config.into_bits() & 0x0f;
        self.write_i2c_byte2(WRITE_CONFIG_CMD, bits | (!bits << 4))?;
        let readback = self.read_i2c_byte()?;
        if readback != bits {
            log::warn!("DS2482 configuration wrote {bits:#04x}, read back {readback:#04x}");
            self.errors.set_config_mismatch(true);
        }
        Ok(())
    }

    /// Poll the status register until the 1-Wire busy flag clears.
    ///
    /// The register is read at most `poll limit` times (1000 by default), with
    /// the poll interval (20 µs by default) between reads. If the line is
    /// still busy after the last read, [`ErrorFlags::timeout`] is set; this is
    /// not returned as an error.
    ///
    /// # Returns
    /// The last status read.
    pub fn wait_on_busy(&mut self) -> Ds2482Result<DeviceStatus, I2C::Error> {
        let mut status = self.read_status()?;
        let mut polls = 1;
        while status.onewire_busy() && polls < self.poll_limit {
            self.delay.delay_us(self.poll_interval_us);
            status = self.read_status()?;
            polls += 1;
        }
        if status.onewire_busy() {
            log::warn!("DS2482 1-Wire busy after {polls} polls");
            self.errors.set_timeout(true);
        }
        Ok(status)
    }

    /// Resets the bridge, aborting any 1-Wire command in progress.
    ///
    /// Polls the status register until RST is reported. The configuration register reads
    /// 0 afterwards.
    pub fn device_reset(&mut self) -> Ds2482Result<DeviceStatus, I2C::Error> {
        self.write_i2c_byte(DEVICE_RST_CMD)?;
        // The reset leaves the read pointer on the status register
        let mut status = DeviceStatus::from_bits(self.read_i2c_byte()?);
        let mut polls = 1;
        while !status.device_reset() && polls < self.poll_limit {
            self.delay.delay_us(self.poll_interval_us);
            status = DeviceStatus::from_bits(self.read_i2c_byte()?);
            polls += 1;
        }
        if !status.device_reset() {
            log::warn!("DS2482 did not report a device reset");
            self.errors.set_timeout(true);
        }
        Ok(status)
    }
}

/// Status register of the DS2482.
///
/// Every 1-Wire command and the device reset leave the read pointer on this
/// register, so polling it needs no pointer write until another register is read
/// ([datasheet](https://www.analog.com/media/en/technical-documentation/data-sheets/DS2482-800.pdf)).
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct DeviceStatus {
    /// 1WB: a 1-Wire command is in progress.
    pub onewire_busy: bool,
    /// PPD: a device answered the last 1-Wire reset with a presence pulse.
    pub present_pulse_detect: bool,
    /// SD: the line was low when the last 1-Wire reset sampled for a short.
    pub short_detect: bool,
    /// LL: level of the selected 1-Wire line, sampled on every status read.
    pub logic_level: bool,
    /// RST: the bridge went through a power-on or commanded reset and has not
    /// been configured since.
    pub device_reset: bool,
    /// SBR: line level sampled by a single bit command, or the id bit of a triplet.
    pub single_bit_result: bool,
    /// TSB: complement bit sampled by a triplet.
    pub triplet_second_bit: bool,
    /// DIR: branch written by a triplet. See the
    /// [search algorithm](https://www.analog.com/en/resources/app-notes/1wire-search-algorithm.html)
    /// application note.
    pub branch_dir_taken: bool,
}

impl OneWireStatus for DeviceStatus {
    fn presence(&self) -> bool {
        self.present_pulse_detect()
    }

    fn shortcircuit(&self) -> bool {
        self.short_detect()
    }

    fn logic_level(&self) -> Option<bool> {
        Some(DeviceStatus::logic_level(self))
    }

    fn direction(&self) -> Option<bool> {
        Some(self.branch_dir_taken())
    }
}

impl Addressing for DeviceStatus {
    const READ_PTR: u8 = DEVICE_STATUS_PTR;
}

impl Interact for DeviceStatus {
    fn read<I: I2c<SevenBitAddress>, D: DelayNs>(
        &mut self,
        dev: &mut Ds2482<I, D>,
    ) -> Ds2482Result<(), I::Error> {
        dev.set_read_pointer(Self::READ_PTR)?;
        *self = Self::from_bits(dev.read_i2c_byte()?);
        Ok(())
    }

    fn write<I: I2c<SevenBitAddress>, D: DelayNs>(
        &mut self,
        _dev: &mut Ds2482<I, D>,
    ) -> Ds2482Result<(), I::Error> {
        // read-only
        Ok(())
    }
}

/// Configuration register of the DS2482.
///
/// Only the low nibble carries settings; writes repeat it inverted in the high
/// nibble. SPU clears itself once the strong pullup ends, and a device reset
/// clears the whole register.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct DeviceConfiguration {
    /// APU: drive rising edges with the active pullup instead of the resistor.
    pub active_pullup: bool,
    /// PPM: report a presence pulse on every reset (DS2482-100 only).
    pub presence_pulse_masking: bool,
    /// SPU: engage the strong pullup after the next byte or bit command, for
    /// parasite-powered devices.
    pub strong_pullup: bool,
    /// 1WS: overdrive timing instead of standard speed.
    pub onewire_speed: bool,
    #[bits(4)]
    __: u8,
}

impl Addressing for DeviceConfiguration {
    const READ_PTR: u8 = DEVICE_CONFIG_PTR;
}

impl Interact for DeviceConfiguration {
    fn read<I: I2c<SevenBitAddress>, D: DelayNs>(
        &mut self,
        dev: &mut Ds2482<I, D>,
    ) -> Ds2482Result<(), I::Error> {
        dev.set_read_pointer(Self::READ_PTR)?;
        *self = Self::from_bits(dev.read_i2c_byte()? & 0x0f);
        Ok(())
    }

    fn write<I: I2c<SevenBitAddress>, D: DelayNs>(
        &mut self,
        dev: &mut Ds2482<I, D>,
    ) -> Ds2482Result<(), I::Error> {
        dev.write_config(*self)
    }
}

/// Sticky error flags of a [`Ds2482`].
///
/// Set by the register and 1-Wire layers instead of aborting the running
/// operation, and kept until [`Ds2482::clear_errors`].
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct ErrorFlags {
    /// The 1-Wire busy flag (or the device reset flag) did not settle within the poll limit.
    pub timeout: bool,
    /// A 1-Wire reset detected a short circuit.
    pub short_circuit: bool,
    /// The configuration register did not read back the value written.
    pub config_mismatch: bool,
    /// The channel selection register did not read back the expected code.
    pub channel_mismatch: bool,
    #[bits(4)]
    __: u8,
}

impl ErrorFlags {
    /// Whether any flag is set.
    pub fn any(&self) -> bool {
        self.into_bits() != 0
    }
}
