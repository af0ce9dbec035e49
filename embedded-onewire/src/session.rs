//! Per-device transactions: reset, address one device (or all of them), issue a function
//! command and optionally read back a CRC-protected frame.
//!
//! Every transaction starts with its own bus reset, so a failed transaction never
//! leaves the next one talking to a half-addressed device.

use crate::{OneWire, OneWireCrc, OneWireError, OneWireResult, OneWireStatus};

/// Resets the bus and addresses `rom`, or every device when `rom` is [`None`].
///
/// # Errors
/// [`OneWireError::ShortCircuit`] if the bus is shorted, [`OneWireError::NoDevicePresent`]
/// if no device answered the reset.
pub fn select<O: OneWire>(bus: &mut O, rom: Option<u64>) -> OneWireResult<(), O::BusError> {
    let status = bus.reset()?;
    if status.shortcircuit() {
        return Err(OneWireError::ShortCircuit);
    }
    if !status.presence() {
        return Err(OneWireError::NoDevicePresent);
    }
    bus.address(rom)
}

/// Addresses `rom` and sends a function command.
///
/// With `powered` the strong pullup is engaged right after the command, which
/// parasite-powered devices need to complete e.g. a temperature conversion.
pub fn select_and_write<O: OneWire>(
    bus: &mut O,
    rom: Option<u64>,
    cmd: u8,
    powered: bool,
) -> OneWireResult<(), O::BusError> {
    select(bus, rom)?;
    if powered {
        bus.write_byte_powered(cmd)
    } else {
        bus.write_byte(cmd)
    }
}

/// Addresses `rom`, sends `cmd` and reads an `N` byte frame whose last byte is the CRC-8 of
/// the others.
///
/// The frame is only returned once it has been validated. A frame of all zeros, which
/// trivially satisfies the CRC, is what a stuck-low bus reads back and is rejected as well.
///
/// # Errors
/// [`OneWireError::InvalidCrc`] if the frame does not validate, otherwise as [`select`].
pub fn select_and_read<const N: usize, O: OneWire>(
    bus: &mut O,
    rom: Option<u64>,
    cmd: u8,
) -> OneWireResult<[u8; N], O::BusError> {
    select(bus, rom)?;
    bus.write_byte(cmd)?;
    let mut frame = [0u8; N];
    for b in frame.iter_mut() {
        *b = bus.read_byte()?;
    }
    if frame.iter().all(|&b| b == 0) || !OneWireCrc::validate(&frame) {
        return Err(OneWireError::InvalidCrc);
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        consts::{ONEWIRE_MATCH_ROM_CMD, ONEWIRE_SKIP_ROM_CMD},
        crc8,
        testbus::{FakeBus, rom_with_crc},
    };

    fn frame(data: [u8; 8]) -> [u8; 9] {
        let mut frame = [0; 9];
        frame[..8].copy_from_slice(&data);
        frame[8] = crc8(&data);
        frame
    }

    #[test]
    fn reads_validated_frame() {
        let rom = rom_with_crc(0x28, 0x1234);
        let other = rom_with_crc(0x28, 0x5678);
        let pad = frame([0x50, 0x05, 0x4b, 0x46, 0x7f, 0xff, 0x0c, 0x10]);
        let mut bus = FakeBus::new(&[rom, other]);
        bus.frames.push((rom, pad));
        bus.frames.push((other, frame([0x91, 0x01, 0x4b, 0x46, 0x7f, 0xff, 0x0f, 0x10])));

        let got: [u8; 9] = select_and_read(&mut bus, Some(rom), 0xbe).unwrap();
        assert_eq!(got, pad);
        assert_eq!(bus.commands, vec![ONEWIRE_MATCH_ROM_CMD]);
        assert_eq!(bus.functions, vec![(Some(rom), 0xbe, false)]);
    }

    #[test]
    fn rejects_corrupt_frame() {
        let rom = rom_with_crc(0x28, 0x1234);
        let mut pad = frame([0x50, 0x05, 0x4b, 0x46, 0x7f, 0xff, 0x0c, 0x10]);
        pad[1] ^= 0x04;
        let mut bus = FakeBus::new(&[rom]);
        bus.frames.push((rom, pad));
        let res = select_and_read::<9, _>(&mut bus, Some(rom), 0xbe);
        assert_eq!(res, Err(OneWireError::InvalidCrc));
    }

    #[test]
    fn rejects_zero_frame() {
        let rom = rom_with_crc(0x28, 0x1234);
        let mut bus = FakeBus::new(&[rom]);
        bus.frames.push((rom, [0; 9]));
        let res = select_and_read::<9, _>(&mut bus, Some(rom), 0xbe);
        assert_eq!(res, Err(OneWireError::InvalidCrc));
    }

    #[test]
    fn unknown_device_reads_ones() {
        let rom = rom_with_crc(0x28, 0x1234);
        let mut bus = FakeBus::new(&[rom]);
        let res = select_and_read::<9, _>(&mut bus, Some(rom_with_crc(0x28, 1)), 0xbe);
        assert_eq!(res, Err(OneWireError::InvalidCrc));
    }

    #[test]
    fn empty_bus() {
        let mut bus = FakeBus::new(&[]);
        let res = select_and_read::<9, _>(&mut bus, None, 0xbe);
        assert_eq!(res, Err(OneWireError::NoDevicePresent));
        assert!(bus.commands.is_empty());
    }

    #[test]
    fn shorted_bus() {
        let mut bus = FakeBus::new(&[rom_with_crc(0x28, 1)]);
        bus.short = true;
        assert_eq!(select(&mut bus, None), Err(OneWireError::ShortCircuit));
    }

    #[test]
    fn powered_broadcast() {
        let mut bus = FakeBus::new(&[rom_with_crc(0x28, 1), rom_with_crc(0x28, 2)]);
        select_and_write(&mut bus, None, 0x44, true).unwrap();
        assert_eq!(bus.commands, vec![ONEWIRE_SKIP_ROM_CMD]);
        assert_eq!(bus.functions, vec![(None, 0x44, true)]);
    }
}
