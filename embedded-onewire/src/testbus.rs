//! Bit-level model of a 1-Wire bus populated with devices, for tests.

use crate::{OneWire, OneWireResult, OneWireStatus, crc8};
use core::convert::Infallible;

/// Build a ROM code from a family code and 48-bit serial, with a valid CRC.
pub fn rom_with_crc(family: u8, serial: u64) -> u64 {
    let mut bytes = ((serial & 0xffff_ffff_ffff) << 8 | family as u64).to_le_bytes();
    bytes[7] = crc8(&bytes[..7]);
    u64::from_le_bytes(bytes)
}

pub struct FakeStatus {
    presence: bool,
    short: bool,
}

impl OneWireStatus for FakeStatus {
    fn presence(&self) -> bool {
        self.presence
    }

    fn shortcircuit(&self) -> bool {
        self.short
    }
}

enum State {
    Idle,
    Rom,
    Search { bit: u8, phase: u8, active: Vec<u64> },
    Match(Vec<u8>),
    Selected(Option<u64>),
    Reading { frame: Vec<u8>, pos: usize },
}

pub struct FakeBus {
    devices: Vec<u64>,
    /// Devices answering the alarm search
    pub alarmed: Vec<u64>,
    /// Scratchpads returned for the read command, keyed by ROM
    pub frames: Vec<(u64, [u8; 9])>,
    /// All devices drop off the bus when the search reaches this bit
    pub vanish_at: Option<u8>,
    /// Number of resets before `vanish_at` takes effect
    pub vanish_after: usize,
    pub short: bool,
    pub resets: usize,
    /// ROM command bytes received directly after a reset
    pub commands: Vec<u8>,
    /// Function commands received by selected devices: (rom or skip, command, powered)
    pub functions: Vec<(Option<u64>, u8, bool)>,
    state: State,
}

impl FakeBus {
    pub fn new(devices: &[u64]) -> Self {
        Self {
            devices: devices.to_vec(),
            alarmed: Vec::new(),
            frames: Vec::new(),
            vanish_at: None,
            vanish_after: 0,
            short: false,
            resets: 0,
            commands: Vec::new(),
            functions: Vec::new(),
            state: State::Idle,
        }
    }

    fn command(&mut self, byte: u8, powered: bool) {
        self.state = match core::mem::replace(&mut self.state, State::Idle) {
            State::Rom => {
                self.commands.push(byte);
                match byte {
                    0xf0 => State::Search {
                        bit: 0,
                        phase: 0,
                        active: self.devices.clone(),
                    },
                    0xec => State::Search {
                        bit: 0,
                        phase: 0,
                        active: self.alarmed.clone(),
                    },
                    0x55 => State::Match(Vec::new()),
                    0xcc => State::Selected(None),
                    _ => State::Idle,
                }
            }
            State::Match(mut bytes) => {
                bytes.push(byte);
                if bytes.len() == 8 {
                    let rom = u64::from_le_bytes(bytes.try_into().unwrap());
                    if self.devices.contains(&rom) {
                        State::Selected(Some(rom))
                    } else {
                        State::Idle
                    }
                } else {
                    State::Match(bytes)
                }
            }
            State::Selected(rom) => {
                self.functions.push((rom, byte, powered));
                let frame = self
                    .frames
                    .iter()
                    .find(|(r, _)| Some(*r) == rom)
                    .map(|(_, f)| f.to_vec());
                match (byte, frame) {
                    (0xbe, Some(frame)) => State::Reading { frame, pos: 0 },
                    _ => State::Idle,
                }
            }
            other => other,
        };
    }
}

impl OneWire for FakeBus {
    type Status = FakeStatus;
    type BusError = Infallible;

    fn reset(&mut self) -> OneWireResult<FakeStatus, Infallible> {
        self.resets += 1;
        self.state = State::Rom;
        Ok(FakeStatus {
            presence: !self.devices.is_empty(),
            short: self.short,
        })
    }

    fn write_byte(&mut self, byte: u8) -> OneWireResult<(), Infallible> {
        self.command(byte, false);
        Ok(())
    }

    fn write_byte_powered(&mut self, byte: u8) -> OneWireResult<(), Infallible> {
        self.command(byte, true);
        Ok(())
    }

    fn read_byte(&mut self) -> OneWireResult<u8, Infallible> {
        Ok(match &mut self.state {
            State::Reading { frame, pos } if *pos < frame.len() => {
                *pos += 1;
                frame[*pos - 1]
            }
            _ => 0xff,
        })
    }

    fn write_bit(&mut self, value: bool) -> OneWireResult<(), Infallible> {
        if let State::Search { bit, phase, active } = &mut self.state {
            let b = *bit;
            active.retain(|rom| (rom >> b) & 1 == value as u64);
            *bit += 1;
            *phase = 0;
        }
        Ok(())
    }

    fn read_bit(&mut self) -> OneWireResult<bool, Infallible> {
        let vanish_at = self.vanish_at.filter(|_| self.resets > self.vanish_after);
        Ok(match &mut self.state {
            State::Search { bit, phase, active } => {
                if Some(*bit) == vanish_at {
                    active.clear();
                }
                let b = *bit;
                // Open drain: the line reads 1 only if no device pulls it low
                let level = if *phase == 0 {
                    active.iter().all(|rom| (rom >> b) & 1 == 1)
                } else {
                    active.iter().all(|rom| (rom >> b) & 1 == 0)
                };
                *phase += 1;
                level
            }
            _ => true,
        })
    }
}
