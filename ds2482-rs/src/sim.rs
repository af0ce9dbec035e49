//! Register-level model of a DS2482-800 with devices on its channels, for tests.

use crate::{
    onewire::{
        CHANNEL_READ_CODES, CHANNEL_SELECT_CMD, CHANNEL_WRITE_CODES, ONEWIRE_READ_BYTE,
        ONEWIRE_RESET_CMD, ONEWIRE_SINGLE_BIT, ONEWIRE_TRIPLET, ONEWIRE_WRITE_BYTE,
    },
    registers::{
        DEVICE_CONFIG_PTR, DEVICE_RST_CMD, DEVICE_STATUS_PTR, READ_DATA_PTR, READ_PTR_CMD,
        WRITE_CONFIG_CMD,
    },
};
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

use embedded_onewire::crc8;

/// Build a ROM code from a family code and 48-bit serial, with a valid CRC.
pub fn rom_with_crc(family: u8, serial: u64) -> u64 {
    let mut bytes = ((serial & 0xffff_ffff_ffff) << 8 | family as u64).to_le_bytes();
    bytes[7] = crc8(&bytes[..7]);
    u64::from_le_bytes(bytes)
}

const BUSY: u8 = 0x01;
const PPD: u8 = 0x02;
const SD: u8 = 0x04;
const RST: u8 = 0x10;
const SBR: u8 = 0x20;
const TSB: u8 = 0x40;
const DIR: u8 = 0x80;
const SPU: u8 = 0x04;

#[derive(Clone, Copy)]
enum Pointer {
    Status,
    Data,
    Config,
    Channel,
}

enum Wire {
    Idle,
    Rom,
    Search { bit: u8, active: Vec<u64> },
    Match(Vec<u8>),
    Selected(Option<u64>),
    Reading { frame: [u8; 9], pos: usize },
}

pub struct SimBridge {
    /// Devices on each channel
    pub channels: [Vec<u64>; 8],
    /// Scratchpads returned for Read Scratchpad, keyed by ROM
    pub frames: Vec<(u64, [u8; 9])>,
    pub short: bool,
    /// Status reads reporting busy after every 1-Wire command
    pub busy_polls: u32,
    pub stuck_busy: bool,
    /// Fail every transfer as if the bridge did not acknowledge
    pub nack: bool,
    /// ROM command bytes received directly after a 1-Wire reset
    pub rom_commands: Vec<u8>,
    /// Function commands received by selected devices: (rom or skip, command, strong pullup)
    pub functions: Vec<(Option<u64>, u8, bool)>,
    pub reset_with_strong_pullup: bool,
    channel: usize,
    pointer: Pointer,
    status: u8,
    config: u8,
    data: u8,
    busy: u32,
    wire: Wire,
}

impl SimBridge {
    pub fn new() -> Self {
        Self {
            channels: Default::default(),
            frames: Vec::new(),
            short: false,
            busy_polls: 0,
            stuck_busy: false,
            nack: false,
            rom_commands: Vec::new(),
            functions: Vec::new(),
            reset_with_strong_pullup: false,
            channel: 0,
            pointer: Pointer::Status,
            status: RST,
            config: 0,
            data: 0,
            busy: 0,
            wire: Wire::Idle,
        }
    }

    fn devices(&self) -> &[u64] {
        &self.channels[self.channel]
    }

    fn start_onewire(&mut self) {
        self.pointer = Pointer::Status;
        self.busy = self.busy_polls;
    }

    fn wire_byte(&mut self, byte: u8) {
        let powered = self.config & SPU != 0;
        self.wire = match core::mem::replace(&mut self.wire, Wire::Idle) {
            Wire::Rom => {
                self.rom_commands.push(byte);
                match byte {
                    0xf0 => Wire::Search {
                        bit: 0,
                        active: self.devices().to_vec(),
                    },
                    0x55 => Wire::Match(Vec::new()),
                    0xcc => Wire::Selected(None),
                    _ => Wire::Idle,
                }
            }
            Wire::Match(mut bytes) => {
                bytes.push(byte);
                if bytes.len() < 8 {
                    Wire::Match(bytes)
                } else {
                    let rom = u64::from_le_bytes(bytes.try_into().unwrap());
                    if self.devices().contains(&rom) {
                        Wire::Selected(Some(rom))
                    } else {
                        Wire::Idle
                    }
                }
            }
            Wire::Selected(rom) => {
                self.functions.push((rom, byte, powered));
                let frame = self
                    .frames
                    .iter()
                    .find(|(r, _)| Some(*r) == rom)
                    .map(|(_, f)| *f);
                match (byte, frame) {
                    (0xbe, Some(frame)) => Wire::Reading { frame, pos: 0 },
                    _ => Wire::Idle,
                }
            }
            other => other,
        };
    }

    fn wire_read(&mut self) -> u8 {
        match &mut self.wire {
            Wire::Reading { frame, pos } if *pos < frame.len() => {
                *pos += 1;
                frame[*pos - 1]
            }
            _ => 0xff,
        }
    }

    fn triplet(&mut self, direction: bool) {
        let mut status = self.status & !(SBR | TSB | DIR);
        if let Wire::Search { bit, active } = &mut self.wire {
            let b = *bit;
            let id = active.iter().all(|rom| (rom >> b) & 1 == 1);
            let comp = active.iter().all(|rom| (rom >> b) & 1 == 0);
            let taken = match (id, comp) {
                (false, false) => direction,
                (id, _) => id,
            };
            active.retain(|rom| ((rom >> b) & 1 == 1) == taken);
            *bit += 1;
            if id {
                status |= SBR;
            }
            if comp {
                status |= TSB;
            }
            if taken {
                status |= DIR;
            }
        } else {
            status |= SBR | TSB | DIR;
        }
        self.status = status;
    }

    fn write(&mut self, bytes: &[u8]) {
        match *bytes {
            [DEVICE_RST_CMD] => {
                self.status = RST;
                self.config = 0;
                self.pointer = Pointer::Status;
                self.wire = Wire::Idle;
            }
            [READ_PTR_CMD, ptr] => {
                self.pointer = match ptr {
                    DEVICE_STATUS_PTR => Pointer::Status,
                    READ_DATA_PTR => Pointer::Data,
                    DEVICE_CONFIG_PTR => Pointer::Config,
                    _ => self.pointer,
                };
            }
            [WRITE_CONFIG_CMD, cfg] => {
                if (cfg >> 4) == (!cfg & 0x0f) {
                    self.config = cfg & 0x0f;
                    self.status &= !RST;
                }
                self.pointer = Pointer::Config;
            }
            [CHANNEL_SELECT_CMD, code] => {
                if let Some(ch) = CHANNEL_WRITE_CODES.iter().position(|&c| c == code) {
                    self.channel = ch;
                }
                self.pointer = Pointer::Channel;
            }
            [ONEWIRE_RESET_CMD] => {
                if self.config & SPU != 0 {
                    self.reset_with_strong_pullup = true;
                }
                let mut status = self.status & !(PPD | SD);
                if !self.devices().is_empty() {
                    status |= PPD;
                }
                if self.short {
                    status |= SD;
                }
                self.status = status;
                self.wire = Wire::Rom;
                self.start_onewire();
            }
            [ONEWIRE_WRITE_BYTE, byte] => {
                self.wire_byte(byte);
                self.start_onewire();
            }
            [ONEWIRE_READ_BYTE] => {
                self.data = self.wire_read();
                self.start_onewire();
            }
            [ONEWIRE_SINGLE_BIT, bit] => {
                self.status &= !SBR;
                if bit & 0x80 != 0 {
                    self.status |= SBR;
                }
                self.start_onewire();
            }
            [ONEWIRE_TRIPLET, dir] => {
                self.triplet(dir & 0x80 != 0);
                self.start_onewire();
            }
            _ => {}
        }
    }

    fn read(&mut self) -> u8 {
        match self.pointer {
            Pointer::Status => {
                if self.stuck_busy {
                    self.status | BUSY
                } else if self.busy > 0 {
                    self.busy -= 1;
                    self.status | BUSY
                } else {
                    self.status
                }
            }
            Pointer::Data => self.data,
            Pointer::Config => self.config,
            Pointer::Channel => CHANNEL_READ_CODES[self.channel],
        }
    }
}

impl ErrorType for SimBridge {
    type Error = ErrorKind;
}

impl I2c for SimBridge {
    fn transaction(
        &mut self,
        _address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.nack {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => self.write(bytes),
                Operation::Read(buf) => {
                    for b in buf.iter_mut() {
                        *b = self.read();
                    }
                }
            }
        }
        Ok(())
    }
}
