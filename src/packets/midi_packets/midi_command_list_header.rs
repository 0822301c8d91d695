use bytes::{BufMut, BytesMut};

use crate::packets::error::PacketParseError;

/// How the low bits of the command list header are interpreted by the receiving peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandListLength {
    /// Number of buffered messages, always in a one byte header.
    #[default]
    MessageCount,
    /// Payload length in bytes as in RFC 6295, switching to the two byte header past 15 bytes.
    ByteCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiCommandListFlags {
    flags: u8,
}

#[repr(u8)]
enum MidiCommandSectionFlagMasks {
    B = 0b1000_0000,
    J = 0b0100_0000,
    Z = 0b0010_0000,
    P = 0b0001_0000,
}

impl MidiCommandListFlags {
    pub fn from_u8(byte: u8) -> Self {
        MidiCommandListFlags { flags: byte & 0xF0 }
    }

    pub fn new(b_flag: bool, j_flag: bool, z_flag: bool, p_flag: bool) -> Self {
        let mut this = MidiCommandListFlags { flags: 0 };
        this.set_flag(MidiCommandSectionFlagMasks::B, b_flag);
        this.set_flag(MidiCommandSectionFlagMasks::J, j_flag);
        this.set_flag(MidiCommandSectionFlagMasks::Z, z_flag);
        this.set_flag(MidiCommandSectionFlagMasks::P, p_flag);
        this
    }

    fn get_flag(&self, flag: MidiCommandSectionFlagMasks) -> bool {
        self.flags & flag as u8 != 0
    }

    fn set_flag(&mut self, flag: MidiCommandSectionFlagMasks, value: bool) {
        if value {
            self.flags |= flag as u8;
        } else {
            self.flags &= !(flag as u8);
        }
    }

    pub fn b_flag(&self) -> bool {
        self.get_flag(MidiCommandSectionFlagMasks::B)
    }

    pub fn j_flag(&self) -> bool {
        self.get_flag(MidiCommandSectionFlagMasks::J)
    }

    pub fn z_flag(&self) -> bool {
        self.get_flag(MidiCommandSectionFlagMasks::Z)
    }

    pub fn p_flag(&self) -> bool {
        self.get_flag(MidiCommandSectionFlagMasks::P)
    }

    pub fn needs_b_flag(size: usize) -> bool {
        size > SHORT_HEADER_MAX_LENGTH
    }

    pub fn bits(&self) -> u8 {
        self.flags
    }
}

pub const SHORT_HEADER_MAX_LENGTH: usize = 0x0F;

#[derive(Debug)]
pub struct MidiCommandListHeader {
    flags: MidiCommandListFlags,
    length: usize,
}

impl MidiCommandListHeader {
    pub fn new(flags: MidiCommandListFlags, length: usize) -> Self {
        MidiCommandListHeader { flags, length }
    }

    /// Header for a list where every command, the first included, is preceded by a delta time
    /// and no recovery journal follows.
    pub fn build_for(convention: CommandListLength, message_count: usize, payload_len: usize) -> Self {
        let (b_flag, length) = match convention {
            CommandListLength::MessageCount => (false, message_count),
            CommandListLength::ByteCount => (MidiCommandListFlags::needs_b_flag(payload_len), payload_len),
        };
        Self::new(MidiCommandListFlags::new(b_flag, false, true, false), length)
    }

    pub fn flags(&self) -> &MidiCommandListFlags {
        &self.flags
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn size(&self) -> usize {
        if self.flags.b_flag() { 2 } else { 1 }
    }

    /// Reads a received header. The length is always the RFC 6295 byte count.
    pub fn read(data: &[u8]) -> Result<(Self, &[u8]), PacketParseError> {
        let Some(&first_byte) = data.first() else {
            return Err(PacketParseError::ShortRead { expected: 1, actual: 0 });
        };
        let flags = MidiCommandListFlags::from_u8(first_byte);
        if !flags.b_flag() {
            return Ok((Self::new(flags, usize::from(first_byte & 0x0F)), &data[1..]));
        }

        let Some(&length_lsb) = data.get(1) else {
            return Err(PacketParseError::ShortRead { expected: 2, actual: data.len() });
        };
        let length = (usize::from(first_byte & 0x0F) << 8) | usize::from(length_lsb);
        Ok((Self::new(flags, length), &data[2..]))
    }

    pub fn write(&self, buffer: &mut BytesMut) {
        if self.flags.b_flag() {
            // For large lengths: first byte has flags + upper 4 bits of length
            let first_byte = self.flags.bits() | ((self.length >> 8) as u8 & 0x0F);
            buffer.put_u8(first_byte);
            // Second byte has lower 8 bits of length
            let second_byte = (self.length & 0xFF) as u8;
            buffer.put_u8(second_byte);
        } else {
            // For small lengths: first byte has flags + length (4 bits max)
            let first_byte = self.flags.bits() | (self.length as u8 & 0x0F);
            buffer.put_u8(first_byte);
        }
    }
}
