use std::borrow::Cow;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, network_endian::U32};

use super::control_packet::{CommandHeader, ControlCommand, PROTOCOL_VERSION};
use crate::packets::{codec::WirePacket, error::PacketParseError};

pub const NAME_FIELD_SIZE: usize = 32;

/// Session exchange packet (IN, OK, NO, BY).
///
/// The name is always carried in a fixed 32-byte, NUL-terminated field so both ends exchange
/// packets of identical size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, KnownLayout, IntoBytes, Immutable, FromBytes)]
#[repr(C, packed)]
pub struct ExchangePacket {
    pub command_header: CommandHeader,
    pub protocol_version: U32,
    pub initiator_token: U32,
    pub sender_ssrc: U32,
    pub name: [u8; NAME_FIELD_SIZE],
}

impl ExchangePacket {
    /// Header, version, token and ssrc. Initiators only send as much of the name as they need, and
    /// BY packets carry none.
    pub const FIXED_SIZE: usize = Self::SIZE - NAME_FIELD_SIZE;

    pub fn new(command: ControlCommand, initiator_token: u32, sender_ssrc: u32, name: &str) -> Self {
        let mut packet = ExchangePacket {
            command_header: CommandHeader::new(command),
            protocol_version: U32::new(PROTOCOL_VERSION),
            initiator_token: U32::new(initiator_token),
            sender_ssrc: U32::new(sender_ssrc),
            name: [0; NAME_FIELD_SIZE],
        };
        packet.set_name(name.as_bytes());
        packet
    }

    pub fn new_termination(initiator_token: u32, sender_ssrc: u32) -> Self {
        Self::new(ControlCommand::EndSession, initiator_token, sender_ssrc, "")
    }

    /// Copies `name` up to its first NUL, silently truncated so the field stays NUL-terminated.
    pub fn set_name(&mut self, name: &[u8]) {
        let name = name.split(|&b| b == 0).next().unwrap_or_default();
        let len = name.len().min(NAME_FIELD_SIZE - 1);
        self.name = [0; NAME_FIELD_SIZE];
        self.name[..len].copy_from_slice(&name[..len]);
    }

    pub fn name(&self) -> Cow<'_, str> {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_FIELD_SIZE);
        String::from_utf8_lossy(&self.name[..end])
    }

    pub fn command(&self) -> Option<ControlCommand> {
        ControlCommand::from_u16(self.command_header.command.get())
    }

    /// Bytes to transmit: the full fixed-size packet, except BY which ends after the ssrc.
    pub fn datagram(&self) -> &[u8] {
        if self.command_header.is(ControlCommand::EndSession) {
            &self.to_network_bytes()[..Self::FIXED_SIZE]
        } else {
            self.to_network_bytes()
        }
    }
}

impl WirePacket for ExchangePacket {
    fn from_network_bytes(bytes: &[u8]) -> Result<Self, PacketParseError> {
        if bytes.len() < Self::FIXED_SIZE {
            return Err(PacketParseError::ShortRead {
                expected: Self::FIXED_SIZE,
                actual: bytes.len(),
            });
        }

        let mut raw = [0u8; size_of::<ExchangePacket>()];
        let len = bytes.len().min(Self::SIZE);
        raw[..len].copy_from_slice(&bytes[..len]);

        let mut packet = Self::read_from_bytes(&raw[..]).map_err(|_| PacketParseError::ShortRead {
            expected: Self::SIZE,
            actual: raw.len(),
        })?;
        // Longer names are cut to the field width, keeping the terminator.
        let name = packet.name;
        packet.set_name(&name);
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVITATION: [u8; 31] = [
        0xFF, 0xFF, 0x49, 0x4E, //header
        0x00, 0x00, 0x00, 0x02, //version
        0xF8, 0xD1, 0x80, 0xE6, //initiator token
        0xF5, 0x19, 0xAE, 0xB9, //sender ssrc
        0x4C, 0x6F, 0x76, 0x65, 0x6C, 0x79, 0x20, 0x53, 0x65, 0x73, 0x73, 0x69, 0x6F, 0x6E, 0x00, //name
    ];

    #[test]
    fn test_size() {
        assert_eq!(ExchangePacket::SIZE, 48);
        assert_eq!(ExchangePacket::FIXED_SIZE, 16);
    }

    #[test]
    fn test_read_variable_length_invitation() {
        let packet = ExchangePacket::from_network_bytes(&INVITATION).unwrap();

        assert_eq!(packet.command(), Some(ControlCommand::Invitation));
        assert_eq!(packet.protocol_version.get(), 2);
        assert_eq!(packet.initiator_token.get(), 0xF8D180E6);
        assert_eq!(packet.sender_ssrc.get(), 0xF519AEB9);
        assert_eq!(packet.name(), "Lovely Session");
    }

    #[test]
    fn test_read_without_name() {
        let packet = ExchangePacket::from_network_bytes(&INVITATION[..16]).unwrap();
        assert_eq!(packet.name(), "");
    }

    #[test]
    fn test_read_short() {
        let result = ExchangePacket::from_network_bytes(&INVITATION[..15]);
        assert_eq!(result, Err(PacketParseError::ShortRead { expected: 16, actual: 15 }));
    }

    #[test]
    fn test_read_overlong_name_is_truncated() {
        let mut bytes = INVITATION[..16].to_vec();
        bytes.extend_from_slice(&[b'x'; 40]);
        bytes.push(0);

        let packet = ExchangePacket::from_network_bytes(&bytes).unwrap();
        assert_eq!(packet.name().len(), 31);
        assert_eq!(packet.name[31], 0);
    }

    #[test]
    fn test_write_acceptance() {
        let packet = ExchangePacket::new(ControlCommand::AcceptInvitation, 0xF8D180E6, 0xF519AEB9, "Lovely Session");
        let bytes = packet.datagram();

        assert_eq!(bytes.len(), 48);
        assert_eq!(&bytes[0..4], &[0xFF, 0xFF, 0x4F, 0x4B]);
        assert_eq!(&bytes[4..16], &INVITATION[4..16]);
        assert_eq!(&bytes[16..30], b"Lovely Session");
        assert!(bytes[30..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_termination() {
        let packet = ExchangePacket::new_termination(0xF8D180E6, 0xF519AEB9);
        assert_eq!(packet.datagram(), [
            0xFF, 0xFF, 0x42, 0x59, //header
            0x00, 0x00, 0x00, 0x02, //version
            0xF8, 0xD1, 0x80, 0xE6, //initiator token
            0xF5, 0x19, 0xAE, 0xB9, //sender ssrc
        ]);
    }

    #[test]
    fn test_round_trip() {
        let packet = ExchangePacket::new(ControlCommand::Invitation, 0x327b23c6, 0xa556f4da, "HOST");
        let decoded = ExchangePacket::from_network_bytes(packet.to_network_bytes()).unwrap();
        assert_eq!(decoded, packet);
    }
}
