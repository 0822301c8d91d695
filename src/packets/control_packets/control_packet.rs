use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, network_endian::U16};

use super::{clock_sync_packet::SynchronizationPacket, exchange_packet::ExchangePacket};
use crate::packets::{codec::WirePacket, error::PacketParseError};

pub const SIGNATURE: u16 = 0xFFFF;
pub const PROTOCOL_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ControlCommand {
    Invitation = 0x494E, // "IN"
    AcceptInvitation = 0x4F4B, // "OK"
    RejectInvitation = 0x4E4F, // "NO"
    EndSession = 0x4259, // "BY"
    ClockSync = 0x434B, // "CK"
}

impl ControlCommand {
    pub fn from_u16(command: u16) -> Option<Self> {
        match &command.to_be_bytes() {
            b"IN" => Some(ControlCommand::Invitation),
            b"OK" => Some(ControlCommand::AcceptInvitation),
            b"NO" => Some(ControlCommand::RejectInvitation),
            b"BY" => Some(ControlCommand::EndSession),
            b"CK" => Some(ControlCommand::ClockSync),
            _ => None,
        }
    }
}

/// First four bytes of every control and synchronization packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, KnownLayout, IntoBytes, Immutable, FromBytes)]
#[repr(C, packed)]
pub struct CommandHeader {
    pub signature: U16,
    pub command: U16,
}

impl CommandHeader {
    pub fn new(command: ControlCommand) -> Self {
        CommandHeader {
            signature: U16::new(SIGNATURE),
            command: U16::new(command as u16),
        }
    }

    pub fn is(&self, command: ControlCommand) -> bool {
        self.command.get() == command as u16
    }
}

impl WirePacket for CommandHeader {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlPacket {
    Exchange(ExchangePacket),
    Sync(SynchronizationPacket),
}

impl ControlPacket {
    pub fn is_control_packet(buffer: &[u8]) -> bool {
        buffer.starts_with(&SIGNATURE.to_be_bytes())
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, PacketParseError> {
        let header = CommandHeader::from_network_bytes(bytes)?;
        if header.signature.get() != SIGNATURE {
            return Err(PacketParseError::BadSignature(header.signature.get()));
        }

        match ControlCommand::from_u16(header.command.get()) {
            Some(ControlCommand::ClockSync) => Ok(ControlPacket::Sync(SynchronizationPacket::from_network_bytes(bytes)?)),
            Some(_) => Ok(ControlPacket::Exchange(ExchangePacket::from_network_bytes(bytes)?)),
            None => Err(PacketParseError::UnknownCommand(header.command.get())),
        }
    }

    pub fn header(&self) -> CommandHeader {
        match self {
            ControlPacket::Exchange(packet) => packet.command_header,
            ControlPacket::Sync(packet) => packet.command_header,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_values() {
        assert_eq!(ControlCommand::Invitation as u16, 0x494E);
        assert_eq!(ControlCommand::AcceptInvitation as u16, 0x4F4B);
        assert_eq!(ControlCommand::ClockSync as u16, 0x434B);
        assert_eq!(ControlCommand::from_u16(0x4259), Some(ControlCommand::EndSession));
        assert_eq!(ControlCommand::from_u16(0), None);
    }

    #[test]
    fn test_write_header() {
        let header = CommandHeader::new(ControlCommand::ClockSync);
        assert_eq!(header.to_network_bytes(), [255, 255, 67, 75]);
    }

    #[test]
    fn test_is_control_packet() {
        assert!(ControlPacket::is_control_packet(&[255, 255, 67, 75]));
        assert!(!ControlPacket::is_control_packet(&[0x80, 0x61, 0, 0]));
    }

    #[test]
    fn test_parse_too_short_control_packet() {
        let result = ControlPacket::parse(&[255, 255, 67]);
        assert_eq!(result, Err(PacketParseError::ShortRead { expected: 4, actual: 3 }));
    }

    #[test]
    fn test_parse_bad_signature() {
        let result = ControlPacket::parse(&[0x80, 0x61, 0x00, 0x01]);
        assert_eq!(result, Err(PacketParseError::BadSignature(0x8061)));
    }

    #[test]
    fn test_parse_unknown_control_packet() {
        let result = ControlPacket::parse(&[255, 255, 0, 0]);
        assert_eq!(result, Err(PacketParseError::UnknownCommand(0)));
    }

    #[test]
    fn test_read_clock_sync_packet_2() {
        let buffer = [
            0xFF, 0xFF, 0x43, 0x4B, //header
            0xF5, 0x19, 0xAE, 0xB9, //sender ssrc
            0x02, //count
            0x00, 0x00, 0x00, //reserved
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, // timestamp 1
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, // timestamp 2
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, // timestamp 3
        ];

        match ControlPacket::parse(&buffer) {
            Ok(ControlPacket::Sync(packet)) => {
                assert_eq!(packet.count, 2);
                assert_eq!(packet.sender_ssrc.get(), 4112101049);
                assert_eq!(packet.timestamps(), [1, 2, 3]);
            }
            other => panic!("Expected Sync packet, got {other:?}"),
        }
    }

    #[test]
    fn test_read_session_initiation_packet() {
        let buffer = [
            0xFF, 0xFF, 0x49, 0x4E, //header
            0x00, 0x00, 0x00, 0x02, //version
            0xF8, 0xD1, 0x80, 0xE6, //initiator token
            0xF5, 0x19, 0xAE, 0xB9, //sender ssrc
            0x4C, 0x6F, 0x76, 0x65, 0x6C, 0x79, 0x20, 0x53, 0x65, 0x73, 0x73, 0x69, 0x6F, 0x6E, 0x00, //name
        ];

        match ControlPacket::parse(&buffer) {
            Ok(ControlPacket::Exchange(packet)) => {
                assert!(packet.command_header.is(ControlCommand::Invitation));
                assert_eq!(packet.name(), "Lovely Session");
            }
            other => panic!("Expected Exchange packet, got {other:?}"),
        }
    }
}
