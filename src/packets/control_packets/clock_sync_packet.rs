use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout,
    network_endian::{U32, U64},
};

use super::control_packet::{CommandHeader, ControlCommand};
use crate::packets::codec::WirePacket;

/// Three-way clock synchronization packet. `count` is the exchange step (0, 1 or 2) and the
/// timestamps are 100 microsecond ticks, one slot filled per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, KnownLayout, IntoBytes, Immutable, FromBytes)]
#[repr(C, packed)]
pub struct SynchronizationPacket {
    pub command_header: CommandHeader,
    pub sender_ssrc: U32,
    pub count: u8,
    _reserved: [u8; 3],
    pub timestamps: [U64; 3],
}

impl WirePacket for SynchronizationPacket {}

impl SynchronizationPacket {
    pub fn new(count: u8, timestamps: [u64; 3], sender_ssrc: u32) -> Self {
        SynchronizationPacket {
            command_header: CommandHeader::new(ControlCommand::ClockSync),
            sender_ssrc: U32::new(sender_ssrc),
            count,
            _reserved: [0; 3],
            timestamps: timestamps.map(U64::new),
        }
    }

    pub fn timestamps(&self) -> [u64; 3] {
        self.timestamps.map(U64::get)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_control_packet_0() {
        let buffer = [
            0xFF, 0xFF, 0x43, 0x4B, //header
            0xF5, 0x19, 0xAE, 0xB9, //sender ssrc
            0x00, //count
            0x00, 0x00, 0x00, //reserved
            0x00, 0x00, 0x00, 0x00, 0x72, 0xD4, 0xC5, 0x8E, // timestamp 1
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // timestamp 2
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // timestamp 3
        ];

        let packet = SynchronizationPacket::from_network_bytes(&buffer).unwrap();
        assert_eq!(packet.sender_ssrc.get(), 4112101049);
        assert_eq!(packet.count, 0);
        assert_eq!(packet.timestamps(), [1926546830, 0, 0]);
    }

    #[test]
    fn test_read_control_packet_2() {
        let buffer = [
            0xFF, 0xFF, 0x43, 0x4B, //header
            0xF5, 0x19, 0xAE, 0xB9, //sender ssrc
            0x02, //count
            0x00, 0x00, 0x00, //reserved
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x72, // timestamp 1
            0x00, 0x00, 0x00, 0x00, 0x04, 0x3D, 0xC7, 0xDF, // timestamp 2
            0x00, 0x00, 0x00, 0x00, 0x72, 0xD4, 0xC5, 0xCD, // timestamp 3
        ];

        let packet = SynchronizationPacket::from_network_bytes(&buffer).unwrap();
        assert_eq!(packet.count, 2);
        assert_eq!(packet.timestamps(), [114, 71157727, 1926546893]);
    }

    #[test]
    fn test_write_control_packet() {
        let expected = [
            0xFF, 0xFF, 0x43, 0x4B, //header
            0xF5, 0x19, 0xAE, 0xB9, //sender ssrc
            0x02, //count
            0x00, 0x00, 0x00, //reserved
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, // timestamp 1
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, // timestamp 2
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, // timestamp 3
        ];
        let packet = SynchronizationPacket::new(2, [1, 2, 3], 4112101049);

        assert_eq!(SynchronizationPacket::SIZE, 36);
        assert_eq!(packet.to_network_bytes(), expected);
    }

    #[test]
    fn test_round_trip() {
        let packet = SynchronizationPacket::new(1, [u64::MAX, 0x0102_0304_0506_0708, 0], 0xdbffa3a1);
        let decoded = SynchronizationPacket::from_network_bytes(packet.to_network_bytes()).unwrap();
        assert_eq!(decoded, packet);
    }
}
