use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout,
    network_endian::{U16, U32},
};

use crate::packets::codec::WirePacket;

/// Version 2, no padding, no extension, no CSRCs.
pub const VPXCC: u8 = 0x80;
/// Marker bit clear, payload type 97.
pub const MPAYLOAD: u8 = 0x61;

#[derive(Debug, Clone, Copy, PartialEq, Eq, KnownLayout, IntoBytes, Immutable, FromBytes)]
#[repr(C, packed)]
pub struct MidiPacketHeader {
    pub vpxcc: u8,
    pub mpayload: u8,
    pub sequence_number: U16,
    /// Lower 32 bits of the timestamp in 100-microsecond units
    pub timestamp: U32,
    pub sender_ssrc: U32,
}

impl WirePacket for MidiPacketHeader {}

impl MidiPacketHeader {
    pub fn new(sequence_number: u16, timestamp: u32, sender_ssrc: u32) -> Self {
        MidiPacketHeader {
            vpxcc: VPXCC,
            mpayload: MPAYLOAD,
            sequence_number: U16::new(sequence_number),
            timestamp: U32::new(timestamp),
            sender_ssrc: U32::new(sender_ssrc),
        }
    }
}
