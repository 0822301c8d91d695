//! Host/network conversion for the fixed-layout packets.
//!
//! Every packet struct stores its multi-byte fields as zerocopy `network_endian` integers, so the
//! in-memory value already has the wire layout: `U32::new` converts a host value to network order
//! and `.get()` converts back. Encoding is therefore a borrow of the struct's bytes and decoding is
//! a copy out of a received buffer, with a length check in front of it.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::error::PacketParseError;

pub trait WirePacket: FromBytes + IntoBytes + KnownLayout + Immutable + Sized {
    /// Exact number of bytes this packet occupies on the wire.
    const SIZE: usize = size_of::<Self>();

    fn to_network_bytes(&self) -> &[u8] {
        self.as_bytes()
    }

    /// Decodes a packet from the start of `bytes`. Trailing bytes are ignored; fewer than
    /// [`WirePacket::SIZE`] bytes is a short read.
    fn from_network_bytes(bytes: &[u8]) -> Result<Self, PacketParseError> {
        Self::read_from_prefix(bytes)
            .map(|(packet, _rest)| packet)
            .map_err(|_| PacketParseError::ShortRead {
                expected: Self::SIZE,
                actual: bytes.len(),
            })
    }
}
