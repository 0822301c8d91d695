use bytes::{BufMut, BytesMut};

use crate::packets::error::PacketParseError;

/// Longest delta time encoding allowed in a command list.
const MAX_DELTA_TIME_SIZE: usize = 4;

pub(crate) fn delta_time_size(delta_time: u32) -> usize {
    let mut size = 0;
    let mut value = delta_time;

    while value > 0 {
        size += 1;
        value >>= 7;
    }

    size.max(1)
}

pub(crate) trait WriteDeltaTimeExt {
    fn write_delta_time(&mut self, delta_time: u32);
}

impl WriteDeltaTimeExt for BytesMut {
    fn write_delta_time(&mut self, delta_time: u32) {
        let num_bytes = delta_time_size(delta_time);

        for i in (0..num_bytes).rev() {
            let mut byte = ((delta_time >> (i * 7)) & 0x7F) as u8;
            if i > 0 {
                byte |= 0x80; // continuation bit on every byte but the last
            }
            self.put_u8(byte);
        }
    }
}

/// Reads one variable-length delta time and returns it with the bytes that follow.
pub(crate) fn read_delta_time(bytes: &[u8]) -> Result<(u32, &[u8]), PacketParseError> {
    let mut delta_time = 0u32;
    for (i, byte) in bytes.iter().take(MAX_DELTA_TIME_SIZE).enumerate() {
        delta_time = (delta_time << 7) | u32::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok((delta_time, &bytes[i + 1..]));
        }
    }
    Err(PacketParseError::TruncatedDeltaTime)
}
