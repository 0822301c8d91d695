use bytes::{BufMut, Bytes, BytesMut};

use super::delta_time::WriteDeltaTimeExt;
use super::midi_command::{MAX_COMMAND_SIZE, MidiCommand};
use super::midi_command_list_header::{CommandListLength, MidiCommandListHeader, SHORT_HEADER_MAX_LENGTH};
use super::midi_packet_header::MidiPacketHeader;
use crate::error::RtpMidiError;
use crate::packets::codec::WirePacket;

/// Every buffered command is preceded by a one byte delta time.
pub const DELTA_TIME_SIZE: usize = 1;
pub const MAX_PAYLOAD_SIZE: usize = DELTA_TIME_SIZE + MAX_COMMAND_SIZE;

/// Accumulates outgoing commands into one RTP-MIDI command list.
///
/// The buffer does no I/O. [`MidiTransportBuffer::packet`] produces the datagram for a flush
/// and [`MidiTransportBuffer::mark_sent`] resets the payload once it is on the wire. The sequence
/// number keeps counting for the buffer's lifetime.
#[derive(Debug)]
pub struct MidiTransportBuffer {
    payload: BytesMut,
    message_count: usize,
    sequence_number: u16,
    convention: CommandListLength,
}

impl MidiTransportBuffer {
    pub fn new(convention: CommandListLength) -> Self {
        MidiTransportBuffer {
            payload: BytesMut::with_capacity(MAX_PAYLOAD_SIZE),
            message_count: 0,
            sequence_number: 0,
            convention,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.message_count == 0
    }

    pub fn message_count(&self) -> usize {
        self.message_count
    }

    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Sequence number the next flushed packet will carry.
    pub fn sequence_number(&self) -> u16 {
        self.sequence_number
    }

    pub fn fits_alone(command: &impl MidiCommand) -> bool {
        DELTA_TIME_SIZE + command.command_len() <= MAX_PAYLOAD_SIZE
    }

    /// Whether appending `command` needs a flush first.
    pub fn would_overflow(&self, command: &impl MidiCommand) -> bool {
        let count_full = self.convention == CommandListLength::MessageCount && self.message_count >= SHORT_HEADER_MAX_LENGTH;
        count_full || self.payload.len() + DELTA_TIME_SIZE + command.command_len() > MAX_PAYLOAD_SIZE
    }

    /// Appends a command behind a zero delta time. The caller flushes first when
    /// [`MidiTransportBuffer::would_overflow`] says so.
    pub fn push(&mut self, command: &impl MidiCommand) -> Result<(), RtpMidiError> {
        if !Self::fits_alone(command) {
            return Err(RtpMidiError::CommandTooLarge {
                len: command.command_len(),
                max: MAX_COMMAND_SIZE,
            });
        }
        debug_assert!(!self.would_overflow(command), "push on a full buffer");

        self.payload.write_delta_time(0);
        command.write_command(&mut self.payload);
        self.message_count += 1;
        Ok(())
    }

    /// Builds the datagram for everything buffered so far. Returns `None` when there is nothing
    /// to send. The buffer is left as is until [`MidiTransportBuffer::mark_sent`].
    pub fn packet(&self, timestamp: u32, sender_ssrc: u32) -> Option<Bytes> {
        if self.is_empty() {
            return None;
        }

        let header = MidiPacketHeader::new(self.sequence_number, timestamp, sender_ssrc);
        let list_header = MidiCommandListHeader::build_for(self.convention, self.message_count, self.payload.len());

        let mut packet = BytesMut::with_capacity(MidiPacketHeader::SIZE + list_header.size() + self.payload.len());
        packet.put_slice(header.to_network_bytes());
        list_header.write(&mut packet);
        packet.put_slice(&self.payload);
        Some(packet.freeze())
    }

    /// Empties the buffer and moves on to the next sequence number once a packet went out.
    pub fn mark_sent(&mut self) {
        self.payload.clear();
        self.message_count = 0;
        self.sequence_number = self.sequence_number.wrapping_add(1);
    }
}
