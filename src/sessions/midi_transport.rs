use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{Level, event, instrument};

use super::clock_sync::MonotonicClock;
use crate::error::RtpMidiError;
use crate::net::DatagramSocket;
use crate::packets::midi_packets::midi_buffer::MidiTransportBuffer;
use crate::packets::midi_packets::midi_command::{MAX_COMMAND_SIZE, MidiCommand};
use crate::packets::midi_packets::midi_command_list_header::CommandListLength;

/// Outgoing side of the MIDI channel.
///
/// One lock guards the buffer, its sequence counter and every send on the MIDI socket, so the
/// caller's writes and the background sync task never interleave datagrams.
pub struct MidiTransport {
    buffer: Mutex<MidiTransportBuffer>,
    socket: Arc<dyn DatagramSocket>,
    peer: SocketAddr,
    ssrc: u32,
    clock: MonotonicClock,
}

impl MidiTransport {
    pub fn new(socket: Arc<dyn DatagramSocket>, peer: SocketAddr, ssrc: u32, clock: MonotonicClock, convention: CommandListLength) -> Self {
        MidiTransport {
            buffer: Mutex::new(MidiTransportBuffer::new(convention)),
            socket,
            peer,
            ssrc,
            clock,
        }
    }

    /// Buffers `command`, flushing first when it would not fit behind what is already queued.
    /// When that flush fails the buffer keeps its contents and `command` is not queued.
    pub async fn write(&self, command: &impl MidiCommand) -> Result<(), RtpMidiError> {
        if !MidiTransportBuffer::fits_alone(command) {
            return Err(RtpMidiError::CommandTooLarge {
                len: command.command_len(),
                max: MAX_COMMAND_SIZE,
            });
        }

        let mut buffer = self.buffer.lock().await;
        if buffer.would_overflow(command) {
            event!(Level::DEBUG, "Buffer full, flushing before write");
            self.send_buffered(&mut buffer).await?;
        }
        buffer.push(command)
    }

    /// Sends whatever is buffered as one datagram. Does nothing when the buffer is empty. After a
    /// failed send the same commands go out on the next flush, under the same sequence number.
    pub async fn flush(&self) -> Result<(), RtpMidiError> {
        let mut buffer = self.buffer.lock().await;
        self.send_buffered(&mut buffer).await
    }

    /// Sends a non-MIDI packet on the MIDI channel, serialized with MIDI flushes.
    pub async fn send_control(&self, packet: &[u8]) -> Result<(), RtpMidiError> {
        let _guard = self.buffer.lock().await;
        self.socket.send_to(packet, self.peer).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(seq = buffer.sequence_number(), messages = buffer.message_count()))]
    async fn send_buffered(&self, buffer: &mut MidiTransportBuffer) -> Result<(), RtpMidiError> {
        let Some(packet) = buffer.packet(self.clock.now_u32(), self.ssrc) else {
            event!(Level::TRACE, "Nothing to flush");
            return Ok(());
        };

        self.socket.send_to(&packet, self.peer).await?;
        buffer.mark_sent();
        event!(Level::DEBUG, bytes = packet.len(), "Flushed MIDI packet");
        Ok(())
    }
}
